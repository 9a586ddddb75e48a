/// Headless demo
/// Renders a lit-looking cube, a textured floor, a wireframe, world axes and
/// a few point lights for a number of frames, then reports timings and
/// optionally writes the last frame as a binary PPM.
///
/// Usage: soft_raster_demo [frames] [output.ppm]
use glam::{Mat4, Vec2, Vec3, Vec4};
use mimalloc::MiMalloc;
use soft_raster::perf::PerfTimer;
use soft_raster::rendering::shader::normal_to_color;
use soft_raster::rendering::texture::MipmapTask;
use soft_raster::*;
use std::sync::Arc;
use std::time::Instant;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const WIDTH: usize = 1280;
const HEIGHT: usize = 720;

fn cube() -> Result<Mesh> {
    // One quad per side, counter-clockwise seen from outside.
    let sides = [
        (Vec3::X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Y),
        (Vec3::Y, Vec3::Z),
        (Vec3::NEG_Y, Vec3::Z),
        (Vec3::Z, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, up) in sides {
        let right = up.cross(normal);
        let base = vertices.len() as u32;
        for (u, v) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = normal + right * u + up * v;
            // Normal remapped to [0, 1] so the vertex color shader shows it.
            let color = normal_to_color(normal).truncate();
            vertices.push(Vertex::new(position * 0.5, Vec2::new((u + 1.0) * 0.5, (v + 1.0) * 0.5), color));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    Mesh::new(vertices, indices)
}

fn floor(size: f32, repeat: f32) -> Result<Mesh> {
    let v = |x: f32, z: f32, u: f32, t: f32| Vertex::new(Vec3::new(x, -0.5, z), Vec2::new(u, t), Vec3::Y);
    Mesh::new(
        vec![
            v(-size, size, 0.0, 0.0),
            v(size, size, repeat, 0.0),
            v(size, -size, repeat, repeat),
            v(-size, -size, 0.0, repeat),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
}

fn axes() -> [Line; 3] {
    [
        Line::new(Vec3::ZERO, Vec3::X * 2.0, Vec4::new(1.0, 0.0, 0.0, 1.0)),
        Line::new(Vec3::ZERO, Vec3::Y * 2.0, Vec4::new(0.0, 1.0, 0.0, 1.0)),
        Line::new(Vec3::ZERO, Vec3::Z * 2.0, Vec4::new(0.0, 0.0, 1.0, 1.0)),
    ]
}

fn write_ppm(path: &str, renderer: &SoftRenderer) -> std::io::Result<()> {
    let rgba = renderer.frame_rgba(true);
    let mut out = format!("P6\n{} {}\n255\n", renderer.width(), renderer.height()).into_bytes();
    out.extend(rgba.chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]));
    std::fs::write(path, out)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let frames: usize = args.next().and_then(|s| s.parse().ok()).unwrap_or(60);
    let output = args.next();

    println!("=== soft_raster demo ===");
    println!("{}x{}, {} frames", WIDTH, HEIGHT, frames);

    let mut renderer = SoftRenderer::create(WIDTH, HEIGHT, 0.0, 1.0)?;
    println!("Workers: {}", renderer.thread_count());

    let cube = cube()?;
    let floor = floor(8.0, 8.0)?.with_double_sided(true);
    let points: Vec<Point> = (0..8)
        .map(|i| {
            let a = i as f32 / 8.0 * std::f32::consts::TAU;
            Point::new(Vec3::new(a.cos() * 2.5, 1.5, a.sin() * 2.5), Vec4::new(1.0, 0.9, 0.4, 1.0))
        })
        .collect();

    let mip_timer = PerfTimer::new("mipmap generation");
    let texture = MipmapTask::spawn(Texture::checkerboard(
        256,
        32,
        [200, 200, 200, 255],
        [60, 60, 70, 255],
    )?)
    .wait()?;
    println!(
        "Texture: {} levels in {:.2}ms",
        texture.level_count(),
        mip_timer.elapsed().as_secs_f64() * 1000.0
    );
    let textured = TexturedShader::new(Arc::new(texture));
    let colored = VertexColorShader::default();

    let aspect = WIDTH as f32 / HEIGHT as f32;
    let projection = Mat4::perspective_rh_gl(60f32.to_radians(), aspect, 0.1, 100.0);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
    let view_proj = projection * view;

    let run_start = Instant::now();

    for frame in 0..frames {
        let frame_start = Instant::now();
        renderer.clear(Vec4::new(0.53, 0.81, 0.92, 1.0));

        renderer.draw_mesh_textured(&floor, &textured, &view_proj);

        let model = Mat4::from_rotation_y(frame as f32 * 0.03) * Mat4::from_rotation_x(0.4);
        let mvp = view_proj * model;
        renderer.draw_mesh_textured(&cube, &colored, &mvp);
        renderer.draw_mesh_wireframe(&cube, mvp, renderer.config().wireframe_color);

        renderer.draw_lines(&axes(), view_proj);
        renderer.draw_points(&points, view_proj);

        let frame_time = frame_start.elapsed();
        if frame_time.as_millis() > 16 {
            log::warn!("frame {} took {:.2}ms (> 16ms)", frame, frame_time.as_secs_f64() * 1000.0);
        }
    }

    println!("Last frame: {:?}", renderer.stats());
    if frames > 0 {
        println!(
            "Average frame: {:.2}ms",
            run_start.elapsed().as_secs_f64() * 1000.0 / frames as f64
        );
    }
    renderer.perf().print_summary();

    #[cfg(feature = "profiling")]
    FUNCTION_COUNTERS.snapshot().print_report();

    if let Some(path) = output {
        match write_ppm(&path, &renderer) {
            Ok(()) => println!("Wrote {}", path),
            Err(err) => log::error!("failed to write {}: {}", path, err),
        }
    }

    Ok(())
}
