//! Differential fuzzing of the tiled quad rasterizer against a direct
//! per-pixel oracle, plus checks of the values handed to fragment shaders.
use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use soft_raster::*;
use std::sync::{Arc, Mutex};

const SCREEN_WIDTH: usize = 80;
const SCREEN_HEIGHT: usize = 64;

fn edge_function(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b - a).perp_dot(p - a)
}

fn ndc_to_screen(ndc: Vec2) -> Vec2 {
    Vec2::new(
        (ndc.x + 1.0) * 0.5 * SCREEN_WIDTH as f32,
        (ndc.y + 1.0) * 0.5 * SCREEN_HEIGHT as f32,
    )
}

/// Plain edge-function coverage of every pixel centre. Pixels whose centre
/// lies within `tolerance` of an edge are reported separately, since either
/// answer is acceptable there.
fn oracle_coverage(tri: [Vec2; 3], tolerance: f32) -> (Vec<bool>, Vec<bool>) {
    let [a, b, c] = tri.map(ndc_to_screen);
    let area = edge_function(a, b, c);
    let mut inside = vec![false; SCREEN_WIDTH * SCREEN_HEIGHT];
    let mut ambiguous = vec![false; SCREEN_WIDTH * SCREEN_HEIGHT];

    for y in 0..SCREEN_HEIGHT {
        for x in 0..SCREEN_WIDTH {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let w = Vec3::new(edge_function(b, c, p), edge_function(c, a, p), edge_function(a, b, p)) / area;
            let i = y * SCREEN_WIDTH + x;
            inside[i] = w.min_element() >= 0.0;
            ambiguous[i] = w.min_element().abs() < tolerance;
        }
    }
    (inside, ambiguous)
}

fn render_coverage(r: &mut SoftRenderer, tri: [Vec2; 3]) -> Vec<bool> {
    r.clear(Vec4::new(0.0, 0.0, 0.0, 1.0));
    let mesh = Mesh::new(tri.iter().map(|p| Vertex::at(p.extend(0.0))).collect(), vec![0, 1, 2])
        .unwrap()
        .with_double_sided(true);
    r.draw_mesh_textured(&mesh, &FlatColorShader::new(Vec4::ONE), &Mat4::IDENTITY);
    r.get_frame_color()
        .to_linear(false)
        .into_iter()
        .map(|c| c == [255; 4])
        .collect()
}

#[test]
fn quad_rasterizer_matches_oracle_coverage() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let config = RenderConfig {
        thread_count: 4,
        tile_size: 16,
        ..RenderConfig::default()
    };
    let mut r = SoftRenderer::with_config(SCREEN_WIDTH, SCREEN_HEIGHT, 0.0, 1.0, config).unwrap();

    let mut checked = 0;
    for iteration in 0..200 {
        let tri = [(); 3].map(|_| Vec2::new(rng.gen_range(-0.98..0.98), rng.gen_range(-0.98..0.98)));
        let [a, b, c] = tri.map(ndc_to_screen);
        if edge_function(a, b, c).abs() < 1.0 {
            continue;
        }

        let (expected, ambiguous) = oracle_coverage(tri, 1e-4);
        let actual = render_coverage(&mut r, tri);
        for i in 0..expected.len() {
            if ambiguous[i] {
                continue;
            }
            assert_eq!(
                actual[i],
                expected[i],
                "iteration {iteration}: pixel ({}, {}) of {:?}",
                i % SCREEN_WIDTH,
                i / SCREEN_WIDTH,
                tri
            );
        }
        checked += 1;
    }
    assert!(checked > 150);
}

#[test]
fn coverage_outside_the_frame_is_clipped_cleanly() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut r = SoftRenderer::create(SCREEN_WIDTH, SCREEN_HEIGHT, 0.0, 1.0).unwrap();

    for _ in 0..100 {
        // Large triangles reaching well past the frustum on every side.
        let tri = [(); 3].map(|_| Vec2::new(rng.gen_range(-4.0..4.0), rng.gen_range(-4.0..4.0)));
        let [a, b, c] = tri.map(ndc_to_screen);
        if edge_function(a, b, c).abs() < 1.0 {
            continue;
        }
        let (expected, ambiguous) = oracle_coverage(tri, 1e-3);
        let actual = render_coverage(&mut r, tri);
        let mismatches = (0..expected.len())
            .filter(|&i| !ambiguous[i] && actual[i] != expected[i])
            .count();
        // Fan triangles from the clipper share edges; a centre lying on one
        // can round out of both.
        assert!(mismatches <= 2, "{mismatches} mismatches for {:?}", tri);
    }
}

/// Places each vertex on its NDC `x, y` while giving it its own clip `w`
/// (taken from `normal.x`), and records the interpolated `tex_coord.x`.
#[derive(Clone, Default)]
struct PerspectiveProbe {
    seen: Arc<Mutex<Vec<(Vec4, f32)>>>,
}

impl Shader for PerspectiveProbe {
    type Uniforms = ();
    type Varyings = f32;

    fn vertex(&self, vertex: &Vertex, _: &()) -> (Vec4, f32) {
        let w = vertex.normal.x;
        let p = vertex.position;
        (Vec4::new(p.x * w, p.y * w, 0.0, w), vertex.tex_coord.x)
    }

    fn fragment(&mut self, input: &FragmentInput<f32>, _: &()) -> FragmentOutput {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((input.frag_coord, input.varyings));
        }
        FragmentOutput::color(Vec4::ONE)
    }
}

#[test]
fn varyings_are_perspective_correct() {
    let mut r = SoftRenderer::create(32, 32, 0.0, 1.0).unwrap();
    r.clear(Vec4::ZERO);
    let (w0, w1, w2) = (1.0, 2.0, 4.0);
    let vertex = |x: f32, y: f32, w: f32, value: f32| {
        Vertex::new(Vec3::new(x, y, 0.0), Vec2::new(value, 0.0), Vec3::new(w, 0.0, 0.0))
    };
    let mesh = Mesh::new(
        vec![vertex(-1.0, -1.0, w0, 0.0), vertex(1.0, -1.0, w1, 1.0), vertex(-1.0, 1.0, w2, 0.0)],
        vec![0, 1, 2],
    )
    .unwrap();
    let probe = PerspectiveProbe::default();
    r.draw_mesh_textured(&mesh, &probe, &());

    let seen = probe.seen.lock().unwrap();
    assert!(seen.len() > 400);
    for &(frag_coord, value) in seen.iter() {
        // Screen-space weights of the pixel centre.
        let b1 = frag_coord.x / 32.0;
        let b2 = frag_coord.y / 32.0;
        let b0 = 1.0 - b1 - b2;
        let expected = (b1 / w1) / (b0 / w0 + b1 / w1 + b2 / w2);
        assert!((value - expected).abs() < 1e-4, "{frag_coord:?}: {value} vs {expected}");
    }
    // Affine interpolation would have produced b1.
    assert!(seen.iter().any(|&(frag_coord, value)| (value - frag_coord.x / 32.0).abs() > 0.05));
}

#[test]
fn quad_derivatives_are_pixel_steps() {
    let (width, height) = (64usize, 32usize);
    let mut r = SoftRenderer::create(width, height, 0.0, 1.0).unwrap();
    r.clear(Vec4::ZERO);

    // uv spans [0, 1] over the whole target, so one pixel is 1/width in u
    // and 1/height in v.
    let uv = |x: f32, y: f32| Vec2::new((x + 1.0) * 0.5, (y + 1.0) * 0.5);
    let corner = |x: f32, y: f32| Vertex::new(Vec3::new(x, y, 0.0), uv(x, y), Vec3::X);
    let mesh = Mesh::new(
        vec![corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0)],
        vec![0, 1, 2, 0, 2, 3],
    )
    .unwrap();

    #[derive(Clone, Default)]
    struct UvProbe {
        seen: Arc<Mutex<Vec<(Vec2, Vec2)>>>,
    }
    impl Shader for UvProbe {
        type Uniforms = ();
        type Varyings = Vec2;

        fn vertex(&self, vertex: &Vertex, _: &()) -> (Vec4, Vec2) {
            (vertex.position.extend(1.0), vertex.tex_coord)
        }

        fn fragment(&mut self, input: &FragmentInput<Vec2>, _: &()) -> FragmentOutput {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push((input.ddx, input.ddy));
            }
            FragmentOutput::discard()
        }
    }

    let probe = UvProbe::default();
    r.draw_mesh_textured(&mesh, &probe, &());
    assert_eq!(r.stats().fragments_discarded, r.stats().fragments_shaded);

    let seen = probe.seen.lock().unwrap();
    assert!(seen.len() >= width * height);
    let ddx = Vec2::new(1.0 / width as f32, 0.0);
    let ddy = Vec2::new(0.0, 1.0 / height as f32);
    for &(dx, dy) in seen.iter() {
        assert!(dx.abs_diff_eq(ddx, 1e-5), "{dx:?}");
        assert!(dy.abs_diff_eq(ddy, 1e-5), "{dy:?}");
    }

    // Discarded fragments leave the frame untouched.
    assert!(r.frame_rgba(false).iter().all(|&b| b == 0));
}
