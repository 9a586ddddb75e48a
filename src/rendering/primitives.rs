/// Line and point paths
///
/// Both run serially over the whole framebuffer. Lines are clipped as
/// segments in clip space, mapped to the window and walked with Bresenham,
/// interpolating depth linearly per step. Points are dropped unless fully
/// inside the frustum and drawn as squares at a constant depth.
use super::clipper::clip_segment;
use super::framebuffer::{pack_rgba, Rgba};
use super::framebuffer::FrameTile;
use super::pipeline::PixelState;
use super::vertex::ClipMask;
use super::viewport::{DepthRange, Viewport};
use glam::{Mat4, Vec3, Vec4};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Line {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Vec4,
}

impl Line {
    pub fn new(start: Vec3, end: Vec3, color: Vec4) -> Self {
        Self { start, end, color }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub position: Vec3,
    pub color: Vec4,
}

impl Point {
    pub fn new(position: Vec3, color: Vec4) -> Self {
        Self { position, color }
    }
}

/// Shared per-call state of the line and point paths.
pub struct PrimitiveContext<'a> {
    pub transform: Mat4,
    pub viewport: &'a Viewport,
    pub depth_range: &'a DepthRange,
    pub state: PixelState,
}

/// Clip, map and draw one line. Returns the number of pixels written.
pub fn draw_line(tile: &mut FrameTile<'_>, line: &Line, ctx: &PrimitiveContext<'_>) -> u64 {
    let a = ctx.transform * line.start.extend(1.0);
    let b = ctx.transform * line.end.extend(1.0);

    let Some((t0, t1)) = clip_segment(a, b) else {
        log::trace!("line {:?} -> {:?} clipped away", line.start, line.end);
        return 0;
    };

    let sa = ctx.viewport.screen_map(a.lerp(b, t0), ctx.depth_range);
    let sb = ctx.viewport.screen_map(a.lerp(b, t1), ctx.depth_range);
    rasterize_line(tile, sa.truncate(), sb.truncate(), pack_rgba(line.color), &ctx.state)
}

/// Bresenham walk between two window positions (x, y, depth).
pub fn rasterize_line(tile: &mut FrameTile<'_>, a: Vec3, b: Vec3, color: Rgba, state: &PixelState) -> u64 {
    let (_, _, x_end, y_end) = tile.bounds();
    if x_end == 0 || y_end == 0 {
        return 0;
    }
    let clamp_x = |v: f32| (v.floor() as i64).clamp(0, x_end as i64 - 1);
    let clamp_y = |v: f32| (v.floor() as i64).clamp(0, y_end as i64 - 1);

    let (x0, y0) = (clamp_x(a.x), clamp_y(a.y));
    let (x1, y1) = (clamp_x(b.x), clamp_y(b.y));

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let steps = dx.max(-dy).max(1) as f32;

    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    let mut step = 0u32;
    let mut written = 0;

    loop {
        let depth = a.z + (b.z - a.z) * (step as f32 / steps);
        let (px, py) = (x as usize, y as usize);
        if state.depth_test_and_write(tile, px, py, depth) {
            tile.set_color(px, py, color);
            written += 1;
        }

        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        step += 1;
    }

    written
}

/// Draw one point as a `size × size` square. Returns the number of pixels
/// written.
pub fn draw_point(tile: &mut FrameTile<'_>, point: &Point, size: usize, ctx: &PrimitiveContext<'_>) -> u64 {
    let clip = ctx.transform * point.position.extend(1.0);
    if !ClipMask::of(clip).is_empty() {
        return 0;
    }
    let screen = ctx.viewport.screen_map(clip, ctx.depth_range);
    rasterize_point(tile, screen.truncate(), size, pack_rgba(point.color), &ctx.state)
}

/// Square of `size` pixels centred on a window position (x, y, depth).
pub fn rasterize_point(tile: &mut FrameTile<'_>, center: Vec3, size: usize, color: Rgba, state: &PixelState) -> u64 {
    let (x0, y0, x1, y1) = tile.bounds();
    let half = size as f32 * 0.5;
    let left = (center.x - half).round() as i64;
    let bottom = (center.y - half).round() as i64;

    let min_x = left.max(x0 as i64);
    let min_y = bottom.max(y0 as i64);
    let max_x = (left + size as i64).min(x1 as i64);
    let max_y = (bottom + size as i64).min(y1 as i64);

    let mut written = 0;
    for y in min_y..max_y {
        for x in min_x..max_x {
            let (px, py) = (x as usize, y as usize);
            if state.depth_test_and_write(tile, px, py, center.z) {
                tile.set_color(px, py, color);
                written += 1;
            }
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::buffer::BufferLayout;
    use crate::rendering::depth::DepthFunc;
    use crate::rendering::framebuffer::FrameBuffer;

    const RED: Rgba = [255, 0, 0, 255];

    fn state(depth_test: bool) -> PixelState {
        PixelState {
            depth_test,
            depth_mask: true,
            depth_func: DepthFunc::Greater,
            blend: false,
        }
    }

    fn framebuffer() -> FrameBuffer {
        let mut fb = FrameBuffer::new(16, 16, BufferLayout::Tiled, BufferLayout::Morton).unwrap();
        fb.clear([0; 4], 0.0);
        fb
    }

    #[test]
    fn horizontal_line_covers_every_column() {
        let mut fb = framebuffer();
        let written = rasterize_line(
            &mut fb.full_tile_mut(),
            Vec3::new(2.5, 3.5, 0.5),
            Vec3::new(9.5, 3.5, 0.5),
            RED,
            &state(true),
        );
        assert_eq!(written, 8);
        for x in 2..=9 {
            assert_eq!(fb.color_at(x, 3), Some(RED));
        }
        assert_eq!(fb.color_at(10, 3), Some([0; 4]));
    }

    #[test]
    fn diagonal_line_interpolates_depth() {
        let mut fb = framebuffer();
        let always = PixelState {
            depth_func: DepthFunc::Always,
            ..state(true)
        };
        rasterize_line(
            &mut fb.full_tile_mut(),
            Vec3::new(0.5, 0.5, 0.0),
            Vec3::new(4.5, 4.5, 1.0),
            RED,
            &always,
        );
        for i in 0..=4 {
            assert_eq!(fb.color_at(i, i), Some(RED));
            let d = fb.depth_at(i, i).unwrap();
            assert!((d - i as f32 / 4.0).abs() < 1e-6, "{i}: {d}");
        }
    }

    #[test]
    fn point_square_respects_depth() {
        let mut fb = framebuffer();
        let written = rasterize_point(&mut fb.full_tile_mut(), Vec3::new(8.0, 8.0, 0.5), 4, RED, &state(true));
        assert_eq!(written, 16);
        assert_eq!(fb.color_at(6, 6), Some(RED));
        assert_eq!(fb.color_at(9, 9), Some(RED));
        assert_eq!(fb.color_at(10, 10), Some([0; 4]));

        // Farther point at the same spot fails the Greater test.
        let written = rasterize_point(&mut fb.full_tile_mut(), Vec3::new(8.0, 8.0, 0.25), 4, [0, 255, 0, 255], &state(true));
        assert_eq!(written, 0);
    }

    #[test]
    fn point_outside_frustum_is_dropped() {
        let mut fb = framebuffer();
        let viewport = Viewport::full(16, 16);
        let depth_range = DepthRange::reversed();
        let ctx = PrimitiveContext {
            transform: Mat4::IDENTITY,
            viewport: &viewport,
            depth_range: &depth_range,
            state: state(true),
        };
        let outside = Point::new(Vec3::new(1.5, 0.0, 0.0), Vec4::ONE);
        assert_eq!(draw_point(&mut fb.full_tile_mut(), &outside, 2, &ctx), 0);
        let inside = Point::new(Vec3::new(0.0, 0.0, 0.0), Vec4::ONE);
        assert_eq!(draw_point(&mut fb.full_tile_mut(), &inside, 2, &ctx), 4);
    }

    #[test]
    fn line_is_clipped_to_frustum() {
        let mut fb = framebuffer();
        let viewport = Viewport::full(16, 16);
        let depth_range = DepthRange::reversed();
        let ctx = PrimitiveContext {
            transform: Mat4::IDENTITY,
            viewport: &viewport,
            depth_range: &depth_range,
            state: state(false),
        };
        // Runs from x = -3 to x = 3 in NDC across the middle row.
        let line = Line::new(Vec3::new(-3.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0), Vec4::ONE);
        let written = draw_line(&mut fb.full_tile_mut(), &line, &ctx);
        assert_eq!(written, 16);

        let gone = Line::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 0.5, 0.0), Vec4::ONE);
        assert_eq!(draw_line(&mut fb.full_tile_mut(), &gone, &ctx), 0);
    }
}
