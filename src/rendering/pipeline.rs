/// Per-pixel pipeline for covered quad pixels
///
/// Depth-only pass: depth test and write for every covered pixel, no shading.
/// Shading pass: varyings for all four pixels, quad derivatives, then for
/// each covered pixel the depth test, fragment shader, clamp, optional
/// straight-alpha blend and the color/depth write.
///
/// Depth is compared before the fragment shader runs but only written once
/// the fragment survives it, so discarded fragments leave no trace.
use super::depth::DepthFunc;
use super::framebuffer::{pack_rgba, unpack_rgba, FrameTile};
use super::memory::VaryingsPool;
use super::rasterizer::{PixelQuadContext, TriangleSetup};
use super::shader::{FragmentInput, Shader};
use crate::config::RenderConfig;
use glam::Vec4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RasterPass {
    /// Early-Z pre-pass: depth test and write only.
    DepthOnly,
    Shading,
}

/// Fixed-function state for one pass of one draw call.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PixelState {
    pub depth_test: bool,
    pub depth_mask: bool,
    pub depth_func: DepthFunc,
    pub blend: bool,
}

impl PixelState {
    /// State for `pass`, given whether a depth pre-pass runs first.
    ///
    /// After a pre-pass the depth buffer already holds the nearest surface,
    /// so shading re-tests with `Equal` and leaves depth untouched.
    pub fn for_pass(config: &RenderConfig, mesh_alpha_blend: bool, pass: RasterPass, prepass: bool) -> Self {
        let base = Self {
            depth_test: config.depth_test,
            depth_mask: config.depth_mask,
            depth_func: config.depth_func,
            blend: config.blend && mesh_alpha_blend,
        };
        match pass {
            RasterPass::DepthOnly => Self { blend: false, ..base },
            RasterPass::Shading if prepass => Self {
                depth_func: DepthFunc::Equal,
                depth_mask: false,
                ..base
            },
            RasterPass::Shading => base,
        }
    }

    /// Depth test against the stored value without touching the buffer.
    #[inline]
    pub fn depth_passes(&self, tile: &FrameTile<'_>, x: usize, y: usize, depth: f32) -> bool {
        if !self.depth_test {
            return true;
        }
        match tile.depth(x, y) {
            Some(stored) => self.depth_func.test(depth, stored),
            None => false,
        }
    }

    /// Store `depth` for a fragment that passed the test, when masked in.
    #[inline]
    pub fn write_depth(&self, tile: &mut FrameTile<'_>, x: usize, y: usize, depth: f32) {
        if self.depth_test && self.depth_mask {
            tile.set_depth(x, y, depth);
        }
    }

    /// `depth_passes` followed by `write_depth`, for paths without a
    /// fragment shader.
    #[inline]
    pub fn depth_test_and_write(&self, tile: &mut FrameTile<'_>, x: usize, y: usize, depth: f32) -> bool {
        if !self.depth_passes(tile, x, y, depth) {
            return false;
        }
        self.write_depth(tile, x, y, depth);
        true
    }
}

/// Counts gathered by one tile task.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TileStats {
    pub quads_tested: u64,
    pub quads_covered: u64,
    pub depth_passed: u64,
    pub depth_failed: u64,
    pub fragments_shaded: u64,
    pub fragments_discarded: u64,
}

impl TileStats {
    pub fn merge(&mut self, other: &TileStats) {
        self.quads_tested += other.quads_tested;
        self.quads_covered += other.quads_covered;
        self.depth_passed += other.depth_passed;
        self.depth_failed += other.depth_failed;
        self.fragments_shaded += other.fragments_shaded;
        self.fragments_discarded += other.fragments_discarded;
    }
}

/// Straight-alpha "over": `src·a + dst·(1 − a)` for color, and
/// `a + dst.a·(1 − a)` for the resulting alpha.
#[inline]
pub fn blend(src: Vec4, dst: Vec4) -> Vec4 {
    let a = src.w;
    let rgb = src.truncate() * a + dst.truncate() * (1.0 - a);
    rgb.extend(a + dst.w * (1.0 - a))
}

pub fn depth_prepass_quad<S: Shader>(
    ctx: &PixelQuadContext<S>,
    tile: &mut FrameTile<'_>,
    state: &PixelState,
    stats: &mut TileStats,
) {
    for i in 0..4 {
        if !ctx.inside[i] {
            continue;
        }
        let (x, y) = ctx.pixels[i];
        if state.depth_test_and_write(tile, x, y, ctx.depth[i]) {
            stats.depth_passed += 1;
        } else {
            stats.depth_failed += 1;
        }
    }
}

pub fn shade_quad<S: Shader>(
    ctx: &mut PixelQuadContext<S>,
    setup: &TriangleSetup,
    pool: &VaryingsPool,
    uniforms: &S::Uniforms,
    tile: &mut FrameTile<'_>,
    state: &PixelState,
    stats: &mut TileStats,
) {
    ctx.interpolate(setup, pool);
    let (ddx, ddy) = ctx.derivatives();

    for i in 0..4 {
        if !ctx.inside[i] {
            continue;
        }
        let (x, y) = ctx.pixels[i];
        if !state.depth_passes(tile, x, y, ctx.depth[i]) {
            stats.depth_failed += 1;
            continue;
        }
        stats.depth_passed += 1;

        let input = FragmentInput {
            frag_coord: Vec4::new(ctx.positions[i].x, ctx.positions[i].y, ctx.depth[i], ctx.inv_w[i]),
            front_facing: setup.front_facing,
            varyings: ctx.read_varyings(i),
            ddx,
            ddy,
        };
        let out = ctx.shader.fragment(&input, uniforms);
        stats.fragments_shaded += 1;
        if out.discard {
            stats.fragments_discarded += 1;
            continue;
        }

        let mut color = out.color.clamp(Vec4::ZERO, Vec4::ONE);
        if state.blend {
            let dst = tile.color(x, y).map(unpack_rgba).unwrap_or(Vec4::ZERO);
            color = blend(color, dst);
        }
        state.write_depth(tile, x, y, ctx.depth[i]);
        tile.set_color(x, y, pack_rgba(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::buffer::BufferLayout;
    use crate::rendering::framebuffer::FrameBuffer;

    #[test]
    fn half_alpha_red_over_blue() {
        let out = blend(Vec4::new(1.0, 0.0, 0.0, 0.5), Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(out, Vec4::new(0.5, 0.0, 0.5, 1.0));
        assert_eq!(pack_rgba(out), [127, 0, 127, 255]);
    }

    #[test]
    fn opaque_source_replaces_destination() {
        let out = blend(Vec4::new(0.2, 0.4, 0.6, 1.0), Vec4::new(1.0, 1.0, 1.0, 1.0));
        assert!(out.abs_diff_eq(Vec4::new(0.2, 0.4, 0.6, 1.0), 1e-6));
    }

    #[test]
    fn pass_state_after_prepass() {
        let config = RenderConfig {
            early_z: true,
            ..RenderConfig::default()
        };
        let pre = PixelState::for_pass(&config, true, RasterPass::DepthOnly, true);
        assert!(!pre.blend);
        assert_eq!(pre.depth_func, DepthFunc::Greater);

        let shade = PixelState::for_pass(&config, true, RasterPass::Shading, true);
        assert_eq!(shade.depth_func, DepthFunc::Equal);
        assert!(!shade.depth_mask);
        assert!(shade.blend);

        let plain = PixelState::for_pass(&config, false, RasterPass::Shading, false);
        assert_eq!(plain.depth_func, DepthFunc::Greater);
        assert!(plain.depth_mask);
        assert!(!plain.blend);
    }

    #[test]
    fn depth_write_follows_test_and_mask() {
        let mut fb = FrameBuffer::new(4, 4, BufferLayout::Linear, BufferLayout::Tiled).unwrap();
        fb.clear([0; 4], 0.0);
        let mut state = PixelState {
            depth_test: true,
            depth_mask: true,
            depth_func: DepthFunc::Greater,
            blend: false,
        };
        {
            let mut tile = fb.full_tile_mut();
            assert!(state.depth_test_and_write(&mut tile, 1, 1, 0.5));
            assert!(!state.depth_test_and_write(&mut tile, 1, 1, 0.25));
            state.depth_mask = false;
            assert!(state.depth_test_and_write(&mut tile, 1, 1, 0.75));
        }
        assert_eq!(fb.depth_at(1, 1), Some(0.5));
    }

    #[test]
    fn depth_passes_only_reads() {
        let mut fb = FrameBuffer::new(4, 4, BufferLayout::Linear, BufferLayout::Tiled).unwrap();
        fb.clear([0; 4], 0.0);
        let state = PixelState {
            depth_test: true,
            depth_mask: true,
            depth_func: DepthFunc::Greater,
            blend: false,
        };
        {
            let mut tile = fb.full_tile_mut();
            assert!(state.depth_passes(&tile, 2, 2, 0.5));
            assert!(state.depth_passes(&tile, 2, 2, 0.5));
            state.write_depth(&mut tile, 2, 2, 0.5);
            assert!(!state.depth_passes(&tile, 2, 2, 0.25));
        }
        assert_eq!(fb.depth_at(2, 2), Some(0.5));

        let off = PixelState { depth_test: false, ..state };
        let mut tile = fb.full_tile_mut();
        off.write_depth(&mut tile, 2, 2, 0.9);
        assert_eq!(tile.depth(2, 2), Some(0.5));
    }
}
