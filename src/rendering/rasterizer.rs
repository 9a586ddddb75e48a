/// Triangle rasterization in 2×2 pixel quads
///
/// Key Design Principles:
/// 1. Setup once per face: flattened screen positions, per-vertex depth and
///    1/w, bounding box inflated by half a pixel
/// 2. Quads: pixels are visited in 2×2 blocks aligned to even coordinates so
///    varying derivatives are plain differences inside the quad
/// 3. Tiles: a face is rasterized tile by tile; each tile belongs to one task
///    and only pixels inside the tile are ever reported as covered
/// 4. Perspective: screen-space barycentrics are corrected with per-vertex
///    1/w before depth and varyings are interpolated
use super::framebuffer::FrameTile;
use super::interpolate::interpolate_varyings;
use super::memory::{AlignedFloats, VaryingsPool};
use super::pipeline::{self, PixelState, RasterPass, TileStats};
use super::shader::{Shader, Varyings};
use super::vertex::VertexHolder;
use glam::{Vec2, Vec3, Vec4};

/// `|u.z|` below this marks a triangle as degenerate.
pub const DEGENERATE_EPSILON: f32 = 1e-6;

/// Inclusive pixel rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

impl PixelRect {
    /// Intersection with the half-open rectangle `[x0, x1) × [y0, y1)`.
    #[inline]
    pub fn clip_to(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> Option<PixelRect> {
        if x1 == 0 || y1 == 0 {
            return None;
        }
        let rect = PixelRect {
            min_x: self.min_x.max(x0),
            min_y: self.min_y.max(y0),
            max_x: self.max_x.min(x1 - 1),
            max_y: self.max_y.min(y1 - 1),
        };
        (rect.min_x <= rect.max_x && rect.min_y <= rect.max_y).then_some(rect)
    }
}

/// Per-face data shared by every tile the face touches.
#[derive(Copy, Clone, Debug)]
pub struct TriangleSetup {
    /// Window-space vertex positions.
    pub screen: [Vec2; 3],
    /// Window-space depth per vertex.
    pub depth: Vec3,
    /// Reciprocal clip-space w per vertex.
    pub inv_w: Vec3,
    /// Varyings pool slot per vertex.
    pub varyings: [usize; 3],
    pub front_facing: bool,
    /// z component of the barycentric cross product; independent of the
    /// sample point.
    u_z: f32,
}

impl TriangleSetup {
    /// Build from three mapped vertex holders (`screen` = x, y, depth, 1/w).
    pub fn new(vertices: [&VertexHolder; 3], front_facing: bool) -> Self {
        Self::from_screen(
            [vertices[0].screen, vertices[1].screen, vertices[2].screen],
            [vertices[0].varyings, vertices[1].varyings, vertices[2].varyings],
            front_facing,
        )
    }

    pub fn from_screen(screen: [Vec4; 3], varyings: [usize; 3], front_facing: bool) -> Self {
        let pos = [screen[0].truncate().truncate(), screen[1].truncate().truncate(), screen[2].truncate().truncate()];
        let e1 = pos[1] - pos[0];
        let e2 = pos[2] - pos[0];
        Self {
            screen: pos,
            depth: Vec3::new(screen[0].z, screen[1].z, screen[2].z),
            inv_w: Vec3::new(screen[0].w, screen[1].w, screen[2].w),
            varyings,
            front_facing,
            u_z: e2.x * e1.y - e1.x * e2.y,
        }
    }

    /// Twice the signed screen-space area; positive for counter-clockwise
    /// winding with y up.
    #[inline]
    pub fn signed_area(&self) -> f32 {
        (self.screen[1] - self.screen[0]).perp_dot(self.screen[2] - self.screen[0])
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.u_z.abs() < DEGENERATE_EPSILON
    }

    /// Screen-space barycentric coordinates of `p`, via the cross product of
    /// the x and y edge vectors. `None` for degenerate triangles.
    #[inline]
    pub fn barycentric(&self, p: Vec2) -> Option<Vec3> {
        if self.is_degenerate() {
            return None;
        }
        let [v0, v1, v2] = self.screen;
        let u = Vec3::new(v2.x - v0.x, v1.x - v0.x, v0.x - p.x)
            .cross(Vec3::new(v2.y - v0.y, v1.y - v0.y, v0.y - p.y));
        Some(Vec3::new(1.0 - (u.x + u.y) / u.z, u.y / u.z, u.x / u.z))
    }

    /// Pixel rectangle covering the triangle, inflated by half a pixel and
    /// clamped to a `width × height` target. `None` when fully off-target.
    pub fn bounding_box(&self, width: usize, height: usize) -> Option<PixelRect> {
        let [a, b, c] = self.screen;
        let lo = a.min(b).min(c) - Vec2::splat(0.5);
        let hi = a.max(b).max(c) + Vec2::splat(0.5);

        if !(lo.is_finite() && hi.is_finite()) || hi.x < 0.0 || hi.y < 0.0 {
            return None;
        }
        if lo.x >= width as f32 || lo.y >= height as f32 {
            return None;
        }

        let rect = PixelRect {
            min_x: lo.x.max(0.0).floor() as usize,
            min_y: lo.y.max(0.0).floor() as usize,
            max_x: (hi.x.ceil() as usize).min(width - 1),
            max_y: (hi.y.ceil() as usize).min(height - 1),
        };
        (rect.min_x <= rect.max_x && rect.min_y <= rect.max_y).then_some(rect)
    }
}

/// A pixel is inside when no barycentric component is negative.
#[inline(always)]
pub fn is_inside(bc: Vec3) -> bool {
    bc.x >= 0.0 && bc.y >= 0.0 && bc.z >= 0.0
}

/// Divide screen-space weights by each vertex's w (multiply by 1/w) and
/// renormalize so they sum to one.
#[inline]
pub fn perspective_correct(bc: Vec3, inv_w: Vec3) -> Vec3 {
    let weighted = bc * inv_w;
    let sum = weighted.x + weighted.y + weighted.z;
    if sum.abs() <= f32::MIN_POSITIVE {
        return bc;
    }
    weighted / sum
}

/// Transient state of one 2×2 pixel block.
///
/// Pixel `i` is at `(x + (i & 1), y + (i >> 1))`: 0 and 1 share a row, 2 and 3
/// are the row above. The context owns the tile task's shader clone and an
/// aligned block holding varyings for all four pixels.
pub struct PixelQuadContext<S: Shader> {
    pub pixels: [(usize, usize); 4],
    pub positions: [Vec2; 4],
    /// Perspective-corrected barycentrics.
    pub barycentric: [Vec3; 4],
    pub inside: [bool; 4],
    pub depth: [f32; 4],
    pub inv_w: [f32; 4],
    varyings: AlignedFloats,
    stride: usize,
    size: usize,
    pub shader: S,
}

impl<S: Shader> PixelQuadContext<S> {
    pub fn new(shader: S, stride: usize) -> Self {
        let size = S::Varyings::SIZE;
        debug_assert!(stride >= size);
        Self {
            pixels: [(0, 0); 4],
            positions: [Vec2::ZERO; 4],
            barycentric: [Vec3::ZERO; 4],
            inside: [false; 4],
            depth: [0.0; 4],
            inv_w: [0.0; 4],
            varyings: AlignedFloats::zeroed(stride * 4),
            stride,
            size,
            shader,
        }
    }

    /// Evaluate coverage, depth and 1/w for the quad whose lower-left pixel
    /// is `(x, y)`. Pixels outside `tile` never count as inside. Returns
    /// whether any pixel is covered.
    pub fn setup_quad(
        &mut self,
        setup: &TriangleSetup,
        x: usize,
        y: usize,
        tile: &FrameTile<'_>,
    ) -> bool {
        let mut any = false;
        for i in 0..4 {
            let (px, py) = (x + (i & 1), y + (i >> 1));
            let pos = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
            let Some(raw) = setup.barycentric(pos) else {
                self.inside = [false; 4];
                return false;
            };
            let corrected = perspective_correct(raw, setup.inv_w);

            self.pixels[i] = (px, py);
            self.positions[i] = pos;
            self.barycentric[i] = corrected;
            self.inside[i] = is_inside(raw) && tile.contains(px, py);
            self.depth[i] = corrected.dot(setup.depth);
            self.inv_w[i] = corrected.dot(setup.inv_w);
            any |= self.inside[i];
        }
        any
    }

    /// Interpolate varyings for all four pixels, covered or not, so that
    /// derivatives across the quad stay meaningful.
    pub fn interpolate(&mut self, setup: &TriangleSetup, pool: &VaryingsPool) {
        if self.size == 0 {
            return;
        }
        let v0 = pool.slot(setup.varyings[0]);
        let v1 = pool.slot(setup.varyings[1]);
        let v2 = pool.slot(setup.varyings[2]);
        let (stride, size) = (self.stride, self.size);
        let out = self.varyings.as_mut_slice();
        for i in 0..4 {
            let dst = &mut out[i * stride..i * stride + size];
            interpolate_varyings(v0, v1, v2, self.barycentric[i], dst);
        }
    }

    /// Interpolated varyings of pixel `i` as floats.
    #[inline]
    pub fn varyings(&self, i: usize) -> &[f32] {
        &self.varyings.as_slice()[i * self.stride..i * self.stride + self.size]
    }

    /// Typed varyings of pixel `i`.
    #[inline]
    pub fn read_varyings(&self, i: usize) -> S::Varyings {
        S::Varyings::read(self.varyings(i))
    }

    /// Coarse derivatives shared by the whole quad: pixel 1 minus pixel 0
    /// along x, pixel 2 minus pixel 0 along y.
    pub fn derivatives(&self) -> (S::Varyings, S::Varyings) {
        if self.size == 0 {
            return (S::Varyings::default(), S::Varyings::default());
        }
        let mut diff = [0.0f32; 2 * DERIVATIVE_SCRATCH];
        if self.size <= DERIVATIVE_SCRATCH {
            let (dx, dy) = diff.split_at_mut(DERIVATIVE_SCRATCH);
            self.difference(1, &mut dx[..self.size]);
            self.difference(2, &mut dy[..self.size]);
            return (S::Varyings::read(dx), S::Varyings::read(dy));
        }
        let mut dx = vec![0.0; self.size];
        let mut dy = vec![0.0; self.size];
        self.difference(1, &mut dx);
        self.difference(2, &mut dy);
        (S::Varyings::read(&dx), S::Varyings::read(&dy))
    }

    fn difference(&self, pixel: usize, out: &mut [f32]) {
        let base = self.varyings(0);
        let other = self.varyings(pixel);
        for ((o, &a), &b) in out.iter_mut().zip(base).zip(other) {
            *o = b - a;
        }
    }
}

/// Varying count handled without a heap allocation when taking derivatives.
const DERIVATIVE_SCRATCH: usize = 32;

/// Rasterize the listed faces into one tile, in list order.
#[allow(clippy::too_many_arguments)]
pub fn rasterize_tile<S: Shader>(
    tile: &mut FrameTile<'_>,
    faces: &[u32],
    setups: &[TriangleSetup],
    pool: &VaryingsPool,
    ctx: &mut PixelQuadContext<S>,
    uniforms: &S::Uniforms,
    state: &PixelState,
    pass: RasterPass,
) -> TileStats {
    let mut stats = TileStats::default();
    let (tx0, ty0, tx1, ty1) = tile.bounds();

    for &face in faces {
        let setup = &setups[face as usize];
        let Some(bbox) = setup.bounding_box(tx1, ty1) else {
            continue;
        };
        let Some(rect) = bbox.clip_to(tx0, ty0, tx1, ty1) else {
            continue;
        };

        // Tile origins are even, so even-aligned quads never leave the tile
        // on the low side.
        let mut y = rect.min_y & !1;
        while y <= rect.max_y {
            let mut x = rect.min_x & !1;
            while x <= rect.max_x {
                stats.quads_tested += 1;
                if ctx.setup_quad(setup, x, y, tile) {
                    stats.quads_covered += 1;
                    match pass {
                        RasterPass::DepthOnly => pipeline::depth_prepass_quad(ctx, tile, state, &mut stats),
                        RasterPass::Shading => {
                            pipeline::shade_quad(ctx, setup, pool, uniforms, tile, state, &mut stats)
                        }
                    }
                }
                x += 2;
            }
            y += 2;
        }
    }

    stats
}
