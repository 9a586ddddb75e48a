/// Renderer front end
///
/// A draw call runs in stages:
/// 1. Vertex: the shader's vertex function fills one varyings slot per mesh
///    vertex and yields a clip-space position
/// 2. Clip: faces are clipped against the frustum; synthesized vertices are
///    appended to the holder list and the varyings pool
/// 3. Map: vertices referenced by surviving faces go through the perspective
///    divide and viewport transform
/// 4. Cull/setup: winding decides facing; back faces are culled, degenerate
///    faces dropped, the rest get a `TriangleSetup` and are binned by tile
/// 5. Raster: one scoped task per non-empty tile replays its faces in
///    submission order, optionally after a depth-only pass
///
/// Lines, wireframes and points bypass the tile path and draw serially.
use super::buffer::Buffer;
use super::clipper::{ClipStats, Clipper};
use super::framebuffer::{pack_rgba, FrameBuffer, Rgba};
use super::memory::VaryingsPool;
use super::pipeline::{PixelState, RasterPass, TileStats};
use super::primitives::{self, Line, Point, PrimitiveContext};
use super::rasterizer::{rasterize_tile, PixelQuadContext, TriangleSetup};
use super::shader::{Shader, Varyings};
use super::thread_pool::ThreadPool;
use super::tiles::TileBins;
use super::vertex::{FaceHolder, Mesh, VertexHolder};
use super::viewport::{DepthRange, Viewport};
use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::perf::{PerfStats, FUNCTION_COUNTERS};
use crate::{count_add, count_call, perf_scope};
use glam::{Mat4, Vec4};
use std::sync::Mutex;
use std::time::Instant;

/// Drawing surface driven by the application.
pub trait Renderer: Sized {
    /// Allocate a `width × height` target whose depth values span
    /// `[near, far]`.
    fn create(width: usize, height: usize, near: f32, far: f32) -> Result<Self>;

    /// Reset color to `color` and depth to the far end of the range.
    fn clear(&mut self, color: Vec4);

    fn draw_mesh_textured<S: Shader>(&mut self, mesh: &Mesh, shader: &S, uniforms: &S::Uniforms);

    /// Draw the edges of every triangle as lines.
    fn draw_mesh_wireframe(&mut self, mesh: &Mesh, transform: Mat4, color: Vec4);

    fn draw_lines(&mut self, lines: &[Line], transform: Mat4);

    fn draw_points(&mut self, points: &[Point], transform: Mat4);

    /// Copy of the color buffer, still in its storage layout.
    fn get_frame_color(&self) -> Buffer<Rgba>;
}

/// Counts gathered since the last `clear`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u64,
    pub triangles_in: u64,
    /// Faces cut by at least one frustum plane.
    pub triangles_clipped: u64,
    /// Faces removed by the clipper.
    pub triangles_discarded: u64,
    pub triangles_culled: u64,
    pub triangles_rasterized: u64,
    pub tiles_dispatched: u64,
    pub fragments_shaded: u64,
    pub fragments_discarded: u64,
    pub line_pixels: u64,
    pub point_pixels: u64,
}

impl FrameStats {
    fn add_tiles(&mut self, tiles: &TileStats) {
        self.fragments_shaded += tiles.fragments_shaded;
        self.fragments_discarded += tiles.fragments_discarded;
    }
}

/// Depth range for `[near, far]`, swapped when reversed-Z is on.
fn depth_range_for(config: &RenderConfig, near: f32, far: f32) -> DepthRange {
    if config.reversed_z {
        DepthRange::new(far, near)
    } else {
        DepthRange::new(near, far)
    }
}

pub struct SoftRenderer {
    framebuffer: FrameBuffer,
    config: RenderConfig,
    pool: ThreadPool,
    viewport: Viewport,
    depth_range: DepthRange,
    clipper: Clipper,
    bins: TileBins,
    stats: FrameStats,
    perf: PerfStats,
}

impl SoftRenderer {
    pub fn with_config(width: usize, height: usize, near: f32, far: f32, config: RenderConfig) -> Result<Self> {
        config.validate()?;
        if !near.is_finite() || !far.is_finite() || near == far {
            return Err(RenderError::InvalidConfig(format!(
                "depth range [{near}, {far}] must be finite and non-empty"
            )));
        }

        let mut framebuffer = FrameBuffer::new(width, height, config.color_layout, config.depth_layout)?;
        let pool = ThreadPool::new(config.thread_count)?;
        let depth_range = depth_range_for(&config, near, far);
        framebuffer.clear([0, 0, 0, 255], depth_range.clear_value());

        log::info!(
            "soft renderer {}x{}: {} workers, {}px tiles, depth [{}, {}]",
            width,
            height,
            pool.thread_count(),
            config.tile_size,
            depth_range.near,
            depth_range.far
        );

        Ok(Self {
            framebuffer,
            viewport: Viewport::full(width, height),
            bins: TileBins::new(width, height, config.tile_size),
            config,
            pool,
            depth_range,
            clipper: Clipper::new(),
            stats: FrameStats::default(),
            perf: PerfStats::new(),
        })
    }

    /// Replace the configuration and clear the frame. The framebuffer is
    /// reallocated when a layout changes and the worker pool is rebuilt when
    /// the thread count changes.
    pub fn set_config(&mut self, config: RenderConfig) -> Result<()> {
        config.validate()?;
        let old = self.config;
        let (width, height) = (self.width(), self.height());

        if config.thread_count != old.thread_count {
            self.pool = ThreadPool::new(config.thread_count)?;
        }
        if config.color_layout != old.color_layout || config.depth_layout != old.depth_layout {
            self.framebuffer = FrameBuffer::new(width, height, config.color_layout, config.depth_layout)?;
        }
        if config.reversed_z != old.reversed_z {
            self.depth_range = DepthRange::new(self.depth_range.far, self.depth_range.near);
        }
        if config.tile_size != old.tile_size {
            self.bins = TileBins::new(width, height, config.tile_size);
        }

        self.config = config;
        self.framebuffer.clear([0, 0, 0, 255], self.depth_range.clear_value());
        self.stats = FrameStats::default();
        self.perf = PerfStats::new();
        Ok(())
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.framebuffer.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.framebuffer.height()
    }

    #[inline]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    #[inline]
    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    #[inline]
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[inline]
    pub fn depth_range(&self) -> &DepthRange {
        &self.depth_range
    }

    #[inline]
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Stage timings accumulated since the last `clear`.
    #[inline]
    pub fn perf(&self) -> &PerfStats {
        &self.perf
    }

    #[inline]
    pub fn thread_count(&self) -> usize {
        self.pool.thread_count()
    }

    /// Color buffer in raster order as RGBA bytes, bottom row first unless
    /// `flip_y` is set.
    pub fn frame_rgba(&self, flip_y: bool) -> Vec<u8> {
        self.framebuffer
            .color()
            .to_linear(flip_y)
            .into_iter()
            .flatten()
            .collect()
    }

    /// Run the vertex shader over every mesh vertex.
    fn shade_vertices<S: Shader>(
        mesh: &Mesh,
        shader: &S,
        uniforms: &S::Uniforms,
    ) -> (Vec<VertexHolder>, VaryingsPool) {
        debug_assert_eq!(shader.varyings_size(), S::Varyings::SIZE);
        let mut varyings = VaryingsPool::new(S::Varyings::SIZE, mesh.vertices.len());
        let holders = mesh
            .vertices
            .iter()
            .enumerate()
            .map(|(i, vertex)| {
                let (clip_pos, out) = shader.vertex(vertex, uniforms);
                out.write(varyings.slot_mut(i));
                VertexHolder::new(Some(i), i, clip_pos)
            })
            .collect();
        (holders, varyings)
    }

    /// Screen-map surviving vertices, decide facing and build the setups,
    /// binning each by its bounding box. Returns the setups in face order.
    fn setup_faces(
        &mut self,
        faces: &mut [FaceHolder],
        vertices: &mut [VertexHolder],
        cull: bool,
    ) -> Vec<TriangleSetup> {
        let (width, height) = (self.width(), self.height());
        let mut mapped = vec![false; vertices.len()];
        let mut setups = Vec::with_capacity(faces.len());
        self.bins.clear();

        for face in faces.iter_mut().filter(|f| !f.discard) {
            // A vertex sitting exactly on w = 0 passes every plane test but
            // has no window position.
            if face.indices.iter().any(|&i| vertices[i].clip_pos.w <= 0.0) {
                face.discard = true;
                continue;
            }
            for &i in &face.indices {
                if !mapped[i] {
                    vertices[i].screen = self.viewport.screen_map(vertices[i].clip_pos, &self.depth_range);
                    mapped[i] = true;
                }
            }

            let [a, b, c] = face.indices;
            let mut setup = TriangleSetup::new([&vertices[a], &vertices[b], &vertices[c]], true);
            if setup.is_degenerate() {
                log::trace!("face {:?} is degenerate", face.indices);
                face.discard = true;
                continue;
            }

            face.front_facing = setup.signed_area() > 0.0;
            setup.front_facing = face.front_facing;
            if cull && !face.front_facing {
                log::trace!("face {:?} culled", face.indices);
                self.stats.triangles_culled += 1;
                count_call!(FUNCTION_COUNTERS.triangles_culled);
                face.discard = true;
                continue;
            }

            if let Some(rect) = setup.bounding_box(width, height) {
                self.bins.add(setups.len() as u32, &rect);
                setups.push(setup);
            }
        }

        setups
    }

    /// One parallel pass over every non-empty tile.
    #[allow(clippy::too_many_arguments)]
    fn raster_pass<S: Shader>(
        &mut self,
        setups: &[TriangleSetup],
        varyings: &VaryingsPool,
        shader: &S,
        uniforms: &S::Uniforms,
        state: PixelState,
        pass: RasterPass,
    ) -> TileStats {
        let totals = Mutex::new(TileStats::default());
        let stride = varyings.stride();
        let tile_size = self.config.tile_size;
        let bins = &self.bins;
        let tiles = self.framebuffer.tiles_mut(tile_size);
        let mut dispatched = 0u64;

        self.pool.scope(|scope| {
            for (index, mut tile) in tiles.into_iter().enumerate() {
                let faces = bins.bin_at(index);
                if faces.is_empty() {
                    continue;
                }
                dispatched += 1;
                let totals = &totals;
                scope.push_task(move || {
                    let mut ctx = PixelQuadContext::new(shader.clone(), stride);
                    let stats = rasterize_tile(&mut tile, faces, setups, varyings, &mut ctx, uniforms, &state, pass);
                    if let Ok(mut total) = totals.lock() {
                        total.merge(&stats);
                    }
                });
            }
        });

        self.stats.tiles_dispatched += dispatched;
        count_add!(FUNCTION_COUNTERS.tiles_dispatched, dispatched);
        totals.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add_serial_time(&mut self, start: Instant) {
        let us = start.elapsed().as_secs_f64() * 1e6;
        self.perf.raster_us += us;
        self.perf.total_us += us;
    }

    fn primitive_state(&self) -> PixelState {
        PixelState::for_pass(&self.config, false, RasterPass::Shading, false)
    }
}

impl Renderer for SoftRenderer {
    fn create(width: usize, height: usize, near: f32, far: f32) -> Result<Self> {
        Self::with_config(width, height, near, far, RenderConfig::default())
    }

    fn clear(&mut self, color: Vec4) {
        perf_scope!("clear");
        self.framebuffer.clear(pack_rgba(color), self.depth_range.clear_value());
        self.stats = FrameStats::default();
        self.perf = PerfStats::new();
    }

    fn draw_mesh_textured<S: Shader>(&mut self, mesh: &Mesh, shader: &S, uniforms: &S::Uniforms) {
        let start = Instant::now();
        self.stats.draw_calls += 1;
        self.stats.triangles_in += mesh.triangle_count() as u64;
        count_call!(FUNCTION_COUNTERS.draw_calls);
        count_add!(FUNCTION_COUNTERS.vertices_shaded, mesh.vertices.len());
        count_add!(FUNCTION_COUNTERS.triangles_submitted, mesh.triangle_count());

        let (mut vertices, mut varyings) = Self::shade_vertices(mesh, shader, uniforms);
        let vertex_time = start.elapsed();

        let faces: Vec<FaceHolder> = mesh.triangles().map(FaceHolder::new).collect();
        let mut clip_stats = ClipStats::default();
        let mut faces = self
            .clipper
            .clip_faces(&faces, &mut vertices, &mut varyings, &mut clip_stats);
        self.stats.triangles_clipped += clip_stats.clipped as u64;
        self.stats.triangles_discarded += clip_stats.discarded as u64;
        count_add!(FUNCTION_COUNTERS.triangles_clipped, clip_stats.clipped);
        count_add!(FUNCTION_COUNTERS.vertices_synthesized, clip_stats.synthesized);

        let cull = self.config.cull_face && !mesh.double_sided;
        let setups = self.setup_faces(&mut faces, &mut vertices, cull);
        self.stats.triangles_rasterized += setups.len() as u64;
        let geometry_time = start.elapsed() - vertex_time;
        self.perf.vertex_us += vertex_time.as_secs_f64() * 1e6;
        self.perf.clip_us += geometry_time.as_secs_f64() * 1e6;

        if setups.is_empty() {
            self.perf.total_us += start.elapsed().as_secs_f64() * 1e6;
            log::debug!(
                "draw: {} triangles in, nothing to rasterize ({} discarded, {} culled)",
                mesh.triangle_count(),
                clip_stats.discarded,
                self.stats.triangles_culled
            );
            return;
        }

        // The pre-pass primes depth for an `Equal` shading pass, which needs
        // depth writes on and no fragment discards.
        let prepass = self.config.early_z
            && self.config.depth_test
            && self.config.depth_mask
            && !shader.may_discard();
        let mut tile_stats = TileStats::default();
        if prepass {
            let state = PixelState::for_pass(&self.config, mesh.alpha_blend, RasterPass::DepthOnly, true);
            tile_stats.merge(&self.raster_pass(&setups, &varyings, shader, uniforms, state, RasterPass::DepthOnly));
        }
        let state = PixelState::for_pass(&self.config, mesh.alpha_blend, RasterPass::Shading, prepass);
        tile_stats.merge(&self.raster_pass(&setups, &varyings, shader, uniforms, state, RasterPass::Shading));
        self.stats.add_tiles(&tile_stats);
        let total_time = start.elapsed();
        self.perf.raster_us += (total_time - vertex_time - geometry_time).as_secs_f64() * 1e6;
        self.perf.total_us += total_time.as_secs_f64() * 1e6;

        count_add!(FUNCTION_COUNTERS.quads_tested, tile_stats.quads_tested);
        count_add!(FUNCTION_COUNTERS.quads_covered, tile_stats.quads_covered);
        count_add!(FUNCTION_COUNTERS.depth_tests, tile_stats.depth_passed + tile_stats.depth_failed);
        count_add!(FUNCTION_COUNTERS.depth_passed, tile_stats.depth_passed);
        count_add!(FUNCTION_COUNTERS.depth_failed, tile_stats.depth_failed);
        count_add!(FUNCTION_COUNTERS.fragments_shaded, tile_stats.fragments_shaded);
        count_add!(FUNCTION_COUNTERS.fragments_discarded, tile_stats.fragments_discarded);

        log::debug!(
            "draw: {} triangles in, {} clipped, {} rasterized, {} fragments shaded \
             (vertex {}μs, geometry {}μs, total {}μs)",
            mesh.triangle_count(),
            clip_stats.clipped,
            setups.len(),
            tile_stats.fragments_shaded,
            vertex_time.as_micros(),
            geometry_time.as_micros(),
            total_time.as_micros()
        );
    }

    fn draw_mesh_wireframe(&mut self, mesh: &Mesh, transform: Mat4, color: Vec4) {
        let lines: Vec<Line> = mesh
            .triangles()
            .flat_map(|[a, b, c]| {
                let p = |i: usize| mesh.vertices[i].position;
                [
                    Line::new(p(a), p(b), color),
                    Line::new(p(b), p(c), color),
                    Line::new(p(c), p(a), color),
                ]
            })
            .collect();
        self.draw_lines(&lines, transform);
    }

    fn draw_lines(&mut self, lines: &[Line], transform: Mat4) {
        let start = Instant::now();
        let ctx = PrimitiveContext {
            transform,
            viewport: &self.viewport,
            depth_range: &self.depth_range,
            state: self.primitive_state(),
        };
        let mut tile = self.framebuffer.full_tile_mut();
        let written: u64 = lines.iter().map(|line| primitives::draw_line(&mut tile, line, &ctx)).sum();

        self.stats.line_pixels += written;
        self.add_serial_time(start);
        count_add!(FUNCTION_COUNTERS.line_pixels, written);
        log::trace!("{} lines, {} pixels", lines.len(), written);
    }

    fn draw_points(&mut self, points: &[Point], transform: Mat4) {
        let start = Instant::now();
        let ctx = PrimitiveContext {
            transform,
            viewport: &self.viewport,
            depth_range: &self.depth_range,
            state: self.primitive_state(),
        };
        let size = self.config.point_size;
        let mut tile = self.framebuffer.full_tile_mut();
        let written: u64 = points
            .iter()
            .map(|point| primitives::draw_point(&mut tile, point, size, &ctx))
            .sum();

        self.stats.point_pixels += written;
        self.add_serial_time(start);
        count_add!(FUNCTION_COUNTERS.point_pixels, written);
        log::trace!("{} points, {} pixels", points.len(), written);
    }

    fn get_frame_color(&self) -> Buffer<Rgba> {
        self.framebuffer.color().clone()
    }
}
