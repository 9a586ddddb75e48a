/// Renderer configuration.
/// Plain data with defaults tuned for reversed-Z rendering.
use crate::error::{RenderError, Result};
use crate::rendering::buffer::BufferLayout;
use crate::rendering::depth::DepthFunc;
use glam::Vec4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub depth_test: bool,
    /// Write depth for fragments that pass the depth test.
    pub depth_mask: bool,
    pub depth_func: DepthFunc,
    /// Map the near plane to depth 1 and the far plane to 0.
    pub reversed_z: bool,
    /// Run a depth-only pass before shading.
    pub early_z: bool,
    /// Honour `Mesh::alpha_blend`.
    pub blend: bool,
    /// Discard back faces of meshes that are not double sided.
    pub cull_face: bool,
    /// Edge length of a rasterization tile; a power of two, at least 2.
    pub tile_size: usize,
    /// Worker count, 0 for one per hardware thread.
    pub thread_count: usize,
    pub color_layout: BufferLayout,
    pub depth_layout: BufferLayout,
    /// Edge length in pixels of the square drawn for a point.
    pub point_size: usize,
    pub wireframe_color: Vec4,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            depth_test: true,
            depth_mask: true,
            depth_func: DepthFunc::nearer(true),
            reversed_z: true,
            early_z: false,
            blend: true,
            cull_face: true,
            tile_size: 32,
            thread_count: 0,
            color_layout: BufferLayout::Morton,
            depth_layout: BufferLayout::Tiled,
            point_size: 4,
            wireframe_color: Vec4::new(1.0, 1.0, 1.0, 1.0),
        }
    }
}

impl RenderConfig {
    /// Config for a conventional depth range (near 0, far 1) with `Less`.
    pub fn forward_z() -> Self {
        Self {
            depth_func: DepthFunc::nearer(false),
            reversed_z: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size < 2 || !self.tile_size.is_power_of_two() {
            return Err(RenderError::InvalidConfig(format!(
                "tile size {} must be a power of two of at least 2",
                self.tile_size
            )));
        }
        if self.point_size == 0 {
            return Err(RenderError::InvalidConfig("point size must be positive".into()));
        }
        Ok(())
    }
}
