/// Vertex input format and per-draw vertex/face bookkeeping
use crate::error::{RenderError, Result};
use bitflags::bitflags;
use glam::{Vec2, Vec3, Vec4};

/// Fixed-layout vertex attributes consumed by vertex shaders.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub tex_coord: Vec2,
    pub normal: Vec3,
    pub tangent: Vec3,
}

impl Vertex {
    pub const fn new(position: Vec3, tex_coord: Vec2, normal: Vec3) -> Self {
        Self {
            position,
            tex_coord,
            normal,
            tangent: Vec3::ZERO,
        }
    }

    /// Vertex with only a position; the remaining attributes are zero.
    pub const fn at(position: Vec3) -> Self {
        Self::new(position, Vec2::ZERO, Vec3::ZERO)
    }

    pub fn with_tangent(mut self, tangent: Vec3) -> Self {
        self.tangent = tangent;
        self
    }
}

bitflags! {
    /// Frustum planes a clip-space position lies outside of.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ClipMask: u8 {
        const POS_X = 1 << 0;
        const NEG_X = 1 << 1;
        const POS_Y = 1 << 2;
        const NEG_Y = 1 << 3;
        const POS_Z = 1 << 4;
        const NEG_Z = 1 << 5;
    }
}

impl ClipMask {
    /// Classify a clip-space position. A bit is set when `w < ±component`,
    /// so a point lying exactly on a plane counts as inside.
    #[inline]
    pub fn of(pos: Vec4) -> Self {
        let mut mask = ClipMask::empty();
        if pos.w < pos.x {
            mask |= ClipMask::POS_X;
        }
        if pos.w < -pos.x {
            mask |= ClipMask::NEG_X;
        }
        if pos.w < pos.y {
            mask |= ClipMask::POS_Y;
        }
        if pos.w < -pos.y {
            mask |= ClipMask::NEG_Y;
        }
        if pos.w < pos.z {
            mask |= ClipMask::POS_Z;
        }
        if pos.w < -pos.z {
            mask |= ClipMask::NEG_Z;
        }
        mask
    }
}

/// Vertex state tracked through one draw call.
#[derive(Copy, Clone, Debug)]
pub struct VertexHolder {
    /// Index into the mesh's vertex array, `None` for clipper-made vertices.
    pub source: Option<usize>,
    /// Slot in the draw call's `VaryingsPool`.
    pub varyings: usize,
    /// Vertex shader output position.
    pub clip_pos: Vec4,
    pub clip_mask: ClipMask,
    /// Window position after screen mapping: (x, y, depth, 1/w).
    pub screen: Vec4,
}

impl VertexHolder {
    pub fn new(source: Option<usize>, varyings: usize, clip_pos: Vec4) -> Self {
        Self {
            source,
            varyings,
            clip_pos,
            clip_mask: ClipMask::of(clip_pos),
            screen: Vec4::ZERO,
        }
    }
}

/// Triangle referencing three `VertexHolder`s by index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FaceHolder {
    pub indices: [usize; 3],
    pub discard: bool,
    pub front_facing: bool,
}

impl FaceHolder {
    pub fn new(indices: [usize; 3]) -> Self {
        Self {
            indices,
            discard: false,
            front_facing: true,
        }
    }
}

/// Triangle mesh ready for the pipeline. Validation happens here so the
/// pipeline can assume well-formed index triples.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    /// Skip back-face culling for this mesh.
    pub double_sided: bool,
    /// Blend fragments with the framebuffer when blending is enabled.
    pub alpha_blend: bool,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self> {
        if vertices.is_empty() {
            return Err(RenderError::InvalidMesh("mesh has no vertices".into()));
        }
        if indices.len() % 3 != 0 {
            return Err(RenderError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::InvalidMesh(format!(
                "index {bad} out of range for {} vertices",
                vertices.len()
            )));
        }

        Ok(Self {
            vertices,
            indices,
            double_sided: false,
            alpha_blend: false,
        })
    }

    pub fn with_double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    pub fn with_alpha_blend(mut self, alpha_blend: bool) -> Self {
        self.alpha_blend = alpha_blend;
        self
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Index triples as `usize`.
    pub fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_plane_positions_are_inside() {
        assert_eq!(ClipMask::of(Vec4::new(1.0, -1.0, 1.0, 1.0)), ClipMask::empty());
        assert_eq!(ClipMask::of(Vec4::new(-2.0, 2.0, -2.0, 2.0)), ClipMask::empty());
    }

    #[test]
    fn perturbing_past_a_plane_sets_its_bit() {
        let eps = 1e-4;
        assert_eq!(ClipMask::of(Vec4::new(1.0 + eps, 0.0, 0.0, 1.0)), ClipMask::POS_X);
        assert_eq!(ClipMask::of(Vec4::new(-1.0 - eps, 0.0, 0.0, 1.0)), ClipMask::NEG_X);
        assert_eq!(ClipMask::of(Vec4::new(0.0, 1.0 + eps, 0.0, 1.0)), ClipMask::POS_Y);
        assert_eq!(ClipMask::of(Vec4::new(0.0, -1.0 - eps, 0.0, 1.0)), ClipMask::NEG_Y);
        assert_eq!(ClipMask::of(Vec4::new(0.0, 0.0, 1.0 + eps, 1.0)), ClipMask::POS_Z);
        assert_eq!(ClipMask::of(Vec4::new(0.0, 0.0, -1.0 - eps, 1.0)), ClipMask::NEG_Z);

        assert!(ClipMask::of(Vec4::new(1.0 - eps, 0.0, 0.0, 1.0)).is_empty());
        assert!(ClipMask::of(Vec4::new(0.0, 0.0, -1.0 + eps, 1.0)).is_empty());
    }

    #[test]
    fn negative_w_is_outside_every_plane_pair() {
        let mask = ClipMask::of(Vec4::new(0.0, 0.0, 0.0, -1.0));
        assert!(mask.contains(ClipMask::POS_X | ClipMask::NEG_X));
        assert!(mask.contains(ClipMask::POS_Z | ClipMask::NEG_Z));
    }

    #[test]
    fn mesh_rejects_bad_input() {
        let verts = vec![Vertex::default(); 3];
        assert!(Mesh::new(Vec::new(), vec![]).is_err());
        assert!(Mesh::new(verts.clone(), vec![0, 1]).is_err());
        assert!(Mesh::new(verts.clone(), vec![0, 1, 3]).is_err());

        let mesh = Mesh::new(verts, vec![0, 1, 2]).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.triangles().next(), Some([0, 1, 2]));
    }
}
