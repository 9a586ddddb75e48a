/// Homogeneous frustum clipping
///
/// Triangles are clipped in clip space, before the perspective divide, with
/// Sutherland–Hodgman against each frustum plane the triangle actually
/// crosses. A plane is stored as a 4-vector so that the signed distance of a
/// clip position is a single dot product; `d >= 0` is inside.
///
/// Vertices created on a plane get a new `VertexHolder` and a new slot in the
/// draw call's `VaryingsPool`, with position and every varying interpolated
/// linearly in clip space.
use super::memory::VaryingsPool;
use super::vertex::{ClipMask, FaceHolder, VertexHolder};
use glam::Vec4;

/// The six frustum planes, paired with the mask bit that flags a vertex
/// outside of them.
pub const CLIP_PLANES: [(ClipMask, Vec4); 6] = [
    (ClipMask::POS_X, Vec4::new(-1.0, 0.0, 0.0, 1.0)),
    (ClipMask::NEG_X, Vec4::new(1.0, 0.0, 0.0, 1.0)),
    (ClipMask::POS_Y, Vec4::new(0.0, -1.0, 0.0, 1.0)),
    (ClipMask::NEG_Y, Vec4::new(0.0, 1.0, 0.0, 1.0)),
    (ClipMask::POS_Z, Vec4::new(0.0, 0.0, -1.0, 1.0)),
    (ClipMask::NEG_Z, Vec4::new(0.0, 0.0, 1.0, 1.0)),
];

/// Counts gathered while clipping one draw call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ClipStats {
    /// Faces that crossed at least one plane and were re-triangulated.
    pub clipped: usize,
    /// Faces removed entirely.
    pub discarded: usize,
    /// Vertices created on clip planes.
    pub synthesized: usize,
}

/// Reusable polygon scratch space for clipping.
#[derive(Default)]
pub struct Clipper {
    polygon: Vec<usize>,
    scratch: Vec<usize>,
}

impl Clipper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clip every face against the frustum.
    ///
    /// The output keeps input order: an untouched face is copied as is, a
    /// clipped face is replaced by its fan triangles, and a face with nothing
    /// left is kept with `discard` set so later stages skip it.
    pub fn clip_faces(
        &mut self,
        faces: &[FaceHolder],
        vertices: &mut Vec<VertexHolder>,
        varyings: &mut VaryingsPool,
        stats: &mut ClipStats,
    ) -> Vec<FaceHolder> {
        let mut out = Vec::with_capacity(faces.len());
        for face in faces {
            if face.discard {
                out.push(*face);
                continue;
            }
            self.clip_face(face, vertices, varyings, stats, &mut out);
        }
        out
    }

    /// Clip a single face, appending the resulting face(s) to `out`.
    pub fn clip_face(
        &mut self,
        face: &FaceHolder,
        vertices: &mut Vec<VertexHolder>,
        varyings: &mut VaryingsPool,
        stats: &mut ClipStats,
        out: &mut Vec<FaceHolder>,
    ) {
        let [a, b, c] = face.indices;
        let masks = [vertices[a].clip_mask, vertices[b].clip_mask, vertices[c].clip_mask];
        let combined = masks[0] | masks[1] | masks[2];

        if combined.is_empty() {
            out.push(*face);
            return;
        }

        // All three vertices outside one plane: nothing can survive.
        if !(masks[0] & masks[1] & masks[2]).is_empty() {
            log::trace!("face {:?} rejected, outside {:?}", face.indices, masks[0] & masks[1] & masks[2]);
            stats.discarded += 1;
            out.push(FaceHolder {
                discard: true,
                ..*face
            });
            return;
        }

        self.polygon.clear();
        self.polygon.extend_from_slice(&face.indices);

        for (bit, plane) in CLIP_PLANES {
            if !combined.contains(bit) {
                continue;
            }
            self.clip_polygon(plane, vertices, varyings, stats);
            if self.polygon.is_empty() {
                break;
            }
        }

        if self.polygon.len() < 3 {
            log::trace!("face {:?} clipped away", face.indices);
            stats.discarded += 1;
            out.push(FaceHolder {
                discard: true,
                ..*face
            });
            return;
        }

        stats.clipped += 1;
        let first = self.polygon[0];
        for pair in self.polygon[1..].windows(2) {
            out.push(FaceHolder {
                indices: [first, pair[0], pair[1]],
                ..*face
            });
        }
    }

    /// One Sutherland–Hodgman pass of `self.polygon` against `plane`.
    fn clip_polygon(
        &mut self,
        plane: Vec4,
        vertices: &mut Vec<VertexHolder>,
        varyings: &mut VaryingsPool,
        stats: &mut ClipStats,
    ) {
        self.scratch.clear();

        let Some(&last) = self.polygon.last() else {
            return;
        };
        let mut prev = last;
        let mut d_prev = plane.dot(vertices[prev].clip_pos);

        for &curr in &self.polygon {
            let d = plane.dot(vertices[curr].clip_pos);

            // Only interpolate across a strict sign change, so t is well defined.
            if (d_prev < 0.0 && d > 0.0) || (d_prev > 0.0 && d < 0.0) {
                let t = d_prev / (d_prev - d);
                let pos = vertices[prev].clip_pos.lerp(vertices[curr].clip_pos, t);
                let slot = varyings.push_lerp(vertices[prev].varyings, vertices[curr].varyings, t);
                vertices.push(VertexHolder::new(None, slot, pos));
                self.scratch.push(vertices.len() - 1);
                stats.synthesized += 1;
            }
            if d >= 0.0 {
                self.scratch.push(curr);
            }

            prev = curr;
            d_prev = d;
        }

        std::mem::swap(&mut self.polygon, &mut self.scratch);
    }
}

/// Clip the segment `a → b` against all six planes.
///
/// Returns the surviving parameter interval `(t0, t1)` along the segment, or
/// `None` if nothing is left.
pub fn clip_segment(a: Vec4, b: Vec4) -> Option<(f32, f32)> {
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;

    for (_, plane) in CLIP_PLANES {
        let da = plane.dot(a);
        let db = plane.dot(b);

        match (da >= 0.0, db >= 0.0) {
            (true, true) => {}
            (false, false) => return None,
            (false, true) => t0 = t0.max(da / (da - db)),
            (true, false) => t1 = t1.min(da / (da - db)),
        }

        if t0 > t1 {
            return None;
        }
    }

    Some((t0, t1))
}
