/// Reference shaders
/// Small shader pairs used by the demo, tests and benchmarks. All of them
/// take the model-view-projection matrix as their uniforms.
use super::shader::{lod, FragmentInput, FragmentOutput, Shader};
use super::texture::{Sampler2D, Texture};
use super::vertex::Vertex;
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::sync::Arc;

/// Constant color, no varyings.
#[derive(Copy, Clone, Debug)]
pub struct FlatColorShader {
    pub color: Vec4,
}

impl FlatColorShader {
    pub fn new(color: Vec4) -> Self {
        Self { color }
    }
}

impl Shader for FlatColorShader {
    type Uniforms = Mat4;
    type Varyings = ();

    #[inline]
    fn vertex(&self, vertex: &Vertex, mvp: &Mat4) -> (Vec4, ()) {
        (*mvp * vertex.position.extend(1.0), ())
    }

    #[inline]
    fn fragment(&mut self, _input: &FragmentInput<()>, _mvp: &Mat4) -> FragmentOutput {
        FragmentOutput::color(self.color)
    }

    #[inline]
    fn may_discard(&self) -> bool {
        false
    }
}

/// Interpolates the vertex normal slot as an RGB color.
#[derive(Copy, Clone, Debug)]
pub struct VertexColorShader {
    pub alpha: f32,
}

impl Default for VertexColorShader {
    fn default() -> Self {
        Self { alpha: 1.0 }
    }
}

impl Shader for VertexColorShader {
    type Uniforms = Mat4;
    type Varyings = Vec3;

    #[inline]
    fn vertex(&self, vertex: &Vertex, mvp: &Mat4) -> (Vec4, Vec3) {
        (*mvp * vertex.position.extend(1.0), vertex.normal)
    }

    #[inline]
    fn fragment(&mut self, input: &FragmentInput<Vec3>, _mvp: &Mat4) -> FragmentOutput {
        FragmentOutput::color(input.varyings.extend(self.alpha))
    }

    #[inline]
    fn may_discard(&self) -> bool {
        false
    }
}

/// Nearest-mip texture lookup with the level picked from quad derivatives.
///
/// Texels with zero alpha are discarded.
#[derive(Clone, Debug)]
pub struct TexturedShader {
    pub texture: Arc<Texture>,
    /// Level chosen by the most recent fragment.
    pub last_lod: f32,
}

impl TexturedShader {
    pub fn new(texture: Arc<Texture>) -> Self {
        Self { texture, last_lod: 0.0 }
    }
}

impl Shader for TexturedShader {
    type Uniforms = Mat4;
    type Varyings = Vec2;

    #[inline]
    fn vertex(&self, vertex: &Vertex, mvp: &Mat4) -> (Vec4, Vec2) {
        (*mvp * vertex.position.extend(1.0), vertex.tex_coord)
    }

    fn fragment(&mut self, input: &FragmentInput<Vec2>, _mvp: &Mat4) -> FragmentOutput {
        self.last_lod = lod(input.ddx, input.ddy, self.texture.size());
        let color = self.texture.sample(input.varyings, self.last_lod);
        if color.w <= 0.0 {
            return FragmentOutput::discard();
        }
        FragmentOutput::color(color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<V: Copy>(varyings: V, ddx: V, ddy: V) -> FragmentInput<V> {
        FragmentInput {
            frag_coord: Vec4::new(0.5, 0.5, 0.5, 1.0),
            front_facing: true,
            varyings,
            ddx,
            ddy,
        }
    }

    #[test]
    fn flat_color_ignores_inputs() {
        let mut shader = FlatColorShader::new(Vec4::new(1.0, 0.0, 0.0, 1.0));
        let (pos, ()) = shader.vertex(&Vertex::at(Vec3::new(1.0, 2.0, 3.0)), &Mat4::IDENTITY);
        assert_eq!(pos, Vec4::new(1.0, 2.0, 3.0, 1.0));
        let out = shader.fragment(&input((), (), ()), &Mat4::IDENTITY);
        assert_eq!(out.color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert!(!out.discard);
    }

    #[test]
    fn vertex_color_passes_normal_through() {
        let mut shader = VertexColorShader::default();
        let v = Vertex::new(Vec3::ZERO, Vec2::ZERO, Vec3::new(0.25, 0.5, 0.75));
        let (_, varyings) = shader.vertex(&v, &Mat4::IDENTITY);
        let out = shader.fragment(&input(varyings, Vec3::ZERO, Vec3::ZERO), &Mat4::IDENTITY);
        assert_eq!(out.color, Vec4::new(0.25, 0.5, 0.75, 1.0));
    }

    #[test]
    fn textured_lod_follows_derivatives() {
        let mut texture = Texture::checkerboard(64, 8, [255; 4], [0, 0, 0, 255]).unwrap();
        texture.generate_mipmaps();
        let mut shader = TexturedShader::new(Arc::new(texture));

        // One texel per pixel.
        let step = Vec2::splat(1.0 / 64.0);
        shader.fragment(&input(Vec2::splat(0.5), step * Vec2::X, step * Vec2::Y), &Mat4::IDENTITY);
        assert_eq!(shader.last_lod, 0.0);

        // Four texels per pixel.
        shader.fragment(&input(Vec2::splat(0.5), step * 4.0 * Vec2::X, step * 4.0 * Vec2::Y), &Mat4::IDENTITY);
        assert!((shader.last_lod - 2.0).abs() < 1e-5);
    }

    #[test]
    fn transparent_texels_are_discarded() {
        let texture = Texture::new(1, 1, &[[0, 0, 0, 0]]).unwrap();
        let mut shader = TexturedShader::new(Arc::new(texture));
        let out = shader.fragment(&input(Vec2::ZERO, Vec2::ZERO, Vec2::ZERO), &Mat4::IDENTITY);
        assert!(out.discard);
    }
}
