/// Shader binding contract
///
/// A draw call is monomorphized over one concrete `Shader`. The vertex stage
/// returns a clip position plus a typed `Varyings` value; the pipeline stores
/// varyings as flat floats in the draw call's aligned pool and hands the
/// fragment stage a typed value again. Each tile task gets its own clone of
/// the shader, so `fragment` may keep scratch state in `&mut self`.
use super::vertex::Vertex;
use glam::{Vec2, Vec3, Vec4};

/// Per-vertex values interpolated across a triangle.
///
/// `SIZE` is the number of floats `write` produces and `read` consumes.
pub trait Varyings: Copy + Default + Send + Sync {
    const SIZE: usize;

    fn write(&self, out: &mut [f32]);

    fn read(src: &[f32]) -> Self;
}

impl Varyings for () {
    const SIZE: usize = 0;

    #[inline]
    fn write(&self, _out: &mut [f32]) {}

    #[inline]
    fn read(_src: &[f32]) -> Self {}
}

impl Varyings for f32 {
    const SIZE: usize = 1;

    #[inline]
    fn write(&self, out: &mut [f32]) {
        out[0] = *self;
    }

    #[inline]
    fn read(src: &[f32]) -> Self {
        src[0]
    }
}

macro_rules! impl_vector_varyings {
    ($ty:ty, $n:expr) => {
        impl Varyings for $ty {
            const SIZE: usize = $n;

            #[inline]
            fn write(&self, out: &mut [f32]) {
                self.write_to_slice(&mut out[..$n]);
            }

            #[inline]
            fn read(src: &[f32]) -> Self {
                <$ty>::from_slice(&src[..$n])
            }
        }
    };
}

impl_vector_varyings!(Vec2, 2);
impl_vector_varyings!(Vec3, 3);
impl_vector_varyings!(Vec4, 4);

impl<A: Varyings, B: Varyings> Varyings for (A, B) {
    const SIZE: usize = A::SIZE + B::SIZE;

    #[inline]
    fn write(&self, out: &mut [f32]) {
        self.0.write(&mut out[..A::SIZE]);
        self.1.write(&mut out[A::SIZE..]);
    }

    #[inline]
    fn read(src: &[f32]) -> Self {
        (A::read(&src[..A::SIZE]), B::read(&src[A::SIZE..]))
    }
}

impl<A: Varyings, B: Varyings, C: Varyings> Varyings for (A, B, C) {
    const SIZE: usize = A::SIZE + B::SIZE + C::SIZE;

    #[inline]
    fn write(&self, out: &mut [f32]) {
        let (head, tail) = out.split_at_mut(A::SIZE);
        self.0.write(head);
        (self.1, self.2).write(tail);
    }

    #[inline]
    fn read(src: &[f32]) -> Self {
        let (b, c) = <(B, C)>::read(&src[A::SIZE..]);
        (A::read(&src[..A::SIZE]), b, c)
    }
}

/// Everything the fragment stage sees for one pixel.
#[derive(Copy, Clone, Debug)]
pub struct FragmentInput<V> {
    /// Window position of the pixel center, interpolated depth and 1/w.
    pub frag_coord: Vec4,
    pub front_facing: bool,
    pub varyings: V,
    /// Change of the varyings one pixel to the right, across the 2×2 quad.
    pub ddx: V,
    /// Change of the varyings one pixel up, across the 2×2 quad.
    pub ddy: V,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FragmentOutput {
    pub color: Vec4,
    pub discard: bool,
}

impl FragmentOutput {
    #[inline]
    pub fn color(color: Vec4) -> Self {
        Self {
            color,
            discard: false,
        }
    }

    #[inline]
    pub fn discard() -> Self {
        Self {
            color: Vec4::ZERO,
            discard: true,
        }
    }
}

/// A statically bound vertex/fragment pair.
pub trait Shader: Clone + Send + Sync {
    type Uniforms: Sync;
    type Varyings: Varyings;

    /// Transform one vertex to clip space.
    fn vertex(&self, vertex: &Vertex, uniforms: &Self::Uniforms) -> (Vec4, Self::Varyings);

    /// Shade one covered pixel.
    fn fragment(
        &mut self,
        input: &FragmentInput<Self::Varyings>,
        uniforms: &Self::Uniforms,
    ) -> FragmentOutput;

    /// Float count of this shader's varyings.
    #[inline]
    fn varyings_size(&self) -> usize {
        Self::Varyings::SIZE
    }

    /// Whether `fragment` can return a discard. The depth pre-pass cannot
    /// see discards, so it is skipped for shaders that may produce them.
    #[inline]
    fn may_discard(&self) -> bool {
        true
    }
}

/// Mip level for a texture of `tex_size` texels given the screen-space
/// derivatives of its normalized coordinates.
#[inline]
pub fn lod(ddx_uv: Vec2, ddy_uv: Vec2, tex_size: Vec2) -> f32 {
    let dx = (ddx_uv * tex_size).length_squared();
    let dy = (ddy_uv * tex_size).length_squared();
    let rho_sq = dx.max(dy);
    if rho_sq <= 1.0 {
        0.0
    } else {
        0.5 * rho_sq.log2()
    }
}

/// Helper used by shaders that pass a world-space normal through as color.
#[inline]
pub fn normal_to_color(normal: Vec3) -> Vec4 {
    (normal * 0.5 + Vec3::splat(0.5)).extend(1.0)
}
