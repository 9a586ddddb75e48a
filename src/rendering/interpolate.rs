/// Varying interpolation kernels
///
/// Three implementations of the same weighted sum:
/// - AVX + FMA: 8 floats per iteration using fused multiply-add
/// - SSE: 4 floats per iteration
/// - Scalar: portable fallback
///
/// The widest available path is detected once and cached. Every path is
/// kept callable so tests can check them against each other.
use glam::Vec3;
use std::sync::OnceLock;

#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InterpolationPath {
    Scalar,
    Sse,
    AvxFma,
}

impl InterpolationPath {
    /// Widest path the running CPU supports.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx") && is_x86_feature_detected!("fma") {
                return InterpolationPath::AvxFma;
            }
            if is_x86_feature_detected!("sse2") {
                return InterpolationPath::Sse;
            }
        }
        InterpolationPath::Scalar
    }

    pub fn is_available(self) -> bool {
        match self {
            InterpolationPath::Scalar => true,
            #[cfg(target_arch = "x86_64")]
            InterpolationPath::Sse => is_x86_feature_detected!("sse2"),
            #[cfg(target_arch = "x86_64")]
            InterpolationPath::AvxFma => {
                is_x86_feature_detected!("avx") && is_x86_feature_detected!("fma")
            }
            #[cfg(not(target_arch = "x86_64"))]
            _ => false,
        }
    }
}

static ACTIVE_PATH: OnceLock<InterpolationPath> = OnceLock::new();

/// Path used by `interpolate_varyings`.
#[inline]
pub fn active_path() -> InterpolationPath {
    *ACTIVE_PATH.get_or_init(|| {
        let path = InterpolationPath::detect();
        log::debug!("varying interpolation path: {path:?}");
        path
    })
}

/// `out[i] = w.x * v0[i] + w.y * v1[i] + w.z * v2[i]`
#[inline]
pub fn interpolate_varyings(v0: &[f32], v1: &[f32], v2: &[f32], weights: Vec3, out: &mut [f32]) {
    interpolate_varyings_with(active_path(), v0, v1, v2, weights, out);
}

/// Same as `interpolate_varyings` on an explicit path. Unavailable paths
/// fall back to scalar.
pub fn interpolate_varyings_with(
    path: InterpolationPath,
    v0: &[f32],
    v1: &[f32],
    v2: &[f32],
    weights: Vec3,
    out: &mut [f32],
) {
    let len = out.len();
    debug_assert!(v0.len() >= len && v1.len() >= len && v2.len() >= len);
    let (v0, v1, v2) = (&v0[..len], &v1[..len], &v2[..len]);

    #[cfg(target_arch = "x86_64")]
    {
        match path {
            InterpolationPath::AvxFma if path.is_available() => {
                unsafe { interpolate_avx_fma(v0, v1, v2, weights, out) };
                return;
            }
            InterpolationPath::Sse if path.is_available() => {
                unsafe { interpolate_sse(v0, v1, v2, weights, out) };
                return;
            }
            _ => {}
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    let _ = path;

    interpolate_scalar(v0, v1, v2, weights, out);
}

#[inline]
fn interpolate_scalar(v0: &[f32], v1: &[f32], v2: &[f32], w: Vec3, out: &mut [f32]) {
    for i in 0..out.len() {
        out[i] = v0[i] * w.x + v1[i] * w.y + v2[i] * w.z;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn interpolate_sse(v0: &[f32], v1: &[f32], v2: &[f32], w: Vec3, out: &mut [f32]) {
    let len = out.len();
    let w0 = _mm_set1_ps(w.x);
    let w1 = _mm_set1_ps(w.y);
    let w2 = _mm_set1_ps(w.z);

    let mut i = 0usize;
    while i + 4 <= len {
        let a = _mm_mul_ps(_mm_loadu_ps(v0.as_ptr().add(i)), w0);
        let b = _mm_mul_ps(_mm_loadu_ps(v1.as_ptr().add(i)), w1);
        let c = _mm_mul_ps(_mm_loadu_ps(v2.as_ptr().add(i)), w2);
        _mm_storeu_ps(out.as_mut_ptr().add(i), _mm_add_ps(_mm_add_ps(a, b), c));
        i += 4;
    }
    // Tail
    for j in i..len {
        out[j] = v0[j] * w.x + v1[j] * w.y + v2[j] * w.z;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx,fma")]
unsafe fn interpolate_avx_fma(v0: &[f32], v1: &[f32], v2: &[f32], w: Vec3, out: &mut [f32]) {
    let len = out.len();
    let w0 = _mm256_set1_ps(w.x);
    let w1 = _mm256_set1_ps(w.y);
    let w2 = _mm256_set1_ps(w.z);

    let mut i = 0usize;
    while i + 8 <= len {
        let acc = _mm256_mul_ps(_mm256_loadu_ps(v0.as_ptr().add(i)), w0);
        let acc = _mm256_fmadd_ps(_mm256_loadu_ps(v1.as_ptr().add(i)), w1, acc);
        let acc = _mm256_fmadd_ps(_mm256_loadu_ps(v2.as_ptr().add(i)), w2, acc);
        _mm256_storeu_ps(out.as_mut_ptr().add(i), acc);
        i += 8;
    }
    // Tail
    for j in i..len {
        out[j] = v0[j] * w.x + v1[j] * w.y + v2[j] * w.z;
    }
}

/// `out[i] = a[i] + (b[i] - a[i]) * t`, used when the clipper synthesizes
/// a vertex on a frustum plane.
#[inline]
pub fn lerp_varyings(a: &[f32], b: &[f32], t: f32, out: &mut [f32]) {
    for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
        *o = x + (y - x) * t;
    }
}
