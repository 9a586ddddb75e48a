/// 32-byte aligned float storage for varyings
///
/// Varyings are interpolated with 8-wide vector loads, so each per-vertex
/// slot starts on a 32-byte boundary. Alignment comes from the element type
/// (`Lane` is `align(32)`), so every allocation the `Vec` makes is aligned
/// without any runtime check.
use std::mem::size_of;

/// Alignment of varyings storage in bytes.
pub const SIMD_ALIGN: usize = 32;

/// Number of f32 lanes per aligned chunk.
pub const SIMD_LANES: usize = SIMD_ALIGN / size_of::<f32>();

#[repr(C, align(32))]
#[derive(Copy, Clone, Default)]
struct Lane([f32; SIMD_LANES]);

const _: () = assert!(std::mem::align_of::<Lane>() == SIMD_ALIGN);
const _: () = assert!(size_of::<Lane>() == SIMD_ALIGN);

/// Round a float count up to a whole number of aligned chunks.
#[inline]
pub const fn aligned_len(floats: usize) -> usize {
    (floats + SIMD_LANES - 1) & !(SIMD_LANES - 1)
}

/// Heap block of f32 whose first element is 32-byte aligned.
#[derive(Clone, Default)]
pub struct AlignedFloats {
    lanes: Vec<Lane>,
    len: usize,
}

impl AlignedFloats {
    pub fn zeroed(len: usize) -> Self {
        Self {
            lanes: vec![Lane::default(); aligned_len(len) / SIMD_LANES],
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Grow by `floats` zeroed elements. `len` must already be chunk aligned
    /// for the new region to start on an aligned boundary.
    pub fn extend_zeroed(&mut self, floats: usize) {
        let new_len = self.len + floats;
        self.lanes
            .resize(aligned_len(new_len) / SIMD_LANES, Lane::default());
        self.len = new_len;
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        // Safety: `Lane` is `repr(C)` over `[f32; SIMD_LANES]`, so the lanes are a
        // contiguous run of at least `len` initialized f32 values.
        unsafe { std::slice::from_raw_parts(self.lanes.as_ptr() as *const f32, self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        // Safety: see `as_slice`; the exclusive borrow of `self` covers the lanes.
        unsafe { std::slice::from_raw_parts_mut(self.lanes.as_mut_ptr() as *mut f32, self.len) }
    }

    #[inline]
    pub fn as_ptr(&self) -> *const f32 {
        self.lanes.as_ptr() as *const f32
    }
}

/// Per-draw varyings storage: one aligned slot per vertex.
///
/// The vertex stage fills one slot per input vertex; the clipper appends
/// slots for the vertices it synthesizes. Slot `i` starts at `i * stride`,
/// where `stride` is `size` rounded up to the SIMD width.
#[derive(Clone, Default)]
pub struct VaryingsPool {
    data: AlignedFloats,
    size: usize,
    stride: usize,
    count: usize,
}

impl VaryingsPool {
    pub fn new(varyings_size: usize, vertex_count: usize) -> Self {
        let stride = aligned_len(varyings_size);
        Self {
            data: AlignedFloats::zeroed(stride * vertex_count),
            size: varyings_size,
            stride,
            count: vertex_count,
        }
    }

    /// Number of floats a shader reads/writes per vertex.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Aligned distance between consecutive slots.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &[f32] {
        let start = index * self.stride;
        &self.data.as_slice()[start..start + self.size]
    }

    #[inline]
    pub fn slot_mut(&mut self, index: usize) -> &mut [f32] {
        let start = index * self.stride;
        &mut self.data.as_mut_slice()[start..start + self.size]
    }

    /// Append a zeroed slot and return its index.
    pub fn push(&mut self) -> usize {
        self.data.extend_zeroed(self.stride);
        self.count += 1;
        self.count - 1
    }

    /// Append a slot holding `a + (b - a) * t`, element-wise.
    pub fn push_lerp(&mut self, a: usize, b: usize, t: f32) -> usize {
        let dst = self.push();
        if self.size == 0 {
            return dst;
        }

        let (stride, size) = (self.stride, self.size);
        let (head, tail) = self.data.as_mut_slice().split_at_mut(dst * stride);
        let src_a = &head[a * stride..a * stride + size];
        let src_b = &head[b * stride..b * stride + size];
        super::interpolate::lerp_varyings(src_a, src_b, t, &mut tail[..size]);
        dst
    }
}
