/// Viewport transform and depth range
///
/// Maps clip-space positions to window coordinates:
/// - x, y: NDC [-1, 1] to pixels, row 0 at the bottom
/// - z: NDC [-1, 1] to [near, far] of the depth range
/// - w: replaced by 1/w for perspective correction
use glam::Vec4;

/// Window-space depth interval. `near` and `far` may be swapped for
/// reversed-Z, in which case the near plane maps to 1 and the far plane to 0.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DepthRange {
    pub near: f32,
    pub far: f32,
    /// `far + near`
    pub sum: f32,
    /// `far - near`
    pub diff: f32,
}

impl DepthRange {
    pub fn new(near: f32, far: f32) -> Self {
        Self {
            near,
            far,
            sum: far + near,
            diff: far - near,
        }
    }

    /// Standard [0, 1] range.
    pub fn standard() -> Self {
        Self::new(0.0, 1.0)
    }

    /// Reversed [1, 0] range: near plane at 1, far plane at 0.
    pub fn reversed() -> Self {
        Self::new(1.0, 0.0)
    }

    #[inline(always)]
    pub fn map(&self, ndc_z: f32) -> f32 {
        0.5 * (self.diff * ndc_z + self.sum)
    }

    /// Value the depth buffer is cleared to: the far end of the range.
    #[inline]
    pub fn clear_value(&self) -> f32 {
        self.far
    }

    #[inline]
    pub fn is_reversed(&self) -> bool {
        self.near > self.far
    }
}

impl Default for DepthRange {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Precomputed `(width/2, height/2, x + width/2, y + height/2)`.
    transform: Vec4,
}

impl Viewport {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        Self {
            x,
            y,
            width,
            height,
            transform: Vec4::new(hw, hh, x + hw, y + hh),
        }
    }

    /// Viewport covering a whole `width × height` target.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Perspective divide followed by the viewport and depth transforms.
    /// Returns `(x, y, depth, 1/w)` in window coordinates.
    #[inline]
    pub fn screen_map(&self, clip: Vec4, depth: &DepthRange) -> Vec4 {
        let inv_w = 1.0 / clip.w;
        let ndc = clip.truncate() * inv_w;
        Vec4::new(
            ndc.x * self.transform.x + self.transform.z,
            ndc.y * self.transform.y + self.transform.w,
            depth.map(ndc.z),
            inv_w,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndc_corners_map_to_viewport_edges() {
        let vp = Viewport::full(100, 50);
        let depth = DepthRange::standard();

        let lo = vp.screen_map(Vec4::new(-1.0, -1.0, -1.0, 1.0), &depth);
        let hi = vp.screen_map(Vec4::new(1.0, 1.0, 1.0, 1.0), &depth);
        assert_eq!(lo, Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(hi, Vec4::new(100.0, 50.0, 1.0, 1.0));
    }

    #[test]
    fn perspective_divide_and_inverse_w() {
        let vp = Viewport::new(10.0, 20.0, 100.0, 100.0);
        let s = vp.screen_map(Vec4::new(2.0, -2.0, 0.0, 4.0), &DepthRange::standard());
        assert_eq!(s, Vec4::new(85.0, 45.0, 0.5, 0.25));
    }

    #[test]
    fn reversed_range_flips_depth() {
        let depth = DepthRange::reversed();
        assert!(depth.is_reversed());
        assert_eq!(depth.map(-1.0), 1.0);
        assert_eq!(depth.map(1.0), 0.0);
        assert_eq!(depth.map(0.0), 0.5);
        assert_eq!(depth.clear_value(), 0.0);
    }

    #[test]
    fn custom_range_stays_inside_bounds() {
        let depth = DepthRange::new(0.2, 0.8);
        for i in 0..=10 {
            let z = -1.0 + i as f32 * 0.2;
            let d = depth.map(z);
            assert!((0.2 - 1e-6..=0.8 + 1e-6).contains(&d), "{z} -> {d}");
        }
    }
}
