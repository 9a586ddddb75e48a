/// Depth comparison functions
///
/// Values reaching the shading pass after an early-Z pre-pass are recomputed
/// through the same barycentric math but may still differ by rounding, so
/// every comparison involving equality allows `f32::EPSILON` of slack.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum DepthFunc {
    Never,
    Less,
    Equal,
    LEqual,
    /// Default for reversed-Z, where larger depth is nearer.
    #[default]
    Greater,
    NotEqual,
    GEqual,
    Always,
}

impl DepthFunc {
    pub const ALL: [DepthFunc; 8] = [
        DepthFunc::Never,
        DepthFunc::Less,
        DepthFunc::Equal,
        DepthFunc::LEqual,
        DepthFunc::Greater,
        DepthFunc::NotEqual,
        DepthFunc::GEqual,
        DepthFunc::Always,
    ];

    /// Compare an incoming depth `new` against the `stored` value.
    #[inline(always)]
    pub fn test(self, new: f32, stored: f32) -> bool {
        match self {
            DepthFunc::Never => false,
            DepthFunc::Less => new < stored,
            DepthFunc::Equal => (new - stored).abs() <= f32::EPSILON,
            DepthFunc::LEqual => new <= stored + f32::EPSILON,
            DepthFunc::Greater => new > stored,
            DepthFunc::NotEqual => (new - stored).abs() > f32::EPSILON,
            DepthFunc::GEqual => new + f32::EPSILON >= stored,
            DepthFunc::Always => true,
        }
    }

    /// Function that keeps the nearer fragment for the given depth convention.
    pub fn nearer(reversed_z: bool) -> Self {
        if reversed_z {
            DepthFunc::Greater
        } else {
            DepthFunc::Less
        }
    }
}
