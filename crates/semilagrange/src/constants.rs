/// Synoptic time scale (~1/Ω) in seconds, used to make the sub-step dimensionless
pub const SYNOPTIC_TIME_SCALE: f64 = 7.29212e5;

/// Keeps the arcsin argument strictly inside (-1, 1)
pub const POLE_CLAMP_EPSILON: f64 = 1e-7;

/// Halo cells needed on each side by the 4-tap cubic kernel
pub const CUBIC_HALO: usize = 2;

/// Keys cubic convolution coefficient; -0.5 is Catmull-Rom
pub const CATMULL_ROM: f64 = -0.5;

/// Halo used by the 3x3 output projection
pub const CONV_HALO: usize = 1;
