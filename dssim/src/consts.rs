//! Tuned constants for DSSIM.
//!
//! The values here are part of the metric's definition: changing any of them
//! changes every score.

// ============================================================================
// Session defaults
// ============================================================================

/// Maximum number of channels in an image (L, A, b).
pub const MAX_CHANS: usize = 3;

/// Maximum number of pyramid scales.
pub const MAX_SCALES: usize = 5;

/// Number of scales used by a fresh session.
pub const DEFAULT_NUM_SCALES: usize = 4;

/// Per-scale weights, finest first.
///
/// Scales are taken from IW-SSIM, but this is not the IW-SSIM algorithm.
pub const DEFAULT_WEIGHTS: [f64; MAX_SCALES] = [0.0448, 0.2856, 0.3001, 0.2363, 0.1333];

/// Weight multiplier for chroma channels. Bigger puts more emphasis on color.
pub const DEFAULT_COLOR_WEIGHT: f64 = 0.95;

/// Smaller values are more sensitive to single-pixel differences.
pub const DEFAULT_DETAIL_SIZE: usize = 1;

/// Box-blur passes applied once to chroma planes before statistics.
pub const CHROMA_DENOISE_RUNS: usize = 2;

// ============================================================================
// SSIM stabilizers
// ============================================================================

/// `(0.01 * L)^2` for a dynamic range of L = 1.
pub const SSIM_C1: f64 = 0.01 * 0.01;

/// `(0.03 * L)^2` for a dynamic range of L = 1.
pub const SSIM_C2: f64 = 0.03 * 0.03;

// ============================================================================
// Color conversion
// ============================================================================

/// D65 reference white.
pub const D65_X: f64 = 0.9505;
pub const D65_Y: f64 = 1.0;
pub const D65_Z: f64 = 1.089;

/// Linear RGB to XYZ, row-major.
pub const RGB_TO_XYZ: [f64; 9] = [
    0.4124, 0.3576, 0.1805, // X
    0.2126, 0.7152, 0.0722, // Y
    0.0193, 0.1192, 0.9505, // Z
];

/// Breakpoint between the linear and cube-root branches.
pub const LAB_EPSILON: f64 = 216.0 / 24389.0;

/// Slope of the linear branch (see brucelindbloom.com/LContinuity.html).
pub const LAB_K: f64 = (24389.0 / 27.0) / 116.0;

/// Scale applied to the lightness term.
pub const L_SCALE: f32 = 1.16;

/// Offsets keeping A and b non-negative. Not CIELAB units.
pub const A_BIAS: f32 = 86.2 / 220.0;
pub const B_BIAS: f32 = 107.9 / 220.0;
pub const A_SCALE: f32 = 500.0 / 220.0;
pub const B_SCALE: f32 = 200.0 / 220.0;

/// Gamma commonly passed for sRGB-ish 8-bit input.
pub const DEFAULT_GAMMA: f64 = 0.45455;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_cover_all_scales() {
        assert_eq!(DEFAULT_WEIGHTS.len(), MAX_SCALES);
        assert!(DEFAULT_NUM_SCALES <= MAX_SCALES);
        assert!(DEFAULT_WEIGHTS.iter().all(|&w| w > 0.0));
    }

    #[test]
    fn test_lab_branches_meet_at_epsilon() {
        let cube = LAB_EPSILON.cbrt() - 16.0 / 116.0;
        let linear = LAB_K * LAB_EPSILON;
        assert!((cube - linear).abs() < 1e-6, "{cube} vs {linear}");
    }
}
