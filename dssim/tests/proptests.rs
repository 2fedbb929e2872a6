//! Property-based tests for session settings and score invariants.
//!
//! Run with: `cargo test --test proptests`

mod common;

use common::generators::{distort_noise, gen_random};
use common::score;
use dssim::{ColorType, Dssim, MAX_SCALES};
use proptest::prelude::*;

// ============================================================================
// Scale weights
// ============================================================================

proptest! {
    /// Any accepted weight list is normalized to sum to 1.
    #[test]
    fn fuzz_weights_normalize(weights in prop::collection::vec(0.001f64..100.0, 1..=MAX_SCALES)) {
        let mut dssim = Dssim::new();
        dssim.set_scales(weights.len(), Some(weights.as_slice())).unwrap();

        prop_assert_eq!(dssim.num_scales(), weights.len());
        let sum: f64 = dssim.scale_weights().iter().sum();
        prop_assert!((sum - 1.0).abs() < 1e-9, "sum={}", sum);

        // proportions survive normalization
        let ratio = dssim.scale_weights()[0] / weights[0];
        for (normalized, raw) in dssim.scale_weights().iter().zip(&weights) {
            prop_assert!((normalized / raw - ratio).abs() < 1e-9 * ratio.max(1.0));
        }
    }

    /// The scale count is clipped to the table and the weights supplied.
    #[test]
    fn fuzz_scale_count_clipped(num in 1usize..20, len in 1usize..8) {
        let weights = vec![1.0; len];
        let mut dssim = Dssim::new();
        dssim.set_scales(num, Some(weights.as_slice())).unwrap();
        prop_assert_eq!(dssim.num_scales(), num.min(len).min(MAX_SCALES));
    }
}

// ============================================================================
// Score invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Identical images score 0 regardless of size, content and layout.
    #[test]
    fn fuzz_identity(
        width in 1usize..40,
        height in 1usize..40,
        seed in any::<u64>(),
        rgb in any::<bool>(),
    ) {
        let color_type = if rgb { ColorType::Rgb } else { ColorType::Gray };
        let data = gen_random(width, height, color_type.bytes_per_pixel(), seed);
        let mut dssim = Dssim::new();
        let s = score(&mut dssim, &data, &data, color_type, width, height);
        prop_assert!(s.abs() < 1e-9, "{}x{} scored {}", width, height, s);
    }

    /// Distorted copies never score below 0.
    #[test]
    fn fuzz_score_non_negative(
        width in 1usize..32,
        height in 1usize..32,
        seed in any::<u64>(),
        amplitude in 1u8..40,
    ) {
        let a = gen_random(width, height, 3, seed);
        let b = distort_noise(&a, seed ^ 0x5555, amplitude);
        let mut dssim = Dssim::new();
        let s = score(&mut dssim, &a, &b, ColorType::Rgb, width, height);
        prop_assert!(s.is_finite(), "{}", s);
        prop_assert!(s >= -1e-6, "{}", s);
    }
}
