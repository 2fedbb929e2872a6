//! Common test utilities for dssim tests.
//!
//! Builds `DssimImage`s from the byte buffers produced by [`generators`].

pub mod generators;

use dssim::{ColorType, Dssim, DssimImage, DEFAULT_GAMMA};

/// Splits a packed buffer into scanlines of `width * bpp` bytes.
pub fn rows(data: &[u8], width: usize, bpp: usize) -> Vec<&[u8]> {
    data.chunks_exact(width * bpp).collect()
}

/// Converts a packed buffer with the default gamma.
#[track_caller]
pub fn image(
    dssim: &mut Dssim,
    data: &[u8],
    color_type: ColorType,
    width: usize,
    height: usize,
) -> DssimImage {
    let rows = rows(data, width, color_type.bytes_per_pixel());
    dssim
        .create_image(&rows, color_type, width, height, DEFAULT_GAMMA)
        .expect("valid test input")
}

/// Scores `modified` against `original`, both packed buffers of one layout.
#[track_caller]
pub fn score(
    dssim: &mut Dssim,
    original: &[u8],
    modified: &[u8],
    color_type: ColorType,
    width: usize,
    height: usize,
) -> f64 {
    let a = image(dssim, original, color_type, width, height);
    let b = image(dssim, modified, color_type, width, height);
    dssim.compare(&a, b).expect("valid test input")
}
