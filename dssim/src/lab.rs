//! Conversion of 8-bit pixels to DSSIM's Lab-like planes.
//!
//! The output is a rescaled, biased derivative of CIE L\*a\*b\*:
//! 1. Gamma-expand with a plain power law (per image LUT)
//! 2. Linear RGB → XYZ, normalized by the D65 white point
//! 3. Cube root with linear toe (the usual Lab companding)
//! 4. L, A and b scaled to roughly 0..1, with A and b shifted to stay positive
//!
//! These are not standard Lab units; the SSIM constants are tuned for them.

use rgb::{RGB8, RGBA8};

use crate::consts::{
    A_BIAS, A_SCALE, B_BIAS, B_SCALE, D65_X, D65_Y, D65_Z, LAB_EPSILON, LAB_K, L_SCALE,
    RGB_TO_XYZ,
};

/// Slack for the debug range checks; the A/b biases leave ~1e-4 headroom at
/// the most saturated primaries.
const RANGE_SLACK: f32 = 1e-3;

/// Builds the gamma expansion table: `lut[i] = (i/255)^(1/gamma)`.
#[must_use]
pub fn gamma_lut(gamma: f64) -> [f64; 256] {
    let mut lut = [0.0; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = (i as f64 / 255.0).powf(1.0 / gamma);
    }
    lut
}

#[inline]
fn lab_f(t: f64) -> f32 {
    if t > LAB_EPSILON {
        (t as f32).powf(1.0 / 3.0) - 16.0 / 116.0
    } else {
        (LAB_K * t) as f32
    }
}

/// Converts one gamma-encoded pixel to `[L, A, b]`.
#[inline]
#[must_use]
pub fn rgb_to_lab(lut: &[f64; 256], r: u8, g: u8, b: u8) -> [f32; 3] {
    let r = lut[usize::from(r)];
    let g = lut[usize::from(g)];
    let b = lut[usize::from(b)];
    let m = &RGB_TO_XYZ;

    let fx = (r * m[0] + g * m[1] + b * m[2]) / D65_X;
    let fy = (r * m[3] + g * m[4] + b * m[5]) / D65_Y;
    let fz = (r * m[6] + g * m[7] + b * m[8]) / D65_Z;

    let x = lab_f(fx);
    let y = lab_f(fy);
    let z = lab_f(fz);

    [
        y * L_SCALE,
        A_BIAS + A_SCALE * (x - y),
        B_BIAS + B_SCALE * (y - z),
    ]
}

/// Converts a pixel with alpha, compositing translucent pixels over a
/// coordinate-dependent pattern.
///
/// Premultiplies by alpha, then each channel independently gets `1 - a`
/// added depending on bits 2, 3 and 4 of `x ^ y`. This judges transparency
/// against several backgrounds instead of a single matte color.
#[inline]
#[must_use]
pub fn rgba_to_lab(lut: &[f64; 256], px: RGBA8, x: usize, y: usize) -> [f32; 3] {
    let mut lab = rgb_to_lab(lut, px.r, px.g, px.b);
    debug_assert!(
        lab.iter().all(|&v| (-RANGE_SLACK..=1.0 + RANGE_SLACK).contains(&v)),
        "lab out of range: {lab:?}"
    );

    if px.a < 255 {
        let a = f32::from(px.a) / 255.0;
        for v in &mut lab {
            *v *= a;
        }

        let n = x ^ y;
        for (ch, bit) in [4usize, 8, 16].into_iter().enumerate() {
            if n & bit != 0 {
                lab[ch] += 1.0 - a;
            }
        }
    }

    lab
}

/// Lightness of every gray level, for direct lookup.
#[must_use]
pub fn gray_lut(gamma: f64) -> [f32; 256] {
    let lut = gamma_lut(gamma);
    let mut gray = [0.0; 256];
    for (i, v) in gray.iter_mut().enumerate() {
        let i = i as u8;
        *v = rgb_to_lab(&lut, i, i, i)[0];
    }
    gray
}

#[inline]
fn store(out: &mut [&mut [f32]], x: usize, lab: [f32; 3]) {
    out[0][x] = lab[0];
    if out.len() >= 3 {
        out[1][x] = lab[1];
        out[2][x] = lab[2];
    }
}

/// RGBA row → L (and A, b when `out` has three rows).
pub fn convert_row_rgba(lut: &[f64; 256], row: &[RGBA8], y: usize, out: &mut [&mut [f32]]) {
    for (x, &px) in row.iter().enumerate() {
        store(out, x, rgba_to_lab(lut, px, x, y));
    }
}

/// RGB row → L (and A, b when `out` has three rows).
pub fn convert_row_rgb(lut: &[f64; 256], row: &[RGB8], out: &mut [&mut [f32]]) {
    for (x, px) in row.iter().enumerate() {
        store(out, x, rgb_to_lab(lut, px.r, px.g, px.b));
    }
}

/// Gray row → L via a table from [`gray_lut`].
pub fn convert_row_gray(lut: &[f32; 256], row: &[u8], out: &mut [&mut [f32]]) {
    for (dst, &v) in out[0].iter_mut().zip(row) {
        *dst = lut[usize::from(v)];
    }
}

/// Copies already-converted bytes, interleaved when there are three channels.
///
/// Values are taken as-is (0..255); no color transform is applied.
pub fn copy_row(row: &[u8], out: &mut [&mut [f32]]) {
    let channels = out.len();
    for (x, px) in row.chunks_exact(channels).enumerate() {
        for (plane, &v) in out.iter_mut().zip(px) {
            plane[x] = f32::from(v);
        }
    }
}
