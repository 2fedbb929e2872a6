//! Box blur approximating a Gaussian for DSSIM's local statistics.
//!
//! A single pass is a 3-tap moving average with clamp-to-edge borders.
//! Repeated passes converge towards a Gaussian; the 2D blur runs the
//! horizontal passes, transposes, runs them again over what were columns,
//! and transposes back. Scores depend on this ordering.
//!
//! Optimizations:
//! - Transpose in 4-row blocks so the vertical pass is a cache-friendly
//!   horizontal one
//! - Two row-sized scratch buffers shared by all passes of a row
//! - Explicit f32x8 SIMD for the interior of each pass

use wide::f32x8;

/// Per-row preprocessing applied before the first pass.
pub type RowFn = fn(&[f32], &mut [f32]);

/// Squares every sample. Used to blur `img²` without materializing it.
pub fn square_row(src: &[f32], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s * s;
    }
}

/// Scratch length needed by [`blur`] and [`blur_in_place`] for a plane.
///
/// One transposed copy of the plane plus two rows of the longer side.
#[must_use]
pub fn scratch_len(width: usize, height: usize) -> usize {
    width * height + 2 * width.max(height)
}

#[inline]
pub(crate) fn load8(s: &[f32]) -> f32x8 {
    let mut lanes = [0.0f32; 8];
    lanes.copy_from_slice(&s[..8]);
    f32x8::from(lanes)
}

/// One 3-tap pass over a row. `src` and `dst` have the same length.
///
/// The interior is vectorized with the same operation order as the scalar
/// borders, so both paths produce identical values.
#[multiversion::multiversion(targets(
    "x86_64+avx512f+avx512bw+avx512cd+avx512dq+avx512vl+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+cmpxchg16b+fxsr+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
))]
pub fn box_blur_row(src: &[f32], dst: &mut [f32]) {
    let width = src.len();
    debug_assert_eq!(width, dst.len());
    if width == 0 {
        return;
    }
    let last = width - 1;

    dst[0] = (src[0] + src[0] + src[1.min(last)]) / 3.0;
    if last == 0 {
        return;
    }

    let third = f32x8::splat(3.0);
    let mut i = 1;
    // src[i + 8] must still be a valid right neighbour
    while i + 8 <= last {
        let sum = load8(&src[i - 1..]) + load8(&src[i..]) + load8(&src[i + 1..]);
        let out: [f32; 8] = (sum / third).into();
        dst[i..i + 8].copy_from_slice(&out);
        i += 8;
    }
    for x in i..last {
        dst[x] = (src[x - 1] + src[x] + src[x + 1]) / 3.0;
    }

    dst[last] = (src[last - 1] + src[last] + src[last]) / 3.0;
}

/// Runs `runs` passes ping-ponging between `a` and `b`, starting from `a`.
/// Returns whichever buffer holds the result.
fn run_passes<'s>(mut a: &'s mut [f32], mut b: &'s mut [f32], runs: usize) -> &'s mut [f32] {
    for _ in 0..runs {
        box_blur_row(a, b);
        std::mem::swap(&mut a, &mut b);
    }
    a
}

/// Horizontal passes from `src` into `dst`.
fn blur_rows(
    src: &[f32],
    dst: &mut [f32],
    width: usize,
    runs: usize,
    rows: &mut [f32],
    preprocess: Option<RowFn>,
) {
    let (a, rest) = rows.split_at_mut(width);
    let b = &mut rest[..width];
    for (src_row, dst_row) in src.chunks_exact(width).zip(dst.chunks_exact_mut(width)) {
        match preprocess {
            Some(f) => f(src_row, a),
            None => a.copy_from_slice(src_row),
        }
        dst_row.copy_from_slice(run_passes(&mut *a, &mut *b, runs));
    }
}

/// Horizontal passes over `buf`, row by row in place.
fn blur_rows_in_place(buf: &mut [f32], width: usize, runs: usize, rows: &mut [f32]) {
    let (a, rest) = rows.split_at_mut(width);
    let b = &mut rest[..width];
    for row in buf.chunks_exact_mut(width) {
        a.copy_from_slice(row);
        row.copy_from_slice(run_passes(&mut *a, &mut *b, runs));
    }
}

/// Flips x/y, like a 90° rotation. `dst` becomes `height x width`.
pub fn transpose(src: &[f32], dst: &mut [f32], width: usize, height: usize) {
    debug_assert!(src.len() >= width * height);
    debug_assert!(dst.len() >= width * height);

    let mut j = 0;
    while j + 4 <= height {
        let row0 = &src[j * width..(j + 1) * width];
        let row1 = &src[(j + 1) * width..(j + 2) * width];
        let row2 = &src[(j + 2) * width..(j + 3) * width];
        let row3 = &src[(j + 3) * width..(j + 4) * width];
        for i in 0..width {
            let out = &mut dst[i * height + j..i * height + j + 4];
            out[0] = row0[i];
            out[1] = row1[i];
            out[2] = row2[i];
            out[3] = row3[i];
        }
        j += 4;
    }

    for j in j..height {
        let row = &src[j * width..(j + 1) * width];
        for (i, &v) in row.iter().enumerate() {
            dst[i * height + j] = v;
        }
    }
}

/// Blurs `src` into `dst` with `runs` passes per axis.
///
/// `preprocess` is applied to each row before the first horizontal pass.
/// `scratch` must hold at least [`scratch_len`]`(width, height)` floats.
pub fn blur(
    src: &[f32],
    dst: &mut [f32],
    scratch: &mut [f32],
    width: usize,
    height: usize,
    runs: usize,
    preprocess: Option<RowFn>,
) {
    let len = width * height;
    if len == 0 {
        return;
    }
    let (transposed, rows) = scratch.split_at_mut(len);
    let transposed = &mut transposed[..len];
    let dst = &mut dst[..len];

    blur_rows(&src[..len], dst, width, runs, rows, preprocess);
    transpose(dst, transposed, width, height);

    // after transposing, width and height are swapped
    blur_rows_in_place(transposed, height, runs, rows);
    transpose(transposed, dst, height, width);
}

/// Like [`blur`], with the plane as both source and destination.
pub fn blur_in_place(buf: &mut [f32], scratch: &mut [f32], width: usize, height: usize, runs: usize) {
    let len = width * height;
    if len == 0 {
        return;
    }
    let (transposed, rows) = scratch.split_at_mut(len);
    let transposed = &mut transposed[..len];
    let buf = &mut buf[..len];

    blur_rows_in_place(buf, width, runs, rows);
    transpose(buf, transposed, width, height);
    blur_rows_in_place(transposed, height, runs, rows);
    transpose(transposed, buf, height, width);
}
