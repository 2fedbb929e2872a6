//! Multiscale SSIM comparison of two preprocessed images.

use imgref::ImgVec;
use log::{debug, trace, warn};
use wide::f32x8;

use crate::attr::scratch_buffer;
use crate::blur::{blur_in_place, load8, scratch_len};
use crate::consts::{SSIM_C1, SSIM_C2};
use crate::pyramid::{ChanScale, DssimImage};
use crate::{Dssim, Result};

/// `dst[i] *= src[i]`
#[multiversion::multiversion(targets(
    "x86_64+avx512f+avx512bw+avx512cd+avx512dq+avx512vl+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+avx+avx2+bmi1+bmi2+cmpxchg16b+f16c+fma+fxsr+lzcnt+movbe+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3+xsave",
    "x86_64+cmpxchg16b+fxsr+popcnt+sse+sse2+sse3+sse4.1+sse4.2+ssse3",
))]
pub(crate) fn multiply_planes(dst: &mut [f32], src: &[f32]) {
    debug_assert_eq!(dst.len(), src.len());
    let mut dst_chunks = dst.chunks_exact_mut(8);
    let mut src_chunks = src.chunks_exact(8);
    for (d, s) in (&mut dst_chunks).zip(&mut src_chunks) {
        let out: [f32; 8] = (load8(d) * load8(s)).into();
        d.copy_from_slice(&out);
    }
    for (d, &s) in dst_chunks
        .into_remainder()
        .iter_mut()
        .zip(src_chunks.remainder())
    {
        *d *= s;
    }
}

/// Mean SSIM of one channel at one scale.
///
/// Consumes the modified level: its raw plane becomes `blur(img1 * img2)` and,
/// when `keep_map` is set, its `mu` plane becomes the per-pixel SSIM map.
fn compare_scale(
    original: &ChanScale,
    modified: &mut ChanScale,
    blur_size: usize,
    keep_map: bool,
    tmp: &mut Vec<f32>,
) -> Result<f64> {
    let (width, height) = (original.img.width(), original.img.height());
    let scratch = scratch_buffer(tmp, scratch_len(width, height))?;

    let img1_img2_blur = modified.img.data_mut();
    multiply_planes(img1_img2_blur, original.img.data());
    blur_in_place(img1_img2_blur, scratch, width, height, blur_size);

    let mu1 = original.mu.data();
    let img1_sq_blur = original.img_sq_blur.data();
    let img2_sq_blur = modified.img_sq_blur.data();
    let img1_img2_blur = modified.img.data();
    let mu2 = modified.mu.data_mut();

    let mut ssim_sum = 0.0f64;
    for i in 0..width * height {
        let (m1, m2) = (mu1[i], mu2[i]);
        let mu1_sq = f64::from(m1 * m1);
        let mu2_sq = f64::from(m2 * m2);
        let mu1_mu2 = f64::from(m1 * m2);
        let sigma1_sq = f64::from(img1_sq_blur[i]) - mu1_sq;
        let sigma2_sq = f64::from(img2_sq_blur[i]) - mu2_sq;
        let sigma12 = f64::from(img1_img2_blur[i]) - mu1_mu2;

        let ssim = (2.0 * mu1_mu2 + SSIM_C1) * (2.0 * sigma12 + SSIM_C2)
            / ((mu1_sq + mu2_sq + SSIM_C1) * (sigma1_sq + sigma2_sq + SSIM_C2));
        ssim_sum += ssim;

        if keep_map {
            mu2[i] = ssim as f32;
        }
    }

    Ok(ssim_sum / (width * height) as f64)
}

impl Dssim {
    /// Compares `modified` against `original` and returns the DSSIM score.
    ///
    /// 0 means identical; the score grows with visible difference. The
    /// modified image is consumed, its buffers are reused for intermediate
    /// results. The original is left untouched and can be compared again.
    ///
    /// # Errors
    /// Fails only if the scratch buffer can't be allocated.
    pub fn compare(&mut self, original: &DssimImage, modified: DssimImage) -> Result<f64> {
        self.compare_inner(original, modified, false).map(|(score, _)| score)
    }

    /// Like [`Dssim::compare`], also returning the per-pixel SSIM of the
    /// finest luminance level.
    ///
    /// Map values are SSIM (1 where the images match, lower where they
    /// differ). The map is `None` if the images' full-resolution sizes
    /// differ.
    ///
    /// # Errors
    /// Fails only if the scratch buffer can't be allocated.
    pub fn compare_with_map(
        &mut self,
        original: &DssimImage,
        modified: DssimImage,
    ) -> Result<(f64, Option<ImgVec<f32>>)> {
        self.compare_inner(original, modified, true)
    }

    fn compare_inner(
        &mut self,
        original: &DssimImage,
        mut modified: DssimImage,
        want_map: bool,
    ) -> Result<(f64, Option<ImgVec<f32>>)> {
        let mut ssim_sum = 0.0f64;
        let mut total = 0.0f64;
        let mut map = None;

        for (ch, (orig_chan, mod_chan)) in original.chans.iter().zip(&mut modified.chans).enumerate() {
            let levels = orig_chan
                .scales
                .iter()
                .zip(&mut mod_chan.scales)
                .zip(&self.scale_weights)
                .enumerate();

            for (n, ((orig, modi), &scale_weight)) in levels {
                let weight = if orig_chan.is_chroma { self.color_weight } else { 1.0 } * scale_weight;

                let ssim = if orig.img.same_size(&modi.img) {
                    let keep_map = want_map && ch == 0 && n == 0;
                    let ssim = compare_scale(orig, modi, orig_chan.blur_size, keep_map, &mut self.tmp)?;
                    if keep_map {
                        map = Some(std::mem::take(&mut modi.mu).into_imgvec());
                    }
                    ssim
                } else {
                    warn!(
                        "channel {ch} scale {n}: size mismatch {}x{} vs {}x{}, counted as ssim 0",
                        orig.img.width(),
                        orig.img.height(),
                        modi.img.width(),
                        modi.img.height()
                    );
                    0.0
                };
                trace!("channel {ch} scale {n}: ssim={ssim:.8} weight={weight:.4}");

                ssim_sum += weight * ssim;
                total += weight;
            }
        }

        // every level the two pyramids share has weight 0
        if total <= 0.0 {
            debug!("no weighted levels compared, dssim=0");
            return Ok((0.0, map));
        }

        let score = 1.0 / (ssim_sum / total) - 1.0;
        debug!("compared {} channel(s): dssim={score:.8}", original.channels().min(modified.channels()));
        Ok((score, map))
    }
}
