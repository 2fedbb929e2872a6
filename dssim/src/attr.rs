//! The comparison session: tuning parameters, image construction and the
//! shared scratch buffer.

use imgref::ImgRef;
use log::debug;
use rgb::{FromSlice, RGB8, RGBA8};

use crate::consts::{
    DEFAULT_COLOR_WEIGHT, DEFAULT_DETAIL_SIZE, DEFAULT_NUM_SCALES, DEFAULT_WEIGHTS, MAX_CHANS,
    MAX_SCALES,
};
use crate::image::try_alloc;
use crate::lab::{convert_row_gray, convert_row_rgb, convert_row_rgba, copy_row, gamma_lut, gray_lut};
use crate::pyramid::{convert_planes, DssimChan, DssimImage};
use crate::{ColorType, DssimError, Result};

/// Returns `len` floats of scratch, growing `tmp` if it is too small.
///
/// The buffer never shrinks, so images of varying size don't reallocate.
pub(crate) fn scratch_buffer(tmp: &mut Vec<f32>, len: usize) -> Result<&mut [f32]> {
    if tmp.len() < len {
        // replaced rather than resized: the old contents are garbage anyway
        *tmp = Vec::new();
        *tmp = try_alloc(len)?;
    }
    Ok(&mut tmp[..len])
}

/// DSSIM session.
///
/// Holds the tuning parameters and a scratch buffer reused by every image
/// conversion and comparison. Not meant to be shared between threads; use one
/// session per thread instead.
///
/// ```rust
/// use dssim::Dssim;
///
/// let mut dssim = Dssim::new();
/// dssim.set_scales(3, Some(&[1.0, 2.0, 1.0]))?;
/// dssim.set_color_handling(false, 0.5)?;
/// assert_eq!(dssim.scale_weights(), &[0.25, 0.5, 0.25]);
/// # Ok::<(), dssim::DssimError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Dssim {
    pub(crate) scale_weights: Vec<f64>,
    pub(crate) color_weight: f64,
    detail_size: usize,
    subsample_chroma: bool,
    pub(crate) tmp: Vec<f32>,
}

impl Default for Dssim {
    fn default() -> Self {
        Self {
            scale_weights: normalize(&DEFAULT_WEIGHTS[..DEFAULT_NUM_SCALES]),
            color_weight: DEFAULT_COLOR_WEIGHT,
            detail_size: DEFAULT_DETAIL_SIZE,
            subsample_chroma: true,
            tmp: Vec::new(),
        }
    }
}

fn normalize(weights: &[f64]) -> Vec<f64> {
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| w / sum).collect()
}

impl Dssim {
    /// Creates a session with default settings: 4 scales, color weight 0.95,
    /// chroma subsampling on.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of scales and optionally their weights.
    ///
    /// At most [`MAX_SCALES`] are used, and no more than `weights` provides.
    /// Without weights the built-in table is used. Weights are always
    /// normalized to sum to 1.
    ///
    /// # Errors
    /// Returns [`DssimError::InvalidWeights`] if `num` is 0, a weight is
    /// negative or not finite, or the weights sum to 0. The session is left
    /// unchanged in that case.
    pub fn set_scales(&mut self, num: usize, weights: Option<&[f64]>) -> Result<()> {
        let weights = weights.unwrap_or(&DEFAULT_WEIGHTS);
        let num = num.min(MAX_SCALES).min(weights.len());
        if num == 0 {
            return Err(DssimError::InvalidWeights("at least one scale is required"));
        }

        let weights = &weights[..num];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(DssimError::InvalidWeights("weights must be finite and non-negative"));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(DssimError::InvalidWeights("weights must not sum to zero"));
        }

        self.scale_weights = normalize(weights);
        Ok(())
    }

    /// Sets chroma subsampling and the weight of the chroma channels.
    ///
    /// # Errors
    /// Returns [`DssimError::InvalidColorWeight`] if `color_weight` is negative
    /// or not finite. The session is left unchanged in that case.
    pub fn set_color_handling(&mut self, subsample_chroma: bool, color_weight: f64) -> Result<()> {
        if !color_weight.is_finite() || color_weight < 0.0 {
            return Err(DssimError::InvalidColorWeight(color_weight));
        }
        self.subsample_chroma = subsample_chroma;
        self.color_weight = color_weight;
        Ok(())
    }

    /// Sets the detail size. Larger values widen the blur behind the local
    /// statistics, so structure is judged over bigger neighbourhoods.
    pub fn set_detail_size(&mut self, detail_size: usize) {
        self.detail_size = detail_size;
    }

    /// Number of scales compared.
    #[must_use]
    pub fn num_scales(&self) -> usize {
        self.scale_weights.len()
    }

    /// Normalized per-scale weights, finest first.
    #[must_use]
    pub fn scale_weights(&self) -> &[f64] {
        &self.scale_weights
    }

    #[must_use]
    pub fn color_weight(&self) -> f64 {
        self.color_weight
    }

    #[must_use]
    pub fn detail_size(&self) -> usize {
        self.detail_size
    }

    #[must_use]
    pub fn subsample_chroma(&self) -> bool {
        self.subsample_chroma
    }

    /// Converts and preprocesses an image given as scanlines.
    ///
    /// `rows` must contain at least `height` rows of at least
    /// `width * color_type.bytes_per_pixel()` bytes. `gamma` is the encoding
    /// exponent; samples are expanded with `(v/255)^(1/gamma)`, so pass
    /// roughly `1/2.2` ([`DEFAULT_GAMMA`](crate::DEFAULT_GAMMA)) for
    /// typical 8-bit images. It is unused by the passthrough layouts.
    ///
    /// # Errors
    /// Fails on zero dimensions, short or missing rows, a non-positive gamma,
    /// or allocation failure.
    pub fn create_image(
        &mut self,
        rows: &[&[u8]],
        color_type: ColorType,
        width: usize,
        height: usize,
        gamma: f64,
    ) -> Result<DssimImage> {
        check_dimensions(width, height)?;
        if rows.len() < height {
            return Err(DssimError::MissingRows {
                expected: height,
                actual: rows.len(),
            });
        }
        let expected = width
            .checked_mul(color_type.bytes_per_pixel())
            .ok_or(DssimError::DimensionOverflow { width, height })?;
        if let Some((row, r)) = rows[..height]
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() < expected)
        {
            return Err(DssimError::InvalidBufferSize {
                row,
                expected,
                actual: r.len(),
            });
        }
        if !(gamma.is_finite() && gamma > 0.0) {
            return Err(DssimError::InvalidGamma(gamma));
        }

        let channels = color_type.channels();
        match color_type {
            ColorType::Gray => {
                let lut = gray_lut(gamma);
                self.create_image_float_callback(channels, width, height, |out, y| {
                    convert_row_gray(&lut, &rows[y][..width], out);
                })
            }
            ColorType::Rgb => {
                let lut = gamma_lut(gamma);
                self.create_image_float_callback(channels, width, height, |out, y| {
                    convert_row_rgb(&lut, rows[y][..expected].as_rgb(), out);
                })
            }
            ColorType::Rgba | ColorType::RgbaToGray => {
                let lut = gamma_lut(gamma);
                self.create_image_float_callback(channels, width, height, |out, y| {
                    convert_row_rgba(&lut, rows[y][..expected].as_rgba(), y, out);
                })
            }
            ColorType::Luma | ColorType::Lab => {
                self.create_image_float_callback(channels, width, height, |out, y| {
                    copy_row(&rows[y][..expected], out);
                })
            }
        }
    }

    /// Converts and preprocesses an RGB image.
    ///
    /// # Errors
    /// See [`Dssim::create_image`].
    pub fn create_image_rgb(&mut self, img: ImgRef<'_, RGB8>, gamma: f64) -> Result<DssimImage> {
        check_gamma(gamma)?;
        let lut = gamma_lut(gamma);
        let rows: Vec<&[RGB8]> = img.rows().collect();
        self.create_image_float_callback(3, img.width(), img.height(), |out, y| {
            convert_row_rgb(&lut, rows[y], out);
        })
    }

    /// Converts and preprocesses an RGBA image, compositing translucent
    /// pixels over a coordinate-dependent pattern.
    ///
    /// # Errors
    /// See [`Dssim::create_image`].
    pub fn create_image_rgba(&mut self, img: ImgRef<'_, RGBA8>, gamma: f64) -> Result<DssimImage> {
        check_gamma(gamma)?;
        let lut = gamma_lut(gamma);
        let rows: Vec<&[RGBA8]> = img.rows().collect();
        self.create_image_float_callback(3, img.width(), img.height(), |out, y| {
            convert_row_rgba(&lut, rows[y], y, out);
        })
    }

    /// Converts and preprocesses a gray image.
    ///
    /// # Errors
    /// See [`Dssim::create_image`].
    pub fn create_image_gray(&mut self, img: ImgRef<'_, u8>, gamma: f64) -> Result<DssimImage> {
        check_gamma(gamma)?;
        let lut = gray_lut(gamma);
        let rows: Vec<&[u8]> = img.rows().collect();
        self.create_image_float_callback(1, img.width(), img.height(), |out, y| {
            convert_row_gray(&lut, rows[y], out);
        })
    }

    /// Builds an image from a row callback writing already separated channel
    /// values.
    ///
    /// `row_fn(rows, y)` gets `num_channels` output slices of `width` floats
    /// for scanline `y` (L first, then A and b). Values should be roughly in
    /// the 0..1 range for the SSIM constants to be meaningful.
    ///
    /// ```rust
    /// use dssim::Dssim;
    ///
    /// let mut dssim = Dssim::new();
    /// let img = dssim.create_image_float_callback(1, 8, 8, |rows, y| {
    ///     rows[0].fill(y as f32 / 8.0);
    /// })?;
    /// assert_eq!(img.channels(), 1);
    /// # Ok::<(), dssim::DssimError>(())
    /// ```
    ///
    /// # Errors
    /// Fails if `num_channels` is not 1 or 3, a dimension is zero, or an
    /// allocation fails.
    pub fn create_image_float_callback<F>(
        &mut self,
        num_channels: usize,
        width: usize,
        height: usize,
        row_fn: F,
    ) -> Result<DssimImage>
    where
        F: FnMut(&mut [&mut [f32]], usize),
    {
        if num_channels != 1 && num_channels != MAX_CHANS {
            return Err(DssimError::UnsupportedChannelCount(num_channels));
        }
        check_dimensions(width, height)?;

        // halving a 1-pixel side would leave empty chroma planes
        let subsample = self.subsample_chroma && width >= 2 && height >= 2;
        let planes = convert_planes(num_channels, width, height, subsample, row_fn)?;

        let num_scales = self.num_scales();
        let detail_size = self.detail_size;
        let chans = planes
            .into_iter()
            .enumerate()
            .map(|(ch, plane)| DssimChan::new(plane, ch > 0, num_scales, detail_size, &mut self.tmp))
            .collect::<Result<Vec<_>>>()?;

        let image = DssimImage { chans };
        debug!(
            "image created: {width}x{height}, {num_channels} channel(s), {} scale(s), subsampled chroma: {}",
            image.num_scales(),
            subsample && num_channels > 1
        );
        Ok(image)
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(DssimError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .map(|_| ())
        .ok_or(DssimError::DimensionOverflow { width, height })
}

fn check_gamma(gamma: f64) -> Result<()> {
    if gamma.is_finite() && gamma > 0.0 {
        Ok(())
    } else {
        Err(DssimError::InvalidGamma(gamma))
    }
}
