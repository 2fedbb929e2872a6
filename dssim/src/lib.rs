//! # DSSIM
//!
//! Multiscale structural dissimilarity between two images.
//!
//! Images are converted to a Lab-like color space, split into a pyramid of
//! progressively halved scales, and compared with SSIM at every scale and
//! channel. The weighted mean SSIM is reported as `1/ssim - 1`:
//!
//! - 0: images are identical
//! - larger values mean more visible differences (unbounded above)
//!
//! The blur behind the local statistics is a repeated 3-tap box filter, a
//! fast approximation of a Gaussian.
//!
//! ## Example
//!
//! ```rust
//! use dssim::{Dssim, Img, RGB8};
//!
//! let width = 16;
//! let height = 16;
//! let pixels: Vec<RGB8> = (0..width * height)
//!     .map(|i| RGB8::new((i % 256) as u8, ((i * 2) % 256) as u8, ((i * 3) % 256) as u8))
//!     .collect();
//! let img = Img::new(pixels, width, height);
//!
//! let mut dssim = Dssim::new();
//! let original = dssim.create_image_rgb(img.as_ref(), dssim::DEFAULT_GAMMA)?;
//! let modified = dssim.create_image_rgb(img.as_ref(), dssim::DEFAULT_GAMMA)?;
//!
//! // `modified` is consumed by the comparison; `original` can be reused.
//! let score = dssim.compare(&original, modified)?;
//! assert!(score.abs() < 1e-9);
//! # Ok::<(), dssim::DssimError>(())
//! ```
//!
//! ## Sessions
//!
//! A [`Dssim`] session holds the tuning parameters and a scratch buffer that
//! grows to the largest image seen. Every operation takes `&mut self`, so a
//! session is used by one thread at a time; run comparisons in parallel with
//! one session per thread. A [`DssimImage`] built by one session can be
//! shared read-only as the original across threads.
//!
//! ## Features
//!
//! - **`internals`**: Expose internal modules for testing/benchmarking (unstable API)

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

// Internal modules - exposed with "internals" feature for testing/benchmarking
#[cfg(feature = "internals")]
pub mod blur;
#[cfg(not(feature = "internals"))]
pub(crate) mod blur;

#[cfg(feature = "internals")]
pub mod consts;
#[cfg(not(feature = "internals"))]
pub(crate) mod consts;

#[cfg(feature = "internals")]
pub mod image;
#[cfg(not(feature = "internals"))]
pub(crate) mod image;

#[cfg(feature = "internals")]
pub mod lab;
#[cfg(not(feature = "internals"))]
pub(crate) mod lab;

mod attr;
mod compare;
mod pyramid;

use std::str::FromStr;

pub use attr::Dssim;
pub use pyramid::DssimImage;

// Re-export imgref and rgb types for convenience
pub use imgref::{Img, ImgRef, ImgVec};
pub use rgb::{RGB8, RGBA8};

pub use consts::{DEFAULT_GAMMA, MAX_SCALES};

/// Result type for DSSIM operations.
pub type Result<T, E = DssimError> = std::result::Result<T, E>;

/// Error type for DSSIM operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum DssimError {
    /// Only gray (1) and color (3) images are supported.
    #[error("unsupported channel count: {0} (expected 1 or 3)")]
    UnsupportedChannelCount(usize),

    /// Pixel layout name wasn't recognized.
    #[error("unknown color type: {0:?}")]
    UnknownColorType(String),

    /// Width or height is zero.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Width provided.
        width: usize,
        /// Height provided.
        height: usize,
    },

    /// `width * height` doesn't fit in memory addressing.
    #[error("image dimensions overflow: {width}x{height}")]
    DimensionOverflow {
        /// Width provided.
        width: usize,
        /// Height provided.
        height: usize,
    },

    /// Fewer scanlines than the declared height.
    #[error("expected {expected} rows, got {actual}")]
    MissingRows {
        /// Declared height.
        expected: usize,
        /// Number of rows supplied.
        actual: usize,
    },

    /// A scanline is shorter than `width * bytes_per_pixel`.
    #[error("row {row} has {actual} bytes, expected at least {expected}")]
    InvalidBufferSize {
        /// Index of the offending row.
        row: usize,
        /// Minimum number of bytes.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// Gamma must be finite and positive.
    #[error("invalid gamma: {0}")]
    InvalidGamma(f64),

    /// Scale weights were rejected.
    #[error("invalid scale weights: {0}")]
    InvalidWeights(&'static str),

    /// Chroma weight must be finite and non-negative.
    #[error("invalid color weight: {0}")]
    InvalidColorWeight(f64),

    /// A plane or scratch allocation failed.
    #[error("failed to allocate {floats} floats")]
    OutOfMemory {
        /// Requested number of `f32` elements.
        floats: usize,
    },
}

/// Declared layout of 8-bit input pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorType {
    /// One byte per pixel, gamma-encoded gray.
    Gray,
    /// Three bytes per pixel, gamma-encoded RGB.
    Rgb,
    /// Four bytes per pixel, RGB with straight alpha.
    Rgba,
    /// RGBA input compared on lightness only.
    RgbaToGray,
    /// Already converted single-channel data, copied as-is.
    Luma,
    /// Already converted interleaved L, A, b bytes, copied as-is.
    Lab,
}

impl ColorType {
    /// Number of planes the layout produces.
    #[must_use]
    pub fn channels(self) -> usize {
        match self {
            Self::Gray | Self::RgbaToGray | Self::Luma => 1,
            Self::Rgb | Self::Rgba | Self::Lab => 3,
        }
    }

    /// Bytes per input pixel.
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray | Self::Luma => 1,
            Self::Rgb | Self::Lab => 3,
            Self::Rgba | Self::RgbaToGray => 4,
        }
    }
}

impl FromStr for ColorType {
    type Err = DssimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gray" | "grey" => Ok(Self::Gray),
            "rgb" => Ok(Self::Rgb),
            "rgba" => Ok(Self::Rgba),
            "rgba-gray" | "rgba-grey" | "rgba_to_gray" => Ok(Self::RgbaToGray),
            "luma" => Ok(Self::Luma),
            "lab" => Ok(Self::Lab),
            _ => Err(DssimError::UnknownColorType(s.to_string())),
        }
    }
}
