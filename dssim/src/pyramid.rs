//! Channel planes, multiscale pyramids and their precomputed statistics.
//!
//! Every channel keeps a flat list of levels, finest first. Each level is
//! half the size of the previous one (floored) and carries its blurred mean
//! and blurred mean-of-squares, which is all the comparator needs from an
//! original image.

use log::trace;

use crate::attr::scratch_buffer;
use crate::blur::{blur, blur_in_place, scratch_len, square_row};
use crate::consts::CHROMA_DENOISE_RUNS;
use crate::image::{average_rows_2x, try_alloc, ImageF};
use crate::Result;

/// One pyramid level of a channel.
#[derive(Debug, Clone)]
pub(crate) struct ChanScale {
    /// Raw samples (chroma is pre-blurred).
    pub(crate) img: ImageF,
    /// `blur(img)`
    pub(crate) mu: ImageF,
    /// `blur(img²)`
    pub(crate) img_sq_blur: ImageF,
}

/// A channel and its pyramid.
#[derive(Debug, Clone)]
pub(crate) struct DssimChan {
    pub(crate) scales: Vec<ChanScale>,
    /// Box-blur passes per axis.
    pub(crate) blur_size: usize,
    pub(crate) is_chroma: bool,
}

/// An image converted and preprocessed for comparison.
///
/// Build with one of the `Dssim::create_image*` methods. Pass by reference as
/// the original (any number of times) or by value as the modified image,
/// which is consumed by the comparison.
#[derive(Debug, Clone)]
pub struct DssimImage {
    pub(crate) chans: Vec<DssimChan>,
}

impl DssimImage {
    /// Number of channels: 1 for gray, 3 for color.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.chans.len()
    }

    /// Width of the full-resolution luminance plane.
    #[must_use]
    pub fn width(&self) -> usize {
        self.chans[0].scales[0].img.width()
    }

    /// Height of the full-resolution luminance plane.
    #[must_use]
    pub fn height(&self) -> usize {
        self.chans[0].scales[0].img.height()
    }

    /// Number of pyramid levels of the luminance channel.
    #[must_use]
    pub fn num_scales(&self) -> usize {
        self.chans[0].scales.len()
    }

    /// `(width, height)` of every level of a channel, finest first.
    #[must_use]
    pub fn scale_dimensions(&self, channel: usize) -> Vec<(usize, usize)> {
        self.chans
            .get(channel)
            .map(|chan| {
                chan.scales
                    .iter()
                    .map(|s| (s.img.width(), s.img.height()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl DssimChan {
    /// Builds the pyramid from a full-resolution plane and precomputes every
    /// level.
    ///
    /// Stops after `num_scales` levels, or earlier once halving would leave a
    /// dimension of zero.
    pub(crate) fn new(
        img: ImageF,
        is_chroma: bool,
        num_scales: usize,
        detail_size: usize,
        tmp: &mut Vec<f32>,
    ) -> Result<Self> {
        let blur_size = if is_chroma { 2 } else { 1 } * (detail_size + 1);

        // Downsample from raw planes, before any blurring touches them
        let mut levels = vec![img];
        while levels.len() < num_scales {
            let last = &levels[levels.len() - 1];
            if last.width() / 2 == 0 || last.height() / 2 == 0 {
                break;
            }
            let half = last.downsample_2x()?;
            levels.push(half);
        }

        let scales = levels
            .into_iter()
            .map(|img| ChanScale::new(img, is_chroma, blur_size, tmp))
            .collect::<Result<Vec<_>>>()?;

        trace!(
            "channel built: chroma={is_chroma} blur_size={blur_size} levels={}",
            scales.len()
        );

        Ok(Self {
            scales,
            blur_size,
            is_chroma,
        })
    }
}

impl ChanScale {
    fn new(mut img: ImageF, is_chroma: bool, blur_size: usize, tmp: &mut Vec<f32>) -> Result<Self> {
        let (width, height) = (img.width(), img.height());
        let scratch = scratch_buffer(tmp, scratch_len(width, height))?;

        if is_chroma {
            // coarse chroma denoising
            blur_in_place(img.data_mut(), scratch, width, height, CHROMA_DENOISE_RUNS);
        }

        let mut mu = ImageF::new(width, height)?;
        blur(img.data(), mu.data_mut(), scratch, width, height, blur_size, None);

        let mut img_sq_blur = ImageF::new(width, height)?;
        blur(
            img.data(),
            img_sq_blur.data_mut(),
            scratch,
            width,
            height,
            blur_size,
            Some(square_row),
        );

        Ok(Self {
            img,
            mu,
            img_sq_blur,
        })
    }
}

/// Allocates the channel planes and fills them row by row from `row_fn`.
///
/// `row_fn(rows, y)` receives one output row per channel, all `width` long.
/// With `subsample_chroma`, luma rows are the plane itself while chroma rows
/// are staging buffers; every second row the staged pair is averaged 2x2 into
/// the half-resolution chroma planes.
pub(crate) fn convert_planes<F>(
    channels: usize,
    width: usize,
    height: usize,
    subsample_chroma: bool,
    mut row_fn: F,
) -> Result<Vec<ImageF>>
where
    F: FnMut(&mut [&mut [f32]], usize),
{
    let subsample = subsample_chroma && channels > 1;

    let mut planes = Vec::with_capacity(channels);
    for ch in 0..channels {
        let plane = if subsample && ch > 0 {
            ImageF::new(width / 2, height / 2)?
        } else {
            ImageF::new(width, height)?
        };
        planes.push(plane);
    }

    if !subsample {
        for y in 0..height {
            let mut rows: Vec<&mut [f32]> = planes.iter_mut().map(|p| p.row_mut(y)).collect();
            row_fn(&mut rows, y);
        }
        return Ok(planes);
    }

    // two consecutive source rows per chroma channel
    let mut pairs = (1..channels)
        .map(|_| try_alloc(width * 2))
        .collect::<Result<Vec<_>>>()?;

    for y in 0..height {
        let half = y & 1;
        let (luma, chroma) = planes.split_at_mut(1);
        {
            let mut rows: Vec<&mut [f32]> = Vec::with_capacity(channels);
            rows.push(luma[0].row_mut(y));
            for pair in &mut pairs {
                rows.push(&mut pair[half * width..(half + 1) * width]);
            }
            row_fn(&mut rows, y);
        }

        if half == 1 {
            for (plane, pair) in chroma.iter_mut().zip(&pairs) {
                let (top, bottom) = pair.split_at(width);
                average_rows_2x(top, bottom, plane.row_mut(y / 2));
            }
        }
    }

    Ok(planes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> ImageF {
        let data = (0..width * height)
            .map(|i| (i % 97) as f32 / 97.0)
            .collect();
        ImageF::from_vec(data, width, height)
    }

    #[test]
    fn test_pyramid_dimensions() {
        let mut tmp = Vec::new();
        let chan = DssimChan::new(ramp(37, 20), false, 5, 1, &mut tmp).unwrap();
        let dims: Vec<_> = chan.scales.iter().map(|s| (s.img.width(), s.img.height())).collect();
        assert_eq!(dims, vec![(37, 20), (18, 10), (9, 5), (4, 2), (2, 1)]);
        assert_eq!(chan.blur_size, 2);
    }

    #[test]
    fn test_pyramid_stops_before_empty_level() {
        let mut tmp = Vec::new();
        let chan = DssimChan::new(ramp(3, 3), false, 4, 1, &mut tmp).unwrap();
        assert_eq!(chan.scales.len(), 2);
        assert_eq!(chan.scales[1].img.width(), 1);

        let chan = DssimChan::new(ramp(1, 1), true, 4, 1, &mut tmp).unwrap();
        assert_eq!(chan.scales.len(), 1);
        assert_eq!(chan.blur_size, 4);
    }

    #[test]
    fn test_statistics_of_constant_plane() {
        let mut tmp = Vec::new();
        let img = ImageF::from_vec(vec![0.25; 64], 8, 8);
        let chan = DssimChan::new(img, true, 1, 1, &mut tmp).unwrap();
        let level = &chan.scales[0];
        for (&mu, &sq) in level.mu.data().iter().zip(level.img_sq_blur.data()) {
            assert!((mu - 0.25).abs() < 1e-6);
            assert!((sq - 0.0625).abs() < 1e-6);
        }
    }

    #[test]
    fn test_only_chroma_is_preblurred() {
        let mut data = vec![0.0f32; 81];
        data[4 * 9 + 4] = 1.0;
        let mut tmp = Vec::new();

        let luma = DssimChan::new(ImageF::from_vec(data.clone(), 9, 9), false, 1, 1, &mut tmp).unwrap();
        assert_eq!(luma.scales[0].img.data(), data.as_slice());

        let chroma = DssimChan::new(ImageF::from_vec(data, 9, 9), true, 1, 1, &mut tmp).unwrap();
        let img = &chroma.scales[0].img;
        // two 3-tap passes per axis: [1, 2, 3, 2, 1] / 9 on each side
        assert!((img.row(4)[4] - 1.0 / 9.0).abs() < 1e-6);
        assert!((img.row(4)[6] - 1.0 / 27.0).abs() < 1e-6);
        assert!((img.row(2)[2] - 1.0 / 81.0).abs() < 1e-6);
        assert_eq!(img.row(4)[7], 0.0);
        let sum: f32 = img.data().iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_scratch_grows_to_largest_level() {
        let mut tmp = Vec::new();
        DssimChan::new(ramp(16, 8), false, 3, 1, &mut tmp).unwrap();
        assert!(tmp.len() >= scratch_len(16, 8));
    }

    #[test]
    fn test_convert_planes_full_resolution() {
        let planes = convert_planes(3, 4, 2, false, |rows, y| {
            for (ch, row) in rows.iter_mut().enumerate() {
                row.fill((ch * 10 + y) as f32);
            }
        })
        .unwrap();
        assert_eq!(planes.len(), 3);
        assert_eq!(planes[2].width(), 4);
        assert_eq!(planes[1].row(1)[3], 11.0);
    }

    #[test]
    fn test_convert_planes_subsamples_chroma() {
        let planes = convert_planes(3, 5, 5, true, |rows, y| {
            rows[0].fill(1.0);
            for (x, v) in rows[1].iter_mut().enumerate() {
                *v = (x + y * 5) as f32;
            }
            rows[2].fill(y as f32);
        })
        .unwrap();
        assert_eq!((planes[0].width(), planes[0].height()), (5, 5));
        assert_eq!((planes[1].width(), planes[1].height()), (2, 2));
        // rows 0/1, cols 0/1: (0 + 1 + 5 + 6) / 4
        assert!((planes[1].row(0)[0] - 3.0).abs() < 1e-6);
        // rows 2/3, cols 2/3: (12 + 13 + 17 + 18) / 4
        assert!((planes[1].row(1)[1] - 15.0).abs() < 1e-6);
        assert!((planes[2].row(1)[1] - 2.5).abs() < 1e-6);
    }
}
