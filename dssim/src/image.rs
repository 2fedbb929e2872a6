//! Plane storage for DSSIM.
//!
//! Planes are tightly packed (stride == width) because the blur transposes
//! whole buffers and the comparator walks them as flat slices.

use imgref::ImgVec;

use crate::DssimError;

/// Allocates a zeroed buffer, reporting allocation failure instead of aborting.
pub(crate) fn try_alloc(len: usize) -> Result<Vec<f32>, DssimError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| DssimError::OutOfMemory { floats: len })?;
    data.resize(len, 0.0);
    Ok(data)
}

/// Single-channel floating point image.
#[derive(Debug, Clone, Default)]
pub struct ImageF {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl ImageF {
    /// Creates a new plane filled with zeros.
    ///
    /// # Errors
    /// Fails if `width * height` overflows or the allocation fails.
    pub fn new(width: usize, height: usize) -> Result<Self, DssimError> {
        let len = width
            .checked_mul(height)
            .ok_or(DssimError::DimensionOverflow { width, height })?;
        Ok(Self {
            data: try_alloc(len)?,
            width,
            height,
        })
    }

    #[cfg(test)]
    pub(crate) fn from_vec(data: Vec<f32>, width: usize, height: usize) -> Self {
        assert_eq!(data.len(), width * height);
        Self {
            data,
            width,
            height,
        }
    }

    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [f32] {
        let start = y * self.width;
        &mut self.data[start..start + self.width]
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Checks if two planes have the same dimensions.
    #[must_use]
    pub fn same_size(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height
    }

    /// Makes a plane of `floor(w/2) x floor(h/2)` where every sample is the
    /// mean of the corresponding 2x2 block.
    ///
    /// # Errors
    /// Fails if the allocation fails.
    pub fn downsample_2x(&self) -> Result<Self, DssimError> {
        let mut half = Self::new(self.width / 2, self.height / 2)?;
        for y in 0..half.height {
            average_rows_2x(self.row(y * 2), self.row(y * 2 + 1), half.row_mut(y));
        }
        Ok(half)
    }

    /// Converts into an `ImgVec` without copying.
    #[must_use]
    pub fn into_imgvec(self) -> ImgVec<f32> {
        ImgVec::new(self.data, self.width, self.height)
    }
}

/// Box-averages two source rows into one row of half width.
///
/// A trailing odd column is dropped.
#[inline]
pub(crate) fn average_rows_2x(top: &[f32], bottom: &[f32], dst: &mut [f32]) {
    for (x, out) in dst.iter_mut().enumerate() {
        *out = 0.25 * (top[x * 2] + top[x * 2 + 1] + bottom[x * 2] + bottom[x * 2 + 1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_creation() {
        let img = ImageF::new(100, 50).unwrap();
        assert_eq!(img.width(), 100);
        assert_eq!(img.height(), 50);
        assert_eq!(img.data().len(), 5000);
        assert!(img.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_dimension_overflow() {
        assert!(matches!(
            ImageF::new(usize::MAX, 2),
            Err(DssimError::DimensionOverflow { .. })
        ));
    }

    #[test]
    fn test_pixel_access() {
        let mut img = ImageF::new(10, 10).unwrap();
        img.row_mut(7)[2] = 9.0;
        assert!((img.row(7)[2] - 9.0).abs() < 0.001);
        assert!((img.data()[7 * 10 + 2] - 9.0).abs() < 0.001);
    }

    #[test]
    fn test_downsample_averages_blocks() {
        // 5x3: the odd column and odd row are dropped
        let data: Vec<f32> = (0..15).map(|v| v as f32).collect();
        let img = ImageF::from_vec(data, 5, 3);
        let half = img.downsample_2x().unwrap();
        assert_eq!((half.width(), half.height()), (2, 1));
        assert!((half.row(0)[0] - (0.0 + 1.0 + 5.0 + 6.0) / 4.0).abs() < 1e-6);
        assert!((half.row(0)[1] - (2.0 + 3.0 + 7.0 + 8.0) / 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_downsample_to_empty() {
        let img = ImageF::from_vec(vec![1.0], 1, 1);
        let half = img.downsample_2x().unwrap();
        assert!(half.data().is_empty());
    }

    #[test]
    fn test_into_imgvec() {
        let img = ImageF::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 2);
        let v = img.into_imgvec();
        assert_eq!(v.width(), 3);
        assert_eq!(v.height(), 2);
        assert_eq!(v.buf()[4], 5.0);
    }
}
