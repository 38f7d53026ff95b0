use std::borrow::Cow;

use image::{GrayImage, RgbImage};

use super::error::{ScanError, ScanResult};

// Luminance source
//------------------------------------------------------------------------------

/// Greyscale view of an image. Values run from 0 (black) to 255 (white).
pub trait LuminanceSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    /// Fills `buf[..width]` with the luminance of row `y`.
    fn row(&self, y: usize, buf: &mut [u8]);

    /// Whole image, row-major with a stride of `width`.
    fn matrix(&self) -> Cow<'_, [u8]>;
}

/// Owned row-major luminance buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanarLuminance {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PlanarLuminance {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> ScanResult<Self> {
        if width == 0 || height == 0 || data.len() != width * height {
            return Err(ScanError::InvalidArgument);
        }
        Ok(Self { width, height, data })
    }

    pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> u8) -> Self {
        let data = (0..height).flat_map(|y| (0..width).map(move |x| (x, y))).map(|(x, y)| f(x, y));
        Self { width, height, data: data.collect() }
    }
}

impl LuminanceSource for PlanarLuminance {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn row(&self, y: usize, buf: &mut [u8]) {
        let off = y * self.width;
        buf[..self.width].copy_from_slice(&self.data[off..off + self.width]);
    }

    fn matrix(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.data)
    }
}

impl LuminanceSource for GrayImage {
    fn width(&self) -> usize {
        self.width() as usize
    }

    fn height(&self) -> usize {
        self.height() as usize
    }

    fn row(&self, y: usize, buf: &mut [u8]) {
        let w = LuminanceSource::width(self);
        let off = y * w;
        buf[..w].copy_from_slice(&self.as_raw()[off..off + w]);
    }

    fn matrix(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.as_raw())
    }
}

#[inline]
fn rgb_luma(r: u8, g: u8, b: u8) -> u8 {
    ((306 * r as u32 + 601 * g as u32 + 117 * b as u32 + 0x200) >> 10) as u8
}

impl LuminanceSource for RgbImage {
    fn width(&self) -> usize {
        self.width() as usize
    }

    fn height(&self) -> usize {
        self.height() as usize
    }

    fn row(&self, y: usize, buf: &mut [u8]) {
        let w = LuminanceSource::width(self);
        let raw = &self.as_raw()[y * w * 3..(y + 1) * w * 3];
        for (out, px) in buf[..w].iter_mut().zip(raw.chunks_exact(3)) {
            *out = rgb_luma(px[0], px[1], px[2]);
        }
    }

    fn matrix(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.pixels().map(|p| rgb_luma(p[0], p[1], p[2])).collect())
    }
}

#[cfg(test)]
mod luminance_tests {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::{LuminanceSource, PlanarLuminance};
    use crate::ScanError;

    #[test]
    fn test_planar() {
        let lum = PlanarLuminance::from_fn(3, 2, |x, y| (x + 10 * y) as u8);
        let mut buf = [0u8; 3];
        lum.row(1, &mut buf);
        assert_eq!(buf, [10, 11, 12]);
        assert_eq!(&*lum.matrix(), &[0, 1, 2, 10, 11, 12]);
        assert_eq!(PlanarLuminance::new(2, 2, vec![0; 3]), Err(ScanError::InvalidArgument));
    }

    #[test]
    fn test_images() {
        let gray = GrayImage::from_pixel(4, 2, Luma([77]));
        assert_eq!(LuminanceSource::width(&gray), 4);
        assert!(gray.matrix().iter().all(|&l| l == 77));

        let mut rgb = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        rgb.put_pixel(1, 1, Rgb([0, 0, 0]));
        let mut buf = [0u8; 2];
        rgb.row(1, &mut buf);
        assert_eq!(buf, [255, 0]);
        assert_eq!(&*rgb.matrix(), &[255, 255, 255, 0]);
    }
}
