use std::fmt::{Display, Formatter};

use image::{GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::common::bit_matrix::BitMatrix;
use crate::common::byte_matrix::ByteMatrix;
use crate::common::codec::Mode;
use crate::common::error::ScanResult;
use crate::common::mask::MaskPattern;
use crate::common::metadata::{ECLevel, Version};

/// Light modules around the symbol when rendering.
pub const QUIET_ZONE: u32 = 4;

/// A finished QR symbol together with the parameters it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QRCode {
    matrix: ByteMatrix,
    version: Version,
    ec_level: ECLevel,
    mask: MaskPattern,
    mode: Mode,
}

impl QRCode {
    pub(super) fn new(
        matrix: ByteMatrix,
        version: Version,
        ec_level: ECLevel,
        mask: MaskPattern,
        mode: Mode,
    ) -> Self {
        debug_assert!(matrix.width() == version.width(), "Matrix doesn't match version");
        Self { matrix, version, ec_level, mask, mode }
    }

    pub fn matrix(&self) -> &ByteMatrix {
        &self.matrix
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn width(&self) -> usize {
        self.matrix.width()
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ec_level
    }

    pub fn mask(&self) -> MaskPattern {
        self.mask
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn metadata(&self) -> String {
        format!(
            "{{ Version: {}, Ec level: {}, Mask: {}, Mode: {:?} }}",
            *self.version, self.ec_level, *self.mask, self.mode
        )
    }

    pub fn count_dark_modules(&self) -> usize {
        (0..self.matrix.height()).map(|y| self.matrix.row(y).iter().filter(|&&c| c == 1).count()).sum()
    }

    /// One bit per module, dark modules set.
    pub fn to_bit_matrix(&self) -> ScanResult<BitMatrix> {
        let w = self.matrix.width();
        let mut bits = BitMatrix::square(w)?;
        for y in 0..w {
            for x in 0..w {
                if self.matrix.is_dark(x, y) {
                    bits.set(x, y);
                }
            }
        }
        Ok(bits)
    }
}

// Render
//------------------------------------------------------------------------------

impl QRCode {
    /// Black on white image with `module_sz` pixels per module and a four module quiet zone.
    pub fn to_image(&self, module_sz: u32) -> GrayImage {
        let module_sz = module_sz.max(1);
        let qz_sz = QUIET_ZONE * module_sz;
        let total_sz = qz_sz * 2 + self.width() as u32 * module_sz;

        let mut canvas = GrayImage::from_pixel(total_sz, total_sz, Luma([255]));
        for y in 0..self.width() {
            for x in 0..self.width() {
                if !self.matrix.is_dark(x, y) {
                    continue;
                }
                let left = qz_sz + x as u32 * module_sz;
                let top = qz_sz + y as u32 * module_sz;
                let rect = Rect::at(left as i32, top as i32).of_size(module_sz, module_sz);
                draw_filled_rect_mut(&mut canvas, rect, Luma([0]));
            }
        }
        canvas
    }

    pub fn to_str(&self) -> String {
        let w = self.width();
        let mut res = String::with_capacity((w + 1) * w * 3);
        for y in 0..w {
            for x in 0..w {
                res.push(if self.matrix.is_dark(x, y) { '█' } else { ' ' });
            }
            res.push('\n');
        }
        res
    }
}

impl Display for QRCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.metadata())?;
        write!(f, "{}", self.matrix)
    }
}

#[cfg(test)]
mod qrcode_tests {
    use crate::builder::QRBuilder;
    use crate::common::metadata::ECLevel;

    #[test]
    fn test_render_size_and_quiet_zone() {
        let qr = QRBuilder::new("render").ec_level(ECLevel::L).build().unwrap();
        let img = qr.to_image(3);
        assert_eq!(img.width(), (21 + 8) * 3);
        assert_eq!(img.height(), img.width());
        // Quiet zone is light, top left finder corner is dark
        assert_eq!(img.get_pixel(11, 11).0, [255]);
        assert_eq!(img.get_pixel(12, 12).0, [0]);
        assert_eq!(img.get_pixel(14, 14).0, [0]);
        // Inner light ring of the finder
        assert_eq!(img.get_pixel(12 + 3, 12 + 3).0, [255]);
    }

    #[test]
    fn test_bit_matrix() {
        let qr = QRBuilder::new("bits").build().unwrap();
        let bits = qr.to_bit_matrix().unwrap();
        assert_eq!(bits.width(), qr.width());
        assert_eq!(bits.count_ones(), qr.count_dark_modules());
        assert!(bits.get(0, 0));
        assert!(!bits.get(7, 7));
    }

    #[test]
    fn test_display() {
        let qr = QRBuilder::new("1").ec_level(ECLevel::Q).build().unwrap();
        let s = qr.to_string();
        assert!(s.starts_with("{ Version: 1, Ec level: Q, Mask: "));
        assert_eq!(s.lines().count(), 22);
        assert_eq!(qr.to_str().lines().count(), 21);
    }
}
