use log::debug;

use crate::common::bit_matrix::BitMatrix;
use crate::common::error::{ScanError, ScanResult};
use crate::common::mask::MaskPattern;
use crate::common::metadata::{parse_format_info, ECLevel, Version};

// Function patterns
//------------------------------------------------------------------------------

/// Modules of a symbol that carry no codeword bits: finders with separators and format
/// info, alignment patterns, timing patterns, and version info from version 7.
pub fn function_pattern(ver: Version) -> ScanResult<BitMatrix> {
    let dim = ver.width();
    let mut fp = BitMatrix::square(dim)?;

    fp.set_region(0, 0, 9, 9)?;
    fp.set_region(dim - 8, 0, 8, 9)?;
    fp.set_region(0, dim - 8, 9, 8)?;

    let centers = ver.alignment_pattern();
    let last = centers.len().saturating_sub(1);
    for (i, &cy) in centers.iter().enumerate() {
        for (j, &cx) in centers.iter().enumerate() {
            // These three overlap the finders
            if (i == 0 && (j == 0 || j == last)) || (i == last && j == 0) {
                continue;
            }
            fp.set_region(cx - 2, cy - 2, 5, 5)?;
        }
    }

    fp.set_region(6, 9, 1, dim - 17)?;
    fp.set_region(9, 6, dim - 17, 1)?;

    if *ver > 6 {
        fp.set_region(dim - 11, 0, 3, 6)?;
        fp.set_region(0, dim - 11, 6, 3)?;
    }
    Ok(fp)
}

#[cfg(test)]
mod function_pattern_tests {
    use super::function_pattern;
    use crate::common::metadata::Version;

    #[test]
    fn test_data_modules_match_capacity() {
        for v in 1..=40 {
            let ver = Version::new(v).unwrap();
            let fp = function_pattern(ver).unwrap();
            let dim = ver.width();
            assert_eq!(dim * dim - fp.count_ones(), ver.raw_modules(), "Version {v}");
        }
    }

    #[test]
    fn test_version_1_regions() {
        let fp = function_pattern(Version::new(1).unwrap()).unwrap();
        assert!(fp.get(8, 8));
        assert!(fp.get(6, 10));
        assert!(fp.get(10, 6));
        assert!(fp.get(8, 13));
        assert!(!fp.get(9, 9));
        assert!(!fp.get(20, 20));
    }
}

// Bit matrix parser
//------------------------------------------------------------------------------

/// Reads format information, version and codewords out of a sampled symbol.
///
/// The matrix is unmasked in place while reading codewords. [`Self::remask`] undoes that
/// and [`Self::mirror`] transposes the matrix so that a mirrored symbol can be read again.
pub struct BitMatrixParser {
    bits: BitMatrix,
    format: Option<(ECLevel, MaskPattern)>,
    version: Option<Version>,
    unmasked: bool,
}

impl BitMatrixParser {
    pub fn new(bits: BitMatrix) -> ScanResult<Self> {
        let dim = bits.height();
        if dim < 21 || dim & 3 != 1 || bits.width() != dim {
            return Err(ScanError::Format);
        }
        Ok(Self { bits, format: None, version: None, unmasked: false })
    }

    pub fn bits(&self) -> &BitMatrix {
        &self.bits
    }

    fn copy_bit(&self, x: usize, y: usize, acc: u32) -> u32 {
        acc << 1 | self.bits.get(x, y) as u32
    }

    /// Reads both copies of the format information and decodes the closer one.
    pub fn read_format_information(&mut self) -> ScanResult<(ECLevel, MaskPattern)> {
        if let Some(format) = self.format {
            return Ok(format);
        }

        // Around the top left finder
        let mut main = 0;
        for x in 0..6 {
            main = self.copy_bit(x, 8, main);
        }
        main = self.copy_bit(7, 8, main);
        main = self.copy_bit(8, 8, main);
        main = self.copy_bit(8, 7, main);
        for y in (0..6).rev() {
            main = self.copy_bit(8, y, main);
        }

        // Split between the top right and bottom left finders
        let dim = self.bits.height();
        let mut side = 0;
        for y in (dim - 7..dim).rev() {
            side = self.copy_bit(8, y, side);
        }
        for x in dim - 8..dim {
            side = self.copy_bit(x, 8, side);
        }

        let format = parse_format_info(main, side)?;
        debug!("Format information: Ec level {}, Mask {}", format.0, *format.1);
        self.format = Some(format);
        Ok(format)
    }

    /// Version from the dimension up to version 6, else from either version block.
    pub fn read_version(&mut self) -> ScanResult<Version> {
        if let Some(ver) = self.version {
            return Ok(ver);
        }

        let dim = self.bits.height();
        let provisional = (dim - 17) / 4;
        if provisional <= 6 {
            let ver = Version::new(provisional).map_err(|_| ScanError::Format)?;
            self.version = Some(ver);
            return Ok(ver);
        }

        // Top right block
        let mut info = 0;
        for y in (0..6).rev() {
            for x in (dim - 11..dim - 8).rev() {
                info = self.copy_bit(x, y, info);
            }
        }
        if let Ok(ver) = Version::from_info(info) {
            if ver.width() == dim {
                self.version = Some(ver);
                return Ok(ver);
            }
        }

        // Bottom left block
        let mut info = 0;
        for x in (0..6).rev() {
            for y in (dim - 11..dim - 8).rev() {
                info = self.copy_bit(x, y, info);
            }
        }
        let ver = Version::from_info(info)?;
        if ver.width() != dim {
            debug!("Version {} doesn't match dimension {dim}", *ver);
            return Err(ScanError::Format);
        }
        self.version = Some(ver);
        Ok(ver)
    }

    /// Unmasks the matrix and reads all codewords in placement order.
    pub fn read_codewords(&mut self) -> ScanResult<Vec<u8>> {
        let (_, mask) = self.read_format_information()?;
        let ver = self.read_version()?;

        if !self.unmasked {
            self.apply_mask(mask);
            self.unmasked = true;
        }

        let fp = function_pattern(ver)?;
        let dim = self.bits.height();
        let total = ver.total_codewords();
        let mut res = Vec::with_capacity(total);
        let mut byte = 0u8;
        let mut bits_read = 0;
        let mut reading_up = true;

        // Column pairs from the right, skipping the vertical timing pattern
        let mut x = dim - 1;
        while x > 0 {
            if x == 6 {
                x -= 1;
            }
            for count in 0..dim {
                let y = if reading_up { dim - 1 - count } else { count };
                for col in 0..2 {
                    if fp.get(x - col, y) {
                        continue;
                    }
                    byte = byte << 1 | self.bits.get(x - col, y) as u8;
                    bits_read += 1;
                    if bits_read == 8 {
                        res.push(byte);
                        bits_read = 0;
                        byte = 0;
                    }
                }
            }
            reading_up = !reading_up;
            x = x.saturating_sub(2);
        }

        if res.len() != total {
            debug!("Read {} codewords, expected {total}", res.len());
            return Err(ScanError::Format);
        }
        Ok(res)
    }

    /// Restores the mask removed by [`Self::read_codewords`].
    pub fn remask(&mut self) {
        if let (true, Some((_, mask))) = (self.unmasked, self.format) {
            self.apply_mask(mask);
            self.unmasked = false;
        }
    }

    /// Transposes the matrix and forgets what was read from it.
    pub fn mirror(&mut self) {
        self.bits.mirror();
        self.format = None;
        self.version = None;
        self.unmasked = false;
    }

    fn apply_mask(&mut self, mask: MaskPattern) {
        let dim = self.bits.height();
        for y in 0..dim {
            for x in 0..dim {
                if mask.is_masked(x, y) {
                    self.bits.flip(x, y);
                }
            }
        }
    }
}

#[cfg(test)]
mod parser_tests {
    use test_case::test_case;

    use super::BitMatrixParser;
    use crate::builder::QRBuilder;
    use crate::common::{
        error::ScanError,
        mask::MaskPattern,
        metadata::{ECLevel, Version},
    };

    #[test_case(1, ECLevel::H, 3)]
    #[test_case(6, ECLevel::L, 0)]
    #[test_case(7, ECLevel::M, 5)]
    #[test_case(21, ECLevel::Q, 7)]
    fn test_read_metadata(ver: usize, ecl: ECLevel, mask: u8) {
        let qr = QRBuilder::new("parser")
            .version(Version::new(ver).unwrap())
            .ec_level(ecl)
            .mask(MaskPattern::new(mask).unwrap())
            .build()
            .unwrap();
        let mut parser = BitMatrixParser::new(qr.to_bit_matrix().unwrap()).unwrap();
        assert_eq!(parser.read_format_information().unwrap(), (ecl, MaskPattern::new(mask).unwrap()));
        assert_eq!(*parser.read_version().unwrap(), ver);
        assert_eq!(parser.read_codewords().unwrap().len(), qr.version().total_codewords());
    }

    #[test]
    fn test_remask_restores_matrix() {
        let qr = QRBuilder::new("remask").build().unwrap();
        let bits = qr.to_bit_matrix().unwrap();
        let mut parser = BitMatrixParser::new(bits.clone()).unwrap();
        parser.read_codewords().unwrap();
        assert_ne!(parser.bits(), &bits);
        parser.remask();
        assert_eq!(parser.bits(), &bits);
    }

    #[test]
    fn test_mirrored_symbol() {
        let qr = QRBuilder::new("mirror").ec_level(ECLevel::Q).build().unwrap();
        let mut bits = qr.to_bit_matrix().unwrap();
        bits.mirror();
        let mut parser = BitMatrixParser::new(bits).unwrap();
        parser.mirror();
        assert_eq!(parser.read_format_information().unwrap().0, ECLevel::Q);
        assert_eq!(parser.read_format_information().unwrap().1, qr.mask());
    }

    #[test_case(20)]
    #[test_case(23)]
    fn test_bad_dimension(dim: usize) {
        let bits = crate::common::bit_matrix::BitMatrix::square(dim).unwrap();
        assert!(matches!(BitMatrixParser::new(bits), Err(ScanError::Format)));
    }
}
