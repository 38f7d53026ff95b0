use std::fmt::{Display, Formatter};
use std::ops::Deref;

use super::codec::Mode;
use super::ec::rectify_info;
use super::error::{ScanError, ScanResult};
use super::mask::MaskPattern;

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash)]
pub enum ECLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl ECLevel {
    /// Two bit value stored in format information.
    pub fn format_bits(self) -> u32 {
        match self {
            Self::L => 0b01,
            Self::M => 0b00,
            Self::Q => 0b11,
            Self::H => 0b10,
        }
    }

    pub fn from_format_bits(bits: u32) -> ScanResult<Self> {
        match bits {
            0b01 => Ok(Self::L),
            0b00 => Ok(Self::M),
            0b11 => Ok(Self::Q),
            0b10 => Ok(Self::H),
            _ => Err(ScanError::Format),
        }
    }
}

impl Display for ECLevel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let s = match self {
            Self::L => "L",
            Self::M => "M",
            Self::Q => "Q",
            Self::H => "H",
        };
        f.write_str(s)
    }
}

// Version
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct Version(usize);

impl Deref for Version {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Version {
    pub fn new(ver: usize) -> ScanResult<Self> {
        match ver {
            1..=40 => Ok(Self(ver)),
            _ => Err(ScanError::InvalidVersion),
        }
    }

    /// Version for a symbol of `dimension` modules per side.
    pub fn from_dimension(dimension: usize) -> ScanResult<Self> {
        if dimension % 4 != 1 || dimension < 21 {
            return Err(ScanError::Format);
        }
        Self::new((dimension - 17) / 4).map_err(|_| ScanError::Format)
    }

    pub fn width(self) -> usize {
        self.0 * 4 + 17
    }

    // Modules left for data and ec codewords once function patterns are drawn
    pub fn raw_modules(self) -> usize {
        let v = self.0;
        let mut raw = (16 * v + 128) * v + 64;
        if v >= 2 {
            let n = v / 7 + 2;
            raw -= (25 * n - 10) * n - 55;
            if v >= 7 {
                raw -= 36;
            }
        }
        raw
    }

    pub fn total_codewords(self) -> usize {
        self.raw_modules() / 8
    }

    pub fn ecc_per_block(self, ecl: ECLevel) -> usize {
        ECC_PER_BLOCK[ecl as usize][self.0 - 1]
    }

    pub fn num_blocks(self, ecl: ECLevel) -> usize {
        NUM_BLOCKS[ecl as usize][self.0 - 1]
    }

    pub fn total_ecc(self, ecl: ECLevel) -> usize {
        self.ecc_per_block(ecl) * self.num_blocks(ecl)
    }

    pub fn data_codewords(self, ecl: ECLevel) -> usize {
        self.total_codewords() - self.total_ecc(ecl)
    }

    pub fn data_bit_capacity(self, ecl: ECLevel) -> usize {
        self.data_codewords(ecl) * 8
    }

    /// Centre coordinates shared by rows and columns of alignment patterns.
    pub fn alignment_pattern(self) -> &'static [usize] {
        ALIGNMENT_PATTERN_POSITIONS[self.0 - 1]
    }

    pub fn mode_bits(self) -> usize {
        4
    }

    pub fn char_cnt_bits(self, mode: Mode) -> usize {
        let idx = match self.0 {
            1..=9 => 0,
            10..=26 => 1,
            _ => 2,
        };
        match mode {
            Mode::Numeric => [10, 12, 14][idx],
            Mode::Alphanumeric => [9, 11, 13][idx],
            Mode::Byte => [8, 16, 16][idx],
            Mode::Kanji | Mode::Hanzi => [8, 10, 12][idx],
            _ => 0,
        }
    }

    /// 18 bit version information word, present from version 7.
    pub fn info(self) -> u32 {
        debug_assert!(self.0 >= 7, "No version info below 7: Version {}", self.0);
        VERSION_INFOS[self.0 - 7]
    }

    pub fn from_info(bits: u32) -> ScanResult<Self> {
        let info = rectify_info(bits, &VERSION_INFOS, VERSION_ERROR_CAPACITY)?;
        Self::new((info >> 12) as usize).map_err(|_| ScanError::Format)
    }
}


// Format information
//------------------------------------------------------------------------------

pub const FORMAT_MASK: u32 = 0x5412;

pub const FORMAT_ERROR_CAPACITY: u32 = 3;

pub const VERSION_ERROR_CAPACITY: u32 = 3;

const FORMAT_POLY: u32 = 0x537;

const VERSION_POLY: u32 = 0x1f25;

// Remainder of value * x^(deg poly) divided by poly over GF(2)
const fn bch_remainder(value: u32, poly: u32) -> u32 {
    let msb = 32 - poly.leading_zeros();
    let mut v = value << (msb - 1);
    while 32 - v.leading_zeros() >= msb {
        v ^= poly << (32 - v.leading_zeros() - msb);
    }
    v
}

const fn build_format_infos() -> [u32; 32] {
    let mut res = [0u32; 32];
    let mut i = 0;
    while i < 32 {
        res[i] = ((i as u32) << 10 | bch_remainder(i as u32, FORMAT_POLY)) ^ FORMAT_MASK;
        i += 1;
    }
    res
}

const fn build_version_infos() -> [u32; 34] {
    let mut res = [0u32; 34];
    let mut i = 0;
    while i < 34 {
        let v = i as u32 + 7;
        res[i] = v << 12 | bch_remainder(v, VERSION_POLY);
        i += 1;
    }
    res
}

/// Masked 15 bit format words indexed by `ec bits << 3 | mask`.
pub static FORMAT_INFOS: [u32; 32] = build_format_infos();

/// 18 bit version words for versions 7 to 40.
pub static VERSION_INFOS: [u32; 34] = build_version_infos();

pub fn format_info(ecl: ECLevel, mask: MaskPattern) -> u32 {
    FORMAT_INFOS[(ecl.format_bits() << 3 | *mask as u32) as usize]
}

/// Decodes either copy of the format information, preferring the closer one.
pub fn parse_format_info(main: u32, side: u32) -> ScanResult<(ECLevel, MaskPattern)> {
    let info = [main, side]
        .into_iter()
        .filter_map(|bits| rectify_info(bits, &FORMAT_INFOS, FORMAT_ERROR_CAPACITY).ok())
        .min_by_key(|&info| (info ^ main).count_ones().min((info ^ side).count_ones()))
        .ok_or(ScanError::Format)?;
    let data = (info ^ FORMAT_MASK) >> 10;
    let ecl = ECLevel::from_format_bits(data >> 3)?;
    Ok((ecl, MaskPattern::new((data & 0b111) as u8)?))
}


// Tables
//------------------------------------------------------------------------------

static ECC_PER_BLOCK: [[usize; 40]; 4] = [
    [
        7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

static NUM_BLOCKS: [[usize; 40]; 4] = [
    [
        1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12, 13,
        14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21, 23,
        25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27, 29,
        34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32, 35,
        37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];

static ALIGNMENT_PATTERN_POSITIONS: [&[usize]; 40] = [
    &[],
    &[6, 18],
    &[6, 22],
    &[6, 26],
    &[6, 30],
    &[6, 34],
    &[6, 22, 38],
    &[6, 24, 42],
    &[6, 26, 46],
    &[6, 28, 50],
    &[6, 30, 54],
    &[6, 32, 58],
    &[6, 34, 62],
    &[6, 26, 46, 66],
    &[6, 26, 48, 70],
    &[6, 26, 50, 74],
    &[6, 30, 54, 78],
    &[6, 30, 56, 82],
    &[6, 30, 58, 86],
    &[6, 34, 62, 90],
    &[6, 28, 50, 72, 94],
    &[6, 26, 50, 74, 98],
    &[6, 30, 54, 78, 102],
    &[6, 28, 54, 80, 106],
    &[6, 32, 58, 84, 110],
    &[6, 30, 58, 86, 114],
    &[6, 34, 62, 90, 118],
    &[6, 26, 50, 74, 98, 122],
    &[6, 30, 54, 78, 102, 126],
    &[6, 26, 52, 78, 104, 130],
    &[6, 30, 56, 82, 108, 134],
    &[6, 34, 60, 86, 112, 138],
    &[6, 30, 58, 86, 114, 142],
    &[6, 34, 62, 90, 118, 146],
    &[6, 30, 54, 78, 102, 126, 150],
    &[6, 24, 50, 76, 102, 128, 154],
    &[6, 28, 54, 80, 106, 132, 158],
    &[6, 32, 58, 84, 110, 136, 162],
    &[6, 26, 54, 82, 110, 138, 166],
    &[6, 30, 58, 86, 114, 142, 170],
];
