use crate::common::error::{ScanError, ScanResult};
use crate::common::metadata::Version;

// Mode
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, Hash)]
pub enum Mode {
    Terminator = 0b0000,
    Numeric = 0b0001,
    Alphanumeric = 0b0010,
    StructuredAppend = 0b0011,
    Byte = 0b0100,
    Fnc1First = 0b0101,
    Eci = 0b0111,
    Kanji = 0b1000,
    Fnc1Second = 0b1001,
    Hanzi = 0b1101,
}

static ALPHANUMERIC_CHARS: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

impl Mode {
    pub fn from_bits(bits: u32) -> ScanResult<Self> {
        let mode = match bits {
            0b0000 => Self::Terminator,
            0b0001 => Self::Numeric,
            0b0010 => Self::Alphanumeric,
            0b0011 => Self::StructuredAppend,
            0b0100 => Self::Byte,
            0b0101 => Self::Fnc1First,
            0b0111 => Self::Eci,
            0b1000 => Self::Kanji,
            0b1001 => Self::Fnc1Second,
            0b1101 => Self::Hanzi,
            _ => return Err(ScanError::Format),
        };
        Ok(mode)
    }

    pub fn bits(self) -> u32 {
        self as u32
    }

    #[inline]
    pub fn alphanumeric_digit(char: u8) -> Option<u16> {
        ALPHANUMERIC_CHARS.iter().position(|&c| c == char).map(|p| p as u16)
    }

    #[inline]
    pub fn alphanumeric_char(digit: u32) -> ScanResult<char> {
        ALPHANUMERIC_CHARS.get(digit as usize).map(|&c| c as char).ok_or(ScanError::Format)
    }

    /// Packs up to 3 digits or 2 alphanumeric characters into one chunk value.
    pub fn encode_chunk(&self, data: &[u8]) -> u32 {
        let len = data.len();
        match self {
            Self::Numeric => {
                debug_assert!(len <= 3, "Data is too long for numeric chunk: {len}");
                data.iter().fold(0, |n, b| n * 10 + (b - b'0') as u32)
            }
            Self::Alphanumeric => {
                debug_assert!(len <= 2, "Data is too long for alphanumeric chunk: {len}");
                data.iter().fold(0, |n, &b| n * 45 + Self::alphanumeric_digit(b).unwrap_or(0) as u32)
            }
            _ => {
                debug_assert!(len == 1, "Data is too long for byte chunk: {len}");
                data[0] as u32
            }
        }
    }

    /// Bit length of a chunk of `len` characters.
    pub fn chunk_bits(&self, len: usize) -> usize {
        match self {
            Self::Numeric => [0, 4, 7, 10][len],
            Self::Alphanumeric => [0, 6, 11][len],
            Self::Kanji | Self::Hanzi => 13,
            _ => 8,
        }
    }

    pub fn contains(&self, byte: u8) -> bool {
        match self {
            Self::Numeric => byte.is_ascii_digit(),
            Self::Alphanumeric => Self::alphanumeric_digit(byte).is_some(),
            Self::Byte => true,
            _ => false,
        }
    }

    pub fn encoded_len(&self, len: usize) -> usize {
        match *self {
            Self::Numeric => (len * 10).div_ceil(3),
            Self::Alphanumeric => (len * 11).div_ceil(2),
            Self::Byte => len * 8,
            Self::Kanji | Self::Hanzi => len * 13,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod mode_tests {
    use test_case::test_case;

    use super::Mode::{self, *};
    use crate::ScanError;

    #[test]
    fn test_encode_numeric() {
        assert_eq!(Numeric.encode_chunk(b"123"), 123);
        assert_eq!(Numeric.encode_chunk(b"45"), 45);
        assert_eq!(Numeric.encode_chunk(b"6"), 6);
    }

    #[test]
    fn test_encode_alphanumeric() {
        assert_eq!(Alphanumeric.encode_chunk(b"AC"), 10 * 45 + 12);
        assert_eq!(Alphanumeric.encode_chunk(b"-"), 41);
        assert_eq!(Alphanumeric.encode_chunk(b"%:"), 38 * 45 + 44);
    }

    #[test]
    fn test_contains() {
        assert!(Numeric.contains(b'0'));
        assert!(!Numeric.contains(b'A'));
        assert!(Alphanumeric.contains(b'Z'));
        assert!(Alphanumeric.contains(b' '));
        assert!(Alphanumeric.contains(b':'));
        assert!(!Alphanumeric.contains(b'a'));
        assert!(!Alphanumeric.contains(b'@'));
        assert!(Byte.contains(b'@'));
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(Numeric.encoded_len(3), 10);
        assert_eq!(Numeric.encoded_len(2), 7);
        assert_eq!(Numeric.encoded_len(1), 4);
        assert_eq!(Alphanumeric.encoded_len(2), 11);
        assert_eq!(Alphanumeric.encoded_len(1), 6);
        assert_eq!(Byte.encoded_len(1), 8);
        assert_eq!(Kanji.encoded_len(2), 26);
    }

    #[test_case(0b0001, Numeric)]
    #[test_case(0b0100, Byte)]
    #[test_case(0b0111, Eci)]
    #[test_case(0b1101, Hanzi)]
    #[test_case(0b0000, Terminator)]
    fn test_from_bits(bits: u32, mode: Mode) {
        assert_eq!(Mode::from_bits(bits), Ok(mode));
        assert_eq!(mode.bits(), bits);
    }

    #[test]
    fn test_invalid_mode() {
        assert_eq!(Mode::from_bits(0b0110), Err(ScanError::Format));
        assert_eq!(Mode::alphanumeric_char(45), Err(ScanError::Format));
        assert_eq!(Mode::alphanumeric_char(44), Ok(':'));
    }
}

// Segment
//------------------------------------------------------------------------------

/// One mode run of the payload: header plus the encoded characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub mode: Mode,
    // Value written in the character count field
    pub char_cnt: usize,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn new(mode: Mode, char_cnt: usize, data: Vec<u8>) -> Self {
        Self { mode, char_cnt, data }
    }

    // Payload bits excluding mode and char count fields
    pub fn data_bits(&self) -> usize {
        match self.mode {
            Mode::Byte => self.data.len() * 8,
            m => m.encoded_len(self.char_cnt),
        }
    }

    pub fn bit_len(&self, ver: Version) -> usize {
        ver.mode_bits() + ver.char_cnt_bits(self.mode) + self.data_bits()
    }
}
