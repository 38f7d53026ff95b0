use encoding_rs::{
    Encoding, BIG5, EUC_KR, GB18030, GBK, ISO_8859_10, ISO_8859_13, ISO_8859_14, ISO_8859_15,
    ISO_8859_16, ISO_8859_2, ISO_8859_3, ISO_8859_4, ISO_8859_5, ISO_8859_6, ISO_8859_7,
    ISO_8859_8, SHIFT_JIS, UTF_16BE, UTF_8, WINDOWS_1250, WINDOWS_1251, WINDOWS_1252,
    WINDOWS_1254, WINDOWS_1256, WINDOWS_874,
};
use log::debug;

use super::error::{ScanError, ScanResult};

// Charset
//------------------------------------------------------------------------------

/// Byte to text mapping selected by an ECI designator, a caller hint or a guess.
///
/// ISO-8859-1 is kept apart from the WHATWG `windows-1252` table encoding_rs maps its
/// label to, since the two differ on 0x80..0xA0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Latin1,
    Encoding(&'static Encoding),
}

pub const DEFAULT_CHARSET: Charset = Charset::Latin1;

impl Charset {
    pub fn from_eci(value: u32) -> ScanResult<Self> {
        let enc = match value {
            1 | 3 | 27 | 170 => return Ok(Self::Latin1),
            4 => ISO_8859_2,
            5 => ISO_8859_3,
            6 => ISO_8859_4,
            7 => ISO_8859_5,
            8 => ISO_8859_6,
            9 => ISO_8859_7,
            10 => ISO_8859_8,
            11 => WINDOWS_1254,
            12 => ISO_8859_10,
            13 => WINDOWS_874,
            15 => ISO_8859_13,
            16 => ISO_8859_14,
            17 => ISO_8859_15,
            18 => ISO_8859_16,
            20 => SHIFT_JIS,
            21 => WINDOWS_1250,
            22 => WINDOWS_1251,
            23 => WINDOWS_1252,
            24 => WINDOWS_1256,
            25 => UTF_16BE,
            26 => UTF_8,
            28 => BIG5,
            29 => GB18030,
            30 => EUC_KR,
            _ => {
                debug!("Unsupported ECI {value}");
                return Err(ScanError::UnsupportedCharset);
            }
        };
        Ok(Self::Encoding(enc))
    }

    /// ECI designator announcing this charset, if it has one.
    pub fn eci(self) -> Option<u32> {
        let enc = match self {
            Self::Latin1 => return Some(3),
            Self::Encoding(enc) => enc,
        };
        let value = [
            (ISO_8859_2, 4),
            (ISO_8859_3, 5),
            (ISO_8859_4, 6),
            (ISO_8859_5, 7),
            (ISO_8859_6, 8),
            (ISO_8859_7, 9),
            (ISO_8859_8, 10),
            (WINDOWS_1254, 11),
            (ISO_8859_10, 12),
            (WINDOWS_874, 13),
            (ISO_8859_13, 15),
            (ISO_8859_14, 16),
            (ISO_8859_15, 17),
            (ISO_8859_16, 18),
            (SHIFT_JIS, 20),
            (WINDOWS_1250, 21),
            (WINDOWS_1251, 22),
            (WINDOWS_1252, 23),
            (WINDOWS_1256, 24),
            (UTF_16BE, 25),
            (UTF_8, 26),
            (BIG5, 28),
            (GB18030, 29),
            (EUC_KR, 30),
        ]
        .iter()
        .find(|(e, _)| *e == enc)?
        .1;
        Some(value)
    }

    /// Looks a charset up by a WHATWG label such as `"utf-8"` or `"shift_jis"`.
    pub fn for_label(label: &str) -> ScanResult<Self> {
        let label = label.trim();
        if ["iso-8859-1", "iso8859_1", "latin1", "l1"].iter().any(|l| l.eq_ignore_ascii_case(label))
        {
            return Ok(Self::Latin1);
        }
        Encoding::for_label(label.as_bytes())
            .map(Self::Encoding)
            .ok_or(ScanError::UnsupportedCharset)
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            Self::Encoding(enc) => enc.decode_without_bom_handling(bytes).0.into_owned(),
        }
    }

    /// Encodes `text`, or `None` when a character has no mapping in this charset.
    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Self::Latin1 => text.chars().map(|c| u8::try_from(c as u32).ok()).collect(),
            Self::Encoding(enc) if enc == UTF_16BE => {
                Some(text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect())
            }
            Self::Encoding(enc) => {
                let (bytes, _, unmappable) = enc.encode(text);
                (!unmappable).then(|| bytes.into_owned())
            }
        }
    }

    pub fn is_shift_jis(self) -> bool {
        self == Self::Encoding(SHIFT_JIS)
    }
}

#[cfg(test)]
mod charset_tests {
    use test_case::test_case;

    use super::Charset;
    use crate::ScanError;

    #[test_case(4, &[200], "\u{10c}")]
    #[test_case(7, &[207], "\u{42f}")]
    #[test_case(3, &[0xe9, 0x80], "\u{e9}\u{80}")]
    #[test_case(26, &[0xc3, 0xa9], "\u{e9}")]
    #[test_case(20, &[0x93, 0xfa], "\u{65e5}")]
    #[test_case(25, &[0x00, 0x41, 0x04, 0x2f], "A\u{42f}")]
    fn test_eci_decode(eci: u32, bytes: &[u8], expected: &str) {
        assert_eq!(Charset::from_eci(eci).unwrap().decode(bytes), expected);
    }

    #[test]
    fn test_unknown_eci() {
        assert_eq!(Charset::from_eci(0), Err(ScanError::UnsupportedCharset));
        assert_eq!(Charset::from_eci(899), Err(ScanError::UnsupportedCharset));
    }

    #[test]
    fn test_eci_round_trip() {
        for eci in [3, 4, 7, 20, 22, 25, 26, 30] {
            assert_eq!(Charset::from_eci(eci).unwrap().eci(), Some(eci));
        }
    }

    #[test]
    fn test_encode() {
        assert_eq!(Charset::Latin1.encode("caf\u{e9}"), Some(b"caf\xe9".to_vec()));
        assert_eq!(Charset::Latin1.encode("\u{42f}"), None);
        let cyrillic = Charset::for_label("iso-8859-5").unwrap();
        assert_eq!(cyrillic.encode("\u{42f}"), Some(vec![207]));
        assert_eq!(Charset::from_eci(25).unwrap().encode("A"), Some(vec![0, 0x41]));
        assert!(Charset::for_label("shift_jis").unwrap().is_shift_jis());
        assert_eq!(Charset::for_label("Latin1"), Ok(Charset::Latin1));
        assert_eq!(Charset::for_label("klingon"), Err(ScanError::UnsupportedCharset));
    }
}

// Guessing
//------------------------------------------------------------------------------

/// Picks the charset of a byte segment carrying no ECI: UTF-8 when it has multi byte
/// sequences, Shift_JIS when it has runs of double byte or katakana characters, else
/// ISO-8859-1.
pub fn guess_encoding(bytes: &[u8], hint: Option<Charset>) -> Charset {
    if let Some(hint) = hint {
        return hint;
    }
    if bytes.len() > 2 && matches!(bytes[..2], [0xfe, 0xff] | [0xff, 0xfe]) {
        return Charset::Encoding(if bytes[0] == 0xfe { UTF_16BE } else { encoding_rs::UTF_16LE });
    }

    let len = bytes.len();
    let mut can_be_iso = true;
    let mut can_be_sjis = true;
    let mut can_be_utf8 = true;
    let mut utf8_left = 0;
    let mut utf8_multi = 0;
    let mut sjis_left = 0;
    let mut sjis_katakana = 0;
    let mut sjis_cur_katakana = 0;
    let mut sjis_cur_double = 0;
    let mut sjis_max_katakana = 0;
    let mut sjis_max_double = 0;
    let mut iso_high_other = 0;

    let utf8_bom = len > 3 && bytes[..3] == [0xef, 0xbb, 0xbf];

    for &value in bytes {
        if !(can_be_iso || can_be_sjis || can_be_utf8) {
            break;
        }

        if can_be_utf8 {
            if utf8_left > 0 {
                if value & 0x80 == 0 {
                    can_be_utf8 = false;
                } else {
                    utf8_left -= 1;
                }
            } else if value & 0x80 != 0 {
                if value & 0x40 == 0 {
                    can_be_utf8 = false;
                } else {
                    utf8_multi += 1;
                    utf8_left = match value {
                        v if v & 0x20 == 0 => 1,
                        v if v & 0x10 == 0 => 2,
                        v if v & 0x08 == 0 => 3,
                        _ => {
                            can_be_utf8 = false;
                            0
                        }
                    };
                }
            }
        }

        if can_be_iso {
            if value > 0x7f && value < 0xa0 {
                can_be_iso = false;
            } else if value > 0x9f && (value < 0xc0 || value == 0xd7 || value == 0xf7) {
                iso_high_other += 1;
            }
        }

        if can_be_sjis {
            if sjis_left > 0 {
                if value < 0x40 || value == 0x7f || value > 0xfc {
                    can_be_sjis = false;
                } else {
                    sjis_left -= 1;
                }
            } else if value == 0x80 || value == 0xa0 || value > 0xef {
                can_be_sjis = false;
            } else if value > 0xa0 && value < 0xe0 {
                sjis_katakana += 1;
                sjis_cur_double = 0;
                sjis_cur_katakana += 1;
                sjis_max_katakana = sjis_max_katakana.max(sjis_cur_katakana);
            } else if value > 0x7f {
                sjis_left += 1;
                sjis_cur_katakana = 0;
                sjis_cur_double += 1;
                sjis_max_double = sjis_max_double.max(sjis_cur_double);
            } else {
                sjis_cur_katakana = 0;
                sjis_cur_double = 0;
            }
        }
    }

    can_be_utf8 &= utf8_left == 0;
    can_be_sjis &= sjis_left == 0;

    if can_be_utf8 && (utf8_bom || utf8_multi > 0) {
        return Charset::Encoding(UTF_8);
    }
    if can_be_sjis && (sjis_max_katakana >= 3 || sjis_max_double >= 3) {
        return Charset::Encoding(SHIFT_JIS);
    }
    if can_be_iso && can_be_sjis {
        return if (sjis_max_katakana == 2 && sjis_katakana == 2) || iso_high_other * 10 >= len {
            Charset::Encoding(SHIFT_JIS)
        } else {
            Charset::Latin1
        };
    }
    if can_be_iso {
        return Charset::Latin1;
    }
    if can_be_sjis {
        return Charset::Encoding(SHIFT_JIS);
    }
    if can_be_utf8 {
        return Charset::Encoding(UTF_8);
    }
    Charset::Encoding(GBK)
}


// ECI aware text builder
//------------------------------------------------------------------------------

/// Accumulates bytes in the charset currently in force and flushes them to text whenever
/// an ECI designator switches charsets.
#[derive(Debug, Clone)]
pub struct EciStringBuilder {
    result: String,
    pending: Vec<u8>,
    charset: Charset,
}

impl Default for EciStringBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CHARSET)
    }
}

impl EciStringBuilder {
    pub fn new(charset: Charset) -> Self {
        Self { result: String::new(), pending: Vec::new(), charset }
    }

    pub fn append_byte(&mut self, byte: u8) {
        self.pending.push(byte);
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Appends an ASCII character as its byte value.
    pub fn append_char(&mut self, c: char) {
        debug_assert!(c.is_ascii(), "Non ascii char: {c:?}");
        self.pending.push(c as u8);
    }

    pub fn append_str(&mut self, s: &str) {
        for c in s.chars() {
            self.append_char(c);
        }
    }

    pub fn append_eci(&mut self, value: u32) -> ScanResult<()> {
        let charset = Charset::from_eci(value)?;
        self.flush();
        self.charset = charset;
        Ok(())
    }

    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.result.push_str(&self.charset.decode(&self.pending));
            self.pending.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.result.is_empty() && self.pending.is_empty()
    }

    pub fn build(mut self) -> String {
        self.flush();
        self.result
    }
}
