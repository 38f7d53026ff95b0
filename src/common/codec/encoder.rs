use encoding_rs::SHIFT_JIS;
use log::debug;

use super::types::{Mode, Segment};
use crate::common::bit_array::BitArray;
use crate::common::charset::{Charset, DEFAULT_CHARSET};
use crate::common::error::{ScanError, ScanResult};
use crate::common::metadata::{ECLevel, Version};

pub static PADDING_CODEWORDS: [u8; 2] = [0b1110_1100, 0b0001_0001];

// Encoder
//------------------------------------------------------------------------------

/// Data bits of a symbol before error correction: header, payload, terminator and padding.
#[derive(Debug, Clone)]
pub struct EncodedData {
    pub bits: BitArray,
    pub version: Version,
    pub mode: Mode,
}

/// Encodes `data` as a single segment in the densest mode that holds every character.
///
/// Without a `charset`, text is encoded as ISO-8859-1 when possible and as UTF-8 behind an
/// ECI designator otherwise. Without a `version`, the smallest one that fits is used.
pub fn encode(
    data: &str,
    ecl: ECLevel,
    charset: Option<Charset>,
    version: Option<Version>,
) -> ScanResult<EncodedData> {
    let charset = match charset {
        Some(cs) => cs,
        None if DEFAULT_CHARSET.encode(data).is_some() => DEFAULT_CHARSET,
        None => Charset::for_label("utf-8")?,
    };
    let mode = choose_mode(data, charset);
    let seg = build_segment(data, mode, charset)?;

    let eci = match (mode, charset.eci()) {
        (Mode::Byte, Some(v)) if charset != DEFAULT_CHARSET => Some(v),
        _ => None,
    };
    let eci_bits = if eci.is_some() { 12 } else { 0 };

    let ver = match version {
        Some(v) => {
            if !will_fit(eci_bits + seg.bit_len(v), v, ecl) {
                return Err(ScanError::DataTooLong);
            }
            v
        }
        None => recommend_version(&seg, eci_bits, ecl)?,
    };
    debug!("Encoding {} chars in {mode:?} mode, version {}", seg.char_cnt, *ver);

    let mut bits = BitArray::with_capacity(ver.data_bit_capacity(ecl));
    if let Some(v) = eci {
        writer::push_eci(v, &mut bits)?;
    }
    writer::push_segment(&seg, ver, &mut bits)?;
    writer::terminate_bits(ver.data_codewords(ecl), &mut bits)?;

    Ok(EncodedData { bits, version: ver, mode })
}

/// Picks Kanji for Shift_JIS text of double byte characters only, otherwise the densest of
/// numeric, alphanumeric and byte that holds every character.
pub fn choose_mode(data: &str, charset: Charset) -> Mode {
    if charset.is_shift_jis() && is_only_double_byte_kanji(data) {
        return Mode::Kanji;
    }
    let mut has_numeric = false;
    let mut has_alphanumeric = false;
    for c in data.chars() {
        if c.is_ascii_digit() {
            has_numeric = true;
        } else if c.is_ascii() && Mode::Alphanumeric.contains(c as u8) {
            has_alphanumeric = true;
        } else {
            return Mode::Byte;
        }
    }
    if has_alphanumeric {
        Mode::Alphanumeric
    } else if has_numeric {
        Mode::Numeric
    } else {
        Mode::Byte
    }
}

fn is_only_double_byte_kanji(data: &str) -> bool {
    let (bytes, _, unmappable) = SHIFT_JIS.encode(data);
    if unmappable || bytes.len() % 2 != 0 {
        return false;
    }
    bytes.chunks(2).all(|c| matches!(c[0], 0x81..=0x9f | 0xe0..=0xeb))
}

fn build_segment(data: &str, mode: Mode, charset: Charset) -> ScanResult<Segment> {
    let seg = match mode {
        Mode::Numeric | Mode::Alphanumeric => {
            Segment::new(mode, data.len(), data.as_bytes().to_vec())
        }
        Mode::Kanji => {
            let (bytes, _, _) = SHIFT_JIS.encode(data);
            Segment::new(mode, bytes.len() / 2, bytes.into_owned())
        }
        _ => {
            let bytes = charset.encode(data).ok_or(ScanError::UnsupportedCharset)?;
            Segment::new(Mode::Byte, bytes.len(), bytes)
        }
    };
    Ok(seg)
}

// The char count field width depends on the version, so a provisional version is found
// with the version 1 widths first
fn recommend_version(seg: &Segment, eci_bits: usize, ecl: ECLevel) -> ScanResult<Version> {
    let provisional = choose_version(eci_bits + seg.bit_len(Version::new(1)?), ecl)?;
    choose_version(eci_bits + seg.bit_len(provisional), ecl)
}

fn choose_version(bit_len: usize, ecl: ECLevel) -> ScanResult<Version> {
    (1..=40)
        .filter_map(|v| Version::new(v).ok())
        .find(|&v| will_fit(bit_len, v, ecl))
        .ok_or(ScanError::DataTooLong)
}

fn will_fit(bit_len: usize, ver: Version, ecl: ECLevel) -> bool {
    ver.data_codewords(ecl) >= bit_len.div_ceil(8)
}


// Writer for encoded data
//------------------------------------------------------------------------------

pub(super) mod writer {
    use super::PADDING_CODEWORDS;
    use crate::common::bit_array::BitArray;
    use crate::common::codec::{Mode, Segment};
    use crate::common::error::{ScanError, ScanResult};
    use crate::common::metadata::Version;

    pub fn push_eci(value: u32, out: &mut BitArray) -> ScanResult<()> {
        debug_assert!(value < 128, "Only single byte ECI designators are written: {value}");
        out.append_bits(Mode::Eci.bits(), 4)?;
        out.append_bits(value, 8)
    }

    pub fn push_segment(seg: &Segment, ver: Version, out: &mut BitArray) -> ScanResult<()> {
        push_header(seg, ver, out)?;
        match seg.mode {
            Mode::Numeric => push_numeric_data(&seg.data, out),
            Mode::Alphanumeric => push_alphanumeric_data(&seg.data, out),
            Mode::Kanji => push_kanji_data(&seg.data, out),
            _ => push_byte_data(&seg.data, out),
        }
    }

    pub fn push_header(seg: &Segment, ver: Version, out: &mut BitArray) -> ScanResult<()> {
        let len_bits = ver.char_cnt_bits(seg.mode);
        if seg.char_cnt >= 1 << len_bits {
            return Err(ScanError::DataTooLong);
        }
        out.append_bits(seg.mode.bits(), ver.mode_bits())?;
        out.append_bits(seg.char_cnt as u32, len_bits)
    }

    fn push_numeric_data(data: &[u8], out: &mut BitArray) -> ScanResult<()> {
        for chunk in data.chunks(3) {
            let len = Mode::Numeric.chunk_bits(chunk.len());
            out.append_bits(Mode::Numeric.encode_chunk(chunk), len)?;
        }
        Ok(())
    }

    fn push_alphanumeric_data(data: &[u8], out: &mut BitArray) -> ScanResult<()> {
        for chunk in data.chunks(2) {
            let len = Mode::Alphanumeric.chunk_bits(chunk.len());
            out.append_bits(Mode::Alphanumeric.encode_chunk(chunk), len)?;
        }
        Ok(())
    }

    fn push_byte_data(data: &[u8], out: &mut BitArray) -> ScanResult<()> {
        for &b in data {
            out.append_bits(b as u32, 8)?;
        }
        Ok(())
    }

    fn push_kanji_data(data: &[u8], out: &mut BitArray) -> ScanResult<()> {
        for pair in data.chunks(2) {
            let &[hi, lo] = pair else {
                return Err(ScanError::InvalidArgument);
            };
            let code = u16::from_be_bytes([hi, lo]) as u32;
            let subtracted = match code {
                0x8140..=0x9ffc => code - 0x8140,
                0xe040..=0xebbf => code - 0xc140,
                _ => return Err(ScanError::InvalidArgument),
            };
            out.append_bits((subtracted >> 8) * 0xc0 + (subtracted & 0xff), 13)?;
        }
        Ok(())
    }

    /// Appends up to 4 terminator bits, zeros to the byte boundary and alternating pad
    /// codewords until exactly `num_data_bytes` bytes are filled.
    pub fn terminate_bits(num_data_bytes: usize, out: &mut BitArray) -> ScanResult<()> {
        let capacity = num_data_bytes * 8;
        if out.size() > capacity {
            return Err(ScanError::DataTooLong);
        }

        let term_len = (capacity - out.size()).min(4);
        out.append_bits(0, term_len)?;

        let offset = out.size() & 7;
        if offset > 0 {
            out.append_bits(0, 8 - offset)?;
        }

        let remain_bytes = num_data_bytes - out.size_in_bytes();
        for pc in PADDING_CODEWORDS.iter().copied().cycle().take(remain_bytes) {
            out.append_bits(pc as u32, 8)?;
        }

        debug_assert!(out.size() == capacity, "Bits don't fill capacity: {}", out.size());
        Ok(())
    }

}
