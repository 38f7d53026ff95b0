use log::{debug, trace};
use num_bigint::BigUint;
use num_traits::Zero;

use crate::common::{
    charset::{Charset, EciStringBuilder},
    error::{ScanError, ScanResult},
    result::DecoderResult,
};

const TEXT_COMPACTION_MODE_LATCH: u32 = 900;
const BYTE_COMPACTION_MODE_LATCH: u32 = 901;
const NUMERIC_COMPACTION_MODE_LATCH: u32 = 902;
const BYTE_COMPACTION_MODE_LATCH_6: u32 = 924;
const ECI_USER_DEFINED: u32 = 925;
const ECI_GENERAL_PURPOSE: u32 = 926;
const ECI_CHARSET: u32 = 927;
const BEGIN_MACRO_PDF417_CONTROL_BLOCK: u32 = 928;
const BEGIN_MACRO_PDF417_OPTIONAL_FIELD: u32 = 923;
const MACRO_PDF417_TERMINATOR: u32 = 922;
const MODE_SHIFT_TO_BYTE_COMPACTION_MODE: u32 = 913;

const MAX_NUMERIC_CODEWORDS: usize = 15;

// Sub mode switches inside text compaction
const PL: u32 = 25;
const LL: u32 = 27;
const AS: u32 = 27;
const ML: u32 = 28;
const AL: u32 = 28;
const PS: u32 = 29;
const PAL: u32 = 29;

const PUNCT_CHARS: &[u8; 29] = b";<>@[\\]_`~!\r\t,:\n-.$/\"|*()?{}'";
const MIXED_CHARS: &[u8; 25] = b"0123456789&\r\t,:#-.$/+%*=^";

fn is_latch(code: u32) -> bool {
    matches!(
        code,
        TEXT_COMPACTION_MODE_LATCH
            | BYTE_COMPACTION_MODE_LATCH
            | NUMERIC_COMPACTION_MODE_LATCH
            | BYTE_COMPACTION_MODE_LATCH_6
            | BEGIN_MACRO_PDF417_CONTROL_BLOCK
            | BEGIN_MACRO_PDF417_OPTIONAL_FIELD
            | MACRO_PDF417_TERMINATOR
    )
}

fn is_eci(code: u32) -> bool {
    matches!(code, ECI_CHARSET | ECI_GENERAL_PURPOSE | ECI_USER_DEFINED)
}

// Macro PDF417
//------------------------------------------------------------------------------

/// Control block of a symbol that is one segment of a larger message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MacroMetadata {
    pub segment_index: usize,
    pub file_id: String,
    pub last_segment: bool,
    pub segment_count: Option<usize>,
    pub file_name: Option<String>,
    /// Seconds since the unix epoch.
    pub timestamp: Option<u64>,
    pub sender: Option<String>,
    pub addressee: Option<String>,
    pub file_size: Option<u64>,
    pub checksum: Option<u32>,
    /// Codewords of the optional fields, terminator excluded.
    pub optional_data: Vec<u32>,
}

fn parse_field<T: std::str::FromStr>(digits: &str) -> ScanResult<T> {
    digits.parse().map_err(|_| ScanError::Format)
}

fn text_field(codewords: &[u32], idx: &mut usize, end: usize) -> ScanResult<String> {
    let mut sb = EciStringBuilder::new(Charset::Latin1);
    *idx = text_compaction(codewords, *idx, end, &mut sb)?;
    Ok(sb.build())
}

fn numeric_field(codewords: &[u32], idx: &mut usize, end: usize) -> ScanResult<String> {
    let mut sb = EciStringBuilder::new(Charset::Latin1);
    *idx = numeric_compaction(codewords, *idx, end, &mut sb)?;
    Ok(sb.build())
}

fn decode_macro_block(
    codewords: &[u32],
    mut idx: usize,
    end: usize,
) -> ScanResult<(usize, MacroMetadata)> {
    if idx + 2 > end {
        return Err(ScanError::Format);
    }
    let mut md = MacroMetadata {
        segment_index: parse_field(&base900_to_base10(&codewords[idx..idx + 2])?)?,
        ..Default::default()
    };
    idx += 2;
    md.file_id = text_field(codewords, &mut idx, end)?;

    let optional_start = (idx < end && codewords[idx] == BEGIN_MACRO_PDF417_OPTIONAL_FIELD)
        .then_some(idx + 1);

    while idx < end {
        match codewords[idx] {
            BEGIN_MACRO_PDF417_OPTIONAL_FIELD => {
                let field = *codewords.get(idx + 1).ok_or(ScanError::Format)?;
                idx += 2;
                match field {
                    0 => md.file_name = Some(text_field(codewords, &mut idx, end)?),
                    1 => {
                        md.segment_count = Some(parse_field(&numeric_field(codewords, &mut idx, end)?)?)
                    }
                    2 => md.timestamp = Some(parse_field(&numeric_field(codewords, &mut idx, end)?)?),
                    3 => md.sender = Some(text_field(codewords, &mut idx, end)?),
                    4 => md.addressee = Some(text_field(codewords, &mut idx, end)?),
                    5 => md.file_size = Some(parse_field(&numeric_field(codewords, &mut idx, end)?)?),
                    6 => md.checksum = Some(parse_field(&numeric_field(codewords, &mut idx, end)?)?),
                    _ => {
                        debug!("Unknown macro optional field {field}");
                        return Err(ScanError::Format);
                    }
                }
            }
            MACRO_PDF417_TERMINATOR => {
                idx += 1;
                md.last_segment = true;
            }
            _ => return Err(ScanError::Format),
        }
    }

    if let Some(start) = optional_start {
        let mut stop = idx.min(end);
        if md.last_segment {
            stop = stop.saturating_sub(1);
        }
        md.optional_data = codewords.get(start..stop).map(<[u32]>::to_vec).unwrap_or_default();
    }
    Ok((idx, md))
}

// Text compaction
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Alpha,
    Lower,
    Mixed,
    Punct,
    AlphaShift,
    PunctShift,
}

#[derive(Debug, Clone, Copy)]
enum TextItem {
    Value(u32),
    Latch,
    Byte(u32),
}

/// Reads text compaction codewords from `idx` up to the next mode latch and appends the
/// decoded characters. Returns the index of the first unread codeword.
fn text_compaction(
    codewords: &[u32],
    mut idx: usize,
    end: usize,
    out: &mut EciStringBuilder,
) -> ScanResult<usize> {
    let mut items = Vec::with_capacity(end.saturating_sub(idx) * 2);
    while idx < end {
        let code = codewords[idx];
        idx += 1;
        match code {
            0..=899 => {
                items.push(TextItem::Value(code / 30));
                items.push(TextItem::Value(code % 30));
            }
            TEXT_COMPACTION_MODE_LATCH => items.push(TextItem::Latch),
            MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                let byte = *codewords.get(idx).ok_or(ScanError::Format)?;
                items.push(TextItem::Byte(byte));
                idx += 1;
            }
            _ if is_latch(code) || is_eci(code) => {
                idx -= 1;
                break;
            }
            // Reserved codewords carry nothing
            _ => {}
        }
    }
    decode_text(&items, out)?;
    Ok(idx)
}

fn decode_text(items: &[TextItem], out: &mut EciStringBuilder) -> ScanResult<()> {
    let mut mode = Mode::Alpha;
    let mut prior = Mode::Alpha;

    for &item in items {
        let v = match item {
            TextItem::Latch => {
                mode = Mode::Alpha;
                continue;
            }
            TextItem::Byte(b) => {
                if matches!(mode, Mode::AlphaShift | Mode::PunctShift) {
                    mode = prior;
                }
                out.append_byte(u8::try_from(b).map_err(|_| ScanError::Format)?);
                continue;
            }
            TextItem::Value(v) => v,
        };

        let ch = match mode {
            Mode::Alpha | Mode::Lower => {
                let base = if mode == Mode::Alpha { b'A' } else { b'a' };
                match v {
                    0..=25 => Some((base + v as u8) as char),
                    26 => Some(' '),
                    LL if mode == Mode::Alpha => {
                        mode = Mode::Lower;
                        None
                    }
                    AS => {
                        prior = mode;
                        mode = Mode::AlphaShift;
                        None
                    }
                    ML => {
                        mode = Mode::Mixed;
                        None
                    }
                    PS => {
                        prior = mode;
                        mode = Mode::PunctShift;
                        None
                    }
                    _ => None,
                }
            }
            Mode::Mixed => match v {
                0..=24 => Some(MIXED_CHARS[v as usize] as char),
                PL => {
                    mode = Mode::Punct;
                    None
                }
                26 => Some(' '),
                LL => {
                    mode = Mode::Lower;
                    None
                }
                AL => {
                    mode = Mode::Alpha;
                    None
                }
                PS => {
                    prior = mode;
                    mode = Mode::PunctShift;
                    None
                }
                _ => None,
            },
            Mode::Punct => match v {
                0..=28 => Some(PUNCT_CHARS[v as usize] as char),
                PAL => {
                    mode = Mode::Alpha;
                    None
                }
                _ => None,
            },
            Mode::AlphaShift => {
                mode = prior;
                match v {
                    0..=25 => Some((b'A' + v as u8) as char),
                    26 => Some(' '),
                    _ => None,
                }
            }
            Mode::PunctShift => {
                mode = prior;
                match v {
                    0..=28 => Some(PUNCT_CHARS[v as usize] as char),
                    PAL => {
                        mode = Mode::Alpha;
                        None
                    }
                    _ => None,
                }
            }
        };
        if let Some(ch) = ch {
            out.append_char(ch);
        }
    }
    Ok(())
}

// Byte compaction
//------------------------------------------------------------------------------

/// Groups of five codewords carry six bytes. Under 901 a trailing group of any size is
/// one byte per codeword; under 924 only an incomplete trailing group is.
fn byte_compaction(
    mode: u32,
    codewords: &[u32],
    mut idx: usize,
    end: usize,
    out: &mut EciStringBuilder,
    segments: &mut Vec<Vec<u8>>,
) -> ScanResult<usize> {
    let mut bytes = Vec::new();
    loop {
        let start = idx;
        while idx - start < 5 && idx < end && codewords[idx] < TEXT_COMPACTION_MODE_LATCH {
            idx += 1;
        }
        let group = &codewords[start..idx];
        let more_data = idx < end && codewords[idx] < TEXT_COMPACTION_MODE_LATCH;

        if group.len() == 5 && (mode == BYTE_COMPACTION_MODE_LATCH_6 || more_data) {
            let value = group.iter().fold(0u64, |acc, &c| acc * 900 + c as u64);
            bytes.extend((0..6).map(|j| (value >> (8 * (5 - j))) as u8));
        } else {
            bytes.extend(group.iter().map(|&c| c as u8));
        }

        if more_data {
            continue;
        }
        if idx + 1 < end && codewords[idx] == ECI_CHARSET {
            out.append_bytes(&bytes);
            segments.push(std::mem::take(&mut bytes));
            out.append_eci(codewords[idx + 1])?;
            idx += 2;
            continue;
        }
        break;
    }
    trace!("Byte compaction: {} bytes", bytes.len());
    out.append_bytes(&bytes);
    if !bytes.is_empty() {
        segments.push(bytes);
    }
    Ok(idx)
}

// Numeric compaction
//------------------------------------------------------------------------------

fn numeric_compaction(
    codewords: &[u32],
    mut idx: usize,
    end: usize,
    out: &mut EciStringBuilder,
) -> ScanResult<usize> {
    let mut group = Vec::with_capacity(MAX_NUMERIC_CODEWORDS);
    while idx < end {
        let code = codewords[idx];
        idx += 1;
        let mut stop = idx == end;
        if code < TEXT_COMPACTION_MODE_LATCH {
            group.push(code);
        } else if code != NUMERIC_COMPACTION_MODE_LATCH {
            idx -= 1;
            stop = true;
        }
        let flush =
            group.len() == MAX_NUMERIC_CODEWORDS || code == NUMERIC_COMPACTION_MODE_LATCH || stop;
        if flush && !group.is_empty() {
            out.append_str(&base900_to_base10(&group)?);
            group.clear();
        }
        if stop {
            break;
        }
    }
    Ok(idx)
}

/// Base 900 digits to decimal. The encoder prefixes a 1 to keep leading zeros, which is
/// stripped here.
fn base900_to_base10(codewords: &[u32]) -> ScanResult<String> {
    let value = codewords.iter().fold(BigUint::zero(), |acc, &c| acc * 900u32 + c);
    let digits = value.to_str_radix(10);
    match digits.strip_prefix('1') {
        Some(rest) => Ok(rest.to_string()),
        None => {
            debug!("Numeric group without leading 1: {digits}");
            Err(ScanError::Format)
        }
    }
}

// Decoder
//------------------------------------------------------------------------------

/// Decodes error corrected PDF417 codewords. `codewords[0]` is the number of data
/// codewords including itself.
pub fn decode(codewords: &[u32], ec_level: u32) -> ScanResult<DecoderResult> {
    let end = *codewords.first().ok_or(ScanError::Format)? as usize;
    if end > codewords.len() {
        return Err(ScanError::Format);
    }

    let mut out = EciStringBuilder::new(Charset::Latin1);
    let mut segments = Vec::new();
    let mut macro_md = None;

    let mut idx = 1;
    let mut code = *codewords.get(idx).ok_or(ScanError::Format)?;
    idx += 1;
    while idx < end {
        idx = match code {
            TEXT_COMPACTION_MODE_LATCH => text_compaction(codewords, idx, end, &mut out)?,
            BYTE_COMPACTION_MODE_LATCH | BYTE_COMPACTION_MODE_LATCH_6 => {
                byte_compaction(code, codewords, idx, end, &mut out, &mut segments)?
            }
            MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                let byte = u8::try_from(codewords[idx]).map_err(|_| ScanError::Format)?;
                out.append_byte(byte);
                idx + 1
            }
            NUMERIC_COMPACTION_MODE_LATCH => numeric_compaction(codewords, idx, end, &mut out)?,
            ECI_CHARSET => {
                out.append_eci(codewords[idx])?;
                idx + 1
            }
            ECI_GENERAL_PURPOSE => idx + 2,
            ECI_USER_DEFINED => idx + 1,
            BEGIN_MACRO_PDF417_CONTROL_BLOCK => {
                let (next, md) = decode_macro_block(codewords, idx, end)?;
                macro_md = Some(md);
                next
            }
            BEGIN_MACRO_PDF417_OPTIONAL_FIELD | MACRO_PDF417_TERMINATOR => {
                debug!("Macro field {code} outside a control block");
                return Err(ScanError::Format);
            }
            _ => text_compaction(codewords, idx - 1, end, &mut out)?,
        };
        code = *codewords.get(idx).ok_or(ScanError::Format)?;
        idx += 1;
    }

    if out.is_empty() {
        return Err(ScanError::Format);
    }
    let mut res = DecoderResult::new(Vec::new(), out.build());
    res.byte_segments = segments;
    res.ec_level = Some(ec_level.to_string());
    res.macro_metadata = macro_md;
    Ok(res)
}

#[cfg(test)]
mod bitstream_tests {
    use test_case::test_case;

    use super::{base900_to_base10, decode, MacroMetadata};
    use crate::ScanError;

    #[test_case(&[5, 453, 178, 121, 239, 0], "PDF417"; "alpha mixed")]
    #[test_case(&[4, 27, 56, 89, 0], "Ab c"; "lower latch")]
    #[test_case(&[4, 810, 811, 89, 0], "aBc"; "alpha shift")]
    #[test_case(&[4, 841, 419, 119, 0], "1,@"; "punct shift")]
    #[test_case(&[7, 453, 178, 121, 239, 900, 900, 0], "PDF417"; "trailing latches")]
    #[test_case(&[4, 453, 913, 200, 0], "PD\u{c8}"; "shift to byte")]
    fn test_text(codewords: &[u32], exp: &str) {
        assert_eq!(decode(codewords, 2).unwrap().text, exp);
    }

    #[test]
    fn test_byte() {
        let res = decode(&[4, 901, 72, 105, 0], 0).unwrap();
        assert_eq!(res.text, "Hi");
        assert_eq!(res.byte_segments, vec![b"Hi".to_vec()]);
        assert_eq!(res.ec_level.as_deref(), Some("0"));

        let res = decode(&[7, 924, 109, 326, 368, 127, 330, 0], 0).unwrap();
        assert_eq!(res.text, "ABCDEF");

        let res = decode(&[8, 901, 109, 326, 368, 127, 330, 71, 0], 0).unwrap();
        assert_eq!(res.text, "ABCDEFG");
    }

    #[test]
    fn test_numeric() {
        let res = decode(&[8, 902, 1, 624, 434, 632, 282, 200, 0], 0).unwrap();
        assert_eq!(res.text, "000213298174000");
        assert_eq!(base900_to_base10(&[0, 5]), Err(ScanError::Format));
    }

    #[test]
    fn test_eci() {
        let res = decode(&[6, 927, 7, 901, 207, 207, 0], 0).unwrap();
        assert_eq!(res.text, "\u{42f}\u{42f}");
        assert_eq!(decode(&[5, 927, 899, 1, 0, 0], 0), Err(ScanError::UnsupportedCharset));
    }

    #[test]
    fn test_macro() {
        let codewords = [11, 1, 928, 111, 103, 1, 89, 923, 1, 114, 922, 0];
        let res = decode(&codewords, 0).unwrap();
        assert_eq!(res.text, "AB");
        let exp = MacroMetadata {
            segment_index: 3,
            file_id: "ABC".to_string(),
            last_segment: true,
            segment_count: Some(14),
            optional_data: vec![1, 114],
            ..Default::default()
        };
        assert_eq!(res.macro_metadata, Some(exp));
    }

    #[test_case(&[3, 922, 0, 0]; "terminator outside macro")]
    #[test_case(&[2, 900, 0]; "empty")]
    #[test_case(&[9, 1, 0]; "count past end")]
    #[test_case(&[4, 1, 928, 111, 0]; "truncated macro")]
    #[test_case(&[8, 1, 928, 111, 103, 1, 923, 9, 0]; "unknown optional field")]
    fn test_malformed(codewords: &[u32]) {
        assert_eq!(decode(codewords, 0), Err(ScanError::Format));
    }
}
