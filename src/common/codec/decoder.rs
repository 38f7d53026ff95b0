use encoding_rs::{GBK, SHIFT_JIS};
use log::debug;

use super::types::Mode;
use crate::common::bitstream::BitStream;
use crate::common::charset::{guess_encoding, Charset};
use crate::common::error::{ScanError, ScanResult};
use crate::common::metadata::{ECLevel, Version};
use crate::common::result::{DecoderResult, StructuredAppend};

const GB2312_SUBSET: u32 = 1;

// Decoder
//------------------------------------------------------------------------------

/// Parses the error corrected data codewords of a QR symbol into text.
///
/// `hint` is used for byte segments that aren't preceded by an ECI designator; without
/// it the charset of each segment is guessed.
pub fn decode(
    bytes: &[u8],
    ver: Version,
    ecl: ECLevel,
    hint: Option<Charset>,
) -> ScanResult<DecoderResult> {
    let mut inp = BitStream::new(bytes);
    let mut out = String::with_capacity(50);
    let mut byte_segments = Vec::new();
    let mut structured_append = None;
    let mut eci: Option<Charset> = None;
    let mut fc1 = false;

    loop {
        // Fewer than 4 bits left is an implicit terminator
        let mode = if inp.available() < 4 {
            Mode::Terminator
        } else {
            Mode::from_bits(take(&mut inp, 4)?)?
        };

        match mode {
            Mode::Terminator => break,
            Mode::Fnc1First | Mode::Fnc1Second => fc1 = true,
            Mode::StructuredAppend => {
                if inp.available() < 16 {
                    return Err(ScanError::Format);
                }
                let sequence = take(&mut inp, 8)? as u8;
                let parity = take(&mut inp, 8)? as u8;
                structured_append = Some(StructuredAppend { sequence, parity });
            }
            Mode::Eci => {
                let value = take_eci(&mut inp)?;
                eci = Some(Charset::from_eci(value)?);
            }
            Mode::Hanzi => {
                let subset = take(&mut inp, 4)?;
                let char_cnt = take(&mut inp, ver.char_cnt_bits(mode))? as usize;
                if subset == GB2312_SUBSET {
                    write_hanzi(&mut inp, char_cnt, &mut out)?;
                }
            }
            _ => {
                let char_cnt = take(&mut inp, ver.char_cnt_bits(mode))? as usize;
                match mode {
                    Mode::Numeric => write_numeric(&mut inp, char_cnt, &mut out)?,
                    Mode::Alphanumeric => write_alphanumeric(&mut inp, char_cnt, fc1, &mut out)?,
                    Mode::Byte => {
                        let seg = write_byte(&mut inp, char_cnt, eci, hint, &mut out)?;
                        byte_segments.push(seg);
                    }
                    Mode::Kanji => write_kanji(&mut inp, char_cnt, &mut out)?,
                    _ => return Err(ScanError::Format),
                }
            }
        }
    }

    debug!("Decoded {} chars from {} codewords", out.chars().count(), bytes.len());

    let mut res = DecoderResult::new(bytes.to_vec(), out);
    res.byte_segments = byte_segments;
    res.ec_level = Some(ecl.to_string());
    res.structured_append = structured_append;
    Ok(res)
}

#[inline]
fn take(inp: &mut BitStream, size: usize) -> ScanResult<u32> {
    inp.take_bits(size).ok_or(ScanError::Format)
}

// ECI designators are 1, 2 or 3 bytes long depending on the leading bits
fn take_eci(inp: &mut BitStream) -> ScanResult<u32> {
    let first = take(inp, 8)?;
    if first & 0x80 == 0 {
        return Ok(first & 0x7f);
    }
    if first & 0xc0 == 0x80 {
        let second = take(inp, 8)?;
        return Ok(((first & 0x3f) << 8) | second);
    }
    if first & 0xe0 == 0xc0 {
        let rest = take(inp, 16)?;
        return Ok(((first & 0x1f) << 16) | rest);
    }
    Err(ScanError::Format)
}

// Segment writers
//------------------------------------------------------------------------------

fn write_numeric(inp: &mut BitStream, mut char_cnt: usize, out: &mut String) -> ScanResult<()> {
    while char_cnt >= 3 {
        let chunk = take(inp, 10)?;
        if chunk >= 1000 {
            return Err(ScanError::Format);
        }
        push_digits(chunk, 3, out);
        char_cnt -= 3;
    }
    match char_cnt {
        2 => {
            let chunk = take(inp, 7)?;
            if chunk >= 100 {
                return Err(ScanError::Format);
            }
            push_digits(chunk, 2, out);
        }
        1 => {
            let chunk = take(inp, 4)?;
            if chunk >= 10 {
                return Err(ScanError::Format);
            }
            push_digits(chunk, 1, out);
        }
        _ => {}
    }
    Ok(())
}

fn push_digits(chunk: u32, len: u32, out: &mut String) {
    for p in (0..len).rev() {
        let d = chunk / 10u32.pow(p) % 10;
        out.push((b'0' + d as u8) as char);
    }
}

fn write_alphanumeric(
    inp: &mut BitStream,
    mut char_cnt: usize,
    fc1: bool,
    out: &mut String,
) -> ScanResult<()> {
    let mut seg = String::with_capacity(char_cnt);
    while char_cnt > 1 {
        let chunk = take(inp, 11)?;
        seg.push(Mode::alphanumeric_char(chunk / 45)?);
        seg.push(Mode::alphanumeric_char(chunk % 45)?);
        char_cnt -= 2;
    }
    if char_cnt == 1 {
        seg.push(Mode::alphanumeric_char(take(inp, 6)?)?);
    }

    if !fc1 {
        out.push_str(&seg);
        return Ok(());
    }

    // In FNC1 mode "%%" stands for "%" and a lone "%" for the GS separator
    let mut chars = seg.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
        } else if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
        } else {
            out.push('\u{1d}');
        }
    }
    Ok(())
}

fn write_byte(
    inp: &mut BitStream,
    char_cnt: usize,
    eci: Option<Charset>,
    hint: Option<Charset>,
    out: &mut String,
) -> ScanResult<Vec<u8>> {
    if char_cnt * 8 > inp.available() {
        return Err(ScanError::Format);
    }
    let bytes =
        (0..char_cnt).map(|_| take(inp, 8).map(|b| b as u8)).collect::<ScanResult<Vec<_>>>()?;
    let charset = eci.unwrap_or_else(|| guess_encoding(&bytes, hint));
    out.push_str(&charset.decode(&bytes));
    Ok(bytes)
}

fn write_kanji(inp: &mut BitStream, char_cnt: usize, out: &mut String) -> ScanResult<()> {
    if char_cnt * 13 > inp.available() {
        return Err(ScanError::Format);
    }
    let mut buf = Vec::with_capacity(char_cnt * 2);
    for _ in 0..char_cnt {
        let chunk = take(inp, 13)?;
        let mut assembled = ((chunk / 0xc0) << 8) | (chunk % 0xc0);
        assembled += if assembled < 0x1f00 { 0x8140 } else { 0xc140 };
        buf.extend_from_slice(&(assembled as u16).to_be_bytes());
    }
    let (text, _, has_err) = SHIFT_JIS.decode(&buf);
    if has_err {
        return Err(ScanError::Format);
    }
    out.push_str(&text);
    Ok(())
}

fn write_hanzi(inp: &mut BitStream, char_cnt: usize, out: &mut String) -> ScanResult<()> {
    if char_cnt * 13 > inp.available() {
        return Err(ScanError::Format);
    }
    let mut buf = Vec::with_capacity(char_cnt * 2);
    for _ in 0..char_cnt {
        let chunk = take(inp, 13)?;
        let mut assembled = ((chunk / 0x60) << 8) | (chunk % 0x60);
        assembled += if assembled < 0xa00 { 0xa1a1 } else { 0xa6a1 };
        buf.extend_from_slice(&(assembled as u16).to_be_bytes());
    }
    let (text, _, has_err) = GBK.decode(&buf);
    if has_err {
        return Err(ScanError::Format);
    }
    out.push_str(&text);
    Ok(())
}
