use log::debug;

use super::parser::BitMatrixParser;
use crate::builder::block_layout;
use crate::common::bit_matrix::BitMatrix;
use crate::common::charset::Charset;
use crate::common::codec;
use crate::common::ec::Block;
use crate::common::error::ScanResult;
use crate::common::metadata::{ECLevel, Version};
use crate::common::result::DecoderResult;

// Deinterleave
//------------------------------------------------------------------------------

/// Splits codewords read from a symbol back into Reed-Solomon blocks. Data codewords
/// were interleaved column by column with the extra codeword of the long blocks last;
/// ec codewords follow in the same manner.
pub fn deinterleave(codewords: &[u8], ver: Version, ecl: ECLevel) -> Vec<Block> {
    let total = ver.total_codewords();
    let num_blocks = ver.num_blocks(ecl);
    let data_total = ver.data_codewords(ecl);
    debug_assert!(codewords.len() == total, "Codeword count mismatch: {}", codewords.len());

    let layouts: Vec<(usize, usize)> =
        (0..num_blocks).map(|id| block_layout(total, data_total, num_blocks, id)).collect();
    let mut blocks: Vec<Vec<u8>> = layouts.iter().map(|&(d, e)| vec![0; d + e]).collect();
    let short_data = layouts[0].0;
    let max_data = layouts.iter().map(|l| l.0).max().unwrap_or(0);

    let mut it = codewords.iter().copied();
    for i in 0..max_data {
        for (b, &(dlen, _)) in blocks.iter_mut().zip(&layouts) {
            if i < dlen {
                b[i] = it.next().unwrap_or(0);
            }
        }
    }
    let ec_len = layouts[0].1;
    for i in 0..ec_len {
        for (b, &(dlen, _)) in blocks.iter_mut().zip(&layouts) {
            b[dlen + i] = it.next().unwrap_or(0);
        }
    }
    debug_assert!(short_data <= max_data && max_data <= short_data + 1, "Uneven block sizes");

    blocks.iter().zip(&layouts).map(|(b, &(dlen, _))| Block::with_encoded(b, dlen)).collect()
}

#[cfg(test)]
mod deinterleave_tests {
    use super::deinterleave;
    use crate::builder::interleave;
    use crate::common::ec::Block;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_deinterleave_5q() {
        let ver = Version::new(5).unwrap();
        let raw: Vec<Vec<u8>> = [15, 15, 16, 16]
            .iter()
            .enumerate()
            .map(|(i, &n)| (0..n).map(|k| (i * 40 + k) as u8).collect())
            .collect();
        let blocks: Vec<Block> = raw.iter().map(|d| Block::new(d, d.len() + 18)).collect();

        let data: Vec<&[u8]> = blocks.iter().map(|b| b.data()).collect();
        let ecc: Vec<&[u8]> = blocks.iter().map(|b| b.ecc()).collect();
        let mut codewords = interleave(&data);
        codewords.extend(interleave(&ecc));

        let res = deinterleave(&codewords, ver, ECLevel::Q);
        assert_eq!(res, blocks);
    }
}

// Decoder
//------------------------------------------------------------------------------

/// Decodes a sampled module grid. When the grid doesn't decode as is, it's read once more
/// as a mirror image.
pub fn decode_bits(bits: BitMatrix, hint: Option<Charset>) -> ScanResult<DecoderResult> {
    let mut parser = BitMatrixParser::new(bits)?;
    match decode_with_parser(&mut parser, hint) {
        Ok(res) => Ok(res),
        Err(e) => {
            debug!("Decode failed with {e:?}, retrying mirrored");
            parser.remask();
            parser.mirror();
            decode_with_parser(&mut parser, hint).map_err(|_| e)
        }
    }
}

fn decode_with_parser(parser: &mut BitMatrixParser, hint: Option<Charset>) -> ScanResult<DecoderResult> {
    let ver = parser.read_version()?;
    let (ecl, _) = parser.read_format_information()?;
    let codewords = parser.read_codewords()?;

    let mut data = Vec::with_capacity(ver.data_codewords(ecl));
    let mut errors_corrected = 0;
    for mut block in deinterleave(&codewords, ver, ecl) {
        errors_corrected += block.rectify()?;
        data.extend_from_slice(block.data());
    }
    if errors_corrected > 0 {
        debug!("Corrected {errors_corrected} codewords");
    }

    let mut res = codec::decode(&data, ver, ecl, hint)?;
    res.errors_corrected = errors_corrected;
    Ok(res)
}

#[cfg(test)]
mod decoder_tests {
    use test_case::test_case;

    use super::decode_bits;
    use crate::builder::QRBuilder;
    use crate::common::{
        charset::Charset,
        error::ScanError,
        metadata::{ECLevel, Version},
    };

    #[test_case("Hello, world!", ECLevel::L, None)]
    #[test_case("01234567890123456789", ECLevel::M, None)]
    #[test_case("ALPHANUMERIC $%*+-./:", ECLevel::Q, None)]
    #[test_case("Ünïcödé 🌎", ECLevel::H, Some(4))]
    #[test_case(&"Long payload ".repeat(40), ECLevel::M, None)]
    fn test_decode_clean(data: &str, ecl: ECLevel, ver: Option<usize>) {
        let mut builder = QRBuilder::new(data);
        builder.ec_level(ecl);
        if let Some(v) = ver {
            builder.version(Version::new(v).unwrap());
        }
        let qr = builder.build().unwrap();
        let res = decode_bits(qr.to_bit_matrix().unwrap(), None).unwrap();
        assert_eq!(res.text, data);
        assert_eq!(res.ec_level.as_deref(), Some(ecl.to_string().as_str()));
        assert_eq!(res.errors_corrected, 0);
    }

    #[test]
    fn test_decode_with_damage() {
        let qr = QRBuilder::new("damaged symbol").ec_level(ECLevel::H).build().unwrap();
        let mut bits = qr.to_bit_matrix().unwrap();
        let w = bits.width();
        // First codeword sits in the bottom right corner
        for (x, y) in [(w - 1, w - 1), (w - 2, w - 1), (w - 1, w - 2), (w - 2, w - 2), (w - 1, 12)] {
            bits.flip(x, y);
        }
        let res = decode_bits(bits, None).unwrap();
        assert_eq!(res.text, "damaged symbol");
        assert!(res.errors_corrected > 0);
    }

    #[test]
    fn test_decode_mirrored() {
        let qr = QRBuilder::new("mirrored").ec_level(ECLevel::M).build().unwrap();
        let mut bits = qr.to_bit_matrix().unwrap();
        bits.mirror();
        assert_eq!(decode_bits(bits, None).unwrap().text, "mirrored");
    }

    #[test]
    fn test_decode_hint() {
        let sjis = Charset::for_label("shift_jis").unwrap();
        let qr = QRBuilder::new("点茗").charset(sjis).build().unwrap();
        let res = decode_bits(qr.to_bit_matrix().unwrap(), Some(sjis)).unwrap();
        assert_eq!(res.text, "点茗");
    }

    #[test]
    fn test_decode_blank() {
        let bits = crate::common::bit_matrix::BitMatrix::square(21).unwrap();
        // No format code lies within 3 bits of all light modules
        assert_eq!(decode_bits(bits, None), Err(ScanError::Format));
    }
}
