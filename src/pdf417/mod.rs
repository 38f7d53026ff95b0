//! PDF417 decode side: modulus 929 error correction, the compaction mode bit stream, and
//! the row and column bookkeeping that turns detected codewords into a codeword array.

mod barcode_value;
mod bitstream;
mod codeword;
mod detection;
mod ec;
mod metadata;
mod scanning;

pub use barcode_value::BarcodeValue;
pub use bitstream::{decode as decode_bitstream, MacroMetadata};
pub use codeword::{bit_counts, bit_value, bucket, sample_bit_counts, Codeword};
pub use detection::{DetectionColumn, DetectionResult, RowIndicator};
pub use ec::{add_error_correction, correct, ModulusGF, ModulusPoly, PDF417_GF};
pub use metadata::BarcodeMetadata;
pub use scanning::{
    decode_ambiguous, decode_codewords, decode_detection, merge, verify_codeword_count,
    CartesianProduct,
};

/// Codewords of one symbol, data and error correction together.
pub const MAX_CODEWORDS_IN_BARCODE: usize = 928;
pub const MIN_ROWS_IN_BARCODE: usize = 3;
pub const MAX_ROWS_IN_BARCODE: usize = 90;

/// Error correction codewords for an ec level. Levels past 8 give more than the 512 a
/// symbol can carry.
pub fn num_ec_codewords(ec_level: u32) -> usize {
    1usize.checked_shl(ec_level.saturating_add(1)).unwrap_or(usize::MAX)
}
