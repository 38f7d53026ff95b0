use crate::pdf417::MacroMetadata;

// Structured append
//------------------------------------------------------------------------------

/// Position of a QR symbol within a structured append sequence.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct StructuredAppend {
    pub sequence: u8,
    pub parity: u8,
}

impl StructuredAppend {
    /// Zero based position of this symbol.
    pub fn index(&self) -> usize {
        (self.sequence >> 4) as usize
    }

    /// Number of symbols in the sequence.
    pub fn count(&self) -> usize {
        (self.sequence & 0xf) as usize + 1
    }
}

// Decoder result
//------------------------------------------------------------------------------

/// Payload recovered from one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecoderResult {
    /// Error corrected data codewords.
    pub raw_bytes: Vec<u8>,
    pub text: String,
    /// Raw bytes of every byte mode segment, in stream order.
    pub byte_segments: Vec<Vec<u8>>,
    pub ec_level: Option<String>,
    pub errors_corrected: usize,
    pub erasures: usize,
    pub structured_append: Option<StructuredAppend>,
    pub macro_metadata: Option<MacroMetadata>,
}

impl DecoderResult {
    pub fn new(raw_bytes: Vec<u8>, text: String) -> Self {
        Self { raw_bytes, text, ..Default::default() }
    }
}

#[cfg(test)]
mod structured_append_tests {
    use super::StructuredAppend;

    #[test]
    fn test_index_and_count() {
        let sa = StructuredAppend { sequence: 0x23, parity: 0x5a };
        assert_eq!(sa.index(), 2);
        assert_eq!(sa.count(), 4);
    }
}
