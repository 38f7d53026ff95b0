use std::collections::BTreeMap;

/// Values seen for one cell of the codeword matrix, with how often each was seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarcodeValue {
    counts: BTreeMap<u32, usize>,
}

impl BarcodeValue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(&mut self, value: u32) {
        *self.counts.entry(value).or_insert(0) += 1;
    }

    /// Forgets earlier sightings and keeps only `value`.
    pub fn replace(&mut self, value: u32) {
        self.counts.clear();
        self.set_value(value);
    }

    /// Values seen the most times, ascending. More than one means the cell is ambiguous,
    /// none means it's erased.
    pub fn value(&self) -> Vec<u32> {
        let max = self.counts.values().copied().max().unwrap_or(0);
        self.counts.iter().filter(|&(_, &c)| c == max).map(|(&v, _)| v).collect()
    }

    pub fn confidence(&self, value: u32) -> usize {
        self.counts.get(&value).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod barcode_value_tests {
    use super::BarcodeValue;

    #[test]
    fn test_empty() {
        assert!(BarcodeValue::new().value().is_empty());
    }

    #[test]
    fn test_majority() {
        let mut bv = BarcodeValue::new();
        for v in [12, 40, 12, 7] {
            bv.set_value(v);
        }
        assert_eq!(bv.value(), vec![12]);
        assert_eq!(bv.confidence(12), 2);
        assert_eq!(bv.confidence(99), 0);
    }

    #[test]
    fn test_tie() {
        let mut bv = BarcodeValue::new();
        for v in [300, 5, 300, 5] {
            bv.set_value(v);
        }
        assert_eq!(bv.value(), vec![5, 300]);
        bv.replace(77);
        assert_eq!(bv.value(), vec![77]);
    }
}
