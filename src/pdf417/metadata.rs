use std::fmt::{Display, Error, Formatter};

/// Symbol dimensions and ec level as read from the row indicator columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarcodeMetadata {
    column_count: usize,
    ec_level: u32,
    row_count_upper: usize,
    row_count_lower: usize,
}

impl BarcodeMetadata {
    pub fn new(column_count: usize, row_count_upper: usize, row_count_lower: usize, ec_level: u32) -> Self {
        Self { column_count, ec_level, row_count_upper, row_count_lower }
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn ec_level(&self) -> u32 {
        self.ec_level
    }

    pub fn row_count(&self) -> usize {
        self.row_count_upper + self.row_count_lower
    }

    /// Row count rounded down to one more than a multiple of three.
    pub fn row_count_upper(&self) -> usize {
        self.row_count_upper
    }

    pub fn row_count_lower(&self) -> usize {
        self.row_count_lower
    }
}

impl Display for BarcodeMetadata {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        write!(f, "{}x{} ec {}", self.column_count, self.row_count(), self.ec_level)
    }
}
