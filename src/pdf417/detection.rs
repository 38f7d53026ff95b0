use log::trace;

use super::barcode_value::BarcodeValue;
use super::codeword::Codeword;
use super::metadata::BarcodeMetadata;
use super::{MAX_CODEWORDS_IN_BARCODE, MAX_ROWS_IN_BARCODE, MIN_ROWS_IN_BARCODE};

const MAX_NEARBY_DISTANCE: usize = 5;
const ADJUST_ROW_NUMBER_SKIP: usize = 2;

// Detection column
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowIndicator {
    Left,
    Right,
}

/// Codewords found in one column of a symbol, indexed by image row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionColumn {
    min_y: usize,
    codewords: Vec<Option<Codeword>>,
    indicator: Option<RowIndicator>,
}

impl DetectionColumn {
    /// Data column covering image rows `min_y..=max_y`.
    pub fn new(min_y: usize, max_y: usize) -> Self {
        debug_assert!(min_y <= max_y, "Empty column");
        Self { min_y, codewords: vec![None; max_y - min_y + 1], indicator: None }
    }

    pub fn row_indicator(min_y: usize, max_y: usize, side: RowIndicator) -> Self {
        Self { indicator: Some(side), ..Self::new(min_y, max_y) }
    }

    pub fn indicator(&self) -> Option<RowIndicator> {
        self.indicator
    }

    pub fn min_y(&self) -> usize {
        self.min_y
    }

    pub fn max_y(&self) -> usize {
        self.min_y + self.codewords.len() - 1
    }

    pub fn codewords(&self) -> &[Option<Codeword>] {
        &self.codewords
    }

    fn index_for_row(&self, image_row: usize) -> Option<usize> {
        image_row.checked_sub(self.min_y).filter(|&i| i < self.codewords.len())
    }

    pub fn codeword(&self, image_row: usize) -> Option<Codeword> {
        self.index_for_row(image_row).and_then(|i| self.codewords[i])
    }

    /// Codeword at `image_row`, else the closest one within a few rows, looking up first.
    pub fn codeword_nearby(&self, image_row: usize) -> Option<Codeword> {
        let idx = self.index_for_row(image_row)?;
        if let Some(cw) = self.codewords[idx] {
            return Some(cw);
        }
        for d in 1..MAX_NEARBY_DISTANCE {
            if let Some(cw) = idx.checked_sub(d).and_then(|i| self.codewords[i]) {
                return Some(cw);
            }
            if let Some(&Some(cw)) = self.codewords.get(idx + d) {
                return Some(cw);
            }
        }
        None
    }

    pub fn set_codeword(&mut self, image_row: usize, codeword: Codeword) {
        if let Some(i) = self.index_for_row(image_row) {
            self.codewords[i] = Some(codeword);
        }
    }

    fn is_left(&self) -> bool {
        self.indicator == Some(RowIndicator::Left)
    }
}


// Row indicator columns
//------------------------------------------------------------------------------

impl DetectionColumn {
    /// Gives every row indicator codeword the row it announces.
    pub fn set_row_numbers(&mut self) {
        for cw in self.codewords.iter_mut().flatten() {
            cw.set_row_number_as_row_indicator();
        }
    }

    /// Column count, row count and ec level by majority over the indicator codewords.
    /// Codewords that disagree with the result are dropped.
    pub fn barcode_metadata(&mut self) -> Option<BarcodeMetadata> {
        let mut column_count = BarcodeValue::new();
        let mut row_count_upper = BarcodeValue::new();
        let mut row_count_lower = BarcodeValue::new();
        let mut ec_level = BarcodeValue::new();

        let is_left = self.is_left();
        for cw in self.codewords.iter_mut().flatten() {
            cw.set_row_number_as_row_indicator();
            let value = cw.value() % 30;
            let row = cw.row_number().unwrap_or(0) + if is_left { 0 } else { 2 };
            match row % 3 {
                0 => row_count_upper.set_value(value * 3 + 1),
                1 => {
                    ec_level.set_value(value / 3);
                    row_count_lower.set_value(value % 3);
                }
                _ => column_count.set_value(value + 1),
            }
        }

        let first = |bv: &BarcodeValue| bv.value().first().copied();
        let cols = first(&column_count)?;
        let upper = first(&row_count_upper)?;
        let lower = first(&row_count_lower)?;
        let ecl = first(&ec_level)?;
        let rows = (upper + lower) as usize;
        if cols < 1 || !(MIN_ROWS_IN_BARCODE..=MAX_ROWS_IN_BARCODE).contains(&rows) {
            return None;
        }

        let md = BarcodeMetadata::new(cols as usize, upper as usize, lower as usize, ecl);
        self.remove_incorrect_codewords(&md);
        Some(md)
    }

    fn remove_incorrect_codewords(&mut self, md: &BarcodeMetadata) {
        let is_left = self.is_left();
        for slot in self.codewords.iter_mut() {
            let Some(cw) = *slot else { continue };
            let value = cw.value() % 30;
            let mut row = cw.row_number().unwrap_or(0);
            if row > md.row_count() {
                *slot = None;
                continue;
            }
            if !is_left {
                row += 2;
            }
            let consistent = match row % 3 {
                0 => value as usize * 3 + 1 == md.row_count_upper(),
                1 => value / 3 == md.ec_level() && value as usize % 3 == md.row_count_lower(),
                _ => value as usize + 1 == md.column_count(),
            };
            if !consistent {
                *slot = None;
            }
        }
    }

    /// Drops indicator codewords whose row number jumps backwards or skips rows that
    /// should have been seen. Returns the average row height in image rows.
    pub fn adjust_complete_row_numbers(&mut self, md: &BarcodeMetadata) -> usize {
        self.set_row_numbers();
        self.remove_incorrect_codewords(md);

        let last = self.codewords.len() - 1;
        let avg_row_height = last as f64 / md.row_count() as f64;
        let mut barcode_row: i64 = -1;
        let mut max_row_height = 1;
        let mut cur_row_height = 0;

        for i in 0..last {
            let Some(cw) = self.codewords[i] else { continue };
            let row = cw.row_number().unwrap_or(0) as i64;
            let diff = row - barcode_row;

            if diff == 0 {
                cur_row_height += 1;
            } else if diff == 1 {
                max_row_height = max_row_height.max(cur_row_height);
                cur_row_height = 1;
                barcode_row = row;
            } else if diff < 0 || row as usize >= md.row_count() || diff > i as i64 {
                self.codewords[i] = None;
            } else {
                let checked = if max_row_height > 2 {
                    (max_row_height - 2) * diff as usize
                } else {
                    diff as usize
                };
                let close_previous =
                    checked >= i || (1..=checked).any(|k| self.codewords[i - k].is_some());
                if close_previous {
                    self.codewords[i] = None;
                } else {
                    barcode_row = row;
                    cur_row_height = 1;
                }
            }
        }
        (avg_row_height + 0.5) as usize
    }

    /// Like [`Self::adjust_complete_row_numbers`] for a column whose metadata couldn't be
    /// cross checked; only rows past the row count are dropped.
    pub fn adjust_incomplete_row_numbers(&mut self, md: &BarcodeMetadata) -> usize {
        let last = self.codewords.len() - 1;
        let avg_row_height = last as f64 / md.row_count() as f64;
        let mut barcode_row: i64 = -1;

        for i in 0..last {
            let Some(cw) = self.codewords[i].as_mut() else { continue };
            cw.set_row_number_as_row_indicator();
            let row = cw.row_number().unwrap_or(0) as i64;
            if row - barcode_row == 0 {
                continue;
            }
            if row - barcode_row != 1 && row as usize >= md.row_count() {
                self.codewords[i] = None;
            } else {
                barcode_row = row;
            }
        }
        (avg_row_height + 0.5) as usize
    }

    /// Image rows seen for each barcode row.
    pub fn row_heights(&mut self) -> Option<Vec<usize>> {
        let md = self.barcode_metadata()?;
        self.adjust_incomplete_row_numbers(&md);
        let mut heights = vec![0; md.row_count()];
        for row in self.codewords.iter().flatten().filter_map(|cw| cw.row_number()) {
            if let Some(h) = heights.get_mut(row) {
                *h += 1;
            }
        }
        Some(heights)
    }
}

#[cfg(test)]
mod row_indicator_tests {
    use super::{DetectionColumn, RowIndicator};
    use crate::pdf417::Codeword;

    // 6 columns, 7 rows, ec level 2, two image rows per barcode row
    fn left_column() -> DetectionColumn {
        let mut col = DetectionColumn::row_indicator(0, 13, RowIndicator::Left);
        for y in 0..14 {
            let row = y / 2;
            let v = match row % 3 {
                0 => 2,
                1 => 2 * 3,
                _ => 5,
            };
            let value = (30 * (row / 3) + v) as u32;
            col.set_codeword(y, Codeword::new(0, 17, (row % 3) * 3, value));
        }
        col
    }

    #[test]
    fn test_barcode_metadata() {
        let mut col = left_column();
        let md = col.barcode_metadata().unwrap();
        assert_eq!(md.to_string(), "6x7 ec 2");
        assert_eq!(md.row_count_upper(), 7);
        assert_eq!(col.codewords().iter().flatten().count(), 14);
    }

    #[test]
    fn test_inconsistent_codeword_removed() {
        let mut col = left_column();
        // Claims 9 columns in a row that should carry the column count
        col.set_codeword(4, Codeword::new(0, 17, 6, 8));
        assert_eq!(col.barcode_metadata().map(|md| md.column_count()), Some(6));
        assert_eq!(col.codeword(4), None);
        assert!(col.codeword(5).is_some());
        assert_eq!(col.codewords().iter().flatten().count(), 13);
    }

    #[test]
    fn test_row_heights() {
        let mut col = left_column();
        assert_eq!(col.row_heights(), Some(vec![2; 7]));
    }

    #[test]
    fn test_complete_drops_backward_rows() {
        let mut col = left_column();
        let md = col.barcode_metadata().unwrap();
        // Row 0 indicator seen again further down
        col.set_codeword(8, Codeword::new(0, 17, 0, 2));
        assert_eq!(col.adjust_complete_row_numbers(&md), 2);
        assert_eq!(col.codeword(8), None);
        assert!(col.codeword(9).is_some());
    }

    #[test]
    fn test_too_few_rows() {
        let mut col = DetectionColumn::row_indicator(0, 5, RowIndicator::Right);
        for (y, (bucket, value)) in [(0, 0), (3, 0), (6, 0)].into_iter().enumerate() {
            col.set_codeword(y * 2, Codeword::new(0, 17, bucket, value));
        }
        assert_eq!(col.barcode_metadata(), None);
    }
}

// Detection result
//------------------------------------------------------------------------------

/// All columns of one symbol: the left row indicator, the data columns, and the right
/// row indicator. Row numbers of data codewords are filled in from the indicators.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    metadata: BarcodeMetadata,
    columns: Vec<Option<DetectionColumn>>,
}

impl DetectionResult {
    pub fn new(metadata: BarcodeMetadata) -> Self {
        Self { metadata, columns: vec![None; metadata.column_count() + 2] }
    }

    pub fn metadata(&self) -> &BarcodeMetadata {
        &self.metadata
    }

    pub fn column_count(&self) -> usize {
        self.metadata.column_count()
    }

    pub fn row_count(&self) -> usize {
        self.metadata.row_count()
    }

    pub fn ec_level(&self) -> u32 {
        self.metadata.ec_level()
    }

    /// Column 0 is the left indicator and `column_count + 1` the right one.
    pub fn set_column(&mut self, index: usize, column: DetectionColumn) {
        if let Some(slot) = self.columns.get_mut(index) {
            *slot = Some(column);
        }
    }

    pub fn column(&self, index: usize) -> Option<&DetectionColumn> {
        self.columns.get(index)?.as_ref()
    }

    fn cell(&self, col: usize, row: Option<usize>) -> Option<Codeword> {
        let row = row?;
        self.column(col)?.codewords.get(row).copied().flatten()
    }

    fn cell_mut(&mut self, col: usize, row: usize) -> Option<&mut Codeword> {
        self.columns.get_mut(col)?.as_mut()?.codewords.get_mut(row)?.as_mut()
    }

    /// Resolves row numbers until no further codeword can be placed and returns the
    /// columns.
    pub fn adjusted_columns(&mut self) -> &[Option<DetectionColumn>] {
        let md = self.metadata;
        let last = self.column_count() + 1;
        for i in [0, last] {
            if let Some(col) = self.columns[i].as_mut() {
                col.adjust_complete_row_numbers(&md);
            }
        }

        let mut unadjusted = MAX_CODEWORDS_IN_BARCODE;
        loop {
            let prev = unadjusted;
            unadjusted = self.adjust_row_numbers();
            trace!("{unadjusted} codewords without row number");
            if unadjusted == 0 || unadjusted >= prev {
                break;
            }
        }
        &self.columns
    }

    fn adjust_row_numbers(&mut self) -> usize {
        let unadjusted = self.adjust_row_numbers_by_row();
        if unadjusted == 0 {
            return 0;
        }
        for col in 1..=self.column_count() {
            let len = self.column(col).map_or(0, |c| c.codewords.len());
            for row in 0..len {
                if self.cell(col, Some(row)).is_some_and(|cw| !cw.has_valid_row_number()) {
                    self.adjust_row_number_from_neighbours(col, row);
                }
            }
        }
        unadjusted
    }

    fn adjust_row_numbers_by_row(&mut self) -> usize {
        self.adjust_row_numbers_from_both_indicators();
        self.adjust_row_numbers_from_indicator(RowIndicator::Left)
            + self.adjust_row_numbers_from_indicator(RowIndicator::Right)
    }

    fn adjust_row_numbers_from_both_indicators(&mut self) {
        let last = self.column_count() + 1;
        let (Some(left), Some(right)) = (self.column(0), self.column(last)) else {
            return;
        };
        let agreed: Vec<Option<Option<usize>>> = left
            .codewords
            .iter()
            .zip(right.codewords.iter())
            .map(|(l, r)| match (l, r) {
                (Some(l), Some(r)) if l.row_number() == r.row_number() => Some(l.row_number()),
                _ => None,
            })
            .collect();

        for (row, agreed) in agreed.into_iter().enumerate() {
            let Some(row_number) = agreed else { continue };
            for col in 1..last {
                let Some(slot) =
                    self.columns[col].as_mut().and_then(|c| c.codewords.get_mut(row))
                else {
                    continue;
                };
                if let Some(cw) = slot.as_mut() {
                    cw.set_row_number(row_number);
                    if !cw.has_valid_row_number() {
                        *slot = None;
                    }
                }
            }
        }
    }

    fn adjust_row_numbers_from_indicator(&mut self, side: RowIndicator) -> usize {
        let last = self.column_count() + 1;
        let ind = if side == RowIndicator::Left { 0 } else { last };
        let Some(indicator) = self.column(ind) else {
            return 0;
        };
        let rows: Vec<Option<Option<usize>>> =
            indicator.codewords.iter().map(|cw| cw.map(|cw| cw.row_number())).collect();
        let cols: Vec<usize> = match side {
            RowIndicator::Left => (1..last).collect(),
            RowIndicator::Right => (1..=last).rev().collect(),
        };

        let mut unadjusted = 0;
        for (row, ind_row) in rows.into_iter().enumerate() {
            let Some(ind_row) = ind_row else { continue };
            let mut invalid = 0;
            for &col in &cols {
                if invalid >= ADJUST_ROW_NUMBER_SKIP {
                    break;
                }
                let Some(cw) = self.cell_mut(col, row) else { continue };
                if !cw.has_valid_row_number() {
                    match ind_row.filter(|&r| cw.is_valid_row_number(r)) {
                        Some(r) => {
                            cw.set_row_number(Some(r));
                            invalid = 0;
                        }
                        None => invalid += 1,
                    }
                }
                if !cw.has_valid_row_number() {
                    unadjusted += 1;
                }
            }
        }
        unadjusted
    }

    // Borrows the row number of the first of 14 neighbours in the same cluster
    fn adjust_row_number_from_neighbours(&mut self, col: usize, row: usize) {
        let Some(cw) = self.cell(col, Some(row)) else { return };
        let prev = col - 1;
        let next = if self.column(col + 1).is_some() { col + 1 } else { prev };

        let at = |d: isize| row.checked_add_signed(d);
        let neighbours = [
            self.cell(col, at(-1)),
            self.cell(col, at(1)),
            self.cell(prev, at(0)),
            self.cell(next, at(0)),
            self.cell(prev, at(-1)),
            self.cell(next, at(-1)),
            self.cell(prev, at(1)),
            self.cell(next, at(1)),
            self.cell(col, at(-2)),
            self.cell(col, at(2)),
            self.cell(prev, at(-2)),
            self.cell(next, at(-2)),
            self.cell(prev, at(2)),
            self.cell(next, at(2)),
        ];

        let found = neighbours
            .into_iter()
            .flatten()
            .find(|n| n.has_valid_row_number() && n.bucket() == cw.bucket());
        if let (Some(n), Some(target)) = (found, self.cell_mut(col, row)) {
            target.set_row_number(n.row_number());
        }
    }

    /// Majority value of every cell, with the indicator columns at both ends.
    pub fn barcode_matrix(&mut self) -> Vec<Vec<BarcodeValue>> {
        let rows = self.row_count();
        let width = self.column_count() + 2;
        let mut matrix = vec![vec![BarcodeValue::new(); width]; rows];
        for (c, col) in self.adjusted_columns().iter().enumerate() {
            let Some(col) = col else { continue };
            for cw in col.codewords.iter().flatten() {
                // Rows past the row count are ignored
                if let Some(r) = cw.row_number().filter(|&r| r < rows) {
                    matrix[r][c].set_value(cw.value());
                }
            }
        }
        matrix
    }
}
