use log::{debug, trace};

use super::barcode_value::BarcodeValue;
use super::bitstream;
use super::detection::{DetectionColumn, DetectionResult};
use super::ec;
use super::{num_ec_codewords, MAX_CODEWORDS_IN_BARCODE};
use crate::common::{
    error::{ScanError, ScanResult},
    result::DecoderResult,
};

const MAX_ERRORS: usize = 3;
const MAX_EC_CODEWORDS: usize = 512;
const MAX_TRIES: usize = 100;

// Codewords
//------------------------------------------------------------------------------

/// Error corrects and decodes the codewords of one symbol, data followed by
/// `2^(ec_level+1)` error correction codewords. `erasures` are positions known to be
/// unreadable.
pub fn decode_codewords(
    codewords: &mut [u32],
    ec_level: u32,
    erasures: &[usize],
) -> ScanResult<DecoderResult> {
    if codewords.is_empty() {
        return Err(ScanError::Format);
    }
    let num_ec = num_ec_codewords(ec_level);
    if erasures.len() > num_ec / 2 + MAX_ERRORS || num_ec > MAX_EC_CODEWORDS {
        debug!("{} erasures with {num_ec} ec codewords", erasures.len());
        return Err(ScanError::Checksum);
    }
    if codewords.iter().any(|&c| c as usize > MAX_CODEWORDS_IN_BARCODE) {
        return Err(ScanError::Format);
    }

    let corrected = ec::correct(codewords, num_ec, erasures)?;
    verify_codeword_count(codewords, num_ec)?;

    let mut res = bitstream::decode(codewords, ec_level)?;
    res.errors_corrected = corrected;
    res.erasures = erasures.len();
    Ok(res)
}

/// Checks the symbol length descriptor, filling it in when it was lost.
pub fn verify_codeword_count(codewords: &mut [u32], num_ec: usize) -> ScanResult<()> {
    if codewords.len() < 4 {
        return Err(ScanError::Format);
    }
    let count = codewords[0] as usize;
    if count > codewords.len() {
        return Err(ScanError::Format);
    }
    if count == 0 {
        if num_ec >= codewords.len() {
            return Err(ScanError::Format);
        }
        codewords[0] = (codewords.len() - num_ec) as u32;
    }
    Ok(())
}

#[cfg(test)]
mod decode_codewords_tests {
    use super::{decode_codewords, verify_codeword_count};
    use crate::pdf417::add_error_correction;
    use crate::ScanError;

    fn symbol(ec_level: u32) -> Vec<u32> {
        let mut codewords = vec![5, 453, 178, 121, 239];
        add_error_correction(&mut codewords, ec_level).unwrap();
        codewords
    }

    #[test]
    fn test_clean() {
        let mut codewords = symbol(2);
        let res = decode_codewords(&mut codewords, 2, &[]).unwrap();
        assert_eq!(res.text, "PDF417");
        assert_eq!(res.errors_corrected, 0);
        assert_eq!(res.ec_level.as_deref(), Some("2"));
    }

    #[test]
    fn test_corrected() {
        let mut codewords = symbol(2);
        codewords[1] = 0;
        codewords[3] = 17;
        codewords[10] = (codewords[10] + 1) % 929;
        let res = decode_codewords(&mut codewords, 2, &[1]).unwrap();
        assert_eq!(res.text, "PDF417");
        assert_eq!(res.errors_corrected, 3);
        assert_eq!(res.erasures, 1);
    }

    #[test]
    fn test_lost_length_descriptor() {
        let mut codewords = symbol(1);
        codewords[0] = 0;
        let res = decode_codewords(&mut codewords, 1, &[0]).unwrap();
        assert_eq!(res.text, "PDF417");
    }

    #[test]
    fn test_rejected() {
        let mut codewords = symbol(2);
        let erasures: Vec<usize> = (0..8).collect();
        assert_eq!(decode_codewords(&mut codewords, 2, &erasures), Err(ScanError::Checksum));
        assert_eq!(decode_codewords(&mut codewords, 9, &[]), Err(ScanError::Checksum));

        codewords[4] = 929;
        assert_eq!(decode_codewords(&mut codewords, 2, &[]), Err(ScanError::Format));
        assert_eq!(decode_codewords(&mut [], 2, &[]), Err(ScanError::Format));
    }

    #[test]
    fn test_verify_codeword_count() {
        let mut codewords = [0, 453, 178, 121, 239, 1, 2, 3, 4];
        verify_codeword_count(&mut codewords, 4).unwrap();
        assert_eq!(codewords[0], 5);

        assert_eq!(verify_codeword_count(&mut [3, 1, 2], 0), Err(ScanError::Format));
        assert_eq!(verify_codeword_count(&mut [20, 1, 2, 3], 0), Err(ScanError::Format));
        assert_eq!(verify_codeword_count(&mut [0, 1, 2, 3], 4), Err(ScanError::Format));
    }
}

// Ambiguous cells
//------------------------------------------------------------------------------

/// Every combination of one value per list. The first list varies fastest.
#[derive(Debug, Clone)]
pub struct CartesianProduct<'a> {
    values: &'a [Vec<u32>],
    counters: Vec<usize>,
    done: bool,
}

impl<'a> CartesianProduct<'a> {
    pub fn new(values: &'a [Vec<u32>]) -> Self {
        let done = values.iter().any(Vec::is_empty);
        Self { values, counters: vec![0; values.len()], done }
    }
}

impl Iterator for CartesianProduct<'_> {
    type Item = Vec<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.counters.iter().zip(self.values).map(|(&c, v)| v[c]).collect();

        self.done = true;
        for (c, v) in self.counters.iter_mut().zip(self.values) {
            *c += 1;
            if *c < v.len() {
                self.done = false;
                break;
            }
            *c = 0;
        }
        Some(item)
    }
}

/// Tries combinations of the candidate values of ambiguous cells until one decodes.
/// Gives up with Checksum after a bounded number of tries.
pub fn decode_ambiguous(
    ec_level: u32,
    codewords: &[u32],
    erasures: &[usize],
    ambiguous_indexes: &[usize],
    ambiguous_values: &[Vec<u32>],
) -> ScanResult<DecoderResult> {
    if ambiguous_indexes.len() != ambiguous_values.len()
        || ambiguous_indexes.iter().any(|&i| i >= codewords.len())
    {
        return Err(ScanError::InvalidArgument);
    }

    for (n, combination) in CartesianProduct::new(ambiguous_values).take(MAX_TRIES).enumerate() {
        let mut attempt = codewords.to_vec();
        for (&i, &v) in ambiguous_indexes.iter().zip(combination.iter()) {
            attempt[i] = v;
        }
        match decode_codewords(&mut attempt, ec_level, erasures) {
            Err(ScanError::Checksum) => trace!("Combination {n} failed: {combination:?}"),
            res => return res,
        }
    }
    debug!("No combination of {} ambiguous cells decoded", ambiguous_indexes.len());
    Err(ScanError::Checksum)
}

#[cfg(test)]
mod ambiguous_tests {
    use super::{decode_ambiguous, CartesianProduct};
    use crate::pdf417::add_error_correction;
    use crate::ScanError;

    #[test]
    fn test_product_order() {
        let values = vec![vec![1, 2], vec![3], vec![4, 5]];
        let all: Vec<_> = CartesianProduct::new(&values).collect();
        assert_eq!(all, vec![vec![1, 3, 4], vec![2, 3, 4], vec![1, 3, 5], vec![2, 3, 5]]);
    }

    #[test]
    fn test_product_edges() {
        assert_eq!(CartesianProduct::new(&[]).collect::<Vec<_>>(), vec![Vec::<u32>::new()]);
        assert_eq!(CartesianProduct::new(&[vec![1], vec![]]).count(), 0);
        assert_eq!(CartesianProduct::new(&vec![vec![0, 1]; 8]).take(100).count(), 100);
    }

    fn damaged() -> Vec<u32> {
        let mut codewords = vec![5, 453, 178, 121, 239];
        add_error_correction(&mut codewords, 1).unwrap();
        codewords[3] = (codewords[3] + 1) % 929;
        codewords[4] = (codewords[4] + 1) % 929;
        codewords
    }

    #[test]
    fn test_second_candidate() {
        let res = decode_ambiguous(1, &damaged(), &[], &[2], &[vec![183, 178]]).unwrap();
        assert_eq!(res.text, "PDF417");
        assert_eq!(res.errors_corrected, 2);
    }

    #[test]
    fn test_exhausted() {
        let mut codewords = damaged();
        codewords[6] = (codewords[6] + 1) % 929;
        let res = decode_ambiguous(1, &codewords, &[], &[2], &[vec![183, 184]]);
        assert_eq!(res, Err(ScanError::Checksum));
    }

    #[test]
    fn test_mismatched_candidates() {
        let res = decode_ambiguous(1, &damaged(), &[], &[2, 40], &[vec![1], vec![2]]);
        assert_eq!(res, Err(ScanError::InvalidArgument));
    }
}

// Detection result
//------------------------------------------------------------------------------

/// Builds the detection result for a symbol from its row indicator columns. The data
/// columns are added by the caller with [`DetectionResult::set_column`].
pub fn merge(
    mut left: Option<DetectionColumn>,
    mut right: Option<DetectionColumn>,
) -> ScanResult<DetectionResult> {
    let left_md = left.as_mut().and_then(DetectionColumn::barcode_metadata);
    let right_md = right.as_mut().and_then(DetectionColumn::barcode_metadata);

    let md = match (left_md, right_md) {
        (None, None) => return Err(ScanError::NotFound),
        (Some(md), None) | (None, Some(md)) => md,
        (Some(l), Some(r)) => {
            if l.column_count() != r.column_count()
                && l.ec_level() != r.ec_level()
                && l.row_count() != r.row_count()
            {
                debug!("Row indicators disagree: {l} and {r}");
                return Err(ScanError::NotFound);
            }
            l
        }
    };
    debug!("PDF417 symbol {md}");

    let mut res = DetectionResult::new(md);
    if let Some(col) = left {
        res.set_column(0, col);
    }
    if let Some(col) = right {
        res.set_column(md.column_count() + 1, col);
    }
    Ok(res)
}

// The length descriptor is implied by the symbol size; trust that over what was read
fn adjust_codeword_count(
    result: &DetectionResult,
    matrix: &mut [Vec<BarcodeValue>],
) -> ScanResult<()> {
    let size = result.column_count() * result.row_count();
    let calculated = size
        .checked_sub(num_ec_codewords(result.ec_level()))
        .filter(|c| (1..=MAX_CODEWORDS_IN_BARCODE).contains(c))
        .ok_or(ScanError::NotFound)?;
    let cell = matrix.first_mut().and_then(|r| r.get_mut(1)).ok_or(ScanError::NotFound)?;
    if cell.value().first() != Some(&(calculated as u32)) {
        trace!("Length descriptor set to {calculated}");
        cell.replace(calculated as u32);
    }
    Ok(())
}

/// Reads the codeword matrix out of a detection result and decodes it. Empty cells are
/// erasures; cells with tied values are tried in turn.
pub fn decode_detection(result: &mut DetectionResult) -> ScanResult<DecoderResult> {
    let mut matrix = result.barcode_matrix();
    adjust_codeword_count(result, &mut matrix)?;

    let cols = result.column_count();
    let mut codewords = vec![0; result.row_count() * cols];
    let mut erasures = Vec::new();
    let mut ambiguous_indexes = Vec::new();
    let mut ambiguous_values = Vec::new();

    for (row, line) in matrix.iter().enumerate() {
        for col in 0..cols {
            let idx = row * cols + col;
            let mut values = line[col + 1].value();
            match values.len() {
                0 => erasures.push(idx),
                1 => codewords[idx] = values[0],
                _ => {
                    values.truncate(MAX_TRIES);
                    ambiguous_indexes.push(idx);
                    ambiguous_values.push(values);
                }
            }
        }
    }
    debug!(
        "{} codewords, {} erasures, {} ambiguous",
        codewords.len(),
        erasures.len(),
        ambiguous_indexes.len()
    );
    decode_ambiguous(
        result.ec_level(),
        &codewords,
        &erasures,
        &ambiguous_indexes,
        &ambiguous_values,
    )
}

#[cfg(test)]
mod detection_tests {
    use super::{decode_detection, merge};
    use crate::pdf417::{
        add_error_correction, Codeword, DetectionColumn, DetectionResult, RowIndicator,
    };
    use crate::ScanError;

    const ROWS: usize = 3;
    const COLS: usize = 3;
    const EC_LEVEL: u32 = 1;
    const ROW_HEIGHT: usize = 3;
    const MAX_Y: usize = ROWS * ROW_HEIGHT - 1;

    fn indicator_value(side: RowIndicator, row: usize) -> u32 {
        let upper = (ROWS - 1) / 3;
        let lower = EC_LEVEL as usize * 3 + (ROWS - 1) % 3;
        let cols = COLS - 1;
        let v = match (side, row % 3) {
            (RowIndicator::Left, 0) | (RowIndicator::Right, 1) => upper,
            (RowIndicator::Left, 1) | (RowIndicator::Right, 2) => lower,
            _ => cols,
        };
        (30 * (row / 3) + v) as u32
    }

    fn codeword(col: usize, row: usize, value: u32) -> Codeword {
        Codeword::new(col * 17, col * 17 + 17, (row % 3) * 3, value)
    }

    fn indicator(side: RowIndicator) -> DetectionColumn {
        let mut col = DetectionColumn::row_indicator(0, MAX_Y, side);
        let x = if side == RowIndicator::Left { 0 } else { COLS + 1 };
        for y in 0..=MAX_Y {
            let row = y / ROW_HEIGHT;
            col.set_codeword(y, codeword(x, row, indicator_value(side, row)));
        }
        col
    }

    fn data_columns() -> Vec<DetectionColumn> {
        let mut codewords = vec![5, 453, 178, 121, 239];
        add_error_correction(&mut codewords, EC_LEVEL).unwrap();
        (0..COLS)
            .map(|c| {
                let mut col = DetectionColumn::new(0, MAX_Y);
                for y in 0..=MAX_Y {
                    let row = y / ROW_HEIGHT;
                    col.set_codeword(y, codeword(c + 1, row, codewords[row * COLS + c]));
                }
                col
            })
            .collect()
    }

    fn assemble(
        left: Option<DetectionColumn>,
        right: Option<DetectionColumn>,
        data: Vec<DetectionColumn>,
    ) -> DetectionResult {
        let mut res = merge(left, right).unwrap();
        for (i, col) in data.into_iter().enumerate() {
            res.set_column(i + 1, col);
        }
        res
    }

    #[test]
    fn test_clean_symbol() {
        let left = Some(indicator(RowIndicator::Left));
        let right = Some(indicator(RowIndicator::Right));
        let mut result = assemble(left, right, data_columns());
        assert_eq!(result.metadata().to_string(), "3x3 ec 1");

        let res = decode_detection(&mut result).unwrap();
        assert_eq!(res.text, "PDF417");
        assert_eq!(res.erasures, 0);
        assert_eq!(res.errors_corrected, 0);
    }

    #[test]
    fn test_erased_and_ambiguous_cells() {
        let mut data = data_columns();
        let mut col = DetectionColumn::new(0, MAX_Y);
        for y in 0..=MAX_Y {
            let Some(cw) = data[1].codeword(y) else { continue };
            match y {
                0 => col.set_codeword(y, codeword(2, 0, 100)),
                2..=5 => {}
                _ => col.set_codeword(y, cw),
            }
        }
        data[1] = col;

        let left = Some(indicator(RowIndicator::Left));
        let right = Some(indicator(RowIndicator::Right));
        let mut result = assemble(left, right, data);
        let res = decode_detection(&mut result).unwrap();
        assert_eq!(res.text, "PDF417");
        assert_eq!(res.erasures, 1);
        assert_eq!(res.errors_corrected, 2);
    }

    #[test]
    fn test_left_indicator_only() {
        let mut result = assemble(Some(indicator(RowIndicator::Left)), None, data_columns());
        assert!(result.column(COLS + 1).is_none());
        assert_eq!(decode_detection(&mut result).unwrap().text, "PDF417");
    }

    #[test]
    fn test_rows_from_neighbours() {
        let mut left = indicator(RowIndicator::Left);
        left.set_codeword(4, codeword(0, 2, indicator_value(RowIndicator::Left, 2)));
        let mut result = assemble(Some(left), None, data_columns());

        result.adjusted_columns();
        let col = result.column(1).unwrap();
        assert_eq!(col.codeword(4).and_then(|cw| cw.row_number()), Some(1));
        assert_eq!(col.codeword(5).and_then(|cw| cw.row_number()), Some(1));
        assert_eq!(decode_detection(&mut result).unwrap().text, "PDF417");
    }

    #[test]
    fn test_merge_without_indicators() {
        assert_eq!(merge(None, None).err(), Some(ScanError::NotFound));
        let empty = DetectionColumn::row_indicator(0, MAX_Y, RowIndicator::Left);
        assert_eq!(merge(Some(empty), None).err(), Some(ScanError::NotFound));
    }
}
