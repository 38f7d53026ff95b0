use std::ops::Deref;

use super::byte_matrix::ByteMatrix;
use super::error::{ScanError, ScanResult};

// Mask pattern
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord, Hash)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub fn new(pattern: u8) -> ScanResult<Self> {
        if pattern < 8 {
            Ok(Self(pattern))
        } else {
            Err(ScanError::InvalidMask)
        }
    }

    /// All eight patterns in reference order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..8).map(Self)
    }
}

impl Deref for MaskPattern {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

mod mask_functions {
    pub fn checkerboard(x: i32, y: i32) -> bool {
        (x + y) & 1 == 0
    }

    pub fn horizontal_lines(_: i32, y: i32) -> bool {
        y & 1 == 0
    }

    pub fn vertical_lines(x: i32, _: i32) -> bool {
        x % 3 == 0
    }

    pub fn diagonal_lines(x: i32, y: i32) -> bool {
        (x + y) % 3 == 0
    }

    pub fn large_checkerboard(x: i32, y: i32) -> bool {
        ((y >> 1) + (x / 3)) & 1 == 0
    }

    pub fn fields(x: i32, y: i32) -> bool {
        ((x * y) & 1) + ((x * y) % 3) == 0
    }

    pub fn diamonds(x: i32, y: i32) -> bool {
        (((x * y) & 1) + ((x * y) % 3)) & 1 == 0
    }

    pub fn meadow(x: i32, y: i32) -> bool {
        (((x + y) & 1) + ((x * y) % 3)) & 1 == 0
    }
}

impl MaskPattern {
    /// Predicate over (column, row) telling whether a data module is inverted.
    pub fn mask_function(self) -> fn(i32, i32) -> bool {
        match *self {
            0b000 => mask_functions::checkerboard,
            0b001 => mask_functions::horizontal_lines,
            0b010 => mask_functions::vertical_lines,
            0b011 => mask_functions::diagonal_lines,
            0b100 => mask_functions::large_checkerboard,
            0b101 => mask_functions::fields,
            0b110 => mask_functions::diamonds,
            _ => mask_functions::meadow,
        }
    }

    #[inline]
    pub fn is_masked(self, x: usize, y: usize) -> bool {
        (self.mask_function())(x as i32, y as i32)
    }
}

#[cfg(test)]
mod mask_pattern_tests {
    use test_case::test_case;

    use super::MaskPattern;
    use crate::ScanError;

    #[test_case(0, &[(0, 0), (1, 1), (3, 5)], &[(1, 0)])]
    #[test_case(1, &[(5, 0), (3, 2)], &[(0, 1)])]
    #[test_case(2, &[(0, 7), (3, 1)], &[(1, 0), (2, 2)])]
    #[test_case(3, &[(1, 2), (0, 0)], &[(1, 1)])]
    #[test_case(4, &[(0, 0), (2, 1), (3, 2)], &[(3, 0), (0, 2)])]
    #[test_case(5, &[(0, 4), (6, 6)], &[(1, 1), (5, 5)])]
    #[test_case(6, &[(1, 1), (0, 5)], &[(2, 2), (3, 3)])]
    #[test_case(7, &[(0, 0), (1, 3)], &[(1, 0), (1, 2)])]
    fn test_mask_functions(pattern: u8, masked: &[(usize, usize)], unmasked: &[(usize, usize)]) {
        let mask = MaskPattern::new(pattern).unwrap();
        for &(x, y) in masked {
            assert!(mask.is_masked(x, y), "({x}, {y}) should be masked");
        }
        for &(x, y) in unmasked {
            assert!(!mask.is_masked(x, y), "({x}, {y}) shouldn't be masked");
        }
    }

    #[test]
    fn test_invalid_mask() {
        assert_eq!(MaskPattern::new(8), Err(ScanError::InvalidMask));
        assert_eq!(MaskPattern::all().count(), 8);
    }
}

// Penalty rules
//------------------------------------------------------------------------------

const N1: u32 = 3;
const N2: u32 = 3;
const N3: u32 = 40;
const N4: u32 = 10;

pub fn compute_total_penalty(matrix: &ByteMatrix) -> u32 {
    compute_adjacent_penalty(matrix)
        + compute_block_penalty(matrix)
        + compute_finder_pattern_penalty(matrix)
        + compute_balance_penalty(matrix)
}

// Runs of five or more same coloured modules in a row or column
pub fn compute_adjacent_penalty(matrix: &ByteMatrix) -> u32 {
    let (w, h) = (matrix.width(), matrix.height());
    run_penalty(h, w, |i, j| matrix.get(j, i)) + run_penalty(w, h, |i, j| matrix.get(i, j))
}

fn run_penalty(outer: usize, inner: usize, get: impl Fn(usize, usize) -> i8) -> u32 {
    let mut pen = 0;
    for i in 0..outer {
        let mut run = 0;
        let mut last = -1;
        for j in 0..inner {
            let clr = get(i, j);
            if clr == last {
                run += 1;
                continue;
            }
            if run >= 5 {
                pen += N1 + (run - 5);
            }
            run = 1;
            last = clr;
        }
        if run >= 5 {
            pen += N1 + (run - 5);
        }
    }
    pen
}

// 2x2 blocks of one colour
pub fn compute_block_penalty(matrix: &ByteMatrix) -> u32 {
    let mut pen = 0;
    for y in 0..matrix.height().saturating_sub(1) {
        for x in 0..matrix.width().saturating_sub(1) {
            let clr = matrix.get(x, y);
            if clr == matrix.get(x + 1, y)
                && clr == matrix.get(x, y + 1)
                && clr == matrix.get(x + 1, y + 1)
            {
                pen += N2;
            }
        }
    }
    pen
}

// 1:1:3:1:1 dark-light pattern with four light modules on either side
pub fn compute_finder_pattern_penalty(matrix: &ByteMatrix) -> u32 {
    const PATTERN: [i8; 7] = [1, 0, 1, 1, 1, 0, 1];
    let (w, h) = (matrix.width(), matrix.height());

    let is_light_run = |len: usize, from: isize, to: isize, get: &dyn Fn(usize) -> i8| {
        let from = from.max(0) as usize;
        let to = (to.max(0) as usize).min(len);
        (from..to).all(|k| get(k) != 1)
    };

    let mut count = 0;
    for y in 0..h {
        for x in 0..w {
            let row = |k: usize| matrix.get(k, y);
            if x + 7 <= w
                && PATTERN.iter().enumerate().all(|(k, &p)| row(x + k) == p)
                && (is_light_run(w, x as isize - 4, x as isize, &row)
                    || is_light_run(w, x as isize + 7, x as isize + 11, &row))
            {
                count += 1;
            }
            let col = |k: usize| matrix.get(x, k);
            if y + 7 <= h
                && PATTERN.iter().enumerate().all(|(k, &p)| col(y + k) == p)
                && (is_light_run(h, y as isize - 4, y as isize, &col)
                    || is_light_run(h, y as isize + 7, y as isize + 11, &col))
            {
                count += 1;
            }
        }
    }
    count * N3
}

// Deviation of the dark ratio from 50% in 5% steps
pub fn compute_balance_penalty(matrix: &ByteMatrix) -> u32 {
    let total = matrix.width() * matrix.height();
    if total == 0 {
        return 0;
    }
    let dark = (0..matrix.height())
        .map(|y| matrix.row(y).iter().filter(|&&c| c == 1).count())
        .sum::<usize>();
    let variance = (dark * 2).abs_diff(total) * 10 / total;
    variance as u32 * N4
}

#[cfg(test)]
mod penalty_tests {
    use super::{
        compute_adjacent_penalty, compute_balance_penalty, compute_block_penalty,
        compute_finder_pattern_penalty,
    };
    use crate::common::byte_matrix::ByteMatrix;

    fn matrix(rows: &[&str]) -> ByteMatrix {
        let mut m = ByteMatrix::new(rows[0].len(), rows.len());
        for (y, r) in rows.iter().enumerate() {
            for (x, c) in r.bytes().enumerate() {
                m.set(x, y, c == b'1');
            }
        }
        m
    }

    #[test]
    fn test_adjacent_penalty() {
        // Five light cells in a row, single row matrix
        assert_eq!(compute_adjacent_penalty(&matrix(&["00000"])), 3);
        assert_eq!(compute_adjacent_penalty(&matrix(&["000000"])), 4);
        assert_eq!(compute_adjacent_penalty(&matrix(&["0000011111"])), 6);
        assert_eq!(compute_adjacent_penalty(&matrix(&["0101"])), 0);
        // Columns count too
        let m = matrix(&["01", "01", "01", "01", "01"]);
        assert_eq!(compute_adjacent_penalty(&m), 6);
    }

    #[test]
    fn test_block_penalty() {
        assert_eq!(compute_block_penalty(&matrix(&["00", "00"])), 3);
        assert_eq!(compute_block_penalty(&matrix(&["000", "000"])), 6);
        assert_eq!(compute_block_penalty(&matrix(&["01", "10"])), 0);
        assert_eq!(compute_block_penalty(&matrix(&["11", "11"])), 3);
    }

    #[test]
    fn test_finder_pattern_penalty() {
        assert_eq!(compute_finder_pattern_penalty(&matrix(&["00001011101"])), 40);
        assert_eq!(compute_finder_pattern_penalty(&matrix(&["10111010000"])), 40);
        assert_eq!(compute_finder_pattern_penalty(&matrix(&["1011101"])), 40);
        assert_eq!(compute_finder_pattern_penalty(&matrix(&["10111010001"])), 40);
        assert_eq!(compute_finder_pattern_penalty(&matrix(&["100010111011"])), 0);
        assert_eq!(compute_finder_pattern_penalty(&matrix(&["1011001"])), 0);
    }

    #[test]
    fn test_balance_penalty() {
        assert_eq!(compute_balance_penalty(&matrix(&["01"])), 0);
        assert_eq!(compute_balance_penalty(&matrix(&["11"])), 100);
        assert_eq!(compute_balance_penalty(&matrix(&["000000"])), 100);
        // 30% dark is four 5% steps away
        assert_eq!(compute_balance_penalty(&matrix(&["1110000000"])), 40);
    }
}
