use std::fmt::{Display, Formatter};

use super::bit_array::BitArray;
use super::error::{ScanError, ScanResult};

// Bit matrix
//------------------------------------------------------------------------------

/// Dense 2D grid of bits. Rows are packed into `row_size` words each so that a row can be
/// copied in and out of a [`BitArray`] word by word. `get(x, y)` addresses column x of
/// row y; a set bit is a dark pixel or module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitMatrix {
    width: usize,
    height: usize,
    row_size: usize,
    bits: Vec<u32>,
}

impl BitMatrix {
    pub fn new(width: usize, height: usize) -> ScanResult<Self> {
        if width < 1 || height < 1 {
            return Err(ScanError::InvalidArgument);
        }
        let row_size = width.div_ceil(32);
        Ok(Self { width, height, row_size, bits: vec![0; row_size * height] })
    }

    pub fn square(dimension: usize) -> ScanResult<Self> {
        Self::new(dimension, dimension)
    }

    /// Builds a matrix from a textual picture where each row is a line and each cell is
    /// either `set` or `unset`.
    pub fn parse(repr: &str, set: &str, unset: &str) -> ScanResult<Self> {
        let mut cells = Vec::with_capacity(repr.len());
        let mut row_len: Option<usize> = None;
        let mut rows = 0;

        for line in repr.lines() {
            let mut rest = line;
            let start = cells.len();
            while !rest.is_empty() {
                if let Some(r) = rest.strip_prefix(set) {
                    cells.push(true);
                    rest = r;
                } else if let Some(r) = rest.strip_prefix(unset) {
                    cells.push(false);
                    rest = r;
                } else {
                    return Err(ScanError::InvalidArgument);
                }
            }
            let len = cells.len() - start;
            if len == 0 {
                continue;
            }
            match row_len {
                None => row_len = Some(len),
                Some(l) if l != len => return Err(ScanError::InvalidArgument),
                _ => {}
            }
            rows += 1;
        }

        let width = row_len.ok_or(ScanError::InvalidArgument)?;
        let mut matrix = Self::new(width, rows)?;
        for (i, _) in cells.iter().enumerate().filter(|(_, c)| **c) {
            matrix.set(i % width, i / width);
        }
        Ok(matrix)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row_size(&self) -> usize {
        self.row_size
    }

    #[inline]
    fn offset(&self, x: usize, y: usize) -> usize {
        y * self.row_size + (x >> 5)
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        (self.bits[self.offset(x, y)] >> (x & 0x1f)) & 1 != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize) {
        let off = self.offset(x, y);
        self.bits[off] |= 1 << (x & 0x1f);
    }

    #[inline]
    pub fn unset(&mut self, x: usize, y: usize) {
        let off = self.offset(x, y);
        self.bits[off] &= !(1 << (x & 0x1f));
    }

    #[inline]
    pub fn flip(&mut self, x: usize, y: usize) {
        let off = self.offset(x, y);
        self.bits[off] ^= 1 << (x & 0x1f);
    }

    /// Flips every bit that is set in `mask`.
    pub fn xor(&mut self, mask: &BitMatrix) -> ScanResult<()> {
        if self.width != mask.width || self.height != mask.height {
            return Err(ScanError::SizeMismatch);
        }
        for (a, b) in self.bits.iter_mut().zip(mask.bits.iter()) {
            *a ^= b;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    pub fn set_region(
        &mut self,
        left: usize,
        top: usize,
        width: usize,
        height: usize,
    ) -> ScanResult<()> {
        if width < 1 || height < 1 {
            return Err(ScanError::InvalidArgument);
        }
        let (right, bottom) = (left + width, top + height);
        if bottom > self.height || right > self.width {
            return Err(ScanError::InvalidArgument);
        }
        for y in top..bottom {
            let off = y * self.row_size;
            for x in left..right {
                self.bits[off + (x >> 5)] |= 1 << (x & 0x1f);
            }
        }
        Ok(())
    }

    /// Copies row `y` into `row`, reusing its storage when it's large enough.
    pub fn row(&self, y: usize, row: &mut BitArray) {
        if row.size() < self.width {
            *row = BitArray::new(self.width);
        }
        let src = &self.bits[y * self.row_size..(y + 1) * self.row_size];
        let dst = row.words_mut();
        dst.fill(0);
        dst[..self.row_size].copy_from_slice(src);
    }

    pub fn row_array(&self, y: usize) -> BitArray {
        let mut row = BitArray::new(self.width);
        self.row(y, &mut row);
        row
    }

    pub fn set_row(&mut self, y: usize, row: &BitArray) {
        let off = y * self.row_size;
        self.bits[off..off + self.row_size].copy_from_slice(&row.words()[..self.row_size]);
    }

    /// Rotates the matrix in place by 180 degrees.
    pub fn rotate180(&mut self) {
        let mut top = BitArray::new(self.width);
        let mut bottom = BitArray::new(self.width);
        for i in 0..self.height.div_ceil(2) {
            self.row(i, &mut top);
            self.row(self.height - 1 - i, &mut bottom);
            top.reverse();
            bottom.reverse();
            self.set_row(i, &bottom);
            self.set_row(self.height - 1 - i, &top);
        }
    }

    /// Swaps rows and columns, turning a mirrored symbol back into a readable one.
    pub fn mirror(&mut self) {
        debug_assert!(self.width == self.height, "Can only mirror square matrix");
        for x in 0..self.width {
            for y in x + 1..self.height {
                if self.get(x, y) != self.get(y, x) {
                    self.flip(y, x);
                    self.flip(x, y);
                }
            }
        }
    }

    /// Bounding box of all set bits as `(left, top, width, height)`, where width and height
    /// are the distances between the extreme set bits.
    pub fn enclosing_rectangle(&self) -> Option<(usize, usize, usize, usize)> {
        let mut left = self.width;
        let mut top = self.height;
        let mut right = 0;
        let mut bottom = 0;
        let mut found = false;

        for y in 0..self.height {
            for x32 in 0..self.row_size {
                let bits = self.bits[y * self.row_size + x32];
                if bits == 0 {
                    continue;
                }
                found = true;
                top = top.min(y);
                bottom = bottom.max(y);
                left = left.min((x32 << 5) + bits.trailing_zeros() as usize);
                right = right.max((x32 << 5) + 31 - bits.leading_zeros() as usize);
            }
        }

        if !found {
            return None;
        }
        Some((left, top, right - left, bottom - top))
    }

    pub fn top_left_on_bit(&self) -> Option<(usize, usize)> {
        let off = self.bits.iter().position(|&b| b != 0)?;
        let y = off / self.row_size;
        let x = ((off % self.row_size) << 5) + self.bits[off].trailing_zeros() as usize;
        Some((x, y))
    }

    pub fn bottom_right_on_bit(&self) -> Option<(usize, usize)> {
        let off = self.bits.iter().rposition(|&b| b != 0)?;
        let y = off / self.row_size;
        let x = ((off % self.row_size) << 5) + 31 - self.bits[off].leading_zeros() as usize;
        Some((x, y))
    }

    pub fn count_ones(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }
}

impl Display for BitMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for y in 0..self.height {
            for x in 0..self.width {
                f.write_str(if self.get(x, y) { "X " } else { "  " })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod bit_matrix_tests {
    use super::BitMatrix;
    use crate::{BitArray, ScanError};

    #[test]
    fn test_get_set() {
        let mut matrix = BitMatrix::square(33).unwrap();
        assert_eq!(matrix.row_size(), 2);
        for y in 0..33 {
            for x in 0..33 {
                if y * x % 3 == 0 {
                    matrix.set(x, y);
                }
            }
        }
        for y in 0..33 {
            for x in 0..33 {
                assert_eq!(matrix.get(x, y), y * x % 3 == 0);
            }
        }
        matrix.flip(0, 0);
        assert!(!matrix.get(0, 0));
        matrix.unset(3, 3);
        assert!(!matrix.get(3, 3));
    }

    #[test]
    fn test_invalid_dimension() {
        assert_eq!(BitMatrix::new(0, 3), Err(ScanError::InvalidArgument));
    }

    #[test]
    fn test_set_region() {
        let mut matrix = BitMatrix::square(5).unwrap();
        matrix.set_region(1, 1, 3, 3).unwrap();
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(matrix.get(x, y), (1..=3).contains(&x) && (1..=3).contains(&y));
            }
        }
        assert_eq!(matrix.set_region(3, 3, 3, 1), Err(ScanError::InvalidArgument));
    }

    #[test]
    fn test_enclosing() {
        let mut matrix = BitMatrix::square(5).unwrap();
        assert_eq!(matrix.enclosing_rectangle(), None);
        matrix.set_region(1, 1, 1, 1).unwrap();
        assert_eq!(matrix.enclosing_rectangle(), Some((1, 1, 0, 0)));
        matrix.set_region(1, 1, 3, 2).unwrap();
        assert_eq!(matrix.enclosing_rectangle(), Some((1, 1, 2, 1)));
        matrix.set_region(0, 0, 5, 5).unwrap();
        assert_eq!(matrix.enclosing_rectangle(), Some((0, 0, 4, 4)));
    }

    #[test]
    fn test_on_bit() {
        let mut matrix = BitMatrix::square(5).unwrap();
        assert_eq!(matrix.top_left_on_bit(), None);
        assert_eq!(matrix.bottom_right_on_bit(), None);
        matrix.set_region(1, 1, 1, 1).unwrap();
        assert_eq!(matrix.top_left_on_bit(), Some((1, 1)));
        assert_eq!(matrix.bottom_right_on_bit(), Some((1, 1)));
        matrix.set_region(1, 1, 3, 2).unwrap();
        assert_eq!(matrix.top_left_on_bit(), Some((1, 1)));
        assert_eq!(matrix.bottom_right_on_bit(), Some((3, 2)));
    }

    #[test]
    fn test_row() {
        let mut matrix = BitMatrix::new(102, 5).unwrap();
        for x in 0..102 {
            if x & 3 == 0 {
                matrix.set(x, 2);
            }
        }
        let mut row = BitArray::new(10);
        matrix.row(2, &mut row);
        assert_eq!(row.size(), 102);
        for x in 0..102 {
            assert_eq!(row.get(x), x & 3 == 0);
        }
        matrix.set_row(4, &row);
        assert_eq!(matrix.row_array(4), row);
    }

    #[test]
    fn test_rotate180() {
        let mut matrix = BitMatrix::new(7, 4).unwrap();
        matrix.set(0, 0);
        matrix.set(6, 1);
        matrix.set(3, 3);
        let orig = matrix.clone();
        matrix.rotate180();
        assert!(matrix.get(6, 3));
        assert!(matrix.get(0, 2));
        assert!(matrix.get(3, 0));
        assert_eq!(matrix.count_ones(), 3);
        matrix.rotate180();
        assert_eq!(matrix, orig);
    }

    #[test]
    fn test_parse() {
        let matrix = BitMatrix::parse("X . \n. X \n", "X ", ". ").unwrap();
        assert_eq!(matrix.width(), 2);
        assert_eq!(matrix.height(), 2);
        assert!(matrix.get(0, 0));
        assert!(matrix.get(1, 1));
        assert!(!matrix.get(1, 0));
        assert_eq!(BitMatrix::parse("X \nX X \n", "X ", ". "), Err(ScanError::InvalidArgument));
    }

    #[test]
    fn test_xor() {
        let mut a = BitMatrix::square(3).unwrap();
        let mut b = BitMatrix::square(3).unwrap();
        a.set(1, 1);
        b.set(1, 1);
        b.set(2, 2);
        a.xor(&b).unwrap();
        assert!(!a.get(1, 1));
        assert!(a.get(2, 2));
        assert_eq!(a.xor(&BitMatrix::square(4).unwrap()), Err(ScanError::SizeMismatch));
    }

    #[test]
    fn test_mirror() {
        let mut matrix = BitMatrix::square(4).unwrap();
        matrix.set(3, 0);
        matrix.mirror();
        assert!(matrix.get(0, 3));
        assert!(!matrix.get(3, 0));
    }
}
