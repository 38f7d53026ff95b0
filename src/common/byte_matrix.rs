use std::fmt::{Display, Formatter};

// Byte matrix
//------------------------------------------------------------------------------

/// Module grid used while a symbol is being built. Cells are `-1` while empty, then `0`
/// for light and `1` for dark modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteMatrix {
    width: usize,
    height: usize,
    cells: Vec<i8>,
}

pub const EMPTY: i8 = -1;

impl ByteMatrix {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height, cells: vec![EMPTY; width * height] }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> i8 {
        self.cells[y * self.width + x]
    }

    #[inline]
    pub fn is_empty(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == EMPTY
    }

    #[inline]
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        self.get(x, y) == 1
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        self.cells[y * self.width + x] = value as i8;
    }

    pub fn clear(&mut self) {
        self.cells.fill(EMPTY);
    }

    pub fn row(&self, y: usize) -> &[i8] {
        &self.cells[y * self.width..(y + 1) * self.width]
    }
}

impl Display for ByteMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for y in 0..self.height {
            for &c in self.row(y) {
                f.write_str(match c {
                    0 => " 0",
                    1 => " 1",
                    _ => "  ",
                })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod byte_matrix_tests {
    use super::ByteMatrix;

    #[test]
    fn test_tri_state() {
        let mut matrix = ByteMatrix::new(3, 2);
        assert!(matrix.is_empty(2, 1));
        matrix.set(2, 1, true);
        matrix.set(0, 0, false);
        assert_eq!(matrix.get(2, 1), 1);
        assert_eq!(matrix.get(0, 0), 0);
        assert_eq!(matrix.row(1), &[-1, -1, 1]);
        assert_eq!(matrix.to_string(), " 0    \n     1\n");
        matrix.clear();
        assert!(matrix.is_empty(0, 0));
    }
}
