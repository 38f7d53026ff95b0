// Bar and space widths
//------------------------------------------------------------------------------

pub const BARS_IN_MODULE: usize = 8;
pub const MODULES_IN_CODEWORD: usize = 17;

/// Widths of the eight bars and spaces of a 17 module pattern, leftmost bar first.
pub fn bit_counts(pattern: u32) -> [usize; BARS_IN_MODULE] {
    let mut counts = [0; BARS_IN_MODULE];
    let mut prev = 0;
    let mut i = BARS_IN_MODULE - 1;
    for k in 0..MODULES_IN_CODEWORD {
        let bit = (pattern >> k) & 1;
        if bit != prev {
            prev = bit;
            if i == 0 {
                break;
            }
            i -= 1;
        }
        counts[i] += 1;
    }
    counts
}

/// Packs bar and space widths back into a module pattern.
pub fn bit_value(counts: &[usize; BARS_IN_MODULE]) -> u32 {
    let mut res = 0;
    for (i, &c) in counts.iter().enumerate() {
        for _ in 0..c {
            res = res << 1 | (i % 2 == 0) as u32;
        }
    }
    res
}

/// Cluster of a pattern. Rows of a symbol cycle through clusters 0, 3 and 6.
pub fn bucket(counts: &[usize; BARS_IN_MODULE]) -> usize {
    let c = |i: usize| counts[i] as i64;
    (c(0) - c(2) + c(4) - c(6) + 9).rem_euclid(9) as usize
}

/// Scales pixel run widths of one codeword down to module widths summing to 17 by
/// sampling at module centres.
pub fn sample_bit_counts(pixel_counts: &[usize; BARS_IN_MODULE]) -> [usize; BARS_IN_MODULE] {
    let sum: usize = pixel_counts.iter().sum();
    let mut res = [0; BARS_IN_MODULE];
    let mut idx = 0;
    let mut prev_sum = 0;
    for i in 0..MODULES_IN_CODEWORD {
        let sample = sum as f64 / (2 * MODULES_IN_CODEWORD) as f64
            + (i * sum) as f64 / MODULES_IN_CODEWORD as f64;
        if idx < BARS_IN_MODULE - 1 && (prev_sum + pixel_counts[idx]) as f64 <= sample {
            prev_sum += pixel_counts[idx];
            idx += 1;
        }
        res[idx] += 1;
    }
    res
}


// Codeword
//------------------------------------------------------------------------------

/// One codeword read from a column of a symbol, with its pixel span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codeword {
    start_x: usize,
    end_x: usize,
    bucket: usize,
    value: u32,
    row_number: Option<usize>,
}

impl Codeword {
    pub fn new(start_x: usize, end_x: usize, bucket: usize, value: u32) -> Self {
        Self { start_x, end_x, bucket, value, row_number: None }
    }

    pub fn start_x(&self) -> usize {
        self.start_x
    }

    pub fn end_x(&self) -> usize {
        self.end_x
    }

    pub fn width(&self) -> usize {
        self.end_x - self.start_x
    }

    pub fn bucket(&self) -> usize {
        self.bucket
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn row_number(&self) -> Option<usize> {
        self.row_number
    }

    pub fn set_row_number(&mut self, row: Option<usize>) {
        self.row_number = row;
    }

    pub fn has_valid_row_number(&self) -> bool {
        self.row_number.is_some_and(|r| self.is_valid_row_number(r))
    }

    /// A row can only hold codewords of its own cluster.
    pub fn is_valid_row_number(&self, row: usize) -> bool {
        self.bucket == (row % 3) * 3
    }

    /// Row indicator codewords carry their row group in `value / 30`.
    pub fn set_row_number_as_row_indicator(&mut self) {
        self.row_number = Some((self.value / 30) as usize * 3 + self.bucket / 3);
    }
}

#[cfg(test)]
mod codeword_tests {
    use super::Codeword;

    #[test]
    fn test_row_indicator() {
        let mut cw = Codeword::new(10, 27, 3, 4 * 30 + 7);
        assert_eq!(cw.width(), 17);
        assert!(!cw.has_valid_row_number());
        cw.set_row_number_as_row_indicator();
        assert_eq!(cw.row_number(), Some(13));
        assert!(cw.has_valid_row_number());
    }

    #[test]
    fn test_valid_row_number() {
        let mut cw = Codeword::new(0, 17, 6, 5);
        assert!(cw.is_valid_row_number(2));
        assert!(cw.is_valid_row_number(5));
        assert!(!cw.is_valid_row_number(3));
        cw.set_row_number(Some(4));
        assert!(!cw.has_valid_row_number());
    }
}
