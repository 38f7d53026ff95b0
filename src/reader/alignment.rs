use log::trace;

use crate::common::bit_matrix::BitMatrix;
use crate::common::error::{ScanError, ScanResult};
use crate::common::geometry::Point;

// Alignment pattern
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentPattern {
    pub x: f64,
    pub y: f64,
    pub module_size: f64,
}

impl AlignmentPattern {
    pub fn new(x: f64, y: f64, module_size: f64) -> Self {
        Self { x, y, module_size }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn about_equals(&self, module_size: f64, x: f64, y: f64) -> bool {
        if (y - self.y).abs() <= module_size && (x - self.x).abs() <= module_size {
            let diff = (module_size - self.module_size).abs();
            return diff <= 1.0 || diff <= self.module_size;
        }
        false
    }

    pub fn combine_estimate(&self, x: f64, y: f64, module_size: f64) -> Self {
        Self::new((self.x + x) / 2.0, (self.y + y) / 2.0, (self.module_size + module_size) / 2.0)
    }
}

// Alignment pattern finder
//------------------------------------------------------------------------------

/// Searches a region of a binarized image for the 1:1:1 cross of an alignment pattern
/// with a known module size. Only the white-black-white part around the centre stone is
/// matched, so the outer dark ring isn't required to be intact.
pub struct AlignmentPatternFinder<'a> {
    image: &'a BitMatrix,
    start_x: usize,
    start_y: usize,
    width: usize,
    height: usize,
    module_size: f64,
    possible_centers: Vec<AlignmentPattern>,
}

impl<'a> AlignmentPatternFinder<'a> {
    pub fn new(
        image: &'a BitMatrix,
        start_x: usize,
        start_y: usize,
        width: usize,
        height: usize,
        module_size: f64,
    ) -> Self {
        debug_assert!(start_x + width <= image.width(), "Region exceeds image width");
        debug_assert!(start_y + height <= image.height(), "Region exceeds image height");
        Self {
            image,
            start_x,
            start_y,
            width,
            height,
            module_size,
            possible_centers: Vec::with_capacity(5),
        }
    }

    /// Returns the first centre seen twice, or else the first one seen at all.
    pub fn find(&mut self) -> ScanResult<AlignmentPattern> {
        let max_j = self.start_x + self.width;
        let middle_i = self.start_y + self.height / 2;

        for gen in 0..self.height {
            // Rows alternate below and above the middle
            let offset = (gen + 1) / 2;
            let i = if gen & 1 == 0 { middle_i + offset } else { middle_i - offset };
            if i >= self.start_y + self.height {
                continue;
            }

            let mut counts = [0usize; 3];
            let mut state = 0;
            let mut j = self.start_x;

            // A leading white run has unknown length
            while j < max_j && !self.image.get(j, i) {
                j += 1;
            }
            while j < max_j {
                if self.image.get(j, i) {
                    if state == 1 {
                        counts[1] += 1;
                    } else if state == 2 {
                        if self.found_pattern_cross(&counts) {
                            if let Some(confirmed) = self.handle_possible_center(&counts, i, j) {
                                return Ok(confirmed);
                            }
                        }
                        counts = [counts[2], 1, 0];
                        state = 1;
                    } else {
                        state += 1;
                        counts[state] += 1;
                    }
                } else {
                    if state == 1 {
                        state += 1;
                    }
                    counts[state] += 1;
                }
                j += 1;
            }

            if self.found_pattern_cross(&counts) {
                if let Some(confirmed) = self.handle_possible_center(&counts, i, max_j) {
                    return Ok(confirmed);
                }
            }
        }

        self.possible_centers.first().copied().ok_or(ScanError::NotFound)
    }

    fn found_pattern_cross(&self, counts: &[usize; 3]) -> bool {
        let max_var = self.module_size / 2.0;
        counts.iter().all(|&c| (self.module_size - c as f64).abs() < max_var)
    }

    fn handle_possible_center(
        &mut self,
        counts: &[usize; 3],
        i: usize,
        j: usize,
    ) -> Option<AlignmentPattern> {
        let total: usize = counts.iter().sum();
        let center_j = center_from_end(counts, j);
        let center_i = self.cross_check_vertical(i, center_j as usize, 2 * counts[1], total)?;
        let module_size = total as f64 / 3.0;

        if let Some(c) =
            self.possible_centers.iter().find(|c| c.about_equals(module_size, center_j, center_i))
        {
            return Some(c.combine_estimate(center_j, center_i, module_size));
        }
        trace!("Alignment candidate at ({center_j:.1}, {center_i:.1})");
        self.possible_centers.push(AlignmentPattern::new(center_j, center_i, module_size));
        None
    }

    fn cross_check_vertical(
        &self,
        start_i: usize,
        center_j: usize,
        max_count: usize,
        orig_total: usize,
    ) -> Option<f64> {
        let img = self.image;
        let max_i = img.height() as i64;
        let mut counts = [0usize; 3];

        let mut i = start_i as i64;
        while i >= 0 && img.get(center_j, i as usize) && counts[1] <= max_count {
            counts[1] += 1;
            i -= 1;
        }
        if i < 0 || counts[1] > max_count {
            return None;
        }
        while i >= 0 && !img.get(center_j, i as usize) && counts[0] <= max_count {
            counts[0] += 1;
            i -= 1;
        }
        if counts[0] > max_count {
            return None;
        }

        let mut i = start_i as i64 + 1;
        while i < max_i && img.get(center_j, i as usize) && counts[1] <= max_count {
            counts[1] += 1;
            i += 1;
        }
        if i == max_i || counts[1] > max_count {
            return None;
        }
        while i < max_i && !img.get(center_j, i as usize) && counts[2] <= max_count {
            counts[2] += 1;
            i += 1;
        }
        if counts[2] > max_count {
            return None;
        }

        let total: usize = counts.iter().sum();
        if 5 * total.abs_diff(orig_total) >= 2 * orig_total {
            return None;
        }
        self.found_pattern_cross(&counts).then(|| center_from_end(&counts, i as usize))
    }
}

fn center_from_end(counts: &[usize; 3], end: usize) -> f64 {
    (end - counts[2]) as f64 - counts[1] as f64 / 2.0
}
