use log::{debug, trace};

use crate::common::bit_matrix::BitMatrix;
use crate::common::error::{ScanError, ScanResult};
use crate::common::geometry::Point;

const CENTER_QUORUM: usize = 2;
const MIN_SKIP: usize = 3;
const MAX_MODULES: usize = 57;

// Finder pattern
//------------------------------------------------------------------------------

/// Centre of one of the three 7x7 corner patterns, with the number of scan rows that
/// agreed on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    pub x: f64,
    pub y: f64,
    pub module_size: f64,
    pub count: usize,
}

impl FinderPattern {
    pub fn new(x: f64, y: f64, module_size: f64) -> Self {
        Self { x, y, module_size, count: 1 }
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// True when (x, y) lies within one module of this centre and the module sizes
    /// differ by at most one pixel or by no more than this module size.
    pub fn about_equals(&self, module_size: f64, x: f64, y: f64) -> bool {
        if (y - self.y).abs() <= module_size && (x - self.x).abs() <= module_size {
            let diff = (module_size - self.module_size).abs();
            return diff <= 1.0 || diff <= self.module_size;
        }
        false
    }

    /// Merges a new sighting, weighting the stored estimate by its count.
    pub fn combine_estimate(&self, x: f64, y: f64, module_size: f64) -> Self {
        let n = self.count as f64 + 1.0;
        Self {
            x: (self.count as f64 * self.x + x) / n,
            y: (self.count as f64 * self.y + y) / n,
            module_size: (self.count as f64 * self.module_size + module_size) / n,
            count: self.count + 1,
        }
    }
}

/// The three finder patterns in reading order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPatternInfo {
    pub bottom_left: FinderPattern,
    pub top_left: FinderPattern,
    pub top_right: FinderPattern,
}

#[cfg(test)]
mod finder_pattern_tests {
    use super::FinderPattern;

    #[test]
    fn test_about_equals() {
        let fp = FinderPattern::new(10.0, 10.0, 4.0);
        assert!(fp.about_equals(4.0, 13.0, 7.0));
        assert!(!fp.about_equals(4.0, 15.0, 10.0));
        assert!(fp.about_equals(7.5, 10.0, 10.0));
        assert!(!fp.about_equals(9.0, 10.0, 10.0));
    }

    #[test]
    fn test_combine_estimate() {
        let fp = FinderPattern::new(10.0, 20.0, 4.0).combine_estimate(12.0, 22.0, 6.0);
        assert_eq!(fp, FinderPattern { x: 11.0, y: 21.0, module_size: 5.0, count: 2 });
        let fp = fp.combine_estimate(14.0, 24.0, 8.0);
        assert_eq!(fp.count, 3);
        assert!((fp.x - 12.0).abs() < 1e-9);
        assert!((fp.module_size - 6.0).abs() < 1e-9);
    }
}

// Run counter
//------------------------------------------------------------------------------

// Run lengths of the current black-white-black-white-black window along a row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RunCounter {
    counts: [usize; 5],
    state: usize,
}

impl RunCounter {
    fn reset(&mut self) {
        self.counts = [0; 5];
        self.state = 0;
    }

    // Drops the first black-white pair; the current white pixel starts run 3
    fn shift_by_two(&mut self) {
        self.counts = [self.counts[2], self.counts[3], self.counts[4], 1, 0];
        self.state = 3;
    }
}

/// Whether five run lengths are in 1:1:3:1:1 ratio, each within half a module. Works in
/// 8 bit fixed point.
pub fn found_pattern_cross(counts: &[usize; 5]) -> bool {
    if counts.iter().any(|&c| c == 0) {
        return false;
    }
    let total: usize = counts.iter().sum();
    if total < 7 {
        return false;
    }
    let module = ((total << 8) / 7) as i64;
    let max_var = module / 2;
    let within = |c: usize, mul: i64| (mul * module - ((c as i64) << 8)).abs() < mul * max_var;

    within(counts[0], 1)
        && within(counts[1], 1)
        && within(counts[2], 3)
        && within(counts[3], 1)
        && within(counts[4], 1)
}

// Centre of the pattern whose last run ends just before `end`
fn center_from_end(counts: &[usize; 5], end: usize) -> f64 {
    (end - counts[4] - counts[3]) as f64 - counts[2] as f64 / 2.0
}


// Finder pattern finder
//------------------------------------------------------------------------------

/// Scans a binarized image for the three finder patterns of a QR symbol.
pub struct FinderPatternFinder<'a> {
    image: &'a BitMatrix,
    possible_centers: Vec<FinderPattern>,
    has_skipped: bool,
}

impl<'a> FinderPatternFinder<'a> {
    pub fn new(image: &'a BitMatrix) -> Self {
        Self { image, possible_centers: Vec::new(), has_skipped: false }
    }

    pub fn possible_centers(&self) -> &[FinderPattern] {
        &self.possible_centers
    }

    pub fn find(&mut self, try_harder: bool) -> ScanResult<FinderPatternInfo> {
        let max_i = self.image.height();
        let max_j = self.image.width();

        // Smallest symbol spans 3/4 of the image height at most MAX_MODULES modules
        let mut i_skip = (3 * max_i) / (4 * MAX_MODULES);
        if i_skip < MIN_SKIP || try_harder {
            i_skip = MIN_SKIP;
        }

        let mut done = false;
        let mut run = RunCounter::default();
        let mut i = i_skip - 1;
        while i < max_i && !done {
            run.reset();
            let mut j = 0;
            while j < max_j {
                if self.image.get(j, i) {
                    if run.state & 1 == 1 {
                        run.state += 1;
                    }
                    run.counts[run.state] += 1;
                } else if run.state & 1 == 1 {
                    run.counts[run.state] += 1;
                } else if run.state < 4 {
                    run.state += 1;
                    run.counts[run.state] += 1;
                } else if !found_pattern_cross(&run.counts) {
                    run.shift_by_two();
                } else if self.handle_possible_center(&run.counts, i, j) {
                    i_skip = 2;
                    if self.has_skipped {
                        done = self.have_multiply_confirmed_centers();
                    } else {
                        let row_skip = self.find_row_skip();
                        if row_skip > run.counts[2] as i64 {
                            // Jump to just above the third pattern's expected row
                            let jump = row_skip - run.counts[2] as i64 - i_skip as i64;
                            i = (i as i64 + jump).max(0) as usize;
                            j = max_j;
                        }
                    }
                    run.reset();
                } else {
                    run.shift_by_two();
                }
                j += 1;
            }

            if found_pattern_cross(&run.counts) && self.handle_possible_center(&run.counts, i, max_j)
            {
                i_skip = run.counts[0];
                if self.has_skipped {
                    done = self.have_multiply_confirmed_centers();
                }
            }
            i += i_skip.max(1);
        }

        debug!("Finder scan registered {} candidates", self.possible_centers.len());
        let best = self.select_best_patterns()?;
        Ok(order_best_patterns(best))
    }

    // Cross checks a horizontal hit vertically then horizontally again and registers it
    fn handle_possible_center(&mut self, counts: &[usize; 5], i: usize, j: usize) -> bool {
        let total = counts.iter().sum::<usize>();
        let center_j = center_from_end(counts, j);
        let Some(center_i) = self.cross_check_vertical(i, center_j as usize, counts[2], total)
        else {
            return false;
        };
        let Some(center_j) =
            self.cross_check_horizontal(center_j as usize, center_i as usize, counts[2], total)
        else {
            return false;
        };

        let module_size = total as f64 / 7.0;
        match self.possible_centers.iter_mut().find(|c| c.about_equals(module_size, center_j, center_i))
        {
            Some(c) => *c = c.combine_estimate(center_j, center_i, module_size),
            None => {
                trace!("Finder candidate at ({center_j:.1}, {center_i:.1}), module {module_size:.2}");
                self.possible_centers.push(FinderPattern::new(center_j, center_i, module_size));
            }
        }
        true
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
        let mut counts = [0usize; 5];

        let mut i = start_i as i64;
        while i >= 0 && img.get(center_j, i as usize) {
            counts[2] += 1;
            i -= 1;
        }
        if i < 0 {
            return None;
        }
        while i >= 0 && !img.get(center_j, i as usize) && counts[1] <= max_count {
            counts[1] += 1;
            i -= 1;
        }
        if i < 0 || counts[1] > max_count {
            return None;
        }
        while i >= 0 && img.get(center_j, i as usize) && counts[0] <= max_count {
            counts[0] += 1;
            i -= 1;
        }
        if counts[0] > max_count {
            return None;
        }

        let mut i = start_i as i64 + 1;
        while i < max_i && img.get(center_j, i as usize) {
            counts[2] += 1;
            i += 1;
        }
        if i == max_i {
            return None;
        }
        while i < max_i && !img.get(center_j, i as usize) && counts[3] < max_count {
            counts[3] += 1;
            i += 1;
        }
        if i == max_i || counts[3] >= max_count {
            return None;
        }
        while i < max_i && img.get(center_j, i as usize) && counts[4] < max_count {
            counts[4] += 1;
            i += 1;
        }
        if counts[4] >= max_count {
            return None;
        }

        let total: usize = counts.iter().sum();
        if 5 * total.abs_diff(orig_total) >= 2 * orig_total {
            return None;
        }
        found_pattern_cross(&counts).then(|| center_from_end(&counts, i as usize))
    }

    fn cross_check_horizontal(
        &self,
        start_j: usize,
        center_i: usize,
        max_count: usize,
        orig_total: usize,
    ) -> Option<f64> {
        let img = self.image;
        let max_j = img.width() as i64;
        let mut counts = [0usize; 5];

        let mut j = start_j as i64;
        while j >= 0 && img.get(j as usize, center_i) {
            counts[2] += 1;
            j -= 1;
        }
        if j < 0 {
            return None;
        }
        while j >= 0 && !img.get(j as usize, center_i) && counts[1] <= max_count {
            counts[1] += 1;
            j -= 1;
        }
        if j < 0 || counts[1] > max_count {
            return None;
        }
        while j >= 0 && img.get(j as usize, center_i) && counts[0] <= max_count {
            counts[0] += 1;
            j -= 1;
        }
        if counts[0] > max_count {
            return None;
        }

        let mut j = start_j as i64 + 1;
        while j < max_j && img.get(j as usize, center_i) {
            counts[2] += 1;
            j += 1;
        }
        if j == max_j {
            return None;
        }
        while j < max_j && !img.get(j as usize, center_i) && counts[3] < max_count {
            counts[3] += 1;
            j += 1;
        }
        if j == max_j || counts[3] >= max_count {
            return None;
        }
        while j < max_j && img.get(j as usize, center_i) && counts[4] < max_count {
            counts[4] += 1;
            j += 1;
        }
        if counts[4] >= max_count {
            return None;
        }

        // Horizontal runs must agree more tightly with the row that found them
        let total: usize = counts.iter().sum();
        if 5 * total.abs_diff(orig_total) >= orig_total {
            return None;
        }
        found_pattern_cross(&counts).then(|| center_from_end(&counts, j as usize))
    }

    // Distance to skip once two confirmed centres suggest where the third one lies
    fn find_row_skip(&mut self) -> i64 {
        if self.possible_centers.len() <= 1 {
            return 0;
        }
        let mut confirmed = self.possible_centers.iter().filter(|c| c.count >= CENTER_QUORUM);
        let (Some(first), Some(second)) = (confirmed.next(), confirmed.next()) else {
            return 0;
        };
        self.has_skipped = true;
        (((first.x - second.x).abs() - (first.y - second.y).abs()) / 2.0) as i64
    }

    fn have_multiply_confirmed_centers(&self) -> bool {
        let confirmed: Vec<_> =
            self.possible_centers.iter().filter(|c| c.count >= CENTER_QUORUM).collect();
        if confirmed.len() < 3 {
            return false;
        }
        let total: f64 = confirmed.iter().map(|c| c.module_size).sum();
        let average = total / self.possible_centers.len() as f64;
        let deviation: f64 =
            self.possible_centers.iter().map(|c| (c.module_size - average).abs()).sum();
        deviation <= 0.05 * total
    }

    // Keeps the three candidates most consistent in module size
    fn select_best_patterns(&self) -> ScanResult<[FinderPattern; 3]> {
        let mut centers: Vec<FinderPattern> =
            self.possible_centers.iter().filter(|c| c.count >= CENTER_QUORUM).copied().collect();
        if centers.len() < 3 {
            debug!("Only {} finder candidates reached quorum", centers.len());
            return Err(ScanError::NotFound);
        }

        if centers.len() > 3 {
            let n = centers.len() as f64;
            let total: f64 = centers.iter().map(|c| c.module_size).sum();
            let square: f64 = centers.iter().map(|c| c.module_size * c.module_size).sum();
            let average = total / n;
            let std_dev = (square / n - average * average).max(0.0).sqrt();
            let limit = (0.2 * average).max(std_dev);

            centers.sort_by(|a, b| {
                let da = (a.module_size - average).abs();
                let db = (b.module_size - average).abs();
                db.total_cmp(&da)
            });
            let mut k = 0;
            while k < centers.len() && centers.len() > 3 {
                if (centers[k].module_size - average).abs() > limit {
                    centers.remove(k);
                } else {
                    k += 1;
                }
            }
        }

        if centers.len() > 3 {
            let average = centers.iter().map(|c| c.module_size).sum::<f64>() / centers.len() as f64;
            centers.sort_by(|a, b| {
                b.count.cmp(&a.count).then_with(|| {
                    let da = (a.module_size - average).abs();
                    let db = (b.module_size - average).abs();
                    da.total_cmp(&db)
                })
            });
            centers.truncate(3);
        }

        Ok([centers[0], centers[1], centers[2]])
    }
}

/// Orders three patterns as (bottom left, top left, top right). The top left pattern is
/// opposite the longest side; the sign of the cross product fixes the other two.
pub fn order_best_patterns(patterns: [FinderPattern; 3]) -> FinderPatternInfo {
    let [p0, p1, p2] = patterns;
    let d01 = p0.point().distance(&p1.point());
    let d12 = p1.point().distance(&p2.point());
    let d02 = p0.point().distance(&p2.point());

    let (mut a, b, mut c) = if d12 >= d01 && d12 >= d02 {
        (p1, p0, p2)
    } else if d02 >= d12 && d02 >= d01 {
        (p0, p1, p2)
    } else {
        (p0, p2, p1)
    };

    // Bottom left comes first when turning around the top left corner
    if Point::cross_product_z(&a.point(), &b.point(), &c.point()) < 0.0 {
        std::mem::swap(&mut a, &mut c);
    }

    FinderPatternInfo { bottom_left: a, top_left: b, top_right: c }
}
