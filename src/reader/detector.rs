use std::time::Instant;

use log::debug;

use super::alignment::{AlignmentPattern, AlignmentPatternFinder};
use super::finder::{FinderPatternFinder, FinderPatternInfo};
use crate::common::bit_matrix::BitMatrix;
use crate::common::error::{ScanError, ScanResult};
use crate::common::geometry::{PerspectiveTransform, Point};
use crate::common::metadata::Version;
use crate::common::sampler::GridSampler;

// Detector result
//------------------------------------------------------------------------------

/// Sampled module grid together with the image points it was located from: bottom left,
/// top left and top right finder centres, then the alignment centre when one was found.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorResult {
    pub bits: BitMatrix,
    pub points: Vec<Point>,
}

// Detector
//------------------------------------------------------------------------------

/// Locates a QR symbol in a binarized image and samples its module grid.
pub struct Detector<'a> {
    image: &'a BitMatrix,
    sampler: &'a dyn GridSampler,
}

impl<'a> Detector<'a> {
    pub fn new(image: &'a BitMatrix, sampler: &'a dyn GridSampler) -> Self {
        Self { image, sampler }
    }

    /// Runs the finder pattern scan and samples the symbol it outlines. A passed
    /// `deadline` is checked once the finder scan is over, before any sampling.
    pub fn detect(&self, try_harder: bool, deadline: Option<Instant>) -> ScanResult<DetectorResult> {
        let info = FinderPatternFinder::new(self.image).find(try_harder)?;
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("Deadline passed after finder scan");
            return Err(ScanError::Deadline);
        }
        self.process_finder_pattern_info(&info)
    }

    pub fn process_finder_pattern_info(&self, info: &FinderPatternInfo) -> ScanResult<DetectorResult> {
        let tl = info.top_left.point();
        let tr = info.top_right.point();
        let bl = info.bottom_left.point();

        let module_size = self.calculate_module_size(&tl, &tr, &bl);
        if module_size.is_nan() || module_size < 1.0 {
            debug!("Module size estimate too small: {module_size}");
            return Err(ScanError::NotFound);
        }

        let dimension = compute_dimension(&tl, &tr, &bl, module_size)?;
        let provisional = Version::from_dimension(dimension).map_err(|_| ScanError::NotFound)?;
        debug!("Estimated dimension {dimension}, module size {module_size:.2}");

        let mut alignment = None;
        if !provisional.alignment_pattern().is_empty() {
            let modules_between = (provisional.width() - 7) as f64;
            let br = Point::new(tr.x - tl.x + bl.x, tr.y - tl.y + bl.y);

            // Last alignment pattern sits three modules in from the missing corner
            let correction = 1.0 - 3.0 / modules_between;
            let est_x = (tl.x + correction * (br.x - tl.x)) as i64;
            let est_y = (tl.y + correction * (br.y - tl.y)) as i64;

            alignment = [4.0, 8.0, 16.0].into_iter().find_map(|allowance| {
                self.find_alignment_in_region(module_size, est_x, est_y, allowance).ok()
            });
            if alignment.is_none() {
                debug!("No alignment pattern near ({est_x}, {est_y}), sampling without it");
            }
        }

        let transform = create_transform(&tl, &tr, &bl, alignment.as_ref(), dimension);
        let bits = self.sampler.sample_grid(self.image, dimension, dimension, &transform)?;

        let mut points = vec![bl, tl, tr];
        points.extend(alignment.map(|a| a.point()));
        Ok(DetectorResult { bits, points })
    }

    fn calculate_module_size(&self, tl: &Point, tr: &Point, bl: &Point) -> f64 {
        (self.module_size_one_way(tl, tr) + self.module_size_one_way(tl, bl)) / 2.0
    }

    // Finder width measured along the axis between two centres, from both ends
    fn module_size_one_way(&self, pattern: &Point, other: &Point) -> f64 {
        let (px, py) = (pattern.x as i64, pattern.y as i64);
        let (ox, oy) = (other.x as i64, other.y as i64);
        let est1 = self.size_of_bwb_run_both_ways(px, py, ox, oy);
        let est2 = self.size_of_bwb_run_both_ways(ox, oy, px, py);
        match (est1, est2) {
            (None, None) => f64::NAN,
            (Some(e), None) | (None, Some(e)) => e / 7.0,
            // Each run spans 3 black modules plus a white and a black one on either side
            (Some(e1), Some(e2)) => (e1 + e2) / 14.0,
        }
    }

    fn size_of_bwb_run_both_ways(&self, from_x: i64, from_y: i64, to_x: i64, to_y: i64) -> Option<f64> {
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let forward = self.size_of_bwb_run(from_x, from_y, to_x, to_y);

        // Mirror the target through the start, scaled back onto the image
        let mut scale = 1.0;
        let mut other_x = from_x - (to_x - from_x);
        if other_x < 0 {
            scale = from_x as f64 / (from_x - other_x) as f64;
            other_x = 0;
        } else if other_x >= w {
            scale = (w - 1 - from_x) as f64 / (other_x - from_x) as f64;
            other_x = w - 1;
        }
        let mut other_y = (from_y as f64 - (to_y - from_y) as f64 * scale) as i64;

        scale = 1.0;
        if other_y < 0 {
            scale = from_y as f64 / (from_y - other_y) as f64;
            other_y = 0;
        } else if other_y >= h {
            scale = (h - 1 - from_y) as f64 / (other_y - from_y) as f64;
            other_y = h - 1;
        }
        other_x = (from_x as f64 + (other_x - from_x) as f64 * scale) as i64;

        let backward = self.size_of_bwb_run(from_x, from_y, other_x, other_y);
        match (forward, backward) {
            // The start pixel is counted by both runs
            (Some(f), Some(b)) => Some(f + b - 1.0),
            _ => None,
        }
    }

    // Walks from a black pixel towards (to_x, to_y) across black, white and black runs.
    // Returns the distance to the first pixel after them.
    fn size_of_bwb_run(&self, from_x: i64, from_y: i64, to_x: i64, to_y: i64) -> Option<f64> {
        let steep = (to_y - from_y).abs() > (to_x - from_x).abs();
        let (from_x, from_y, to_x, to_y) =
            if steep { (from_y, from_x, to_y, to_x) } else { (from_x, from_y, to_x, to_y) };

        let dx = (to_x - from_x).abs();
        let dy = (to_y - from_y).abs();
        let mut error = -dx / 2;
        let x_step = if from_x < to_x { 1 } else { -1 };
        let y_step = if from_y < to_y { 1 } else { -1 };

        let (w, h) = (self.image.width() as i64, self.image.height() as i64);
        let distance = |x: i64, y: i64| ((x - from_x) as f64).hypot((y - from_y) as f64);

        let mut state = 0;
        let x_limit = to_x + x_step;
        let mut x = from_x;
        let mut y = from_y;
        while x != x_limit {
            let (real_x, real_y) = if steep { (y, x) } else { (x, y) };
            if real_x < 0 || real_y < 0 || real_x >= w || real_y >= h {
                break;
            }

            // States 0 and 2 walk black pixels, state 1 walks white ones
            if (state == 1) == self.image.get(real_x as usize, real_y as usize) {
                if state == 2 {
                    return Some(distance(x, y));
                }
                state += 1;
            }

            error += dy;
            if error > 0 {
                if y == to_y {
                    break;
                }
                y += y_step;
                error -= dx;
            }
            x += x_step;
        }

        // Treat the pixel just past the target as white
        (state == 2).then(|| distance(to_x + x_step, to_y))
    }

    fn find_alignment_in_region(
        &self,
        module_size: f64,
        est_x: i64,
        est_y: i64,
        allowance_factor: f64,
    ) -> ScanResult<AlignmentPattern> {
        let allowance = (allowance_factor * module_size) as i64;
        let (w, h) = (self.image.width() as i64, self.image.height() as i64);

        let left = (est_x - allowance).max(0);
        let right = (est_x + allowance).min(w - 1);
        if ((right - left) as f64) < module_size * 3.0 {
            return Err(ScanError::NotFound);
        }
        let top = (est_y - allowance).max(0);
        let bottom = (est_y + allowance).min(h - 1);
        if ((bottom - top) as f64) < module_size * 3.0 {
            return Err(ScanError::NotFound);
        }

        AlignmentPatternFinder::new(
            self.image,
            left as usize,
            top as usize,
            (right - left) as usize,
            (bottom - top) as usize,
            module_size,
        )
        .find()
    }
}

/// Modules per side from the finder centre distances, snapped to the nearest 4k + 1.
pub fn compute_dimension(tl: &Point, tr: &Point, bl: &Point, module_size: f64) -> ScanResult<usize> {
    let tltr = (tl.distance(tr) / module_size).round() as usize;
    let tlbl = (tl.distance(bl) / module_size).round() as usize;
    let dimension = (tltr + tlbl) / 2 + 7;
    match dimension & 3 {
        0 => Ok(dimension + 1),
        2 => Ok(dimension - 1),
        3 => Err(ScanError::NotFound),
        _ => Ok(dimension),
    }
}

/// Transform taking module coordinates onto image pixels. Finder centres sit 3.5 modules
/// in from their corners; the alignment centre, when known, 6.5 modules in from the
/// bottom right.
pub fn create_transform(
    tl: &Point,
    tr: &Point,
    bl: &Point,
    alignment: Option<&AlignmentPattern>,
    dimension: usize,
) -> PerspectiveTransform {
    let dim_minus_three = dimension as f64 - 3.5;
    let (br, src_br) = match alignment {
        Some(a) => (a.point(), dim_minus_three - 3.0),
        None => (Point::new(tr.x - tl.x + bl.x, tr.y - tl.y + bl.y), dim_minus_three),
    };

    PerspectiveTransform::quad_to_quad(
        [
            Point::new(3.5, 3.5),
            Point::new(dim_minus_three, 3.5),
            Point::new(src_br, src_br),
            Point::new(3.5, dim_minus_three),
        ],
        [*tl, *tr, br, *bl],
    )
}

#[cfg(test)]
mod detector_tests {
    use std::time::{Duration, Instant};

    use test_case::test_case;

    use super::{compute_dimension, Detector};
    use crate::builder::{QRBuilder, QUIET_ZONE};
    use crate::common::{
        bit_matrix::BitMatrix,
        error::ScanError,
        geometry::Point,
        metadata::{ECLevel, Version},
        sampler::DefaultGridSampler,
    };

    // Symbol drawn `scale` pixels per module with the standard quiet zone
    fn render(data: &str, ver: usize, scale: usize) -> (BitMatrix, BitMatrix) {
        let qr = QRBuilder::new(data)
            .version(Version::new(ver).unwrap())
            .ec_level(ECLevel::L)
            .build()
            .unwrap();
        let modules = qr.to_bit_matrix().unwrap();
        let qz = QUIET_ZONE as usize;
        let side = (modules.width() + 2 * qz) * scale;
        let mut img = BitMatrix::square(side).unwrap();
        for y in 0..side {
            for x in 0..side {
                let (mx, my) = (x / scale, y / scale);
                if mx >= qz && my >= qz && mx - qz < modules.width() && my - qz < modules.width() {
                    if modules.get(mx - qz, my - qz) {
                        img.set(x, y);
                    }
                }
            }
        }
        (img, modules)
    }

    #[test_case(1, 4)]
    #[test_case(2, 3)]
    #[test_case(7, 3)]
    fn test_detect_samples_symbol(ver: usize, scale: usize) {
        let (img, modules) = render("DETECTOR TEST 0123456789", ver, scale);
        let sampler = DefaultGridSampler;
        let res = Detector::new(&img, &sampler).detect(false, None).unwrap();
        assert_eq!(res.bits, modules);
        assert_eq!(res.points.len(), if ver > 1 { 4 } else { 3 });

        let offset = (QUIET_ZONE as f64 + 3.5) * scale as f64;
        assert!((res.points[1].x - offset).abs() <= 1.0);
        assert!((res.points[1].y - offset).abs() <= 1.0);
    }

    #[test]
    fn test_deadline_in_past() {
        let (img, _) = render("deadline", 1, 4);
        let sampler = DefaultGridSampler;
        let deadline = Instant::now() - Duration::from_millis(1);
        let res = Detector::new(&img, &sampler).detect(false, Some(deadline));
        assert_eq!(res, Err(ScanError::Deadline));
    }

    #[test_case(84.0, 84.0, 4.0, Ok(29))]
    #[test_case(56.0, 56.0, 4.0, Ok(21))]
    #[test_case(60.0, 56.0, 4.0, Ok(21))]
    #[test_case(60.0, 64.0, 4.0, Ok(21))]
    #[test_case(64.0, 64.0, 4.0, Err(ScanError::NotFound))]
    fn test_compute_dimension(dx: f64, dy: f64, ms: f64, exp: Result<usize, ScanError>) {
        let tl = Point::new(10.0, 10.0);
        let tr = Point::new(10.0 + dx, 10.0);
        let bl = Point::new(10.0, 10.0 + dy);
        assert_eq!(compute_dimension(&tl, &tr, &bl, ms), exp);
    }
}
