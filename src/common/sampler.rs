use super::bit_matrix::BitMatrix;
use super::error::{ScanError, ScanResult};
use super::geometry::{PerspectiveTransform, Point};

// Grid sampler
//------------------------------------------------------------------------------

/// Reads a module grid out of a binarized image through a perspective transform.
pub trait GridSampler {
    /// Samples `dim_x * dim_y` modules; module (x, y) is read at the image pixel that
    /// `transform` maps `(x + 0.5, y + 0.5)` onto.
    fn sample_grid(
        &self,
        image: &BitMatrix,
        dim_x: usize,
        dim_y: usize,
        transform: &PerspectiveTransform,
    ) -> ScanResult<BitMatrix>;

    /// Samples with the transform taking the grid quad `dst` onto the image quad `src`.
    fn sample_grid_quads(
        &self,
        image: &BitMatrix,
        dim_x: usize,
        dim_y: usize,
        dst: [Point; 4],
        src: [Point; 4],
    ) -> ScanResult<BitMatrix> {
        let transform = PerspectiveTransform::quad_to_quad(dst, src);
        self.sample_grid(image, dim_x, dim_y, &transform)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGridSampler;

impl GridSampler for DefaultGridSampler {
    fn sample_grid(
        &self,
        image: &BitMatrix,
        dim_x: usize,
        dim_y: usize,
        transform: &PerspectiveTransform,
    ) -> ScanResult<BitMatrix> {
        if dim_x == 0 || dim_y == 0 {
            return Err(ScanError::NotFound);
        }
        let mut bits = BitMatrix::new(dim_x, dim_y)?;
        let mut points = vec![0.0; 2 * dim_x];
        let (w, h) = (image.width() as i64, image.height() as i64);

        for y in 0..dim_y {
            let yv = y as f64 + 0.5;
            for (x, p) in points.chunks_exact_mut(2).enumerate() {
                p[0] = x as f64 + 0.5;
                p[1] = yv;
            }
            transform.transform_points(&mut points);

            // Only the ends are nudged; anything in between still has to land on the image
            check_and_nudge_points(image, &mut points)?;
            for (x, p) in points.chunks_exact(2).enumerate() {
                let (px, py) = (p[0] as i64, p[1] as i64);
                if px < 0 || py < 0 || px >= w || py >= h {
                    return Err(ScanError::NotFound);
                }
                if image.get(px as usize, py as usize) {
                    bits.set(x, y);
                }
            }
        }
        Ok(bits)
    }
}

/// Moves points lying exactly one pixel outside the image back onto its edge, working
/// inwards from both ends of `points` until one needs no nudge. Points further out fail.
pub fn check_and_nudge_points(image: &BitMatrix, points: &mut [f64]) -> ScanResult<()> {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let n = points.len() / 2;

    let mut nudge = |i: usize| -> ScanResult<bool> {
        let (x, y) = (points[2 * i] as i64, points[2 * i + 1] as i64);
        if points[2 * i].is_nan() || points[2 * i + 1].is_nan() {
            return Err(ScanError::NotFound);
        }
        if x < -1 || x > w || y < -1 || y > h {
            return Err(ScanError::NotFound);
        }
        let mut nudged = false;
        if x == -1 {
            points[2 * i] = 0.0;
            nudged = true;
        } else if x == w {
            points[2 * i] = (w - 1) as f64;
            nudged = true;
        }
        if y == -1 {
            points[2 * i + 1] = 0.0;
            nudged = true;
        } else if y == h {
            points[2 * i + 1] = (h - 1) as f64;
            nudged = true;
        }
        Ok(nudged)
    };

    for i in 0..n {
        if !nudge(i)? {
            break;
        }
    }
    for i in (0..n).rev() {
        if !nudge(i)? {
            break;
        }
    }
    Ok(())
}
