use log::debug;

use super::bit_array::BitArray;
use super::bit_matrix::BitMatrix;
use super::error::{ScanError, ScanResult};
use super::luminance::LuminanceSource;

// Binarizer
//------------------------------------------------------------------------------

/// Converts luminance into dark (set) and light (unset) bits. Implementations are stateless
/// strategy values; all working memory lives in the caller's [`BinarizerScratch`].
pub trait Binarizer {
    /// Binarizes row `y` into `row`. Suited for scanning a single line.
    fn black_row(
        &self,
        source: &dyn LuminanceSource,
        y: usize,
        row: &mut BitArray,
        scratch: &mut BinarizerScratch,
    ) -> ScanResult<()>;

    /// Binarizes the whole image.
    fn black_matrix(
        &self,
        source: &dyn LuminanceSource,
        scratch: &mut BinarizerScratch,
    ) -> ScanResult<BitMatrix>;
}

const LUMINANCE_BITS: usize = 5;
const LUMINANCE_SHIFT: usize = 8 - LUMINANCE_BITS;
const LUMINANCE_BUCKETS: usize = 1 << LUMINANCE_BITS;

/// Reusable buffers for binarization. Keep one per thread and pass it to every call.
#[derive(Debug, Clone, Default)]
pub struct BinarizerScratch {
    luminances: Vec<u8>,
    buckets: [u32; LUMINANCE_BUCKETS],
    levels: Vec<u32>,
}

impl BinarizerScratch {
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare(&mut self, width: usize) {
        if self.luminances.len() < width {
            self.luminances.resize(width, 0);
        }
        self.buckets.fill(0);
    }
}

// Histogram binarizer
//------------------------------------------------------------------------------

/// Global threshold picked from the valley between the two tallest peaks of a 32 bucket
/// luminance histogram. Cheap, but fooled by uneven lighting.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistogramBinarizer;

impl Binarizer for HistogramBinarizer {
    fn black_row(
        &self,
        source: &dyn LuminanceSource,
        y: usize,
        row: &mut BitArray,
        scratch: &mut BinarizerScratch,
    ) -> ScanResult<()> {
        let width = source.width();
        scratch.prepare(width);
        source.row(y, &mut scratch.luminances);

        let lum = &scratch.luminances[..width];
        for &p in lum {
            scratch.buckets[(p as usize) >> LUMINANCE_SHIFT] += 1;
        }
        let black_point = estimate_black_point(&scratch.buckets)? as i32;

        if row.size() < width {
            *row = BitArray::new(width);
        } else {
            row.clear();
        }

        if width < 3 {
            for (x, &p) in lum.iter().enumerate() {
                if (p as i32) < black_point {
                    row.set(x);
                }
            }
            return Ok(());
        }

        let mut left = lum[0] as i32;
        let mut center = lum[1] as i32;
        for x in 1..width - 1 {
            let right = lum[x + 1] as i32;
            // -1 4 -1 box filter with a weight of 2
            if ((center << 2) - left - right) >> 1 < black_point {
                row.set(x);
            }
            left = center;
            center = right;
        }
        Ok(())
    }

    fn black_matrix(
        &self,
        source: &dyn LuminanceSource,
        scratch: &mut BinarizerScratch,
    ) -> ScanResult<BitMatrix> {
        let (width, height) = (source.width(), source.height());
        let mut matrix = BitMatrix::new(width, height)?;

        // Histogram from four interior rows; the full image is only read once it succeeds
        scratch.prepare(width);
        for k in 1..5 {
            source.row(height * k / 5, &mut scratch.luminances);
            let right = width * 4 / 5;
            for &p in &scratch.luminances[width / 5..right] {
                scratch.buckets[(p as usize) >> LUMINANCE_SHIFT] += 1;
            }
        }
        let black_point = estimate_black_point(&scratch.buckets)? as u8;

        let lum = source.matrix();
        for y in 0..height {
            let off = y * width;
            for (x, &p) in lum[off..off + width].iter().enumerate() {
                if p < black_point {
                    matrix.set(x, y);
                }
            }
        }
        Ok(matrix)
    }
}

/// Picks the luminance threshold from a 32 bucket histogram.
pub fn estimate_black_point(buckets: &[u32; LUMINANCE_BUCKETS]) -> ScanResult<u32> {
    // Tallest peak
    let mut max_count = 0;
    let mut first_peak = 0;
    for (i, &c) in buckets.iter().enumerate() {
        if c > max_count {
            first_peak = i;
            max_count = c;
        }
    }

    // Second peak, favouring buckets far from the first
    let mut second_peak = 0;
    let mut second_score = 0u64;
    for (i, &c) in buckets.iter().enumerate() {
        let dist = i.abs_diff(first_peak) as u64;
        let score = c as u64 * dist * dist;
        if score > second_score {
            second_peak = i;
            second_score = score;
        }
    }

    let (first, second) = if first_peak > second_peak {
        (second_peak, first_peak)
    } else {
        (first_peak, second_peak)
    };

    // A single populated bucket has no second peak at all
    if second_score == 0 || second - first <= LUMINANCE_BUCKETS >> 4 {
        debug!("Contrast too low: Peaks {first} and {second}");
        return Err(ScanError::NotFound);
    }

    // Valley between the peaks, closer to the white one
    let mut best_valley = second - 1;
    let mut best_score = -1i64;
    for i in (first + 1..second).rev() {
        let from_first = (i - first) as i64;
        let score = from_first
            * from_first
            * (second - i) as i64
            * (max_count as i64 - buckets[i] as i64);
        if score > best_score {
            best_valley = i;
            best_score = score;
        }
    }

    Ok((best_valley << LUMINANCE_SHIFT) as u32)
}


// Hybrid binarizer
//------------------------------------------------------------------------------

const BLOCK_SIZE_POWER: usize = 3;
const BLOCK_SIZE: usize = 1 << BLOCK_SIZE_POWER;
const MIN_DIMENSION: usize = BLOCK_SIZE * 5;
const MIN_DYNAMIC_RANGE: u32 = 24;

/// Local threshold per 8x8 block, averaged over the surrounding 5x5 blocks. Copes with
/// shadows and gradients. Rows are binarized by the histogram binarizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HybridBinarizer;

impl Binarizer for HybridBinarizer {
    fn black_row(
        &self,
        source: &dyn LuminanceSource,
        y: usize,
        row: &mut BitArray,
        scratch: &mut BinarizerScratch,
    ) -> ScanResult<()> {
        HistogramBinarizer.black_row(source, y, row, scratch)
    }

    fn black_matrix(
        &self,
        source: &dyn LuminanceSource,
        scratch: &mut BinarizerScratch,
    ) -> ScanResult<BitMatrix> {
        let (width, height) = (source.width(), source.height());
        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return HistogramBinarizer.black_matrix(source, scratch);
        }

        let lum = source.matrix();
        let sub_w = width.div_ceil(BLOCK_SIZE);
        let sub_h = height.div_ceil(BLOCK_SIZE);
        block_levels(&lum, sub_w, sub_h, width, height, &mut scratch.levels);

        let mut matrix = BitMatrix::new(width, height)?;
        threshold_blocks(&lum, sub_w, sub_h, width, height, &scratch.levels, &mut matrix);
        Ok(matrix)
    }
}

// Blocks at the right and bottom edges reuse the last 8 pixels
#[inline]
fn block_offset(i: usize, dim: usize) -> usize {
    let off = i << BLOCK_SIZE_POWER;
    if off + BLOCK_SIZE >= dim {
        dim - BLOCK_SIZE
    } else {
        off
    }
}

fn block_levels(
    lum: &[u8],
    sub_w: usize,
    sub_h: usize,
    width: usize,
    height: usize,
    levels: &mut Vec<u32>,
) {
    levels.clear();
    levels.resize(sub_w * sub_h, 0);

    for by in 0..sub_h {
        let yoff = block_offset(by, height);
        for bx in 0..sub_w {
            let xoff = block_offset(bx, width);
            let (mut sum, mut min, mut max) = (0u32, 255u32, 0u32);
            for yy in 0..BLOCK_SIZE {
                let off = (yoff + yy) * width + xoff;
                for &p in &lum[off..off + BLOCK_SIZE] {
                    let p = p as u32;
                    sum += p;
                    min = min.min(p);
                    max = max.max(p);
                }
            }

            // Low contrast blocks lean towards background without dragging neighbours down
            levels[by * sub_w + bx] = if max - min > MIN_DYNAMIC_RANGE {
                sum >> (2 * BLOCK_SIZE_POWER)
            } else if min > 0 {
                min >> 1
            } else {
                1
            };
        }
    }
}

fn threshold_blocks(
    lum: &[u8],
    sub_w: usize,
    sub_h: usize,
    width: usize,
    height: usize,
    levels: &[u32],
    matrix: &mut BitMatrix,
) {
    for by in 0..sub_h {
        let yoff = block_offset(by, height);
        let top = by.clamp(2, sub_h - 3);
        for bx in 0..sub_w {
            let xoff = block_offset(bx, width);
            let left = bx.clamp(2, sub_w - 3);

            let mut sum = 0;
            for row in levels[(top - 2) * sub_w..(top + 3) * sub_w].chunks_exact(sub_w) {
                sum += row[left - 2..=left + 2].iter().sum::<u32>();
            }
            let threshold = sum / 25;

            for yy in 0..BLOCK_SIZE {
                let off = (yoff + yy) * width + xoff;
                for (xx, &p) in lum[off..off + BLOCK_SIZE].iter().enumerate() {
                    if (p as u32) < threshold {
                        matrix.set(xoff + xx, yoff + yy);
                    }
                }
            }
        }
    }
}
