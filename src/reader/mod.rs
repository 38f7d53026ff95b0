mod alignment;
mod decoder;
mod detector;
mod finder;
mod parser;

pub use alignment::{AlignmentPattern, AlignmentPatternFinder};
pub use decoder::{decode_bits, deinterleave};
pub use detector::{Detector, DetectorResult};
pub use finder::{found_pattern_cross, FinderPattern, FinderPatternFinder, FinderPatternInfo};
pub use parser::{function_pattern, BitMatrixParser};

use std::time::Instant;

use log::{debug, info};

use crate::common::binarize::{Binarizer, BinarizerScratch, HybridBinarizer};
use crate::common::bit_matrix::BitMatrix;
use crate::common::charset::Charset;
use crate::common::error::{ScanError, ScanResult};
use crate::common::luminance::LuminanceSource;
use crate::common::result::DecoderResult;
use crate::common::sampler::{DefaultGridSampler, GridSampler};

// Decode options
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    try_harder: bool,
    pure_barcode: bool,
    deadline: Option<Instant>,
    character_set: Option<Charset>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans every third row for finder patterns instead of skipping by symbol size.
    pub fn try_harder(&mut self, try_harder: bool) -> &mut Self {
        self.try_harder = try_harder;
        self
    }

    /// The image holds nothing but an upright, unskewed symbol on a light border.
    pub fn pure_barcode(&mut self, pure_barcode: bool) -> &mut Self {
        self.pure_barcode = pure_barcode;
        self
    }

    /// Gives up with [`ScanError::Deadline`] when the finder scan ends after `deadline`.
    pub fn deadline(&mut self, deadline: Instant) -> &mut Self {
        self.deadline = Some(deadline);
        self
    }

    /// Charset for byte segments that carry no ECI designator.
    pub fn character_set(&mut self, charset: Charset) -> &mut Self {
        self.character_set = Some(charset);
        self
    }

    pub fn is_try_harder(&self) -> bool {
        self.try_harder
    }

    pub fn is_pure_barcode(&self) -> bool {
        self.pure_barcode
    }
}

// Reader
//------------------------------------------------------------------------------

/// Image to text pipeline for QR symbols: binarize, locate, sample, correct, decode.
///
/// The binarizer and grid sampler are strategy values; binarizer buffers are kept in the
/// reader and reused across calls.
#[derive(Debug, Clone, Default)]
pub struct QRReader<B: Binarizer = HybridBinarizer, S: GridSampler = DefaultGridSampler> {
    binarizer: B,
    sampler: S,
    scratch: BinarizerScratch,
}

impl QRReader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: Binarizer, S: GridSampler> QRReader<B, S> {
    pub fn with_strategies(binarizer: B, sampler: S) -> Self {
        Self { binarizer, sampler, scratch: BinarizerScratch::new() }
    }

    pub fn decode(
        &mut self,
        source: &dyn LuminanceSource,
        opts: &DecodeOptions,
    ) -> ScanResult<DecoderResult> {
        let image = self.binarizer.black_matrix(source, &mut self.scratch).inspect_err(|e| {
            debug!("Binarization failed: {e}");
        })?;
        self.decode_matrix(&image, opts)
    }

    /// Decodes an already binarized image.
    pub fn decode_matrix(&self, image: &BitMatrix, opts: &DecodeOptions) -> ScanResult<DecoderResult> {
        let bits = if opts.pure_barcode {
            extract_pure_bits(image)?
        } else {
            Detector::new(image, &self.sampler).detect(opts.try_harder, opts.deadline)?.bits
        };
        debug!("Sampled {}x{} modules", bits.width(), bits.height());

        let res = decode_bits(bits, opts.character_set)?;
        info!("QR decoded: {} bytes, {} corrected", res.raw_bytes.len(), res.errors_corrected);
        Ok(res)
    }
}

// Pure barcode
//------------------------------------------------------------------------------

/// Samples a symbol that is upright, unskewed and alone in the image. The module size is
/// measured along the diagonal of the top left finder.
pub fn extract_pure_bits(image: &BitMatrix) -> ScanResult<BitMatrix> {
    let (left, top) = image.top_left_on_bit().ok_or(ScanError::NotFound)?;
    let (mut right, bottom) = image.bottom_right_on_bit().ok_or(ScanError::NotFound)?;
    let module_size = pure_module_size(image, left, top)?;

    if left >= right || top >= bottom {
        return Err(ScanError::NotFound);
    }
    if bottom - top != right - left {
        // Bottom right module is light, so assume a square
        right = left + (bottom - top);
        if right >= image.width() {
            return Err(ScanError::NotFound);
        }
    }

    let matrix_w = ((right - left + 1) as f64 / module_size).round() as usize;
    let matrix_h = ((bottom - top + 1) as f64 / module_size).round() as usize;
    if matrix_w == 0 || matrix_w != matrix_h {
        return Err(ScanError::NotFound);
    }

    // Sample module centres, pulled back in if that runs off the far edge
    let nudge = (module_size / 2.0) as usize;
    let mut left = left + nudge;
    let mut top = top + nudge;
    let too_far_right = (left + ((matrix_w - 1) as f64 * module_size) as usize) as i64 - right as i64;
    if too_far_right > 0 {
        if too_far_right > nudge as i64 {
            return Err(ScanError::NotFound);
        }
        left -= too_far_right as usize;
    }
    let too_far_down = (top + ((matrix_h - 1) as f64 * module_size) as usize) as i64 - bottom as i64;
    if too_far_down > 0 {
        if too_far_down > nudge as i64 {
            return Err(ScanError::NotFound);
        }
        top -= too_far_down as usize;
    }

    let mut bits = BitMatrix::new(matrix_w, matrix_h)?;
    for y in 0..matrix_h {
        let py = top + (y as f64 * module_size) as usize;
        for x in 0..matrix_w {
            if image.get(left + (x as f64 * module_size) as usize, py) {
                bits.set(x, y);
            }
        }
    }
    Ok(bits)
}

// Five transitions along the diagonal cross the outer ring, the inner ring and the stone
fn pure_module_size(image: &BitMatrix, left: usize, top: usize) -> ScanResult<f64> {
    let (w, h) = (image.width(), image.height());
    let (mut x, mut y) = (left, top);
    let mut in_black = true;
    let mut transitions = 0;
    while x < w && y < h {
        if in_black != image.get(x, y) {
            transitions += 1;
            if transitions == 5 {
                break;
            }
            in_black = !in_black;
        }
        x += 1;
        y += 1;
    }
    if x == w || y == h {
        return Err(ScanError::NotFound);
    }
    Ok((x - left) as f64 / 7.0)
}
