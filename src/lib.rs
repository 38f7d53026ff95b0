//! # optiscan
//!
//! A Rust library for locating, sampling and decoding optical codes in greyscale images,
//! and for generating QR codes with Reed-Solomon error correction.
//!
//! ## Features
//!
//! - **QR Code Generation**: Pick the smallest version that fits, interleave Reed-Solomon
//!   blocks, place modules and choose the mask with the lowest penalty
//! - **QR Code Reading**: Binarize, find the three finder patterns, sample through a
//!   perspective transform, correct errors and parse the bit stream
//! - **PDF417 Decoding**: Modulus 929 error correction with erasures, text, byte and
//!   numeric compaction, macro blocks and bounded trial decoding of ambiguous codewords
//! - **Binarization**: Global histogram and local block thresholding strategies
//!
//! ## Quick Start
//!
//! ### Generating a QR Code
//!
//! ```rust
//! use optiscan::QRBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Version and mask are chosen automatically, error correction defaults to M
//! let qr = QRBuilder::new("Hello, World!").build()?;
//!
//! let img = qr.to_image(4); // 4 pixels per module
//! assert_eq!(img.width(), (qr.width() as u32 + 8) * 4);
//! # Ok(())
//! # }
//! ```
//!
//! ### Full Configuration
//!
//! ```rust
//! use optiscan::{ECLevel, MaskPattern, QRBuilder, Version};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let qr = QRBuilder::new("Hello, World!")
//!     .version(Version::new(2)?)      // Fails with DataTooLong if the data doesn't fit
//!     .ec_level(ECLevel::Q)
//!     .mask(MaskPattern::new(3)?)     // Skips the penalty based mask selection
//!     .build()?;
//!
//! println!("{}", qr.metadata());
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading a QR Code
//!
//! ```rust
//! use optiscan::{DecodeOptions, QRBuilder, QRReader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = QRBuilder::new("Round trip").build()?.to_image(4);
//!
//! // Any LuminanceSource works, image::GrayImage and image::RgbImage included
//! let mut reader = QRReader::new();
//! let res = reader.decode(&img, DecodeOptions::new().try_harder(true))?;
//! assert_eq!(res.text, "Round trip");
//! # Ok(())
//! # }
//! ```
//!
//! ### Decoding PDF417 Codewords
//!
//! ```rust
//! use optiscan::pdf417;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Length descriptor, then text compaction pairs for "PDF417"
//! let mut codewords = vec![5, 453, 178, 121, 239];
//! pdf417::add_error_correction(&mut codewords, 2)?;
//! codewords[2] = 0;
//!
//! let res = pdf417::decode_codewords(&mut codewords, 2, &[])?;
//! assert_eq!(res.text, "PDF417");
//! assert_eq!(res.errors_corrected, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Correction Levels
//! - **L (Low)**: ~7% error correction
//! - **M (Medium)**: ~15% error correction
//! - **Q (Quartile)**: ~25% error correction
//! - **H (High)**: ~30% error correction

#![allow(
    clippy::items_after_test_module,
    clippy::suspicious_arithmetic_impl,
    clippy::suspicious_op_assign_impl
)]

pub mod builder;
pub(crate) mod common;
pub mod pdf417;
pub mod reader;

pub use builder::{QRBuilder, QRCode, QUIET_ZONE};
pub use common::binarize::{Binarizer, BinarizerScratch, HistogramBinarizer, HybridBinarizer};
pub use common::bit_array::BitArray;
pub use common::bit_matrix::BitMatrix;
pub use common::byte_matrix::ByteMatrix;
pub use common::charset::Charset;
pub use common::codec::Mode;
pub use common::error::{ErrorKind, ScanError, ScanResult};
pub use common::geometry::{PerspectiveTransform, Point};
pub use common::luminance::{LuminanceSource, PlanarLuminance};
pub use common::mask::MaskPattern;
pub use common::metadata::{ECLevel, Version};
pub use common::result::{DecoderResult, StructuredAppend};
pub use common::sampler::{DefaultGridSampler, GridSampler};
pub use reader::{DecodeOptions, QRReader};
