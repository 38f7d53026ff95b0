pub mod binarize;
pub mod bit_array;
pub mod bit_matrix;
pub mod bitstream;
pub mod byte_matrix;
pub mod charset;
pub mod codec;
pub mod ec;
pub mod error;
pub mod geometry;
pub mod luminance;
pub mod mask;
pub mod metadata;
pub mod result;
pub mod sampler;

