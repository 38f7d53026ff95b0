pub mod decoder;
pub mod encoder;
pub mod types;

pub use decoder::decode;
pub use encoder::{choose_mode, encode, EncodedData};
pub use types::*;

// Codec proptesting
//------------------------------------------------------------------------------
