mod block;
mod decoder;
mod galois;

pub use block::{ecc_per_block, Block};
pub use decoder::rectify_info;
pub use galois::G;

pub const MAX_BLOCK_SIZE: usize = 256;

pub const MAX_EC_SIZE: usize = 64;
