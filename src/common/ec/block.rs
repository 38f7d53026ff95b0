use std::iter::repeat;

use super::galois::G;
use super::MAX_BLOCK_SIZE;

// Reed-Solomon block
//------------------------------------------------------------------------------

/// One Reed-Solomon block: `dlen` data codewords followed by `len - dlen` ec codewords.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Block {
    pub(super) data: [u8; MAX_BLOCK_SIZE],
    // Block length
    pub(super) len: usize,
    // Data length
    pub(super) dlen: usize,
}

impl Block {
    /// Builds a block from data codewords, computing ec codewords up to `len`.
    pub fn new(raw: &[u8], len: usize) -> Self {
        debug_assert!(len <= MAX_BLOCK_SIZE, "Block too long: {len}");
        debug_assert!(raw.len() < len, "No room for ecc: Data {}, Block {len}", raw.len());

        let dlen = raw.len();
        let mut data = [0u8; MAX_BLOCK_SIZE];
        data[..dlen].copy_from_slice(raw);
        data[dlen..len].copy_from_slice(&ecc_per_block(raw, len - dlen));
        Self { data, len, dlen }
    }

    /// Wraps codewords read from a symbol.
    pub fn with_encoded(encoded: &[u8], dlen: usize) -> Self {
        let len = encoded.len();
        debug_assert!(len <= MAX_BLOCK_SIZE, "Block too long: {len}");

        let mut data = [0u8; MAX_BLOCK_SIZE];
        data[..len].copy_from_slice(encoded);
        Self { data, len, dlen }
    }

    pub fn ec_len(&self) -> usize {
        self.len - self.dlen
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlen]
    }

    pub fn ecc(&self) -> &[u8] {
        &self.data[self.dlen..self.len]
    }
}

// Generator polynomial (x - a^0)(x - a^1)..(x - a^(n-1)), highest degree first
pub fn generator_polynomial(ecc_count: usize) -> Vec<G> {
    let mut poly = vec![G(1)];
    for i in 0..ecc_count {
        let root = G::gen_pow(i);
        let mut next = vec![G(0); poly.len() + 1];
        for (j, &c) in poly.iter().enumerate() {
            next[j] += c;
            next[j + 1] += c * root;
        }
        poly = next;
    }
    poly
}

/// Remainder of the data polynomial times x^ecc_count divided by the generator
/// polynomial; its coefficients are the ec codewords.
pub fn ecc_per_block(block: &[u8], ecc_count: usize) -> Vec<u8> {
    let len = block.len();
    let gen_poly = generator_polynomial(ecc_count);

    let mut res: Vec<G> =
        block.iter().map(|&b| G(b)).chain(repeat(G(0)).take(ecc_count)).collect();

    for i in 0..len {
        let lead = res[i];
        if lead.is_zero() {
            continue;
        }
        for (u, &v) in res[i + 1..].iter_mut().zip(gen_poly[1..].iter()) {
            *u += lead * v;
        }
    }

    res[len..].iter().map(|&g| g.into()).collect()
}
