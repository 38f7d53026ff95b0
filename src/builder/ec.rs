use std::ops::Deref;

use crate::common::ec::Block;
use crate::common::metadata::{ECLevel, Version};

// Block layout
//------------------------------------------------------------------------------

/// Data and ec codeword counts of block `id`. Short blocks come first and hold one data
/// codeword less than the long ones; every block has the same ec length.
pub fn block_layout(
    total_codewords: usize,
    data_codewords: usize,
    num_blocks: usize,
    id: usize,
) -> (usize, usize) {
    debug_assert!(id < num_blocks, "Block id out of range: {id}");

    let long_count = total_codewords % num_blocks;
    let short_count = num_blocks - long_count;
    let short_total = total_codewords / num_blocks;
    let short_data = data_codewords / num_blocks;
    let short_ec = short_total - short_data;

    debug_assert!(
        short_data * short_count + (short_data + 1) * long_count == data_codewords,
        "Data codewords don't match block layout"
    );

    if id < short_count {
        (short_data, short_ec)
    } else {
        (short_data + 1, short_ec)
    }
}

// ECC: Error Correction Codeword generator
//------------------------------------------------------------------------------

pub fn ecc(data: &[u8], ver: Version, ecl: ECLevel) -> Vec<Block> {
    let ecc_size_per_block = ver.ecc_per_block(ecl);
    blockify(data, ver, ecl)
        .into_iter()
        .map(|b| Block::new(b, b.len() + ecc_size_per_block))
        .collect()
}

pub fn blockify(data: &[u8], ver: Version, ecl: ECLevel) -> Vec<&[u8]> {
    let total = ver.total_codewords();
    let num_blocks = ver.num_blocks(ecl);

    debug_assert!(
        data.len() == ver.data_codewords(ecl),
        "Data len doesn't match total size of blocks: Data len {}, Total block size {}",
        data.len(),
        ver.data_codewords(ecl)
    );

    let mut offset = 0;
    (0..num_blocks)
        .map(|id| {
            let (dlen, _) = block_layout(total, data.len(), num_blocks, id);
            let blk = &data[offset..offset + dlen];
            offset += dlen;
            blk
        })
        .collect()
}

/// Reads blocks column by column, skipping blocks that are already exhausted.
pub fn interleave<T: Copy, V: Deref<Target = [T]>>(blocks: &[V]) -> Vec<T> {
    let max_block_size = blocks.iter().map(|b| b.len()).max().unwrap_or(0);
    let total_size = blocks.iter().map(|b| b.len()).sum::<usize>();
    let mut res = Vec::with_capacity(total_size);
    for i in 0..max_block_size {
        for b in blocks {
            if i < b.len() {
                res.push(b[i]);
            }
        }
    }
    res
}

/// Final codeword sequence: interleaved data codewords followed by interleaved ec
/// codewords.
pub fn interleave_with_ecc(data: &[u8], ver: Version, ecl: ECLevel) -> Vec<u8> {
    let blocks = ecc(data, ver, ecl);
    let data_blocks = blocks.iter().map(Block::data).collect::<Vec<_>>();
    let ecc_blocks = blocks.iter().map(Block::ecc).collect::<Vec<_>>();
    let mut res = interleave(&data_blocks);
    res.extend(interleave(&ecc_blocks));
    debug_assert!(res.len() == ver.total_codewords(), "Interleaved length mismatch: {}", res.len());
    res
}
