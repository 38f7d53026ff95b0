use std::fmt::{Display, Formatter};

use super::error::{ScanError, ScanResult};

// Bit array
//------------------------------------------------------------------------------

/// Growable sequence of bits packed into 32 bit words, least significant bit first within
/// each word. Only the first `size` bits are meaningful.
#[derive(Debug, Clone, Default)]
pub struct BitArray {
    bits: Vec<u32>,
    size: usize,
}

#[inline]
fn word_count(size: usize) -> usize {
    size.div_ceil(32)
}

impl BitArray {
    pub fn new(size: usize) -> Self {
        Self { bits: vec![0; word_count(size)], size }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { bits: Vec::with_capacity(word_count(capacity)), size: 0 }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn size_in_bytes(&self) -> usize {
        self.size.div_ceil(8)
    }

    pub fn words(&self) -> &[u32] {
        &self.bits
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u32] {
        &mut self.bits
    }

    fn ensure_capacity(&mut self, size: usize) {
        let words = word_count(size);
        if words > self.bits.len() {
            self.bits.resize(words, 0);
        }
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        self.bits[i >> 5] & (1 << (i & 0x1f)) != 0
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        self.bits[i >> 5] |= 1 << (i & 0x1f);
    }

    #[inline]
    pub fn unset(&mut self, i: usize) {
        self.bits[i >> 5] &= !(1 << (i & 0x1f));
    }

    #[inline]
    pub fn flip(&mut self, i: usize) {
        self.bits[i >> 5] ^= 1 << (i & 0x1f);
    }

    /// Overwrites the whole word holding bit `i` with `new_bits`.
    pub fn set_bulk(&mut self, i: usize, new_bits: u32) {
        self.bits[i >> 5] = new_bits;
    }

    // Ones from bit `first` to bit `last` of a word, inclusive
    #[inline]
    fn range_mask(first: usize, last: usize) -> u32 {
        let hi = if last == 31 { u32::MAX } else { (2u32 << last) - 1 };
        hi & !((1u32 << first) - 1)
    }

    fn check_range(&self, start: usize, end: usize) -> ScanResult<()> {
        if end < start || end > self.size {
            return Err(ScanError::InvalidArgument);
        }
        Ok(())
    }

    /// Sets bits in `start..end`.
    pub fn set_range(&mut self, start: usize, end: usize) -> ScanResult<()> {
        self.check_range(start, end)?;
        if start == end {
            return Ok(());
        }

        let last = end - 1;
        let (first_word, last_word) = (start >> 5, last >> 5);
        for i in first_word..=last_word {
            let first_bit = if i > first_word { 0 } else { start & 0x1f };
            let last_bit = if i < last_word { 31 } else { last & 0x1f };
            self.bits[i] |= Self::range_mask(first_bit, last_bit);
        }
        Ok(())
    }

    /// Checks whether every bit in `start..end` equals `value`. An empty range matches.
    pub fn is_range(&self, start: usize, end: usize, value: bool) -> ScanResult<bool> {
        self.check_range(start, end)?;
        if start == end {
            return Ok(true);
        }

        let last = end - 1;
        let (first_word, last_word) = (start >> 5, last >> 5);
        for i in first_word..=last_word {
            let first_bit = if i > first_word { 0 } else { start & 0x1f };
            let last_bit = if i < last_word { 31 } else { last & 0x1f };
            let mask = Self::range_mask(first_bit, last_bit);
            if self.bits[i] & mask != if value { mask } else { 0 } {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn clear(&mut self) {
        self.bits.fill(0);
    }

    /// Index of the first set bit at or after `from`, or `size` if there is none.
    pub fn next_set(&self, from: usize) -> usize {
        self.next_matching(from, false)
    }

    /// Index of the first unset bit at or after `from`, or `size` if there is none.
    pub fn next_unset(&self, from: usize) -> usize {
        self.next_matching(from, true)
    }

    fn next_matching(&self, from: usize, invert: bool) -> usize {
        if from >= self.size {
            return self.size;
        }
        let load = |i: usize| if invert { !self.bits[i] } else { self.bits[i] };

        let mut offset = from >> 5;
        let mut cur = load(offset) & !((1u32 << (from & 0x1f)) - 1);
        while cur == 0 {
            offset += 1;
            if offset == word_count(self.size) {
                return self.size;
            }
            cur = load(offset);
        }
        let res = (offset << 5) + cur.trailing_zeros() as usize;
        res.min(self.size)
    }

    pub fn append_bit(&mut self, bit: bool) {
        self.ensure_capacity(self.size + 1);
        if bit {
            self.bits[self.size >> 5] |= 1 << (self.size & 0x1f);
        }
        self.size += 1;
    }

    /// Appends the `num_bits` least significant bits of `value`, most significant first.
    pub fn append_bits(&mut self, value: u32, num_bits: usize) -> ScanResult<()> {
        if num_bits > 32 {
            return Err(ScanError::InvalidArgument);
        }
        self.ensure_capacity(self.size + num_bits);
        for left in (0..num_bits).rev() {
            self.append_bit((value >> left) & 1 == 1);
        }
        Ok(())
    }

    pub fn append_bit_array(&mut self, other: &BitArray) {
        self.ensure_capacity(self.size + other.size);
        for i in 0..other.size {
            self.append_bit(other.get(i));
        }
    }

    /// Reads `num_bits` bits starting at `offset` back into an integer, first bit most
    /// significant.
    pub fn read_bits(&self, offset: usize, num_bits: usize) -> ScanResult<u32> {
        if num_bits > 32 || offset + num_bits > self.size {
            return Err(ScanError::InvalidArgument);
        }
        Ok((offset..offset + num_bits).fold(0, |acc, i| (acc << 1) | self.get(i) as u32))
    }

    pub fn xor(&mut self, other: &BitArray) -> ScanResult<()> {
        if self.size != other.size {
            return Err(ScanError::SizeMismatch);
        }
        // Padding bits of the last word are 0 on both sides
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a ^= b;
        }
        Ok(())
    }

    /// Packs `num_bytes` bytes starting at `bit_offset` into `out[offset..]`, first bit
    /// most significant.
    pub fn to_bytes(&self, mut bit_offset: usize, out: &mut [u8], offset: usize, num_bytes: usize) {
        for byte in out[offset..offset + num_bytes].iter_mut() {
            let mut b = 0u8;
            for j in 0..8 {
                if self.get(bit_offset) {
                    b |= 1 << (7 - j);
                }
                bit_offset += 1;
            }
            *byte = b;
        }
    }

    pub fn reverse(&mut self) {
        if self.size == 0 {
            return;
        }

        let len = (self.size - 1) >> 5;
        let old_len = len + 1;
        let mut new_bits = vec![0u32; self.bits.len()];
        for i in 0..old_len {
            new_bits[len - i] = self.bits[i].reverse_bits();
        }

        // Shift down when size isn't a multiple of 32
        if self.size != old_len << 5 {
            let left = (old_len << 5) - self.size;
            let mut cur = new_bits[0] >> left;
            for i in 1..old_len {
                let next = new_bits[i];
                cur |= next << (32 - left);
                new_bits[i - 1] = cur;
                cur = next >> left;
            }
            new_bits[old_len - 1] = cur;
        }
        self.bits = new_bits;
    }
}

impl PartialEq for BitArray {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && (0..self.size).all(|i| self.get(i) == other.get(i))
    }
}

impl Eq for BitArray {}

impl Display for BitArray {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.size {
            if i & 7 == 0 {
                f.write_str(" ")?;
            }
            f.write_str(if self.get(i) { "X" } else { "." })?;
        }
        Ok(())
    }
}
