// Bit stream
//------------------------------------------------------------------------------

/// Reads big-endian bit fields of arbitrary width off a byte slice.
#[derive(Debug, Clone)]
pub struct BitStream<'a> {
    data: &'a [u8],
    // Bit cursor
    pos: usize,
}

impl<'a> BitStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn available(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    /// Takes the next `size` bits, first bit most significant. `None` when `size` is above
    /// 32 or fewer bits remain.
    pub fn take_bits(&mut self, size: usize) -> Option<u32> {
        if size > 32 || size > self.available() {
            return None;
        }

        let mut res = 0u32;
        let mut left = size;
        while left > 0 {
            let offset = self.pos & 7;
            let byte = self.data[self.pos >> 3] as u32;
            let take = left.min(8 - offset);
            let bits = (byte >> (8 - offset - take)) & ((1 << take) - 1);
            res = (res << take) | bits;
            self.pos += take;
            left -= take;
        }
        Some(res)
    }
}

impl<'a> From<&'a [u8]> for BitStream<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod bit_stream_tests {
    use super::BitStream;

    #[test]
    fn test_take_bits() {
        let data = [0b10011000, 0b00010010, 0b00110100];
        let mut bs = BitStream::new(&data);
        assert_eq!(bs.available(), 24);
        assert_eq!(bs.take_bits(1), Some(1));
        assert_eq!(bs.take_bits(2), Some(0));
        assert_eq!(bs.take_bits(5), Some(0b11000));
        assert_eq!(bs.available(), 16);
        assert_eq!(bs.take_bits(3), Some(0));
        assert_eq!(bs.available(), 13);
        assert_eq!(bs.take_bits(13), Some(0b1001000110100));
        assert_eq!(bs.available(), 0);
        assert_eq!(bs.take_bits(1), None);
    }

    #[test]
    fn test_take_bits_wide() {
        let data = [0xde, 0xad, 0xbe, 0xef, 0x01];
        let mut bs = BitStream::new(&data);
        assert_eq!(bs.take_bits(4), Some(0xd));
        assert_eq!(bs.take_bits(32), Some(0xeadbeef0));
        assert_eq!(bs.take_bits(4), Some(1));
        assert_eq!(bs.take_bits(0), Some(0));
    }

    #[test]
    fn test_take_bits_insufficient() {
        let data = [0xff];
        let mut bs = BitStream::new(&data);
        assert_eq!(bs.take_bits(9), None);
        assert_eq!(bs.take_bits(33), None);
        assert_eq!(bs.take_bits(8), Some(0xff));
    }
}
