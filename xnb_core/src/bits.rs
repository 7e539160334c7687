use crate::error::{Result, XnbError};

/// Bit cursor for LZX bitstreams.
///
/// The stream is a sequence of little-endian 16-bit words whose bits are
/// consumed most-significant first. `bit_offset` is the number of bits of the
/// current word already consumed and always stays in `0..16`.
///
/// Peeks past the end of the input yield zero bits so a decoder can look
/// ahead across the final word; [`LzxBitReader::check_bounds`] reports
/// whether anything beyond the input was actually consumed.
#[derive(Debug, Clone)]
pub struct LzxBitReader<'a> {
    data: &'a [u8],
    byte_pos: usize,
    bit_offset: u32,
}

impl<'a> LzxBitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            byte_pos: 0,
            bit_offset: 0,
        }
    }

    /// Byte position of the current word.
    #[inline]
    pub fn byte_position(&self) -> usize {
        self.byte_pos
    }

    #[inline]
    pub fn bit_offset(&self) -> u32 {
        self.bit_offset
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Jump to a byte position and drop any partially consumed word.
    pub fn seek(&mut self, byte_pos: usize) -> Result<()> {
        if byte_pos > self.data.len() {
            return Err(XnbError::OutOfBounds {
                offset: byte_pos,
                requested: 0,
                len: self.data.len(),
            });
        }
        self.byte_pos = byte_pos;
        self.bit_offset = 0;
        Ok(())
    }

    fn word_at(&self, pos: usize) -> u64 {
        let lo = self.data.get(pos).copied().unwrap_or(0);
        let hi = self.data.get(pos + 1).copied().unwrap_or(0);
        u64::from(u16::from_le_bytes([lo, hi]))
    }

    /// Look at the next `count` bits (at most 32) without consuming them.
    pub fn peek_bits(&self, count: u32) -> u32 {
        debug_assert!(count <= 32);
        let window = (self.word_at(self.byte_pos) << 32)
            | (self.word_at(self.byte_pos + 2) << 16)
            | self.word_at(self.byte_pos + 4);
        let mask = (1u64 << count) - 1;
        ((window >> (48 - self.bit_offset - count)) & mask) as u32
    }

    /// Consume `count` bits without looking at them.
    pub fn skip_bits(&mut self, count: u32) {
        let total = self.bit_offset + count;
        self.byte_pos += 2 * (total / 16) as usize;
        self.bit_offset = total % 16;
    }

    /// Read `count` bits (at most 32) as an unsigned integer, MSB first.
    pub fn read_bits(&mut self, count: u32) -> u32 {
        let bits = self.peek_bits(count);
        self.skip_bits(count);
        bits
    }

    /// Advance to the next 16-bit boundary if inside a word.
    pub fn align(&mut self) {
        if self.bit_offset > 0 {
            self.bit_offset = 0;
            self.byte_pos += 2;
        }
    }

    /// Read a raw little-endian i32 at the current (aligned) byte position.
    pub fn read_i32_le(&mut self) -> Result<i32> {
        let bytes = self.read_raw(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read raw bytes at the current byte position, outside the bit framing.
    pub fn read_raw(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self
            .byte_pos
            .checked_add(count)
            .and_then(|end| self.data.get(self.byte_pos..end))
            .ok_or(XnbError::OutOfBounds {
                offset: self.byte_pos,
                requested: count,
                len: self.data.len(),
            })?;
        self.byte_pos += count;
        self.bit_offset = 0;
        Ok(bytes)
    }

    /// Decode one Huffman symbol using a table built by
    /// [`crate::lzx::decode_table`].
    ///
    /// Codes no longer than `table_bits` resolve with a single lookup; longer
    /// codes walk the overflow trie stored after the direct-lookup entries.
    pub fn read_huff_symbol(
        &mut self,
        table: &[u16],
        lengths: &[u8],
        symbols: usize,
        table_bits: u32,
    ) -> Result<usize> {
        let lookup = |i: usize| table.get(i).copied().map(usize::from).ok_or(XnbError::HuffmanTableOverrun);

        let mut i = lookup(self.peek_bits(table_bits) as usize)?;
        if i >= symbols {
            let bits = self.peek_bits(32);
            let mut j = 1u32 << (32 - table_bits);
            loop {
                j >>= 1;
                if j == 0 {
                    return Err(XnbError::HuffmanTableOverrun);
                }
                i <<= 1;
                i |= usize::from(bits & j != 0);
                i = lookup(i)?;
                if i < symbols {
                    break;
                }
            }
        }
        let len = lengths.get(i).copied().ok_or(XnbError::HuffmanTableOverrun)?;
        self.skip_bits(u32::from(len));
        Ok(i)
    }

    /// Fail if decoding consumed bits beyond the end of the input.
    pub fn check_bounds(&self) -> Result<()> {
        let end = if self.bit_offset > 0 { self.byte_pos + 2 } else { self.byte_pos };
        // The final word of an odd-length stream is half padding.
        if end > self.data.len() + 1 {
            return Err(XnbError::OutOfBounds {
                offset: self.byte_pos,
                requested: 2,
                len: self.data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_are_read_msb_first_from_little_endian_words() {
        // Word 0xA5C3 is stored as [0xC3, 0xA5].
        let data = [0xC3, 0xA5, 0x00, 0x80];
        let mut r = LzxBitReader::new(&data);
        assert_eq!(r.read_bits(4), 0xA);
        assert_eq!(r.read_bits(8), 0x5C);
        assert_eq!(r.bit_offset(), 12);
        // Spans into the next word: remaining 0x3 then the top bit of 0x8000.
        assert_eq!(r.read_bits(5), 0b0011_1);
        assert_eq!(r.byte_position(), 2);
        assert_eq!(r.bit_offset(), 1);
    }

    #[test]
    fn peek_does_not_consume() {
        let data = [0x34, 0x12, 0x78, 0x56];
        let r = LzxBitReader::new(&data);
        assert_eq!(r.peek_bits(16), 0x1234);
        assert_eq!(r.peek_bits(32), 0x1234_5678);
        assert_eq!(r.byte_position(), 0);
    }

    #[test]
    fn zero_width_read_is_zero() {
        let data = [0xFF, 0xFF];
        let mut r = LzxBitReader::new(&data);
        assert_eq!(r.read_bits(0), 0);
        assert_eq!(r.bit_offset(), 0);
    }

    #[test]
    fn align_moves_to_next_word_only_when_inside_one() {
        let data = [0u8; 8];
        let mut r = LzxBitReader::new(&data);
        r.align();
        assert_eq!(r.byte_position(), 0);
        r.read_bits(3);
        r.align();
        assert_eq!(r.byte_position(), 2);
        assert_eq!(r.bit_offset(), 0);
    }

    #[test]
    fn peeks_past_the_end_read_zeroes() {
        let data = [0xFF, 0xFF];
        let mut r = LzxBitReader::new(&data);
        assert_eq!(r.peek_bits(32), 0xFFFF_0000);
        r.read_bits(16);
        assert!(r.check_bounds().is_ok());
        r.read_bits(16);
        assert!(r.check_bounds().is_err());
    }

    #[test]
    fn raw_reads_are_bounds_checked() {
        let data = [1u8, 0, 0, 0, 9];
        let mut r = LzxBitReader::new(&data);
        assert_eq!(r.read_i32_le().unwrap(), 1);
        assert!(r.read_i32_le().is_err());
        assert_eq!(r.read_raw(1).unwrap(), &[9]);
    }
}
