use crate::error::{Result, XnbError};

// ── Reader ─────────────────────────────────────────────────────────────────

/// Seekable little-endian cursor over an immutable byte slice.
///
/// Every read is bounds-checked and fails with [`XnbError::OutOfBounds`]
/// instead of panicking; the cursor does not move on a failed read.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// The full underlying buffer, independent of the cursor.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move the cursor to an absolute offset. Seeking to `len()` is allowed.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(XnbError::OutOfBounds {
                offset: pos,
                requested: 0,
                len: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Move the cursor relative to its current position.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        let target = self.pos.checked_add(count).ok_or(XnbError::OutOfBounds {
            offset: self.pos,
            requested: count,
            len: self.data.len(),
        })?;
        self.seek(target)
    }

    /// Borrow `count` bytes at the cursor without consuming them.
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        self.pos
            .checked_add(count)
            .and_then(|end| self.data.get(self.pos..end))
            .ok_or(XnbError::OutOfBounds {
                offset: self.pos,
                requested: count,
                len: self.data.len(),
            })
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.pos += count;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        Ok(self.peek_bytes(1)?[0])
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    /// Big-endian u16, as used by the LZX frame envelope.
    pub fn read_u16_be(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    /// Variable-length unsigned integer: 7 data bits per byte, low group
    /// first, high bit set on every byte but the last.
    pub fn read_7bit(&mut self) -> Result<u32> {
        let start = self.pos;
        let mut result: u32 = 0;
        let mut shift = 0u32;
        loop {
            let byte = match self.read_u8() {
                Ok(byte) => byte,
                Err(e) => {
                    self.pos = start;
                    return Err(e);
                }
            };
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
            if shift >= 35 {
                self.pos = start;
                return Err(XnbError::Malformed("7-bit encoded integer is longer than 5 bytes"));
            }
        }
    }

    /// Fixed-length UTF-8 string.
    pub fn read_string(&mut self, len: usize) -> Result<&'a str> {
        let bytes = self.peek_bytes(len)?;
        let s = std::str::from_utf8(bytes)?;
        self.pos += len;
        Ok(s)
    }

    /// 7-bit length prefix followed by that many UTF-8 bytes.
    pub fn read_prefixed_string(&mut self) -> Result<&'a str> {
        let start = self.pos;
        let len = self.read_7bit()? as usize;
        self.read_string(len).inspect_err(|_| self.pos = start)
    }

    /// NUL-terminated UTF-8 string; the terminator is consumed.
    pub fn read_cstring(&mut self) -> Result<&'a str> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let end = rest.iter().position(|&b| b == 0).ok_or(XnbError::OutOfBounds {
            offset: self.pos,
            requested: rest.len() + 1,
            len: self.data.len(),
        })?;
        let s = std::str::from_utf8(&rest[..end])?;
        self.pos += end + 1;
        Ok(s)
    }
}

// ── Writer ─────────────────────────────────────────────────────────────────

/// Growable little-endian output buffer with a movable write position.
///
/// Writes past the current end extend the buffer; writes before it overwrite
/// in place, which is how placeholder sizes get backpatched.
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
    pos: usize,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            pos: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Move the write position; the gap, if any, is zero-filled on next write.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_f32(&mut self, v: f32) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_f64(&mut self, v: f64) {
        self.write_bytes(&v.to_le_bytes());
    }

    pub fn write_7bit(&mut self, mut v: u32) {
        while v >= 0x80 {
            self.write_u8((v as u8 & 0x7F) | 0x80);
            v >>= 7;
        }
        self.write_u8(v as u8);
    }

    /// 7-bit length prefix followed by the UTF-8 bytes.
    pub fn write_prefixed_string(&mut self, s: &str) -> Result<()> {
        let len = u32::try_from(s.len()).map_err(|_| XnbError::Malformed("string longer than u32::MAX bytes"))?;
        self.write_7bit(len);
        self.write_bytes(s.as_bytes());
        Ok(())
    }

    /// Overwrite a u32 at an absolute offset without moving the position.
    pub fn patch_u32(&mut self, offset: usize, v: u32) -> Result<()> {
        let len = self.buf.len();
        let slot = self
            .buf
            .get_mut(offset..offset + 4)
            .ok_or(XnbError::OutOfBounds {
                offset,
                requested: 4,
                len,
            })?;
        slot.copy_from_slice(&v.to_le_bytes());
        Ok(())
    }

    /// Drop everything after the write position.
    pub fn trim(&mut self) {
        self.buf.truncate(self.pos);
    }

    /// Trim and hand back the written bytes.
    pub fn into_inner(mut self) -> Vec<u8> {
        self.trim();
        self.buf
    }
}
