//! Bit-level reader for entropy-coded data.
//!
//! Provides MSB-first bit reading with transparent removal of the `0x00`
//! escape byte written after every `0xFF`.

use crate::error::{Error, Result};

/// Bit reader for MSB-first streams produced by [`crate::bits::BitWriter`].
///
/// When a `0xFF` byte has been fully consumed and the next byte is `0x00`,
/// the `0x00` is skipped before any further bits are read.
#[derive(Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_pos: u8, // 0-7, next bit of data[pos] counted from the MSB
}

impl<'a> BitReader<'a> {
    /// Create a new MSB-first bit reader.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_pos: 0,
        }
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        let byte = *self.data.get(self.pos).ok_or(Error::EndOfStream)?;
        let bit = (byte >> (7 - self.bit_pos)) & 1;

        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.pos += 1;
            if byte == 0xFF && self.data.get(self.pos) == Some(&0x00) {
                self.pos += 1;
            }
        }
        Ok(bit == 1)
    }

    /// Read `count` bits MSB-first. `count` must be in `1..=32`.
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        if count == 0 || count > 32 {
            return Err(Error::InvalidBitCount(count));
        }
        let mut value = 0u32;
        for _ in 0..count {
            value = (value << 1) | self.read_bit()? as u32;
        }
        Ok(value)
    }

    /// Check if we've consumed every byte.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Current position in bits from the start of the (escaped) buffer.
    pub fn position(&self) -> usize {
        self.pos * 8 + self.bit_pos as usize
    }

    /// Rewind to the start of the stream.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.bit_pos = 0;
    }
}
