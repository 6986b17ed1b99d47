//! Bit-level output for the entropy coder.

use crate::error::{Error, Result};

/// A bit writer that packs bits MSB first.
///
/// Bytes are accumulated verbatim while writing. Marker escaping (a `0x00`
/// after every `0xFF`) is applied once, in [`BitWriter::finish`], over the
/// completed buffer. The writer is single-threaded; concurrent producers
/// must be joined before their output is packed.
#[derive(Debug)]
pub struct BitWriter {
    buffer: Vec<u8>,
    current_byte: u8,
    bit_position: u8, // Counts from 8 down to 0
}

impl BitWriter {
    /// Create a new bit writer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new bit writer with specified byte capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            current_byte: 0,
            bit_position: 8,
        }
    }

    /// Append the low `count` bits of `value`, most significant first.
    ///
    /// `count` must be in `1..=32`.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) -> Result<()> {
        if count == 0 || count > 32 {
            return Err(Error::InvalidBitCount(count));
        }

        let mut remaining = count;
        while remaining > 0 {
            let to_write = remaining.min(self.bit_position);

            // Take the top `to_write` of the remaining bits
            let shift = remaining - to_write;
            let mask = (1u32 << to_write) - 1;
            let bits = ((value >> shift) & mask) as u8;

            self.bit_position -= to_write;
            self.current_byte |= bits << self.bit_position;
            remaining -= to_write;

            if self.bit_position == 0 {
                self.buffer.push(self.current_byte);
                self.current_byte = 0;
                self.bit_position = 8;
            }
        }
        Ok(())
    }

    /// Append a code of up to 64 bits, split into writes of at most 32.
    pub fn write_code(&mut self, code: u64, length: u8) -> Result<()> {
        if length == 0 || length > 64 {
            return Err(Error::InvalidBitCount(length));
        }
        if length > 32 {
            let high = length - 32;
            self.write_bits((code >> 32) as u32, high)?;
            self.write_bits(code as u32, 32)
        } else {
            self.write_bits(code as u32, length)
        }
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.write_bits(bit as u32, 1)
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.buffer.len() * 8 + (8 - self.bit_position as usize)
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.bit_position == 8
    }

    /// Pad the last byte with zero bits and return the escaped stream.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        if self.bit_position < 8 {
            self.buffer.push(self.current_byte);
        }
        stuff_bytes(&self.buffer)
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Insert a `0x00` after every `0xFF` byte.
pub fn stuff_bytes(raw: &[u8]) -> Vec<u8> {
    let extra = raw.iter().filter(|&&b| b == 0xFF).count();
    let mut out = Vec::with_capacity(raw.len() + extra);
    for &byte in raw {
        out.push(byte);
        if byte == 0xFF {
            out.push(0x00);
        }
    }
    out
}
