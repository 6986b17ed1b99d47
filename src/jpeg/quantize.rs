//! Quantization tables and functions.

use crate::error::{Error, Result};
use crate::jpeg::block::ZIGZAG;

/// Standard JPEG luminance quantization table (natural order).
const STD_LUMINANCE_TABLE: [u16; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61, 12, 12, 14, 19, 26, 58, 60, 55, 14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62, 18, 22, 37, 56, 68, 109, 103, 77, 24, 35, 55, 64, 81, 104, 113,
    92, 49, 64, 78, 87, 103, 121, 120, 101, 72, 92, 95, 98, 112, 100, 103, 99,
];

/// Quality scale factor in percent (same formula as libjpeg).
///
/// Kept fractional below quality 50 so table entries are truncated only
/// once. `quality` must already be in `1..=100`.
#[inline]
pub fn scale_factor(quality: u8) -> f64 {
    if quality < 50 {
        5000.0 / quality as f64
    } else {
        200.0 - 2.0 * quality as f64
    }
}

/// An 8x8 quantization table derived from a quality setting.
///
/// Shared by every channel. Immutable once built, so it can be read
/// from any number of threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizationTable {
    quality: u8,
    /// Divisors in natural order, each in 1-255.
    values: [u16; 64],
}

impl QuantizationTable {
    /// Create the table for `quality` (1-100).
    pub fn with_quality(quality: u8) -> Result<Self> {
        if quality == 0 || quality > 100 {
            return Err(Error::InvalidQuality(quality));
        }
        let scale = scale_factor(quality);

        let mut values = [0u16; 64];
        for (value, &base) in values.iter_mut().zip(STD_LUMINANCE_TABLE.iter()) {
            let scaled = ((base as f64 * scale + 50.0) / 100.0) as u32;
            *value = scaled.clamp(1, 255) as u16;
        }

        Ok(Self { quality, values })
    }

    /// Build a table from explicit natural-order values (each clamped to 1-255).
    pub fn from_values(quality: u8, values: [u16; 64]) -> Self {
        Self {
            quality,
            values: values.map(|v| v.clamp(1, 255)),
        }
    }

    /// Quality the table was generated for.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Divisors in natural (row-major) order.
    pub fn values(&self) -> &[u16; 64] {
        &self.values
    }

    /// Divisors in zigzag order.
    pub fn zigzag(&self) -> [u16; 64] {
        let mut out = [0u16; 64];
        for (i, &natural) in ZIGZAG.iter().enumerate() {
            out[i] = self.values[natural];
        }
        out
    }

    /// The table as 8 rows of 8.
    pub fn rows(&self) -> [[u16; 8]; 8] {
        let mut rows = [[0u16; 8]; 8];
        for (i, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&self.values[i * 8..i * 8 + 8]);
        }
        rows
    }

    /// Divide each coefficient by its divisor and round half away from zero.
    #[inline]
    pub fn quantize(&self, dct: &[f64; 64]) -> [i32; 64] {
        let mut result = [0i32; 64];
        for i in 0..64 {
            result[i] = (dct[i] / self.values[i] as f64).round() as i32;
        }
        result
    }

    /// Multiply each quantized coefficient back by its divisor.
    ///
    /// Fails with [`Error::CorruptStream`] if a product overflows `i32`,
    /// which only happens for coefficients no encoder would produce.
    #[inline]
    pub fn dequantize(&self, quantized: &[i32; 64]) -> Result<[i32; 64]> {
        let mut result = [0i32; 64];
        for i in 0..64 {
            result[i] = quantized[i]
                .checked_mul(self.values[i] as i32)
                .ok_or_else(|| {
                    Error::CorruptStream(format!("coefficient {} overflows", quantized[i]))
                })?;
        }
        Ok(result)
    }
}

impl Default for QuantizationTable {
    fn default() -> Self {
        Self {
            quality: 50,
            values: STD_LUMINANCE_TABLE,
        }
    }
}
