//! Decoders for the block encoder's output.
//!
//! Two entry points share the same per-block path (dequantize, inverse
//! DCT, place into mid-gray planes, convert to RGB):
//! - [`Decoder::decode_from_blocks`] starts from quantized blocks and never
//!   touches a bitstream.
//! - [`Decoder::decode`] parses an [`EncodedOutput`] with its stored tables
//!   first.

pub mod bit_reader;

use tracing::debug;

use crate::color::convert_planes;
use crate::error::{Error, Result};
use crate::image::{PlanarImage, RgbImage};
use crate::jpeg::block::{place_block, BlockCounts, QuantizedBlock};
use crate::jpeg::dct::DctTables;
use crate::jpeg::entropy::decode_channels;
use crate::jpeg::quantize::QuantizationTable;
use crate::jpeg::EncodedOutput;

pub use bit_reader::BitReader;

/// Reconstructs RGB images from quantized blocks.
#[derive(Debug, Clone)]
pub struct Decoder {
    quantization: QuantizationTable,
    tables: DctTables,
}

impl Decoder {
    /// A decoder that dequantizes with `quantization`.
    pub fn new(quantization: QuantizationTable) -> Self {
        Self {
            quantization,
            tables: DctTables::new(),
        }
    }

    /// A decoder for the table generated at `quality`.
    pub fn with_quality(quality: u8) -> Result<Self> {
        Ok(Self::new(QuantizationTable::with_quality(quality)?))
    }

    /// Table used to dequantize.
    pub fn quantization(&self) -> &QuantizationTable {
        &self.quantization
    }

    /// Rebuild an image from blocks, in any order.
    ///
    /// Pixels not covered by any block stay mid-gray.
    pub fn decode_from_blocks(
        &self,
        blocks: &[QuantizedBlock],
        width: u32,
        height: u32,
    ) -> Result<RgbImage> {
        let mut planar = PlanarImage::new(width, height)?;
        for block in blocks {
            let coefficients = self.quantization.dequantize(&block.coefficients)?;
            let samples = self.tables.inverse(&coefficients);
            place_block(&mut planar, block.pos, &samples);
        }
        convert_planes(&planar)
    }

    /// Parse the entropy-coded stream of `encoded` and rebuild the image.
    ///
    /// Uses this decoder's inverse DCT but the quantization table stored in
    /// `encoded`.
    pub fn decode(&self, encoded: &EncodedOutput) -> Result<RgbImage> {
        let blocks = decode_blocks(encoded)?;
        let image = if encoded.quantization == self.quantization {
            self.decode_from_blocks(&blocks, encoded.width, encoded.height)?
        } else {
            let decoder = Decoder {
                quantization: encoded.quantization.clone(),
                tables: self.tables.clone(),
            };
            decoder.decode_from_blocks(&blocks, encoded.width, encoded.height)?
        };
        debug!(
            width = encoded.width,
            height = encoded.height,
            blocks = blocks.len(),
            bytes = encoded.data.len(),
            "decoded stream"
        );
        Ok(image)
    }
}

/// Parse the quantized blocks out of `encoded`, in stream order.
pub fn decode_blocks(encoded: &EncodedOutput) -> Result<Vec<QuantizedBlock>> {
    let expected = BlockCounts::for_dimensions(encoded.width, encoded.height);
    if encoded.block_counts != expected {
        return Err(Error::CorruptStream(format!(
            "block counts {:?} do not match a {}x{} image",
            encoded.block_counts, encoded.width, encoded.height
        )));
    }
    decode_channels(&encoded.data, &encoded.tables, encoded.width, encoded.height)
}

/// Reconstruct an image from quantized blocks and the table they were
/// quantized with.
pub fn decode_from_blocks(
    blocks: &[QuantizedBlock],
    quantization: &QuantizationTable,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    Decoder::new(quantization.clone()).decode_from_blocks(blocks, width, height)
}

/// Fully decode an [`EncodedOutput`].
pub fn decode(encoded: &EncodedOutput) -> Result<RgbImage> {
    Decoder::new(encoded.quantization.clone()).decode(encoded)
}
