//! Block encoder.
//!
//! Runs the classic pipeline over an RGB image:
//! - YCbCr conversion (optionally on several threads)
//! - block extraction, forward DCT and quantization under a chosen
//!   [`Strategy`](strategy::Strategy)
//! - zigzag scan and Huffman coding into one byte-stuffed stream
//!
//! The output is a codec core, not a JFIF file: there are no markers or
//! headers, and the tables travel alongside the data in [`EncodedOutput`].

pub mod block;
pub mod dct;
pub mod entropy;
pub mod huffman;
pub mod quantize;
pub mod strategy;

use std::sync::Arc;

use tracing::debug;

use crate::color::{convert_image, convert_image_parallel};
use crate::error::{Error, Result};
use crate::image::{PlanarImage, RgbImage};

use block::{BlockCounts, QuantizedBlock};
use dct::DctMethod;
use entropy::{encode_channels, EntropyCoding, HuffmanTables};
use quantize::QuantizationTable;
use strategy::{BlockKernel, BlockProcessor, Strategy};

/// Worker count used by the presets: the machine's parallelism, or 1 if
/// it cannot be queried.
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Encoding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Quality level 1-100.
    pub quality: u8,
    /// How block processing is spread over threads.
    pub strategy: Strategy,
    /// Forward DCT implementation.
    pub dct: DctMethod,
    /// Symbol mapping for the Huffman stage.
    pub entropy: EntropyCoding,
    /// Threads for RGB to YCbCr conversion (1 = on the caller).
    pub color_threads: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            quality: 75,
            strategy: Strategy::Sequential,
            dct: DctMethod::Reference,
            entropy: EntropyCoding::Coefficient,
            color_threads: 1,
        }
    }
}

impl EncodeOptions {
    /// Preset 0: Fast - AAN DCT, data-parallel blocks, per-coefficient symbols.
    pub fn fast(quality: u8) -> Self {
        let threads = default_threads();
        Self {
            quality,
            strategy: Strategy::DataParallel { threads },
            dct: DctMethod::Fast,
            entropy: EntropyCoding::Coefficient,
            color_threads: threads,
        }
    }

    /// Preset 1: Balanced - reference DCT, data-parallel blocks, run-length symbols.
    pub fn balanced(quality: u8) -> Self {
        let threads = default_threads();
        Self {
            quality,
            strategy: Strategy::DataParallel { threads },
            dct: DctMethod::Reference,
            entropy: EntropyCoding::RunLength,
            color_threads: threads,
        }
    }

    /// Preset 2: Max - reference DCT and run-length symbols on one thread
    /// (smallest output, no threading overhead for small images).
    pub fn max(quality: u8) -> Self {
        Self {
            quality,
            strategy: Strategy::Sequential,
            dct: DctMethod::Reference,
            entropy: EntropyCoding::RunLength,
            color_threads: 1,
        }
    }

    /// Create from preset (0=fast, 1=balanced, 2=max).
    pub fn from_preset(quality: u8, preset: u8) -> Self {
        match preset {
            0 => Self::fast(quality),
            2 => Self::max(quality),
            _ => Self::balanced(quality),
        }
    }

    /// Set the quality level.
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Set the block processing strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the forward DCT implementation.
    pub fn with_dct(mut self, dct: DctMethod) -> Self {
        self.dct = dct;
        self
    }

    /// Set the Huffman symbol mapping.
    pub fn with_entropy(mut self, entropy: EntropyCoding) -> Self {
        self.entropy = entropy;
        self
    }

    /// Set the color conversion thread count.
    pub fn with_color_threads(mut self, threads: usize) -> Self {
        self.color_threads = threads;
        self
    }
}

/// Everything produced by one encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedOutput {
    /// Packed, byte-stuffed entropy-coded stream.
    pub data: Vec<u8>,
    /// Independent code tables for Y, Cb and Cr.
    pub tables: HuffmanTables,
    /// The quantization table shared by all channels.
    pub quantization: QuantizationTable,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Blocks per channel, in stream order.
    pub block_counts: BlockCounts,
}

impl EncodedOutput {
    /// Size of the entropy-coded stream in bytes.
    pub fn compressed_size(&self) -> usize {
        self.data.len()
    }

    /// Symbol mapping the tables were built for.
    pub fn coding(&self) -> EntropyCoding {
        self.tables.coding()
    }
}

/// A configured encoder.
///
/// The quantization and DCT tables are built once in [`Encoder::new`] and
/// never change afterwards, so every worker reads them without locking.
pub struct Encoder {
    options: EncodeOptions,
    kernel: Arc<BlockKernel>,
    processor: Box<dyn BlockProcessor>,
}

impl Encoder {
    /// Validate `options` and build the tables and the block processor.
    pub fn new(options: EncodeOptions) -> Result<Self> {
        let quantization = QuantizationTable::with_quality(options.quality)?;
        let kernel = Arc::new(BlockKernel::new(options.dct, quantization));
        let processor = options.strategy.build()?;
        Ok(Self {
            options,
            kernel,
            processor,
        })
    }

    /// Options this encoder was built with.
    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// The quantization table for the configured quality.
    pub fn quantization(&self) -> &QuantizationTable {
        self.kernel.quantization()
    }

    /// Name of the block processor in use.
    pub fn strategy_name(&self) -> &'static str {
        self.processor.name()
    }

    /// RGB to YCbCr with the configured number of threads.
    pub fn convert(&self, image: &RgbImage) -> Result<PlanarImage> {
        if self.options.color_threads > 1 {
            convert_image_parallel(image, self.options.color_threads)
        } else {
            convert_image(image)
        }
    }

    /// Quantized blocks of already converted planes, in stream order.
    pub fn process_planar(&self, planar: &PlanarImage) -> Result<Vec<QuantizedBlock>> {
        let mut blocks = self.processor.process(planar, &self.kernel)?;
        blocks.sort_by_key(|b| b.pos);
        Ok(blocks)
    }

    /// Convert `image` and return its quantized blocks in stream order.
    pub fn process_blocks(&self, image: &RgbImage) -> Result<Vec<QuantizedBlock>> {
        let planar = self.convert(image)?;
        self.process_planar(&planar)
    }

    /// Entropy-code blocks of a `width` x `height` image.
    pub fn encode_blocks(
        &self,
        blocks: &[QuantizedBlock],
        width: u32,
        height: u32,
    ) -> Result<EncodedOutput> {
        let block_counts = BlockCounts::for_dimensions(width, height);
        if blocks.len() != block_counts.total() {
            return Err(Error::CorruptStream(format!(
                "expected {} blocks for {width}x{height}, got {}",
                block_counts.total(),
                blocks.len()
            )));
        }

        let (data, tables) = encode_channels(blocks, self.options.entropy)?;
        Ok(EncodedOutput {
            data,
            tables,
            quantization: self.kernel.quantization().clone(),
            width,
            height,
            block_counts,
        })
    }

    /// Full encode: color conversion, block processing, entropy coding.
    pub fn encode(&self, image: &RgbImage) -> Result<EncodedOutput> {
        let blocks = self.process_blocks(image)?;
        let output = self.encode_blocks(&blocks, image.width(), image.height())?;
        debug!(
            width = image.width(),
            height = image.height(),
            quality = self.options.quality,
            strategy = self.processor.name(),
            blocks = blocks.len(),
            bytes = output.data.len(),
            "encoded image"
        );
        Ok(output)
    }

    /// Encode a raw RGB buffer (3 bytes per pixel, row-major).
    pub fn encode_raw(&self, data: &[u8], width: u32, height: u32) -> Result<EncodedOutput> {
        let image = RgbImage::from_raw(width, height, data.to_vec())?;
        self.encode(&image)
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("options", &self.options)
            .field("processor", &self.processor.name())
            .finish()
    }
}

/// Encode `image` at `quality` with the default options.
pub fn encode(image: &RgbImage, quality: u8) -> Result<EncodedOutput> {
    Encoder::new(EncodeOptions::default().with_quality(quality))?.encode(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::block::Channel;
    use crate::jpeg::entropy::ChannelCodes;

    #[test]
    fn test_encode_invalid_quality() {
        let image = RgbImage::new(8, 8).unwrap();
        assert!(matches!(encode(&image, 0), Err(Error::InvalidQuality(0))));
        assert!(matches!(
            encode(&image, 101),
            Err(Error::InvalidQuality(101))
        ));
    }

    #[test]
    fn test_encode_raw_validation_order() {
        let options = EncodeOptions::default().with_quality(0);
        // Quality is checked before dimensions
        assert!(matches!(
            Encoder::new(options),
            Err(Error::InvalidQuality(0))
        ));

        let encoder = Encoder::new(EncodeOptions::default()).unwrap();
        assert!(matches!(
            encoder.encode_raw(&[], 0, 4),
            Err(Error::InvalidDimensions { .. })
        ));
        assert!(matches!(
            encoder.encode_raw(&[0; 5], 1, 2),
            Err(Error::InvalidDataLength {
                expected: 6,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_encode_1x1() {
        let image = RgbImage::from_raw(1, 1, vec![255, 0, 0]).unwrap();
        let output = encode(&image, 85).unwrap();
        assert_eq!(output.block_counts.total(), 3);
        assert!(!output.data.is_empty());
    }

    #[test]
    fn test_gray_image_single_symbol_per_channel() {
        let image = RgbImage::from_raw(16, 16, vec![128; 16 * 16 * 3]).unwrap();
        let encoder = Encoder::new(EncodeOptions::default().with_quality(50)).unwrap();

        let blocks = encoder.process_blocks(&image).unwrap();
        for block in &blocks {
            assert!(block.coefficients[1..].iter().all(|&c| c == 0));
        }

        let output = encoder.encode_blocks(&blocks, 16, 16).unwrap();
        for channel in Channel::ALL {
            let ChannelCodes::Coefficient(table) = output.tables.get(channel) else {
                panic!("expected coefficient tables");
            };
            assert_eq!(table.len(), 1, "{}", channel.name());
        }
    }

    #[test]
    fn test_stores_table_actually_used() {
        let image = RgbImage::test_pattern(16, 16).unwrap();
        let output = encode(&image, 90).unwrap();
        assert_eq!(output.quantization, QuantizationTable::with_quality(90).unwrap());
        assert_ne!(output.quantization, QuantizationTable::default());
    }

    #[test]
    fn test_strategies_produce_identical_bytes() {
        let image = RgbImage::test_pattern(48, 32).unwrap();
        let baseline = Encoder::new(EncodeOptions::default()).unwrap().encode(&image).unwrap();

        for strategy in Strategy::all(3) {
            let options = EncodeOptions::default()
                .with_strategy(strategy)
                .with_color_threads(2);
            let output = Encoder::new(options).unwrap().encode(&image).unwrap();
            assert_eq!(output, baseline, "{strategy}");
        }
    }

    #[test]
    fn test_encode_blocks_rejects_wrong_count() {
        let encoder = Encoder::new(EncodeOptions::default()).unwrap();
        let image = RgbImage::test_pattern(16, 16).unwrap();
        let mut blocks = encoder.process_blocks(&image).unwrap();
        blocks.pop();
        assert!(matches!(
            encoder.encode_blocks(&blocks, 16, 16),
            Err(Error::CorruptStream(_))
        ));
    }

    #[test]
    fn test_presets() {
        let fast = EncodeOptions::fast(80);
        assert_eq!(fast.quality, 80);
        assert_eq!(fast.dct, DctMethod::Fast);

        let max = EncodeOptions::from_preset(60, 2);
        assert_eq!(max, EncodeOptions::max(60));
        assert_eq!(max.entropy, EntropyCoding::RunLength);

        assert_eq!(EncodeOptions::from_preset(60, 9), EncodeOptions::balanced(60));
    }

    #[test]
    fn test_run_length_is_smaller_on_smooth_image() {
        let image = RgbImage::test_pattern(64, 64).unwrap();
        let options = EncodeOptions::default().with_quality(50);
        let coefficient = Encoder::new(options).unwrap().encode(&image).unwrap();
        let run_length = Encoder::new(options.with_entropy(EntropyCoding::RunLength))
            .unwrap()
            .encode(&image)
            .unwrap();
        assert!(run_length.data.len() < coefficient.data.len());
    }
}
