//! Block identity, zigzag scan, and block extraction / placement.
//!
//! Luma blocks tile the image every 8 pixels. Chroma blocks tile it every
//! 16 pixels and sample every second pixel in both directions (4:2:0 by
//! point sampling, no pre-filter). On decode, chroma samples are written
//! back as 2x2 squares.

use crate::image::PlanarImage;

/// Zigzag scan order for an 8x8 block: `ZIGZAG[i]` is the natural
/// (row-major) index of the `i`-th coefficient in scan order.
pub const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27, 20,
    13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58, 59,
    52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Image component a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Y.
    Luma,
    /// Cb.
    ChromaBlue,
    /// Cr.
    ChromaRed,
}

impl Channel {
    /// All channels in stream order.
    pub const ALL: [Channel; 3] = [Channel::Luma, Channel::ChromaBlue, Channel::ChromaRed];

    /// Position in [`Channel::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Channel::Luma => 0,
            Channel::ChromaBlue => 1,
            Channel::ChromaRed => 2,
        }
    }

    /// Pixels between the origins of neighbouring blocks.
    #[inline]
    pub const fn block_step(self) -> usize {
        match self {
            Channel::Luma => 8,
            _ => 16,
        }
    }

    /// Pixels between neighbouring samples inside one block.
    #[inline]
    pub const fn sample_stride(self) -> usize {
        match self {
            Channel::Luma => 1,
            _ => 2,
        }
    }

    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Channel::Luma => "Y",
            Channel::ChromaBlue => "Cb",
            Channel::ChromaRed => "Cr",
        }
    }
}

/// Grid position of a block inside its channel.
///
/// `bx`/`by` count blocks, not pixels. Ordering is channel first, then
/// row, then column, which is the order blocks are packed in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    /// Plane the block belongs to.
    pub channel: Channel,
    /// Block row.
    pub by: u32,
    /// Block column.
    pub bx: u32,
}

impl BlockPos {
    /// Block at column `bx`, row `by` of `channel`.
    pub const fn new(bx: u32, by: u32, channel: Channel) -> Self {
        Self { channel, by, bx }
    }

    /// Top-left pixel covered by this block.
    #[inline]
    pub fn origin(&self) -> (usize, usize) {
        let step = self.channel.block_step();
        (self.bx as usize * step, self.by as usize * step)
    }
}

/// Number of blocks per channel for an image size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockCounts {
    /// Y blocks.
    pub luma: usize,
    /// Cb blocks.
    pub chroma_blue: usize,
    /// Cr blocks.
    pub chroma_red: usize,
}

impl BlockCounts {
    /// Counts for a `width` x `height` image.
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        let (lx, ly) = grid(width, height, Channel::Luma);
        let (cx, cy) = grid(width, height, Channel::ChromaBlue);
        Self {
            luma: lx * ly,
            chroma_blue: cx * cy,
            chroma_red: cx * cy,
        }
    }

    /// Count for one channel.
    #[inline]
    pub fn get(&self, channel: Channel) -> usize {
        match channel {
            Channel::Luma => self.luma,
            Channel::ChromaBlue => self.chroma_blue,
            Channel::ChromaRed => self.chroma_red,
        }
    }

    /// Blocks across all channels.
    pub fn total(&self) -> usize {
        self.luma + self.chroma_blue + self.chroma_red
    }
}

/// Blocks per row and per column of `channel`.
#[inline]
pub fn grid(width: u32, height: u32, channel: Channel) -> (usize, usize) {
    let step = channel.block_step();
    ((width as usize).div_ceil(step), (height as usize).div_ceil(step))
}

/// Every block position of an image: all Y blocks, then Cb, then Cr, each
/// in raster order.
pub fn block_positions(width: u32, height: u32) -> Vec<BlockPos> {
    let counts = BlockCounts::for_dimensions(width, height);
    let mut positions = Vec::with_capacity(counts.total());
    for channel in Channel::ALL {
        let (cols, rows) = grid(width, height, channel);
        for by in 0..rows {
            for bx in 0..cols {
                positions.push(BlockPos::new(bx as u32, by as u32, channel));
            }
        }
    }
    positions
}

/// A quantized 8x8 block tagged with its position.
///
/// Coefficients are stored in natural (row-major) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedBlock {
    /// Where the block came from.
    pub pos: BlockPos,
    /// Quantized coefficients, row-major.
    pub coefficients: [i32; 64],
}

impl QuantizedBlock {
    /// Wrap coefficients for `pos`.
    pub fn new(pos: BlockPos, coefficients: [i32; 64]) -> Self {
        Self { pos, coefficients }
    }

    /// Channel of the block.
    #[inline]
    pub fn channel(&self) -> Channel {
        self.pos.channel
    }

    /// Coefficients in zigzag scan order.
    #[inline]
    pub fn zigzag(&self) -> [i32; 64] {
        to_zigzag(&self.coefficients)
    }
}

/// Reorder a natural-order block into zigzag order.
#[inline]
pub fn to_zigzag<T: Copy + Default>(block: &[T; 64]) -> [T; 64] {
    let mut result = [T::default(); 64];
    for (i, &natural) in ZIGZAG.iter().enumerate() {
        result[i] = block[natural];
    }
    result
}

/// Inverse of [`to_zigzag`].
#[inline]
pub fn from_zigzag<T: Copy + Default>(scan: &[T; 64]) -> [T; 64] {
    let mut result = [T::default(); 64];
    for (i, &natural) in ZIGZAG.iter().enumerate() {
        result[natural] = scan[i];
    }
    result
}

/// Sample an 8x8 window for `pos`, level-shifted by -128.
///
/// Coordinates past the right or bottom edge are clamped, so edge pixels
/// are replicated.
pub fn extract_block(image: &PlanarImage, pos: BlockPos) -> [f64; 64] {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let plane = image.plane(pos.channel);
    let stride = pos.channel.sample_stride();
    let (x0, y0) = pos.origin();

    let mut block = [0.0f64; 64];
    for row in 0..8 {
        let y = (y0 + row * stride).min(height - 1);
        for col in 0..8 {
            let x = (x0 + col * stride).min(width - 1);
            block[row * 8 + col] = plane[y * width + x] as f64 - 128.0;
        }
    }
    block
}

/// Write reconstructed samples back into the plane for `pos`.
///
/// Each value is shifted by +128, rounded and clamped. Luma writes one
/// pixel per sample; chroma writes a 2x2 square. Pixels outside the image
/// are skipped.
pub fn place_block(image: &mut PlanarImage, pos: BlockPos, samples: &[f64; 64]) {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let stride = pos.channel.sample_stride();
    let (x0, y0) = pos.origin();
    let plane = image.plane_mut(pos.channel);

    for row in 0..8 {
        for col in 0..8 {
            let value = (samples[row * 8 + col] + 128.0).round().clamp(0.0, 255.0) as u8;
            for dy in 0..stride {
                let y = y0 + row * stride + dy;
                if y >= height {
                    continue;
                }
                for dx in 0..stride {
                    let x = x0 + col * stride + dx;
                    if x < width {
                        plane[y * width + x] = value;
                    }
                }
            }
        }
    }
}
