//! Error types for the parjpeg library.

use thiserror::Error;

/// Result type alias for parjpeg operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding, decoding or measuring images.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Invalid image dimensions (zero width or height).
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// Pixel data length doesn't match width x height x channels.
    #[error("Invalid pixel data length: expected {expected} bytes, got {actual}")]
    InvalidDataLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes provided.
        actual: usize,
    },

    /// Invalid quality parameter (must be 1-100).
    #[error("Invalid quality {0}: must be 1-100")]
    InvalidQuality(u8),

    /// Bit read or write request outside 1-32 bits.
    #[error("Invalid bit count {0}: must be 1-32")]
    InvalidBitCount(u8),

    /// The bit reader ran out of data before satisfying a request.
    #[error("End of stream reached")]
    EndOfStream,

    /// A Huffman tree was requested for an empty frequency map.
    #[error("Cannot build a Huffman tree from an empty alphabet")]
    EmptyAlphabet,

    /// Two images being compared have different sizes.
    #[error("Image dimensions differ: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        /// Width of the first image.
        left_width: u32,
        /// Height of the first image.
        left_height: u32,
        /// Width of the second image.
        right_width: u32,
        /// Height of the second image.
        right_height: u32,
    },

    /// The entropy-coded stream does not match its tables or block counts.
    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    /// A worker thread panicked or a stage disconnected early.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

impl Error {
    pub(crate) fn worker(msg: impl Into<String>) -> Self {
        Error::WorkerFailed(msg.into())
    }

    /// Turn a caught panic payload into a [`Error::WorkerFailed`].
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "worker panicked".to_string()
        };
        Error::WorkerFailed(msg)
    }
}
