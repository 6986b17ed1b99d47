//! # parjpeg
//!
//! The core of a baseline JPEG encoder, with several interchangeable ways
//! of spreading the per-block work over threads.
//!
//! An RGB image goes through YCbCr conversion, 8x8 block extraction, a
//! forward DCT, quantization, zigzag reordering and Huffman coding into a
//! single byte-stuffed stream. A matching decoder rebuilds the image, and
//! [`metrics`] measures how far the reconstruction drifted.
//!
//! ## Features
//!
//! - **Reference and AAN forward DCTs**
//! - **Per-channel Huffman tables** built from actual symbol frequencies
//! - **Five threading strategies** that produce identical bytes
//! - Optional rayon strategy via the `parallel` feature
//!
//! ## Example
//!
//! ```rust
//! use parjpeg::{decode, EncodeOptions, Encoder, RgbImage, Strategy};
//!
//! let image = RgbImage::test_pattern(64, 64).unwrap();
//!
//! let options = EncodeOptions::default()
//!     .with_quality(85)
//!     .with_strategy(Strategy::DataParallel { threads: 4 });
//! let encoded = Encoder::new(options).unwrap().encode(&image).unwrap();
//!
//! let decoded = decode::decode(&encoded).unwrap();
//! let psnr = parjpeg::metrics::psnr(&image, &decoded).unwrap();
//! assert!(psnr > 30.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bits;
pub mod color;
pub mod decode;
pub mod error;
pub mod image;
pub mod jpeg;
pub mod metrics;

pub use decode::Decoder;
pub use error::{Error, Result};
pub use image::{PlanarImage, RgbImage};
pub use jpeg::block::{BlockPos, Channel, QuantizedBlock};
pub use jpeg::dct::DctMethod;
pub use jpeg::entropy::EntropyCoding;
pub use jpeg::quantize::QuantizationTable;
pub use jpeg::strategy::Strategy;
pub use jpeg::{EncodeOptions, EncodedOutput, Encoder};
pub use metrics::QualityReport;
