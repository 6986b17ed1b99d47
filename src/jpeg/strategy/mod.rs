//! Execution strategies for the extract, transform and quantize stage.
//!
//! Every strategy runs the same [`BlockKernel`]; they differ only in how
//! blocks are scheduled onto threads. All of them must return the same
//! set of blocks as [`Sequential`]. Enumeration order may differ, which is
//! why the encoder sorts blocks before packing.

use std::fmt;
use std::sync::Arc;
use std::thread::ScopedJoinHandle;

use crate::error::{Error, Result};
use crate::image::PlanarImage;
use crate::jpeg::block::{extract_block, BlockPos, QuantizedBlock};
use crate::jpeg::dct::{DctMethod, DctTables};
use crate::jpeg::quantize::QuantizationTable;

mod data_parallel;
mod fork_join;
mod pipeline;
mod pool;
#[cfg(feature = "parallel")]
mod rayon_iter;
mod sequential;

pub use data_parallel::DataParallel;
pub use fork_join::ForkJoin;
pub use pipeline::Pipeline;
pub use pool::{PooledProcessor, TaskHandle, WorkerPool};
#[cfg(feature = "parallel")]
pub use rayon_iter::RayonProcessor;
pub use sequential::Sequential;

/// The per-block math shared by every strategy.
///
/// Immutable after construction; strategies share it by reference or
/// through an `Arc`.
#[derive(Debug, Clone)]
pub struct BlockKernel {
    tables: DctTables,
    method: DctMethod,
    quantization: QuantizationTable,
}

impl BlockKernel {
    /// Kernel for `method` and `quantization`.
    pub fn new(method: DctMethod, quantization: QuantizationTable) -> Self {
        Self {
            tables: DctTables::new(),
            method,
            quantization,
        }
    }

    /// Forward DCT in use.
    pub fn method(&self) -> DctMethod {
        self.method
    }

    /// Quantization table in use.
    pub fn quantization(&self) -> &QuantizationTable {
        &self.quantization
    }

    /// Shared cosine tables.
    pub fn tables(&self) -> &DctTables {
        &self.tables
    }

    /// Forward DCT of one level-shifted block.
    #[inline]
    pub fn transform(&self, block: &[f64; 64]) -> [f64; 64] {
        self.tables.forward(self.method, block)
    }

    /// Quantize transformed coefficients.
    #[inline]
    pub fn quantize(&self, coefficients: &[f64; 64]) -> [i32; 64] {
        self.quantization.quantize(coefficients)
    }

    /// Extract, transform and quantize the block at `pos`.
    #[inline]
    pub fn process(&self, image: &PlanarImage, pos: BlockPos) -> QuantizedBlock {
        let samples = extract_block(image, pos);
        QuantizedBlock::new(pos, self.quantize(&self.transform(&samples)))
    }
}

/// Join every scoped thread, returning their outputs in order or the
/// first panic as [`Error::WorkerFailed`].
///
/// All handles are joined even after a failure, so the scope never
/// re-raises a second panic.
pub(crate) fn join_all<'scope, T>(
    handles: impl IntoIterator<Item = ScopedJoinHandle<'scope, T>>,
) -> Result<Vec<T>> {
    let mut outputs = Vec::new();
    let mut first_error = None;
    for handle in handles {
        match handle.join() {
            Ok(output) => outputs.push(output),
            Err(payload) => {
                first_error.get_or_insert(Error::from_panic(payload));
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(outputs),
    }
}

/// Turns a planar image into quantized blocks.
pub trait BlockProcessor: Send + Sync {
    /// Short name for logs and reports.
    fn name(&self) -> &'static str;

    /// Process every block of `image`. The returned order is unspecified,
    /// but each block carries its position.
    fn process(&self, image: &PlanarImage, kernel: &Arc<BlockKernel>)
        -> Result<Vec<QuantizedBlock>>;
}

/// Which [`BlockProcessor`] to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// One thread, defines the expected output.
    #[default]
    Sequential,
    /// Long-lived workers fed through a shared task queue.
    WorkerPool {
        /// Pool size.
        threads: usize,
    },
    /// Scoped threads over a strided partition of the block list.
    DataParallel {
        /// Number of lanes.
        threads: usize,
    },
    /// Extraction, DCT and quantization stages joined by channels.
    Pipeline {
        /// Transform stage threads.
        dct_workers: usize,
        /// Quantization stage threads.
        quant_workers: usize,
    },
    /// One short-lived thread per block.
    ForkJoin,
    /// Rayon's work-stealing `par_iter`.
    #[cfg(feature = "parallel")]
    Rayon,
}

impl Strategy {
    /// Construct the processor. Thread counts of zero are treated as one.
    pub fn build(&self) -> Result<Box<dyn BlockProcessor>> {
        Ok(match *self {
            Strategy::Sequential => Box::new(Sequential),
            Strategy::WorkerPool { threads } => Box::new(PooledProcessor::new(threads)?),
            Strategy::DataParallel { threads } => Box::new(DataParallel::new(threads)),
            Strategy::Pipeline {
                dct_workers,
                quant_workers,
            } => Box::new(Pipeline::new(dct_workers, quant_workers)),
            Strategy::ForkJoin => Box::new(ForkJoin::default()),
            #[cfg(feature = "parallel")]
            Strategy::Rayon => Box::new(RayonProcessor),
        })
    }

    /// Short name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::WorkerPool { .. } => "worker-pool",
            Strategy::DataParallel { .. } => "data-parallel",
            Strategy::Pipeline { .. } => "pipeline",
            Strategy::ForkJoin => "fork-join",
            #[cfg(feature = "parallel")]
            Strategy::Rayon => "rayon",
        }
    }

    /// Every strategy, with `threads` workers where a count applies.
    pub fn all(threads: usize) -> Vec<Strategy> {
        let mut all = vec![
            Strategy::Sequential,
            Strategy::WorkerPool { threads },
            Strategy::DataParallel { threads },
            Strategy::Pipeline {
                dct_workers: threads,
                quant_workers: threads,
            },
            Strategy::ForkJoin,
        ];
        #[cfg(feature = "parallel")]
        all.push(Strategy::Rayon);
        all
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::WorkerPool { threads } | Strategy::DataParallel { threads } => {
                write!(f, "{} ({threads} threads)", self.name())
            }
            Strategy::Pipeline {
                dct_workers,
                quant_workers,
            } => write!(
                f,
                "{} ({dct_workers} dct + {quant_workers} quant)",
                self.name()
            ),
            _ => f.write_str(self.name()),
        }
    }
}
