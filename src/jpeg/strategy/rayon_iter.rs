use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;

use super::{BlockKernel, BlockProcessor};
use crate::error::{Error, Result};
use crate::image::PlanarImage;
use crate::jpeg::block::{block_positions, BlockPos, QuantizedBlock};

/// Blocks mapped over rayon's global thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct RayonProcessor;

impl BlockProcessor for RayonProcessor {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn process(
        &self,
        image: &PlanarImage,
        kernel: &Arc<BlockKernel>,
    ) -> Result<Vec<QuantizedBlock>> {
        let kernel: &BlockKernel = kernel;
        let positions = block_positions(image.width(), image.height());
        par_map(&positions, |pos| kernel.process(image, pos))
    }
}

/// `par_iter` over `positions`; a panic in `f` becomes [`Error::WorkerFailed`].
fn par_map<F>(positions: &[BlockPos], f: F) -> Result<Vec<QuantizedBlock>>
where
    F: Fn(BlockPos) -> QuantizedBlock + Sync + Send,
{
    panic::catch_unwind(AssertUnwindSafe(|| {
        positions.par_iter().map(|&pos| f(pos)).collect()
    }))
    .map_err(Error::from_panic)
}
