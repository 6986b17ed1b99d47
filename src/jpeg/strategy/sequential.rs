use std::sync::Arc;

use tracing::trace;

use super::{BlockKernel, BlockProcessor};
use crate::error::Result;
use crate::image::PlanarImage;
use crate::jpeg::block::{block_positions, QuantizedBlock};

/// Single-threaded baseline. Blocks come out in stream order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl BlockProcessor for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn process(
        &self,
        image: &PlanarImage,
        kernel: &Arc<BlockKernel>,
    ) -> Result<Vec<QuantizedBlock>> {
        let positions = block_positions(image.width(), image.height());
        trace!(blocks = positions.len(), "sequential pass");
        Ok(positions
            .into_iter()
            .map(|pos| kernel.process(image, pos))
            .collect())
    }
}
