use std::sync::Arc;
use std::thread;

use tracing::trace;

use super::{join_all, BlockKernel, BlockProcessor};
use crate::error::Result;
use crate::image::PlanarImage;
use crate::jpeg::block::{block_positions, QuantizedBlock};

/// Threads alive at once before the next wave is spawned.
pub const DEFAULT_WAVE: usize = 256;

/// Naive fork-join: one scoped thread per block, joined in spawn order.
///
/// Spawning is done in waves of `wave` threads so very large images do
/// not exhaust the OS thread limit.
#[derive(Debug, Clone, Copy)]
pub struct ForkJoin {
    wave: usize,
}

impl ForkJoin {
    /// Spawn at most `wave` threads at a time.
    pub fn with_wave(wave: usize) -> Self {
        Self { wave: wave.max(1) }
    }
}

impl Default for ForkJoin {
    fn default() -> Self {
        Self::with_wave(DEFAULT_WAVE)
    }
}

impl BlockProcessor for ForkJoin {
    fn name(&self) -> &'static str {
        "fork-join"
    }

    fn process(
        &self,
        image: &PlanarImage,
        kernel: &Arc<BlockKernel>,
    ) -> Result<Vec<QuantizedBlock>> {
        let positions = block_positions(image.width(), image.height());
        let kernel: &BlockKernel = kernel;
        let mut blocks = Vec::with_capacity(positions.len());

        for (wave, chunk) in positions.chunks(self.wave).enumerate() {
            trace!(wave, threads = chunk.len(), "fork-join wave");
            let joined = thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|&pos| scope.spawn(move || kernel.process(image, pos)))
                    .collect();
                join_all(handles)
            })?;
            blocks.extend(joined);
        }

        Ok(blocks)
    }
}
