use std::sync::Arc;
use std::thread;

use tracing::trace;

use super::{join_all, BlockKernel, BlockProcessor};
use crate::error::{Error, Result};
use crate::image::PlanarImage;
use crate::jpeg::block::{block_positions, QuantizedBlock};

/// Strided partition of the block list over scoped threads.
///
/// Thread `t` of `n` handles indices `t, t + n, t + 2n, ...` of the flat
/// list (all Y blocks, then Cb, then Cr) and writes straight into the
/// preallocated slot for each index. The slots are split up front, so no
/// two threads ever share one and no lock is needed.
#[derive(Debug, Clone, Copy)]
pub struct DataParallel {
    threads: usize,
}

impl DataParallel {
    /// Split blocks over `threads` lanes (at least 1).
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// Lane count.
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl BlockProcessor for DataParallel {
    fn name(&self) -> &'static str {
        "data-parallel"
    }

    fn process(
        &self,
        image: &PlanarImage,
        kernel: &Arc<BlockKernel>,
    ) -> Result<Vec<QuantizedBlock>> {
        let positions = block_positions(image.width(), image.height());
        let threads = self.threads.min(positions.len()).max(1);

        let mut slots: Vec<Option<QuantizedBlock>> = vec![None; positions.len()];
        let mut lanes: Vec<Vec<(usize, &mut Option<QuantizedBlock>)>> =
            (0..threads).map(|_| Vec::new()).collect();
        for (index, slot) in slots.iter_mut().enumerate() {
            lanes[index % threads].push((index, slot));
        }

        let kernel: &BlockKernel = kernel;
        let positions = &positions;
        thread::scope(|scope| {
            let handles: Vec<_> = lanes
                .into_iter()
                .enumerate()
                .map(|(tid, lane)| {
                    scope.spawn(move || {
                        trace!(tid, blocks = lane.len(), "data-parallel lane");
                        for (index, slot) in lane {
                            *slot = Some(kernel.process(image, positions[index]));
                        }
                    })
                })
                .collect();

            join_all(handles)
        })?;

        slots
            .into_iter()
            .map(|slot| slot.ok_or_else(|| Error::worker("data-parallel slot left empty")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::fixture;
    use super::super::Sequential;
    use super::*;

    #[test]
    fn test_preserves_stream_order() {
        let (planar, kernel) = fixture(40, 40);
        let expected = Sequential.process(&planar, &kernel).unwrap();
        for threads in [1, 2, 5, 1000] {
            let blocks = DataParallel::new(threads).process(&planar, &kernel).unwrap();
            assert_eq!(blocks, expected, "threads = {threads}");
        }
    }

    #[test]
    fn test_thread_count_coerced() {
        assert_eq!(DataParallel::new(0).threads(), 1);
        assert_eq!(DataParallel::new(6).threads(), 6);
    }
}
