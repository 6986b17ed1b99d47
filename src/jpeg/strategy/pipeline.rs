//! Producer/consumer pipeline: extraction, DCT and quantization stages.
//!
//! ```text
//! luma producer ───┐                    ┌─ dct 0 ─┐                    ┌─ quant 0 ─┐
//!                  ├─ extracted ─────────┤   ...   ├─ transformed ─────┤    ...    ├─ results
//! chroma producer ─┘                    └─ dct N ─┘                    └─ quant M ─┘
//! ```
//!
//! Stages are joined by bounded channels. A stage finishes when its input
//! channel is closed and drained; it then drops its sender, which closes
//! the next channel once every thread of the stage has done the same.
//! Workers of one stage share the receiving end behind a mutex. Every
//! message is a `Result`, so a failure travels downstream with the data.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::trace;

use super::{join_all, BlockKernel, BlockProcessor};
use crate::error::{Error, Result};
use crate::image::PlanarImage;
use crate::jpeg::block::{block_positions, extract_block, BlockPos, Channel, QuantizedBlock};

/// Messages buffered between two stages.
const STAGE_CAPACITY: usize = 64;

type Message<T> = Result<(BlockPos, T)>;
type SharedReceiver<T> = Arc<Mutex<Receiver<Message<T>>>>;

/// Staged pipeline with `dct_workers` transform threads and
/// `quant_workers` quantization threads.
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    dct_workers: usize,
    quant_workers: usize,
}

impl Pipeline {
    /// Worker counts are raised to at least 1.
    pub fn new(dct_workers: usize, quant_workers: usize) -> Self {
        Self {
            dct_workers: dct_workers.max(1),
            quant_workers: quant_workers.max(1),
        }
    }

    /// Transform stage threads.
    pub fn dct_workers(&self) -> usize {
        self.dct_workers
    }

    /// Quantization stage threads.
    pub fn quant_workers(&self) -> usize {
        self.quant_workers
    }
}

/// Take the next message from a receiver shared by several workers.
/// `None` once the channel is closed and empty.
fn next_message<T>(rx: &Mutex<Receiver<Message<T>>>) -> Option<Message<T>> {
    match rx.lock() {
        Ok(rx) => rx.recv().ok(),
        Err(_) => Some(Err(Error::worker("stage receiver lock poisoned"))),
    }
}

fn produce(
    image: &PlanarImage,
    positions: impl Iterator<Item = BlockPos>,
    tx: SyncSender<Message<[f64; 64]>>,
) {
    for pos in positions {
        if tx.send(Ok((pos, extract_block(image, pos)))).is_err() {
            break;
        }
    }
}

fn transform_stage(
    id: usize,
    kernel: &BlockKernel,
    rx: SharedReceiver<[f64; 64]>,
    tx: SyncSender<Message<[f64; 64]>>,
) {
    let mut handled = 0usize;
    while let Some(message) = next_message(&rx) {
        let failed = message.is_err();
        let output = message.map(|(pos, samples)| (pos, kernel.transform(&samples)));
        if tx.send(output).is_err() || failed {
            break;
        }
        handled += 1;
    }
    trace!(id, handled, "dct worker finished");
}

fn quantize_stage(
    id: usize,
    kernel: &BlockKernel,
    rx: SharedReceiver<[f64; 64]>,
    results: &Mutex<Vec<QuantizedBlock>>,
    first_error: &Mutex<Option<Error>>,
) {
    let mut handled = 0usize;
    while let Some(message) = next_message(&rx) {
        let block = match message {
            Ok((pos, coefficients)) => QuantizedBlock::new(pos, kernel.quantize(&coefficients)),
            Err(e) => {
                if let Ok(mut slot) = first_error.lock() {
                    slot.get_or_insert(e);
                }
                break;
            }
        };
        match results.lock() {
            Ok(mut results) => results.push(block),
            Err(_) => {
                if let Ok(mut slot) = first_error.lock() {
                    slot.get_or_insert(Error::worker("result lock poisoned"));
                }
                break;
            }
        }
        handled += 1;
    }
    trace!(id, handled, "quantize worker finished");
}

impl BlockProcessor for Pipeline {
    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn process(
        &self,
        image: &PlanarImage,
        kernel: &Arc<BlockKernel>,
    ) -> Result<Vec<QuantizedBlock>> {
        let positions = block_positions(image.width(), image.height());
        let expected = positions.len();
        let (luma, chroma): (Vec<BlockPos>, Vec<BlockPos>) = positions
            .into_iter()
            .partition(|pos| pos.channel == Channel::Luma);

        let results = Mutex::new(Vec::with_capacity(expected));
        let first_error = Mutex::new(None);
        let kernel: &BlockKernel = kernel;

        thread::scope(|scope| {
            let (extract_tx, extract_rx) = mpsc::sync_channel(STAGE_CAPACITY);
            let (dct_tx, dct_rx) = mpsc::sync_channel(STAGE_CAPACITY);
            let extract_rx: SharedReceiver<[f64; 64]> = Arc::new(Mutex::new(extract_rx));
            let dct_rx: SharedReceiver<[f64; 64]> = Arc::new(Mutex::new(dct_rx));

            let mut handles = Vec::with_capacity(2 + self.dct_workers + self.quant_workers);

            // Extraction closes once both producers drop their senders
            let luma_tx = extract_tx.clone();
            handles.push(scope.spawn(move || produce(image, luma.into_iter(), luma_tx)));
            handles.push(scope.spawn(move || produce(image, chroma.into_iter(), extract_tx)));

            for id in 0..self.dct_workers {
                let rx = Arc::clone(&extract_rx);
                let tx = dct_tx.clone();
                handles.push(scope.spawn(move || transform_stage(id, kernel, rx, tx)));
            }
            // Workers hold the only senders and receivers from here on
            drop(dct_tx);
            drop(extract_rx);

            for id in 0..self.quant_workers {
                let rx = Arc::clone(&dct_rx);
                let results = &results;
                let first_error = &first_error;
                handles.push(scope.spawn(move || {
                    quantize_stage(id, kernel, rx, results, first_error)
                }));
            }
            drop(dct_rx);

            join_all(handles)
        })?;

        let first_error = first_error
            .into_inner()
            .map_err(|_| Error::worker("error slot lock poisoned"))?;
        if let Some(e) = first_error {
            return Err(e);
        }

        let results = results
            .into_inner()
            .map_err(|_| Error::worker("result lock poisoned"))?;
        if results.len() != expected {
            return Err(Error::worker(format!(
                "pipeline produced {} of {expected} blocks",
                results.len()
            )));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{fixture, sorted};
    use super::super::Sequential;
    use super::*;

    #[test]
    fn test_pipeline_matches_sequential() {
        let (planar, kernel) = fixture(56, 33);
        let expected = Sequential.process(&planar, &kernel).unwrap();
        for (dct, quant) in [(1, 1), (1, 4), (4, 1), (3, 2)] {
            let blocks = Pipeline::new(dct, quant).process(&planar, &kernel).unwrap();
            assert_eq!(sorted(blocks), expected, "dct {dct}, quant {quant}");
        }
    }

    #[test]
    fn test_pipeline_more_blocks_than_capacity() {
        // 320 luma + 2 * 80 chroma blocks, well past the channel bound
        let (planar, kernel) = fixture(160, 128);
        let expected = Sequential.process(&planar, &kernel).unwrap();
        let blocks = Pipeline::new(2, 2).process(&planar, &kernel).unwrap();
        assert_eq!(blocks.len(), expected.len());
        assert_eq!(sorted(blocks), expected);
    }

    #[test]
    fn test_error_message_stops_stage() {
        let kernel = BlockKernel::new(
            crate::jpeg::dct::DctMethod::Reference,
            crate::jpeg::quantize::QuantizationTable::default(),
        );
        let (tx, rx) = mpsc::sync_channel(4);
        tx.send(Err(Error::worker("upstream"))).unwrap();
        tx.send(Ok((BlockPos::new(0, 0, Channel::Luma), [0.0f64; 64])))
            .unwrap();
        drop(tx);

        let results = Mutex::new(Vec::new());
        let first_error = Mutex::new(None);
        quantize_stage(0, &kernel, Arc::new(Mutex::new(rx)), &results, &first_error);

        assert_eq!(
            first_error.into_inner().unwrap(),
            Some(Error::WorkerFailed("upstream".into()))
        );
        assert!(results.into_inner().unwrap().is_empty());
    }

    #[test]
    fn test_worker_counts_coerced() {
        let pipeline = Pipeline::new(0, 0);
        assert_eq!(pipeline.dct_workers(), 1);
        assert_eq!(pipeline.quant_workers(), 1);
    }
}
