//! A fixed-size pool of long-lived worker threads.
//!
//! Workers wait on a condition variable for jobs pushed into a shared
//! queue. Each job reports back through its own one-shot channel, so a
//! panic inside a job reaches only the caller that submitted it.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use super::{BlockKernel, BlockProcessor};
use crate::error::{Error, Result};
use crate::image::PlanarImage;
use crate::jpeg::block::{block_positions, extract_block, QuantizedBlock};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Queue {
    jobs: VecDeque<Job>,
    stop: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    available: Condvar,
}

/// The pending result of a submitted job.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: Receiver<Result<T>>,
}

impl<T> TaskHandle<T> {
    /// Block until the job has run.
    pub fn wait(self) -> Result<T> {
        self.rx
            .recv()
            .map_err(|_| Error::worker("task dropped before it ran"))?
    }
}

/// Worker threads consuming a mutex and condvar guarded job queue.
///
/// Dropping the pool sets the stop flag, wakes every worker and joins
/// them. Jobs already queued are still run before the workers exit.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one).
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let shared = Arc::new(Shared::default());

        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(threads),
        };
        for id in 0..threads {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("parjpeg-worker-{id}"))
                .spawn(move || worker_loop(id, &shared))
                .map_err(|e| Error::worker(format!("failed to spawn worker: {e}")))?;
            pool.workers.push(handle);
        }
        debug!(threads, "worker pool started");
        Ok(pool)
    }

    /// Number of worker threads.
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queue `f` and return a handle to its result.
    ///
    /// A panic inside `f` is caught and reported by the handle as
    /// [`Error::WorkerFailed`].
    pub fn submit<T, F>(&self, f: F) -> Result<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(f)).map_err(Error::from_panic);
            // The caller may have dropped its handle
            let _ = tx.send(result);
        });

        let mut queue = self
            .shared
            .queue
            .lock()
            .map_err(|_| Error::worker("task queue lock poisoned"))?;
        if queue.stop {
            return Err(Error::worker("worker pool is shut down"));
        }
        queue.jobs.push_back(job);
        drop(queue);
        self.shared.available.notify_one();

        Ok(TaskHandle { rx })
    }

    /// Forward DCT of one block on a worker; blocks until it is done.
    pub fn forward_dct(&self, kernel: &Arc<BlockKernel>, block: [f64; 64]) -> Result<[f64; 64]> {
        let kernel = Arc::clone(kernel);
        self.submit(move || kernel.transform(&block))?.wait()
    }

    /// Quantize one block on a worker; blocks until it is done.
    pub fn quantize(
        &self,
        kernel: &Arc<BlockKernel>,
        coefficients: [f64; 64],
    ) -> Result<[i32; 64]> {
        let kernel = Arc::clone(kernel);
        self.submit(move || kernel.quantize(&coefficients))?.wait()
    }

    /// Submit one DCT job per block, then gather the results in order.
    pub fn forward_dct_batch(
        &self,
        kernel: &Arc<BlockKernel>,
        blocks: Vec<[f64; 64]>,
    ) -> Result<Vec<[f64; 64]>> {
        let handles = blocks
            .into_iter()
            .map(|block| {
                let kernel = Arc::clone(kernel);
                self.submit(move || kernel.transform(&block))
            })
            .collect::<Result<Vec<_>>>()?;
        handles.into_iter().map(TaskHandle::wait).collect()
    }

    /// Submit one quantization job per block, then gather the results in order.
    pub fn quantize_batch(
        &self,
        kernel: &Arc<BlockKernel>,
        blocks: Vec<[f64; 64]>,
    ) -> Result<Vec<[i32; 64]>> {
        let handles = blocks
            .into_iter()
            .map(|coefficients| {
                let kernel = Arc::clone(kernel);
                self.submit(move || kernel.quantize(&coefficients))
            })
            .collect::<Result<Vec<_>>>()?;
        handles.into_iter().map(TaskHandle::wait).collect()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.stop = true;
        }
        self.shared.available.notify_all();

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("worker pool shut down");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.workers.len())
            .finish()
    }
}

fn worker_loop(id: usize, shared: &Shared) {
    trace!(id, "worker started");
    loop {
        let job = {
            let Ok(mut queue) = shared.queue.lock() else {
                return;
            };
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.stop {
                    trace!(id, "worker exiting");
                    return;
                }
                queue = match shared.available.wait(queue) {
                    Ok(queue) => queue,
                    Err(_) => return,
                };
            }
        };
        job();
    }
}

/// [`BlockProcessor`] backed by a [`WorkerPool`].
///
/// Blocks are extracted on the calling thread, then transformed and
/// quantized in two batches on the pool.
#[derive(Debug)]
pub struct PooledProcessor {
    pool: WorkerPool,
}

impl PooledProcessor {
    /// Pool-backed processor with `threads` workers.
    pub fn new(threads: usize) -> Result<Self> {
        Ok(Self {
            pool: WorkerPool::new(threads)?,
        })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }
}

impl BlockProcessor for PooledProcessor {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    fn process(
        &self,
        image: &PlanarImage,
        kernel: &Arc<BlockKernel>,
    ) -> Result<Vec<QuantizedBlock>> {
        let positions = block_positions(image.width(), image.height());
        let samples = positions
            .iter()
            .map(|&pos| extract_block(image, pos))
            .collect();

        let coefficients = self.pool.forward_dct_batch(kernel, samples)?;
        let quantized = self.pool.quantize_batch(kernel, coefficients)?;
        trace!(
            blocks = positions.len(),
            threads = self.pool.threads(),
            "worker pool pass"
        );

        Ok(positions
            .into_iter()
            .zip(quantized)
            .map(|(pos, coefficients)| QuantizedBlock::new(pos, coefficients))
            .collect())
    }
}
