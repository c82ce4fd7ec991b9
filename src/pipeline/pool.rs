//! The bounded executor that fans one sampled step's compression jobs out
//! across worker threads.
//!
//! The pool is sized once per engine run from the lattice size, because below a
//! certain lattice size the per-job work is too small to amortize a thread
//! hand-off. Jobs of one batch are independent; results come back in
//! submission order regardless of completion order.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::complexity::{estimate, Payload};
use crate::error::CoffeeError;
use crate::kernels::BackendRegistry;
use crate::types::Backend;

/// Lattices smaller than this are always processed on one thread.
pub const PARALLEL_MIN_LATTICE: usize = 32;

/// Lattice side length "worth" one additional worker.
pub const LATTICE_PER_WORKER: usize = 10;

/// Effective concurrency for a lattice of side `n`.
///
/// `requested` is clamped to at least one. Small lattices get exactly one
/// worker; larger ones get at most one worker per `LATTICE_PER_WORKER` cells of
/// side length, and never more than were requested.
pub fn effective_workers(requested: usize, n: usize) -> usize {
    let requested = requested.max(1);
    if n < PARALLEL_MIN_LATTICE {
        return 1;
    }
    requested.min((n / LATTICE_PER_WORKER).max(1))
}

/// Requested and effective worker counts, fixed for the lifetime of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    pub requested: usize,
    pub effective: usize,
}

impl WorkerPoolConfig {
    pub fn new(requested: usize, n: usize) -> Self {
        let requested = requested.max(1);
        Self {
            requested,
            effective: effective_workers(requested, n),
        }
    }
}

/// One unit of work: an owned, immutable payload and the backend to measure it with.
#[derive(Debug, Clone)]
pub struct CompressionJob {
    pub payload: Payload,
    pub backend: Backend,
}

impl CompressionJob {
    pub fn new(payload: Payload, backend: Backend) -> Self {
        Self { payload, backend }
    }

    pub fn execute(&self, registry: &BackendRegistry) -> Result<usize, CoffeeError> {
        estimate(&self.payload, self.backend, registry)
    }
}

/// Shared state for one batch: first error wins, everyone else stops early.
struct BatchContext {
    abort_flag: AtomicBool,
    error_capture: Mutex<Option<(usize, CoffeeError)>>,
}

impl BatchContext {
    fn new() -> Self {
        Self {
            abort_flag: AtomicBool::new(false),
            error_capture: Mutex::new(None),
        }
    }

    fn signal_error(&self, slot: usize, err: CoffeeError) {
        let mut guard = self.error_capture.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_none() {
            *guard = Some((slot, err));
            self.abort_flag.store(true, Ordering::SeqCst);
        }
    }

    fn is_aborted(&self) -> bool {
        self.abort_flag.load(Ordering::Relaxed)
    }

    fn take_error(self) -> Option<(usize, CoffeeError)> {
        self.error_capture
            .into_inner()
            .unwrap_or_else(|p| p.into_inner())
    }
}

/// A fixed-size pool living for one engine run.
///
/// With one effective worker no threads are spawned and jobs run inline on the
/// caller's thread.
#[derive(Debug)]
pub struct WorkerPool {
    config: WorkerPoolConfig,
    threads: Option<ThreadPool>,
}

impl WorkerPool {
    pub fn new(config: WorkerPoolConfig) -> Result<Self, CoffeeError> {
        let threads = if config.effective > 1 {
            let pool = ThreadPoolBuilder::new()
                .num_threads(config.effective)
                .thread_name(|i| format!("coffee-worker-{}", i))
                .build()?;
            Some(pool)
        } else {
            None
        };
        log_metric!(
            "event" = "worker_pool_start",
            "requested" = &config.requested,
            "effective" = &config.effective
        );
        Ok(Self { config, threads })
    }

    pub fn config(&self) -> WorkerPoolConfig {
        self.config
    }

    /// Runs every job of `batch` and returns their results in submission order.
    ///
    /// # Errors
    /// On the first failing job the remaining jobs of the batch are skipped and
    /// `CoffeeError::WorkerPool` is returned with that job's slot and cause. No
    /// partial results are returned.
    pub fn run(
        &self,
        batch: u64,
        jobs: &[CompressionJob],
        registry: &BackendRegistry,
    ) -> Result<Vec<usize>, CoffeeError> {
        let ctx = BatchContext::new();

        let run_one = |slot: usize, job: &CompressionJob| -> Option<usize> {
            if ctx.is_aborted() {
                return None;
            }
            match job.execute(registry) {
                Ok(size) => Some(size),
                Err(e) => {
                    ctx.signal_error(slot, e);
                    None
                }
            }
        };

        let results: Vec<Option<usize>> = match &self.threads {
            Some(pool) => pool.install(|| {
                jobs.par_iter()
                    .enumerate()
                    .map(|(slot, job)| run_one(slot, job))
                    .collect()
            }),
            None => jobs
                .iter()
                .enumerate()
                .map(|(slot, job)| run_one(slot, job))
                .collect(),
        };

        if let Some((slot, source)) = ctx.take_error() {
            return Err(CoffeeError::WorkerPool {
                batch,
                slot,
                source: Box::new(source),
            });
        }

        results
            .into_iter()
            .enumerate()
            .map(|(slot, r)| {
                r.ok_or_else(|| {
                    CoffeeError::InternalError(format!(
                        "job slot {} of batch {} produced no result",
                        slot, batch
                    ))
                })
            })
            .collect()
    }
}
