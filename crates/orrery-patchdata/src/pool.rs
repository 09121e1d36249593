//! Background loader threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::debug;

use crate::{DataLoader, HeightStats, LoadError, LoadRequest, PatchTexture};

/// A load and where to deliver its result.
#[derive(Debug)]
pub struct LoadJob {
    pub request: LoadRequest,
    pub reply: Sender<LoadResult>,
}

/// A finished load. Statistics are computed on the loader thread.
#[derive(Debug)]
pub struct LoadResult {
    pub request: LoadRequest,
    pub outcome: Result<(PatchTexture, Option<HeightStats>), LoadError>,
    pub load_time_us: u64,
}

/// Fixed set of named worker threads fed by a bounded queue.
///
/// Dropping the pool closes the queue; workers exit after their current job.
pub struct LoaderPool {
    sender: Sender<LoadJob>,
    in_flight: Arc<AtomicU64>,
    workers: usize,
}

impl LoaderPool {
    /// Spawn `workers` threads; `0` picks one less than the CPU count.
    pub fn new(workers: usize, capacity: usize, loader: Arc<dyn DataLoader>) -> Self {
        let workers = if workers == 0 {
            num_cpus::get().saturating_sub(1).max(1)
        } else {
            workers
        };
        let (sender, receiver) = bounded::<LoadJob>(capacity.max(1));
        let in_flight = Arc::new(AtomicU64::new(0));

        for i in 0..workers {
            let receiver: Receiver<LoadJob> = receiver.clone();
            let loader = Arc::clone(&loader);
            let in_flight = Arc::clone(&in_flight);
            std::thread::Builder::new()
                .name(format!("patch-loader-{i}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        let start = Instant::now();
                        let outcome = loader.load(&job.request).map(|texture| {
                            let stats = texture.height_stats();
                            (texture, stats)
                        });
                        let load_time_us = start.elapsed().as_micros() as u64;
                        in_flight.fetch_sub(1, Ordering::Relaxed);
                        // The store may be gone; its results are moot then.
                        let _ = job.reply.send(LoadResult {
                            request: job.request,
                            outcome,
                            load_time_us,
                        });
                    }
                })
                .expect("Failed to spawn patch loader thread");
        }
        debug!(workers, capacity, "patch loader pool started");

        Self {
            sender,
            in_flight,
            workers,
        }
    }

    /// Queue a job without blocking; hands the job back when the queue is full.
    #[allow(clippy::result_large_err)]
    pub fn submit(&self, job: LoadJob) -> Result<(), LoadJob> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.sender.try_send(job).map_err(|e| {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            e.into_inner()
        })
    }

    /// Jobs queued or running.
    pub fn in_flight(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl std::fmt::Debug for LoaderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderPool")
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
