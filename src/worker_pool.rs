//! # Worker Pool Module
//!
//! A fixed set of worker threads fed from one bounded queue. Used by the
//! `pool` concurrency mode to answer connections in parallel.
//!
//! ## Features
//!
//! - **Bounded queue**: at most `queue_bound` jobs wait for a worker
//! - **Backpressure**: `block` makes the submitter wait for a free slot,
//!   `shed` hands the job straight back so the caller can refuse it
//! - **Panic isolation**: a panicking job is logged and the worker carries on
//! - **Metrics**: dispatch, completion and shed counters plus queue depth
//!
//! Dropping the pool closes the queue and joins every worker after the
//! queued jobs are finished.

use crate::config::{BackpressureMode, ConcurrencyConfig};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Metrics for a worker pool
#[derive(Debug, Default)]
pub struct WorkerPoolMetrics {
    /// Jobs handed back because the queue was full
    pub shed_count: AtomicU64,
    /// Jobs queued or running (approximate)
    pub queue_depth: AtomicUsize,
    /// Total jobs accepted
    pub dispatched_count: AtomicU64,
    /// Total jobs finished, panicked ones included
    pub completed_count: AtomicU64,
}

impl WorkerPoolMetrics {
    pub fn record_shed(&self) {
        self.shed_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatched_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo a dispatch that the queue did not accept.
    pub fn record_rejected(&self) {
        self.dispatched_count.fetch_sub(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_completion(&self) {
        self.completed_count.fetch_add(1, Ordering::Relaxed);
        self.queue_depth.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_shed_count(&self) -> u64 {
        self.shed_count.load(Ordering::Relaxed)
    }

    pub fn get_queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    pub fn get_dispatched_count(&self) -> u64 {
        self.dispatched_count.load(Ordering::Relaxed)
    }

    pub fn get_completed_count(&self) -> u64 {
        self.completed_count.load(Ordering::Relaxed)
    }
}

/// A bounded pool of worker threads running `handler` on each job.
pub struct WorkerPool<J: Send + 'static> {
    sender: Option<SyncSender<J>>,
    workers: Vec<JoinHandle<()>>,
    backpressure: BackpressureMode,
    metrics: Arc<WorkerPoolMetrics>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Spawn `config.workers` threads sharing one queue of `config.queue_bound` slots.
    pub fn new<F>(name: &str, config: &ConcurrencyConfig, handler: F) -> std::io::Result<Self>
    where
        F: Fn(J) + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::sync_channel::<J>(config.queue_bound);
        let rx = Arc::new(Mutex::new(rx));
        let handler = Arc::new(handler);
        let metrics = Arc::new(WorkerPoolMetrics::default());

        info!(
            pool = %name,
            num_workers = config.workers,
            queue_bound = config.queue_bound,
            backpressure_mode = ?config.backpressure,
            "Creating worker pool"
        );

        let mut workers = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            let metrics = Arc::clone(&metrics);
            let worker = thread::Builder::new()
                .name(format!("{name}-worker-{worker_id}"))
                .spawn(move || worker_loop(worker_id, &rx, handler.as_ref(), &metrics))?;
            workers.push(worker);
        }

        Ok(Self {
            sender: Some(tx),
            workers,
            backpressure: config.backpressure,
            metrics,
        })
    }

    /// Queue a job.
    ///
    /// In `shed` mode a full queue returns the job as `Err` without waiting.
    /// `Err` is also returned if every worker has exited.
    pub fn submit(&self, job: J) -> Result<(), J> {
        let Some(sender) = &self.sender else {
            return Err(job);
        };
        // Counted before sending; a worker may finish the job before send returns.
        self.metrics.record_dispatch();
        let result = match self.backpressure {
            BackpressureMode::Block => sender.send(job).map_err(|e| e.0),
            BackpressureMode::Shed => sender.try_send(job).map_err(|e| match e {
                TrySendError::Full(job) => {
                    self.metrics.record_shed();
                    job
                }
                TrySendError::Disconnected(job) => {
                    error!("Worker pool channel disconnected");
                    job
                }
            }),
        };
        if result.is_err() {
            self.metrics.record_rejected();
        }
        result
    }

    pub fn metrics(&self) -> &Arc<WorkerPoolMetrics> {
        &self.metrics
    }
}

impl<J: Send + 'static> Drop for WorkerPool<J> {
    fn drop(&mut self) {
        // Closing the queue lets each worker drain it and exit.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("Worker thread terminated abnormally");
            }
        }
    }
}

fn worker_loop<J>(
    worker_id: usize,
    rx: &Mutex<Receiver<J>>,
    handler: &(dyn Fn(J) + Send + Sync),
    metrics: &WorkerPoolMetrics,
) {
    debug!(worker_id = worker_id, "Worker started");
    loop {
        // The guard is dropped before the job runs so other workers can dequeue.
        let next = {
            let guard = rx.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.recv()
        };
        let Ok(job) = next else {
            break;
        };
        if let Err(panic) =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(job)))
        {
            error!(
                worker_id = worker_id,
                panic_message = ?panic,
                "Job panicked"
            );
        }
        metrics.record_completion();
    }
    debug!(worker_id = worker_id, "Worker exiting");
}
