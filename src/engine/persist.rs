//! Best-effort background persistence.
//!
//! Mutations commit to the grid cache and the broadcast synchronously; the
//! matching durable writes are queued here and executed by a single worker
//! task, in submission order, with a bounded retry policy. The outcome of each
//! job is observed only by the log and [`PersistStats`]: it never reaches the
//! client that caused the mutation, and a failure never reverts the cache.
//!
//! The queue is bounded. While the store is slow or down, jobs submitted to a
//! full queue are dropped and counted as `dropped`.
//!
//! # Examples
//!
//! ```no_run
//! use pixelwar::engine::{PersistJob, PersistQueue, RetryPolicy};
//! use pixelwar::store::MemoryStore;
//! use pixelwar::types::{Cell, CellKey};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let store = Arc::new(MemoryStore::new());
//! let (queue, _worker) = PersistQueue::spawn(store, RetryPolicy::no_retry(), 1024);
//! queue.submit(PersistJob::UpsertCell(Cell::new(CellKey::new("4,2"), "#FF0000")));
//! queue.flush().await;
//! assert_eq!(queue.stats().succeeded, 1);
//! # }
//! ```

use crate::error::PixelError;
use crate::store::DurableStore;
use crate::types::{Cell, CellKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// A durable write queued after an in-memory mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistJob {
    UpsertCell(Cell),
    DeleteCell(CellKey),
    AdjustPixels {
        wallet: String,
        delta: i64,
        create_missing: bool,
    },
}

impl PersistJob {
    fn describe(&self) -> String {
        match self {
            PersistJob::UpsertCell(cell) => format!("upsert {}", cell.key),
            PersistJob::DeleteCell(key) => format!("delete {}", key),
            PersistJob::AdjustPixels { wallet, delta, .. } => {
                format!("adjust pixels {:+} for {}", delta, wallet)
            }
        }
    }
}

/// Result of executing one job, after retries.
#[derive(Debug)]
pub enum PersistOutcome {
    Stored { attempts: u32 },
    Failed { attempts: u32, error: PixelError },
}

/// Retry behavior for failed durable writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per retry up to `max_backoff`.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Counters fed by the persistence worker.
#[derive(Debug, Default)]
pub struct PersistStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStatsSnapshot {
    pub succeeded: u64,
    pub failed: u64,
    pub retried: u64,
    /// Jobs refused because the queue was full.
    pub dropped: u64,
}

impl PersistStats {
    #[must_use]
    pub fn snapshot(&self) -> PersistStatsSnapshot {
        PersistStatsSnapshot {
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

enum Command {
    Job(PersistJob),
    Flush(oneshot::Sender<()>),
}

/// Handle to the persistence worker. Cheap to clone.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::Sender<Command>,
    stats: Arc<PersistStats>,
}

impl PersistQueue {
    /// Spawn the worker task on the current runtime, holding at most
    /// `capacity` pending commands.
    ///
    /// The worker exits once every `PersistQueue` handle has been dropped and
    /// the queue is drained.
    pub fn spawn(
        store: Arc<dyn DurableStore>,
        policy: RetryPolicy,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(PersistStats::default());
        let worker = tokio::spawn(run_worker(rx, store, policy, stats.clone()));
        (Self { tx, stats }, worker)
    }

    /// Queue a job. Never blocks and never fails the caller.
    pub fn submit(&self, job: PersistJob) {
        match self.tx.try_send(Command::Job(job)) {
            Ok(()) => {}
            Err(TrySendError::Full(Command::Job(job))) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::error!("Persistence queue full, dropping {}", job.describe());
            }
            Err(TrySendError::Closed(Command::Job(job))) => {
                tracing::error!("Persistence worker gone, dropping {}", job.describe());
            }
            Err(_) => {}
        }
    }

    /// Wait until every job submitted before this call has been executed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).await.is_err() {
            return;
        }
        let _ = done_rx.await;
    }

    #[must_use]
    pub fn stats(&self) -> PersistStatsSnapshot {
        self.stats.snapshot()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<Command>,
    store: Arc<dyn DurableStore>,
    policy: RetryPolicy,
    stats: Arc<PersistStats>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            Command::Job(job) => {
                let outcome = execute_with_retry(store.as_ref(), &job, &policy, &stats).await;
                record(&job, outcome, &stats);
            }
            Command::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    tracing::debug!("Persistence worker stopped");
}

async fn execute(store: &dyn DurableStore, job: &PersistJob) -> Result<(), PixelError> {
    match job {
        PersistJob::UpsertCell(cell) => store.upsert_cell(cell).await,
        PersistJob::DeleteCell(key) => store.delete_cell(key).await,
        PersistJob::AdjustPixels {
            wallet,
            delta,
            create_missing,
        } => {
            store
                .adjust_total_pixels(wallet, *delta, *create_missing)
                .await
        }
    }
}

async fn execute_with_retry(
    store: &dyn DurableStore,
    job: &PersistJob,
    policy: &RetryPolicy,
    stats: &PersistStats,
) -> PersistOutcome {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match execute(store, job).await {
            Ok(()) => return PersistOutcome::Stored { attempts },
            Err(error) if attempts > policy.max_retries => {
                return PersistOutcome::Failed { attempts, error };
            }
            Err(error) => {
                let delay = policy.backoff_for(attempts);
                tracing::warn!(
                    "Persist {} failed (attempt {}): {}; retrying in {:?}",
                    job.describe(),
                    attempts,
                    error,
                    delay
                );
                stats.retried.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn record(job: &PersistJob, outcome: PersistOutcome, stats: &PersistStats) {
    match outcome {
        PersistOutcome::Stored { attempts } => {
            stats.succeeded.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Persisted {} after {} attempt(s)", job.describe(), attempts);
        }
        PersistOutcome::Failed { attempts, error } => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                "Giving up on {} after {} attempt(s): {}",
                job.describe(),
                attempts,
                error
            );
        }
    }
}
