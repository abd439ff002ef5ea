//! Bounded worker pool driving artifact transfers.
//!
//! The engine admits planned jobs in discovery order into a
//! semaphore-bounded pool, one Tokio task per job, and waits for the
//! pool to drain. A shared cancel flag stops admission immediately,
//! lets in-flight transfers stop at their next chunk boundary, and
//! bounds the final drain with a grace deadline so a stuck connection
//! cannot hang shutdown.
//!
//! # Concurrency Model
//!
//! - Each transfer runs in its own Tokio task
//! - A semaphore permit is acquired before a job is admitted
//! - Permits are released automatically when tasks finish (RAII)
//! - Permit waits race the cancel flag so an interrupt during a
//!   full-concurrency wait breaks immediately

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::client::HttpClient;
use super::retry::RetryPolicy;
use super::transfer::{TransferJob, TransferOutcome, transfer_artifact};
use crate::progress::JobProgress;

/// Minimum allowed worker count.
const MIN_WORKERS: usize = 1;

/// Maximum allowed worker count.
const MAX_WORKERS: usize = 100;

/// Default worker count if not specified.
pub const DEFAULT_WORKERS: usize = 4;

/// Grace period for in-flight jobs to observe cancellation before the
/// pool aborts them.
const CANCEL_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Poll interval when racing permit acquisition against cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Error type for transfer engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid worker count provided.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkerCount {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Statistics from one transfer run.
///
/// Uses atomic counters for thread-safe updates from concurrent
/// transfer tasks.
#[derive(Debug, Default)]
pub struct TransferStats {
    completed: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    cancelled: AtomicUsize,
    interrupted: AtomicBool,
}

impl TransferStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transfers that streamed to completion.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Number of jobs skipped because the local file already covered
    /// the remote content.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Number of transfers that exhausted their retry budget.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Number of jobs that ended in a cancelled state.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Total jobs that reached a terminal state.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed() + self.skipped() + self.failed() + self.cancelled()
    }

    /// Returns true if the run was interrupted by the cancel flag.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Records one job's terminal state.
    pub fn record(&self, outcome: TransferOutcome) {
        let counter = match outcome {
            TransferOutcome::Completed => &self.completed,
            TransferOutcome::Skipped => &self.skipped,
            TransferOutcome::Failed => &self.failed,
            TransferOutcome::Cancelled => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }
}

/// Transfer engine running jobs under a bounded worker pool.
#[derive(Debug)]
pub struct DownloadEngine {
    /// Semaphore for concurrency control.
    semaphore: Arc<Semaphore>,
    /// Configured worker count.
    workers: usize,
    /// Retry policy for failed transfers.
    retry_policy: RetryPolicy,
}

impl DownloadEngine {
    /// Creates a new engine with the specified worker count and retry
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidWorkerCount`] if the value is
    /// outside the valid range (1-100).
    pub fn new(workers: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(EngineError::InvalidWorkerCount { value: workers });
        }

        debug!(
            workers,
            max_attempts = retry_policy.max_attempts(),
            "creating transfer engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
            retry_policy,
        })
    }

    /// Returns the configured worker count.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Runs all planned jobs to a terminal state and returns the tally.
    ///
    /// Jobs are admitted FIFO; at most `workers` transfers stream at
    /// once. When `cancel` becomes true no further job is admitted,
    /// in-flight transfers stop at their next chunk boundary, and the
    /// drain is bounded by a grace deadline.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the pool semaphore is
    /// closed. Individual transfer failures do NOT error; they are
    /// counted in the returned stats.
    pub async fn run(
        &self,
        client: &HttpClient,
        jobs: Vec<(TransferJob, JobProgress)>,
        cancel: Arc<AtomicBool>,
    ) -> Result<TransferStats, EngineError> {
        let stats = Arc::new(TransferStats::new());
        let mut handles = Vec::new();

        info!(jobs = jobs.len(), workers = self.workers, "starting transfer run");

        let mut queue = jobs.into_iter();
        while let Some((job, progress)) = queue.next() {
            if cancel.load(Ordering::SeqCst) {
                stats.set_interrupted();
                discard_remaining(job, progress, &mut queue, &stats);
                break;
            }

            // Acquire a permit, but race against the cancel flag so an
            // interrupt during a full-concurrency wait breaks immediately.
            let permit = tokio::select! {
                biased;
                () = async {
                    while !cancel.load(Ordering::SeqCst) {
                        tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
                    }
                } => None,
                result = self.semaphore.clone().acquire_owned() => {
                    Some(result.map_err(|_| EngineError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                stats.set_interrupted();
                discard_remaining(job, progress, &mut queue, &stats);
                break;
            };

            debug!(url = %job.url, "admitting transfer");

            let client = client.clone();
            let stats = Arc::clone(&stats);
            let retry_policy = self.retry_policy.clone();
            let cancel = Arc::clone(&cancel);

            handles.push(tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;
                let outcome =
                    transfer_artifact(&client, &job, &retry_policy, &progress, &cancel).await;
                stats.record(outcome);
            }));
        }

        debug!(task_count = handles.len(), "waiting for transfers to finish");

        if cancel.load(Ordering::SeqCst) {
            stats.set_interrupted();
            let deadline = tokio::time::Instant::now() + CANCEL_DRAIN_GRACE;
            for mut handle in handles {
                let now = tokio::time::Instant::now();
                if now >= deadline {
                    handle.abort();
                    continue;
                }
                match tokio::time::timeout(deadline - now, &mut handle).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!(error = %e, "transfer task panicked");
                        stats.record(TransferOutcome::Failed);
                    }
                    Err(_) => {
                        // Grace expired; abort and keep the partial file
                        // for resume on the next run.
                        handle.abort();
                    }
                }
            }
        } else {
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "transfer task panicked");
                    stats.record(TransferOutcome::Failed);
                }
            }
        }

        if cancel.load(Ordering::SeqCst) {
            stats.set_interrupted();
        }

        info!(
            completed = stats.completed(),
            skipped = stats.skipped(),
            failed = stats.failed(),
            cancelled = stats.cancelled(),
            interrupted = stats.was_interrupted(),
            "transfer run complete"
        );

        // All tasks are done, so we should hold the only reference. If
        // not, rebuild the stats from the atomic values.
        match Arc::try_unwrap(stats) {
            Ok(stats) => Ok(stats),
            Err(arc_stats) => {
                let new_stats = TransferStats::new();
                new_stats
                    .completed
                    .store(arc_stats.completed(), Ordering::SeqCst);
                new_stats
                    .skipped
                    .store(arc_stats.skipped(), Ordering::SeqCst);
                new_stats.failed.store(arc_stats.failed(), Ordering::SeqCst);
                new_stats
                    .cancelled
                    .store(arc_stats.cancelled(), Ordering::SeqCst);
                if arc_stats.was_interrupted() {
                    new_stats.set_interrupted();
                }
                Ok(new_stats)
            }
        }
    }
}

/// Marks a job and everything still queued behind it as cancelled.
fn discard_remaining(
    job: TransferJob,
    progress: JobProgress,
    queue: &mut std::vec::IntoIter<(TransferJob, JobProgress)>,
    stats: &TransferStats,
) {
    debug!(url = %job.url, "cancelled before admission");
    progress.abandon();
    stats.record(TransferOutcome::Cancelled);
    for (job, progress) in queue.by_ref() {
        debug!(url = %job.url, "cancelled before admission");
        progress.abandon();
        stats.record(TransferOutcome::Cancelled);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_new_valid_worker_counts() {
        let engine = DownloadEngine::new(1, RetryPolicy::default()).unwrap();
        assert_eq!(engine.workers(), 1);

        let engine = DownloadEngine::new(4, RetryPolicy::default()).unwrap();
        assert_eq!(engine.workers(), 4);

        let engine = DownloadEngine::new(100, RetryPolicy::default()).unwrap();
        assert_eq!(engine.workers(), 100);
    }

    #[test]
    fn test_engine_new_invalid_worker_count_zero() {
        let result = DownloadEngine::new(0, RetryPolicy::default());
        assert!(matches!(
            result,
            Err(EngineError::InvalidWorkerCount { value: 0 })
        ));
    }

    #[test]
    fn test_engine_new_invalid_worker_count_too_high() {
        let result = DownloadEngine::new(101, RetryPolicy::default());
        assert!(matches!(
            result,
            Err(EngineError::InvalidWorkerCount { value: 101 })
        ));
    }

    #[test]
    fn test_engine_stores_retry_policy() {
        let engine = DownloadEngine::new(4, RetryPolicy::with_max_attempts(7)).unwrap();
        assert_eq!(engine.retry_policy().max_attempts(), 7);
    }

    #[test]
    fn test_transfer_stats_records_outcomes() {
        let stats = TransferStats::new();
        stats.record(TransferOutcome::Completed);
        stats.record(TransferOutcome::Completed);
        stats.record(TransferOutcome::Skipped);
        stats.record(TransferOutcome::Failed);
        stats.record(TransferOutcome::Cancelled);

        assert_eq!(stats.completed(), 2);
        assert_eq!(stats.skipped(), 1);
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.cancelled(), 1);
        assert_eq!(stats.total(), 5);
        assert!(!stats.was_interrupted());
    }

    #[test]
    fn test_transfer_stats_thread_safe() {
        use std::thread;

        let stats = Arc::new(TransferStats::new());
        let mut handles = Vec::new();

        for _ in 0..10 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    stats.record(TransferOutcome::Completed);
                    stats.record(TransferOutcome::Failed);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.completed(), 1000);
        assert_eq!(stats.failed(), 1000);
        assert_eq!(stats.total(), 2000);
    }

    #[test]
    fn test_engine_error_display() {
        let error = EngineError::InvalidWorkerCount { value: 0 };
        let msg = error.to_string();
        assert!(msg.contains("invalid worker count"));
        assert!(msg.contains('0'));
    }

    #[test]
    fn test_default_workers_constant() {
        assert_eq!(DEFAULT_WORKERS, 4);
    }
}
