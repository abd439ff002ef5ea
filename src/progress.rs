//! Byte-progress aggregation across concurrent transfers.
//!
//! The aggregator owns monotonic run-wide counters and hands out one
//! [`JobProgress`] handle per transfer. Handles advance their own and
//! the run-wide counters atomically, so any number of workers can report
//! without losing updates. Rendering through indicatif is optional; the
//! counter semantics are identical with rendering on or off.
//!
//! The aggregate total is undefined (`None`) while any registered job
//! has an unknown remote size; per-job progress is always well-defined.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

struct AggregatorShared {
    multi: Option<MultiProgress>,
    overall: Option<ProgressBar>,
    bytes_done: AtomicU64,
    known_total: AtomicU64,
    unknown_jobs: AtomicUsize,
}

/// Run-wide progress state, shared by all transfer jobs.
pub struct ProgressAggregator {
    shared: Arc<AggregatorShared>,
}

impl ProgressAggregator {
    /// Creates an aggregator without any terminal rendering.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            shared: Arc::new(AggregatorShared {
                multi: None,
                overall: None,
                bytes_done: AtomicU64::new(0),
                known_total: AtomicU64::new(0),
                unknown_jobs: AtomicUsize::new(0),
            }),
        }
    }

    /// Creates an aggregator that renders an overall bar plus one bar
    /// per registered job.
    #[must_use]
    pub fn with_render() -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(overall_style());
        overall.set_message("overall");
        overall.enable_steady_tick(Duration::from_millis(100));
        Self {
            shared: Arc::new(AggregatorShared {
                multi: Some(multi),
                overall: Some(overall),
                bytes_done: AtomicU64::new(0),
                known_total: AtomicU64::new(0),
                unknown_jobs: AtomicUsize::new(0),
            }),
        }
    }

    /// Registers a job with an optional known total and returns its
    /// progress handle.
    #[must_use]
    pub fn register(&self, label: &str, total: Option<u64>) -> JobProgress {
        match total {
            Some(n) => {
                self.shared.known_total.fetch_add(n, Ordering::SeqCst);
                if let Some(overall) = &self.shared.overall {
                    overall.inc_length(n);
                }
            }
            None => {
                self.shared.unknown_jobs.fetch_add(1, Ordering::SeqCst);
            }
        }
        let bar = self.shared.multi.as_ref().map(|multi| {
            let bar = match total {
                Some(n) => {
                    let bar = ProgressBar::new(n);
                    bar.set_style(file_bar_style());
                    bar
                }
                None => {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(file_spinner_style());
                    bar
                }
            };
            bar.set_message(label.to_string());
            multi.add(bar)
        });
        JobProgress {
            shared: Arc::clone(&self.shared),
            bar,
            done: AtomicU64::new(0),
            total,
        }
    }

    /// Total bytes transferred (or credited from resumable local files)
    /// so far.
    #[must_use]
    pub fn bytes_completed(&self) -> u64 {
        self.shared.bytes_done.load(Ordering::SeqCst)
    }

    /// Sum of the known job sizes, or `None` while any registered job
    /// has an unknown size.
    #[must_use]
    pub fn bytes_total(&self) -> Option<u64> {
        if self.shared.unknown_jobs.load(Ordering::SeqCst) > 0 {
            None
        } else {
            Some(self.shared.known_total.load(Ordering::SeqCst))
        }
    }

    /// Finishes the overall bar, leaving the final counts on screen.
    pub fn finish(&self) {
        if let Some(overall) = &self.shared.overall {
            overall.finish();
        }
    }
}

/// Per-job progress handle; advances both the job and run-wide counters.
pub struct JobProgress {
    shared: Arc<AggregatorShared>,
    bar: Option<ProgressBar>,
    done: AtomicU64,
    total: Option<u64>,
}

impl JobProgress {
    /// Credits `n` freshly transferred bytes.
    pub fn advance(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.done.fetch_add(n, Ordering::SeqCst);
        self.shared.bytes_done.fetch_add(n, Ordering::SeqCst);
        if let Some(bar) = &self.bar {
            bar.inc(n);
        }
        if let Some(overall) = &self.shared.overall {
            overall.inc(n);
        }
    }

    /// Reconciles the credited count with the bytes actually on disk.
    ///
    /// Advancing credits resume bytes exactly once; deducting covers a
    /// forced restart after the server ignored a range request.
    pub fn sync_to(&self, on_disk: u64) {
        let done = self.done.load(Ordering::SeqCst);
        if on_disk > done {
            self.advance(on_disk - done);
        } else if on_disk < done {
            self.deduct(done - on_disk);
        }
    }

    /// Drops every byte credited to this job (restart from zero).
    pub fn rollback(&self) {
        self.sync_to(0);
    }

    /// Bytes credited to this job so far.
    #[must_use]
    pub fn completed(&self) -> u64 {
        self.done.load(Ordering::SeqCst)
    }

    /// Marks the job finished.
    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }

    /// Marks the job skipped, crediting the bytes already on disk (the
    /// known total when available) so an unchanged directory reads as
    /// complete.
    pub fn finish_skipped(&self, existing_bytes: u64) {
        self.sync_to(self.total.unwrap_or(existing_bytes));
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }

    /// Leaves the bar in place without completing it (failed or
    /// cancelled job).
    pub fn abandon(&self) {
        if let Some(bar) = &self.bar {
            bar.abandon();
        }
    }

    fn deduct(&self, n: u64) {
        self.done.fetch_sub(n, Ordering::SeqCst);
        self.shared.bytes_done.fetch_sub(n, Ordering::SeqCst);
        if let Some(bar) = &self.bar {
            bar.set_position(self.done.load(Ordering::SeqCst));
        }
        if let Some(overall) = &self.shared.overall {
            overall.set_position(self.shared.bytes_done.load(Ordering::SeqCst));
        }
    }
}

fn overall_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn file_bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{bar:40} {msg} {bytes}/{total_bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn file_spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner} {msg} {bytes} ({bytes_per_sec})")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}
