//! HTTP client, size probing, resumable transfers, and the bounded
//! worker pool.
//!
//! # Features
//!
//! - Streaming transfers (memory-efficient for large wheels)
//! - Resume via `Range` requests, with restart when the server ignores
//!   the range
//! - Remote-size probing through an ordered fallback chain
//! - Whole-attempt retry with capped exponential backoff
//! - Semaphore-bounded concurrency with cooperative cancellation

pub mod constants;

mod client;
mod engine;
mod error;
mod probe;
mod retry;
mod transfer;

pub use client::HttpClient;
pub use engine::{DEFAULT_WORKERS, DownloadEngine, EngineError, TransferStats};
pub use error::DownloadError;
pub use probe::probe_size;
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryDecision, RetryPolicy, backoff_sleep};
pub use transfer::{TransferJob, TransferOutcome, transfer_artifact};
