//! Resumable transfer of one artifact to one local path.
//!
//! Each job checks the local file first, resumes with a `Range` request
//! when a partial file exists, restarts from zero when the server
//! answers 200 to a ranged request, and retries whole attempts with
//! backoff. Cancellation is observed between chunks and leaves the
//! partial file in place for a future resume.
//!
//! Every URL reaching this module has already passed filename and
//! interpreter-tag filtering; nothing is re-filtered here.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use reqwest::StatusCode;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, warn};
use url::Url;

use super::client::HttpClient;
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy, backoff_sleep};
use crate::discover::ArtifactLink;
use crate::progress::JobProgress;

/// One planned artifact transfer.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Fully-qualified artifact URL.
    pub url: String,
    /// Local destination path.
    pub dest: PathBuf,
    /// Remote size when the probe resolved one.
    pub expected_size: Option<u64>,
}

impl TransferJob {
    /// Plans the local destination for a discovered artifact:
    /// `{download_dir}/{date}/{build}/{filename}`.
    #[must_use]
    pub fn plan(link: &ArtifactLink, expected_size: Option<u64>, download_dir: &Path) -> Self {
        let dest = download_dir
            .join(link.date.as_str())
            .join(link.build.trim_matches('/'))
            .join(&link.filename);
        Self {
            url: link.url.clone(),
            dest,
            expected_size,
        }
    }
}

/// Terminal state of one transfer job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Stream ended without error.
    Completed,
    /// Local file already covers the remote content, or the remote size
    /// is unknown and a local file exists.
    Skipped,
    /// Retry budget exhausted.
    Failed,
    /// Cancellation observed before completion; partial file kept.
    Cancelled,
}

/// Result of checking the local file against the probed remote size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LocalState {
    /// Nothing left to transfer; keep the file untouched.
    Complete(u64),
    /// Transfer starting at this offset (0 for a fresh file).
    Resume(u64),
}

fn inspect_local(dest: &Path, expected_size: Option<u64>) -> LocalState {
    let Ok(meta) = std::fs::metadata(dest) else {
        return LocalState::Resume(0);
    };
    let local = meta.len();
    match expected_size {
        // Remote size unknown: never overwrite an existing file.
        None => LocalState::Complete(local),
        Some(remote) if local >= remote => LocalState::Complete(local),
        Some(_) => LocalState::Resume(local),
    }
}

enum AttemptEnd {
    Complete,
    Cancelled,
}

/// Transfers one artifact to its planned destination.
///
/// Individual failures never propagate as errors; the outcome captures
/// the terminal state and details are logged along the way.
pub async fn transfer_artifact(
    client: &HttpClient,
    job: &TransferJob,
    policy: &RetryPolicy,
    progress: &JobProgress,
    cancel: &AtomicBool,
) -> TransferOutcome {
    if cancel.load(Ordering::SeqCst) {
        return TransferOutcome::Cancelled;
    }

    if Url::parse(&job.url).is_err() {
        warn!(error = %DownloadError::invalid_url(&job.url), "rejecting job");
        progress.abandon();
        return TransferOutcome::Failed;
    }

    if let LocalState::Complete(existing) = inspect_local(&job.dest, job.expected_size) {
        info!(
            path = %job.dest.display(),
            bytes = existing,
            "skipping, local file already present"
        );
        progress.finish_skipped(existing);
        return TransferOutcome::Skipped;
    }

    if let Some(parent) = job.dest.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %job.dest.display(), error = %e, "failed to create artifact directory");
            progress.abandon();
            return TransferOutcome::Failed;
        }
    }

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match attempt_transfer(client, job, progress, cancel).await {
            Ok(AttemptEnd::Complete) => {
                info!(url = %job.url, path = %job.dest.display(), "download complete");
                progress.finish();
                return TransferOutcome::Completed;
            }
            Ok(AttemptEnd::Cancelled) => {
                info!(url = %job.url, "transfer cancelled, partial file kept");
                progress.abandon();
                return TransferOutcome::Cancelled;
            }
            Err(e) => match policy.should_retry(attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    warn!(
                        url = %job.url,
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "transfer failed, retrying"
                    );
                    if backoff_sleep(delay, cancel).await {
                        progress.abandon();
                        return TransferOutcome::Cancelled;
                    }
                }
                RetryDecision::DoNotRetry { .. } => {
                    warn!(
                        url = %job.url,
                        attempts = attempt,
                        error = %e,
                        "transfer failed after all attempts"
                    );
                    progress.abandon();
                    return TransferOutcome::Failed;
                }
            },
        }
    }
}

async fn attempt_transfer(
    client: &HttpClient,
    job: &TransferJob,
    progress: &JobProgress,
    cancel: &AtomicBool,
) -> Result<AttemptEnd, DownloadError> {
    // Re-derive the resume offset from disk so every attempt appends in
    // strictly increasing offset order and bytes are credited once.
    let offset = tokio::fs::metadata(&job.dest)
        .await
        .map(|meta| meta.len())
        .unwrap_or(0);
    progress.sync_to(offset);

    if cancel.load(Ordering::SeqCst) {
        return Ok(AttemptEnd::Cancelled);
    }

    let response = client.get_streaming(&job.url, offset).await?;
    let status = response.status();

    let mut file = if offset > 0 && status == StatusCode::PARTIAL_CONTENT {
        info!(path = %job.dest.display(), offset, "resuming partial download");
        OpenOptions::new()
            .append(true)
            .open(&job.dest)
            .await
            .map_err(|e| DownloadError::io(job.dest.clone(), e))?
    } else {
        if offset > 0 {
            // Server answered a ranged request with the full body: the
            // credited resume bytes are void.
            warn!(
                path = %job.dest.display(),
                "server does not support resume, restarting from zero"
            );
            progress.rollback();
        }
        File::create(&job.dest)
            .await
            .map_err(|e| DownloadError::io(job.dest.clone(), e))?
    };

    let mut writer = BufWriter::new(&mut file);
    let mut stream = response.bytes_stream();

    while let Some(chunk_result) = stream.next().await {
        let chunk = match chunk_result {
            Ok(chunk) => chunk,
            Err(e) => {
                // Keep whatever reached the disk for the next attempt.
                let _ = writer.flush().await;
                return Err(DownloadError::network(&job.url, e));
            }
        };
        if cancel.load(Ordering::SeqCst) {
            let _ = writer.flush().await;
            return Ok(AttemptEnd::Cancelled);
        }
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(job.dest.clone(), e))?;
        progress.advance(chunk.len() as u64);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(job.dest.clone(), e))?;
    Ok(AttemptEnd::Complete)
}
