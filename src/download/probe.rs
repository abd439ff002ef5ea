//! Remote size probing via an ordered chain of HTTP techniques.
//!
//! Mirrors differ in what they disclose: some answer HEAD with a
//! `Content-Length`, some only report a total through `Content-Range`
//! on a ranged request, and some only attach headers to a full GET.
//! The chain tries each technique in order and settles for "unknown"
//! when none of them produce a length.

use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, HeaderValue};
use tracing::{debug, warn};

use super::client::HttpClient;
use super::error::DownloadError;
use super::retry::{RetryDecision, RetryPolicy, backoff_sleep};

/// One probing technique in the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeStrategy {
    /// HEAD request; read the declared `Content-Length`.
    Head,
    /// `bytes=0-0` range request; parse the `Content-Range` total.
    FirstByteRange,
    /// Plain GET; read `Content-Length` from the headers without
    /// consuming the body.
    StreamingGet,
}

const STRATEGIES: [ProbeStrategy; 3] = [
    ProbeStrategy::Head,
    ProbeStrategy::FirstByteRange,
    ProbeStrategy::StreamingGet,
];

/// Determines the remote byte length of `url`.
///
/// Techniques run in order and the first that yields a length wins. A
/// technique that errors is retried with backoff up to the policy budget
/// before the chain falls through to the next one; a technique that
/// answers without disclosing a length falls through immediately.
///
/// Returns `None` when the chain is exhausted or the run is cancelled.
/// Unknown is terminal for the run and must never be treated as zero.
pub async fn probe_size(
    client: &HttpClient,
    url: &str,
    policy: &RetryPolicy,
    cancel: &AtomicBool,
) -> Option<u64> {
    for strategy in STRATEGIES {
        let mut attempt = 0u32;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return None;
            }
            attempt += 1;
            match probe_once(client, url, strategy).await {
                Ok(Some(size)) => {
                    debug!(url, size, ?strategy, "remote size resolved");
                    return Some(size);
                }
                // Answered without a length; move on to the next technique.
                Ok(None) => break,
                Err(e) => match policy.should_retry(attempt) {
                    RetryDecision::Retry { delay, .. } => {
                        debug!(url, ?strategy, attempt, error = %e, "size probe failed, retrying");
                        if backoff_sleep(delay, cancel).await {
                            return None;
                        }
                    }
                    RetryDecision::DoNotRetry { .. } => {
                        debug!(url, ?strategy, error = %e, "size probe technique exhausted");
                        break;
                    }
                },
            }
        }
    }
    warn!(url, "remote size unknown after all probe techniques");
    None
}

async fn probe_once(
    client: &HttpClient,
    url: &str,
    strategy: ProbeStrategy,
) -> Result<Option<u64>, DownloadError> {
    match strategy {
        ProbeStrategy::Head => {
            let response = client.head_identity(url).await?;
            if !response.status().is_success() {
                return Ok(None);
            }
            Ok(header_u64(response.headers().get(CONTENT_LENGTH)))
        }
        ProbeStrategy::FirstByteRange => {
            let response = client.get_first_byte(url).await?;
            Ok(response
                .headers()
                .get(CONTENT_RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(content_range_total))
        }
        ProbeStrategy::StreamingGet => {
            let response = client.get_identity(url).await?;
            if !response.status().is_success() {
                return Ok(None);
            }
            Ok(header_u64(response.headers().get(CONTENT_LENGTH)))
        }
    }
}

/// Parses the total from a `Content-Range: bytes <start>-<end>/<total>`
/// header value. A `*` total means the server does not know the size.
fn content_range_total(value: &str) -> Option<u64> {
    let total = value.rsplit('/').next()?.trim();
    if total == "*" {
        return None;
    }
    total.parse().ok()
}

fn header_u64(value: Option<&HeaderValue>) -> Option<u64> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_range_total_parses_declared_size() {
        assert_eq!(content_range_total("bytes 0-0/4096"), Some(4096));
    }

    #[test]
    fn test_content_range_total_star_is_unknown() {
        assert_eq!(content_range_total("bytes 0-0/*"), None);
    }

    #[test]
    fn test_content_range_total_garbage_is_unknown() {
        assert_eq!(content_range_total("bytes 0-0/abc"), None);
        assert_eq!(content_range_total(""), None);
    }

    #[test]
    fn test_header_u64_parses_and_rejects() {
        let value = HeaderValue::from_static("1234");
        assert_eq!(header_u64(Some(&value)), Some(1234));
        let bad = HeaderValue::from_static("not-a-number");
        assert_eq!(header_u64(Some(&bad)), None);
        assert_eq!(header_u64(None), None);
    }
}
