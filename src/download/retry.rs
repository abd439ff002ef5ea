//! Retry policy with capped exponential backoff for mirror requests.
//!
//! Page fetches, size probes, and artifact transfers all share the same
//! attempt contract: try, and on error either back off and try again or
//! give up once the attempt budget is spent. Mirror failures are treated
//! as transient across the board, so the policy only tracks attempt
//! counts and delays.
//!
//! # Delay Calculation
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + jitter_step * attempt
//! ```
//!
//! The linear jitter term spreads out herds of workers that fail at the
//! same moment without making delays unpredictable in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::debug;

/// Default maximum attempts (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default base delay for the first retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default cap on the exponential component.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default per-attempt linear jitter step.
const DEFAULT_JITTER_STEP: Duration = Duration::from_millis(200);

/// Poll interval for cancellation checks while sleeping.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Decision on whether to retry a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior.
///
/// # Default Values
///
/// - `max_attempts`: 4
/// - `base_delay`: 1 second
/// - `max_delay`: 30 seconds
/// - `jitter_step`: 200 milliseconds per attempt
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    max_attempts: u32,

    /// Base delay for the first retry.
    base_delay: Duration,

    /// Cap applied to the exponential component.
    max_delay: Duration,

    /// Linear jitter added per attempt.
    jitter_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter_step: DEFAULT_JITTER_STEP,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter_step: Duration,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            jitter_step,
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults otherwise.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry after the given attempt failed.
    ///
    /// `attempt` is the attempt number that just failed (1-indexed).
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.delay_for(attempt);

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Calculates the backoff delay for a just-failed attempt (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let exponential = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);
        exponential + self.jitter_step.saturating_mul(attempt)
    }
}

/// Sleeps for `delay`, waking early when the cancel flag is set.
///
/// Returns `true` when the sleep was cut short by cancellation.
pub async fn backoff_sleep(delay: Duration, cancel: &AtomicBool) -> bool {
    let deadline = tokio::time::Instant::now() + delay;
    while tokio::time::Instant::now() < deadline {
        if cancel.load(Ordering::SeqCst) {
            return true;
        }
        let remaining = deadline - tokio::time::Instant::now();
        tokio::time::sleep(remaining.min(CANCEL_POLL_INTERVAL)).await;
    }
    cancel.load(Ordering::SeqCst)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        assert_eq!(policy.jitter_step, Duration::from_millis(200));
    }

    #[test]
    fn test_retry_policy_max_attempts_minimum_is_one() {
        let policy = RetryPolicy::with_max_attempts(0);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(
            5,
            Duration::from_secs(1),
            Duration::from_secs(30),
            Duration::from_millis(200),
        );
        // attempt 1: 1s + 200ms, attempt 2: 2s + 400ms, attempt 3: 4s + 600ms
        assert_eq!(policy.delay_for(1), Duration::from_millis(1200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4600));
    }

    #[test]
    fn test_delay_respects_cap() {
        let policy = RetryPolicy::new(
            10,
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_millis(200),
        );
        // attempt 6 would be 32s exponential, capped at 5s plus jitter
        assert_eq!(policy.delay_for(6), Duration::from_millis(6200));
    }

    #[test]
    fn test_delay_huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::default();
        let delay = policy.delay_for(u32::MAX);
        assert!(delay >= policy.max_delay);
    }

    #[test]
    fn test_should_retry_below_budget() {
        let policy = RetryPolicy::with_max_attempts(3);
        let decision = policy.should_retry(1);
        assert!(matches!(decision, RetryDecision::Retry { attempt: 2, .. }));
    }

    #[test]
    fn test_should_retry_exhausted_budget() {
        let policy = RetryPolicy::with_max_attempts(3);
        let decision = policy.should_retry(3);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
        if let RetryDecision::DoNotRetry { reason } = decision {
            assert!(reason.contains("exhausted"));
        }
    }

    #[test]
    fn test_should_retry_delay_increases() {
        let policy = RetryPolicy::default();
        let (d1, d2) = match (policy.should_retry(1), policy.should_retry(2)) {
            (
                RetryDecision::Retry { delay: d1, .. },
                RetryDecision::Retry { delay: d2, .. },
            ) => (d1, d2),
            other => panic!("expected two Retry decisions, got {other:?}"),
        };
        assert!(d2 > d1);
    }

    #[tokio::test]
    async fn test_backoff_sleep_returns_false_without_cancel() {
        let cancel = AtomicBool::new(false);
        let cancelled = backoff_sleep(Duration::from_millis(5), &cancel).await;
        assert!(!cancelled);
    }

    #[tokio::test]
    async fn test_backoff_sleep_observes_preset_cancel() {
        let cancel = AtomicBool::new(true);
        let start = std::time::Instant::now();
        let cancelled = backoff_sleep(Duration::from_secs(10), &cancel).await;
        assert!(cancelled);
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
