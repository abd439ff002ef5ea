//! Exit code logic for the nightly-fetch process.
//!
//! Single responsibility: map a finished run's tally to the process exit
//! outcome. Interruption takes precedence over everything else so a
//! cancelled run is always distinguishable from a normal completion.

use nightly_fetch_core::TransferStats;

/// Terminal process outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Every job completed or was skipped (includes the empty run).
    Success,
    /// Every job that ran failed.
    Failure,
    /// Some jobs completed, some failed.
    Partial,
    /// The run was cut short by a cancellation signal.
    Interrupted,
}

impl ProcessExit {
    /// The process exit code for this outcome.
    ///
    /// 130 follows the shell convention for termination by SIGINT.
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
            Self::Interrupted => 130,
        }
    }
}

/// Determines the process exit outcome from a run's transfer stats.
pub(crate) fn determine_exit_outcome(stats: &TransferStats) -> ProcessExit {
    if stats.was_interrupted() || stats.cancelled() > 0 {
        ProcessExit::Interrupted
    } else if stats.failed() == 0 {
        ProcessExit::Success
    } else if stats.completed() + stats.skipped() > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

#[cfg(test)]
mod tests {
    use nightly_fetch_core::{TransferOutcome, TransferStats};

    use super::{ProcessExit, determine_exit_outcome};

    fn stats_with(outcomes: &[TransferOutcome]) -> TransferStats {
        let stats = TransferStats::new();
        for outcome in outcomes {
            stats.record(*outcome);
        }
        stats
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        let stats = stats_with(&[
            TransferOutcome::Completed,
            TransferOutcome::Completed,
            TransferOutcome::Skipped,
        ]);
        assert_eq!(determine_exit_outcome(&stats), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_success_on_empty_run() {
        let stats = TransferStats::new();
        assert_eq!(determine_exit_outcome(&stats), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        let stats = stats_with(&[TransferOutcome::Completed, TransferOutcome::Failed]);
        assert_eq!(determine_exit_outcome(&stats), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_skip_counts_toward_partial() {
        let stats = stats_with(&[TransferOutcome::Skipped, TransferOutcome::Failed]);
        assert_eq!(determine_exit_outcome(&stats), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        let stats = stats_with(&[TransferOutcome::Failed, TransferOutcome::Failed]);
        assert_eq!(determine_exit_outcome(&stats), ProcessExit::Failure);
    }

    #[test]
    fn test_exit_outcome_interrupted_takes_precedence() {
        let stats = stats_with(&[
            TransferOutcome::Completed,
            TransferOutcome::Failed,
            TransferOutcome::Cancelled,
        ]);
        assert_eq!(determine_exit_outcome(&stats), ProcessExit::Interrupted);
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        assert_eq!(ProcessExit::Success.code(), 0);
        assert_eq!(ProcessExit::Failure.code(), 1);
        assert_eq!(ProcessExit::Partial.code(), 2);
        assert_eq!(ProcessExit::Interrupted.code(), 130);
    }
}
