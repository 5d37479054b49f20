//! Exit code logic for the dumpany process.
//!
//! Single responsibility: map a run summary to the process exit outcome.

use dumpany_core::RunSummary;

use crate::ProcessExit;

/// Determines the process exit outcome from succeeded and failed counts.
///
/// Skipped documents count as succeeded; an aborted company counts as a
/// failure even when none of its documents did.
pub(crate) fn determine_exit_outcome(succeeded: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

pub(crate) fn exit_outcome_for(summary: &RunSummary) -> ProcessExit {
    if summary.cancelled {
        return ProcessExit::Failure;
    }
    determine_exit_outcome(
        summary.total_fetched() + summary.total_skipped(),
        summary.total_failed() + summary.aborted_count(),
    )
}
