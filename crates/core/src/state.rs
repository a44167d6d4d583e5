//! Job lifecycle state machine.
//!
//! The job status column stores [`JobState::as_str`] values. All mutation
//! goes through [`apply`]: given the current state and an event it either
//! returns the successor state or rejects the event with
//! [`CoreError::InvalidTransition`] and no side effect.
//!
//! Re-delivered events are tolerated: applying an event whose target
//! equals the current state is a no-op, so a worker crash followed by a
//! redelivery cannot advance a job twice.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Lifecycle state of a personalization job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    PendingAnalysis,
    Analyzing,
    AnalyzingCompleted,
    PrepayPending,
    PrepayGenerating,
    PrepayReady,
    Confirmed,
    PostpayGenerating,
    Completed,
    AnalysisFailed,
    GenerationFailed,
    Cancelled,
}

/// Events that drive the state machine. Only pipeline stages (and the
/// transition-request operations in §external interfaces) emit these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    StartAnalysis,
    AnalysisSucceeded,
    AnalysisFailed,
    ConfirmDetails,
    StartPrepayGeneration,
    Regenerate,
    PrepayReady,
    Confirm,
    StartPostpayGeneration,
    Completed,
    GenerationFailed,
    Cancel,
}

impl JobState {
    /// Database representation of the state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PendingAnalysis => "pending_analysis",
            Self::Analyzing => "analyzing",
            Self::AnalyzingCompleted => "analyzing_completed",
            Self::PrepayPending => "prepay_pending",
            Self::PrepayGenerating => "prepay_generating",
            Self::PrepayReady => "prepay_ready",
            Self::Confirmed => "confirmed",
            Self::PostpayGenerating => "postpay_generating",
            Self::Completed => "completed",
            Self::AnalysisFailed => "analysis_failed",
            Self::GenerationFailed => "generation_failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse a database status string.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending_analysis" => Ok(Self::PendingAnalysis),
            "analyzing" => Ok(Self::Analyzing),
            "analyzing_completed" => Ok(Self::AnalyzingCompleted),
            "prepay_pending" => Ok(Self::PrepayPending),
            "prepay_generating" => Ok(Self::PrepayGenerating),
            "prepay_ready" => Ok(Self::PrepayReady),
            "confirmed" => Ok(Self::Confirmed),
            "postpay_generating" => Ok(Self::PostpayGenerating),
            "completed" => Ok(Self::Completed),
            "analysis_failed" => Ok(Self::AnalysisFailed),
            "generation_failed" => Ok(Self::GenerationFailed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(CoreError::Validation(format!(
                "Unknown job state: {other:?}"
            ))),
        }
    }

    /// Terminal states accept no further events (except a no-op `Cancel`
    /// on an already-cancelled job).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::AnalysisFailed | Self::GenerationFailed | Self::Cancelled
        )
    }

    /// Whether a regenerate request may be issued from this state.
    pub fn can_regenerate(self) -> bool {
        self == Self::PrepayReady
    }
}

impl JobEvent {
    /// The state this event leads to when accepted.
    pub fn target(self) -> JobState {
        match self {
            Self::StartAnalysis => JobState::Analyzing,
            Self::AnalysisSucceeded => JobState::AnalyzingCompleted,
            Self::AnalysisFailed => JobState::AnalysisFailed,
            Self::ConfirmDetails => JobState::PrepayPending,
            Self::StartPrepayGeneration | Self::Regenerate => JobState::PrepayGenerating,
            Self::PrepayReady => JobState::PrepayReady,
            Self::Confirm => JobState::Confirmed,
            Self::StartPostpayGeneration => JobState::PostpayGenerating,
            Self::Completed => JobState::Completed,
            Self::GenerationFailed => JobState::GenerationFailed,
            Self::Cancel => JobState::Cancelled,
        }
    }

    /// Whether `from` is a valid predecessor for this event.
    fn accepts(self, from: JobState) -> bool {
        match self {
            Self::StartAnalysis => from == JobState::PendingAnalysis,
            Self::AnalysisSucceeded => from == JobState::Analyzing,
            Self::ConfirmDetails => from == JobState::AnalyzingCompleted,
            Self::StartPrepayGeneration => from == JobState::PrepayPending,
            Self::Regenerate => from == JobState::PrepayReady,
            Self::PrepayReady => from == JobState::PrepayGenerating,
            Self::Confirm => from == JobState::PrepayReady,
            Self::StartPostpayGeneration => from == JobState::Confirmed,
            Self::Completed => from == JobState::PostpayGenerating,
            // Failure markers may fire from any non-terminal state: a
            // stage can fail while the job sits in any in-flight state.
            Self::AnalysisFailed | Self::GenerationFailed => !from.is_terminal(),
            // Cancellation is accepted from any state. It does not
            // interrupt dispatched work; it only blocks further
            // transitions (enforced by the terminal check in `apply`).
            Self::Cancel => true,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Display for JobEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::StartAnalysis => "start_analysis",
            Self::AnalysisSucceeded => "analysis_succeeded",
            Self::AnalysisFailed => "analysis_failed",
            Self::ConfirmDetails => "confirm_details",
            Self::StartPrepayGeneration => "start_prepay_generation",
            Self::Regenerate => "regenerate",
            Self::PrepayReady => "prepay_ready",
            Self::Confirm => "confirm",
            Self::StartPostpayGeneration => "start_postpay_generation",
            Self::Completed => "completed",
            Self::GenerationFailed => "generation_failed",
            Self::Cancel => "cancel",
        };
        f.write_str(s)
    }
}

/// Apply `event` to `from`.
///
/// Returns the successor state, or `from` unchanged when the event's
/// target already equals the current state (idempotent re-delivery).
/// Undefined transitions return [`CoreError::InvalidTransition`].
pub fn apply(from: JobState, event: JobEvent) -> Result<JobState, CoreError> {
    // Idempotent re-delivery: the event already took effect.
    if event.target() == from {
        return Ok(from);
    }
    if from == JobState::Cancelled {
        // Cancelled blocks everything else.
        return Err(CoreError::InvalidTransition { from, event });
    }
    if event.accepts(from) {
        Ok(event.target())
    } else {
        Err(CoreError::InvalidTransition { from, event })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const HAPPY_PATH: &[(JobEvent, JobState)] = &[
        (JobEvent::StartAnalysis, JobState::Analyzing),
        (JobEvent::AnalysisSucceeded, JobState::AnalyzingCompleted),
        (JobEvent::ConfirmDetails, JobState::PrepayPending),
        (JobEvent::StartPrepayGeneration, JobState::PrepayGenerating),
        (JobEvent::PrepayReady, JobState::PrepayReady),
        (JobEvent::Confirm, JobState::Confirmed),
        (JobEvent::StartPostpayGeneration, JobState::PostpayGenerating),
        (JobEvent::Completed, JobState::Completed),
    ];

    // -- Happy path --

    #[test]
    fn full_lifecycle_advances_through_every_state() {
        let mut state = JobState::PendingAnalysis;
        for &(event, expected) in HAPPY_PATH {
            state = apply(state, event).unwrap();
            assert_eq!(state, expected);
        }
    }

    #[test]
    fn regenerate_loops_back_to_generating() {
        let state = apply(JobState::PrepayReady, JobEvent::Regenerate).unwrap();
        assert_eq!(state, JobState::PrepayGenerating);
        let state = apply(state, JobEvent::PrepayReady).unwrap();
        assert_eq!(state, JobState::PrepayReady);
    }

    // -- Idempotent re-delivery --

    #[test]
    fn redelivered_completion_does_not_advance_twice() {
        let state = apply(JobState::PrepayGenerating, JobEvent::PrepayReady).unwrap();
        assert_eq!(state, JobState::PrepayReady);
        // Same completion event again: no-op, not an error, not Confirmed.
        let state = apply(state, JobEvent::PrepayReady).unwrap();
        assert_eq!(state, JobState::PrepayReady);
    }

    #[test]
    fn redelivered_completed_is_noop() {
        let state = apply(JobState::Completed, JobEvent::Completed).unwrap();
        assert_eq!(state, JobState::Completed);
    }

    // -- Rejections --

    #[test]
    fn confirm_requires_prepay_ready() {
        assert_matches!(
            apply(JobState::PrepayGenerating, JobEvent::Confirm),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn postpay_requires_confirmed() {
        assert_matches!(
            apply(JobState::PrepayReady, JobEvent::StartPostpayGeneration),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn regenerate_rejected_from_completed() {
        assert_matches!(
            apply(JobState::Completed, JobEvent::Regenerate),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn undefined_transitions_reject_without_mutation() {
        // Exhaustive sweep: every (state, event) pair either yields a
        // defined successor or an InvalidTransition error. Nothing panics
        // and nothing falls through to an undefined state.
        let states = [
            JobState::PendingAnalysis,
            JobState::Analyzing,
            JobState::AnalyzingCompleted,
            JobState::PrepayPending,
            JobState::PrepayGenerating,
            JobState::PrepayReady,
            JobState::Confirmed,
            JobState::PostpayGenerating,
            JobState::Completed,
            JobState::AnalysisFailed,
            JobState::GenerationFailed,
            JobState::Cancelled,
        ];
        let events = [
            JobEvent::StartAnalysis,
            JobEvent::AnalysisSucceeded,
            JobEvent::AnalysisFailed,
            JobEvent::ConfirmDetails,
            JobEvent::StartPrepayGeneration,
            JobEvent::Regenerate,
            JobEvent::PrepayReady,
            JobEvent::Confirm,
            JobEvent::StartPostpayGeneration,
            JobEvent::Completed,
            JobEvent::GenerationFailed,
            JobEvent::Cancel,
        ];
        for state in states {
            for event in events {
                if let Ok(next) = apply(state, event) {
                    assert_eq!(next, if event.target() == state { state } else { event.target() });
                }
            }
        }
    }

    // -- Side states --

    #[test]
    fn cancel_reachable_from_any_state() {
        for state in [
            JobState::PendingAnalysis,
            JobState::PrepayGenerating,
            JobState::Confirmed,
            JobState::Completed,
        ] {
            assert_eq!(apply(state, JobEvent::Cancel).unwrap(), JobState::Cancelled);
        }
    }

    #[test]
    fn cancelled_blocks_further_transitions() {
        assert_matches!(
            apply(JobState::Cancelled, JobEvent::StartPrepayGeneration),
            Err(CoreError::InvalidTransition { .. })
        );
        // Re-cancelling stays a no-op.
        assert_eq!(
            apply(JobState::Cancelled, JobEvent::Cancel).unwrap(),
            JobState::Cancelled
        );
    }

    #[test]
    fn generation_failure_from_any_non_terminal() {
        assert_eq!(
            apply(JobState::PostpayGenerating, JobEvent::GenerationFailed).unwrap(),
            JobState::GenerationFailed
        );
        assert_matches!(
            apply(JobState::Completed, JobEvent::GenerationFailed),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    // -- String round-trips --

    #[test]
    fn state_strings_round_trip() {
        for state in [
            JobState::PendingAnalysis,
            JobState::PrepayReady,
            JobState::GenerationFailed,
        ] {
            assert_eq!(JobState::parse(state.as_str()).unwrap(), state);
        }
    }

    #[test]
    fn unknown_state_string_rejected() {
        assert!(JobState::parse("exploded").is_err());
    }
}
