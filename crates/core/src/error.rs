use crate::state::{JobEvent, JobState};
use crate::types::DbId;

/// Domain-level errors shared across the workspace.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The requested lifecycle event is not legal from the current state.
    /// Rejected synchronously; the job is not mutated.
    #[error("Invalid state transition: {event} is not allowed from {from}")]
    InvalidTransition { from: JobState, event: JobEvent },

    /// Regeneration was requested after the budget was spent. Distinct
    /// from a plain validation error so callers can surface it as such.
    #[error("Regeneration limit reached: {used} of {limit} used")]
    RetryLimitExceeded { used: i32, limit: i32 },

    #[error("Internal error: {0}")]
    Internal(String),
}
