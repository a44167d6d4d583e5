//! Stage error taxonomy.

use storyloom_core::error::CoreError;
use storyloom_store::StoreError;

/// What went wrong inside a stage, classified by what the task runner
/// should do about it.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Transient infrastructure failure (storage, transport). The task
    /// is retried while its attempt budget lasts.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Defect that retrying cannot fix (unusable template, missing
    /// template asset). Fails the stage immediately.
    #[error("stage failed: {0}")]
    Fatal(String),

    /// The job was cancelled; stop without failing anything.
    #[error("stage cancelled")]
    Cancelled,

    /// Domain rule violation: invalid transition, retry limit, unknown
    /// entity. Rejected synchronously, no side effect.
    #[error(transparent)]
    Domain(#[from] CoreError),
}

impl StageError {
    /// Whether the task runner should retry this stage.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Transient(_))
    }
}

impl From<StoreError> for StageError {
    fn from(err: StoreError) -> Self {
        match err {
            // A missing template object cannot appear by waiting.
            StoreError::NotFound(key) => StageError::Fatal(format!("missing object: {key}")),
            StoreError::Image(e) => StageError::Fatal(format!("undecodable image: {e}")),
            StoreError::Json(e) => StageError::Fatal(format!("malformed manifest: {e}")),
            StoreError::Backend(e) => StageError::Transient(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retryable() {
        assert!(StageError::Transient("s3 hiccup".into()).is_retryable());
        assert!(!StageError::Fatal("bad template".into()).is_retryable());
        assert!(!StageError::Cancelled.is_retryable());
        assert!(!StageError::Domain(CoreError::Validation("x".into())).is_retryable());
    }

    #[test]
    fn store_errors_classify_by_kind() {
        assert!(!StageError::from(StoreError::NotFound("k".into())).is_retryable());
        assert!(StageError::from(StoreError::Backend("net".into())).is_retryable());
    }
}
