//! Regeneration budget policy.
//!
//! A job may loop `prepay_ready -> prepay_generating` at most `limit`
//! times. The check is synchronous and happens before any work is
//! dispatched; exceeding the budget is a distinct error, never a silent
//! cap.

use crate::error::CoreError;

/// Default number of regenerations a job may use.
pub const DEFAULT_REGEN_LIMIT: i32 = 3;

/// Regeneration budget for one job.
#[derive(Debug, Clone, Copy)]
pub struct RegenerationPolicy {
    pub limit: i32,
}

impl Default for RegenerationPolicy {
    fn default() -> Self {
        Self {
            limit: DEFAULT_REGEN_LIMIT,
        }
    }
}

impl RegenerationPolicy {
    /// Accept a regenerate request given the count already used.
    pub fn check(&self, used: i32) -> Result<(), CoreError> {
        if used >= self.limit {
            Err(CoreError::RetryLimitExceeded {
                used,
                limit: self.limit,
            })
        } else {
            Ok(())
        }
    }

    /// Regenerations still available.
    pub fn remaining(&self, used: i32) -> i32 {
        (self.limit - used).max(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
