//! Job row model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyloom_core::error::CoreError;
use storyloom_core::state::JobState;
use storyloom_core::types::{DbId, Timestamp};
use uuid::Uuid;

/// A row from the `jobs` table.
///
/// `status` holds a [`JobState::as_str`] value; all writes go through
/// the compare-and-set transition in the repository.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRow {
    pub id: DbId,
    /// Externally visible identifier; the numeric `id` never leaves the
    /// database layer.
    pub public_id: Uuid,
    pub book_slug: String,
    pub child_name: String,
    pub child_age: Option<i32>,
    pub child_gender: Option<String>,
    /// Object key of the uploaded customer photo.
    pub photo_key: Option<String>,
    /// Analysis-derived generation prompt.
    pub prompt: Option<String>,
    /// Structured attributes from photo analysis.
    pub analysis_json: Option<serde_json::Value>,
    pub status: String,
    pub regen_used: i32,
    pub regen_limit: i32,
    /// One-shot flag: the next prepay generation uses fresh seeds.
    pub randomize_seed: bool,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl JobRow {
    /// Parse the status column into the typed state.
    pub fn state(&self) -> Result<JobState, CoreError> {
        JobState::parse(&self.status)
    }
}

/// DTO for creating a job.
#[derive(Debug, Clone, Deserialize)]
pub struct NewJob {
    pub book_slug: String,
    pub child_name: String,
    pub child_age: Option<i32>,
    pub child_gender: Option<String>,
    pub photo_key: Option<String>,
}
