//! The job persistence seam.
//!
//! Production wires this to the Postgres repositories; tests use an
//! in-memory implementation. All methods are job-scoped; there is no
//! cross-job shared state behind this trait.

use async_trait::async_trait;
use storyloom_core::state::{JobEvent, JobState};
use storyloom_core::types::{DbId, PageNum};
use storyloom_db::models::{ArtifactRow, JobRow, NewArtifact, NewJob, NewTask};

use crate::error::StageError;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, input: &NewJob) -> Result<JobRow, StageError>;

    async fn load(&self, job_id: DbId) -> Result<JobRow, StageError>;

    /// Apply a state-machine event (validated + compare-and-set).
    async fn apply_event(&self, job_id: DbId, event: JobEvent) -> Result<JobState, StageError>;

    async fn set_details(
        &self,
        job_id: DbId,
        child_name: &str,
        child_age: Option<i32>,
        child_gender: Option<&str>,
    ) -> Result<(), StageError>;

    /// Store the analysis result: prompt plus structured attributes.
    async fn record_analysis(
        &self,
        job_id: DbId,
        prompt: &str,
        attributes: &serde_json::Value,
    ) -> Result<(), StageError>;

    async fn set_error(&self, job_id: DbId, message: &str) -> Result<(), StageError>;

    /// Consume one regeneration attempt; errors with
    /// [`storyloom_core::error::CoreError::RetryLimitExceeded`] at the cap.
    async fn consume_regen(&self, job_id: DbId) -> Result<i32, StageError>;

    /// Take the one-shot randomize-seed flag.
    async fn take_randomize_seed(&self, job_id: DbId) -> Result<bool, StageError>;

    async fn record_artifact(&self, input: &NewArtifact) -> Result<(), StageError>;

    async fn artifact(
        &self,
        job_id: DbId,
        kind: &str,
        page_num: PageNum,
    ) -> Result<Option<ArtifactRow>, StageError>;

    async fn artifacts_by_kind(
        &self,
        job_id: DbId,
        kind: &str,
    ) -> Result<Vec<ArtifactRow>, StageError>;

    async fn enqueue(&self, task: &NewTask) -> Result<(), StageError>;
}
