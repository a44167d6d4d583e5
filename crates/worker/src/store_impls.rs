//! Postgres-backed [`JobStore`] wiring the pipeline to the repositories.
//!
//! Classification of database failures: connection-level errors are
//! transient (the task retries), missing rows are domain errors, and a
//! lost compare-and-set race is transient because the re-run will see
//! the winner's state and no-op.

use async_trait::async_trait;
use sqlx::PgPool;
use storyloom_core::error::CoreError;
use storyloom_core::state::{JobEvent, JobState};
use storyloom_core::types::{DbId, PageNum};
use storyloom_db::models::{ArtifactRow, JobRow, NewArtifact, NewJob, NewTask};
use storyloom_db::repositories::{ArtifactRepo, JobRepo, TaskRepo};
use storyloom_db::DbError;
use storyloom_pipeline::{JobStore, StageError};

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx(e: sqlx::Error) -> StageError {
    match e {
        sqlx::Error::RowNotFound => StageError::Fatal(e.to_string()),
        other => StageError::Transient(other.to_string()),
    }
}

fn map_db(e: DbError) -> StageError {
    match e {
        DbError::Sqlx(e) => map_sqlx(e),
        DbError::Core(e) => StageError::Domain(e),
        DbError::Conflict(job_id) => {
            StageError::Transient(format!("concurrent update on job {job_id}"))
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, input: &NewJob) -> Result<JobRow, StageError> {
        JobRepo::create(&self.pool, input).await.map_err(map_sqlx)
    }

    async fn load(&self, job_id: DbId) -> Result<JobRow, StageError> {
        JobRepo::find_by_id(&self.pool, job_id)
            .await
            .map_err(map_sqlx)?
            .ok_or_else(|| {
                StageError::Domain(CoreError::NotFound {
                    entity: "job",
                    id: job_id,
                })
            })
    }

    async fn apply_event(&self, job_id: DbId, event: JobEvent) -> Result<JobState, StageError> {
        JobRepo::apply_event(&self.pool, job_id, event)
            .await
            .map_err(map_db)
    }

    async fn set_details(
        &self,
        job_id: DbId,
        child_name: &str,
        child_age: Option<i32>,
        child_gender: Option<&str>,
    ) -> Result<(), StageError> {
        JobRepo::set_details(&self.pool, job_id, child_name, child_age, child_gender)
            .await
            .map_err(map_sqlx)
    }

    async fn record_analysis(
        &self,
        job_id: DbId,
        prompt: &str,
        attributes: &serde_json::Value,
    ) -> Result<(), StageError> {
        JobRepo::set_analysis(&self.pool, job_id, prompt, attributes)
            .await
            .map_err(map_sqlx)
    }

    async fn set_error(&self, job_id: DbId, message: &str) -> Result<(), StageError> {
        JobRepo::set_error(&self.pool, job_id, message)
            .await
            .map_err(map_sqlx)
    }

    async fn consume_regen(&self, job_id: DbId) -> Result<i32, StageError> {
        JobRepo::consume_regen(&self.pool, job_id)
            .await
            .map_err(map_db)
    }

    async fn take_randomize_seed(&self, job_id: DbId) -> Result<bool, StageError> {
        JobRepo::take_randomize_seed(&self.pool, job_id)
            .await
            .map_err(map_sqlx)
    }

    async fn record_artifact(&self, input: &NewArtifact) -> Result<(), StageError> {
        ArtifactRepo::upsert(&self.pool, input)
            .await
            .map(|_| ())
            .map_err(map_sqlx)
    }

    async fn artifact(
        &self,
        job_id: DbId,
        kind: &str,
        page_num: PageNum,
    ) -> Result<Option<ArtifactRow>, StageError> {
        ArtifactRepo::find(&self.pool, job_id, kind, page_num)
            .await
            .map_err(map_sqlx)
    }

    async fn artifacts_by_kind(
        &self,
        job_id: DbId,
        kind: &str,
    ) -> Result<Vec<ArtifactRow>, StageError> {
        ArtifactRepo::list_by_kind(&self.pool, job_id, kind)
            .await
            .map_err(map_sqlx)
    }

    async fn enqueue(&self, task: &NewTask) -> Result<(), StageError> {
        TaskRepo::enqueue(&self.pool, task)
            .await
            .map(|_| ())
            .map_err(map_sqlx)
    }
}
