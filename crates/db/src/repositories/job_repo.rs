//! Repository for the `jobs` table.
//!
//! Status changes are compare-and-set: the UPDATE carries the expected
//! current status, so a lost race surfaces as [`DbError::Conflict`]
//! instead of silently overwriting a concurrent transition.

use sqlx::PgPool;
use storyloom_core::error::CoreError;
use storyloom_core::state::{self, JobEvent, JobState};
use storyloom_core::types::DbId;
use tracing::debug;
use uuid::Uuid;

use crate::models::job::{JobRow, NewJob};
use crate::DbError;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, public_id, book_slug, child_name, child_age, child_gender, \
    photo_key, prompt, analysis_json, status, regen_used, regen_limit, \
    randomize_seed, error_message, created_at, updated_at";

pub struct JobRepo;

impl JobRepo {
    /// Create a job in the initial `pending_analysis` state.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<JobRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (book_slug, child_name, child_age, child_gender, photo_key) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, JobRow>(&query)
            .bind(&input.book_slug)
            .bind(&input.child_name)
            .bind(input.child_age)
            .bind(&input.child_gender)
            .bind(&input.photo_key)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_public_id(
        pool: &PgPool,
        public_id: Uuid,
    ) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE public_id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(public_id)
            .fetch_optional(pool)
            .await
    }

    /// Apply a state-machine event to a job.
    ///
    /// Loads the current status, validates the transition in memory, then
    /// writes the successor with a CAS on the old status. Returns the new
    /// state; an idempotent re-delivery returns the unchanged state
    /// without touching the row.
    pub async fn apply_event(
        pool: &PgPool,
        job_id: DbId,
        event: JobEvent,
    ) -> Result<JobState, DbError> {
        let row = Self::find_by_id(pool, job_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "job",
                id: job_id,
            })?;
        let from = row.state()?;
        let next = state::apply(from, event)?;
        if next == from {
            debug!(job_id, %event, state = %from, "event re-delivery, no-op");
            return Ok(from);
        }

        let result = sqlx::query(
            "UPDATE jobs SET status = $3, updated_at = NOW() \
             WHERE id = $1 AND status = $2",
        )
        .bind(job_id)
        .bind(from.as_str())
        .bind(next.as_str())
        .execute(pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::Conflict(job_id));
        }
        debug!(job_id, %event, from = %from, to = %next, "job transitioned");
        Ok(next)
    }

    /// Update the child details confirmed by the customer.
    pub async fn set_details(
        pool: &PgPool,
        job_id: DbId,
        child_name: &str,
        child_age: Option<i32>,
        child_gender: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs \
             SET child_name = $2, child_age = $3, child_gender = $4, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(job_id)
        .bind(child_name)
        .bind(child_age)
        .bind(child_gender)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Store the analysis result: the generation prompt and the
    /// structured attributes it was derived from.
    pub async fn set_analysis(
        pool: &PgPool,
        job_id: DbId,
        prompt: &str,
        attributes: &serde_json::Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE jobs SET prompt = $2, analysis_json = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(job_id)
        .bind(prompt)
        .bind(attributes)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record the reason a job failed.
    pub async fn set_error(pool: &PgPool, job_id: DbId, message: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE jobs SET error_message = $2, updated_at = NOW() WHERE id = $1")
            .bind(job_id)
            .bind(message)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Consume one regeneration attempt.
    ///
    /// The guard lives in the SQL so two concurrent requests cannot both
    /// pass an in-memory check. A job at its limit yields
    /// [`CoreError::RetryLimitExceeded`]. Also arms the one-shot
    /// randomize-seed flag so the rerun does not reproduce the images the
    /// customer rejected.
    pub async fn consume_regen(pool: &PgPool, job_id: DbId) -> Result<i32, DbError> {
        let used: Option<i32> = sqlx::query_scalar(
            "UPDATE jobs \
             SET regen_used = regen_used + 1, randomize_seed = TRUE, updated_at = NOW() \
             WHERE id = $1 AND regen_used < regen_limit \
             RETURNING regen_used",
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
        match used {
            Some(used) => Ok(used),
            None => {
                let row = Self::find_by_id(pool, job_id)
                    .await?
                    .ok_or(CoreError::NotFound {
                        entity: "job",
                        id: job_id,
                    })?;
                Err(CoreError::RetryLimitExceeded {
                    used: row.regen_used,
                    limit: row.regen_limit,
                }
                .into())
            }
        }
    }

    /// Take the randomize-seed flag, clearing it. Returns whether it was
    /// set. One generation run consumes it at most once.
    pub async fn take_randomize_seed(pool: &PgPool, job_id: DbId) -> Result<bool, sqlx::Error> {
        let taken: Option<bool> = sqlx::query_scalar(
            "UPDATE jobs SET randomize_seed = FALSE, updated_at = NOW() \
             WHERE id = $1 AND randomize_seed \
             RETURNING TRUE",
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
        Ok(taken.unwrap_or(false))
    }
}
