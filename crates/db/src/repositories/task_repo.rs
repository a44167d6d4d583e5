//! Repository for the `tasks` table: an at-least-once work queue.
//!
//! Claiming uses `FOR UPDATE SKIP LOCKED` so concurrent dispatchers never
//! double-claim, and a stale-claim sweep requeues work whose worker died
//! mid-task. Consumers must therefore tolerate re-execution; every stage
//! write is an upsert and every state event is idempotent.

use sqlx::PgPool;
use storyloom_core::types::DbId;
use tracing::warn;

use crate::models::task::{NewTask, TaskQueue, TaskRow, TaskStatus};

/// Column list for `tasks` queries.
const COLUMNS: &str = "\
    id, queue, kind, job_id, payload, status, attempts, max_attempts, \
    claimed_by, claimed_at, scheduled_at, completed_at, error_message, \
    created_at, updated_at";

pub struct TaskRepo;

impl TaskRepo {
    /// Enqueue a task on the lane its kind belongs to.
    pub async fn enqueue(pool: &PgPool, input: &NewTask) -> Result<TaskRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (queue, kind, job_id, payload) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(input.kind.queue().as_str())
            .bind(input.kind.as_str())
            .bind(input.job_id)
            .bind(&input.payload)
            .fetch_one(pool)
            .await
    }

    /// Atomically claim the next due task on a queue.
    pub async fn claim_next(
        pool: &PgPool,
        queue: TaskQueue,
        worker_id: &str,
    ) -> Result<Option<TaskRow>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks \
             SET status = $3, claimed_by = $4, claimed_at = NOW(), \
                 attempts = attempts + 1, updated_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM tasks \
                 WHERE queue = $1 AND status = $2 AND scheduled_at <= NOW() \
                 ORDER BY scheduled_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskRow>(&query)
            .bind(queue.as_str())
            .bind(TaskStatus::Pending.as_str())
            .bind(TaskStatus::Running.as_str())
            .bind(worker_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn complete(pool: &PgPool, task_id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks \
             SET status = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(task_id)
        .bind(TaskStatus::Completed.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Fail a task: requeue with a delay while attempts remain, park it
    /// as failed once the budget is spent. Returns `true` when the task
    /// will run again.
    pub async fn fail(
        pool: &PgPool,
        task_id: DbId,
        error: &str,
        retry_delay_secs: i64,
    ) -> Result<bool, sqlx::Error> {
        let status: String = sqlx::query_scalar(
            "UPDATE tasks \
             SET status = CASE WHEN attempts < max_attempts THEN $3 ELSE $4 END, \
                 scheduled_at = CASE WHEN attempts < max_attempts \
                     THEN NOW() + ($5 * INTERVAL '1 second') ELSE scheduled_at END, \
                 claimed_by = NULL, claimed_at = NULL, \
                 error_message = $2, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING status",
        )
        .bind(task_id)
        .bind(error)
        .bind(TaskStatus::Pending.as_str())
        .bind(TaskStatus::Failed.as_str())
        .bind(retry_delay_secs)
        .fetch_one(pool)
        .await?;
        Ok(status == TaskStatus::Pending.as_str())
    }

    /// Park a task as failed regardless of remaining attempts. Used when
    /// the failure is permanent and the job has already been marked.
    pub async fn park(pool: &PgPool, task_id: DbId, error: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE tasks \
             SET status = $3, claimed_by = NULL, claimed_at = NULL, \
                 error_message = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(task_id)
        .bind(error)
        .bind(TaskStatus::Failed.as_str())
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Requeue tasks whose claim has gone stale (worker died mid-task).
    /// Returns the number requeued.
    pub async fn requeue_stale(
        pool: &PgPool,
        queue: TaskQueue,
        stale_after_secs: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tasks \
             SET status = $2, claimed_by = NULL, claimed_at = NULL, updated_at = NOW() \
             WHERE queue = $1 AND status = $3 \
               AND claimed_at < NOW() - ($4 * INTERVAL '1 second')",
        )
        .bind(queue.as_str())
        .bind(TaskStatus::Pending.as_str())
        .bind(TaskStatus::Running.as_str())
        .bind(stale_after_secs)
        .execute(pool)
        .await?;
        let requeued = result.rows_affected();
        if requeued > 0 {
            warn!(queue = queue.as_str(), requeued, "requeued stale tasks");
        }
        Ok(requeued)
    }

}
