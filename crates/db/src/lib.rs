//! Postgres persistence: job rows, artifact rows, and the task queue.
//!
//! Repositories are stateless structs with associated async functions
//! taking a `&PgPool`; callers own transactions where they need them.

pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use storyloom_core::error::CoreError;
use storyloom_core::types::DbId;

/// Errors from repository operations that mix SQL access with domain
/// rules (state transitions, regeneration limits).
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// A compare-and-set update lost to a concurrent writer.
    #[error("concurrent update on job {0}")]
    Conflict(DbId),
}

/// Connect a pool and run pending migrations.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DbError::Sqlx(sqlx::Error::Migrate(Box::new(e))))?;
    Ok(pool)
}
