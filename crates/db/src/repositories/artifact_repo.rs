//! Repository for the `artifacts` table.

use sqlx::PgPool;
use storyloom_core::types::{DbId, PageNum};

use crate::models::artifact::{ArtifactRow, NewArtifact};

/// Column list for `artifacts` queries.
const COLUMNS: &str = "\
    id, job_id, kind, page_num, object_key, checksum, created_at, updated_at";

pub struct ArtifactRepo;

impl ArtifactRepo {
    /// Record an artifact, replacing any previous one for the same
    /// (job, kind, page). Re-generation therefore overwrites in place and
    /// re-running a crashed stage is harmless.
    pub async fn upsert(pool: &PgPool, input: &NewArtifact) -> Result<ArtifactRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO artifacts (job_id, kind, page_num, object_key, checksum) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (job_id, kind, page_num) DO UPDATE \
             SET object_key = EXCLUDED.object_key, \
                 checksum = EXCLUDED.checksum, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(input.job_id)
            .bind(&input.kind)
            .bind(input.page_num)
            .bind(&input.object_key)
            .bind(&input.checksum)
            .fetch_one(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        job_id: DbId,
        kind: &str,
        page_num: PageNum,
    ) -> Result<Option<ArtifactRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifacts \
             WHERE job_id = $1 AND kind = $2 AND page_num = $3"
        );
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(job_id)
            .bind(kind)
            .bind(page_num)
            .fetch_optional(pool)
            .await
    }

    /// All artifacts of one kind for a job, page order ascending (covers
    /// first, since they sit at negative page numbers).
    pub async fn list_by_kind(
        pool: &PgPool,
        job_id: DbId,
        kind: &str,
    ) -> Result<Vec<ArtifactRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifacts \
             WHERE job_id = $1 AND kind = $2 \
             ORDER BY page_num ASC"
        );
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(job_id)
            .bind(kind)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_job(
        pool: &PgPool,
        job_id: DbId,
    ) -> Result<Vec<ArtifactRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM artifacts WHERE job_id = $1 \
             ORDER BY kind ASC, page_num ASC"
        );
        sqlx::query_as::<_, ArtifactRow>(&query)
            .bind(job_id)
            .fetch_all(pool)
            .await
    }
}
