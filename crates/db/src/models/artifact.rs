//! Artifact row model.

use serde::Serialize;
use sqlx::FromRow;
use storyloom_core::types::{DbId, PageNum, Timestamp};

/// A row from the `artifacts` table: one produced image per
/// (job, kind, page). Covers use the negative page numbers from
/// `storyloom_core::artifacts`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ArtifactRow {
    pub id: DbId,
    pub job_id: DbId,
    /// `"bg"` or `"final"`, per [`storyloom_core::artifacts::ArtifactKind`].
    pub kind: String,
    pub page_num: PageNum,
    pub object_key: String,
    /// SHA-256 of the stored bytes, for change detection.
    pub checksum: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for recording an artifact.
#[derive(Debug, Clone)]
pub struct NewArtifact {
    pub job_id: DbId,
    pub kind: String,
    pub page_num: PageNum,
    pub object_key: String,
    pub checksum: Option<String>,
}
