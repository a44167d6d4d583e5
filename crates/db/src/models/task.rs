//! Task queue row model and the queue/kind/status vocabularies.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use storyloom_core::error::CoreError;
use storyloom_core::types::{DbId, Timestamp};

/// Which worker lane a task runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskQueue {
    /// Generation work holding a GPU slot. Concurrency 1 per worker.
    Gpu,
    /// Compositing, analysis, and other CPU-bound work.
    Cpu,
}

impl TaskQueue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gpu => "gpu",
            Self::Cpu => "cpu",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "gpu" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            other => Err(CoreError::Validation(format!("Unknown queue: {other:?}"))),
        }
    }
}

/// What a task does. The payload carries the stage-specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Analyze the customer photo into a generation prompt.
    AnalyzePhoto,
    /// Generate swapped backgrounds for one stage of a job.
    GenerateBackgrounds,
    /// Compose text layers onto generated backgrounds.
    RenderPages,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnalyzePhoto => "analyze_photo",
            Self::GenerateBackgrounds => "generate_backgrounds",
            Self::RenderPages => "render_pages",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "analyze_photo" => Ok(Self::AnalyzePhoto),
            "generate_backgrounds" => Ok(Self::GenerateBackgrounds),
            "render_pages" => Ok(Self::RenderPages),
            other => Err(CoreError::Validation(format!(
                "Unknown task kind: {other:?}"
            ))),
        }
    }

    /// The lane this kind of work belongs on.
    pub fn queue(self) -> TaskQueue {
        match self {
            Self::GenerateBackgrounds => TaskQueue::Gpu,
            Self::AnalyzePhoto | Self::RenderPages => TaskQueue::Cpu,
        }
    }
}

/// Queue lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// A row from the `tasks` table.
#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: DbId,
    pub queue: String,
    pub kind: String,
    pub job_id: DbId,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<Timestamp>,
    pub scheduled_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TaskRow {
    pub fn task_kind(&self) -> Result<TaskKind, CoreError> {
        TaskKind::parse(&self.kind)
    }
}

/// DTO for enqueueing a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub kind: TaskKind,
    pub job_id: DbId,
    pub payload: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_the_only_gpu_kind() {
        assert_eq!(TaskKind::GenerateBackgrounds.queue(), TaskQueue::Gpu);
        assert_eq!(TaskKind::AnalyzePhoto.queue(), TaskQueue::Cpu);
        assert_eq!(TaskKind::RenderPages.queue(), TaskQueue::Cpu);
    }

    #[test]
    fn kind_strings_round_trip() {
        for kind in [
            TaskKind::AnalyzePhoto,
            TaskKind::GenerateBackgrounds,
            TaskKind::RenderPages,
        ] {
            assert_eq!(TaskKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(TaskKind::parse("sweep_floors").is_err());
    }
}
