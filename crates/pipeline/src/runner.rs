//! Task dispatch: runs one claimed queue task and classifies the result
//! for the worker's settle step.

use serde::{Deserialize, Serialize};
use storyloom_core::error::CoreError;
use storyloom_core::stages::Stage;
use storyloom_core::state::JobEvent;
use storyloom_core::types::DbId;
use storyloom_db::models::{TaskKind, TaskRow};
use tracing::{debug, info, warn};

use crate::analyze::run_analyze;
use crate::background::run_backgrounds;
use crate::compose::run_render;
use crate::context::PipelineContext;
use crate::error::StageError;

/// Stage parameter carried by generation and render task payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagePayload {
    pub stage: String,
}

impl StagePayload {
    pub fn new(stage: Stage) -> Self {
        Self {
            stage: stage.as_str().to_string(),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({ "stage": self.stage })
    }

    /// Extract the stage from a task payload. A malformed payload is a
    /// permanent defect, not a retry candidate.
    pub fn parse(payload: &serde_json::Value) -> Result<Stage, StageError> {
        let parsed: Self = serde_json::from_value(payload.clone())
            .map_err(|e| StageError::Fatal(format!("malformed task payload: {e}")))?;
        Stage::parse(&parsed.stage).map_err(|e| StageError::Fatal(e.to_string()))
    }
}

/// How the dispatcher should settle a finished task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Mark the task completed.
    Done,
    /// Put the task back with backoff; attempts remain.
    Retry(String),
    /// Mark the task failed; the job has been moved to its failure state.
    Failed(String),
}

/// Run one claimed task to completion.
///
/// Transient errors with attempts left yield [`TaskOutcome::Retry`];
/// everything else that fails marks the job failed first. A shutdown
/// cancellation requeues without consuming the job.
pub async fn run_task(ctx: &PipelineContext, task: &TaskRow) -> TaskOutcome {
    let kind = match task.task_kind() {
        Ok(kind) => kind,
        Err(e) => {
            warn!(task_id = task.id, error = %e, "task has unknown kind");
            return TaskOutcome::Failed(e.to_string());
        }
    };
    info!(task_id = task.id, job_id = task.job_id, kind = %kind.as_str(), attempt = task.attempts, "running task");

    let result = match kind {
        TaskKind::AnalyzePhoto => run_analyze(ctx, task.job_id).await,
        TaskKind::GenerateBackgrounds => match StagePayload::parse(&task.payload) {
            Ok(stage) => run_backgrounds(ctx, task.job_id, stage).await,
            Err(e) => Err(e),
        },
        TaskKind::RenderPages => match StagePayload::parse(&task.payload) {
            Ok(stage) => run_render(ctx, task.job_id, stage).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => TaskOutcome::Done,
        Err(StageError::Cancelled) => {
            info!(task_id = task.id, "task interrupted by shutdown, requeueing");
            TaskOutcome::Retry("interrupted by shutdown".to_string())
        }
        Err(e) if e.is_retryable() && task.attempts < task.max_attempts => {
            warn!(task_id = task.id, error = %e, "task failed, will retry");
            TaskOutcome::Retry(e.to_string())
        }
        Err(e) => {
            warn!(task_id = task.id, error = %e, "task failed permanently");
            mark_job_failed(ctx, task.job_id, kind, &e.to_string()).await;
            TaskOutcome::Failed(e.to_string())
        }
    }
}

// ---- private helpers ----

fn failure_event(kind: TaskKind) -> JobEvent {
    match kind {
        TaskKind::AnalyzePhoto => JobEvent::AnalysisFailed,
        TaskKind::GenerateBackgrounds | TaskKind::RenderPages => JobEvent::GenerationFailed,
    }
}

/// Move the job to its failure state and record the message. A job that
/// was cancelled mid-flight rejects the failure event; that rejection is
/// expected and the cancelled state wins.
async fn mark_job_failed(ctx: &PipelineContext, job_id: DbId, kind: TaskKind, message: &str) {
    match ctx.jobs.apply_event(job_id, failure_event(kind)).await {
        Ok(_) => {}
        Err(StageError::Domain(CoreError::InvalidTransition { from, .. })) => {
            debug!(job_id, %from, "failure event rejected, keeping current state");
        }
        Err(e) => {
            warn!(job_id, error = %e, "could not mark job failed");
            return;
        }
    }
    if let Err(e) = ctx.jobs.set_error(job_id, message).await {
        warn!(job_id, error = %e, "could not record job error message");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn stage_payload_round_trips() {
        let value = StagePayload::new(Stage::Prepay).to_value();
        assert_eq!(StagePayload::parse(&value).unwrap(), Stage::Prepay);

        let value = StagePayload::new(Stage::Postpay).to_value();
        assert_eq!(StagePayload::parse(&value).unwrap(), Stage::Postpay);
    }

    #[test]
    fn malformed_payload_is_fatal() {
        assert_matches!(
            StagePayload::parse(&serde_json::json!({})),
            Err(StageError::Fatal(_))
        );
        assert_matches!(
            StagePayload::parse(&serde_json::json!({ "stage": "midpay" })),
            Err(StageError::Fatal(_))
        );
    }

    #[test]
    fn analysis_and_generation_failures_map_to_their_events() {
        assert_eq!(failure_event(TaskKind::AnalyzePhoto), JobEvent::AnalysisFailed);
        assert_eq!(
            failure_event(TaskKind::GenerateBackgrounds),
            JobEvent::GenerationFailed
        );
        assert_eq!(failure_event(TaskKind::RenderPages), JobEvent::GenerationFailed);
    }
}
