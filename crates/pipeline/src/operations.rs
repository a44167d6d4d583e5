//! Job-facing operations: the transition requests an API layer issues
//! against jobs. Each one validates through the state machine and, where
//! a stage must run, enqueues the task that drives it.

use storyloom_core::stages::Stage;
use storyloom_core::state::JobEvent;
use storyloom_core::types::DbId;
use storyloom_db::models::{JobRow, NewJob, NewTask, TaskKind};
use tracing::info;

use crate::error::StageError;
use crate::job_store::JobStore;
use crate::runner::StagePayload;

/// Create a job and queue its photo analysis.
pub async fn create_job(jobs: &dyn JobStore, input: &NewJob) -> Result<JobRow, StageError> {
    let job = jobs.create(input).await?;
    jobs.enqueue(&NewTask {
        kind: TaskKind::AnalyzePhoto,
        job_id: job.id,
        payload: serde_json::json!({}),
    })
    .await?;
    info!(job_id = job.id, book_slug = %job.book_slug, "job created");
    Ok(job)
}

/// Confirm the child details and queue the prepay teaser generation.
pub async fn begin_generation(
    jobs: &dyn JobStore,
    job_id: DbId,
    child_name: &str,
    child_age: Option<i32>,
    child_gender: Option<&str>,
) -> Result<(), StageError> {
    jobs.set_details(job_id, child_name, child_age, child_gender)
        .await?;
    jobs.apply_event(job_id, JobEvent::ConfirmDetails).await?;
    enqueue_stage(jobs, job_id, Stage::Prepay).await
}

/// Spend one regeneration attempt and queue a fresh prepay pass.
///
/// Returns the attempts used so far. Consuming the attempt also arms the
/// randomize-seed flag, so the new pass produces different compositions.
pub async fn regenerate(jobs: &dyn JobStore, job_id: DbId) -> Result<i32, StageError> {
    let job = jobs.load(job_id).await?;
    let state = job.state()?;
    if !state.can_regenerate() {
        return Err(StageError::Fatal(format!(
            "job {job_id} cannot regenerate from state {state}"
        )));
    }

    let used = jobs.consume_regen(job_id).await?;
    jobs.apply_event(job_id, JobEvent::Regenerate).await?;
    info!(job_id, used, "regeneration queued");
    enqueue_stage(jobs, job_id, Stage::Prepay).await?;
    Ok(used)
}

/// Accept the teaser. The job waits in `confirmed` until payment starts
/// the postpay pass.
pub async fn confirm(jobs: &dyn JobStore, job_id: DbId) -> Result<(), StageError> {
    jobs.apply_event(job_id, JobEvent::Confirm).await?;
    Ok(())
}

/// Queue the full-book generation after payment.
pub async fn start_postpay(jobs: &dyn JobStore, job_id: DbId) -> Result<(), StageError> {
    jobs.apply_event(job_id, JobEvent::StartPostpayGeneration)
        .await?;
    enqueue_stage(jobs, job_id, Stage::Postpay).await
}

/// Cancel the job. Dispatched work is not interrupted; the cancelled
/// state blocks every later transition instead.
pub async fn cancel(jobs: &dyn JobStore, job_id: DbId) -> Result<(), StageError> {
    jobs.apply_event(job_id, JobEvent::Cancel).await?;
    info!(job_id, "job cancelled");
    Ok(())
}

async fn enqueue_stage(jobs: &dyn JobStore, job_id: DbId, stage: Stage) -> Result<(), StageError> {
    jobs.enqueue(&NewTask {
        kind: TaskKind::GenerateBackgrounds,
        job_id,
        payload: StagePayload::new(stage).to_value(),
    })
    .await
}
