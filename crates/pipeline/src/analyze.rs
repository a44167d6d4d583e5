//! Photo analysis stage.
//!
//! Derives structured attributes and a generation prompt from the
//! customer photo. The analyzer itself sits behind [`PhotoAnalyzer`];
//! the stub implementation mirrors a fixed-output ML switch used in
//! environments without the model.

use async_trait::async_trait;
use storyloom_core::state::JobEvent;
use storyloom_core::types::DbId;
use tracing::info;

use crate::context::PipelineContext;
use crate::error::StageError;

/// What analysis learned about the photo.
#[derive(Debug, Clone)]
pub struct PhotoAnalysis {
    /// Positive prompt fragment describing the child.
    pub prompt: String,
    /// Structured attributes (age estimate, hair, etc.).
    pub attributes: serde_json::Value,
}

#[async_trait]
pub trait PhotoAnalyzer: Send + Sync {
    async fn analyze(&self, photo_png: &[u8]) -> Result<PhotoAnalysis, StageError>;
}

/// Fixed-output analyzer for development and tests.
pub struct StubAnalyzer;

#[async_trait]
impl PhotoAnalyzer for StubAnalyzer {
    async fn analyze(&self, _photo_png: &[u8]) -> Result<PhotoAnalysis, StageError> {
        Ok(PhotoAnalysis {
            prompt: "child portrait, brown hair, smiling".to_string(),
            attributes: serde_json::json!({
                "age_estimate": 5,
                "hair_color": "brown",
                "stub": true,
            }),
        })
    }
}

/// Run the analyze stage for one job.
pub async fn run_analyze(ctx: &PipelineContext, job_id: DbId) -> Result<(), StageError> {
    ctx.jobs.apply_event(job_id, JobEvent::StartAnalysis).await?;
    let job = ctx.jobs.load(job_id).await?;

    let photo_key = job
        .photo_key
        .as_deref()
        .ok_or_else(|| StageError::Fatal(format!("job {job_id} has no photo")))?;
    let photo = ctx.objects.get(photo_key).await?;

    let analysis = ctx.analyzer.analyze(&photo).await?;
    info!(job_id, prompt = %analysis.prompt, "photo analyzed");
    ctx.jobs
        .record_analysis(job_id, &analysis.prompt, &analysis.attributes)
        .await?;

    ctx.jobs
        .apply_event(job_id, JobEvent::AnalysisSucceeded)
        .await?;
    Ok(())
}
