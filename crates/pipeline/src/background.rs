//! Backgrounds stage: the GPU phase of a generation pass.
//!
//! For every swap page in the stage this loads the base illustration,
//! resolves a region mask, runs the generation fallback chain, and
//! stores the result as a `bg` artifact. Pages without face swap are
//! skipped here; the render stage composites them straight from the
//! template base. Finishes by enqueueing the render task for the same
//! stage.

use storyloom_comfyui::GenerationRequest;
use storyloom_core::artifacts::{self, ArtifactKind};
use storyloom_core::prompt;
use storyloom_core::stages::Stage;
use storyloom_core::state::JobEvent;
use storyloom_core::types::{DbId, PageNum};
use storyloom_db::models::{NewArtifact, NewTask, TaskKind};
use storyloom_store::images;
use tracing::{debug, info};

use crate::context::PipelineContext;
use crate::error::StageError;
use crate::fallback::swap_with_fallback;
use crate::mask::resolve_mask;
use crate::runner::StagePayload;
use crate::work::stage_work_items;

/// Event that marks a job as generating for the given stage. Applying it
/// again on a regeneration pass (already in the generating state) is a
/// no-op.
pub fn start_event(stage: Stage) -> JobEvent {
    match stage {
        Stage::Prepay => JobEvent::StartPrepayGeneration,
        Stage::Postpay => JobEvent::StartPostpayGeneration,
    }
}

/// Deterministic per-page seed. Stable across re-runs of the same job
/// and page, so repeated stages reproduce the same composition unless
/// the randomize flag arms fresh seeds.
pub fn stable_seed(job_uuid: &str, page_num: PageNum) -> i64 {
    let digest = images::sha256_hex(format!("{job_uuid}:{page_num}").as_bytes());
    // 15 hex digits stay well inside i64 range.
    i64::from_str_radix(&digest[..15], 16).unwrap_or_default()
}

/// Run the backgrounds stage for one job.
pub async fn run_backgrounds(
    ctx: &PipelineContext,
    job_id: DbId,
    stage: Stage,
) -> Result<(), StageError> {
    ctx.jobs.apply_event(job_id, start_event(stage)).await?;
    let job = ctx.jobs.load(job_id).await?;
    let manifest = ctx.templates.load_manifest(&job.book_slug).await?;
    let randomize = ctx.jobs.take_randomize_seed(job_id).await?;

    let items = stage_work_items(&manifest, stage);
    let swap_items: Vec<_> = items.iter().filter(|i| i.needs_face_swap).collect();

    if swap_items.is_empty() {
        debug!(job_id, %stage, "stage has no image-swap work");
    } else {
        let photo_key = job
            .photo_key
            .as_deref()
            .ok_or_else(|| StageError::Fatal(format!("job {job_id} has no photo")))?;
        let photo_png = ctx.objects.get(photo_key).await?;
        let workflow = ctx.templates.load_workflow(&job.book_slug).await?;
        let job_uuid = job.public_id.to_string();

        for item in swap_items {
            if ctx.cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }

            let illustration = ctx.templates.load_illustration(item.base_uri).await?;
            let base = images::decode(&illustration)?;
            let mask = resolve_mask(
                &ctx.templates,
                ctx.detector.as_ref(),
                item.base_uri,
                &illustration,
                base.width(),
                base.height(),
            )
            .await;
            let mask_png = images::encode_png(&image::DynamicImage::ImageRgb8(mask))?;

            let request = GenerationRequest {
                photo_png: photo_png.clone(),
                illustration_png: illustration,
                mask_png: Some(mask_png),
                positive: prompt::effective_positive(item.prompt, job.prompt.as_deref()),
                negative: prompt::effective_negative(item.negative_prompt),
                seed: (!randomize).then(|| stable_seed(&job_uuid, item.page_num)),
            };

            let (bytes, outcome) =
                swap_with_fallback(ctx.generator.as_ref(), &request, &workflow, &ctx.cancel)
                    .await?;
            info!(job_id, page_num = item.page_num, ?outcome, "background produced");

            let normalized =
                images::normalize_long_side(images::decode(&bytes)?, manifest.output.page_size_px);
            let png = images::encode_png(&normalized)?;
            let checksum = images::sha256_hex(&png);
            let key = artifacts::background_key(&job_uuid, item.page_num);
            ctx.objects.put(&key, png, "image/png").await?;
            ctx.jobs
                .record_artifact(&NewArtifact {
                    job_id,
                    kind: ArtifactKind::Background.as_str().to_string(),
                    page_num: item.page_num,
                    object_key: key,
                    checksum: Some(checksum),
                })
                .await?;
        }
    }

    // Only enqueue the render phase once every background is committed.
    ctx.jobs
        .enqueue(&NewTask {
            kind: TaskKind::RenderPages,
            job_id,
            payload: StagePayload::new(stage).to_value(),
        })
        .await?;
    Ok(())
}
