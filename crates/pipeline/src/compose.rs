//! Render stage: text compositing onto backgrounds.
//!
//! Runs after the backgrounds stage on the CPU lane. Each page starts
//! from its `bg` artifact (or the normalized template base when the page
//! needed no swap), folds its text layers through the compositor, and is
//! stored as a `final` artifact. The stage's terminal event moves the
//! job to `prepay_ready` or `completed`.

use async_trait::async_trait;
use storyloom_core::artifacts::{self, ArtifactKind};
use storyloom_core::manifest::{OutputSpec, TextLayer, TypographySpec};
use storyloom_core::stages::Stage;
use storyloom_core::state::JobEvent;
use storyloom_core::text_template::{render_template, TemplateVars};
use storyloom_core::types::DbId;
use storyloom_db::models::NewArtifact;
use storyloom_store::images;
use tracing::{debug, info};

use crate::context::PipelineContext;
use crate::error::StageError;
use crate::work::{stage_work_items, WorkItem};

/// Pixel rendering of one resolved text layer.
///
/// The layer's template variables are already substituted; `text` is the
/// literal string to draw. Implementations own font loading and layout.
#[async_trait]
pub trait TextCompositor: Send + Sync {
    async fn compose(
        &self,
        accumulator_png: &[u8],
        layer: &TextLayer,
        text: &str,
        typography: &TypographySpec,
        output: &OutputSpec,
    ) -> Result<Vec<u8>, StageError>;
}

/// Compositor that draws nothing. Used where fonts are unavailable; the
/// book still assembles with bare backgrounds.
pub struct PassthroughCompositor;

#[async_trait]
impl TextCompositor for PassthroughCompositor {
    async fn compose(
        &self,
        accumulator_png: &[u8],
        _layer: &TextLayer,
        text: &str,
        _typography: &TypographySpec,
        _output: &OutputSpec,
    ) -> Result<Vec<u8>, StageError> {
        debug!(text, "passthrough compositor skipping text layer");
        Ok(accumulator_png.to_vec())
    }
}

/// Event that completes the given stage.
pub fn finish_event(stage: Stage) -> JobEvent {
    match stage {
        Stage::Prepay => JobEvent::PrepayReady,
        Stage::Postpay => JobEvent::Completed,
    }
}

/// Run the render stage for one job.
pub async fn run_render(
    ctx: &PipelineContext,
    job_id: DbId,
    stage: Stage,
) -> Result<(), StageError> {
    let job = ctx.jobs.load(job_id).await?;
    let manifest = ctx.templates.load_manifest(&job.book_slug).await?;
    let job_uuid = job.public_id.to_string();
    let vars = TemplateVars {
        child_name: job.child_name.clone(),
        child_age: job.child_age,
        child_gender: job.child_gender.clone(),
    };

    for item in stage_work_items(&manifest, stage) {
        if ctx.cancel.is_cancelled() {
            return Err(StageError::Cancelled);
        }

        let acc = page_background(ctx, job_id, &manifest.output, &item).await?;
        let typography = item.typography.unwrap_or(&manifest.typography);
        let acc = fold_text_layers(
            ctx.compositor.as_ref(),
            acc,
            item.text_layers,
            &vars,
            typography,
            &manifest.output,
        )
        .await?;

        let checksum = images::sha256_hex(&acc);
        let key = artifacts::final_key(&job_uuid, item.page_num);
        ctx.objects.put(&key, acc, "image/png").await?;
        ctx.jobs
            .record_artifact(&NewArtifact {
                job_id,
                kind: ArtifactKind::Final.as_str().to_string(),
                page_num: item.page_num,
                object_key: key,
                checksum: Some(checksum),
            })
            .await?;
        info!(job_id, page_num = item.page_num, "page rendered");
    }

    ctx.jobs.apply_event(job_id, finish_event(stage)).await?;
    Ok(())
}

/// Fold the page's text layers over the accumulator, in manifest order.
pub async fn fold_text_layers(
    compositor: &dyn TextCompositor,
    mut acc: Vec<u8>,
    layers: &[TextLayer],
    vars: &TemplateVars,
    typography: &TypographySpec,
    output: &OutputSpec,
) -> Result<Vec<u8>, StageError> {
    for layer in layers {
        let text = render_template(&layer.text_template, vars);
        acc = compositor
            .compose(&acc, layer, &text, typography, output)
            .await?;
    }
    Ok(acc)
}

// ---- private helpers ----

/// Starting pixels for a page: its `bg` artifact when the backgrounds
/// stage produced one, else the normalized template base.
async fn page_background(
    ctx: &PipelineContext,
    job_id: DbId,
    output: &OutputSpec,
    item: &WorkItem<'_>,
) -> Result<Vec<u8>, StageError> {
    if let Some(row) = ctx
        .jobs
        .artifact(job_id, ArtifactKind::Background.as_str(), item.page_num)
        .await?
    {
        return Ok(ctx.objects.get(&row.object_key).await?);
    }

    let base = ctx.templates.load_illustration(item.base_uri).await?;
    let normalized = images::normalize_long_side(images::decode(&base)?, output.page_size_px);
    images::encode_png(&normalized).map_err(StageError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finish_events_match_stage() {
        assert_eq!(finish_event(Stage::Prepay), JobEvent::PrepayReady);
        assert_eq!(finish_event(Stage::Postpay), JobEvent::Completed);
    }

    /// Appends the resolved text to the accumulator so layer order is
    /// observable in the output bytes.
    struct StampingCompositor;

    #[async_trait]
    impl TextCompositor for StampingCompositor {
        async fn compose(
            &self,
            accumulator_png: &[u8],
            _layer: &TextLayer,
            text: &str,
            _typography: &TypographySpec,
            _output: &OutputSpec,
        ) -> Result<Vec<u8>, StageError> {
            let mut out = accumulator_png.to_vec();
            out.extend_from_slice(b"|");
            out.extend_from_slice(text.as_bytes());
            Ok(out)
        }
    }

    fn layer(template: &str) -> TextLayer {
        serde_json::from_value(json!({
            "text_template": template,
            "position": "bottom-center",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn layers_fold_in_order_with_substituted_vars() {
        let typography: TypographySpec =
            serde_json::from_value(json!({ "font_uri": "fonts/body.ttf" })).unwrap();
        let vars = TemplateVars {
            child_name: "Mia".to_string(),
            child_age: Some(5),
            child_gender: None,
        };

        let folded = fold_text_layers(
            &StampingCompositor,
            b"base".to_vec(),
            &[layer("{child_name} sets sail"), layer("The End")],
            &vars,
            &typography,
            &OutputSpec::default(),
        )
        .await
        .unwrap();

        assert_eq!(folded, b"base|Mia sets sail|The End".to_vec());
    }
}
