//! High-level generation client: one call per face-swap attempt.
//!
//! `generate` drives the full protocol round trip: upload the assets,
//! patch the template, submit, poll history until completion, pick the
//! preferred output and fetch its bytes. Polling runs on a fixed cadence
//! against a hard deadline; a service that never completes surfaces as
//! [`GenerationError::Timeout`] rather than hanging a worker slot.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ComfyApi, ComfyApiError};
use crate::history::{parse_history, HistoryEntry};
use crate::outputs::{select_output, OutputPreference};
use crate::request::GenerationRequest;
use crate::workflow::{patch_template, AssetNames, PatchParams, WorkflowError};

/// Cadence of `GET /history` polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Hard deadline for one generation, measured from submission.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Tuning for a [`GenerationClient`].
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Intensity multiplier for strength-like template parameters.
    pub intensity: f64,
    pub output: OutputPreference,
    /// `filename_prefix` for the template's save nodes.
    pub output_prefix: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            poll_interval: POLL_INTERVAL,
            poll_timeout: POLL_TIMEOUT,
            intensity: 1.0,
            output: OutputPreference::default(),
            output_prefix: "storyloom".to_string(),
        }
    }
}

/// Failure modes of one generation attempt.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The service misbehaved: transport error, API error, or a completed
    /// execution with no usable output. Eligible for the fallback chain.
    #[error("generation service failure: {0}")]
    Service(String),

    /// The service did not complete within the deadline. Treated like a
    /// service failure by callers.
    #[error("generation timed out")]
    Timeout,

    /// The surrounding job was cancelled mid-flight.
    #[error("generation cancelled")]
    Cancelled,

    /// The template could not be patched by any dialect. A template
    /// defect; retrying cannot help.
    #[error(transparent)]
    Template(#[from] WorkflowError),
}

impl GenerationError {
    /// Whether the fallback chain should take over.
    pub fn is_service_failure(&self) -> bool {
        matches!(self, GenerationError::Service(_) | GenerationError::Timeout)
    }
}

impl From<ComfyApiError> for GenerationError {
    fn from(err: ComfyApiError) -> Self {
        GenerationError::Service(err.to_string())
    }
}

/// Client for running face-swap workflows against one ComfyUI instance.
pub struct GenerationClient {
    api: ComfyApi,
    config: GenerationConfig,
}

impl GenerationClient {
    pub fn new(api: ComfyApi, config: GenerationConfig) -> Self {
        Self { api, config }
    }

    pub fn api(&self) -> &ComfyApi {
        &self.api
    }

    /// Run one generation attempt and return the produced image bytes.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        template_json: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GenerationError> {
        let run_id = Uuid::new_v4();
        debug!(%run_id, ?request, "starting generation attempt");

        let assets = self.upload_assets(request, run_id).await?;
        let seed = request
            .seed
            .unwrap_or_else(|| rand::Rng::gen_range(&mut rand::thread_rng(), 0..i64::MAX));
        let params = PatchParams {
            positive: request.positive.clone(),
            negative: request.negative.clone(),
            seed,
            intensity: self.config.intensity,
            output_prefix: self.config.output_prefix.clone(),
        };
        let workflow = patch_template(template_json, &assets, &params)?;

        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }
        let submitted = self
            .api
            .submit_workflow(&workflow, &run_id.to_string())
            .await?;
        info!(%run_id, prompt_id = %submitted.prompt_id, queue_position = submitted.number,
              "workflow submitted");

        let entry = poll_until_complete(
            || async {
                let raw = self.api.get_history(&submitted.prompt_id).await?;
                parse_history(&raw, &submitted.prompt_id).map_err(|e| {
                    GenerationError::Service(format!("malformed history payload: {e}"))
                })
            },
            self.config.poll_interval,
            self.config.poll_timeout,
            cancel,
        )
        .await?;

        let image = select_output(&entry, &self.config.output).ok_or_else(|| {
            warn!(%run_id, prompt_id = %submitted.prompt_id, "execution completed with no images");
            GenerationError::Service("execution produced no output images".to_string())
        })?;
        let bytes = self
            .api
            .fetch_image(&image.filename, &image.subfolder, &image.folder_type)
            .await?;
        info!(%run_id, filename = %image.filename, size = bytes.len(), "generation complete");
        Ok(bytes)
    }

    // ---- private helpers ----

    /// Upload the request's images, using the server-assigned names.
    async fn upload_assets(
        &self,
        request: &GenerationRequest,
        run_id: Uuid,
    ) -> Result<AssetNames, GenerationError> {
        let photo = self
            .api
            .upload_image(&format!("{run_id}_photo.png"), request.photo_png.clone())
            .await?;
        let illustration = self
            .api
            .upload_image(
                &format!("{run_id}_illustration.png"),
                request.illustration_png.clone(),
            )
            .await?;
        let mask = match &request.mask_png {
            Some(bytes) => Some(
                self.api
                    .upload_image(&format!("{run_id}_mask.png"), bytes.clone())
                    .await?
                    .name,
            ),
            None => None,
        };
        Ok(AssetNames {
            photo: photo.name,
            illustration: illustration.name,
            mask,
        })
    }
}

/// Poll `fetch` on a fixed cadence until the entry reports completion,
/// the deadline passes, or the token is cancelled.
///
/// Factored out of [`GenerationClient::generate`] so the timing contract
/// is testable without a live service.
pub async fn poll_until_complete<F, Fut>(
    mut fetch: F,
    interval: Duration,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<HistoryEntry, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<HistoryEntry>, GenerationError>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        // The deadline also bounds the fetch itself: a service that
        // accepts the request and never responds must not hold the slot.
        tokio::select! {
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(GenerationError::Timeout),
            fetched = fetch() => {
                if let Some(entry) = fetched? {
                    if entry.is_completed() {
                        return Ok(entry);
                    }
                }
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            _ = tokio::time::sleep_until(deadline) => return Err(GenerationError::Timeout),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
