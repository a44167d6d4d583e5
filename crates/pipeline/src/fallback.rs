//! The per-page fallback chain.
//!
//! External generation, then a local direct face-replacement (a plain
//! mask-blend of the resized photo into the illustration; no region
//! conditioning, no style match), then the original illustration
//! unmodified. A degraded book beats a failed order, so service failures
//! never propagate out of this chain.

use storyloom_comfyui::{GenerationError, GenerationRequest};
use storyloom_store::images;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::StageError;
use crate::generator::ImageGenerator;

/// Which rung of the chain produced the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The external service generated the page.
    External,
    /// Local mask-blend face replacement.
    LocalSwap,
    /// Original illustration, unmodified.
    Passthrough,
}

/// Run the chain for one page. Returns PNG bytes plus the outcome.
///
/// Only template defects ([`StageError::Fatal`]) and cancellation escape;
/// service failures degrade instead of failing.
pub async fn swap_with_fallback(
    generator: &dyn ImageGenerator,
    request: &GenerationRequest,
    workflow: &str,
    cancel: &CancellationToken,
) -> Result<(Vec<u8>, SwapOutcome), StageError> {
    match generator.generate(request, workflow, cancel).await {
        Ok(bytes) => return Ok((bytes, SwapOutcome::External)),
        Err(GenerationError::Cancelled) => return Err(StageError::Cancelled),
        Err(GenerationError::Template(e)) => {
            // A template defect is not transient; no rung can fix it.
            return Err(StageError::Fatal(e.to_string()));
        }
        Err(e) => {
            warn!(error = %e, "external generation failed, trying local face swap");
        }
    }

    if let Some(bytes) = local_face_swap(request) {
        info!("local face swap succeeded");
        return Ok((bytes, SwapOutcome::LocalSwap));
    }

    warn!("local face swap unavailable, passing illustration through");
    Ok((request.illustration_png.clone(), SwapOutcome::Passthrough))
}

/// Blend the photo into the illustration's masked region. `None` when
/// the request carries no mask or any image fails to decode.
fn local_face_swap(request: &GenerationRequest) -> Option<Vec<u8>> {
    let mask_png = request.mask_png.as_ref()?;
    let base = images::decode(&request.illustration_png).ok()?.to_rgb8();
    let photo = images::decode(&request.photo_png).ok()?.to_rgb8();
    let mask = images::decode(mask_png).ok()?.to_rgb8();

    let blended = images::composite_masked(&base, &photo, &mask);
    images::encode_png(&image::DynamicImage::ImageRgb8(blended)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use storyloom_comfyui::workflow::WorkflowError;

    struct FailingGenerator(fn() -> GenerationError);

    #[async_trait]
    impl ImageGenerator for FailingGenerator {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _workflow: &str,
            _cancel: &CancellationToken,
        ) -> Result<Vec<u8>, GenerationError> {
            Err((self.0)())
        }
    }

    struct OkGenerator;

    #[async_trait]
    impl ImageGenerator for OkGenerator {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _workflow: &str,
            _cancel: &CancellationToken,
        ) -> Result<Vec<u8>, GenerationError> {
            Ok(vec![0xAA])
        }
    }

    fn png(width: u32, height: u32, value: u8) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([value, value, value]));
        images::encode_png(&image::DynamicImage::ImageRgb8(img)).unwrap()
    }

    fn request(with_mask: bool) -> GenerationRequest {
        GenerationRequest {
            photo_png: png(4, 4, 200),
            illustration_png: png(4, 4, 10),
            mask_png: with_mask.then(|| png(4, 4, 255)),
            positive: "girl".to_string(),
            negative: "low quality".to_string(),
            seed: Some(1),
        }
    }

    #[tokio::test]
    async fn external_success_short_circuits() {
        let (bytes, outcome) = swap_with_fallback(
            &OkGenerator,
            &request(true),
            "{}",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(bytes, vec![0xAA]);
        assert_eq!(outcome, SwapOutcome::External);
    }

    #[tokio::test]
    async fn service_failure_falls_back_to_local_swap() {
        let generator = FailingGenerator(|| GenerationError::Timeout);
        let (bytes, outcome) = swap_with_fallback(
            &generator,
            &request(true),
            "{}",
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(outcome, SwapOutcome::LocalSwap);
        // Fully-white mask: the blend is the photo.
        let img = images::decode(&bytes).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0)[0], 200);
    }

    #[tokio::test]
    async fn no_mask_passes_the_illustration_through() {
        let generator = FailingGenerator(|| GenerationError::Service("down".to_string()));
        let req = request(false);
        let (bytes, outcome) =
            swap_with_fallback(&generator, &req, "{}", &CancellationToken::new())
                .await
                .unwrap();
        assert_eq!(outcome, SwapOutcome::Passthrough);
        assert_eq!(bytes, req.illustration_png);
    }

    #[tokio::test]
    async fn template_defect_is_fatal() {
        let generator = FailingGenerator(|| {
            GenerationError::Template(WorkflowError::TemplateUnusable("no dialect".to_string()))
        });
        let err = swap_with_fallback(
            &generator,
            &request(true),
            "{}",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_matches!(err, StageError::Fatal(_));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let generator = FailingGenerator(|| GenerationError::Cancelled);
        let err = swap_with_fallback(
            &generator,
            &request(true),
            "{}",
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert_matches!(err, StageError::Cancelled);
    }
}
