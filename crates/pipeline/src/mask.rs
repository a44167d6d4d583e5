//! Region-of-interest mask resolution.
//!
//! Priority order: explicit template mask, detector-driven ellipse,
//! default upper-half ellipse, full-white. Resolution never fails; any
//! error in an earlier source falls through to the next one. The result
//! is always a three-channel RGB image because the downstream graph
//! selects one channel of a regular image.

use async_trait::async_trait;
use image::RgbImage;
use storyloom_store::{images, TemplateStore};
use tracing::{debug, warn};

// ---- detector-driven ellipse geometry ----

/// Vertical center of the face ellipse within the detected box.
pub const FACE_CENTER_Y_FRAC: f32 = 0.55;
/// Horizontal semi-axis as a fraction of the box width.
pub const FACE_AX_FRAC: f32 = 0.8;
/// Vertical semi-axis as a fraction of the box height.
pub const FACE_AY_FRAC: f32 = 1.1;
/// Feather sigma floor, px.
pub const FEATHER_SIGMA_MIN: f32 = 8.0;
/// Feather sigma as a fraction of the short image side.
pub const FEATHER_SIGMA_FRAC: f32 = 0.03;

// ---- default ellipse (no detection) ----

pub const DEFAULT_CX_FRAC: f32 = 0.5;
pub const DEFAULT_CY_FRAC: f32 = 0.45;
pub const DEFAULT_AX_FRAC: f32 = 0.18;
pub const DEFAULT_AY_FRAC: f32 = 0.22;

/// Detected face bounding box in illustration pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Face detection seam. Heuristic or model-backed; `None` means no face.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    async fn detect(&self, image_png: &[u8]) -> Option<FaceBox>;
}

/// Detector that never finds a face; masks fall back to the default
/// ellipse.
pub struct NoFaceDetector;

#[async_trait]
impl FaceDetector for NoFaceDetector {
    async fn detect(&self, _image_png: &[u8]) -> Option<FaceBox> {
        None
    }
}

/// Feather width for a `width x height` mask.
pub fn feather_sigma(width: u32, height: u32) -> f32 {
    FEATHER_SIGMA_MIN.max(FEATHER_SIGMA_FRAC * width.min(height) as f32)
}

/// Ellipse derived from a detected face box: centered slightly below the
/// box center, widened past the box so hair and chin are covered.
pub fn face_ellipse_mask(width: u32, height: u32, face: FaceBox) -> RgbImage {
    images::render_ellipse_mask(
        width,
        height,
        face.x + face.width / 2.0,
        face.y + FACE_CENTER_Y_FRAC * face.height,
        FACE_AX_FRAC * face.width,
        FACE_AY_FRAC * face.height,
        feather_sigma(width, height),
    )
}

/// Default ellipse on the upper half of the page, where the subject's
/// head sits in most compositions.
pub fn default_ellipse_mask(width: u32, height: u32) -> RgbImage {
    images::render_ellipse_mask(
        width,
        height,
        DEFAULT_CX_FRAC * width as f32,
        DEFAULT_CY_FRAC * height as f32,
        DEFAULT_AX_FRAC * width as f32,
        DEFAULT_AY_FRAC * height as f32,
        feather_sigma(width, height),
    )
}

/// Resolve the mask for one illustration.
pub async fn resolve_mask(
    templates: &TemplateStore,
    detector: &dyn FaceDetector,
    base_uri: &str,
    illustration_png: &[u8],
    width: u32,
    height: u32,
) -> RgbImage {
    if width == 0 || height == 0 {
        return images::full_white_mask(1, 1);
    }

    match templates.load_explicit_mask(base_uri).await {
        Ok(Some(bytes)) => match images::decode(&bytes) {
            Ok(img) => {
                debug!(base_uri, "using explicit template mask");
                return img.to_rgb8();
            }
            Err(e) => warn!(base_uri, error = %e, "explicit mask undecodable, falling through"),
        },
        Ok(None) => {}
        Err(e) => warn!(base_uri, error = %e, "explicit mask unreadable, falling through"),
    }

    if let Some(face) = detector.detect(illustration_png).await {
        debug!(base_uri, ?face, "using detector-driven mask");
        return face_ellipse_mask(width, height, face);
    }

    debug!(base_uri, "using default ellipse mask");
    default_ellipse_mask(width, height)
}
