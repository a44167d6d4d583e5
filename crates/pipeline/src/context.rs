//! Shared handles a stage needs to run.

use std::sync::Arc;

use storyloom_store::{ObjectStore, TemplateStore};
use tokio_util::sync::CancellationToken;

use crate::analyze::PhotoAnalyzer;
use crate::compose::TextCompositor;
use crate::generator::ImageGenerator;
use crate::job_store::JobStore;
use crate::mask::FaceDetector;

/// Dependency bundle for the pipeline. Cloning is cheap; everything is
/// behind an `Arc`.
#[derive(Clone)]
pub struct PipelineContext {
    pub jobs: Arc<dyn JobStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub templates: Arc<TemplateStore>,
    pub generator: Arc<dyn ImageGenerator>,
    pub detector: Arc<dyn FaceDetector>,
    pub analyzer: Arc<dyn PhotoAnalyzer>,
    pub compositor: Arc<dyn TextCompositor>,
    /// Worker shutdown token; stages check it between pages.
    pub cancel: CancellationToken,
}
