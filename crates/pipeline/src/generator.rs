//! The image-generation seam over the external service.

use async_trait::async_trait;
use storyloom_comfyui::{GenerationClient, GenerationError, GenerationRequest};
use tokio_util::sync::CancellationToken;

/// One face-swap attempt against the generative service.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        workflow: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GenerationError>;
}

/// Production implementation backed by [`GenerationClient`].
pub struct ComfyGenerator {
    client: GenerationClient,
}

impl ComfyGenerator {
    pub fn new(client: GenerationClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageGenerator for ComfyGenerator {
    async fn generate(
        &self,
        request: &GenerationRequest,
        workflow: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, GenerationError> {
        self.client.generate(request, workflow, cancel).await
    }
}
