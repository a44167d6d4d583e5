//! The ephemeral generation request passed to the workflow engine.

/// Everything needed to run one image-swap attempt for one page.
///
/// Reconstructed per page per attempt; never persisted. Image payloads
/// are PNG-encoded bytes ready for upload.
#[derive(Clone)]
pub struct GenerationRequest {
    /// Customer-supplied child photo.
    pub photo_png: Vec<u8>,
    /// Base illustration for the page.
    pub illustration_png: Vec<u8>,
    /// Optional region-of-interest mask (three-channel; the graph reads
    /// a single channel of it).
    pub mask_png: Option<Vec<u8>>,
    /// Positive prompt.
    pub positive: String,
    /// Negative prompt.
    pub negative: String,
    /// Fixed random seed; `None` lets the client pick one.
    pub seed: Option<i64>,
}

impl std::fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Image payloads are large; log their sizes only.
        f.debug_struct("GenerationRequest")
            .field("photo_png", &self.photo_png.len())
            .field("illustration_png", &self.illustration_png.len())
            .field("mask_png", &self.mask_png.as_ref().map(Vec::len))
            .field("positive", &self.positive)
            .field("negative", &self.negative)
            .field("seed", &self.seed)
            .finish()
    }
}
