//! Object storage and image plumbing.
//!
//! [`ObjectStore`] is the seam between the pipeline and its backing
//! store: S3 in production ([`s3::S3Store`]), an in-memory map in tests
//! ([`object_store::MemoryStore`]). [`templates::TemplateStore`] layers
//! book-template access (manifest, workflow document, page assets) on
//! top, and [`images`] owns decode/encode/resize.

pub mod images;
pub mod object_store;
pub mod s3;
pub mod templates;

pub use object_store::{MemoryStore, ObjectStore};
pub use s3::S3Store;
pub use templates::TemplateStore;

/// Errors from the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    /// Backend failure (network, auth, service error).
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("malformed stored document: {0}")]
    Json(#[from] serde_json::Error),
}
