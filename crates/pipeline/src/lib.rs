//! The personalization pipeline: stage implementations, the fallback
//! chain, and the library operations the web layer calls.
//!
//! External effects sit behind traits ([`JobStore`], [`ImageGenerator`],
//! [`FaceDetector`], [`PhotoAnalyzer`], [`TextCompositor`]) so every
//! stage runs unchanged against Postgres/S3/ComfyUI in production and
//! in-memory doubles in tests.

pub mod analyze;
pub mod background;
pub mod compose;
pub mod context;
pub mod error;
pub mod fallback;
pub mod generator;
pub mod job_store;
pub mod mask;
pub mod operations;
pub mod preview;
pub mod runner;
pub mod work;

pub use context::PipelineContext;
pub use error::StageError;
pub use generator::ImageGenerator;
pub use job_store::JobStore;
pub use mask::FaceDetector;
pub use runner::{run_task, StagePayload, TaskOutcome};
