//! Row models and DTOs.

pub mod artifact;
pub mod job;
pub mod task;

pub use artifact::{ArtifactRow, NewArtifact};
pub use job::{JobRow, NewJob};
pub use task::{NewTask, TaskKind, TaskQueue, TaskRow, TaskStatus};
