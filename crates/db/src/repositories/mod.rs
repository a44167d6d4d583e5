//! Stateless repositories over the `jobs`, `artifacts`, and `tasks`
//! tables.

pub mod artifact_repo;
pub mod job_repo;
pub mod task_repo;

pub use artifact_repo::ArtifactRepo;
pub use job_repo::JobRepo;
pub use task_repo::TaskRepo;
