//! Protocol client and workflow templating for the external generative
//! image service (a ComfyUI instance).
//!
//! The service is a black-box protocol peer with four operations: asset
//! upload, graph submission, status polling, and result fetch. This
//! crate owns that protocol ([`api`], [`client`]) and the translation of
//! abstract generation parameters into a concrete computation graph
//! ([`workflow`]).

pub mod api;
pub mod client;
pub mod history;
pub mod outputs;
pub mod request;
pub mod workflow;

pub use api::ComfyApi;
pub use client::{GenerationClient, GenerationConfig, GenerationError};
pub use request::GenerationRequest;
pub use workflow::WorkflowError;
