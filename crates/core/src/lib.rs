//! Pure domain logic for the storyloom personalization pipeline.
//!
//! This crate has no internal dependencies and no I/O. Everything here is
//! a total function over plain data: the job lifecycle state machine, the
//! book manifest model, stage resolution, artifact key conventions, text
//! templating, and prompt assembly.

pub mod artifacts;
pub mod error;
pub mod manifest;
pub mod prompt;
pub mod regen;
pub mod stages;
pub mod state;
pub mod text_template;
pub mod types;
