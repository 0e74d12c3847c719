//! Video frame sampling and feature extraction for deepfake screening.
//!
//! A run samples every N-th decoded frame, optionally crops it to the
//! dominant face, persists it to a scratch directory and hands it to three
//! feature extractors.

pub mod config;
pub mod core;
pub mod decoder;
pub mod error;
pub mod face;
pub mod logging;

#[cfg(test)]
mod test_support;

pub use crate::config::RunConfig;
pub use crate::core::{PipelineOrchestrator, RunOutcome};
pub use crate::error::{FailureKind, PipelineError, PipelineResult};
