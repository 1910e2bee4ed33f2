//! Pipeline orchestration.
//!
//! - [`context`] - Per-run work directory ([`RunContext`])
//! - [`orchestrator`] - The [`Pipeline`] driving check, build and persist
//! - [`checksum`] - SHA-256 of the finished archive

pub mod checksum;
pub mod context;
mod orchestrator;

pub use context::RunContext;
pub use orchestrator::{
    BuildOutcome, CheckOutcome, DEFAULT_BUNDLE_NAME, Pipeline, PipelineConfig, PipelineReport,
};
