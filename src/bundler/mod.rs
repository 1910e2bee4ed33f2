//! The bundle engine.
//!
//! Turns upstream component releases into one SD card archive:
//!
//! 1. [`resolve`] finds the payload root inside each extracted component
//! 2. [`merge`] layers payload roots into the combined tree, base first
//! 3. [`sanitize`] applies the fixed post-merge configuration edits
//! 4. [`archive`] writes the combined tree to a deterministic zip
//!
//! [`builder`] drives these steps for a whole run.

pub mod archive;
pub mod builder;
pub mod error;
pub mod merge;
pub mod resolve;
pub mod sanitize;
pub mod staging;
pub mod utils;

pub use builder::{BuildOutcome, CheckOutcome, Pipeline, PipelineConfig, PipelineReport};
pub use error::{Context, Error, ErrorExt, Result, Step};
