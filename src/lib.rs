//! Nintendo Switch CFW bundle builder.
//!
//! Tracks the latest releases of a fixed set of homebrew components
//! (Atmosphère, Hekate, SysDVR, ldn_mitm, sys-botbase, ftpd, JKSV) and, when
//! any of them changes, merges them into one SD card tree, applies safe
//! configuration defaults and emits a single archive.
//!
//! It can be used both as a CLI tool and as a library dependency.

pub mod bundler;
pub mod cli;
pub mod component;
pub mod error;
pub mod ledger;
pub mod release;
pub mod source;

// Re-export commonly used types
pub use error::{BundlerError, CliError, Result};
