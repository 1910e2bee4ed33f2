//! Error types for the bundle engine.
//!
//! Every step of the pipeline reports failures through [`Error`]. Filesystem
//! failures carry the operation and path that failed, component failures carry
//! the component key and the pipeline step, so a fatal error printed by the CLI
//! always says *what* broke and *where*.

use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline step a component failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Querying the release source for the latest release.
    Fetch,
    /// Transferring the selected asset.
    Download,
    /// Unpacking the downloaded archive.
    Extract,
    /// Locating the payload root inside the extracted tree.
    Resolve,
    /// Merging the payload root into the combined tree.
    Merge,
}

impl Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::Fetch => "fetch",
            Step::Download => "download",
            Step::Extract => "extract",
            Step::Resolve => "resolve",
            Step::Merge => "merge",
        };
        f.write_str(name)
    }
}

/// Engine error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Free-form failure.
    #[error("{0}")]
    GenericError(String),

    /// Filesystem failure with the operation and path that caused it.
    #[error("{context} ({path}): {source}")]
    Fs {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bare IO failure.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Directory traversal failure.
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// Path outside of the tree being walked.
    #[error("path prefix error: {0}")]
    StripPrefix(#[from] std::path::StripPrefixError),

    /// Zip read/write failure.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Release notes rendering failure.
    #[error("template error: {0}")]
    Template(#[from] handlebars::RenderError),

    /// A component failed in one of the pipeline steps.
    #[error("component '{component}' failed to {step}: {reason}")]
    Component {
        component: &'static str,
        step: Step,
        reason: String,
    },

    /// The base component produced no payload root.
    #[error(
        "base component '{component}' has no recognizable payload in {}; \
         expected one of atmosphere/, bootloader/ or switch/",
        path.display()
    )]
    UnresolvedBase { component: &'static str, path: PathBuf },

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// Builds a [`Error::Component`] failure.
    pub fn component(component: &'static str, step: Step, reason: impl Display) -> Self {
        Error::Component {
            component,
            step,
            reason: reason.to_string(),
        }
    }
}

/// Attach a filesystem context (operation + path) to IO results.
pub trait ErrorExt<T> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &str, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|source| Error::Fs {
            context: context.to_string(),
            path: path.as_ref().to_path_buf(),
            source,
        })
    }
}

/// Attach a message to failures and to missing values.
pub trait Context<T> {
    fn context<C: Display>(self, context: C) -> Result<T>;

    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T>;
}

impl<T, E: Display> Context<T> for std::result::Result<T, E> {
    fn context<C: Display>(self, context: C) -> Result<T> {
        self.map_err(|e| Error::GenericError(format!("{context}: {e}")))
    }

    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.map_err(|e| Error::GenericError(format!("{}: {e}", f())))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C: Display>(self, context: C) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Return early with a [`Error::GenericError`] built from a format string.
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::bundler::Error::GenericError(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_error_names_component_and_step() {
        let err = Error::component("sysdvr", Step::Download, "HTTP 404");
        assert_eq!(
            err.to_string(),
            "component 'sysdvr' failed to download: HTTP 404"
        );
    }

    #[test]
    fn fs_context_keeps_path() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = io.fs_context("reading state", "/tmp/state.json").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("reading state"));
        assert!(msg.contains("/tmp/state.json"));
    }

    #[test]
    fn option_context() {
        let missing: Option<u8> = None;
        let err = missing.context("no asset").unwrap_err();
        assert_eq!(err.to_string(), "no asset");
    }
}
