//! Per-run working state.

use crate::bundler::error::{ErrorExt, Result};
use crate::component::Component;
use std::path::{Path, PathBuf};

/// Everything one pipeline run writes besides its final outputs.
///
/// Owns a temporary directory holding downloads, extracted trees, staging
/// areas and the combined tree. Dropping the context removes all of it, on
/// the success path and on every error path alike.
#[derive(Debug)]
pub struct RunContext {
    work: tempfile::TempDir,
    combined: PathBuf,
}

impl RunContext {
    /// Creates the work directory under the system temp directory.
    pub fn new() -> Result<Self> {
        Self::create(&std::env::temp_dir())
    }

    /// Creates the work directory under `parent`.
    pub fn create(parent: &Path) -> Result<Self> {
        let work = tempfile::Builder::new()
            .prefix("sysbot-cfw-")
            .tempdir_in(parent)
            .fs_context("creating work directory", parent)?;
        let combined = work.path().join("combined");
        std::fs::create_dir_all(&combined).fs_context("creating combined tree", &combined)?;

        log::debug!("Work directory: {}", work.path().display());
        Ok(Self { work, combined })
    }

    pub fn work_dir(&self) -> &Path {
        self.work.path()
    }

    /// The tree every component is merged into.
    pub fn combined_dir(&self) -> &Path {
        &self.combined
    }

    /// Where the component's asset is downloaded to.
    pub fn download_path(&self, component: Component) -> PathBuf {
        self.work
            .path()
            .join("downloads")
            .join(component.key())
            .join(component.download_name())
    }

    /// Extraction or staging directory of a component.
    pub fn component_dir(&self, component: Component) -> PathBuf {
        self.work.path().join("components").join(component.key())
    }

    /// Staging directory for local assets.
    pub fn assets_staging_dir(&self) -> PathBuf {
        self.work.path().join("local-assets")
    }

    /// Where the archive and notes wait until the run succeeds.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.work.path().join("artifacts")
    }
}

impl Drop for RunContext {
    fn drop(&mut self) {
        log::debug!("🧹 Removing work directory {}", self.work.path().display());
    }
}
