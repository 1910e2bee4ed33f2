//! Main pipeline orchestration.
//!
//! This module provides the [`Pipeline`] that takes a run from release
//! lookup to a finished archive and an updated version ledger.

use super::checksum::calculate_sha256;
use super::context::RunContext;
use crate::bundler::archive::{self, ArchiveArtifact};
use crate::bundler::error::{Error, Result, Step};
use crate::bundler::merge::{self, MergeReport};
use crate::bundler::resolve;
use crate::bundler::sanitize::{self, SanitizeReport};
use crate::bundler::staging;
use crate::bundler::utils::fs;
use crate::component::{AssetKind, Component};
use crate::ledger::{self, ChangeSet, VersionRecord};
use crate::release::notes::{self, NoteEntry};
use crate::release::{Outputs, ReleaseDraft};
use crate::source::{self, ComponentRelease, ReleaseSource};
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Default bundle name, prefix of the archive and of the combined tag.
pub const DEFAULT_BUNDLE_NAME: &str = "Pokemon-SysBot-CFW";

/// Settings of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Prefix of the archive name and of the combined tag.
    pub bundle_name: String,
    /// Version ledger location.
    pub state_file: PathBuf,
    /// Where the archive and the release notes are written.
    pub output_dir: PathBuf,
    /// Local assets laid over the merged components, if present.
    pub assets_dir: PathBuf,
    /// Parent of the temporary work directory; system temp dir when `None`.
    pub work_root: Option<PathBuf>,
    /// Build even when no component changed.
    pub force: bool,
    /// Stop after computing changes.
    pub check_only: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bundle_name: DEFAULT_BUNDLE_NAME.to_string(),
            state_file: PathBuf::from(ledger::DEFAULT_STATE_FILE),
            output_dir: PathBuf::from("."),
            assets_dir: PathBuf::from("assets"),
            work_root: None,
            force: false,
            check_only: false,
        }
    }
}

/// What the release lookup found.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Latest release of every component, in integration order.
    pub releases: Vec<ComponentRelease>,
    pub current: VersionRecord,
    pub changes: ChangeSet,
}

impl CheckOutcome {
    /// Tag of the base component, which names the bundle.
    pub fn base_tag(&self) -> &str {
        self.current
            .get(Component::base().key())
            .unwrap_or(ledger::UNSEEN_TAG)
    }

    /// `<bundle>-<base tag>-Complete`
    pub fn combined_tag(&self, bundle_name: &str) -> String {
        format!("{}-{}-Complete", bundle_name, self.base_tag())
    }
}

/// A finished build.
///
/// Until [`BuildOutcome::deliver`] runs, the archive and notes sit in the
/// run's work directory. `archive.path` and `notes_path` name where they land
/// in the output directory.
#[derive(Debug)]
pub struct BuildOutcome {
    pub archive: ArchiveArtifact,
    /// Hex SHA-256 of the archive.
    pub checksum: String,
    /// Unique release identifier, `v<base tag>-<timestamp>`.
    pub release_tag: String,
    pub title: String,
    pub notes: String,
    pub notes_path: PathBuf,
    /// Components merged into the bundle, in order.
    pub integrated: Vec<Component>,
    /// Optional components left out because they failed.
    pub skipped: Vec<Component>,
    /// Files overwritten with different content, across all merges.
    pub conflicts: Vec<PathBuf>,
    pub sanitized: SanitizeReport,
    staged: Option<Staged>,
}

/// Build outputs still inside the work directory.
#[derive(Debug)]
struct Staged {
    _work: RunContext,
    archive: PathBuf,
    notes: PathBuf,
}

impl BuildOutcome {
    /// Whether the archive and notes have been moved to the output directory.
    pub fn is_delivered(&self) -> bool {
        self.staged.is_none()
    }

    /// The archive file where it currently is on disk.
    pub fn archive_file(&self) -> &Path {
        self.staged
            .as_ref()
            .map_or(&self.archive.path, |staged| &staged.archive)
    }

    /// Release to publish for this build.
    pub fn draft(&self) -> ReleaseDraft {
        ReleaseDraft {
            tag: self.release_tag.clone(),
            title: self.title.clone(),
            body: self.notes.clone(),
            archive: self.archive_file().to_path_buf(),
        }
    }

    /// Moves the archive and notes into the output directory and removes the
    /// work directory.
    ///
    /// The notes move first and are taken back if the archive cannot follow,
    /// so a failure leaves neither in the output directory.
    pub async fn deliver(&mut self) -> Result<()> {
        let Some(staged) = self.staged.take() else {
            return Ok(());
        };
        let (from_archive, from_notes) = (staged.archive.clone(), staged.notes.clone());
        let (to_archive, to_notes) = (self.archive.path.clone(), self.notes_path.clone());

        blocking(move || {
            if let Some(dir) = to_archive.parent() {
                fs::create_dir_all(dir)?;
            }
            fs::move_file(&from_notes, &to_notes)?;
            if let Err(e) = fs::move_file(&from_archive, &to_archive) {
                discard(&to_notes);
                return Err(e);
            }
            Ok(())
        })
        .await?;

        log::info!("📦 Delivered {}", self.archive.path.display());
        drop(staged);
        Ok(())
    }

    /// Removes delivered outputs after a later step of the run failed.
    fn retract(&self) {
        if self.is_delivered() {
            discard(&self.archive.path);
            discard(&self.notes_path);
        }
    }
}

fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        log::warn!("Could not remove {}: {}", path.display(), e);
    }
}

/// Result of [`Pipeline::execute`].
#[derive(Debug)]
pub struct PipelineReport {
    pub check: CheckOutcome,
    /// Whether a new bundle is warranted (changes found, or forced).
    pub release_needed: bool,
    /// Present when a bundle was built.
    pub build: Option<BuildOutcome>,
}

impl PipelineReport {
    /// Machine-readable outputs of the run.
    pub fn outputs(&self, bundle_name: &str) -> Outputs {
        let mut outputs = Outputs::new();
        outputs.set("new_release", self.release_needed.to_string());
        outputs.set("combined_tag", self.check.combined_tag(bundle_name));

        for release in &self.check.releases {
            let key = release.component.key();
            outputs.set(format!("{key}_version"), release.tag.as_str());
            outputs.set(format!("{key}_asset_url"), release.asset.download_url.as_str());
        }

        if !self.check.changes.is_empty() {
            outputs.set("changes", self.check.changes.summary());
        }

        if let Some(build) = &self.build {
            outputs.set("release_tag", build.release_tag.as_str());
            outputs.set("archive", build.archive.path.display().to_string());
            outputs.set("archive_sha256", build.checksum.as_str());
        }

        outputs
    }
}

/// Drives one run: look up releases, compare with the ledger, build the
/// bundle and record the new versions.
///
/// The steps are split so a caller can put work between the build and its
/// delivery (publishing, writing outputs). [`Pipeline::execute`] writes
/// nothing outside the work directory; [`Pipeline::finish`] moves the bundle
/// into the output directory and updates the ledger.
///
/// # Examples
///
/// ```no_run
/// use sysbot_cfw_bundle::bundler::{Pipeline, PipelineConfig};
/// use sysbot_cfw_bundle::source::GitHubSource;
///
/// # async fn example() -> sysbot_cfw_bundle::bundler::Result<()> {
/// let source = GitHubSource::new("https://api.github.com", None)?;
/// let config = PipelineConfig::default();
/// let pipeline = Pipeline::new(&source, &config);
///
/// let report = pipeline.run().await?;
/// if let Some(build) = &report.build {
///     println!("Built {}", build.archive.path.display());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Pipeline<'a, S> {
    source: &'a S,
    config: &'a PipelineConfig,
}

impl<'a, S: ReleaseSource> Pipeline<'a, S> {
    pub fn new(source: &'a S, config: &'a PipelineConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.config
    }

    /// Executes the pipeline, delivers the bundle and records the new
    /// versions.
    pub async fn run(&self) -> Result<PipelineReport> {
        let mut report = self.execute().await?;
        self.finish(&mut report).await?;
        Ok(report)
    }

    /// Looks up every component and builds the bundle when warranted.
    ///
    /// In check-only mode, or when nothing changed and the run is not
    /// forced, returns without building.
    pub async fn execute(&self) -> Result<PipelineReport> {
        let check = self.check().await?;
        let release_needed = !check.changes.is_empty() || self.config.force;

        if self.config.check_only {
            log::info!("Check only, not building");
            return Ok(PipelineReport {
                check,
                release_needed,
                build: None,
            });
        }

        if !release_needed {
            log::info!("✓ All components up to date, nothing to build");
            return Ok(PipelineReport {
                check,
                release_needed,
                build: None,
            });
        }

        if check.changes.is_empty() {
            log::info!("No component changed, building anyway (forced)");
        }

        let build = self.build(&check).await?;
        Ok(PipelineReport {
            check,
            release_needed,
            build: Some(build),
        })
    }

    /// Fetches the latest release of every component and diffs the result
    /// against the ledger.
    ///
    /// Any fetch failure aborts: no partial change set is computed.
    pub async fn check(&self) -> Result<CheckOutcome> {
        log::info!("🔍 Checking {} components", Component::ALL.len());
        let releases = source::fetch_all(self.source).await?;

        let current: VersionRecord = releases
            .iter()
            .map(|r| (r.component.key().to_string(), r.tag.clone()))
            .collect();
        let changes = ledger::compute_changes(&current, &ledger::load(&self.config.state_file));

        if changes.is_empty() {
            log::info!("No version changes");
        } else {
            log::info!("🆕 {} change(s):", changes.len());
            for change in changes.iter() {
                log::info!("  {}", change);
            }
        }

        Ok(CheckOutcome {
            releases,
            current,
            changes,
        })
    }

    /// Builds the bundle for the releases in `check`.
    ///
    /// Everything is written inside a [`RunContext`]. On error it is removed
    /// before this returns. On success the archive and notes stay staged in
    /// it until [`BuildOutcome::deliver`].
    pub async fn build(&self, check: &CheckOutcome) -> Result<BuildOutcome> {
        let ctx = match &self.config.work_root {
            Some(root) => RunContext::create(root)?,
            None => RunContext::new()?,
        };

        let mut integrated = Vec::new();
        let mut skipped = Vec::new();
        let mut conflicts = Vec::new();

        for release in &check.releases {
            let component = release.component;
            match self.integrate_component(&ctx, release).await {
                Ok(report) => {
                    log::info!(
                        "✓ {} {} merged ({} directories, {} files)",
                        component.display_name(),
                        release.tag,
                        report.directories,
                        report.files
                    );
                    for path in &report.conflicts {
                        log::warn!("{} overwrote {}", component, path.display());
                    }
                    conflicts.extend(report.conflicts);
                    integrated.push(component);
                }
                Err(e) if component.is_base() => return Err(e),
                Err(e) => {
                    log::warn!("⚠️ {}, skipping {}", e, component.display_name());
                    skipped.push(component);
                }
            }
        }

        let assets_dir = self.config.assets_dir.clone();
        let assets_staging = ctx.assets_staging_dir();
        let combined = ctx.combined_dir().to_path_buf();
        let assets = blocking(move || {
            match staging::stage_local_assets(&assets_dir, &assets_staging)? {
                Some(root) => merge::integrate(&root, &combined).map(Some),
                None => Ok(None),
            }
        })
        .await?;
        if let Some(report) = assets {
            log::info!("✓ Local assets applied ({} files)", report.files);
        }

        let combined = ctx.combined_dir().to_path_buf();
        let sanitized = blocking(move || sanitize::sanitize(&combined)).await?;
        log::info!("🧹 Sanitized combined tree ({} change(s))", sanitized.changes());

        let base_tag = check.base_tag().to_string();
        let name = archive::archive_name(&self.config.bundle_name, &base_tag);
        let combined = ctx.combined_dir().to_path_buf();
        let artifacts = ctx.artifacts_dir();
        let staged_name = name.clone();
        let artifact =
            blocking(move || archive::build(&combined, &artifacts, &staged_name)).await?;

        let checksum = calculate_sha256(&artifact.path).await?;
        log::info!("SHA256: {}", checksum);

        let now = Utc::now();
        let release_tag = ledger::release_tag(&base_tag, &now);
        let title = notes::release_title(&self.config.bundle_name, &base_tag);
        let entries = |components: &[Component]| -> Vec<NoteEntry> {
            components
                .iter()
                .filter_map(|c| check.releases.iter().find(|r| r.component == *c))
                .map(|r| NoteEntry {
                    name: r.component.display_name().to_string(),
                    version: r.tag.clone(),
                    purpose: r.component.purpose().to_string(),
                })
                .collect()
        };
        let body = notes::render(
            &self.config.bundle_name,
            &entries(&integrated),
            &entries(&skipped),
            now,
        )?;
        let staged_notes = notes::write(&body, &ctx.artifacts_dir()).await?;

        log::info!("✅ Bundle {} ready", release_tag);

        let staged = Staged {
            archive: artifact.path.clone(),
            notes: staged_notes,
            _work: ctx,
        };
        Ok(BuildOutcome {
            archive: ArchiveArtifact {
                path: self.config.output_dir.join(&name),
                ..artifact
            },
            checksum,
            release_tag,
            title,
            notes: body,
            notes_path: self.config.output_dir.join(notes::NOTES_FILE),
            integrated,
            skipped,
            conflicts,
            sanitized,
            staged: Some(staged),
        })
    }

    /// Last step of a successful run: delivers the bundle into the output
    /// directory, then records the new versions.
    ///
    /// If the ledger cannot be written the delivered files are removed again.
    /// Returns whether the ledger was written.
    pub async fn finish(&self, report: &mut PipelineReport) -> Result<bool> {
        if let Some(build) = report.build.as_mut() {
            build.deliver().await?;
        }
        self.commit(report).inspect_err(|_| {
            if let Some(build) = &report.build {
                build.retract();
            }
        })
    }

    /// Records the versions of a built bundle in the ledger.
    ///
    /// Does nothing when no bundle was built or when no version changed.
    /// Returns whether the ledger was written.
    pub fn commit(&self, report: &PipelineReport) -> Result<bool> {
        if report.build.is_none() || self.config.check_only {
            return Ok(false);
        }
        if report.check.changes.is_empty() {
            log::info!("Versions unchanged, ledger left as is");
            return Ok(false);
        }
        ledger::persist(&report.check.current, &self.config.state_file)?;
        log::info!("💾 Versions saved to {}", self.config.state_file.display());
        Ok(true)
    }

    /// Download, payload resolution and merge of one component.
    ///
    /// Every error names the component and the step it failed in.
    async fn integrate_component(
        &self,
        ctx: &RunContext,
        release: &ComponentRelease,
    ) -> Result<MergeReport> {
        let component = release.component;
        let key = component.key();

        let download = ctx.download_path(component);
        self.source
            .download(&release.asset, &download)
            .await
            .map_err(|e| Error::component(key, Step::Download, e))?;

        let component_dir = ctx.component_dir(component);
        let payload = match component.asset_kind() {
            AssetKind::Archive => {
                let (archive_path, tree) = (download.clone(), component_dir.clone());
                blocking(move || archive::extract(&archive_path, &tree))
                    .await
                    .map_err(|e| Error::component(key, Step::Extract, e))?;

                let tree = component_dir.clone();
                match blocking(move || Ok(resolve::resolve(&tree))).await? {
                    Some(root) => root,
                    None if component.is_base() => {
                        return Err(Error::UnresolvedBase {
                            component: key,
                            path: component_dir,
                        });
                    }
                    None => {
                        return Err(Error::component(
                            key,
                            Step::Resolve,
                            "no atmosphere/, bootloader/ or switch/ directory found",
                        ));
                    }
                }
            }
            AssetKind::File { placements } => {
                let (file, tree) = (download.clone(), component_dir.clone());
                blocking(move || staging::stage_file(&file, placements, &tree))
                    .await
                    .map_err(|e| Error::component(key, Step::Extract, e))?
            }
        };
        log::debug!(
            "{}: payload root {} ({:?})",
            component,
            payload.path().display(),
            payload.heuristic()
        );

        let combined = ctx.combined_dir().to_path_buf();
        blocking(move || merge::integrate(&payload, &combined))
            .await
            .map_err(|e| Error::component(key, Step::Merge, e))
    }
}

/// Runs filesystem work on the blocking pool and waits for it.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
