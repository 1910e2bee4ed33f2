//! Layering payload roots into the combined tree.
//!
//! Directories are unioned, files are overwritten: whichever component is
//! integrated last owns a path. Each top-level directory of a payload is
//! merged in two passes, first every directory (so empty ones are never
//! lost), then every file.

use super::error::{Error, ErrorExt, Result};
use super::resolve::PayloadRoot;
use super::utils::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What one integration did to the combined tree.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeReport {
    /// Directories visited in the payload (created or already present).
    pub directories: usize,
    /// Files copied.
    pub files: usize,
    /// Bundle-relative files that existed with different content and were
    /// replaced.
    pub conflicts: Vec<PathBuf>,
}

impl MergeReport {
    fn absorb(&mut self, other: MergeReport) {
        self.directories += other.directories;
        self.files += other.files;
        self.conflicts.extend(other.conflicts);
    }
}

/// Merges the contents of `payload` into `combined`.
///
/// Entries are processed in name order so the outcome never depends on the
/// order the filesystem lists them in. A path that is a file on one side and a
/// directory on the other is rejected before anything is written. Any later
/// failure rolls the combined tree back to its state before the call.
pub fn integrate(payload: &PayloadRoot, combined: &Path) -> Result<MergeReport> {
    let root = payload.path();
    fs::create_dir_all(combined)?;
    check_type_clashes(root, combined)?;

    let mut journal = Journal::default();
    match merge_entries(root, combined, &mut journal) {
        Ok(report) => Ok(report),
        Err(e) => {
            log::warn!(
                "Merging {} failed, undoing {} change(s)",
                root.display(),
                journal.len()
            );
            journal.rollback();
            Err(e)
        }
    }
}

fn merge_entries(root: &Path, combined: &Path, journal: &mut Journal) -> Result<MergeReport> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(root)
        .fs_context("listing payload root", root)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .fs_context("listing payload root", root)?;
    entries.sort();

    let mut report = MergeReport::default();
    for entry in entries {
        let Some(name) = entry.file_name() else {
            continue;
        };
        let target = combined.join(name);

        if entry.is_dir() {
            report.absorb(merge_dir(&entry, &target, combined, journal)?);
        } else if entry.is_file() {
            copy_tracked(&entry, &target, combined, &mut report, journal)?;
        } else {
            log::debug!("Skipping special entry {}", entry.display());
        }
    }

    Ok(report)
}

/// Recursively merges `src` into `dst`.
fn merge_dir(
    src: &Path,
    dst: &Path,
    combined: &Path,
    journal: &mut Journal,
) -> Result<MergeReport> {
    let mut report = MergeReport::default();

    // Pass 1: the full directory structure, empty directories included.
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            let rel = entry.path().strip_prefix(src)?;
            journal.create_dir(&dst.join(rel))?;
            report.directories += 1;
        }
    }

    // Pass 2: every file, overwriting.
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() {
            let rel = entry.path().strip_prefix(src)?;
            copy_tracked(entry.path(), &dst.join(rel), combined, &mut report, journal)?;
        }
    }

    log::debug!(
        "Merged {}/ ({} directories, {} files)",
        dst.strip_prefix(combined).unwrap_or(dst).display(),
        report.directories,
        report.files
    );
    Ok(report)
}

fn copy_tracked(
    src: &Path,
    dst: &Path,
    combined: &Path,
    report: &mut MergeReport,
    journal: &mut Journal,
) -> Result<()> {
    if dst.is_file() && !fs::same_content(src, dst)? {
        report
            .conflicts
            .push(dst.strip_prefix(combined)?.to_path_buf());
    }
    journal.copy_file(src, dst)?;
    report.files += 1;
    Ok(())
}

/// Undo log of one [`integrate`] call.
///
/// Replaced files are backed up to a temporary directory before they are
/// overwritten; created files and directories are simply removed.
#[derive(Debug, Default)]
struct Journal {
    created_dirs: Vec<PathBuf>,
    created_files: Vec<PathBuf>,
    replaced: Vec<(PathBuf, PathBuf)>,
    backups: Option<tempfile::TempDir>,
}

impl Journal {
    fn len(&self) -> usize {
        self.created_dirs.len() + self.created_files.len() + self.replaced.len()
    }

    fn create_dir(&mut self, dir: &Path) -> Result<()> {
        if std::fs::symlink_metadata(dir).is_err() {
            self.created_dirs.push(dir.to_path_buf());
        }
        fs::create_dir_all(dir)
    }

    fn copy_file(&mut self, src: &Path, dst: &Path) -> Result<()> {
        if std::fs::symlink_metadata(dst).is_err() {
            self.created_files.push(dst.to_path_buf());
        } else if dst.is_file() {
            let backup = self.backup_dir()?.join(self.replaced.len().to_string());
            fs::copy_file(dst, &backup)?;
            self.replaced.push((dst.to_path_buf(), backup));
        }
        fs::copy_file(src, dst)
    }

    fn backup_dir(&mut self) -> Result<PathBuf> {
        if let Some(dir) = &self.backups {
            return Ok(dir.path().to_path_buf());
        }
        let dir = tempfile::Builder::new()
            .prefix("sysbot-merge-")
            .tempdir()
            .fs_context("creating merge backup directory", std::env::temp_dir())?;
        let path = dir.path().to_path_buf();
        self.backups = Some(dir);
        Ok(path)
    }

    /// Puts the combined tree back the way it was. Best effort: failures are
    /// logged and the remaining steps still run.
    fn rollback(self) {
        for file in self.created_files.iter().rev() {
            if let Err(e) = fs::remove_file(file) {
                log::warn!("Rollback: {}", e);
            }
        }
        for (file, backup) in self.replaced.iter().rev() {
            if let Err(e) = fs::copy_file(backup, file) {
                log::warn!("Rollback: {}", e);
            }
        }
        for dir in self.created_dirs.iter().rev() {
            if let Err(e) = fs::remove_dir_all(dir) {
                log::warn!("Rollback: {}", e);
            }
        }
    }
}

/// Fails if any payload path would replace a directory with a file or the
/// other way round.
fn check_type_clashes(root: &Path, combined: &Path) -> Result<()> {
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(root)?;
        let target = combined.join(rel);
        let clash = if entry.file_type().is_dir() {
            target.is_file()
        } else {
            target.is_dir()
        };
        if clash {
            return Err(Error::GenericError(format!(
                "{} is a {} in the payload but a {} in the combined tree",
                rel.display(),
                if entry.file_type().is_dir() { "directory" } else { "file" },
                if target.is_dir() { "directory" } else { "file" },
            )));
        }
    }
    Ok(())
}
