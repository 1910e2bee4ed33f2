//! File system utilities for building the combined tree.
//!
//! All helpers are blocking and idempotent where that makes sense: removing
//! something that is already gone or creating something that already exists
//! succeeds. Callers run them inside `spawn_blocking`.

use crate::bundler::error::{ErrorExt, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Creates all of the directories of the specified path.
pub fn create_dir_all(path: &Path) -> Result<()> {
    fs::create_dir_all(path).fs_context("creating directory", path)
}

/// Removes the directory and its contents if it exists.
pub fn remove_dir_all(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).fs_context("removing directory", path),
    }
}

/// Removes a file if it exists. Returns whether something was removed.
pub fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).fs_context("removing file", path),
    }
}

/// Copies a regular file, creating the destination's parent directories and
/// overwriting any existing file.
///
/// Permissions are copied by the platform copy; the modification time is
/// carried over explicitly.
pub fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).fs_context("creating parent directory", parent)?;
    }
    // A read-only file left by an earlier component cannot be truncated.
    if fs::symlink_metadata(to).is_ok_and(|m| m.permissions().readonly()) {
        remove_file(to)?;
    }
    fs::copy(from, to).fs_context("copying file", to)?;

    let modified = fs::metadata(from)
        .and_then(|m| m.modified())
        .fs_context("reading modification time", from)?;
    #[cfg(unix)]
    let handle = fs::File::open(to);
    #[cfg(not(unix))]
    let handle = fs::File::options().write(true).open(to);
    handle
        .and_then(|f| f.set_modified(modified))
        .fs_context("setting modification time", to)?;
    Ok(())
}

/// Moves a file to `to`, replacing any file already there.
///
/// Falls back to copy and remove when `to` is on another filesystem.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_file(from, to)?;
            remove_file(from)?;
            Ok(())
        }
        Err(e) => Err(e).fs_context("moving file", to),
    }
}

/// Returns true when both files exist and have identical content.
pub fn same_content(a: &Path, b: &Path) -> Result<bool> {
    let (meta_a, meta_b) = (
        fs::metadata(a).fs_context("reading metadata", a)?,
        fs::metadata(b).fs_context("reading metadata", b)?,
    );
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }
    let content_a = fs::read(a).fs_context("reading file", a)?;
    let content_b = fs::read(b).fs_context("reading file", b)?;
    Ok(content_a == content_b)
}

/// Writes `content` to `path` unless the file already holds exactly that.
///
/// Returns whether the file was written. Skipping identical writes keeps
/// repeated runs from touching the file at all.
pub fn write_if_changed(path: &Path, content: &[u8]) -> Result<bool> {
    match fs::read(path) {
        Ok(existing) if existing == content => return Ok(false),
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).fs_context("reading file", path),
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).fs_context("creating parent directory", parent)?;
    }
    fs::write(path, content).fs_context("writing file", path)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn copy_file_preserves_mtime_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, b"payload").unwrap();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        fs::File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let dst = dir.path().join("a/b/dst.bin");
        copy_file(&src, &dst).unwrap();

        assert_eq!(fs::read(&dst).unwrap(), b"payload");
        assert_eq!(fs::metadata(&dst).unwrap().modified().unwrap(), old);
    }

    #[test]
    fn removals_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, "x").unwrap();
        assert!(remove_file(&file).unwrap());
        assert!(!remove_file(&file).unwrap());

        let sub = dir.path().join("sub/deeper");
        fs::create_dir_all(&sub).unwrap();
        assert!(remove_dir_all(&dir.path().join("sub")).unwrap());
        assert!(!remove_dir_all(&dir.path().join("sub")).unwrap());
    }

    #[test]
    fn write_if_changed_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg/tcp");
        assert!(write_if_changed(&path, b"a").unwrap());
        assert!(!write_if_changed(&path, b"a").unwrap());
        assert!(write_if_changed(&path, b"b").unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"b");
    }

    #[test]
    fn move_file_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let (from, to) = (dir.path().join("staged.zip"), dir.path().join("final.zip"));
        fs::write(&from, "new").unwrap();
        fs::write(&to, "old").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "new");
    }

    #[test]
    fn move_file_onto_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("notes.md");
        fs::write(&from, "notes").unwrap();
        let blocked = dir.path().join("taken");
        fs::create_dir(&blocked).unwrap();

        assert!(move_file(&from, &blocked).is_err());
        assert!(from.is_file());
    }

    #[test]
    fn same_content_compares_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let (a, b, c) = (dir.path().join("a"), dir.path().join("b"), dir.path().join("c"));
        fs::write(&a, "one").unwrap();
        fs::write(&b, "one").unwrap();
        fs::write(&c, "two").unwrap();
        assert!(same_content(&a, &b).unwrap());
        assert!(!same_content(&a, &c).unwrap());
    }
}
