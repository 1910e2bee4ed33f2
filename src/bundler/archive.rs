//! Zip emission and extraction.
//!
//! [`build`] writes every directory of the combined tree as an explicit entry
//! before any file entry, so empty directories survive extraction. Entries
//! are sorted and carry the files' own modification times, so the same tree
//! always produces the same archive.

use super::error::{Error, ErrorExt, Result};
use chrono::{DateTime, Datelike, Timelike, Utc};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// A finished archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub path: PathBuf,
    pub directories: usize,
    pub files: usize,
    pub size: u64,
}

/// `<bundle>-<base tag>-Complete.zip`
pub fn archive_name(bundle_name: &str, base_tag: &str) -> String {
    format!("{bundle_name}-{base_tag}-Complete.zip")
}

/// Serializes `combined` into `output_dir/name`.
///
/// The archive is assembled in a temporary file next to the destination and
/// renamed into place at the end; a failure leaves no partial archive behind.
pub fn build(combined: &Path, output_dir: &Path, name: &str) -> Result<ArchiveArtifact> {
    std::fs::create_dir_all(output_dir).fs_context("creating output directory", output_dir)?;
    let final_path = output_dir.join(name);

    let mut directories = Vec::new();
    let mut files = Vec::new();
    for entry in WalkDir::new(combined).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            directories.push(entry.into_path());
        } else if entry.file_type().is_file() {
            files.push(entry.into_path());
        } else {
            log::warn!("Not archiving special file {}", entry.path().display());
        }
    }

    let tmp = tempfile::NamedTempFile::new_in(output_dir)
        .fs_context("creating temporary archive", output_dir)?;
    let handle = tmp
        .as_file()
        .try_clone()
        .fs_context("opening temporary archive", tmp.path())?;
    let mut zip = ZipWriter::new(BufWriter::new(handle));

    for dir in &directories {
        let entry_name = format!("{}/", entry_name(combined, dir)?);
        let options = SimpleFileOptions::default()
            .last_modified_time(zip_time(dir))
            .unix_permissions(0o755);
        zip.add_directory(entry_name, options)?;
    }

    for file in &files {
        let metadata = std::fs::metadata(file).fs_context("reading file metadata", file)?;
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip_time(file))
            .unix_permissions(unix_mode(&metadata))
            .large_file(metadata.len() >= u64::from(u32::MAX));
        zip.start_file(entry_name(combined, file)?, options)?;

        let mut source = std::fs::File::open(file).fs_context("opening file for archive", file)?;
        std::io::copy(&mut source, &mut zip).fs_context("writing archive entry", file)?;
    }

    let mut writer = zip.finish()?;
    writer.flush().fs_context("flushing archive", tmp.path())?;
    drop(writer);

    tmp.persist(&final_path)
        .map_err(|e| e.error)
        .fs_context("moving archive into place", &final_path)?;

    let size = std::fs::metadata(&final_path)
        .fs_context("reading archive metadata", &final_path)?
        .len();

    log::info!(
        "📦 Wrote {} ({} directories, {} files, {} bytes)",
        final_path.display(),
        directories.len(),
        files.len(),
        size
    );

    Ok(ArchiveArtifact {
        path: final_path,
        directories: directories.len(),
        files: files.len(),
        size,
    })
}

/// Unpacks a zip archive into `dest`.
pub fn extract(archive: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive).fs_context("opening archive", archive)?;
    let mut zip = ZipArchive::new(file)?;
    std::fs::create_dir_all(dest).fs_context("creating extraction directory", dest)?;
    zip.extract(dest)?;
    log::debug!("Extracted {} entries to {}", zip.len(), dest.display());
    Ok(())
}

/// `/`-separated path of `path` relative to `root`.
///
/// Names that are not valid UTF-8 are rejected rather than rewritten.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root)?;
    let parts = rel
        .components()
        .map(|c| {
            c.as_os_str().to_str().ok_or_else(|| {
                Error::GenericError(format!("{} is not a valid UTF-8 path", path.display()))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join("/"))
}

/// Zip timestamp for `path`, in UTC so the archive does not depend on the
/// builder's time zone. Falls back to the zip epoch when unavailable.
fn zip_time(path: &Path) -> zip::DateTime {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(to_zip_time)
        .unwrap_or_default()
}

fn to_zip_time(time: SystemTime) -> Option<zip::DateTime> {
    let utc: DateTime<Utc> = time.into();
    zip::DateTime::from_date_and_time(
        u16::try_from(utc.year()).ok()?,
        utc.month() as u8,
        utc.day() as u8,
        utc.hour() as u8,
        utc.minute() as u8,
        utc.second() as u8,
    )
    .ok()
}

#[cfg(unix)]
fn unix_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn unix_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() { 0o444 } else { 0o644 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::Read;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("atmosphere/exefs_patches")).unwrap();
        fs::create_dir_all(root.join("atmosphere/config")).unwrap();
        fs::create_dir_all(root.join("switch")).unwrap();
        fs::write(root.join("atmosphere/config/system_settings.ini"), "[atmosphere]").unwrap();
        fs::write(root.join("switch/JKSV.nro"), vec![7u8; 4096]).unwrap();
        fs::write(root.join("fusee.bin"), b"fusee").unwrap();
        dir
    }

    #[test]
    fn name_embeds_base_tag() {
        assert_eq!(
            archive_name("Pokemon-SysBot-CFW", "1.9.0"),
            "Pokemon-SysBot-CFW-1.9.0-Complete.zip"
        );
    }

    #[test]
    fn directories_come_before_files() {
        let tree = sample_tree();
        let out = tempfile::tempdir().unwrap();
        let artifact = build(tree.path(), out.path(), "b.zip").unwrap();
        assert_eq!(artifact.directories, 4);
        assert_eq!(artifact.files, 3);

        let mut zip = ZipArchive::new(fs::File::open(&artifact.path).unwrap()).unwrap();
        let kinds: Vec<bool> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().is_dir())
            .collect();
        let first_file = kinds.iter().position(|d| !d).unwrap();
        assert!(kinds[..first_file].iter().all(|d| *d));
        assert!(kinds[first_file..].iter().all(|d| !d));
        assert!(zip.by_name("atmosphere/exefs_patches/").unwrap().is_dir());
    }

    #[test]
    fn round_trip_preserves_tree() {
        let tree = sample_tree();
        let out = tempfile::tempdir().unwrap();
        let artifact = build(tree.path(), out.path(), "b.zip").unwrap();

        let restored = tempfile::tempdir().unwrap();
        extract(&artifact.path, restored.path()).unwrap();

        let listing = |root: &Path| -> BTreeMap<PathBuf, Option<Vec<u8>>> {
            WalkDir::new(root)
                .min_depth(1)
                .into_iter()
                .map(|e| e.unwrap())
                .map(|e| {
                    let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
                    let body = e.file_type().is_file().then(|| {
                        let mut buf = Vec::new();
                        fs::File::open(e.path()).unwrap().read_to_end(&mut buf).unwrap();
                        buf
                    });
                    (rel, body)
                })
                .collect()
        };

        assert_eq!(listing(tree.path()), listing(restored.path()));
        assert!(restored.path().join("atmosphere/exefs_patches").is_dir());
    }

    #[test]
    fn same_tree_same_bytes() {
        let tree = sample_tree();
        let out_a = tempfile::tempdir().unwrap();
        let out_b = tempfile::tempdir().unwrap();

        let a = build(tree.path(), out_a.path(), "b.zip").unwrap();
        let b = build(tree.path(), out_b.path(), "b.zip").unwrap();

        assert_eq!(fs::read(a.path).unwrap(), fs::read(b.path).unwrap());
    }

    #[test]
    fn only_the_final_archive_remains() {
        let tree = sample_tree();
        let out = tempfile::tempdir().unwrap();
        build(tree.path(), out.path(), "b.zip").unwrap();

        let names: Vec<_> = fs::read_dir(out.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.zip".to_string()]);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_names_are_rejected() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tree = sample_tree();
        let bad = tree.path().join("switch").join(OsStr::from_bytes(b"bad\xff.nro"));
        fs::write(&bad, b"x").unwrap();
        let out = tempfile::tempdir().unwrap();

        let err = build(tree.path(), out.path(), "b.zip").unwrap_err();

        assert!(err.to_string().contains("not a valid UTF-8 path"));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }
}
