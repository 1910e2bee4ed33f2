//! Version ledger: last processed tag per component.
//!
//! The ledger is the only state that survives between runs. It is loaded
//! leniently (a missing or unreadable file means "nothing seen yet"), compared
//! against the tags fetched in the current run, and rewritten atomically only
//! after a bundle was actually built.

use crate::bundler::{ErrorExt, Result};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::Write;
use std::path::Path;

/// Default location of the persisted ledger.
pub const DEFAULT_STATE_FILE: &str = "last_versions.json";

/// Placeholder shown for components that have no previous tag.
pub const UNSEEN_TAG: &str = "N/A";

/// Older state files suffixed every key with this.
const LEGACY_KEY_SUFFIX: &str = "_version";

/// Mapping from component key to the last processed release tag.
///
/// Tags are opaque: they are only ever compared for equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionRecord(BTreeMap<String, String>);

impl VersionRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, tag: impl Into<String>) {
        self.0.insert(key.into(), tag.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Normalizes keys written by older versions of the state file and drops
    /// empty placeholder tags.
    fn normalized(self) -> Self {
        let entries = self
            .0
            .into_iter()
            .filter(|(_, tag)| !tag.is_empty())
            .map(|(key, tag)| match key.strip_suffix(LEGACY_KEY_SUFFIX) {
                Some(stripped) => (stripped.to_string(), tag),
                None => (key, tag),
            })
            .collect();
        Self(entries)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VersionRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A single component whose tag moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub key: String,
    pub old: String,
    pub new: String,
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} → {}", self.key, self.old, self.new)
    }
}

/// Components whose current tag differs from the recorded one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet(Vec<Change>);

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.0.iter()
    }

    /// One line per change, `key: old → new`.
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Loads the ledger from `path`.
///
/// Never fails: a missing file or one that does not parse yields an empty
/// record, and the reason is logged.
pub fn load(path: &Path) -> VersionRecord {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("No version state at {}, starting fresh", path.display());
            return VersionRecord::new();
        }
        Err(e) => {
            log::warn!(
                "Cannot read version state {}: {}. Treating as empty",
                path.display(),
                e
            );
            return VersionRecord::new();
        }
    };

    match serde_json::from_str::<VersionRecord>(&content) {
        Ok(record) => {
            let record = record.normalized();
            log::debug!("Loaded {} recorded versions", record.len());
            record
        }
        Err(e) => {
            log::warn!(
                "Version state {} is corrupt ({}). Treating as empty",
                path.display(),
                e
            );
            VersionRecord::new()
        }
    }
}

/// Compares freshly fetched tags against the recorded ones.
///
/// Every key of `current` is checked; a key missing from `previous` counts as
/// changed with an old tag of [`UNSEEN_TAG`].
pub fn compute_changes(current: &VersionRecord, previous: &VersionRecord) -> ChangeSet {
    let changes = current
        .iter()
        .filter_map(|(key, tag)| match previous.get(key) {
            Some(old) if old == tag => None,
            old => Some(Change {
                key: key.to_string(),
                old: old.unwrap_or(UNSEEN_TAG).to_string(),
                new: tag.to_string(),
            }),
        })
        .collect();
    ChangeSet(changes)
}

/// Writes the full record to `path`, replacing the previous file atomically.
pub fn persist(record: &VersionRecord, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).fs_context("creating state directory", dir)?;

    let json = serde_json::to_string_pretty(record)?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(dir).fs_context("creating temporary state file", dir)?;
    tmp.write_all(json.as_bytes())
        .fs_context("writing version state", tmp.path())?;
    tmp.as_file()
        .sync_all()
        .fs_context("syncing version state", tmp.path())?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .fs_context("replacing version state", path)?;

    log::info!("Recorded {} component versions in {}", record.len(), path.display());
    Ok(())
}

/// Unique identifier for the release produced by this run.
///
/// The base tag alone is not enough: a forced rebuild without upstream changes
/// must not collide with the release created for the same tags earlier.
pub fn release_tag<Tz: TimeZone>(base_tag: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("v{}-{}", base_tag, at.format("%Y%m%d-%H%M%S"))
}
