//! Payload root discovery inside extracted component archives.
//!
//! Upstream projects do not agree on how to package an SD card layout, and
//! the same project changes its layout between releases. Some archives have
//! `atmosphere/` at the top, some wrap everything in `project-v1.2.3/`, some
//! ship an explicit `sd/` folder. [`resolve`] tries an ordered table of
//! heuristics and returns the first hit:
//!
//! 1. a marker directory (`sd`, `sdcard`, ...) directly under the tree,
//!    confirmed by containing a known payload directory
//! 2. the same marker deeper in the tree, up to [`MAX_SEARCH_DEPTH`]
//! 3. the outermost descendant that directly contains a payload directory
//! 4. the tree root itself
//!
//! Every heuristic only accepts a directory that directly contains one of
//! [`PAYLOAD_DIRS`], so a resolved root always has something to merge.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Top-level directories of an SD card payload.
pub const PAYLOAD_DIRS: [&str; 3] = ["atmosphere", "bootloader", "switch"];

/// Conventional names of a folder meant to be copied to the SD card root.
/// Compared case-insensitively.
pub const MARKER_NAMES: [&str; 4] = ["sd", "sdcard", "sd_card", "sd card"];

/// Deepest level (relative to the extracted tree) searched by the nested
/// heuristics.
pub const MAX_SEARCH_DEPTH: usize = 4;

/// Archive noise that never holds payload.
const IGNORED_DIRS: [&str; 1] = ["__MACOSX"];

/// Which heuristic located a payload root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heuristic {
    TopLevelMarker,
    NestedMarker,
    NestedPayload,
    TreeRoot,
}

impl Display for Heuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Heuristic::TopLevelMarker => "top-level marker directory",
            Heuristic::NestedMarker => "nested marker directory",
            Heuristic::NestedPayload => "nested payload directory",
            Heuristic::TreeRoot => "archive root",
        };
        f.write_str(name)
    }
}

/// Directory whose contents are merged into the combined tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadRoot {
    path: PathBuf,
    heuristic: Heuristic,
}

impl PayloadRoot {
    /// Wraps a directory that is known to be a payload root, such as a staged
    /// tree built from single-file assets.
    pub fn staged(path: PathBuf) -> Self {
        Self {
            path,
            heuristic: Heuristic::TreeRoot,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn heuristic(&self) -> Heuristic {
        self.heuristic
    }
}

struct Rule {
    heuristic: Heuristic,
    find: fn(&Path) -> Option<PathBuf>,
}

/// Evaluated in order, lazily; the first rule that finds something wins.
const RULES: &[Rule] = &[
    Rule {
        heuristic: Heuristic::TopLevelMarker,
        find: top_level_marker,
    },
    Rule {
        heuristic: Heuristic::NestedMarker,
        find: nested_marker,
    },
    Rule {
        heuristic: Heuristic::NestedPayload,
        find: nested_payload,
    },
    Rule {
        heuristic: Heuristic::TreeRoot,
        find: tree_root,
    },
];

/// Finds the payload root of an extracted tree.
///
/// Returns `None` when no heuristic matches.
pub fn resolve(tree: &Path) -> Option<PayloadRoot> {
    let root = RULES.iter().find_map(|rule| {
        (rule.find)(tree).map(|path| PayloadRoot {
            path,
            heuristic: rule.heuristic,
        })
    });

    match &root {
        Some(root) => log::debug!(
            "Payload root {} ({}), contains {}",
            root.path.display(),
            root.heuristic,
            payload_dirs_in(&root.path).join(", ")
        ),
        None => log::debug!("No payload root in {}", tree.display()),
    }
    root
}

fn top_level_marker(tree: &Path) -> Option<PathBuf> {
    candidate_dirs(tree, 1, 1)
        .into_iter()
        .find(|dir| is_marker(dir) && has_payload_dir(dir))
}

fn nested_marker(tree: &Path) -> Option<PathBuf> {
    candidate_dirs(tree, 2, MAX_SEARCH_DEPTH)
        .into_iter()
        .find(|dir| is_marker(dir) && has_payload_dir(dir))
}

fn nested_payload(tree: &Path) -> Option<PathBuf> {
    // A root that already qualifies is the payload; a qualifying descendant
    // would be an unrelated folder that happens to contain `switch/`.
    if has_payload_dir(tree) {
        return None;
    }

    let matches: Vec<(usize, PathBuf)> = candidate_dirs_with_depth(tree, 1, MAX_SEARCH_DEPTH)
        .into_iter()
        .filter(|(_, dir)| has_payload_dir(dir))
        .collect();

    let (depth, first) = matches.first()?.clone();
    let rivals = matches.iter().filter(|(d, _)| *d == depth).count() - 1;
    if rivals > 0 {
        log::warn!(
            "{} other directories at depth {} also look like payload roots; using {}",
            rivals,
            depth,
            first.display()
        );
    }
    Some(first)
}

fn tree_root(tree: &Path) -> Option<PathBuf> {
    has_payload_dir(tree).then(|| tree.to_path_buf())
}

/// True when `dir` directly contains at least one of [`PAYLOAD_DIRS`].
pub fn has_payload_dir(dir: &Path) -> bool {
    PAYLOAD_DIRS.iter().any(|name| dir.join(name).is_dir())
}

fn payload_dirs_in(dir: &Path) -> Vec<&'static str> {
    PAYLOAD_DIRS
        .into_iter()
        .filter(|name| dir.join(name).is_dir())
        .collect()
}

fn is_marker(dir: &Path) -> bool {
    dir.file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .is_some_and(|name| MARKER_NAMES.contains(&name.as_str()))
}

/// Descending into a payload directory or archive noise never finds a root.
fn is_pruned(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    PAYLOAD_DIRS.contains(&name.as_ref()) || IGNORED_DIRS.contains(&name.as_ref())
}

fn candidate_dirs(tree: &Path, min_depth: usize, max_depth: usize) -> Vec<PathBuf> {
    candidate_dirs_with_depth(tree, min_depth, max_depth)
        .into_iter()
        .map(|(_, path)| path)
        .collect()
}

/// Directories between `min_depth` and `max_depth`, outer levels first and
/// sorted by name within a level.
fn candidate_dirs_with_depth(
    tree: &Path,
    min_depth: usize,
    max_depth: usize,
) -> Vec<(usize, PathBuf)> {
    let mut dirs: Vec<(usize, PathBuf)> = WalkDir::new(tree)
        .min_depth(min_depth)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_pruned(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| (e.depth(), e.into_path()))
        .collect();
    // Stable: keeps name order inside each level.
    dirs.sort_by_key(|(depth, _)| *depth);
    dirs
}
