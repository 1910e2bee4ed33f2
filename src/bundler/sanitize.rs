//! Post-merge corrections applied to the combined tree.
//!
//! The rules run in a fixed order after every component was merged,
//! whichever components actually made it in. Each rule is idempotent, skips
//! silently when its scope directory is absent and touches nothing outside
//! its own pattern, so running [`sanitize`] twice leaves the tree exactly as
//! the first run did.

use super::error::{ErrorExt, Result};
use super::utils::fs;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Safe Atmosphère defaults: cheats off, no crash uploads.
pub const SYSTEM_SETTINGS_INI: &str = "\
[atmosphere]
; Cheats are disabled by default
enable_cheats = u8!0x0

; Keep dmnt (the cheat debug monitor) from enabling cheats on its own
dmnt_cheats_enabled_by_default = u8!0x0
dmnt_always_save_cheat_toggles = u8!0x0

[eupld]
; Do not upload crash reports
upload_enabled = u8!0x0

[ro]
; Relax NRO signature restrictions
ease_nro_restriction = u8!0x1

[exosphere]
; Do not blank PRODINFO
blank_prodinfo_sysmmc = u8!0x0
blank_prodinfo_emummc = u8!0x0

[hbl_config]
; Hold R on any title to launch the homebrew menu
override_key = !R
override_any_app = u8!0x1

[btm]
fatal_auto_reboot_interval = u64!0x0
";

/// SysDVR mode file content: stream audio and video over TCP (USB).
pub const SYSDVR_TCP_MODE: &str = "a";

/// What a rule does to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Deletes everything matching a pattern inside its scope.
    Removal,
    /// Writes a file with hard-coded content, replacing any shipped version.
    FixedContent,
    /// Ensures a directory exists.
    Structural,
    /// Deletes one known path whose presence alone is harmful.
    DeletionByPresence,
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Category::Removal => "removal",
            Category::FixedContent => "fixed-content",
            Category::Structural => "structural",
            Category::DeletionByPresence => "deletion-by-presence",
        };
        f.write_str(name)
    }
}

/// One named post-merge edit.
pub struct SanitizationRule {
    pub name: &'static str,
    pub category: Category,
    /// Bundle-relative directory the rule operates in; empty for the root.
    pub scope: &'static str,
    apply: fn(&Path) -> Result<usize>,
}

impl std::fmt::Debug for SanitizationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanitizationRule")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("scope", &self.scope)
            .finish()
    }
}

/// The rule table, in application order.
pub const RULES: &[SanitizationRule] = &[
    SanitizationRule {
        name: "strip title cheat folders",
        category: Category::Removal,
        scope: "atmosphere",
        apply: remove_cheat_dirs,
    },
    SanitizationRule {
        name: "strip title cheat notes",
        category: Category::Removal,
        scope: "atmosphere",
        apply: remove_cheat_notes,
    },
    SanitizationRule {
        name: "write safe system_settings.ini",
        category: Category::FixedContent,
        scope: "atmosphere",
        apply: write_system_settings,
    },
    SanitizationRule {
        name: "drop override_config.ini",
        category: Category::DeletionByPresence,
        scope: "atmosphere",
        apply: remove_override_config,
    },
    SanitizationRule {
        name: "ensure exefs_patches/",
        category: Category::Structural,
        scope: "atmosphere",
        apply: ensure_exefs_patches,
    },
    SanitizationRule {
        name: "ensure kip_patches/",
        category: Category::Structural,
        scope: "atmosphere",
        apply: ensure_kip_patches,
    },
    SanitizationRule {
        name: "strip .cht files",
        category: Category::Removal,
        scope: "atmosphere",
        apply: remove_cht_files,
    },
    SanitizationRule {
        name: "configure SysDVR TCP mode",
        category: Category::FixedContent,
        scope: "",
        apply: write_sysdvr_mode,
    },
];

/// Outcome of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// Scope directory absent.
    Skipped,
    /// Ran; the number of paths it changed (0 on an already clean tree).
    Applied(usize),
}

/// Outcome of every rule, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub outcomes: Vec<(&'static str, RuleOutcome)>,
}

impl SanitizeReport {
    /// Total number of paths changed by all rules.
    pub fn changes(&self) -> usize {
        self.outcomes
            .iter()
            .map(|(_, outcome)| match outcome {
                RuleOutcome::Applied(n) => *n,
                RuleOutcome::Skipped => 0,
            })
            .sum()
    }
}

/// Applies [`RULES`] to the combined tree.
pub fn sanitize(combined: &Path) -> Result<SanitizeReport> {
    let mut report = SanitizeReport::default();

    for rule in RULES {
        let scope = combined.join(rule.scope);
        let outcome = if scope.is_dir() {
            let changed = (rule.apply)(&scope)?;
            if changed > 0 {
                log::info!("🧹 {} ({}): {} change(s)", rule.name, rule.category, changed);
            } else {
                log::debug!("{}: already clean", rule.name);
            }
            RuleOutcome::Applied(changed)
        } else {
            log::debug!("{}: {}/ not present, skipped", rule.name, rule.scope);
            RuleOutcome::Skipped
        };
        report.outcomes.push((rule.name, outcome));
    }

    Ok(report)
}

/// Per-title directories under `atmosphere/contents/`.
fn title_dirs(atmosphere: &Path) -> Result<Vec<PathBuf>> {
    let contents = atmosphere.join("contents");
    if !contents.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(&contents).fs_context("listing titles", &contents)? {
        let path = entry.fs_context("listing titles", &contents)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn remove_cheat_dirs(atmosphere: &Path) -> Result<usize> {
    let mut removed = 0;
    for title in title_dirs(atmosphere)? {
        let cheats = title.join("cheats");
        if cheats.is_dir() && fs::remove_dir_all(&cheats)? {
            log::debug!("Removed {}", cheats.display());
            removed += 1;
        }
    }
    Ok(removed)
}

fn remove_cheat_notes(atmosphere: &Path) -> Result<usize> {
    let mut removed = 0;
    for title in title_dirs(atmosphere)? {
        for entry in std::fs::read_dir(&title).fs_context("listing title", &title)? {
            let path = entry.fs_context("listing title", &title)?.path();
            let is_cheat_note = path.is_file()
                && has_extension(&path, "txt")
                && path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().to_lowercase().contains("cheat"));
            if is_cheat_note && fs::remove_file(&path)? {
                log::debug!("Removed {}", path.display());
                removed += 1;
            }
        }
    }
    Ok(removed)
}

fn write_system_settings(atmosphere: &Path) -> Result<usize> {
    let path = atmosphere.join("config").join("system_settings.ini");
    Ok(usize::from(fs::write_if_changed(&path, SYSTEM_SETTINGS_INI.as_bytes())?))
}

fn remove_override_config(atmosphere: &Path) -> Result<usize> {
    let path = atmosphere.join("config").join("override_config.ini");
    Ok(usize::from(path.is_file() && fs::remove_file(&path)?))
}

fn ensure_dir(path: &Path) -> Result<usize> {
    if path.is_dir() {
        return Ok(0);
    }
    fs::create_dir_all(path)?;
    Ok(1)
}

fn ensure_exefs_patches(atmosphere: &Path) -> Result<usize> {
    ensure_dir(&atmosphere.join("exefs_patches"))
}

fn ensure_kip_patches(atmosphere: &Path) -> Result<usize> {
    ensure_dir(&atmosphere.join("kip_patches"))
}

fn remove_cht_files(atmosphere: &Path) -> Result<usize> {
    let targets: Vec<PathBuf> = WalkDir::new(atmosphere)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), "cht"))
        .map(|e| e.into_path())
        .collect();

    let mut removed = 0;
    for path in targets {
        if fs::remove_file(&path)? {
            log::debug!("Removed {}", path.display());
            removed += 1;
        }
    }
    Ok(removed)
}

fn write_sysdvr_mode(root: &Path) -> Result<usize> {
    let path = root.join("config").join("sysdvr").join("tcp");
    Ok(usize::from(fs::write_if_changed(&path, SYSDVR_TCP_MODE.as_bytes())?))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
}
