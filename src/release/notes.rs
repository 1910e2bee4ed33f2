//! Release notes generation.
//!
//! Renders a Markdown body from a Handlebars template listing every
//! integrated component with its version.

use crate::bundler::error::{Error, ErrorExt, Result};
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name of the rendered notes in the output directory.
pub const NOTES_FILE: &str = "release_notes.md";

const NOTES_TEMPLATE: &str = "\
# 🎮 {{title}}

## 🔧 Included components
{{#each components}}
- **{{name}}** {{version}} - {{purpose}}
{{/each}}
{{#if skipped}}

## ⚠️ Not included in this build
{{#each skipped}}
- **{{name}}** {{version}}
{{/each}}
{{/if}}

## 📁 Installation
1. Back up your SD card
2. Extract the archive to the root of the SD card
3. Inject the payload (unpatched units) or boot through your modchip

---
*🤖 Generated {{generated_at}} UTC*
";

/// One line of the component list.
#[derive(Debug, Clone, Serialize)]
pub struct NoteEntry {
    pub name: String,
    pub version: String,
    pub purpose: String,
}

#[derive(Serialize)]
struct NotesData<'a> {
    title: &'a str,
    components: &'a [NoteEntry],
    skipped: &'a [NoteEntry],
    generated_at: String,
}

/// `Pokemon SysBot CFW 1.9.0 - Complete Solution` for bundle
/// `Pokemon-SysBot-CFW` and base tag `1.9.0`.
pub fn release_title(bundle_name: &str, base_tag: &str) -> String {
    format!("{} {} - Complete Solution", bundle_name.replace('-', " "), base_tag)
}

/// Renders the release body.
///
/// # Arguments
///
/// * `bundle_name` - Bundle name, used for the heading
/// * `components` - Integrated components in integration order
/// * `skipped` - Optional components left out of this build
/// * `generated_at` - Generation time shown in the footer
pub fn render(
    bundle_name: &str,
    components: &[NoteEntry],
    skipped: &[NoteEntry],
    generated_at: DateTime<Utc>,
) -> Result<String> {
    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
        .register_template_string("release_notes", NOTES_TEMPLATE)
        .map_err(|e| Error::GenericError(format!("failed to register notes template: {e}")))?;

    let title = format!("{} - Complete Solution", bundle_name.replace('-', " "));
    let data = NotesData {
        title: &title,
        components,
        skipped,
        generated_at: generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    };

    Ok(handlebars.render("release_notes", &data)?)
}

/// Writes `body` to [`NOTES_FILE`] in `output_dir`.
pub async fn write(body: &str, output_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .fs_context("creating output directory", output_dir)?;
    let path = output_dir.join(NOTES_FILE);
    tokio::fs::write(&path, body)
        .await
        .fs_context("writing release notes", &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(name: &str, version: &str, purpose: &str) -> NoteEntry {
        NoteEntry {
            name: name.into(),
            version: version.into(),
            purpose: purpose.into(),
        }
    }

    #[test]
    fn title_uses_spaces_and_base_tag() {
        assert_eq!(
            release_title("Pokemon-SysBot-CFW", "1.9.0"),
            "Pokemon SysBot CFW 1.9.0 - Complete Solution"
        );
    }

    #[test]
    fn lists_components_in_order_without_escaping() {
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let body = render(
            "Pokemon-SysBot-CFW",
            &[
                entry("Atmosphère", "1.9.0", "Custom firmware"),
                entry("sys-botbase", "v2.4", "Bot framework <remote control>"),
            ],
            &[],
            at,
        )
        .unwrap();

        assert!(body.starts_with("# 🎮 Pokemon SysBot CFW - Complete Solution"));
        let atmosphere = body.find("- **Atmosphère** 1.9.0 - Custom firmware").unwrap();
        let botbase = body.find("- **sys-botbase** v2.4").unwrap();
        assert!(atmosphere < botbase);
        assert!(body.contains("<remote control>"));
        assert!(body.contains("Generated 2026-01-02 03:04:05 UTC"));
        assert!(!body.contains("Not included"));
    }

    #[test]
    fn skipped_components_get_their_own_section() {
        let body = render(
            "Bundle",
            &[entry("Atmosphère", "1.9.0", "Custom firmware")],
            &[entry("SysDVR", "v6.0", "Streaming")],
            Utc::now(),
        )
        .unwrap();
        assert!(body.contains("## ⚠️ Not included in this build"));
        assert!(body.contains("- **SysDVR** v6.0"));
    }

    #[tokio::test]
    async fn write_places_notes_in_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = write("# notes", &dir.path().join("out")).await.unwrap();
        assert_eq!(path, dir.path().join("out").join(NOTES_FILE));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "# notes");
    }
}
