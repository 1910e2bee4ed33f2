//! Machine-readable pipeline outputs.
//!
//! Values are appended to the file named by `GITHUB_OUTPUT` as `name=value`
//! lines. Multi-line values use the `name<<DELIMITER` form.

use crate::bundler::error::{ErrorExt, Result};
use std::io::Write;
use std::path::Path;

const MULTILINE_DELIMITER: &str = "SYSBOT_CFW_EOF";

/// Ordered set of named output values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outputs(Vec<(String, String)>);

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name`, replacing an earlier value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialized form, one entry per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.0 {
            if value.contains('\n') {
                out.push_str(&format!(
                    "{name}<<{MULTILINE_DELIMITER}\n{value}\n{MULTILINE_DELIMITER}\n"
                ));
            } else {
                out.push_str(&format!("{name}={value}\n"));
            }
        }
        out
    }

    /// Appends every entry to `path`, creating it if needed.
    pub fn append_to(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .fs_context("opening outputs file", path)?;
        file.write_all(self.render().as_bytes())
            .fs_context("writing outputs", path)?;
        log::debug!("Wrote {} output(s) to {}", self.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut outputs = Outputs::new();
        outputs.set("new_release", "false");
        outputs.set("cfw_version", "1.9.0");
        outputs.set("new_release", "true");

        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs.get("new_release"), Some("true"));
        assert_eq!(outputs.render(), "new_release=true\ncfw_version=1.9.0\n");
    }

    #[test]
    fn multiline_values_use_delimiter() {
        let mut outputs = Outputs::new();
        outputs.set("changes", "cfw: N/A → 1.9.0\nftpd: v3.1 → v3.2");
        assert_eq!(
            outputs.render(),
            "changes<<SYSBOT_CFW_EOF\ncfw: N/A → 1.9.0\nftpd: v3.1 → v3.2\nSYSBOT_CFW_EOF\n"
        );
    }

    #[test]
    fn append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github_output");
        std::fs::write(&path, "earlier=1\n").unwrap();

        let mut outputs = Outputs::new();
        outputs.set("archive", "out/bundle.zip");
        outputs.append_to(&path).unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "earlier=1\narchive=out/bundle.zip\n"
        );
    }
}
