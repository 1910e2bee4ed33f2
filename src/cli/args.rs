//! Command line argument parsing and validation.
//!
//! Every option can also come from the environment, so the binary runs
//! unchanged inside a GitHub Actions workflow.

use crate::bundler::PipelineConfig;
use crate::bundler::builder::DEFAULT_BUNDLE_NAME;
use crate::ledger::DEFAULT_STATE_FILE;
use crate::source::DEFAULT_API_URL;
use clap::Parser;
use std::path::PathBuf;

/// Nintendo Switch CFW bundle builder
#[derive(Parser, Debug)]
#[command(
    name = "sysbot_cfw_bundle",
    version,
    about = "Builds a combined Switch CFW + sys-botbase SD card bundle",
    long_about = "Checks the latest releases of Atmosphère, Hekate, SysDVR, ldn_mitm,
sys-botbase, ftpd and JKSV, and when any of them changed, merges them into one
SD card tree, applies safe configuration defaults and writes
<bundle>-<atmosphere version>-Complete.zip.

Usage:
  sysbot_cfw_bundle --check-only
  sysbot_cfw_bundle --output-dir dist
  sysbot_cfw_bundle --force --publish

Exit code 0 = up to date, or bundle built (and published when requested)."
)]
pub struct Args {
    /// Version ledger file
    #[arg(long, env = "STATE_FILE", value_name = "PATH", default_value = DEFAULT_STATE_FILE)]
    pub state_file: PathBuf,

    /// Directory receiving the archive and release notes
    #[arg(short = 'o', long, env = "OUTPUT_DIR", value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Local bootloader assets laid over the bundle
    #[arg(long, env = "ASSETS_DIR", value_name = "DIR", default_value = "assets")]
    pub assets_dir: PathBuf,

    /// Archive and tag prefix
    #[arg(long, value_name = "NAME", default_value = DEFAULT_BUNDLE_NAME)]
    pub bundle_name: String,

    /// Only compare versions; never build or update the ledger
    #[arg(long, conflicts_with = "force")]
    pub check_only: bool,

    /// Build even when no component changed
    #[arg(short, long)]
    pub force: bool,

    /// Publish the bundle as a GitHub release after building
    #[arg(long, conflicts_with = "check_only")]
    pub publish: bool,

    /// GitHub token, used for API rate limits and publishing
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Repository (`owner/repo`) releases are published to
    #[arg(long, env = "GITHUB_REPOSITORY", value_name = "OWNER/REPO")]
    pub github_repository: Option<String>,

    /// File receiving machine-readable `name=value` outputs
    #[arg(long, env = "GITHUB_OUTPUT", value_name = "PATH")]
    pub github_output: Option<PathBuf>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", value_name = "URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.bundle_name.trim().is_empty() {
            return Err("Bundle name cannot be empty".to_string());
        }

        if self.bundle_name.contains(['/', '\\']) {
            return Err(format!(
                "Bundle name '{}' must not contain path separators",
                self.bundle_name
            ));
        }

        if self.publish {
            if self.token().is_none() {
                return Err("--publish requires a GitHub token (GITHUB_TOKEN)".to_string());
            }
            match self.github_repository.as_deref() {
                None | Some("") => {
                    return Err(
                        "--publish requires a repository (GITHUB_REPOSITORY)".to_string()
                    );
                }
                Some(repo) if repo.split('/').filter(|p| !p.is_empty()).count() != 2 => {
                    return Err(format!("Invalid repository '{repo}', expected owner/repo"));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// The token, unless empty.
    pub fn token(&self) -> Option<&str> {
        self.github_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Pipeline settings for this invocation.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            bundle_name: self.bundle_name.clone(),
            state_file: self.state_file.clone(),
            output_dir: self.output_dir.clone(),
            assets_dir: self.assets_dir.clone(),
            work_root: None,
            force: self.force,
            check_only: self.check_only,
        }
    }
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl From<&Args> for RuntimeConfig {
    fn from(_args: &Args) -> Self {
        Self {
            output: super::OutputManager::new(false),
        }
    }
}

impl RuntimeConfig {
    /// Print success message if not in quiet mode
    pub fn success(&self, message: &str) -> std::io::Result<()> {
        self.output.success(message)
    }

    /// Print warning message if not in quiet mode
    pub fn warn(&self, message: &str) -> std::io::Result<()> {
        self.output.warn(message)
    }

    /// Print progress message
    pub fn progress(&self, message: &str) -> std::io::Result<()> {
        self.output.progress(message)
    }

    /// Print section header
    pub fn section(&self, title: &str) -> std::io::Result<()> {
        self.output.section(title)
    }

    /// Print indented text
    pub fn indent(&self, message: &str) -> std::io::Result<()> {
        self.output.indent(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("sysbot_cfw_bundle").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["--github-api-url", "https://api.github.com"]);
        assert_eq!(args.bundle_name, "Pokemon-SysBot-CFW");
        assert!(!args.force && !args.check_only && !args.publish);

        let config = args.pipeline_config();
        assert_eq!(config.bundle_name, "Pokemon-SysBot-CFW");
        assert!(config.work_root.is_none());
    }

    #[test]
    fn check_only_conflicts_with_publish() {
        let result = Args::try_parse_from(["sysbot_cfw_bundle", "--check-only", "--publish"]);
        assert!(result.is_err());
    }

    #[test]
    fn publish_requires_token_and_repository() {
        let mut args = parse(&["--publish", "--github-token", "t"]);
        args.github_repository = None;
        assert!(args.validate().unwrap_err().contains("GITHUB_REPOSITORY"));

        args.github_repository = Some("owner".into());
        assert!(args.validate().unwrap_err().contains("owner/repo"));

        args.github_repository = Some("owner/repo".into());
        assert!(args.validate().is_ok());

        args.github_token = Some(String::new());
        assert!(args.validate().unwrap_err().contains("GITHUB_TOKEN"));
    }

    #[test]
    fn bundle_name_must_be_a_file_name() {
        let mut args = parse(&["--bundle-name", "a/b"]);
        assert!(args.validate().is_err());
        args.bundle_name = "Custom-Bundle".into();
        assert!(args.validate().is_ok());
    }
}
