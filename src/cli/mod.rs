//! Command line interface.
//!
//! Parses arguments, runs the pipeline against GitHub, publishes when asked
//! and reports to the terminal and to `GITHUB_OUTPUT`.

mod args;
mod output;

pub use args::{Args, RuntimeConfig};
pub use output::OutputManager;

use crate::bundler::{Pipeline, PipelineReport};
use crate::error::{CliError, Result};
use crate::release::{GitHubPublisher, PublishOutcome, ReleasePublisher};
use crate::source::GitHubSource;
use anyhow::Context;

/// Main CLI entry point
pub async fn run() -> Result<i32> {
    let args = Args::parse_args();
    args.validate()
        .map_err(|reason| CliError::InvalidArguments { reason })?;
    let runtime = RuntimeConfig::from(&args);
    execute(&args, &runtime).await
}

/// Runs one invocation with already parsed arguments.
///
/// The bundle reaches the output directory and the ledger only after every
/// other step, publishing and `GITHUB_OUTPUT` included, has succeeded.
pub async fn execute(args: &Args, runtime: &RuntimeConfig) -> Result<i32> {
    let config = args.pipeline_config();
    let source = GitHubSource::new(&args.github_api_url, args.token())?;
    let pipeline = Pipeline::new(&source, &config);

    runtime.section("🔍 Checking component releases")?;
    let mut report = pipeline.execute().await?;
    print_changes(&report, runtime)?;

    if args.publish {
        publish(args, &report, runtime).await?;
    }

    let outputs = report.outputs(&config.bundle_name);
    if let Some(path) = &args.github_output {
        outputs
            .append_to(path)
            .with_context(|| format!("writing outputs to {}", path.display()))?;
    } else {
        log::debug!("GITHUB_OUTPUT not set, outputs:\n{}", outputs.render());
    }

    let ledger_written = pipeline.finish(&mut report).await?;

    if let Some(build) = &report.build {
        runtime.section("📦 Bundle")?;
        runtime.indent(&format!(
            "Archive:  {} ({} bytes)",
            build.archive.path.display(),
            build.archive.size
        ))?;
        runtime.indent(&format!("SHA256:   {}", build.checksum))?;
        runtime.indent(&format!("Release:  {}", build.release_tag))?;
        runtime.indent(&format!("Notes:    {}", build.notes_path.display()))?;
        runtime.indent(&format!("Cleanup:  {} change(s)", build.sanitized.changes()))?;
        for component in &build.skipped {
            runtime.warn(&format!("{} is not part of this bundle", component.display_name()))?;
        }
    }
    if ledger_written {
        runtime.success(&format!("Ledger updated: {}", config.state_file.display()))?;
    }

    Ok(0)
}

fn print_changes(report: &PipelineReport, runtime: &RuntimeConfig) -> Result<()> {
    let changes = &report.check.changes;
    if changes.is_empty() {
        runtime.success("All components up to date")?;
    } else {
        runtime.progress(&format!("{} component(s) changed", changes.len()))?;
        for change in changes {
            runtime.indent(&change.to_string())?;
        }
    }
    Ok(())
}

async fn publish(args: &Args, report: &PipelineReport, runtime: &RuntimeConfig) -> Result<()> {
    let Some(build) = &report.build else {
        return Ok(());
    };
    let (Some(token), Some(repository)) = (args.token(), args.github_repository.as_deref())
    else {
        return Err(CliError::ExecutionFailed {
            command: "publish".into(),
            reason: "GitHub token and repository are required".into(),
        }
        .into());
    };

    runtime.section("🚀 Publishing")?;
    let publisher = GitHubPublisher::new(&args.github_api_url, repository, token)?;
    let outcome = publisher
        .publish(&build.draft())
        .await
        .with_context(|| format!("publishing {} to {}", build.release_tag, repository))?;

    match outcome {
        PublishOutcome::Created(url) => runtime.success(&format!("Published {url}"))?,
        PublishOutcome::AlreadyExists => {
            runtime.warn(&format!("Release {} already exists", build.release_tag))?
        }
    }
    Ok(())
}
