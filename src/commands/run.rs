//! Full release run: version → changelog → build → publish
//!
//! `--dry-run` performs every local step (including the build) and prints the
//! release that would be created instead of contacting the release service.

use super::{cancel_on_ctrlc, format_size, github_backend, load_config, print_indented};
use crate::core::error::RailResult;
use crate::core::process::CancelToken;
use crate::release::pipeline::{PipelineInputs, PipelineOrchestrator, PipelineReport, PublishMode};
use crate::release::{ArtifactBuilder, ReleasePublisher};
use crate::ui::progress;
use std::path::PathBuf;

/// Arguments of a full run
#[derive(Debug, Clone)]
pub struct RunOptions {
  pub manifest: PathBuf,
  pub changelog: PathBuf,
  pub source_root: PathBuf,
  pub dry_run: bool,
  pub json: bool,
  pub repo: Option<String>,
  pub config: Option<PathBuf>,
  pub build_timeout: Option<u64>,
  pub publish_timeout: Option<u64>,
}

/// Run the release pipeline
pub fn run_release(opts: RunOptions) -> RailResult<()> {
  let config = load_config(
    &opts.source_root,
    opts.config.as_deref(),
    opts.repo.clone(),
    opts.build_timeout,
    opts.publish_timeout,
  )?;

  let cancel = CancelToken::new();
  cancel_on_ctrlc(&cancel);
  let builder = ArtifactBuilder::new(&config.build)?;
  let backend = github_backend(&opts.source_root, &config, &cancel);

  let mode = if opts.dry_run {
    PublishMode::DryRun
  } else {
    PublishMode::Live(ReleasePublisher::new(&backend).with_progress(!opts.json && progress::interactive()))
  };

  let inputs = PipelineInputs {
    manifest: opts.manifest.clone(),
    changelog: opts.changelog.clone(),
    source_root: opts.source_root.clone(),
  };

  let mut pipeline = PipelineOrchestrator::new(config.release.clone(), builder, mode, cancel);
  let report = pipeline.run(&inputs)?;

  if opts.json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    print_report(&report);
  }

  Ok(())
}

fn print_report(report: &PipelineReport) {
  let draft = &report.draft;

  if report.dry_run {
    println!("🔍 Dry-run: nothing was published");
  } else {
    println!("✅ Released {}", draft.tag);
  }
  println!();
  match &report.semver {
    Some(semver) if semver != report.version.as_str() => {
      println!("  Version:  {} (semver {})", report.version, semver)
    }
    _ => println!("  Version:  {}", report.version),
  }
  println!("  Tag:      {}", draft.tag);
  println!("  Title:    {}", draft.title);
  println!("  Section:  [{}]", report.changelog_section);
  if let Some(date) = report.release_date {
    println!("  Date:     {}", date.format("%Y-%m-%d"));
  }
  if let Some(url) = report.release.as_ref().and_then(|r| r.url.as_deref()) {
    println!("  URL:      {}", url);
  }
  println!();
  println!("  Notes:");
  print_indented(&draft.notes, "    ");
  println!();
  println!("  Artifacts:");
  for artifact in &draft.artifacts {
    println!("    📦 {} ({})", artifact.name, format_size(artifact.size));
    println!("       sha256 {}", artifact.sha256);
  }

  if report.dry_run {
    println!();
    println!("Run again without --dry-run to create {} and upload the artifacts.", draft.tag);
  }
}
