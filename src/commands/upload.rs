//! Resume the upload step against an existing release
//!
//! Artifacts are the ones the last build recorded for this version's tag,
//! checked against their recorded checksums; nothing is rebuilt. Files the
//! release already carries are skipped.

use super::{cancel_on_ctrlc, format_size, github_backend, load_config};
use crate::core::error::RailResult;
use crate::core::process::CancelToken;
use crate::release::version::read_version;
use crate::release::{ArtifactBuilder, ReleasePublisher};
use crate::ui::progress;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct UploadOptions {
  pub manifest: PathBuf,
  pub source_root: PathBuf,
  pub repo: Option<String>,
  pub config: Option<PathBuf>,
  pub publish_timeout: Option<u64>,
  pub json: bool,
}

/// Run the upload command
pub fn run_upload(opts: UploadOptions) -> RailResult<()> {
  let config = load_config(
    &opts.source_root,
    opts.config.as_deref(),
    opts.repo.clone(),
    None,
    opts.publish_timeout,
  )?;

  let version = read_version(&opts.manifest)?;
  let tag = config.release.tag_for(version.as_str());
  let artifacts = ArtifactBuilder::new(&config.build)?.collect(&opts.source_root, &tag)?;

  let cancel = CancelToken::new();
  cancel_on_ctrlc(&cancel);
  let backend = github_backend(&opts.source_root, &config, &cancel);
  let publisher = ReleasePublisher::new(&backend).with_progress(!opts.json && progress::interactive());
  let release = publisher.resume(&tag, &artifacts)?;

  if opts.json {
    println!("{}", serde_json::to_string_pretty(&release)?);
    return Ok(());
  }

  println!("✅ {} holds every artifact", release.tag);
  println!();
  for artifact in &artifacts {
    println!("    📦 {} ({})", artifact.name, format_size(artifact.size));
  }
  if let Some(url) = &release.url {
    println!();
    println!("  {}", url);
  }
  Ok(())
}
