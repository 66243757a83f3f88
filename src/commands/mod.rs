//! CLI commands for run-release
//!
//! - **run**: the full pipeline (version → changelog → build → publish), or a dry run
//! - **notes**: print the release notes the pipeline would publish
//! - **upload**: attach missing artifacts to a release that already exists

pub mod notes;
pub mod run;
pub mod upload;

pub use notes::{NotesOptions, run_notes};
pub use run::{RunOptions, run_release};
pub use upload::{UploadOptions, run_upload};

use crate::core::config::RailConfig;
use crate::core::error::RailResult;
use crate::core::process::CancelToken;
use crate::release::github::GhBackend;
use std::path::Path;

/// Load `release.toml` and apply command-line overrides
pub(crate) fn load_config(
  source_root: &Path,
  explicit: Option<&Path>,
  repo: Option<String>,
  build_timeout: Option<u64>,
  publish_timeout: Option<u64>,
) -> RailResult<RailConfig> {
  let mut config = RailConfig::load(source_root, explicit)?;
  if repo.is_some() {
    config.release.repo = repo;
  }
  if let Some(secs) = build_timeout {
    config.build.timeout_secs = Some(secs);
  }
  if let Some(secs) = publish_timeout {
    config.publish.timeout_secs = Some(secs);
  }
  config.validate().map_err(|reason| crate::core::error::ConfigError::Invalid {
    path: explicit.map(Path::to_path_buf).unwrap_or_else(|| source_root.to_path_buf()),
    reason,
  })?;
  Ok(config)
}

/// GitHub backend for a checkout, warning when no token is visible
pub(crate) fn github_backend(source_root: &Path, config: &RailConfig, cancel: &CancelToken) -> GhBackend {
  if !GhBackend::token_in_env() {
    tracing::warn!("GH_TOKEN / GITHUB_TOKEN not set, relying on gh's stored login");
  }
  GhBackend::new(source_root, cancel.clone())
    .with_repo(config.release.repo.clone())
    .with_timeout(config.publish.timeout())
}

/// Cancel `token` when the user presses Ctrl-C
///
/// The running subprocess group is killed at the next poll and the command
/// fails with a cancelled error. A process holds one handler; a second
/// install only logs.
pub(crate) fn cancel_on_ctrlc(token: &CancelToken) {
  let trigger = token.clone();
  if let Err(err) = ctrlc::set_handler(move || {
    tracing::warn!("interrupt received, stopping");
    trigger.cancel();
  }) {
    tracing::warn!("failed to set Ctrl-C handler: {}", err);
  }
}

/// Human-readable byte count
pub(crate) fn format_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
  let mut size = bytes as f64;
  let mut unit = 0;
  while size >= 1024.0 && unit < UNITS.len() - 1 {
    size /= 1024.0;
    unit += 1;
  }
  if unit == 0 {
    format!("{} {}", bytes, UNITS[0])
  } else {
    format!("{:.1} {}", size, UNITS[unit])
  }
}

/// Print an indented block of text
pub(crate) fn print_indented(text: &str, indent: &str) {
  if text.is_empty() {
    println!("{}(empty)", indent);
    return;
  }
  for line in text.lines() {
    println!("{}{}", indent, line);
  }
}
