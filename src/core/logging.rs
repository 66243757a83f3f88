//! Tracing subscriber setup
//!
//! Events go to stderr (stdout is reserved for reports and `--json`). An optional
//! log file receives the same events without ANSI colours, so CI logs can be
//! archived next to the release.

use crate::core::error::{RailResult, ResultExt};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber
///
/// `RUST_LOG` wins when set; otherwise `info`, or `debug` for this crate when verbose.
pub fn init(verbose: bool, log_file: Option<&Path>) -> RailResult<()> {
  let default_directive = if verbose { "info,release_rail=debug" } else { "info" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

  let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

  let file_layer = match log_file {
    Some(path) => {
      let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
      Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
    }
    None => None,
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(stderr_layer)
    .with(file_layer)
    .try_init()
    .map_err(|e| crate::core::error::RailError::message(format!("Failed to initialise logging: {}", e)))
}
