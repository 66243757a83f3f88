//! Error types for release-rail with contextual messages and exit codes
//!
//! Every pipeline stage owns an error enum and `RailError` wraps them, so a failure
//! always carries the stage it came from. `ErrorKind` flattens the tree into the
//! taxonomy scripts and tests match on, and every error maps to one exit code.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Exit codes for run-release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// Manifest, changelog or configuration could not be read
  Read = 1,
  /// Build toolchain failed or produced nothing
  Build = 2,
  /// Release creation or artifact upload failed
  Publish = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Flat error taxonomy, one entry per distinguishable failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  NotFound,
  Malformed,
  NoSections,
  BuildFailed,
  NoArtifactProduced,
  ReleaseAlreadyExists,
  ReleaseNotFound,
  RemoteFailed,
  UploadFailed,
  TimedOut,
  Cancelled,
  Config,
  Io,
  Other,
}

/// Main error type for release-rail
#[derive(Debug)]
pub enum RailError {
  /// Manifest / version errors
  Version(VersionError),

  /// Changelog errors
  Changelog(ChangelogError),

  /// Build toolchain errors
  Build(BuildError),

  /// Remote release errors
  Publish(PublishError),

  /// Configuration errors
  Config(ConfigError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl RailError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    RailError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  ///
  /// Stage errors are returned untouched so their structure survives propagation.
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      RailError::Message { message, context, help } => RailError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      RailError::Io(e) => RailError::Message {
        message: ctx_str,
        context: Some(e.to_string()),
        help: None,
      },
      _ => self,
    }
  }

  /// Taxonomy entry for this error
  pub fn kind(&self) -> ErrorKind {
    match self {
      RailError::Version(VersionError::NotFound { .. }) => ErrorKind::NotFound,
      RailError::Version(VersionError::Malformed { .. }) => ErrorKind::Malformed,
      RailError::Changelog(ChangelogError::NotFound { .. }) => ErrorKind::NotFound,
      RailError::Changelog(ChangelogError::NoSections { .. }) => ErrorKind::NoSections,
      RailError::Build(BuildError::Failed { .. } | BuildError::Spawn { .. }) => ErrorKind::BuildFailed,
      RailError::Build(BuildError::NoArtifactProduced { .. } | BuildError::NotBuilt { .. }) => {
        ErrorKind::NoArtifactProduced
      }
      RailError::Build(BuildError::Interrupted(i)) => i.kind(),
      RailError::Publish(PublishError::AlreadyExists { .. }) => ErrorKind::ReleaseAlreadyExists,
      RailError::Publish(PublishError::NotFound { .. }) => ErrorKind::ReleaseNotFound,
      RailError::Publish(PublishError::Remote { .. }) => ErrorKind::RemoteFailed,
      RailError::Publish(PublishError::UploadFailed { .. }) => ErrorKind::UploadFailed,
      RailError::Publish(PublishError::Interrupted(i)) => i.kind(),
      RailError::Config(_) => ErrorKind::Config,
      RailError::Io(_) => ErrorKind::Io,
      RailError::Message { .. } => ErrorKind::Other,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      RailError::Version(_) | RailError::Changelog(_) | RailError::Config(_) => ExitCode::Read,
      RailError::Build(_) => ExitCode::Build,
      RailError::Publish(_) => ExitCode::Publish,
      RailError::Io(_) | RailError::Message { .. } => ExitCode::Read,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      RailError::Version(e) => e.help_message(),
      RailError::Changelog(e) => e.help_message(),
      RailError::Build(e) => e.help_message(),
      RailError::Publish(e) => e.help_message(),
      RailError::Config(e) => e.help_message(),
      RailError::Message { help, .. } => help.clone(),
      RailError::Io(_) => None,
    }
  }
}

impl fmt::Display for RailError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RailError::Version(e) => write!(f, "{}", e),
      RailError::Changelog(e) => write!(f, "{}", e),
      RailError::Build(e) => write!(f, "{}", e),
      RailError::Publish(e) => write!(f, "{}", e),
      RailError::Config(e) => write!(f, "{}", e),
      RailError::Io(e) => write!(f, "I/O error: {}", e),
      RailError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for RailError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      RailError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for RailError {
  fn from(err: io::Error) -> Self {
    RailError::Io(err)
  }
}

impl From<String> for RailError {
  fn from(msg: String) -> Self {
    RailError::message(msg)
  }
}

impl From<&str> for RailError {
  fn from(msg: &str) -> Self {
    RailError::message(msg)
  }
}

impl From<serde_json::Error> for RailError {
  fn from(err: serde_json::Error) -> Self {
    RailError::message(format!("JSON error: {}", err))
  }
}

impl From<VersionError> for RailError {
  fn from(err: VersionError) -> Self {
    RailError::Version(err)
  }
}

impl From<ChangelogError> for RailError {
  fn from(err: ChangelogError) -> Self {
    RailError::Changelog(err)
  }
}

impl From<BuildError> for RailError {
  fn from(err: BuildError) -> Self {
    RailError::Build(err)
  }
}

impl From<PublishError> for RailError {
  fn from(err: PublishError) -> Self {
    RailError::Publish(err)
  }
}

impl From<ConfigError> for RailError {
  fn from(err: ConfigError) -> Self {
    RailError::Config(err)
  }
}

/// A long-running operation stopped before it finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
  /// The caller-supplied deadline passed
  TimedOut(Duration),
  /// The cancellation token fired
  Cancelled,
}

impl Interrupt {
  fn kind(&self) -> ErrorKind {
    match self {
      Interrupt::TimedOut(_) => ErrorKind::TimedOut,
      Interrupt::Cancelled => ErrorKind::Cancelled,
    }
  }
}

impl fmt::Display for Interrupt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Interrupt::TimedOut(after) if after.subsec_millis() == 0 => write!(f, "timed out after {}s", after.as_secs()),
      Interrupt::TimedOut(after) => write!(f, "timed out after {:.1}s", after.as_secs_f64()),
      Interrupt::Cancelled => write!(f, "cancelled"),
    }
  }
}

/// Manifest / version errors
#[derive(Debug)]
pub enum VersionError {
  /// Manifest file missing
  NotFound { path: PathBuf },

  /// Version field missing or unusable
  Malformed { path: PathBuf, reason: String },
}

impl VersionError {
  fn help_message(&self) -> Option<String> {
    match self {
      VersionError::NotFound { .. } => Some("Pass the manifest explicitly with --manifest <path>.".to_string()),
      VersionError::Malformed { reason, .. } if reason.contains("dynamic") => {
        Some("Declare a static `version` in [project] so the release tag can be derived from it.".to_string())
      }
      VersionError::Malformed { .. } => {
        Some("The manifest needs a string `version` field, e.g. version = \"1.2.0\".".to_string())
      }
    }
  }
}

impl fmt::Display for VersionError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      VersionError::NotFound { path } => write!(f, "Manifest not found: {}", path.display()),
      VersionError::Malformed { path, reason } => {
        write!(f, "Malformed manifest {}: {}", path.display(), reason)
      }
    }
  }
}

/// Changelog errors
#[derive(Debug)]
pub enum ChangelogError {
  /// Changelog file missing
  NotFound { path: PathBuf },

  /// No `## [<label>]` header in the document
  NoSections { path: Option<PathBuf> },
}

impl ChangelogError {
  fn help_message(&self) -> Option<String> {
    match self {
      ChangelogError::NotFound { .. } => Some("Pass the changelog explicitly with --changelog <path>.".to_string()),
      ChangelogError::NoSections { .. } => {
        Some("Add a section such as `## [1.0.0] - 2025-01-15` above the release notes.".to_string())
      }
    }
  }
}

impl fmt::Display for ChangelogError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ChangelogError::NotFound { path } => write!(f, "Changelog not found: {}", path.display()),
      ChangelogError::NoSections { path: Some(path) } => {
        write!(f, "Changelog {} has no version sections", path.display())
      }
      ChangelogError::NoSections { path: None } => write!(f, "Changelog has no version sections"),
    }
  }
}

/// Build toolchain errors
#[derive(Debug)]
pub enum BuildError {
  /// Toolchain exited non-zero (or was killed by a signal: no exit code)
  Failed { exit_code: Option<i32>, stderr: String },

  /// Toolchain could not be started
  Spawn { program: String, reason: String },

  /// Toolchain succeeded but left no fresh artifact behind
  NoArtifactProduced { output_dir: PathBuf, patterns: Vec<String> },

  /// No usable build record for this release's artifacts
  NotBuilt { tag: String, reason: String },

  /// Build stopped by timeout or cancellation
  Interrupted(Interrupt),
}

impl BuildError {
  fn help_message(&self) -> Option<String> {
    match self {
      BuildError::Spawn { program, .. } => Some(format!(
        "Make sure `{}` is installed and on PATH, or set [build].program in release.toml.",
        program
      )),
      BuildError::NoArtifactProduced { .. } => Some(
        "Check [build].output_dir and [build].artifacts in release.toml match where the toolchain writes packages."
          .to_string(),
      ),
      BuildError::NotBuilt { .. } => {
        Some("Rebuild this version (e.g. `run-release --dry-run`), then retry the upload.".to_string())
      }
      BuildError::Interrupted(Interrupt::TimedOut(_)) => {
        Some("Raise the limit with --build-timeout or [build].timeout_secs.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::Failed { exit_code, stderr } => {
        match exit_code {
          Some(code) => write!(f, "Build failed with exit code {}", code)?,
          None => write!(f, "Build terminated by signal")?,
        }
        if !stderr.trim().is_empty() {
          write!(f, "\n{}", stderr.trim_end())?;
        }
        Ok(())
      }
      BuildError::Spawn { program, reason } => write!(f, "Failed to start build toolchain `{}`: {}", program, reason),
      BuildError::NoArtifactProduced { output_dir, patterns } => write!(
        f,
        "Build produced no artifact matching [{}] in {}",
        patterns.join(", "),
        output_dir.display()
      ),
      BuildError::NotBuilt { tag, reason } => write!(f, "No artifacts built for {}: {}", tag, reason),
      BuildError::Interrupted(i) => write!(f, "Build {}", i),
    }
  }
}

/// Why a single asset upload failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
  /// An asset with the same name is already attached to the release
  AlreadyAttached,
  /// The remote service rejected or dropped the upload
  Transport(String),
  /// Upload stopped by timeout or cancellation
  Interrupted(Interrupt),
}

impl fmt::Display for AssetError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      AssetError::AlreadyAttached => write!(f, "already attached"),
      AssetError::Transport(reason) => write!(f, "{}", reason),
      AssetError::Interrupted(i) => write!(f, "{}", i),
    }
  }
}

/// One file that did not make it onto the release
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFailure {
  pub file: PathBuf,
  pub error: AssetError,
}

/// Remote release errors
#[derive(Debug)]
pub enum PublishError {
  /// A release already exists for the tag
  AlreadyExists { tag: String },

  /// No release exists for the tag (upload-only runs)
  NotFound { tag: String },

  /// A remote call other than upload failed
  Remote { operation: String, reason: String },

  /// At least one artifact failed to upload; the release record is kept
  UploadFailed {
    tag: String,
    failures: Vec<UploadFailure>,
    uploaded: Vec<String>,
  },

  /// Remote call stopped by timeout or cancellation
  Interrupted(Interrupt),
}

impl PublishError {
  fn help_message(&self) -> Option<String> {
    match self {
      PublishError::AlreadyExists { .. } => Some(
        "Bump the manifest version and add a changelog section for it; existing releases are never overwritten."
          .to_string(),
      ),
      PublishError::NotFound { .. } => {
        Some("Run the full pipeline first; `upload` only fills in a release that already exists.".to_string())
      }
      PublishError::UploadFailed { .. } => {
        Some("The release was kept. Run `run-release upload` to attach the missing files.".to_string())
      }
      PublishError::Remote { reason, .. } if reason.contains("auth") || reason.contains("401") => {
        Some("Export GH_TOKEN (or GITHUB_TOKEN) or run `gh auth login`.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for PublishError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PublishError::AlreadyExists { tag } => write!(f, "Release {} already exists", tag),
      PublishError::NotFound { tag } => write!(f, "Release {} does not exist", tag),
      PublishError::Remote { operation, reason } => write!(f, "Remote {} failed: {}", operation, reason),
      PublishError::UploadFailed {
        tag,
        failures,
        uploaded,
      } => {
        write!(
          f,
          "Upload to release {} incomplete: {} failed, {} uploaded",
          tag,
          failures.len(),
          uploaded.len()
        )?;
        for failure in failures {
          write!(f, "\n  - {}: {}", failure.file.display(), failure.error)?;
        }
        Ok(())
      }
      PublishError::Interrupted(i) => write!(f, "Publish {}", i),
    }
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// Explicit --config path missing
  NotFound { path: PathBuf },

  /// Config file unreadable or invalid
  Invalid { path: PathBuf, reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Omit --config to use release.toml from the source root, or the built-in defaults.".to_string())
      }
      ConfigError::Invalid { .. } => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { path } => write!(f, "Config file not found: {}", path.display()),
      ConfigError::Invalid { path, reason } => write!(f, "Invalid config {}: {}", path.display(), reason),
    }
  }
}

/// Result type alias for release-rail
pub type RailResult<T> = Result<T, RailError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> RailResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<RailError>,
{
  fn context(self, ctx: impl Into<String>) -> RailResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> RailResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &RailError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}
