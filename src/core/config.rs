use crate::core::error::{ConfigError, RailError, RailResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for release-rail
/// Searched in order: release.toml, .release.toml, .config/release.toml
///
/// Every field has a default, so a repository without a config file releases a
/// Python wheel from `dist/` tagged `v<version>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RailConfig {
  #[serde(default)]
  pub release: ReleaseSettings,
  #[serde(default)]
  pub build: BuildSettings,
  #[serde(default)]
  pub publish: PublishSettings,
}

/// How the remote release is named
///
/// # Example
///
/// ```toml
/// [release]
/// tag_prefix = "v"
/// title = "My App {version}"
/// repo = "owner/my-app"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReleaseSettings {
  /// Prepended to the version to form the tag (default: "v")
  #[serde(default = "default_tag_prefix")]
  pub tag_prefix: String,

  /// Release title template; `{tag}` and `{version}` are substituted (default: "{tag}")
  #[serde(default = "default_title")]
  pub title: String,

  /// `owner/name` passed to gh as --repo (default: the checkout's origin)
  #[serde(default)]
  pub repo: Option<String>,
}

fn default_tag_prefix() -> String {
  "v".to_string()
}

fn default_title() -> String {
  "{tag}".to_string()
}

impl Default for ReleaseSettings {
  fn default() -> Self {
    Self {
      tag_prefix: default_tag_prefix(),
      title: default_title(),
      repo: None,
    }
  }
}

impl ReleaseSettings {
  /// Tag name for a version
  pub fn tag_for(&self, version: &str) -> String {
    format!("{}{}", self.tag_prefix, version)
  }

  /// Rendered release title
  pub fn title_for(&self, tag: &str, version: &str) -> String {
    self.title.replace("{tag}", tag).replace("{version}", version)
  }
}

/// External build toolchain
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
  /// Toolchain executable (default: "python")
  #[serde(default = "default_program")]
  pub program: String,

  /// Arguments; `{source_root}` and `{output_dir}` are substituted
  #[serde(default = "default_args")]
  pub args: Vec<String>,

  /// Where the toolchain writes packages, relative to the source root (default: "dist")
  #[serde(default = "default_output_dir")]
  pub output_dir: PathBuf,

  /// File name globs that count as artifacts (default: ["*.whl"])
  #[serde(default = "default_artifacts")]
  pub artifacts: Vec<String>,

  /// Build deadline in seconds (default: 1800); 0 means no deadline
  #[serde(default = "default_build_timeout")]
  pub timeout_secs: Option<u64>,

  /// Smaller files are ignored as artifacts (default: 1, i.e. empty files are ignored)
  #[serde(default = "default_min_size")]
  pub min_size_bytes: u64,
}

fn default_program() -> String {
  "python".to_string()
}

fn default_args() -> Vec<String> {
  ["-m", "build", "--wheel", "--outdir", "{output_dir}", "{source_root}"]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_output_dir() -> PathBuf {
  PathBuf::from("dist")
}

fn default_artifacts() -> Vec<String> {
  vec!["*.whl".to_string()]
}

fn default_build_timeout() -> Option<u64> {
  Some(1800)
}

fn default_min_size() -> u64 {
  1
}

impl Default for BuildSettings {
  fn default() -> Self {
    Self {
      program: default_program(),
      args: default_args(),
      output_dir: default_output_dir(),
      artifacts: default_artifacts(),
      timeout_secs: default_build_timeout(),
      min_size_bytes: default_min_size(),
    }
  }
}

impl BuildSettings {
  pub fn timeout(&self) -> Option<Duration> {
    deadline(self.timeout_secs)
  }

  /// Validate build configuration
  pub fn validate(&self) -> Result<(), String> {
    if self.program.trim().is_empty() {
      return Err("[build].program must not be empty".to_string());
    }
    if self.artifacts.is_empty() {
      return Err("[build].artifacts needs at least one glob".to_string());
    }
    for pattern in &self.artifacts {
      glob::Pattern::new(pattern).map_err(|e| format!("[build].artifacts: invalid glob '{}': {}", pattern, e))?;
    }
    if self.output_dir.is_absolute() {
      return Err("[build].output_dir must be relative to the source root".to_string());
    }
    Ok(())
  }
}

/// Remote release calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PublishSettings {
  /// Deadline for each remote call in seconds (default: 300); 0 means no deadline
  #[serde(default = "default_publish_timeout")]
  pub timeout_secs: Option<u64>,
}

fn default_publish_timeout() -> Option<u64> {
  Some(300)
}

impl Default for PublishSettings {
  fn default() -> Self {
    Self {
      timeout_secs: default_publish_timeout(),
    }
  }
}

impl PublishSettings {
  pub fn timeout(&self) -> Option<Duration> {
    deadline(self.timeout_secs)
  }
}

fn deadline(secs: Option<u64>) -> Option<Duration> {
  secs.filter(|s| *s > 0).map(Duration::from_secs)
}

impl RailConfig {
  /// Find config file in search order: release.toml, .release.toml, .config/release.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = vec![
      path.join("release.toml"),
      path.join(".release.toml"),
      path.join(".config").join("release.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config from an explicit path, or search the source root, or fall back to defaults
  pub fn load(source_root: &Path, explicit: Option<&Path>) -> RailResult<Self> {
    let config_path = match explicit {
      Some(path) if !path.exists() => {
        return Err(RailError::Config(ConfigError::NotFound {
          path: path.to_path_buf(),
        }));
      }
      Some(path) => path.to_path_buf(),
      None => match Self::find_config_path(source_root) {
        Some(path) => path,
        None => {
          tracing::debug!(root = %source_root.display(), "no release.toml found, using defaults");
          return Ok(Self::default());
        }
      },
    };

    Self::from_file(&config_path)
  }

  /// Parse and validate one config file
  pub fn from_file(config_path: &Path) -> RailResult<Self> {
    let invalid = |reason: String| {
      RailError::Config(ConfigError::Invalid {
        path: config_path.to_path_buf(),
        reason,
      })
    };

    let content = fs::read_to_string(config_path).map_err(|e| invalid(e.to_string()))?;
    let config: RailConfig = toml_edit::de::from_str(&content).map_err(|e| invalid(e.to_string()))?;
    config.validate().map_err(invalid)?;

    tracing::debug!(path = %config_path.display(), "loaded config");
    Ok(config)
  }

  /// Validate the whole configuration
  pub fn validate(&self) -> Result<(), String> {
    if self.release.title.trim().is_empty() {
      return Err("[release].title must not be empty".to_string());
    }
    if let Some(repo) = &self.release.repo
      && repo.split('/').filter(|part| !part.is_empty()).count() < 2
    {
      return Err(format!("[release].repo '{}' must look like owner/name", repo));
    }
    self.build.validate()
  }
}
