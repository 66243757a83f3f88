//! GitHub releases via the gh CLI
//!
//! Every call is one `gh release ...` subprocess with an isolated environment.
//! Authentication comes from GH_TOKEN / GITHUB_TOKEN (or gh's own login) and is
//! never passed on the command line.

use crate::core::error::{AssetError, PublishError};
use crate::core::process::{self, CancelToken, ProcessError, ProcessOutput};
use crate::release::build::BuildArtifact;
use crate::release::publish::{ReleaseBackend, ReleaseHandle};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Variables passed through to gh; everything else is cleared
const ENV_ALLOWLIST: &[&str] = &[
  "PATH",
  "HOME",
  "XDG_CONFIG_HOME",
  "GH_CONFIG_DIR",
  "GH_TOKEN",
  "GITHUB_TOKEN",
  "GH_ENTERPRISE_TOKEN",
  "GITHUB_ENTERPRISE_TOKEN",
  "GH_HOST",
  "GH_REPO",
  "HTTPS_PROXY",
  "NO_PROXY",
  "SSL_CERT_FILE",
  "USERPROFILE",
  "APPDATA",
  "LOCALAPPDATA",
  "SYSTEMROOT",
];

const TOKEN_VARS: &[&str] = &["GH_TOKEN", "GITHUB_TOKEN", "GH_ENTERPRISE_TOKEN", "GITHUB_ENTERPRISE_TOKEN"];

/// Release backend driving `gh release`
pub struct GhBackend {
  program: String,
  work_dir: PathBuf,
  repo: Option<String>,
  timeout: Option<Duration>,
  cancel: CancelToken,
}

impl GhBackend {
  /// Backend running gh from `work_dir` (the checkout, so gh can infer the repository)
  pub fn new(work_dir: &Path, cancel: CancelToken) -> Self {
    Self {
      program: "gh".to_string(),
      work_dir: work_dir.to_path_buf(),
      repo: None,
      timeout: None,
      cancel,
    }
  }

  /// Target an explicit `owner/name` instead of the checkout's remote
  pub fn with_repo(mut self, repo: Option<String>) -> Self {
    self.repo = repo;
    self
  }

  /// Deadline for each gh invocation
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Use a different gh executable
  pub fn with_program(mut self, program: impl Into<String>) -> Self {
    self.program = program.into();
    self
  }

  /// Whether a token is visible in the environment
  pub fn token_in_env() -> bool {
    TOKEN_VARS
      .iter()
      .any(|var| std::env::var(var).is_ok_and(|v| !v.is_empty()))
  }

  /// Build a `gh release <args>` command with isolated environment
  ///
  /// - Working directory is the checkout
  /// - Environment cleared except for `ENV_ALLOWLIST`
  /// - Prompts and colours disabled
  fn gh_cmd(&self, args: &[&str]) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.current_dir(&self.work_dir);

    cmd.env_clear();
    for var in ENV_ALLOWLIST {
      if let Ok(value) = std::env::var(var) {
        cmd.env(var, value);
      }
    }
    cmd.env("GH_PROMPT_DISABLED", "1");
    cmd.env("NO_COLOR", "1");

    cmd.arg("release").args(args);
    if let Some(repo) = &self.repo {
      cmd.arg("--repo").arg(repo);
    }
    cmd
  }

  fn exec(&self, cmd: Command) -> Result<ProcessOutput, ProcessError> {
    tracing::debug!(command = ?cmd, "gh");
    process::run(cmd, self.timeout, &self.cancel)
  }

  fn remote_error(operation: &str, err: ProcessError) -> PublishError {
    match err {
      ProcessError::Interrupted(i) => PublishError::Interrupted(i),
      other => PublishError::Remote {
        operation: operation.to_string(),
        reason: other.to_string(),
      },
    }
  }
}

impl ReleaseBackend for GhBackend {
  fn name(&self) -> &'static str {
    "github"
  }

  fn find_release(&self, tag: &str) -> Result<Option<ReleaseHandle>, PublishError> {
    let cmd = self.gh_cmd(&["view", tag, "--json", "tagName,name,url,assets"]);
    let output = self.exec(cmd).map_err(|e| Self::remote_error("view release", e))?;

    if !output.success() {
      if is_not_found(&output.stderr) {
        return Ok(None);
      }
      return Err(PublishError::Remote {
        operation: "view release".to_string(),
        reason: output.stderr.trim().to_string(),
      });
    }

    parse_view(&output.stdout).map(Some).map_err(|reason| PublishError::Remote {
      operation: "view release".to_string(),
      reason,
    })
  }

  fn create_release(&self, tag: &str, title: &str, notes: &str) -> Result<ReleaseHandle, PublishError> {
    // `--flag=value` keeps notes starting with "-" from being read as flags
    let title_arg = format!("--title={}", title);
    let notes_arg = format!("--notes={}", notes);
    let cmd = self.gh_cmd(&["create", tag, &title_arg, &notes_arg]);
    let output = self.exec(cmd).map_err(|e| Self::remote_error("create release", e))?;

    if !output.success() {
      if is_already_exists(&output.stderr) {
        return Err(PublishError::AlreadyExists { tag: tag.to_string() });
      }
      return Err(PublishError::Remote {
        operation: "create release".to_string(),
        reason: output.stderr.trim().to_string(),
      });
    }

    let url = output.stdout.lines().rev().find(|l| l.starts_with("http")).map(str::to_string);
    Ok(ReleaseHandle {
      tag: tag.to_string(),
      title: title.to_string(),
      url,
      assets: Vec::new(),
    })
  }

  fn upload_asset(&self, release: &ReleaseHandle, artifact: &BuildArtifact) -> Result<(), AssetError> {
    let path = artifact.path.to_string_lossy();
    let cmd = self.gh_cmd(&["upload", &release.tag, &path]);
    let output = self.exec(cmd).map_err(|e| match e {
      ProcessError::Interrupted(i) => AssetError::Interrupted(i),
      other => AssetError::Transport(other.to_string()),
    })?;

    if output.success() {
      return Ok(());
    }
    if is_already_exists(&output.stderr) {
      return Err(AssetError::AlreadyAttached);
    }
    Err(AssetError::Transport(output.stderr.trim().to_string()))
  }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhRelease {
  tag_name: String,
  #[serde(default)]
  name: String,
  #[serde(default)]
  url: Option<String>,
  #[serde(default)]
  assets: Vec<GhAsset>,
}

#[derive(Debug, Deserialize)]
struct GhAsset {
  name: String,
}

/// Parse `gh release view --json tagName,name,url,assets`
fn parse_view(stdout: &str) -> Result<ReleaseHandle, String> {
  let release: GhRelease = serde_json::from_str(stdout).map_err(|e| format!("unexpected gh output: {}", e))?;
  Ok(ReleaseHandle {
    tag: release.tag_name,
    title: release.name,
    url: release.url,
    assets: release.assets.into_iter().map(|a| a.name).collect(),
  })
}

fn is_not_found(stderr: &str) -> bool {
  let stderr = stderr.to_lowercase();
  stderr.contains("release not found") || stderr.contains("http 404")
}

fn is_already_exists(stderr: &str) -> bool {
  let stderr = stderr.to_lowercase();
  stderr.contains("already exists") || stderr.contains("already_exists")
}
