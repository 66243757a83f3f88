//! Test helpers for integration tests

use anyhow::{Context, Result};
use release_rail::release::PipelineInputs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use tempfile::TempDir;

/// Two released versions, newest first
pub const SAMPLE_CHANGELOG: &str = "# Changelog

All notable changes to this project will be documented in this file.

## [0.2] - 03/21/2025
Added: X

## [0.1] - 03/14/2025
Added: Y
";

/// Toolchain stand-in that drops one wheel into dist/
pub const WHEEL_BUILD: &str = "mkdir -p dist && printf wheel > dist/pkg.whl";

/// A package checkout with manifest, changelog and release.toml
pub struct TestProject {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestProject {
  /// Create a project at `version` whose build runs `build_script` through `sh -c`
  pub fn new(version: &str, changelog: &str, build_script: &str) -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    std::fs::write(
      path.join("pyproject.toml"),
      format!(
        r#"[build-system]
requires = ["setuptools>=68"]
build-backend = "setuptools.build_meta"

[project]
name = "pkg"
version = "{}"
"#,
        version
      ),
    )?;
    std::fs::write(path.join("CHANGELOG.md"), changelog)?;

    let project = Self { _root: root, path };
    project.set_build_script(build_script)?;
    Ok(project)
  }

  /// Rewrite release.toml with a different build script
  pub fn set_build_script(&self, script: &str) -> Result<()> {
    anyhow::ensure!(!script.contains('\''), "build script must not contain single quotes");
    std::fs::write(
      self.path.join("release.toml"),
      format!(
        r#"[build]
program = "sh"
args = ["-c", '{}']
timeout_secs = 30
"#,
        script
      ),
    )?;
    Ok(())
  }

  /// Pipeline inputs using the default file names
  pub fn inputs(&self) -> PipelineInputs {
    PipelineInputs {
      manifest: self.path.join("pyproject.toml"),
      changelog: self.path.join("CHANGELOG.md"),
      source_root: self.path.clone(),
    }
  }

  pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
    let full = self.path.join(path);
    if let Some(parent) = full.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(full, content)?;
    Ok(())
  }

  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }
}

/// Run the run-release binary; failures are returned, not raised
pub fn run_release(cwd: &Path, args: &[&str]) -> Result<Output> {
  run_release_with_path(cwd, args, None)
}

/// Run the run-release binary with `extra_path` prepended to PATH
pub fn run_release_with_path(cwd: &Path, args: &[&str], extra_path: Option<&Path>) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_run-release");

  let mut cmd = Command::new(bin);
  cmd.current_dir(cwd).args(args).env("NO_COLOR", "1").env_remove("RUST_LOG");
  if let Some(dir) = extra_path {
    let path = std::env::var("PATH").unwrap_or_default();
    cmd.env("PATH", format!("{}:{}", dir.display(), path));
  }

  cmd.output().context("Failed to run run-release")
}

/// Start the run-release binary without waiting, output piped
pub fn spawn_release(cwd: &Path, args: &[&str]) -> Result<Child> {
  Command::new(env!("CARGO_BIN_EXE_run-release"))
    .current_dir(cwd)
    .args(args)
    .env("NO_COLOR", "1")
    .env_remove("RUST_LOG")
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .context("Failed to start run-release")
}

/// Run the binary and require success
pub fn run_release_ok(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = run_release(cwd, args)?;
  if !output.status.success() {
    anyhow::bail!(
      "run-release {} failed\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout(&output),
      stderr(&output)
    );
  }
  Ok(output)
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).into_owned()
}
