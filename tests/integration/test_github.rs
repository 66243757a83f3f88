//! Live runs against a stand-in `gh` placed first on PATH
//!
//! The stand-in records every invocation in `bin/calls.log`.

#![cfg(unix)]

use crate::helpers::{SAMPLE_CHANGELOG, TestProject, WHEEL_BUILD, run_release_with_path, stderr, stdout};
use anyhow::Result;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const VIEW_MISSING: &str = "echo 'release not found' >&2; exit 1";

/// Install a fake gh whose `release view` runs `view_script`
fn install_fake_gh(project: &TestProject, view_script: &str) -> Result<PathBuf> {
  let bin = project.path.join("bin");
  std::fs::create_dir_all(&bin)?;
  let script = format!(
    r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
case "$2" in
  view) {view_script} ;;
  create) echo "https://github.com/o/r/releases/tag/$3" ;;
  upload) exit 0 ;;
  *) echo "unexpected gh call: $*" >&2; exit 64 ;;
esac
"#
  );
  let gh = bin.join("gh");
  std::fs::write(&gh, script)?;
  std::fs::set_permissions(&gh, std::fs::Permissions::from_mode(0o755))?;
  Ok(bin)
}

/// Build through a dry run so the output directory carries a build record
fn build_for_upload(project: &TestProject, bin: &Path) -> Result<()> {
  let output = run_release_with_path(&project.path, &["--dry-run"], Some(bin))?;
  anyhow::ensure!(output.status.success(), "dry run failed: {}", stderr(&output));
  Ok(())
}

fn calls(project: &TestProject) -> Result<Vec<String>> {
  if !project.file_exists("bin/calls.log") {
    return Ok(Vec::new());
  }
  Ok(project.read_file("bin/calls.log")?.lines().map(String::from).collect())
}

#[test]
fn test_live_run_creates_release_and_uploads() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let bin = install_fake_gh(&project, VIEW_MISSING)?;

  let output = run_release_with_path(&project.path, &["--repo", "o/r"], Some(&bin))?;
  assert!(output.status.success(), "stderr: {}", stderr(&output));

  let stdout = stdout(&output);
  assert!(stdout.contains("Released v0.2"));
  assert!(stdout.contains("https://github.com/o/r/releases/tag/v0.2"));

  let calls = calls(&project)?;
  assert_eq!(calls.len(), 3, "calls: {calls:?}");
  assert_eq!(calls[0], "release view v0.2 --json tagName,name,url,assets --repo o/r");
  assert_eq!(calls[1], "release create v0.2 --title=v0.2 --notes=Added: X --repo o/r");
  assert!(calls[2].starts_with("release upload v0.2 "));
  assert!(calls[2].contains("dist/pkg.whl"));
  Ok(())
}

#[test]
fn test_existing_release_is_a_hard_stop() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let bin = install_fake_gh(
    &project,
    r#"echo '{"tagName":"v0.2","name":"v0.2","url":"https://x","assets":[]}'"#,
  )?;

  let output = run_release_with_path(&project.path, &[], Some(&bin))?;

  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("Release v0.2 already exists"));
  assert!(calls(&project)?.iter().all(|c| !c.contains("create") && !c.contains("upload")));
  Ok(())
}

#[test]
fn test_dry_run_never_calls_gh() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let bin = install_fake_gh(&project, VIEW_MISSING)?;

  let output = run_release_with_path(&project.path, &["--dry-run"], Some(&bin))?;

  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert!(calls(&project)?.is_empty());
  Ok(())
}

#[test]
fn test_upload_attaches_missing_assets() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let bin = install_fake_gh(
    &project,
    r#"echo '{"tagName":"v0.2","name":"v0.2","url":"https://x","assets":[]}'"#,
  )?;
  build_for_upload(&project, &bin)?;

  let output = run_release_with_path(&project.path, &["upload"], Some(&bin))?;

  assert!(output.status.success(), "stderr: {}", stderr(&output));
  let calls = calls(&project)?;
  assert_eq!(calls.len(), 2, "calls: {calls:?}");
  assert!(calls[1].starts_with("release upload v0.2 "));
  Ok(())
}

#[test]
fn test_upload_skips_attached_assets() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let bin = install_fake_gh(
    &project,
    r#"echo '{"tagName":"v0.2","name":"v0.2","url":"https://x","assets":[{"name":"pkg.whl"}]}'"#,
  )?;
  build_for_upload(&project, &bin)?;

  let output = run_release_with_path(&project.path, &["upload"], Some(&bin))?;

  assert!(output.status.success(), "stderr: {}", stderr(&output));
  assert_eq!(calls(&project)?.len(), 1);
  Ok(())
}

#[test]
fn test_upload_without_release_exits_with_publish_code() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let bin = install_fake_gh(&project, VIEW_MISSING)?;
  build_for_upload(&project, &bin)?;

  let output = run_release_with_path(&project.path, &["upload"], Some(&bin))?;

  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("does not exist"));
  Ok(())
}

#[test]
fn test_upload_leaves_other_versions_wheels_behind() -> Result<()> {
  let build = "mkdir -p dist && printf wheel > dist/pkg-0.2-py3-none-any.whl";
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, build)?;
  project.write_file("dist/pkg-0.1-py3-none-any.whl", "old wheel")?;
  let bin = install_fake_gh(
    &project,
    r#"echo '{"tagName":"v0.2","name":"v0.2","url":"https://x","assets":[]}'"#,
  )?;
  build_for_upload(&project, &bin)?;

  let output = run_release_with_path(&project.path, &["upload"], Some(&bin))?;

  assert!(output.status.success(), "stderr: {}", stderr(&output));
  let calls = calls(&project)?;
  assert!(calls.iter().any(|c| c.contains("pkg-0.2-py3-none-any.whl")), "calls: {calls:?}");
  assert!(calls.iter().all(|c| !c.contains("pkg-0.1")), "calls: {calls:?}");
  Ok(())
}

#[test]
fn test_upload_without_build_record_exits_with_build_code() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  project.write_file("dist/pkg.whl", "wheel")?;
  let bin = install_fake_gh(&project, VIEW_MISSING)?;

  let output = run_release_with_path(&project.path, &["upload"], Some(&bin))?;

  assert_eq!(output.status.code(), Some(2));
  assert!(stderr(&output).contains("no build record"));
  assert!(calls(&project)?.is_empty());
  Ok(())
}
