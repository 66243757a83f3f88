//! Integration tests for the run-release binary that never reach the release service

use crate::helpers::{
  SAMPLE_CHANGELOG, TestProject, WHEEL_BUILD, run_release, run_release_ok, spawn_release, stderr, stdout,
};
use anyhow::Result;
use std::time::{Duration, Instant};

#[cfg(unix)]
#[test]
fn test_dry_run_prints_release_without_publishing() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;

  let output = run_release_ok(&project.path, &["--dry-run"])?;
  let stdout = stdout(&output);

  assert!(stdout.contains("Dry-run"), "stdout: {stdout}");
  assert!(stdout.contains("v0.2"));
  assert!(stdout.contains("Added: X"));
  assert!(!stdout.contains("Added: Y"));
  assert!(stdout.contains("pkg.whl"));
  assert!(stdout.contains("sha256"));
  assert!(stdout.contains("Date:     2025-03-21"));
  assert!(project.file_exists("dist/pkg.whl"), "dry run still builds");
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_dry_run_json_report() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;

  let output = run_release_ok(&project.path, &["--dry-run", "--json"])?;
  let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;

  assert_eq!(report["dry_run"], true);
  assert_eq!(report["stage"], "done");
  assert_eq!(report["version"], "0.2");
  assert_eq!(report["semver"], "0.2.0");
  assert_eq!(report["release_date"], "2025-03-21");
  assert_eq!(report["draft"]["tag"], "v0.2");
  assert_eq!(report["draft"]["notes"], "Added: X");
  assert_eq!(report["draft"]["artifacts"][0]["name"], "pkg.whl");
  let sha = report["draft"]["artifacts"][0]["sha256"].as_str().unwrap_or_default();
  assert_eq!(sha.len(), 64);
  assert!(sha.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
  assert!(report["release"].is_null());
  Ok(())
}

#[test]
fn test_missing_manifest_exits_with_read_code() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;

  let output = run_release(&project.path, &["--dry-run", "--manifest", "missing.toml"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Manifest not found"));
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_empty_changelog_exits_before_build() -> Result<()> {
  let project = TestProject::new("0.2", "# Changelog\n", "touch built.marker")?;

  let output = run_release(&project.path, &[])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("no version sections"));
  assert!(!project.file_exists("built.marker"));
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_failed_build_exits_with_build_code() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, "echo toolchain exploded >&2; exit 3")?;

  let output = run_release(&project.path, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(2));
  let stderr = stderr(&output);
  assert!(stderr.contains("exit code 3"), "stderr: {stderr}");
  assert!(stderr.contains("toolchain exploded"));
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_build_without_artifact_exits_with_build_code() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, "mkdir -p dist")?;

  let output = run_release(&project.path, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(2));
  assert!(stderr(&output).contains("no artifact"));
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_ctrl_c_cancels_running_build() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, &format!("sleep 20 && {}", WHEEL_BUILD))?;
  let started = Instant::now();
  let child = spawn_release(&project.path, &["--dry-run"])?;

  std::thread::sleep(Duration::from_secs(1));
  let sent = std::process::Command::new("kill")
    .args(["-INT", &child.id().to_string()])
    .status()?;
  assert!(sent.success());

  let output = child.wait_with_output()?;
  assert_eq!(output.status.code(), Some(2), "stderr: {}", stderr(&output));
  assert!(stderr(&output).contains("cancelled"));
  assert!(started.elapsed() < Duration::from_secs(10));
  assert!(!project.file_exists("dist/pkg.whl"));
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_build_timeout_flag() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, "sleep 5")?;

  let output = run_release(&project.path, &["--dry-run", "--build-timeout", "1"])?;

  assert_eq!(output.status.code(), Some(2));
  assert!(stderr(&output).contains("timed out"));
  Ok(())
}

#[test]
fn test_invalid_config_exits_with_read_code() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  project.write_file("release.toml", "[build]\nartifacts = []\n")?;

  let output = run_release(&project.path, &["--dry-run"])?;

  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("Invalid config"));
  Ok(())
}

#[test]
fn test_notes_prints_latest_section() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;

  let output = run_release_ok(&project.path, &["notes"])?;

  assert_eq!(stdout(&output), "Added: X\n");
  Ok(())
}

#[test]
fn test_notes_for_manifest_version() -> Result<()> {
  let project = TestProject::new("0.1", SAMPLE_CHANGELOG, WHEEL_BUILD)?;

  let output = run_release_ok(&project.path, &["notes", "--manifest", "pyproject.toml"])?;

  assert_eq!(stdout(&output), "Added: Y\n");
  Ok(())
}

#[test]
fn test_notes_single_line_encoding() -> Result<()> {
  let project = TestProject::new(
    "0.3",
    "## [0.3] - 2025-04-01\n### Added\n- 100% more speed\n- retries\n",
    WHEEL_BUILD,
  )?;

  let output = run_release_ok(&project.path, &["notes", "--single-line"])?;

  assert_eq!(stdout(&output), "### Added%0A- 100%25 more speed%0A- retries\n");
  Ok(())
}

#[test]
fn test_notes_json_normalises_date() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;

  let output = run_release_ok(&project.path, &["notes", "--json"])?;
  let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;

  assert_eq!(report["label"], "0.2");
  assert_eq!(report["date"], "03/21/2025");
  assert_eq!(report["release_date"], "2025-03-21");
  assert_eq!(report["notes"], "Added: X");
  Ok(())
}

#[test]
fn test_subcommand_rejects_run_flags() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;

  let output = run_release(&project.path, &["--dry-run", "notes"])?;

  assert!(!output.status.success());
  Ok(())
}
