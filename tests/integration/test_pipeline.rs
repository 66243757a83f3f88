//! End-to-end pipeline runs through the library API against the in-memory release service

use crate::helpers::{SAMPLE_CHANGELOG, TestProject, WHEEL_BUILD};
use anyhow::Result;
use release_rail::core::config::RailConfig;
use release_rail::core::error::{AssetError, ErrorKind, PublishError, RailError};
use release_rail::core::process::CancelToken;
use release_rail::release::memory::MemoryBackend;
use release_rail::release::{ArtifactBuilder, PipelineOrchestrator, PublishMode, ReleasePublisher, Stage, Step};

fn pipeline<'a>(project: &TestProject, backend: &'a MemoryBackend) -> Result<PipelineOrchestrator<'a>> {
  let config = RailConfig::load(&project.path, None)?;
  let builder = ArtifactBuilder::new(&config.build)?;
  Ok(PipelineOrchestrator::new(
    config.release,
    builder,
    PublishMode::Live(ReleasePublisher::new(backend)),
    CancelToken::new(),
  ))
}

#[cfg(unix)]
#[test]
fn test_release_uses_matching_section_and_tag() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let backend = MemoryBackend::new();

  let report = pipeline(&project, &backend)?.run(&project.inputs())?;

  assert_eq!(report.stage, Stage::Done);
  assert_eq!(report.draft.tag, "v0.2");
  assert_eq!(report.draft.notes, "Added: X");

  let stored = backend.release("v0.2").expect("release created");
  assert_eq!(stored.title, "v0.2");
  assert_eq!(stored.notes, "Added: X");
  assert_eq!(stored.assets, vec!["pkg.whl"]);
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_empty_changelog_stops_before_build() -> Result<()> {
  let project = TestProject::new("0.2", "# Changelog\n\nNothing yet.\n", "touch built.marker")?;
  let backend = MemoryBackend::new();
  let mut pipeline = pipeline(&project, &backend)?;

  let err = pipeline.run(&project.inputs()).unwrap_err();

  assert_eq!(err.kind(), ErrorKind::NoSections);
  assert_eq!(err.exit_code().as_i32(), 1);
  assert_eq!(pipeline.stage(), Stage::Aborted { at: Step::ExtractChangelog });
  assert!(!project.file_exists("built.marker"), "build must not run");
  assert_eq!(backend.release_count(), 0);
  assert_eq!(backend.create_calls(), 0);
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_failed_upload_keeps_release_and_resume_completes_it() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let backend = MemoryBackend::new();
  backend.fail_next_upload("pkg.whl", AssetError::Transport("connection reset by peer".into()));

  let mut pipeline = pipeline(&project, &backend)?;
  let err = pipeline.run(&project.inputs()).unwrap_err();

  assert_eq!(err.kind(), ErrorKind::UploadFailed);
  assert_eq!(err.exit_code().as_i32(), 3);
  match &err {
    RailError::Publish(PublishError::UploadFailed { failures, uploaded, .. }) => {
      assert_eq!(failures.len(), 1);
      assert!(failures[0].file.ends_with("dist/pkg.whl"));
      assert!(uploaded.is_empty());
    }
    other => panic!("unexpected error: {other}"),
  }

  // Release exists, empty
  assert_eq!(backend.release("v0.2").expect("release kept").assets, Vec::<String>::new());
  assert_eq!(pipeline.release().map(|r| r.assets.len()), Some(0));

  let resumed = ReleasePublisher::new(&backend).resume("v0.2", pipeline.artifacts())?;
  assert_eq!(resumed.assets, vec!["pkg.whl"]);
  assert_eq!(backend.release("v0.2").expect("release").assets, vec!["pkg.whl"]);
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_second_run_for_same_version_is_rejected() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, WHEEL_BUILD)?;
  let backend = MemoryBackend::new();
  pipeline(&project, &backend)?.run(&project.inputs())?;
  let first = backend.release("v0.2").expect("release");

  project.write_file(
    "CHANGELOG.md",
    &SAMPLE_CHANGELOG.replace("Added: X", "Added: X, reworded"),
  )?;
  let err = pipeline(&project, &backend)?.run(&project.inputs()).unwrap_err();

  assert_eq!(err.kind(), ErrorKind::ReleaseAlreadyExists);
  assert_eq!(backend.release("v0.2").expect("release"), first);
  assert_eq!(backend.create_calls(), 1);
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_stale_artifacts_do_not_count_as_build_output() -> Result<()> {
  let project = TestProject::new("0.2", SAMPLE_CHANGELOG, "true")?;
  project.write_file("dist/pkg-0.1.whl", "old wheel")?;
  let backend = MemoryBackend::new();

  let err = pipeline(&project, &backend)?.run(&project.inputs()).unwrap_err();

  assert_eq!(err.kind(), ErrorKind::NoArtifactProduced);
  assert_eq!(err.exit_code().as_i32(), 2);
  assert_eq!(backend.release_count(), 0);
  Ok(())
}

#[cfg(unix)]
#[test]
fn test_release_title_and_tag_follow_config() -> Result<()> {
  let project = TestProject::new("1.4.0", "## [1.4.0] - 2025-06-01\n- faster\n", WHEEL_BUILD)?;
  let config = project.read_file("release.toml")?;
  project.write_file(
    "release.toml",
    &format!("[release]\ntag_prefix = \"release-\"\ntitle = \"pkg {{version}}\"\n\n{}", config),
  )?;
  let backend = MemoryBackend::new();

  let report = pipeline(&project, &backend)?.run(&project.inputs())?;

  assert_eq!(report.draft.tag, "release-1.4.0");
  assert_eq!(report.draft.title, "pkg 1.4.0");
  assert_eq!(backend.release("release-1.4.0").expect("release").notes, "- faster");
  Ok(())
}
