//! Pipeline orchestration: version → changelog → build → publish
//!
//! Stages run strictly in order and each one completes before the next starts.
//! The first failure moves the pipeline to [`Stage::Aborted`] and is returned
//! exactly as the stage produced it. Nothing is retried here.

use crate::core::config::ReleaseSettings;
use crate::core::error::{BuildError, Interrupt, PublishError, RailError, RailResult};
use crate::core::process::CancelToken;
use crate::release::build::{ArtifactBuilder, BuildArtifact};
use crate::release::changelog::{self, ChangelogSection};
use crate::release::publish::{ReleaseDraft, ReleaseHandle, ReleasePublisher};
use crate::release::version::{Version, read_version};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Unit of work between two stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
  ReadVersion,
  ExtractChangelog,
  Build,
  Publish,
}

impl fmt::Display for Step {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      Step::ReadVersion => "read-version",
      Step::ExtractChangelog => "extract-changelog",
      Step::Build => "build",
      Step::Publish => "publish",
    };
    f.write_str(label)
  }
}

/// Where a pipeline run currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
  Start,
  VersionRead,
  ChangelogExtracted,
  Built,
  Published,
  Done,
  /// The run failed while performing `at`
  Aborted { at: Step },
}

impl Stage {
  pub fn is_terminal(self) -> bool {
    matches!(self, Stage::Done | Stage::Aborted { .. })
  }

  /// The step that leads out of this stage
  pub fn next_step(self) -> Option<Step> {
    match self {
      Stage::Start => Some(Step::ReadVersion),
      Stage::VersionRead => Some(Step::ExtractChangelog),
      Stage::ChangelogExtracted => Some(Step::Build),
      Stage::Built => Some(Step::Publish),
      Stage::Published | Stage::Done | Stage::Aborted { .. } => None,
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Stage::Start => f.write_str("start"),
      Stage::VersionRead => f.write_str("version-read"),
      Stage::ChangelogExtracted => f.write_str("changelog-extracted"),
      Stage::Built => f.write_str("built"),
      Stage::Published => f.write_str("published"),
      Stage::Done => f.write_str("done"),
      Stage::Aborted { at } => write!(f, "aborted during {}", at),
    }
  }
}

/// Files a run reads
#[derive(Debug, Clone)]
pub struct PipelineInputs {
  pub manifest: PathBuf,
  pub changelog: PathBuf,
  pub source_root: PathBuf,
}

/// Whether the remote-mutating calls are made
pub enum PublishMode<'a> {
  Live(ReleasePublisher<'a>),
  /// Stop before creating the release; the draft is reported instead
  DryRun,
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
  pub stage: Stage,
  pub dry_run: bool,
  pub version: Version,
  /// The version read as semver, when it is one
  pub semver: Option<String>,
  pub changelog_section: String,
  /// The section's date label, when it parses as a date
  pub release_date: Option<NaiveDate>,
  pub draft: ReleaseDraft,
  pub release: Option<ReleaseHandle>,
}

/// Runs the release stages in order and keeps what each produced
pub struct PipelineOrchestrator<'a> {
  settings: ReleaseSettings,
  builder: ArtifactBuilder,
  mode: PublishMode<'a>,
  cancel: CancelToken,

  stage: Stage,
  version: Option<Version>,
  section: Option<ChangelogSection>,
  artifacts: Vec<BuildArtifact>,
  draft: Option<ReleaseDraft>,
  release: Option<ReleaseHandle>,
}

impl<'a> PipelineOrchestrator<'a> {
  pub fn new(settings: ReleaseSettings, builder: ArtifactBuilder, mode: PublishMode<'a>, cancel: CancelToken) -> Self {
    Self {
      settings,
      builder,
      mode,
      cancel,
      stage: Stage::Start,
      version: None,
      section: None,
      artifacts: Vec::new(),
      draft: None,
      release: None,
    }
  }

  pub fn stage(&self) -> Stage {
    self.stage
  }

  pub fn version(&self) -> Option<&Version> {
    self.version.as_ref()
  }

  pub fn section(&self) -> Option<&ChangelogSection> {
    self.section.as_ref()
  }

  pub fn artifacts(&self) -> &[BuildArtifact] {
    &self.artifacts
  }

  pub fn draft(&self) -> Option<&ReleaseDraft> {
    self.draft.as_ref()
  }

  /// The created release, also after a partial upload failure
  pub fn release(&self) -> Option<&ReleaseHandle> {
    self.release.as_ref()
  }

  /// Run every stage; the returned error is the failing stage's own error
  pub fn run(&mut self, inputs: &PipelineInputs) -> RailResult<PipelineReport> {
    if self.stage != Stage::Start {
      return Err(RailError::with_help(
        format!("Pipeline already ran (stage: {})", self.stage),
        "Create a new PipelineOrchestrator for each run.",
      ));
    }

    match self.execute(inputs) {
      Ok(report) => {
        self.advance(Stage::Done);
        Ok(PipelineReport {
          stage: self.stage,
          ..report
        })
      }
      Err(err) => {
        tracing::error!(stage = %self.stage, kind = ?err.kind(), "pipeline aborted");
        if let Some(at) = self.stage.next_step() {
          self.stage = Stage::Aborted { at };
        }
        Err(err)
      }
    }
  }

  fn execute(&mut self, inputs: &PipelineInputs) -> RailResult<PipelineReport> {
    let version = {
      let _span = tracing::info_span!("stage", name = "version").entered();
      read_version(&inputs.manifest)?
    };
    tracing::info!(%version, manifest = %inputs.manifest.display(), "version");
    self.version = Some(version.clone());
    self.advance(Stage::VersionRead);

    let section = {
      let _span = tracing::info_span!("stage", name = "changelog").entered();
      let sections = changelog::load(&inputs.changelog)?;
      changelog::select(&sections, &version)?.clone()
    };
    tracing::info!(section = %section.label, date = section.date.as_deref().unwrap_or("-"), "release notes");
    self.section = Some(section.clone());
    self.advance(Stage::ChangelogExtracted);

    if self.cancel.is_cancelled() {
      return Err(BuildError::Interrupted(Interrupt::Cancelled).into());
    }
    let tag = self.settings.tag_for(version.as_str());
    let artifacts = {
      let _span = tracing::info_span!("stage", name = "build").entered();
      let artifacts = self.builder.build(&inputs.source_root, &self.cancel)?;
      self.builder.record(&inputs.source_root, &tag, &artifacts)?;
      artifacts
    };
    self.artifacts = artifacts.clone();
    self.advance(Stage::Built);

    let draft = ReleaseDraft {
      title: self.settings.title_for(&tag, version.as_str()),
      tag,
      notes: section.notes().to_string(),
      artifacts,
    };
    self.draft = Some(draft.clone());

    let dry_run = match &self.mode {
      PublishMode::DryRun => {
        tracing::info!(tag = %draft.tag, "dry run: skipping release creation and upload");
        true
      }
      PublishMode::Live(publisher) => {
        if self.cancel.is_cancelled() {
          return Err(PublishError::Interrupted(Interrupt::Cancelled).into());
        }
        let _span = tracing::info_span!("stage", name = "publish").entered();
        let release = self.release.insert(publisher.create(&draft)?);
        publisher.upload(release, &draft.artifacts)?;
        false
      }
    };
    self.advance(Stage::Published);

    Ok(PipelineReport {
      stage: self.stage,
      dry_run,
      semver: version.semver().map(|v| v.to_string()),
      version,
      release_date: section.parsed_date(),
      changelog_section: section.label,
      draft,
      release: self.release.clone(),
    })
  }

  fn advance(&mut self, next: Stage) {
    tracing::debug!(from = %self.stage, to = %next, "stage transition");
    self.stage = next;
  }
}
