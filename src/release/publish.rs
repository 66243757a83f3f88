//! Publishing a release in two phases: create the record, then attach files
//!
//! The [`ReleaseHandle`] returned by creation is the explicit intermediate state.
//! When an upload fails the release is kept, partially populated, and
//! [`ReleasePublisher::resume`] can fill in the missing files later.
//!
//! Re-uploading an asset that is already attached fails fast with
//! `AlreadyAttached`; nothing is ever overwritten.

use crate::core::error::{AssetError, PublishError, RailResult, UploadFailure};
use crate::release::build::BuildArtifact;
use crate::ui::progress::UploadProgress;
use serde::Serialize;

/// A remote release as last observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseHandle {
  pub tag: String,
  pub title: String,
  /// Web URL when the service reports one
  pub url: Option<String>,
  /// Names of attached assets
  pub assets: Vec<String>,
}

impl ReleaseHandle {
  pub fn has_asset(&self, name: &str) -> bool {
    self.assets.iter().any(|a| a == name)
  }
}

/// Everything needed to publish one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseDraft {
  pub tag: String,
  pub title: String,
  pub notes: String,
  pub artifacts: Vec<BuildArtifact>,
}

/// Remote release service
///
/// Implementations must not overwrite anything: `create_release` on an existing
/// tag returns `AlreadyExists`, `upload_asset` of an attached name returns
/// `AlreadyAttached`.
pub trait ReleaseBackend {
  /// Short name for logs ("github", "memory")
  fn name(&self) -> &'static str;

  /// Look up the release for a tag
  fn find_release(&self, tag: &str) -> Result<Option<ReleaseHandle>, PublishError>;

  /// Create a release record with no assets
  fn create_release(&self, tag: &str, title: &str, notes: &str) -> Result<ReleaseHandle, PublishError>;

  /// Attach one file to an existing release
  fn upload_asset(&self, release: &ReleaseHandle, artifact: &BuildArtifact) -> Result<(), AssetError>;
}

/// Creates releases and attaches artifacts through a [`ReleaseBackend`]
pub struct ReleasePublisher<'a> {
  backend: &'a dyn ReleaseBackend,
  show_progress: bool,
}

impl<'a> ReleasePublisher<'a> {
  pub fn new(backend: &'a dyn ReleaseBackend) -> Self {
    Self {
      backend,
      show_progress: false,
    }
  }

  /// Draw a progress bar while uploading
  pub fn with_progress(mut self, show: bool) -> Self {
    self.show_progress = show;
    self
  }

  /// Create the release for `draft.tag` and attach every artifact
  ///
  /// An existing release is a hard stop (`ReleaseAlreadyExists`) and is left untouched.
  pub fn publish(&self, draft: &ReleaseDraft) -> RailResult<ReleaseHandle> {
    let mut release = self.create(draft)?;
    self.upload(&mut release, &draft.artifacts)?;
    Ok(release)
  }

  /// Phase one: create the release record
  pub fn create(&self, draft: &ReleaseDraft) -> RailResult<ReleaseHandle> {
    if self.backend.find_release(&draft.tag)?.is_some() {
      return Err(PublishError::AlreadyExists { tag: draft.tag.clone() }.into());
    }

    let release = self.backend.create_release(&draft.tag, &draft.title, &draft.notes)?;
    tracing::info!(
      backend = self.backend.name(),
      tag = %release.tag,
      url = release.url.as_deref().unwrap_or("-"),
      "created release"
    );
    Ok(release)
  }

  /// Phase two: attach files, attempting every one and reporting each failure
  ///
  /// The handle's asset list is updated as uploads succeed, so after a partial
  /// failure it reflects what the release actually holds.
  pub fn upload(&self, release: &mut ReleaseHandle, artifacts: &[BuildArtifact]) -> RailResult<()> {
    let mut failures = Vec::new();
    let mut uploaded = Vec::new();
    let mut progress = (self.show_progress && artifacts.len() > 1)
      .then(|| UploadProgress::new(artifacts.len(), format!("Uploading to {}", release.tag)));

    for artifact in artifacts {
      let result = if release.has_asset(&artifact.name) {
        Err(AssetError::AlreadyAttached)
      } else {
        self.backend.upload_asset(release, artifact)
      };

      match result {
        Ok(()) => {
          tracing::info!(tag = %release.tag, asset = %artifact.name, "uploaded");
          release.assets.push(artifact.name.clone());
          uploaded.push(artifact.name.clone());
        }
        Err(error) => {
          tracing::error!(tag = %release.tag, asset = %artifact.name, %error, "upload failed");
          failures.push(UploadFailure {
            file: artifact.path.clone(),
            error,
          });
        }
      }

      if let Some(progress) = progress.as_mut() {
        progress.inc();
      }
    }

    if failures.is_empty() {
      return Ok(());
    }

    Err(
      PublishError::UploadFailed {
        tag: release.tag.clone(),
        failures,
        uploaded,
      }
      .into(),
    )
  }

  /// Re-run only the upload phase against an existing release
  ///
  /// Assets already attached are skipped; the rest are uploaded as in [`upload`](Self::upload).
  pub fn resume(&self, tag: &str, artifacts: &[BuildArtifact]) -> RailResult<ReleaseHandle> {
    let mut release = self
      .backend
      .find_release(tag)?
      .ok_or_else(|| PublishError::NotFound { tag: tag.to_string() })?;

    let (present, missing): (Vec<_>, Vec<_>) = artifacts
      .iter()
      .cloned()
      .partition(|a| release.has_asset(&a.name));

    for artifact in &present {
      tracing::info!(tag, asset = %artifact.name, "already attached, skipping");
    }

    if missing.is_empty() {
      tracing::info!(tag, "release already holds every artifact");
      return Ok(release);
    }

    self.upload(&mut release, &missing)?;
    Ok(release)
  }
}
