//! In-process release service
//!
//! Behaves like the remote service (no overwrites, per-asset failures) without
//! any network. Used to exercise the pipeline stage by stage and to rehearse
//! failure modes: queue a failure with [`MemoryBackend::fail_next_upload`].

use crate::core::error::{AssetError, PublishError};
use crate::release::build::BuildArtifact;
use crate::release::publish::{ReleaseBackend, ReleaseHandle};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// A release as stored by [`MemoryBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRelease {
  pub tag: String,
  pub title: String,
  pub notes: String,
  pub assets: Vec<String>,
}

impl StoredRelease {
  fn handle(&self) -> ReleaseHandle {
    ReleaseHandle {
      tag: self.tag.clone(),
      title: self.title.clone(),
      url: Some(format!("memory://releases/{}", self.tag)),
      assets: self.assets.clone(),
    }
  }
}

#[derive(Debug, Default)]
struct State {
  releases: BTreeMap<String, StoredRelease>,
  upload_faults: HashMap<String, AssetError>,
  create_fault: Option<String>,
  create_calls: usize,
  upload_calls: usize,
}

/// Release service kept in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
  state: Mutex<State>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make the next upload of `asset_name` fail with `error`
  pub fn fail_next_upload(&self, asset_name: &str, error: AssetError) {
    self.lock().upload_faults.insert(asset_name.to_string(), error);
  }

  /// Make the next create call fail with a remote error
  pub fn fail_next_create(&self, reason: &str) {
    self.lock().create_fault = Some(reason.to_string());
  }

  /// Snapshot of a stored release
  pub fn release(&self, tag: &str) -> Option<StoredRelease> {
    self.lock().releases.get(tag).cloned()
  }

  pub fn release_count(&self) -> usize {
    self.lock().releases.len()
  }

  pub fn create_calls(&self) -> usize {
    self.lock().create_calls
  }

  /// Upload attempts that reached the service, failed ones included
  pub fn upload_calls(&self) -> usize {
    self.lock().upload_calls
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }
}

impl ReleaseBackend for MemoryBackend {
  fn name(&self) -> &'static str {
    "memory"
  }

  fn find_release(&self, tag: &str) -> Result<Option<ReleaseHandle>, PublishError> {
    Ok(self.lock().releases.get(tag).map(StoredRelease::handle))
  }

  fn create_release(&self, tag: &str, title: &str, notes: &str) -> Result<ReleaseHandle, PublishError> {
    let mut state = self.lock();
    state.create_calls += 1;

    if let Some(reason) = state.create_fault.take() {
      return Err(PublishError::Remote {
        operation: "create release".to_string(),
        reason,
      });
    }
    if state.releases.contains_key(tag) {
      return Err(PublishError::AlreadyExists { tag: tag.to_string() });
    }

    let release = StoredRelease {
      tag: tag.to_string(),
      title: title.to_string(),
      notes: notes.to_string(),
      assets: Vec::new(),
    };
    let handle = release.handle();
    state.releases.insert(tag.to_string(), release);
    Ok(handle)
  }

  fn upload_asset(&self, release: &ReleaseHandle, artifact: &BuildArtifact) -> Result<(), AssetError> {
    let mut state = self.lock();
    state.upload_calls += 1;

    if let Some(error) = state.upload_faults.remove(&artifact.name) {
      return Err(error);
    }

    let stored = state
      .releases
      .get_mut(&release.tag)
      .ok_or_else(|| AssetError::Transport(format!("release {} not found", release.tag)))?;
    if stored.assets.contains(&artifact.name) {
      return Err(AssetError::AlreadyAttached);
    }
    stored.assets.push(artifact.name.clone());
    Ok(())
  }
}
