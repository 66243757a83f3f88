//! Building distributable artifacts with an external toolchain
//!
//! The toolchain is opaque: it runs in the source root and is expected to drop
//! packages into the output directory. Success is judged by its exit code and
//! by what actually appears on disk afterwards. A record of what the last
//! build produced is kept next to the artifacts so a later upload-only run
//! attaches exactly those files.

use crate::core::config::BuildSettings;
use crate::core::error::{BuildError, RailError, RailResult, ResultExt};
use crate::core::process::{self, CancelToken, ProcessError, display_command};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime};

/// File in the output directory listing the last build's artifacts
pub const BUILD_RECORD: &str = ".release-rail.json";

/// A built package file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildArtifact {
  pub path: PathBuf,
  /// File name, also the asset name on the release
  pub name: String,
  pub size: u64,
  /// Lowercase hex SHA-256
  pub sha256: String,
}

impl BuildArtifact {
  /// Describe an existing file
  pub fn from_path(path: &Path) -> RailResult<Self> {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .ok_or_else(|| RailError::message(format!("Not a file path: {}", path.display())))?;
    let data = fs::read(path).with_context(|| format!("Failed to read artifact {}", path.display()))?;

    let mut hasher = Sha256::new();
    hasher.update(&data);

    Ok(Self {
      path: path.to_path_buf(),
      name,
      size: data.len() as u64,
      sha256: format!("{:x}", hasher.finalize()),
    })
  }
}

/// What one build produced, for the release it was built for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
  pub tag: String,
  pub artifacts: Vec<RecordedArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedArtifact {
  pub name: String,
  pub sha256: String,
}

impl BuildRecord {
  pub fn new(tag: &str, artifacts: &[BuildArtifact]) -> Self {
    Self {
      tag: tag.to_string(),
      artifacts: artifacts
        .iter()
        .map(|a| RecordedArtifact {
          name: a.name.clone(),
          sha256: a.sha256.clone(),
        })
        .collect(),
    }
  }
}

/// Runs the configured toolchain and collects what it produced
#[derive(Debug, Clone)]
pub struct ArtifactBuilder {
  program: String,
  args: Vec<String>,
  output_dir: PathBuf,
  patterns: Vec<Pattern>,
  timeout: Option<Duration>,
  min_size: u64,
}

impl ArtifactBuilder {
  pub fn new(settings: &BuildSettings) -> RailResult<Self> {
    let patterns = settings
      .artifacts
      .iter()
      .map(|p| Pattern::new(p).map_err(|e| format!("Invalid artifact glob '{}': {}", p, e)))
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      program: settings.program.clone(),
      args: settings.args.clone(),
      output_dir: settings.output_dir.clone(),
      patterns,
      timeout: settings.timeout(),
      min_size: settings.min_size_bytes,
    })
  }

  /// Override the build deadline
  pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Absolute output directory for a source root
  pub fn output_dir(&self, source_root: &Path) -> PathBuf {
    source_root.join(&self.output_dir)
  }

  /// Command line with placeholders substituted
  pub fn command_line(&self, source_root: &Path) -> (String, Vec<String>) {
    let root = source_root.to_string_lossy();
    let out = self.output_dir(source_root);
    let out = out.to_string_lossy();
    let args = self
      .args
      .iter()
      .map(|a| a.replace("{source_root}", &root).replace("{output_dir}", &out))
      .collect();
    (self.program.clone(), args)
  }

  /// Run the toolchain and return the artifacts it created or rewrote
  pub fn build(&self, source_root: &Path, cancel: &CancelToken) -> RailResult<Vec<BuildArtifact>> {
    let output_dir = self.output_dir(source_root);
    let before = self.snapshot(&output_dir)?;

    let (program, args) = self.command_line(source_root);
    tracing::info!(command = %display_command(&program, &args), "running build toolchain");

    let mut cmd = Command::new(&program);
    cmd.args(&args).current_dir(source_root);

    let output = process::run(cmd, self.timeout, cancel).map_err(|e| match e {
      ProcessError::Interrupted(i) => BuildError::Interrupted(i),
      ProcessError::Spawn(e) | ProcessError::Wait(e) => BuildError::Spawn {
        program: program.clone(),
        reason: e.to_string(),
      },
    })?;

    for line in output.stdout.lines() {
      tracing::debug!(target: "release_rail::build::toolchain", "{}", line);
    }

    if !output.success() {
      return Err(
        BuildError::Failed {
          exit_code: output.exit_code,
          stderr: output.stderr,
        }
        .into(),
      );
    }

    let fresh: Vec<PathBuf> = self
      .matching_files(&output_dir)?
      .into_iter()
      .filter(|(path, modified)| before.get(path) != Some(modified))
      .map(|(path, _)| path)
      .collect();

    let artifacts = self.describe(fresh)?;
    if artifacts.is_empty() {
      return Err(self.nothing_produced(&output_dir));
    }

    for artifact in &artifacts {
      tracing::info!(artifact = %artifact.name, size = artifact.size, sha256 = %artifact.sha256, "built");
    }
    Ok(artifacts)
  }

  /// Remember which artifacts were built for `tag`
  pub fn record(&self, source_root: &Path, tag: &str, artifacts: &[BuildArtifact]) -> RailResult<()> {
    let path = self.output_dir(source_root).join(BUILD_RECORD);
    let json = serde_json::to_string_pretty(&BuildRecord::new(tag, artifacts))?;
    fs::write(&path, json).with_context(|| format!("Failed to write build record {}", path.display()))?;
    tracing::debug!(record = %path.display(), %tag, "build recorded");
    Ok(())
  }

  /// Gather the artifacts the last build recorded for `tag`, without building
  ///
  /// Every recorded file must still be on disk with the checksum it was built
  /// with. Other files in the output directory are ignored.
  pub fn collect(&self, source_root: &Path, tag: &str) -> RailResult<Vec<BuildArtifact>> {
    let output_dir = self.output_dir(source_root);
    let not_built = |reason: String| -> RailError {
      BuildError::NotBuilt {
        tag: tag.to_string(),
        reason,
      }
      .into()
    };

    let path = output_dir.join(BUILD_RECORD);
    let text = match fs::read_to_string(&path) {
      Ok(text) => text,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        return Err(not_built(format!("no build record in {}", output_dir.display())));
      }
      Err(e) => return Err(e).with_context(|| format!("Failed to read build record {}", path.display())),
    };
    let record: BuildRecord = serde_json::from_str(&text)
      .map_err(|e| not_built(format!("unreadable build record {}: {}", path.display(), e)))?;

    if record.tag != tag {
      return Err(not_built(format!("the last build was for {}", record.tag)));
    }

    let mut artifacts = Vec::with_capacity(record.artifacts.len());
    for recorded in &record.artifacts {
      let file = output_dir.join(&recorded.name);
      if !file.is_file() {
        return Err(not_built(format!("{} is missing from {}", recorded.name, output_dir.display())));
      }
      let artifact = BuildArtifact::from_path(&file)?;
      if artifact.sha256 != recorded.sha256 {
        return Err(not_built(format!("{} changed since it was built", recorded.name)));
      }
      artifacts.push(artifact);
    }

    if artifacts.is_empty() {
      return Err(self.nothing_produced(&output_dir));
    }
    Ok(artifacts)
  }

  fn nothing_produced(&self, output_dir: &Path) -> RailError {
    BuildError::NoArtifactProduced {
      output_dir: output_dir.to_path_buf(),
      patterns: self.patterns.iter().map(|p| p.as_str().to_string()).collect(),
    }
    .into()
  }

  fn describe(&self, mut paths: Vec<PathBuf>) -> RailResult<Vec<BuildArtifact>> {
    paths.sort();
    let mut artifacts = Vec::with_capacity(paths.len());
    for path in paths {
      let artifact = BuildArtifact::from_path(&path)?;
      if artifact.size < self.min_size {
        tracing::warn!(artifact = %artifact.name, size = artifact.size, "ignoring undersized artifact");
        continue;
      }
      artifacts.push(artifact);
    }
    Ok(artifacts)
  }

  fn snapshot(&self, output_dir: &Path) -> RailResult<HashMap<PathBuf, Option<SystemTime>>> {
    Ok(self.matching_files(output_dir)?.into_iter().collect())
  }

  /// Regular files directly under `output_dir` whose name matches an artifact glob
  fn matching_files(&self, output_dir: &Path) -> RailResult<Vec<(PathBuf, Option<SystemTime>)>> {
    let entries = match fs::read_dir(output_dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e).with_context(|| format!("Failed to list {}", output_dir.display())),
    };

    let mut files = Vec::new();
    for entry in entries {
      let entry = entry.with_context(|| format!("Failed to list {}", output_dir.display()))?;
      let metadata = entry.metadata()?;
      if !metadata.is_file() {
        continue;
      }
      let name = entry.file_name();
      let name = name.to_string_lossy();
      if name == BUILD_RECORD {
        continue;
      }
      if self.patterns.iter().any(|p| p.matches(&name)) {
        files.push((entry.path(), metadata.modified().ok()));
      }
    }
    Ok(files)
  }
}
