//! Reading the release version from a manifest
//!
//! TOML manifests are read with toml_edit (pyproject, Cargo, Poetry or a bare
//! top-level `version`); `*.json` manifests use serde_json. The version string
//! is returned exactly as written.

use crate::core::error::{RailResult, VersionError};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use toml_edit::{DocumentMut, Item};

/// A version string as declared by the manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
  /// Validate a raw version string
  ///
  /// Only emptiness and whitespace are rejected: the string becomes part of a tag
  /// name and a changelog lookup key, nothing else is assumed about its shape.
  pub fn parse(raw: &str) -> Result<Self, String> {
    if raw.is_empty() {
      return Err("version is empty".to_string());
    }
    if raw.chars().any(char::is_whitespace) {
      return Err(format!("version '{}' contains whitespace", raw));
    }
    Ok(Self(raw.to_string()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Lenient semver view: missing minor/patch components are filled with zero
  pub fn semver(&self) -> Option<semver::Version> {
    let raw = self.0.strip_prefix('v').unwrap_or(&self.0);
    if let Ok(v) = semver::Version::parse(raw) {
      return Some(v);
    }

    let (core, rest) = match raw.find(['-', '+']) {
      Some(idx) => raw.split_at(idx),
      None => (raw, ""),
    };
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
      return None;
    }
    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
      padded.push_str(".0");
    }
    semver::Version::parse(&format!("{}{}", padded, rest)).ok()
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Read the version field of a manifest
pub fn read_version(manifest_path: &Path) -> RailResult<Version> {
  let content = match fs::read_to_string(manifest_path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => {
      return Err(
        VersionError::NotFound {
          path: manifest_path.to_path_buf(),
        }
        .into(),
      );
    }
    Err(e) => return Err(malformed(manifest_path, format!("unreadable: {}", e))),
  };

  let is_json = manifest_path
    .extension()
    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

  let raw = if is_json {
    version_from_json(&content)
  } else {
    version_from_toml(&content)
  }
  .map_err(|reason| malformed(manifest_path, reason))?;

  let version = Version::parse(&raw).map_err(|reason| malformed(manifest_path, reason))?;
  tracing::debug!(manifest = %manifest_path.display(), %version, "read version");
  Ok(version)
}

fn malformed(path: &Path, reason: String) -> crate::core::error::RailError {
  VersionError::Malformed {
    path: path.to_path_buf(),
    reason,
  }
  .into()
}

fn version_from_json(content: &str) -> Result<String, String> {
  let value: serde_json::Value = serde_json::from_str(content).map_err(|e| format!("invalid JSON: {}", e))?;
  match value.get("version") {
    Some(serde_json::Value::String(v)) => Ok(v.clone()),
    Some(other) => Err(format!("`version` must be a string, found {}", json_type(other))),
    None => Err("no `version` field".to_string()),
  }
}

fn json_type(value: &serde_json::Value) -> &'static str {
  match value {
    serde_json::Value::Null => "null",
    serde_json::Value::Bool(_) => "a boolean",
    serde_json::Value::Number(_) => "a number",
    serde_json::Value::String(_) => "a string",
    serde_json::Value::Array(_) => "an array",
    serde_json::Value::Object(_) => "an object",
  }
}

/// Tables searched for `version`, in order; the empty path is the document root
const TOML_VERSION_TABLES: &[&[&str]] = &[&["project"], &["package"], &["tool", "poetry"], &[]];

fn version_from_toml(content: &str) -> Result<String, String> {
  let doc: DocumentMut = content.parse().map_err(|e| format!("invalid TOML: {}", e))?;

  for path in TOML_VERSION_TABLES {
    let Some(table) = lookup(doc.as_item(), path) else {
      continue;
    };
    match table.get("version") {
      Some(item) => {
        return item
          .as_str()
          .map(str::to_string)
          .ok_or_else(|| format!("`{}` must be a string", dotted(path)));
      }
      None if is_dynamic_version(table) => {
        return Err(format!("`{}` is declared dynamic", dotted(path)));
      }
      None => {}
    }
  }

  Err("no `version` field in [project], [package], [tool.poetry] or at the top level".to_string())
}

fn lookup<'a>(root: &'a Item, path: &[&str]) -> Option<&'a Item> {
  path.iter().try_fold(root, |item, key| item.get(*key))
}

fn is_dynamic_version(table: &Item) -> bool {
  table
    .get("dynamic")
    .and_then(Item::as_array)
    .is_some_and(|arr| arr.iter().any(|v| v.as_str() == Some("version")))
}

fn dotted(path: &[&str]) -> String {
  if path.is_empty() {
    "version".to_string()
  } else {
    format!("{}.version", path.join("."))
  }
}
