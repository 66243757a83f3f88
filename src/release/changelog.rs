//! Changelog parsing and release-notes selection
//!
//! A changelog is split on `## [<label>]` headers (Keep a Changelog style,
//! optionally followed by ` - <date>`). Sections are kept in document order,
//! which is trusted to be newest-first: nothing is sorted by version.
//!
//! ```text
//! # Changelog
//!
//! ## [0.2] - 03/21/2025
//! Added: X
//!
//! ## [0.1] - 03/14/2025
//! Added: Y
//! ```

use crate::core::error::{ChangelogError, RailResult};
use crate::release::version::Version;
use chrono::NaiveDate;
use std::fs;
use std::io;
use std::path::Path;

const HEADER_PREFIX: &str = "## [";

/// Date label formats tried by [`ChangelogSection::parsed_date`]
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y"];

/// One version's entry
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ChangelogSection {
  /// Text between the brackets of the header
  pub label: String,
  /// Text after ` - ` on the header line, if any
  pub date: Option<String>,
  /// Lines between this header and the next one, verbatim
  pub body: String,
}

impl ChangelogSection {
  /// Body with surrounding blank lines removed; what gets published as release notes
  pub fn notes(&self) -> &str {
    self.body.trim_matches(|c| c == '\n' || c == '\r').trim_end()
  }

  /// Date label interpreted as a calendar date, when it uses a known format
  pub fn parsed_date(&self) -> Option<NaiveDate> {
    let raw = self.date.as_deref()?.trim();
    DATE_FORMATS
      .iter()
      .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
  }

  /// Whether this section documents `version` (a leading `v` on either side is ignored)
  pub fn matches(&self, version: &Version) -> bool {
    strip_v(self.label.trim()) == strip_v(version.as_str())
  }
}

fn strip_v(s: &str) -> &str {
  s.strip_prefix(['v', 'V']).unwrap_or(s)
}

/// Split a header line into (label, date)
fn parse_header(line: &str) -> Option<(String, Option<String>)> {
  let rest = line.strip_prefix(HEADER_PREFIX)?;
  let close = rest.find(']')?;
  let label = rest[..close].trim();
  if label.is_empty() {
    return None;
  }

  let tail = rest[close + 1..].trim();
  let date = tail
    .strip_prefix('-')
    .or_else(|| tail.strip_prefix('–'))
    .map(str::trim)
    .filter(|d| !d.is_empty())
    .map(str::to_string);

  Some((label.to_string(), date))
}

/// Parse a changelog document into sections, in document order
///
/// Bodies keep the document's bytes, line endings included.
pub fn parse(document: &str) -> Vec<ChangelogSection> {
  let mut sections = Vec::new();
  let mut current: Option<ChangelogSection> = None;

  for line in document.split_inclusive('\n') {
    if let Some((label, date)) = parse_header(line.trim_end_matches(['\n', '\r'])) {
      sections.extend(current.take());
      current = Some(ChangelogSection {
        label,
        date,
        body: String::new(),
      });
    } else if let Some(section) = current.as_mut() {
      section.body.push_str(line);
    }
  }

  sections.extend(current);
  sections
}

/// Whether the dated sections run newest-first, as document order assumes
pub fn dates_descending(sections: &[ChangelogSection]) -> bool {
  let dates: Vec<NaiveDate> = sections.iter().filter_map(ChangelogSection::parsed_date).collect();
  dates.windows(2).all(|pair| pair[0] >= pair[1])
}

/// The most recent section: the first one in the document
pub fn latest(sections: &[ChangelogSection]) -> RailResult<&ChangelogSection> {
  sections
    .first()
    .ok_or_else(|| ChangelogError::NoSections { path: None }.into())
}

/// The section for `version`, or the latest one when no label matches
pub fn select<'a>(sections: &'a [ChangelogSection], version: &Version) -> RailResult<&'a ChangelogSection> {
  if let Some(section) = sections.iter().find(|s| s.matches(version)) {
    return Ok(section);
  }

  let fallback = latest(sections)?;
  tracing::warn!(
    %version,
    section = %fallback.label,
    "no changelog section for this version, using the latest section"
  );
  Ok(fallback)
}

/// Read a changelog file
pub fn read_changelog(path: &Path) -> RailResult<String> {
  match fs::read_to_string(path) {
    Ok(content) => Ok(content),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Err(
      ChangelogError::NotFound {
        path: path.to_path_buf(),
      }
      .into(),
    ),
    Err(e) => Err(crate::core::error::RailError::Io(e)),
  }
}

/// Read and parse a changelog, failing with `NoSections` when it has none
pub fn load(path: &Path) -> RailResult<Vec<ChangelogSection>> {
  let sections = parse(&read_changelog(path)?);
  if sections.is_empty() {
    return Err(
      ChangelogError::NoSections {
        path: Some(path.to_path_buf()),
      }
      .into(),
    );
  }
  if !dates_descending(&sections) {
    tracing::warn!(
      changelog = %path.display(),
      "changelog dates are not newest-first; the first section is still treated as the latest"
    );
  }
  tracing::debug!(changelog = %path.display(), sections = sections.len(), "parsed changelog");
  Ok(sections)
}

/// Escape a multi-line body for a single-line channel (CI step outputs, env vars)
///
/// `%`, `\n` and `\r` become `%25`, `%0A` and `%0D`; [`decode_single_line`] reverses it.
pub fn encode_single_line(body: &str) -> String {
  let mut out = String::with_capacity(body.len());
  for c in body.chars() {
    match c {
      '%' => out.push_str("%25"),
      '\n' => out.push_str("%0A"),
      '\r' => out.push_str("%0D"),
      c => out.push(c),
    }
  }
  out
}

/// Inverse of [`encode_single_line`]; unknown `%` sequences are kept as-is
pub fn decode_single_line(encoded: &str) -> String {
  let mut out = String::with_capacity(encoded.len());
  let mut rest = encoded;
  while let Some(idx) = rest.find('%') {
    out.push_str(&rest[..idx]);
    let escape = &rest[idx..];
    let decoded = if escape.starts_with("%25") {
      Some('%')
    } else if escape.starts_with("%0A") {
      Some('\n')
    } else if escape.starts_with("%0D") {
      Some('\r')
    } else {
      None
    };
    match decoded {
      Some(c) => {
        out.push(c);
        rest = &escape[3..];
      }
      None => {
        out.push('%');
        rest = &escape[1..];
      }
    }
  }
  out.push_str(rest);
  out
}
