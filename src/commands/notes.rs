//! Print the release notes the pipeline would publish

use crate::core::error::RailResult;
use crate::release::changelog::{self, encode_single_line};
use crate::release::version::read_version;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct NotesOptions {
  pub changelog: PathBuf,
  /// Select the section for this manifest's version instead of the latest one
  pub manifest: Option<PathBuf>,
  pub single_line: bool,
  pub json: bool,
}

#[derive(Debug, Serialize)]
struct NotesReport<'a> {
  label: &'a str,
  date: Option<&'a str>,
  /// `date` normalised to YYYY-MM-DD when it is recognisable
  release_date: Option<NaiveDate>,
  notes: String,
}

/// Run the notes command
pub fn run_notes(opts: NotesOptions) -> RailResult<()> {
  let sections = changelog::load(&opts.changelog)?;

  let section = match &opts.manifest {
    Some(manifest) => {
      let version = read_version(manifest)?;
      changelog::select(&sections, &version)?
    }
    None => changelog::latest(&sections)?,
  };

  let notes = if opts.single_line {
    encode_single_line(section.notes())
  } else {
    section.notes().to_string()
  };

  if opts.json {
    let report = NotesReport {
      label: &section.label,
      date: section.date.as_deref(),
      release_date: section.parsed_date(),
      notes,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    println!("{}", notes);
  }

  Ok(())
}
