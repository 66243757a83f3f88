use clap::{Args, Parser, Subcommand};
use release_rail::commands::{self, NotesOptions, RunOptions, UploadOptions};
use release_rail::core::error::{RailError, print_error};
use release_rail::core::logging;
use std::path::PathBuf;

/// Cut a release: read the version, extract the notes, build and publish
#[derive(Parser)]
#[command(name = "run-release")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
#[command(styles = get_styles())]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,

  #[command(flatten)]
  run: RunArgs,

  /// Log debug detail (toolchain output, subprocess commands)
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Also write logs to this file
  #[arg(long, global = true, value_name = "PATH")]
  log_file: Option<PathBuf>,
}

#[derive(Args)]
struct RunArgs {
  /// Manifest holding the package version
  #[arg(long, default_value = "pyproject.toml")]
  manifest: PathBuf,
  /// Changelog with `## [version] - date` sections
  #[arg(long, default_value = "CHANGELOG.md")]
  changelog: PathBuf,
  /// Directory the build toolchain runs in
  #[arg(long, default_value = ".")]
  source_root: PathBuf,
  /// Build and print the release without creating it
  #[arg(long)]
  dry_run: bool,
  /// Output the run report in JSON format
  #[arg(long)]
  json: bool,
  /// Target repository as owner/name (default: inferred by gh)
  #[arg(long)]
  repo: Option<String>,
  /// Config file (default: release.toml in the source root)
  #[arg(long)]
  config: Option<PathBuf>,
  /// Build deadline in seconds (0 disables it)
  #[arg(long, value_name = "SECS")]
  build_timeout: Option<u64>,
  /// Deadline for each release service call in seconds (0 disables it)
  #[arg(long, value_name = "SECS")]
  publish_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
  /// Print the release notes for the current version
  Notes {
    #[arg(long, default_value = "CHANGELOG.md")]
    changelog: PathBuf,
    /// Pick the section matching this manifest's version (default: latest section)
    #[arg(long)]
    manifest: Option<PathBuf>,
    /// Encode newlines so the notes fit on one line
    #[arg(long)]
    single_line: bool,
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Attach missing artifacts to the release for the current version
  Upload {
    #[arg(long, default_value = "pyproject.toml")]
    manifest: PathBuf,
    #[arg(long, default_value = ".")]
    source_root: PathBuf,
    #[arg(long)]
    repo: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_name = "SECS")]
    publish_timeout: Option<u64>,
    /// Output the release in JSON format
    #[arg(long)]
    json: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  use anstyle::{AnsiColor, Color, Style};

  clap::builder::Styles::styled()
    .usage(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
    .header(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
    .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
    .invalid(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
    .error(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Red))))
    .valid(Style::new().bold().underline().fg_color(Some(Color::Ansi(AnsiColor::Green))))
    .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  if let Err(err) = logging::init(cli.verbose, cli.log_file.as_deref()) {
    handle_error(err);
  }

  let result = match cli.command {
    Some(Commands::Notes {
      changelog,
      manifest,
      single_line,
      json,
    }) => commands::run_notes(NotesOptions {
      changelog,
      manifest,
      single_line,
      json,
    }),
    Some(Commands::Upload {
      manifest,
      source_root,
      repo,
      config,
      publish_timeout,
      json,
    }) => commands::run_upload(UploadOptions {
      manifest,
      source_root,
      repo,
      config,
      publish_timeout,
      json,
    }),
    None => {
      let run = cli.run;
      commands::run_release(RunOptions {
        manifest: run.manifest,
        changelog: run.changelog,
        source_root: run.source_root,
        dry_run: run.dry_run,
        json: run.json,
        repo: run.repo,
        config: run.config,
        build_timeout: run.build_timeout,
        publish_timeout: run.publish_timeout,
      })
    }
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: RailError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
