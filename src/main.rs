//! Binary entry point for csv-importer.
//!
//! This binary drives one import definition through its lifecycle from the
//! command line.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use commands::ImportAction;
use csv_importer::ImporterConfig;
use csv_importer::observability::{self, LoggingConfig};

/// csv-importer - A resumable CSV batch-import engine.
#[derive(Parser)]
#[command(name = "csv-importer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "CSV_IMPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Import definition (TOML).
    #[arg(short, long, global = true)]
    definition: Option<PathBuf>,

    /// Import identifier (defaults to the definition file name).
    #[arg(short, long, global = true)]
    identifier: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Import(ImportAction),

    /// Show the effective configuration.
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = observability::init(LoggingConfig::from_env(cli.verbose)) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

fn run_command(cli: Cli, config: ImporterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let action = match cli.command {
        Commands::Config => return commands::cmd_config(&config),
        Commands::Import(action) => action,
    };
    let definition = cli
        .definition
        .ok_or("--definition is required for import commands")?;
    let build = |suffix: Option<&str>| {
        commands::build_engine(config.clone(), &definition, cli.identifier.as_deref(), suffix)
    };

    match action {
        ImportAction::Run {
            source,
            suffix,
            delimiter,
        } => commands::cmd_run(build(suffix.as_deref())?, &source, delimiter),
        ImportAction::Progress { suffix } => commands::cmd_progress(&build(suffix.as_deref())?),
        ImportAction::Cancel { suffix } => commands::cmd_cancel(&build(suffix.as_deref())?),
        ImportAction::Finish { suffix } => commands::cmd_finish(&build(suffix.as_deref())?),
        ImportAction::Count { source } => commands::cmd_count(build(None)?, &source),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ImporterConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(ImporterConfig::load_from_file(path)?),
        None => Ok(ImporterConfig::load_default()),
    }
}
