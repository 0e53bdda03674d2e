//! Command handlers module.
//!
//! - `import.rs`: Import lifecycle commands (run, progress, cancel, finish, count)
//! - `config.rs`: Configuration display command

mod config;
mod import;

use std::path::{Path, PathBuf};

use clap::Subcommand;
use csv_importer::{ImportDefinition, ImportEngine, ImporterConfig, RoutingImporter};

pub use config::cmd_config;
pub use import::{cmd_cancel, cmd_count, cmd_finish, cmd_progress, cmd_run};

/// Sink receiving valid rows when the definition declares none.
pub const DEFAULT_VALID_SINK: &str = "valid_entities";
/// Sink receiving invalid rows when the definition declares none.
pub const DEFAULT_INVALID_SINK: &str = "invalid_entities";

/// Import lifecycle subcommands.
#[derive(Subcommand)]
pub enum ImportAction {
    /// Run the import (returns immediately if it is already running or finished).
    Run {
        /// CSV source file.
        source: PathBuf,

        /// Suffix appended to the import identifier.
        #[arg(long)]
        suffix: Option<String>,

        /// Field delimiter, overriding config and definition.
        #[arg(long)]
        delimiter: Option<char>,
    },

    /// Show the progress of the import.
    Progress {
        /// Suffix appended to the import identifier.
        #[arg(long)]
        suffix: Option<String>,
    },

    /// Request cancellation of a running import.
    Cancel {
        /// Suffix appended to the import identifier.
        #[arg(long)]
        suffix: Option<String>,
    },

    /// Collect the final result and clear the import session.
    Finish {
        /// Suffix appended to the import identifier.
        #[arg(long)]
        suffix: Option<String>,
    },

    /// Count the data rows of a CSV source.
    Count {
        /// CSV source file.
        source: PathBuf,
    },
}

/// Builds an engine for the definition file.
///
/// Valid rows go to the first declared sink and invalid rows to the second;
/// without declarations the default sink names are added.
pub fn build_engine(
    config: ImporterConfig,
    definition_path: &Path,
    identifier: Option<&str>,
    suffix: Option<&str>,
) -> Result<ImportEngine<RoutingImporter>, Box<dyn std::error::Error>> {
    let mut definition = ImportDefinition::load_from_file(definition_path)?;
    let (valid, invalid) = sink_names(&mut definition);

    let mut importer = RoutingImporter::new(definition, valid, invalid);
    let name = identifier.map(str::to_string).or_else(|| {
        definition_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
    });
    if let Some(name) = name {
        importer = importer.with_identifier(name);
    }

    let mut engine = ImportEngine::from_config(importer, config)?;
    if let Some(suffix) = suffix {
        engine.concat_identifier(suffix);
    }
    Ok(engine)
}

fn sink_names(definition: &mut ImportDefinition) -> (String, String) {
    let mut declared = definition.csv_files.keys().cloned();
    let valid = declared.next();
    let invalid = declared.next();
    drop(declared);

    let valid = valid.unwrap_or_else(|| {
        definition.csv_files.insert(
            DEFAULT_VALID_SINK.to_string(),
            PathBuf::from(format!("{DEFAULT_VALID_SINK}.csv")),
        );
        DEFAULT_VALID_SINK.to_string()
    });
    let invalid = invalid.unwrap_or_else(|| {
        definition.csv_files.insert(
            DEFAULT_INVALID_SINK.to_string(),
            PathBuf::from(format!("{DEFAULT_INVALID_SINK}.csv")),
        );
        DEFAULT_INVALID_SINK.to_string()
    });
    (valid, invalid)
}
