//! Import lifecycle command handlers.
//!
//! Every command prints one JSON document to stdout so that a web layer or a
//! shell script can poll the import the same way.

use std::path::Path;

use csv_importer::{ImportEngine, RoutingImporter, RunOutcome};
use serde_json::json;

fn print_json(value: &serde_json::Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run command.
pub fn cmd_run(
    mut engine: ImportEngine<RoutingImporter>,
    source: &Path,
    delimiter: Option<char>,
) -> Result<(), Box<dyn std::error::Error>> {
    engine.attach_source(source)?;
    if let Some(delimiter) = delimiter {
        engine.set_delimiter(delimiter)?;
    }

    match engine.run() {
        Ok(RunOutcome::MissingSource) => print_json(&json!({ "error": "no source file" })),
        Ok(RunOutcome::Progress(payload)) => print_json(&serde_json::to_value(payload)?),
        Ok(RunOutcome::Canceled(payload)) => {
            print_json(&json!({ "canceled": true, "progress": payload }))
        },
        Err(csv_importer::Error::Validation(report)) => {
            print_json(&json!({ "errors": report }))?;
            Err("CSV headers failed validation".into())
        },
        Err(e) => Err(e.into()),
    }
}

/// Progress command.
pub fn cmd_progress(
    engine: &ImportEngine<RoutingImporter>,
) -> Result<(), Box<dyn std::error::Error>> {
    print_json(&serde_json::to_value(engine.progress()?)?)
}

/// Cancel command.
pub fn cmd_cancel(engine: &ImportEngine<RoutingImporter>) -> Result<(), Box<dyn std::error::Error>> {
    engine.cancel()?;
    print_json(&json!({ "canceled": true, "identifier": engine.identifier().as_str() }))
}

/// Finish command.
pub fn cmd_finish(engine: &ImportEngine<RoutingImporter>) -> Result<(), Box<dyn std::error::Error>> {
    print_json(&serde_json::to_value(engine.finish()?)?)
}

/// Count command.
pub fn cmd_count(
    mut engine: ImportEngine<RoutingImporter>,
    source: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    engine.attach_source(source)?;
    let rows = engine.count_csv()?.unwrap_or(0);
    print_json(&json!({ "source": source.display().to_string(), "rows": rows }))
}
