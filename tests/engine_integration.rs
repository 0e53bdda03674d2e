//! End-to-end tests of the import lifecycle.
//!
//! Every test runs against the file cache and file locks inside a temporary
//! directory, so nothing leaks between tests:
//! - Row routing into valid and invalid sinks
//! - Header validation and lock release on failure
//! - Concurrent `run()` callers against one identifier, sequential and racing
//! - Cancellation, finish idempotence and session clearing

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::doc_markdown,
    clippy::significant_drop_tightening
)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Barrier, Mutex};

use csv_importer::filters::FilterRegistry;
use csv_importer::{
    Error, FieldRule, ImportContext, ImportDefinition, ImportEngine, ImportIdentifier,
    ImporterConfig, Importer, Result, Row, RunOutcome,
};
use serde_json::{Value, json};
use tempfile::TempDir;

const SOURCE: &str = "serial_number,title,company\n1,Guitar One,ESP\nx,Guitar Two,Ibanez\n";

/// Rows seen by the hooks, tagged with their route.
#[derive(Default)]
struct Journal {
    routed: Mutex<Vec<(&'static str, Row)>>,
    canceled: AtomicUsize,
}

impl Journal {
    fn routes(&self) -> Vec<&'static str> {
        self.routed.lock().unwrap().iter().map(|(r, _)| *r).collect()
    }

    fn rows(&self, route: &str) -> Vec<Row> {
        self.routed
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == route)
            .map(|(_, row)| row.clone())
            .collect()
    }
}

/// Guitar importer writing to `valid_entities` / `invalid_entities`.
struct GuitarImporter {
    journal: Arc<Journal>,
    cancel_after: Option<(usize, Box<dyn Fn() + Send>)>,
    gate: Option<(Sender<()>, Receiver<()>)>,
}

impl GuitarImporter {
    fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            cancel_after: None,
            gate: None,
        }
    }

    fn record(&mut self, route: &'static str, row: Row, ctx: &mut ImportContext<'_>) -> Result<()> {
        if let Some((started, proceed)) = self.gate.take() {
            started.send(()).unwrap();
            proceed.recv().unwrap();
        }
        let sink = if route == "valid" {
            "valid_entities"
        } else {
            "invalid_entities"
        };
        ctx.insert_to(sink, &row)?;
        let seen = {
            let mut routed = self.journal.routed.lock().unwrap();
            routed.push((route, row));
            routed.len()
        };
        if let Some((after, cancel)) = &self.cancel_after {
            if seen == *after {
                cancel();
            }
        }
        Ok(())
    }
}

impl Importer for GuitarImporter {
    fn definition(&self) -> ImportDefinition {
        ImportDefinition::new()
            .field(
                "serial_number",
                FieldRule::new().required().validate("numeric").cast("string"),
            )
            .field("title", FieldRule::new().cast("lowercase"))
            .csv_file("valid_entities", "valid_entities.csv")
            .csv_file("invalid_entities", "invalid_entities.csv")
    }

    fn identifier(&self) -> ImportIdentifier {
        ImportIdentifier::new("guitars")
    }

    fn register_filters(&self, registry: &mut FilterRegistry) {
        registry.register_cast_fn(
            |value: Value| match value {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other,
            },
            Some("lowercase"),
        );
    }

    fn handle(&mut self, row: Row, ctx: &mut ImportContext<'_>) -> Result<()> {
        self.record("valid", row, ctx)
    }

    fn invalid(&mut self, row: Row, ctx: &mut ImportContext<'_>) -> Result<()> {
        self.record("invalid", row, ctx)
    }

    fn on_cancel(&mut self) {
        self.journal.canceled.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(dir: &TempDir) -> ImporterConfig {
    ImporterConfig::default()
        .with_cache_path(dir.path().join("cache"))
        .with_storage_root(dir.path().join("storage"))
}

fn write_source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn engine(dir: &TempDir, importer: GuitarImporter, source: &Path) -> ImportEngine<GuitarImporter> {
    let mut engine = ImportEngine::from_config(importer, config(dir)).unwrap();
    engine.attach_source(source).unwrap();
    engine
}

fn read_sink(path: &str) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}

#[test]
fn test_rows_are_cast_validated_and_routed() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());
    let source = write_source(&dir, "guitars.csv", SOURCE);
    let mut engine = engine(&dir, GuitarImporter::new(Arc::clone(&journal)), &source);

    let outcome = engine.run().unwrap();
    let payload = outcome.payload().unwrap();
    assert!(payload.meta.finished);
    assert!(engine.is_finished().unwrap());

    let valid = journal.rows("valid");
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0]["serial_number"], json!("1"));
    assert_eq!(valid[0]["title"], json!("guitar one"));
    assert_eq!(valid[0]["company"], json!("ESP"));

    let invalid = journal.rows("invalid");
    assert_eq!(invalid.len(), 1);
    assert_eq!(invalid[0]["serial_number"], json!("x"));
    assert_eq!(invalid[0]["company"], json!("Ibanez"));

    let terminal = engine.finish().unwrap();
    let files = terminal.files.clone().unwrap();
    assert_eq!(
        read_sink(&files["valid_entities"]),
        vec![
            vec!["serial_number", "title", "company"],
            vec!["1", "guitar one", "ESP"],
        ]
    );
    assert_eq!(read_sink(&files["invalid_entities"]).len(), 2);
}

#[test]
fn test_missing_required_header_fails_and_releases_lock() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());
    let source = write_source(&dir, "guitars.csv", "title,company\nGuitar One,ESP\n");
    let mut engine = engine(&dir, GuitarImporter::new(Arc::clone(&journal)), &source);

    let err = engine.run().unwrap_err();
    let Error::Validation(report) = err else {
        panic!("expected a validation report, got {err:?}");
    };
    assert_eq!(report.quantity(), 1);
    assert!(report.to_string().contains("serial_number"));
    assert!(journal.routes().is_empty());

    let payload = engine.progress().unwrap();
    assert!(!payload.meta.running);
    assert!(!engine.progress_store().snapshot().unwrap().finished);

    // A corrected source runs under the same identifier straight away.
    let fixed = write_source(&dir, "fixed.csv", SOURCE);
    engine.attach_source(&fixed).unwrap();
    assert!(engine.run().unwrap().payload().unwrap().meta.finished);
}

#[test]
fn test_duplicate_headers_are_all_reported() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());
    let source = write_source(
        &dir,
        "guitars.csv",
        "serial_number,title,title,company,company\n1,a,b,c,d\n",
    );
    let mut engine = engine(&dir, GuitarImporter::new(journal), &source);

    let Err(Error::Validation(report)) = engine.run() else {
        panic!("expected a validation report");
    };
    assert_eq!(report.quantity(), 2);
}

#[test]
fn test_second_run_returns_progress_while_first_is_processing() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, "guitars.csv", SOURCE);

    let (started_tx, started_rx) = channel();
    let (proceed_tx, proceed_rx) = channel();
    let first_journal = Arc::new(Journal::default());
    let mut first = GuitarImporter::new(Arc::clone(&first_journal));
    first.gate = Some((started_tx, proceed_rx));
    let mut first = engine(&dir, first, &source);

    let handle = std::thread::spawn(move || first.run().unwrap());
    started_rx.recv().unwrap();

    let second_journal = Arc::new(Journal::default());
    let mut second = engine(&dir, GuitarImporter::new(Arc::clone(&second_journal)), &source);
    let RunOutcome::Progress(payload) = second.run().unwrap() else {
        panic!("second run must report progress");
    };
    assert!(payload.meta.running);
    assert!(!payload.meta.finished);
    assert_eq!(payload.meta.processed, Some(0));
    assert!(second_journal.routes().is_empty());

    proceed_tx.send(()).unwrap();
    let outcome = handle.join().unwrap();
    assert!(outcome.payload().unwrap().meta.finished);
    assert_eq!(first_journal.routes().len(), 2);
    assert_eq!(second.progress_store().snapshot().unwrap().processed, 2);
}

#[test]
fn test_finished_import_is_not_restarted_before_finish() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());
    let source = write_source(&dir, "guitars.csv", SOURCE);
    let mut engine = engine(&dir, GuitarImporter::new(Arc::clone(&journal)), &source);

    engine.run().unwrap();
    let again = engine.run().unwrap();
    assert!(again.payload().unwrap().meta.finished);
    assert_eq!(journal.routes().len(), 2);
}

#[test]
fn test_finish_is_idempotent_until_the_session_is_cleared() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());
    let source = write_source(&dir, "guitars.csv", SOURCE);
    let mut engine = engine(&dir, GuitarImporter::new(journal), &source);

    let before = engine.finish().unwrap();
    assert!(!before.meta.finished);
    assert_eq!(before.data.message, "Import process does not run");

    engine.run().unwrap();
    let progress = engine.progress().unwrap();
    assert!(progress.meta.finished);
    assert_eq!(progress.data.message, engine.config().messages.finished);

    let terminal = engine.finish().unwrap();
    assert!(terminal.meta.finished);
    assert_eq!(terminal.data.message, "The import process successfully finished!");
    assert_eq!(terminal.files.as_ref().map(indexmap::IndexMap::len), Some(2));

    let after = engine.finish().unwrap();
    assert!(!after.meta.finished);
    assert!(!after.meta.running);
    assert_eq!(after.data.message, "Import process does not run");
    assert!(after.files.is_none());
}

#[test]
fn test_cancel_before_run_stops_at_first_checkpoint() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());
    let source = write_source(&dir, "guitars.csv", SOURCE);
    let mut engine = engine(&dir, GuitarImporter::new(Arc::clone(&journal)), &source);

    engine.cancel().unwrap();
    let outcome = engine.run().unwrap();

    assert!(outcome.is_canceled());
    assert_eq!(
        outcome.payload().unwrap().data.message,
        "Importing has been canceled"
    );
    assert!(journal.routes().is_empty());
    assert_eq!(journal.canceled.load(Ordering::SeqCst), 1);
    assert!(!engine.progress_store().is_canceled().unwrap());
    assert!(!engine.progress().unwrap().meta.running);
}

#[test]
fn test_cancel_during_run_stops_before_next_row() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());
    let rows: String = (1..=10).map(|n| format!("{n},Guitar {n},ESP\n")).collect();
    let source = write_source(
        &dir,
        "guitars.csv",
        &format!("serial_number,title,company\n{rows}"),
    );

    // The hook raises the flag from a second engine handle, as a web request would.
    let canceler = ImportEngine::from_config(
        GuitarImporter::new(Arc::new(Journal::default())),
        config(&dir),
    )
    .unwrap();
    let canceler = Arc::new(Mutex::new(canceler));
    let mut importer = GuitarImporter::new(Arc::clone(&journal));
    let remote = Arc::clone(&canceler);
    importer.cancel_after = Some((3, Box::new(move || remote.lock().unwrap().cancel().unwrap())));

    let mut engine = engine(&dir, importer, &source);
    let outcome = engine.run().unwrap();

    assert!(outcome.is_canceled());
    assert_eq!(journal.routes().len(), 3);
    assert_eq!(journal.canceled.load(Ordering::SeqCst), 1);

    let snapshot = engine.progress_store().snapshot().unwrap();
    assert_eq!(snapshot.processed, 0);
    assert_eq!(snapshot.quantity, None);
    assert!(snapshot.paths.is_empty());

    // The lock is free again.
    let rerun = engine.run().unwrap();
    assert!(rerun.payload().unwrap().meta.finished);
    assert_eq!(journal.routes().len(), 13);
}

#[test]
fn test_every_row_is_routed_exactly_once() {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::default());
    let rows: String = (0..50)
        .map(|n| {
            if n % 3 == 0 {
                format!("bad{n},Guitar {n},ESP\n")
            } else {
                format!("{n},Guitar {n},ESP\n")
            }
        })
        .collect();
    let source = write_source(
        &dir,
        "guitars.csv",
        &format!("serial_number,title,company\n{rows}"),
    );
    let mut engine = engine(&dir, GuitarImporter::new(Arc::clone(&journal)), &source);

    engine.run().unwrap();
    let valid = journal.rows("valid").len();
    let invalid = journal.rows("invalid").len();
    assert_eq!(valid + invalid, 50);
    assert_eq!(invalid, 17);
    assert_eq!(engine.progress_store().snapshot().unwrap().processed, 50);

    let files = engine.finish().unwrap().files.unwrap();
    let written = read_sink(&files["valid_entities"]).len() - 1
        + read_sink(&files["invalid_entities"]).len()
        - 1;
    assert_eq!(written, 50);
}

#[test]
fn test_suffixed_identifiers_run_independently() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, "guitars.csv", SOURCE);

    let mut first = engine(&dir, GuitarImporter::new(Arc::new(Journal::default())), &source);
    first.concat_identifier("_1");
    let mut second = engine(&dir, GuitarImporter::new(Arc::new(Journal::default())), &source);
    second.concat_identifier("_2");

    first.run().unwrap();
    assert!(first.is_finished().unwrap());
    assert!(!second.is_finished().unwrap());
    assert!(second.run().unwrap().payload().unwrap().meta.finished);
}

#[test]
fn test_output_paths_are_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let source = write_source(&dir, "guitars.csv", SOURCE);
    std::fs::create_dir_all(dir.path().join("storage")).unwrap();
    std::fs::write(dir.path().join("storage/valid_entities.csv"), "keep me\n").unwrap();

    let mut engine = engine(&dir, GuitarImporter::new(Arc::new(Journal::default())), &source);
    engine.run().unwrap();
    let files = engine.finish().unwrap().files.unwrap();

    assert_ne!(
        PathBuf::from(&files["valid_entities"]),
        dir.path().join("storage/valid_entities.csv")
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("storage/valid_entities.csv")).unwrap(),
        "keep me\n"
    );
}

#[test]
fn test_concurrent_runs_enter_handle_in_one_engine_only() {
    const ENGINES: usize = 6;
    let rows: String = (1..=20).map(|n| format!("{n},Guitar {n},ESP\n")).collect();

    for round in 0..20 {
        let dir = TempDir::new().unwrap();
        let content = format!("serial_number,title,company\n{rows}");
        let source = write_source(&dir, "guitars.csv", &content);
        let journals: Vec<Arc<Journal>> =
            (0..ENGINES).map(|_| Arc::new(Journal::default())).collect();
        let mut engines: Vec<_> = journals
            .iter()
            .map(|journal| engine(&dir, GuitarImporter::new(Arc::clone(journal)), &source))
            .collect();

        let barrier = Barrier::new(ENGINES);
        std::thread::scope(|scope| {
            for engine in &mut engines {
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    engine.run().unwrap();
                });
            }
        });

        let entered: Vec<usize> = journals
            .iter()
            .map(|journal| journal.routes().len())
            .filter(|&routed| routed > 0)
            .collect();
        assert_eq!(entered, [20], "round {round}: rows routed per engine {entered:?}");
        assert!(engines[0].is_finished().unwrap());
    }
}
