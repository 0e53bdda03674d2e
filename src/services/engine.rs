//! The import state machine.
//!
//! ```text
//! Idle -> Locked(Initializing) -> Locked(Processing) -> Locked(Finalizing)
//!      -> Finished -> Idle (after finish())
//! ```
//!
//! Cancellation is a value, not an error: every phase returns
//! `ControlFlow<Canceled>` and stops at the first checkpoint that observes
//! the cancel flag. Errors always clear the progress slots and release the
//! lock before they reach the caller.

use indexmap::IndexMap;
use serde_json::Value;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::instrument;

use super::context::extract_defined_fields;
use super::{ImportContext, ImportMutex, ImportServices, Importer, ProgressStore};
use crate::config::ImporterConfig;
use crate::filters::FilterRegistry;
use crate::io::{CsvDialect, CsvRecordReader, SinkSet, Transcoder};
use crate::models::row::{is_blank, render_cell};
use crate::models::{
    HeaderSet, ImportDefinition, ImportIdentifier, ProgressPayload, ProgressPhase, Row,
    ValidationReport,
};
use crate::rules::{DateCaster, RuleResolver};
use crate::{Error, Result};

/// Marker returned by a checkpoint that observed a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canceled;

/// Result of [`ImportEngine::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No source file is attached; nothing was done.
    MissingSource,
    /// The current progress, after a completed run or while another run is active.
    Progress(ProgressPayload),
    /// The run stopped at a checkpoint because it was canceled.
    Canceled(ProgressPayload),
}

impl RunOutcome {
    /// The payload, if any.
    #[must_use]
    pub const fn payload(&self) -> Option<&ProgressPayload> {
        match self {
            Self::MissingSource => None,
            Self::Progress(payload) | Self::Canceled(payload) => Some(payload),
        }
    }

    /// Returns true if the run was canceled.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }
}

/// Per-run bookkeeping.
struct RunClock {
    started: Instant,
    overrun_reported: bool,
}

/// Drives one importer through lock, initialize, process and final stage.
pub struct ImportEngine<I: Importer> {
    importer: I,
    definition: ImportDefinition,
    registry: FilterRegistry,
    config: ImporterConfig,
    services: ImportServices,
    identifier: ImportIdentifier,
    progress: ProgressStore,
    mutex: ImportMutex,
    dialect: CsvDialect,
    transcoder: Transcoder,
    date_format: Option<String>,
    reader: Option<CsvRecordReader>,
}

impl<I: Importer> ImportEngine<I> {
    /// Creates an engine with injected collaborators.
    ///
    /// Definition overrides (date format, delimiter, encodings) take
    /// precedence over `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid dialect or encoding.
    pub fn new(importer: I, config: ImporterConfig, services: ImportServices) -> Result<Self> {
        let definition = importer.definition();
        let overrides = &definition.config;

        let mut dialect = CsvDialect::from_config(&config)?;
        if let Some(delimiter) = overrides.delimiter {
            dialect = dialect.with_delimiter(delimiter)?;
        }
        let transcoder = Transcoder::new(
            overrides
                .input_encoding
                .as_deref()
                .unwrap_or(&config.input_encoding),
            overrides
                .output_encoding
                .as_deref()
                .unwrap_or(&config.output_encoding),
        )?
        .with_artifacts(config.artifacts.clone());
        let date_format = overrides
            .csv_date_format
            .clone()
            .or_else(|| config.csv_date_format.clone());

        let identifier = config
            .mutex_lock_key
            .clone()
            .map_or_else(|| importer.identifier(), ImportIdentifier::new);

        let mut registry = FilterRegistry::new();
        importer.register_filters(&mut registry);

        let progress = ProgressStore::new(services.cache(), &identifier, config.lock_ttl());
        let mutex = ImportMutex::new(
            services.locks(),
            &identifier,
            progress.clone(),
            config.lock_ttl(),
        );

        let driver = services.cache().driver();
        tracing::debug!(
            identifier = %identifier,
            driver = driver.as_str(),
            "Import engine created"
        );

        Ok(Self {
            importer,
            definition,
            registry,
            config,
            services,
            identifier,
            progress,
            mutex,
            dialect,
            transcoder,
            date_format,
            reader: None,
        })
    }

    /// Creates an engine with the backends selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unsupported cache driver or an
    /// invalid dialect or encoding.
    pub fn from_config(importer: I, config: ImporterConfig) -> Result<Self> {
        let services = ImportServices::from_config(&config)?;
        Self::new(importer, config, services)
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Attaches the source file and reads its header line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the file does not exist.
    pub fn attach_source(&mut self, path: impl Into<PathBuf>) -> Result<&mut Self> {
        let reader = CsvRecordReader::open(path, self.dialect, self.transcoder.clone())?;
        tracing::debug!(
            source = %reader.path().display(),
            columns = reader.headers().len(),
            "Source attached"
        );
        self.reader = Some(reader);
        Ok(self)
    }

    fn reopen(&mut self) -> Result<()> {
        if let Some(path) = self.reader.as_ref().map(|r| r.path().to_path_buf()) {
            self.attach_source(path)?;
        }
        Ok(())
    }

    /// Sets the delimiter, re-reading the headers if a source is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a non-ASCII delimiter.
    pub fn set_delimiter(&mut self, delimiter: char) -> Result<&mut Self> {
        self.dialect = self.dialect.with_delimiter(delimiter)?;
        self.reopen()?;
        Ok(self)
    }

    /// Sets the enclosure, re-reading the headers if a source is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a non-ASCII enclosure.
    pub fn set_enclosure(&mut self, enclosure: char) -> Result<&mut Self> {
        self.dialect = self.dialect.with_enclosure(enclosure)?;
        self.reopen()?;
        Ok(self)
    }

    /// Sets the escape character, re-reading the headers if a source is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for a non-ASCII escape character.
    pub fn set_escape(&mut self, escape: char) -> Result<&mut Self> {
        self.dialect = self.dialect.with_escape(escape)?;
        self.reopen()?;
        Ok(self)
    }

    /// Sets the record terminator of output sinks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for anything but `\n` and `\r\n`.
    pub fn set_newline(&mut self, newline: &str) -> Result<&mut Self> {
        self.dialect = self.dialect.with_newline(newline)?;
        self.reopen()?;
        Ok(self)
    }

    /// Sets the source encoding, re-reading the headers if a source is attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown encoding label.
    pub fn set_input_encoding(&mut self, label: &str) -> Result<&mut Self> {
        self.transcoder = self.transcoder.clone().with_input(label)?;
        self.reopen()?;
        Ok(self)
    }

    /// Sets the output encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown encoding label.
    pub fn set_output_encoding(&mut self, label: &str) -> Result<&mut Self> {
        self.transcoder = self.transcoder.clone().with_output(label)?;
        self.reopen()?;
        Ok(self)
    }

    /// Sets the date format of the `date` / `datetime` casts.
    pub fn set_date_format(&mut self, format: impl Into<String>) -> &mut Self {
        self.date_format = Some(format.into());
        self
    }

    /// Appends `suffix` to the identifier and re-derives every slot key and the lock.
    pub fn concat_identifier(&mut self, suffix: &str) -> &mut Self {
        self.identifier = self.identifier.concat(suffix);
        let ttl = self.config.lock_ttl();
        self.progress = ProgressStore::new(self.services.cache(), &self.identifier, ttl);
        self.mutex = ImportMutex::new(
            self.services.locks(),
            &self.identifier,
            self.progress.clone(),
            ttl,
        );
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// The current identifier.
    #[must_use]
    pub const fn identifier(&self) -> &ImportIdentifier {
        &self.identifier
    }

    /// The importer.
    #[must_use]
    pub const fn importer(&self) -> &I {
        &self.importer
    }

    /// The importer definition.
    #[must_use]
    pub const fn definition(&self) -> &ImportDefinition {
        &self.definition
    }

    /// The base configuration.
    #[must_use]
    pub const fn config(&self) -> &ImporterConfig {
        &self.config
    }

    /// The attached source, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.reader.as_ref().map(CsvRecordReader::path)
    }

    /// Headers of the attached source (empty without a source).
    #[must_use]
    pub fn headers(&self) -> HeaderSet {
        self.reader
            .as_ref()
            .map(|r| r.headers().clone())
            .unwrap_or_default()
    }

    /// This importer's filter table.
    #[must_use]
    pub const fn registry(&self) -> &FilterRegistry {
        &self.registry
    }

    /// Mutable access to this importer's filter table.
    pub fn registry_mut(&mut self) -> &mut FilterRegistry {
        &mut self.registry
    }

    /// The progress slots of the current identifier.
    #[must_use]
    pub const fn progress_store(&self) -> &ProgressStore {
        &self.progress
    }

    // ------------------------------------------------------------------
    // Public lifecycle
    // ------------------------------------------------------------------

    /// Runs the import unless it is already running or finished.
    ///
    /// Returns immediately with the current progress if another run holds the
    /// lock or the import finished and awaits [`ImportEngine::finish`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for header problems,
    /// [`Error::RuleResolution`] for unknown rules, and any error raised by a
    /// hook or a backend. The lock is released and the session cleared first.
    #[instrument(skip(self), fields(identifier = %self.identifier))]
    pub fn run(&mut self) -> Result<RunOutcome> {
        let Some(reader) = self.reader.clone() else {
            tracing::warn!("Run requested without a source file");
            return Ok(RunOutcome::MissingSource);
        };

        if self.mutex.is_locked()? || self.progress.is_finished()? {
            tracing::debug!("Import already running or finished");
            return self.progress().map(RunOutcome::Progress);
        }
        if !self.mutex.lock()? {
            tracing::debug!("Lost the race for the import lock");
            return self.progress().map(RunOutcome::Progress);
        }
        // A run that finished between the checks above and `lock()` leaves the
        // finished flag set before it releases.
        if self.progress.is_finished()? {
            self.mutex.release()?;
            tracing::debug!("Import finished while the lock was requested");
            return self.progress().map(RunOutcome::Progress);
        }

        tracing::info!(source = %reader.path().display(), "Import started");
        let mut clock = RunClock {
            started: Instant::now(),
            overrun_reported: false,
        };
        let result = self.execute(&reader, &mut clock);
        #[allow(clippy::cast_precision_loss)]
        let elapsed_ms = clock.started.elapsed().as_millis() as f64;
        metrics::histogram!("csv_import_duration_ms").record(elapsed_ms);

        match result {
            Ok(ControlFlow::Continue(())) => {
                self.progress.mark_finished()?;
                self.mutex.release()?;
                metrics::counter!("csv_import_runs_total", "outcome" => "finished").increment(1);
                tracing::info!(elapsed_ms, "Import finished");
                self.progress().map(RunOutcome::Progress)
            },
            Ok(ControlFlow::Break(Canceled)) => {
                metrics::counter!("csv_import_runs_total", "outcome" => "canceled").increment(1);
                tracing::info!(elapsed_ms, "Import canceled");
                Ok(RunOutcome::Canceled(ProgressPayload::canceled(
                    &self.config.messages,
                )))
            },
            Err(e) => {
                if let Err(unlock_err) = self.mutex.unlock() {
                    tracing::warn!(error = %unlock_err, "Failed to unlock after error");
                }
                metrics::counter!("csv_import_runs_total", "outcome" => "failed").increment(1);
                tracing::warn!(error = %e, "Import failed");
                Err(e)
            },
        }
    }

    /// Current progress for polling clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache or the lock backend fails.
    pub fn progress(&self) -> Result<ProgressPayload> {
        let snapshot = self.progress.snapshot()?;
        let locked = self.mutex.is_locked()?;
        let phase = ProgressPhase::select(&snapshot, locked);
        let details = if phase == ProgressPhase::Running {
            self.importer
                .progress_details()
                .or_else(|| snapshot.details.clone())
        } else {
            None
        };
        Ok(ProgressPayload::for_phase(
            phase,
            &snapshot,
            &self.config.messages,
            details,
        ))
    }

    /// Requests cancellation; the running import stops at its next checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn cancel(&self) -> Result<()> {
        tracing::info!(identifier = %self.identifier, "Cancel requested");
        self.progress.cancel()
    }

    /// Returns true if the finished flag is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be read.
    pub fn is_finished(&self) -> Result<bool> {
        self.progress.is_finished()
    }

    /// Collects the terminal payload and clears the session.
    ///
    /// Before the import finished this is the same as
    /// [`ImportEngine::progress`]; after the session was cleared it reports
    /// "not running".
    ///
    /// # Errors
    ///
    /// Returns an error if the cache or the lock backend fails.
    pub fn finish(&self) -> Result<ProgressPayload> {
        if !self.progress.is_finished()? {
            return self.progress();
        }
        let snapshot = self.progress.snapshot()?;
        let payload = ProgressPayload::terminal(&snapshot, &self.config.messages);
        self.mutex.unlock()?;
        tracing::info!(identifier = %self.identifier, "Import session closed");
        Ok(payload)
    }

    /// Deletes every progress slot of the current identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn clear_session(&self) -> Result<()> {
        self.progress.clear()
    }

    // ------------------------------------------------------------------
    // Source helpers (no locking)
    // ------------------------------------------------------------------

    /// Calls `callback` with every decoded and cast row.
    ///
    /// Returns `false` without a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read or a rule is unknown.
    pub fn each<F>(&self, mut callback: F) -> Result<bool>
    where
        F: FnMut(Row),
    {
        let Some(reader) = &self.reader else {
            return Ok(false);
        };
        let resolver = self.compile_rules()?;
        for row in reader.rows()? {
            callback(resolver.cast_row(self.transcoder.normalize_row(row?)));
        }
        Ok(true)
    }

    /// Distinct non-blank values of `field`, in first-seen order.
    ///
    /// Returns `None` without a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub fn distinct(&self, field: &str) -> Result<Option<Vec<Value>>> {
        let mut seen: IndexMap<String, Value> = IndexMap::new();
        let attached = self.each(|row| {
            if let Some(value) = row.get(field).filter(|v| !is_blank(v)) {
                seen.entry(render_cell(value))
                    .or_insert_with(|| value.clone());
            }
        })?;
        Ok(attached.then(|| seen.into_values().collect()))
    }

    /// Number of data rows (the header line excluded).
    ///
    /// Returns `None` without a source.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub fn count_csv(&self) -> Result<Option<u64>> {
        self.reader.as_ref().map(CsvRecordReader::count).transpose()
    }

    /// Projects a row onto the source headers; missing cells become empty.
    #[must_use]
    pub fn to_csv_data(&self, row: &Row) -> Row {
        self.headers().project(row)
    }

    /// Keeps only the columns declared in the mappings.
    #[must_use]
    pub fn extract_defined_fields(&self, row: &Row) -> Row {
        extract_defined_fields(&self.definition, row)
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    fn compile_rules(&self) -> Result<RuleResolver> {
        RuleResolver::compile(
            &self.definition,
            &self.registry,
            self.services.validator(),
            DateCaster::new(self.date_format.as_deref()),
        )
    }

    fn execute(
        &mut self,
        reader: &CsvRecordReader,
        clock: &mut RunClock,
    ) -> Result<ControlFlow<Canceled>> {
        let (resolver, mut sinks) = match self.initialize(reader, clock)? {
            ControlFlow::Continue(prepared) => prepared,
            ControlFlow::Break(canceled) => return Ok(ControlFlow::Break(canceled)),
        };
        if let ControlFlow::Break(canceled) = self.process(reader, &resolver, &mut sinks, clock)? {
            return Ok(ControlFlow::Break(canceled));
        }
        self.final_stage(reader.headers(), &mut sinks, clock)
    }

    /// Evaluates the cancel flag; on cancel runs `on_cancel` and unlocks.
    fn checkpoint(&mut self, clock: &mut RunClock) -> Result<ControlFlow<Canceled>> {
        if !clock.overrun_reported && clock.started.elapsed() > self.mutex.ttl() {
            clock.overrun_reported = true;
            tracing::warn!(
                ttl_secs = self.mutex.ttl().as_secs(),
                "Import outlived the lock TTL; another run may acquire the lock"
            );
        }
        if !self.progress.is_canceled()? {
            return Ok(ControlFlow::Continue(()));
        }
        tracing::debug!("Cancel flag observed at checkpoint");
        self.importer.on_cancel();
        self.mutex.unlock()?;
        Ok(ControlFlow::Break(Canceled))
    }

    #[instrument(skip_all)]
    fn initialize(
        &mut self,
        reader: &CsvRecordReader,
        clock: &mut RunClock,
    ) -> Result<ControlFlow<Canceled, (RuleResolver, SinkSet)>> {
        if self.checkpoint(clock)?.is_break() {
            return Ok(ControlFlow::Break(Canceled));
        }

        let resolver = self.compile_rules()?;
        let headers = reader.headers();
        let mut sinks = SinkSet::open(
            &self.definition.csv_files,
            self.services.blobs(),
            &self.dialect,
            &self.transcoder,
            headers,
        )?;
        self.progress.set_paths(sinks.paths())?;

        let mut report = ValidationReport::new();
        resolver.validate_headers(headers, &mut report);
        RuleResolver::check_duplicates(headers, &mut report);
        if !report.is_empty() {
            tracing::debug!(errors = report.quantity(), "Header validation failed");
            return Err(Error::Validation(report));
        }

        if self.checkpoint(clock)?.is_break() {
            return Ok(ControlFlow::Break(Canceled));
        }

        {
            let mut ctx =
                ImportContext::new(&mut sinks, &self.progress, headers, &self.definition);
            self.importer.before(&mut ctx)?;
        }

        let quantity = reader.count()?;
        self.progress.init(&self.config.messages.progress, quantity)?;
        tracing::info!(quantity, "Import initialized");

        if self.checkpoint(clock)?.is_break() {
            return Ok(ControlFlow::Break(Canceled));
        }
        Ok(ControlFlow::Continue((resolver, sinks)))
    }

    #[instrument(skip_all)]
    fn process(
        &mut self,
        reader: &CsvRecordReader,
        resolver: &RuleResolver,
        sinks: &mut SinkSet,
        clock: &mut RunClock,
    ) -> Result<ControlFlow<Canceled>> {
        for row in reader.rows()? {
            if self.checkpoint(clock)?.is_break() {
                return Ok(ControlFlow::Break(Canceled));
            }
            let row = resolver.cast_row(self.transcoder.normalize_row(row?));
            let valid = resolver.validate_row(&row)?;

            let mut ctx =
                ImportContext::new(sinks, &self.progress, reader.headers(), &self.definition);
            if valid {
                self.importer.handle(row, &mut ctx)?;
                metrics::counter!("csv_import_rows_total", "route" => "valid").increment(1);
            } else {
                self.importer.invalid(row, &mut ctx)?;
                metrics::counter!("csv_import_rows_total", "route" => "invalid").increment(1);
            }
            let processed = self.progress.increment()?;
            tracing::trace!(processed, valid, "Row routed");
        }
        Ok(ControlFlow::Continue(()))
    }

    #[instrument(skip_all)]
    fn final_stage(
        &mut self,
        headers: &HeaderSet,
        sinks: &mut SinkSet,
        clock: &mut RunClock,
    ) -> Result<ControlFlow<Canceled>> {
        if self.checkpoint(clock)?.is_break() {
            return Ok(ControlFlow::Break(Canceled));
        }
        let mut ctx = ImportContext::new(sinks, &self.progress, headers, &self.definition);
        self.importer.after(&mut ctx)?;
        Ok(ControlFlow::Continue(()))
    }
}

impl<I: Importer> std::fmt::Debug for ImportEngine<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportEngine")
            .field("identifier", &self.identifier)
            .field("source", &self.source())
            .field("registry", &self.registry)
            .field("services", &self.services)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldRule;
    use crate::services::RoutingImporter;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> ImportEngine<RoutingImporter> {
        let definition = ImportDefinition::new()
            .field(
                "serial_number",
                FieldRule::new().required().validate("numeric").cast("int"),
            )
            .csv_file("valid", "valid.csv")
            .csv_file("invalid", "invalid.csv");
        let config = ImporterConfig::default()
            .with_cache_path(dir.path().join("cache"))
            .with_storage_root(dir.path().join("out"));
        ImportEngine::from_config(RoutingImporter::new(definition, "valid", "invalid"), config)
            .unwrap()
    }

    fn write_source(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("source.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_run_without_source() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        assert_eq!(engine.run().unwrap(), RunOutcome::MissingSource);
        assert!(!engine.each(|_| {}).unwrap());
        assert_eq!(engine.count_csv().unwrap(), None);
    }

    #[test]
    fn test_source_helpers() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        let source = write_source(&dir, "serial_number,company\n1,ESP\n2,ESP\n3,\n4,Ibanez\n");
        engine.attach_source(&source).unwrap();

        assert_eq!(engine.count_csv().unwrap(), Some(4));
        assert_eq!(
            engine.distinct("company").unwrap(),
            Some(vec![json!("ESP"), json!("Ibanez")])
        );

        let mut serials = Vec::new();
        engine
            .each(|row| serials.push(row["serial_number"].clone()))
            .unwrap();
        assert_eq!(serials, vec![json!(1), json!(2), json!(3), json!(4)]);

        let mut row = Row::new();
        row.insert("company".to_string(), json!("ESP"));
        row.insert("unknown".to_string(), json!("x"));
        let projected = engine.to_csv_data(&row);
        assert_eq!(projected.keys().collect::<Vec<_>>(), ["serial_number", "company"]);
        assert_eq!(projected["serial_number"], json!(""));
        assert!(engine.extract_defined_fields(&row).is_empty());
    }

    #[test]
    fn test_concat_identifier_rekeys_everything() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        engine.cancel().unwrap();
        engine.concat_identifier("_42");

        assert_eq!(engine.identifier().as_str(), "RoutingImporter_42");
        assert_eq!(engine.progress_store().keys().cancel, "RoutingImporter_42_cancel");
        assert!(!engine.progress_store().is_canceled().unwrap());
    }

    #[test]
    fn test_delimiter_change_rereads_headers() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine(&dir);
        let source = write_source(&dir, "serial_number;company\n1;ESP\n");
        engine.attach_source(&source).unwrap();
        assert_eq!(engine.headers().names(), ["serial_number;company"]);

        engine.set_delimiter(';').unwrap();
        assert_eq!(engine.headers().names(), ["serial_number", "company"]);
    }
}
