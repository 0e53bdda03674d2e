//! CSV output sinks.

use indexmap::IndexMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::{BlobStore, CsvDialect, Transcoder};
use crate::models::row::render_cell;
use crate::models::{HeaderSet, Row};
use crate::{Error, Result};

/// Appends rows to one output file in header order.
pub struct CsvRecordWriter {
    writer: csv::Writer<File>,
    columns: Vec<String>,
    transcoder: Transcoder,
}

impl CsvRecordWriter {
    /// Wraps a freshly created file and writes the header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the header row cannot be written.
    pub fn create(
        file: File,
        dialect: &CsvDialect,
        transcoder: Transcoder,
        headers: &HeaderSet,
    ) -> Result<Self> {
        let mut writer = Self {
            writer: dialect.writer_builder().from_writer(file),
            columns: headers.names().to_vec(),
            transcoder,
        };
        let header_row: Vec<String> = writer.columns.clone();
        writer.write_fields(header_row.iter().map(String::as_str))?;
        Ok(writer)
    }

    /// Appends a row and flushes it to disk.
    ///
    /// Cells are written in header order; missing cells are empty and
    /// cells not in the header are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn append(&mut self, row: &Row) -> Result<()> {
        let cells: Vec<String> = self
            .columns
            .iter()
            .map(|column| row.get(column).map(render_cell).unwrap_or_default())
            .collect();
        self.write_fields(cells.iter().map(String::as_str))
    }

    fn write_fields<'a>(&mut self, fields: impl Iterator<Item = &'a str>) -> Result<()> {
        let encoded: Vec<Vec<u8>> = fields
            .map(|field| self.transcoder.encode(field).into_owned())
            .collect();
        self.writer
            .write_record(&encoded)
            .map_err(|e| Error::operation("write_csv", e))?;
        self.writer
            .flush()
            .map_err(|e| Error::operation("flush_csv", e))
    }
}

impl std::fmt::Debug for CsvRecordWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvRecordWriter")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// The output writers of one run, by logical sink name.
#[derive(Debug, Default)]
pub struct SinkSet {
    writers: IndexMap<String, CsvRecordWriter>,
    paths: IndexMap<String, String>,
}

impl SinkSet {
    /// Creates one writer per declared sink.
    ///
    /// Existing destination files are never overwritten: the path is
    /// uniquified first.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be created or written.
    pub fn open(
        files: &IndexMap<String, PathBuf>,
        blobs: &dyn BlobStore,
        dialect: &CsvDialect,
        transcoder: &Transcoder,
        headers: &HeaderSet,
    ) -> Result<Self> {
        let mut sinks = Self::default();
        for (name, path) in files {
            let path = blobs.uniquify(path);
            let file = blobs.create(&path)?;
            let writer = CsvRecordWriter::create(file, dialect, transcoder.clone(), headers)?;
            tracing::debug!(sink = %name, path = %path.display(), "Opened output sink");
            sinks.writers.insert(name.clone(), writer);
            sinks.paths.insert(name.clone(), display_path(&blobs.resolve(&path)));
        }
        Ok(sinks)
    }

    /// Appends a row to the named sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SinkNotFound`] for an undeclared sink name.
    pub fn append(&mut self, sink: &str, row: &Row) -> Result<()> {
        self.writers
            .get_mut(sink)
            .ok_or_else(|| Error::SinkNotFound(sink.to_string()))?
            .append(row)
    }

    /// Returns true if the sink exists.
    #[must_use]
    pub fn contains(&self, sink: &str) -> bool {
        self.writers.contains_key(sink)
    }

    /// Resolved sink paths keyed by sink name.
    #[must_use]
    pub const fn paths(&self) -> &IndexMap<String, String> {
        &self.paths
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::LocalBlobStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn headers() -> HeaderSet {
        HeaderSet::new(["serial_number", "title", "company"])
    }

    #[test]
    fn test_sink_writes_header_and_rows_in_order() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());
        let mut files = IndexMap::new();
        files.insert("valid".to_string(), PathBuf::from("valid.csv"));

        let mut sinks = SinkSet::open(
            &files,
            &blobs,
            &CsvDialect::default(),
            &Transcoder::default(),
            &headers(),
        )
        .unwrap();

        let mut row = Row::new();
        row.insert("company".to_string(), json!("ESP"));
        row.insert("serial_number".to_string(), json!(1));
        row.insert("title".to_string(), json!("guitar, one"));
        row.insert("extra".to_string(), json!("dropped"));
        sinks.append("valid", &row).unwrap();

        let written = std::fs::read_to_string(dir.path().join("valid.csv")).unwrap();
        assert_eq!(written, "serial_number,title,company\n1,\"guitar, one\",ESP\n");
        assert_eq!(
            sinks.paths()["valid"],
            dir.path().join("valid.csv").to_string_lossy()
        );
    }

    #[test]
    fn test_unknown_sink_is_an_error() {
        let dir = TempDir::new().unwrap();
        let blobs = LocalBlobStore::new(dir.path());
        let mut sinks = SinkSet::open(
            &IndexMap::new(),
            &blobs,
            &CsvDialect::default(),
            &Transcoder::default(),
            &headers(),
        )
        .unwrap();
        let err = sinks.append("missing", &Row::new()).unwrap_err();
        assert!(matches!(err, Error::SinkNotFound(ref name) if name == "missing"));
    }

    #[test]
    fn test_existing_destination_is_uniquified() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("valid.csv"), "keep me").unwrap();
        let blobs = LocalBlobStore::new(dir.path());
        let mut files = IndexMap::new();
        files.insert("valid".to_string(), PathBuf::from("valid.csv"));

        let sinks = SinkSet::open(
            &files,
            &blobs,
            &CsvDialect::default(),
            &Transcoder::default(),
            &headers(),
        )
        .unwrap();

        assert_ne!(
            sinks.paths()["valid"],
            dir.path().join("valid.csv").to_string_lossy()
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("valid.csv")).unwrap(),
            "keep me"
        );
    }
}
