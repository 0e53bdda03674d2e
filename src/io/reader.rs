//! Streaming CSV reader.

use serde_json::Value;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::{CsvDialect, Transcoder};
use crate::models::{HeaderSet, Row};
use crate::{Error, Result};

/// Reads a CSV source: headers once, rows lazily.
///
/// Every call to [`CsvRecordReader::stream_from`] or
/// [`CsvRecordReader::count`] opens the file again, so the source is never
/// held in memory.
#[derive(Debug, Clone)]
pub struct CsvRecordReader {
    path: PathBuf,
    dialect: CsvDialect,
    transcoder: Transcoder,
    headers: HeaderSet,
}

impl CsvRecordReader {
    /// Opens a source and reads its header line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the file does not exist, or an
    /// operation error if the header line cannot be read.
    pub fn open(path: impl Into<PathBuf>, dialect: CsvDialect, transcoder: Transcoder) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::InvalidInput(format!(
                "CSV source '{}' does not exist",
                path.display()
            )));
        }
        let mut reader = Self {
            path,
            dialect,
            transcoder,
            headers: HeaderSet::default(),
        };
        reader.headers = reader.read_headers()?;
        Ok(reader)
    }

    fn csv_reader(&self) -> Result<csv::Reader<File>> {
        let file = File::open(&self.path).map_err(|e| Error::operation("open_csv", e))?;
        Ok(self.dialect.reader_builder().from_reader(file))
    }

    fn read_headers(&self) -> Result<HeaderSet> {
        let mut reader = self.csv_reader()?;
        let mut record = csv::ByteRecord::new();
        let found = reader
            .read_byte_record(&mut record)
            .map_err(|e| Error::operation("read_csv_headers", e))?;
        if !found {
            return Ok(HeaderSet::default());
        }
        Ok(HeaderSet::new(
            record.iter().map(|field| self.transcoder.decode(field)),
        ))
    }

    /// Path of the source file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sanitized header line.
    #[must_use]
    pub const fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Streams rows starting at record `offset` (1 skips the header line).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn stream_from(&self, offset: usize) -> Result<RowStream> {
        Ok(RowStream {
            reader: self.csv_reader()?,
            keys: self.headers.names().to_vec(),
            transcoder: self.transcoder.clone(),
            skip: offset,
            record: csv::ByteRecord::new(),
        })
    }

    /// Streams the data rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn rows(&self) -> Result<RowStream> {
        self.stream_from(1)
    }

    /// Counts data rows with a full scan, excluding the header line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn count(&self) -> Result<u64> {
        let mut reader = self.csv_reader()?;
        let mut record = csv::ByteRecord::new();
        let mut total = 0_u64;
        while reader
            .read_byte_record(&mut record)
            .map_err(|e| Error::operation("count_csv", e))?
        {
            total += 1;
        }
        Ok(total.saturating_sub(1))
    }
}

/// Lazy, finite sequence of rows keyed by header name.
///
/// Short records are padded with `null`, extra cells are dropped.
pub struct RowStream {
    reader: csv::Reader<File>,
    keys: Vec<String>,
    transcoder: Transcoder,
    skip: usize,
    record: csv::ByteRecord,
}

impl RowStream {
    fn next_record(&mut self) -> Result<bool> {
        self.reader
            .read_byte_record(&mut self.record)
            .map_err(|e| Error::operation("read_csv", e))
    }

    fn to_row(&self) -> Row {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let value = self.record.get(i).map_or(Value::Null, |field| {
                    Value::String(self.transcoder.decode(field).into_owned())
                });
                (key.clone(), value)
            })
            .collect()
    }
}

impl Iterator for RowStream {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.skip > 0 {
            self.skip -= 1;
            match self.next_record() {
                Ok(true) => {},
                Ok(false) => return None,
                Err(e) => return Some(Err(e)),
            }
        }
        match self.next_record() {
            Ok(true) => Some(Ok(self.to_row())),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream").field("keys", &self.keys).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    fn open(file: &NamedTempFile) -> CsvRecordReader {
        CsvRecordReader::open(file.path(), CsvDialect::default(), Transcoder::default()).unwrap()
    }

    #[test]
    fn test_headers_are_sanitized() {
        let file = source(b"\xEF\xBB\xBFSerial_Number,Title ,COMPANY\n1,Guitar One,ESP\n");
        let reader = open(&file);
        assert_eq!(reader.headers().names(), ["serial_number", "title", "company"]);
    }

    #[test]
    fn test_rows_pad_short_records() {
        let file = source(b"serial_number,title,company\n1,\"Guitar, One\",ESP\n2,Guitar Two\n");
        let reader = open(&file);
        let rows: Vec<Row> = reader.rows().unwrap().collect::<Result<_>>().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["title"], json!("Guitar, One"));
        assert_eq!(rows[1]["company"], Value::Null);
        assert_eq!(reader.count().unwrap(), 2);
    }

    #[test]
    fn test_stream_from_offset() {
        let file = source(b"a\n1\n2\n3\n");
        let reader = open(&file);
        let rows: Vec<Row> = reader.stream_from(2).unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["a"], json!("2"));
    }

    #[test]
    fn test_semicolon_dialect() {
        let file = source(b"a;b\n1;2\n");
        let dialect = CsvDialect::default().with_delimiter(';').unwrap();
        let reader = CsvRecordReader::open(file.path(), dialect, Transcoder::default()).unwrap();
        let row = reader.rows().unwrap().next().unwrap().unwrap();
        assert_eq!(row["b"], json!("2"));
    }

    #[test]
    fn test_missing_and_empty_sources() {
        assert!(matches!(
            CsvRecordReader::open("/nonexistent/source.csv", CsvDialect::default(), Transcoder::default()),
            Err(Error::InvalidInput(_))
        ));
        let empty = source(b"");
        let reader = open(&empty);
        assert!(reader.headers().is_empty());
        assert_eq!(reader.count().unwrap(), 0);
    }
}
