//! CSV input/output.
//!
//! # Architecture
//!
//! - [`CsvDialect`] turns the configured delimiter / enclosure / escape /
//!   newline into `csv` reader and writer builders
//! - [`Transcoder`] converts between the source encoding, UTF-8 and the
//!   output encoding
//! - [`CsvRecordReader`] reads the header line and streams [`Row`]s lazily
//! - [`CsvRecordWriter`] appends rows to one output file, [`SinkSet`] owns
//!   the writers of a run by logical sink name
//! - [`BlobStore`] resolves, creates and uniquifies output paths
//!
//! [`Row`]: crate::models::Row

mod blob;
mod dialect;
mod encoding;
mod reader;
mod writer;

pub use blob::{BlobStore, LocalBlobStore};
pub use dialect::CsvDialect;
pub use encoding::Transcoder;
pub use reader::{CsvRecordReader, RowStream};
pub use writer::{CsvRecordWriter, SinkSet};
