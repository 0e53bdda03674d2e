//! What importer hooks may touch during a run.

use serde_json::Value;

use super::ProgressStore;
use crate::Result;
use crate::io::SinkSet;
use crate::models::{HeaderSet, ImportDefinition, Row};

/// Handle given to [`Importer`](super::Importer) hooks.
///
/// Gives access to the output sinks of the run and to the progress slots.
pub struct ImportContext<'a> {
    sinks: &'a mut SinkSet,
    progress: &'a ProgressStore,
    headers: &'a HeaderSet,
    definition: &'a ImportDefinition,
}

impl<'a> ImportContext<'a> {
    pub(crate) fn new(
        sinks: &'a mut SinkSet,
        progress: &'a ProgressStore,
        headers: &'a HeaderSet,
        definition: &'a ImportDefinition,
    ) -> Self {
        Self {
            sinks,
            progress,
            headers,
            definition,
        }
    }

    /// Appends a row to a declared output sink.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SinkNotFound`] for an undeclared sink, or an
    /// operation error if the write fails.
    pub fn insert_to(&mut self, sink: &str, row: &Row) -> Result<()> {
        self.sinks.append(sink, row)
    }

    /// Header line of the source.
    #[must_use]
    pub const fn headers(&self) -> &HeaderSet {
        self.headers
    }

    /// Projects a row onto the source headers; missing cells become empty.
    #[must_use]
    pub fn to_csv_data(&self, row: &Row) -> Row {
        self.headers.project(row)
    }

    /// Keeps only the columns declared in the mappings.
    #[must_use]
    pub fn extract_defined_fields(&self, row: &Row) -> Row {
        extract_defined_fields(self.definition, row)
    }

    /// Replaces the progress message.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn set_progress_message(&self, message: &str) -> Result<()> {
        self.progress.set_message(message)
    }

    /// Sets the live details shown while rows are processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn set_progress_details(&self, details: &Value) -> Result<()> {
        self.progress.set_details(details)
    }

    /// Sets the details returned by `finish()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn set_final_details(&self, details: &Value) -> Result<()> {
        self.progress.set_final_details(details)
    }

    /// Restarts the progress bar with a new message and total.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn init_progress_bar(&self, message: &str, quantity: u64) -> Result<()> {
        self.progress.init(message, quantity)
    }

    /// Resets the processed counter to zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be written.
    pub fn drop_progress(&self) -> Result<()> {
        self.progress.drop_processed()
    }
}

impl std::fmt::Debug for ImportContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportContext")
            .field("sinks", &self.sinks)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

pub(crate) fn extract_defined_fields(definition: &ImportDefinition, row: &Row) -> Row {
    definition
        .mappings
        .keys()
        .filter_map(|field| row.get(field).map(|value| (field.clone(), value.clone())))
        .collect()
}
