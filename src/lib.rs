//! # csv-importer
//!
//! A configurable, resumable CSV batch-import engine.
//!
//! Rows are streamed from a CSV source, cast and validated through declarative
//! per-field rules, and routed to user hooks (`handle` / `invalid`) which in
//! turn append to named output sinks. Progress lives in a shared cache so that
//! other processes can poll, cancel, and finish an import, and a named lock
//! guarantees that a single logical import never runs twice concurrently.
//!
//! ## Features
//!
//! - Mutual exclusion per import identifier over file, memcached or Redis locks
//! - Progress state machine persisted in the cache (poll / cancel / finish)
//! - Filter registry for required-header, validation and cast filters
//! - Primitive casts and a tolerant date caster with a sentinel fallback
//! - Input/output character set conversion
//!
//! ## Example
//!
//! ```rust,ignore
//! use csv_importer::{ImportEngine, ImporterConfig, RoutingImporter};
//!
//! let config = ImporterConfig::load_default();
//! let importer = RoutingImporter::new(definition, "valid_entities", "invalid_entities");
//! let mut engine = ImportEngine::from_config(importer, config)?;
//! engine.attach_source("guitars.csv")?;
//! let outcome = engine.run()?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod filters;
pub mod io;
pub mod models;
pub mod observability;
pub mod rules;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{CacheDriver, CacheSettings, ImporterConfig, ProgressMessages};
pub use filters::{
    CastFilter, FilterKind, FilterRegistry, HeadersFilter, Nameable, ValidationFilter,
};
pub use models::{
    FieldRule, ImportDefinition, ImportIdentifier, ProgressPayload, ProgressSnapshot, Row,
    ValidationReport,
};
pub use services::{
    ImportContext, ImportEngine, ImportServices, Importer, RoutingImporter, RunOutcome,
};

/// Error type for import operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed arguments, bad dialect characters, missing source file |
/// | `OperationFailed` | I/O errors, cache or lock backend failures, CSV parse failures |
/// | `Configuration` | Unsupported cache driver, unknown encoding, unreadable config |
/// | `Validation` | Accumulated header / required-field / duplicate-header errors |
/// | `SinkNotFound` | Writing to an output sink that was never declared |
/// | `RuleResolution` | A declarative validation rule that no validator recognises |
/// | `FeatureNotEnabled` | Selecting a backend that was compiled out |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur (source, sinks, file cache)
    /// - The CSV reader or writer fails
    /// - A Redis or memcached command fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// Fatal configuration problem, raised at construction time.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Header validation failed for the current run.
    ///
    /// The report accumulates every problem found before raising, and the
    /// mutex is always released before this error reaches the caller.
    #[error("{0}")]
    Validation(models::ValidationReport),

    /// A row was written to an output sink that does not exist.
    #[error("output sink '{0}' is not registered")]
    SinkNotFound(String),

    /// A validation rule could not be resolved by the declarative validator.
    #[error("unknown validation rule '{rule}' for field '{field}'")]
    RuleResolution {
        /// Field the rule was declared on.
        field: String,
        /// The unrecognised rule.
        rule: String,
    },

    /// Feature not enabled (requires feature flag).
    #[error("feature not enabled: {0} (compile with --features {0})")]
    FeatureNotEnabled(String),
}

impl Error {
    /// Shorthand for [`Error::OperationFailed`].
    pub fn operation(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
///
/// # Examples
///
/// ```rust
/// use csv_importer::current_timestamp;
///
/// let ts = current_timestamp();
/// assert!(ts > 0);
/// ```
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::operation("read_csv", "unexpected eof");
        assert_eq!(err.to_string(), "operation 'read_csv' failed: unexpected eof");

        let err = Error::SinkNotFound("valid_entities".to_string());
        assert_eq!(
            err.to_string(),
            "output sink 'valid_entities' is not registered"
        );

        let err = Error::RuleResolution {
            field: "title".to_string(),
            rule: "bad_word_validation".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unknown validation rule 'bad_word_validation' for field 'title'"
        );
    }

    #[test]
    fn test_validation_error_displays_report_json() {
        let mut report = ValidationReport::new();
        report.push("Required fields not found:", "The \"serial_number\" field is required");

        let err = Error::Validation(report);
        assert_eq!(
            err.to_string(),
            r#"{"quantity":1,"Required fields not found:":["The \"serial_number\" field is required"]}"#
        );
    }
}
