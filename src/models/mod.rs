//! Data models for the import engine.
//!
//! This module contains the core data structures shared by the rule
//! resolver, the progress store and the engine itself.

mod definition;
mod identifier;
mod progress;
mod report;
pub mod row;

pub use definition::{DefinitionOverrides, FieldRule, ImportDefinition};
pub use identifier::{ImportIdentifier, SlotKeys};
pub use progress::{ProgressData, ProgressMeta, ProgressPayload, ProgressPhase, ProgressSnapshot};
pub use report::{
    DUPLICATED_HEADERS_CATEGORY, HEADERS_ERROR_CATEGORY, REQUIRED_FIELDS_CATEGORY,
    ValidationReport,
};
pub use row::{HeaderSet, Row};
