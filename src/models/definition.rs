//! Declarative import definitions.
//!
//! An [`ImportDefinition`] declares the per-column rules of one importer
//! type together with its output sinks. It can be built in code or read
//! from TOML:
//!
//! ```toml
//! [mappings.serial_number]
//! required = true
//! validation = ["numeric"]
//! cast = "string"
//!
//! [mappings.title]
//! cast = ["string", "lowercase"]
//!
//! [csv_files]
//! valid_entities = "valid_entities.csv"
//! invalid_entities = "invalid_entities.csv"
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Declarative rules for one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    /// The column must be present in the header row.
    #[serde(default)]
    pub required: bool,
    /// Validation rule references, evaluated against the cast value.
    #[serde(default, deserialize_with = "one_or_many")]
    pub validation: Vec<String>,
    /// Cast references, applied left to right.
    #[serde(default, deserialize_with = "one_or_many")]
    pub cast: Vec<String>,
}

impl FieldRule {
    /// Creates an empty rule (no requirement, no validation, no cast).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the column as required in the header row.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Appends a validation rule reference.
    #[must_use]
    pub fn validate(mut self, rule: impl Into<String>) -> Self {
        self.validation.push(rule.into());
        self
    }

    /// Appends a cast reference.
    #[must_use]
    pub fn cast(mut self, caster: impl Into<String>) -> Self {
        self.cast.push(caster.into());
        self
    }
}

/// Per-importer overrides of the base configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionOverrides {
    /// Date format used by the `date` / `datetime` casters.
    #[serde(default)]
    pub csv_date_format: Option<String>,
    /// Field delimiter.
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Encoding of the source file.
    #[serde(default)]
    pub input_encoding: Option<String>,
    /// Encoding of processed values and output sinks.
    #[serde(default)]
    pub output_encoding: Option<String>,
}

/// Mappings, output sinks and overrides of one importer type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDefinition {
    /// Rules keyed by lower-cased column name, in declaration order.
    #[serde(default)]
    pub mappings: IndexMap<String, FieldRule>,
    /// Output sink paths keyed by logical sink name.
    #[serde(default)]
    pub csv_files: IndexMap<String, PathBuf>,
    /// Overrides of the base configuration.
    #[serde(default)]
    pub config: DefinitionOverrides,
}

impl ImportDefinition {
    /// Creates an empty definition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares rules for a column.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.mappings.insert(name.into().to_lowercase(), rule);
        self
    }

    /// Declares an output sink.
    #[must_use]
    pub fn csv_file(mut self, sink: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.csv_files.insert(sink.into(), path.into());
        self
    }

    /// Sets the date format override.
    #[must_use]
    pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
        self.config.csv_date_format = Some(format.into());
        self
    }

    /// Returns the names of all columns marked as required.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.mappings
            .iter()
            .filter(|(_, rule)| rule.required)
            .map(|(name, _)| name.as_str())
    }

    /// Loads a definition from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_definition_file", e))?;
        Self::from_toml(&contents)
    }

    /// Parses a definition from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid definition.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut definition: Self = toml::from_str(contents)
            .map_err(|e| Error::Configuration(format!("invalid import definition: {e}")))?;
        definition.mappings = definition
            .mappings
            .into_iter()
            .map(|(name, rule)| (name.to_lowercase(), rule))
            .collect();
        Ok(definition)
    }
}

/// Accepts either a single string or a list of strings.
fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}
