//! Character set conversion for source and output data.

use encoding_rs::{Encoding, UTF_8};
use serde_json::Value;
use std::borrow::Cow;

use crate::models::Row;
use crate::{Error, Result};

/// Converts source bytes to text and text to output bytes.
///
/// Rows are always held as UTF-8 in memory. When the input and output
/// encodings differ, string values are additionally narrowed to what the
/// output encoding can represent, so that what a hook sees is what gets
/// written.
#[derive(Debug, Clone)]
pub struct Transcoder {
    input: &'static Encoding,
    output: &'static Encoding,
    artifacts: Vec<String>,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            input: UTF_8,
            output: UTF_8,
            artifacts: Vec::new(),
        }
    }
}

impl Transcoder {
    /// Creates a transcoder from two WHATWG encoding labels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown label.
    pub fn new(input: &str, output: &str) -> Result<Self> {
        Ok(Self {
            input: lookup(input)?,
            output: lookup(output)?,
            artifacts: Vec::new(),
        })
    }

    /// Sets the substrings replaced by a space before values are trimmed.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = artifacts.into_iter().filter(|a| !a.is_empty()).collect();
        self
    }

    /// Returns a copy reading another input encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown label.
    pub fn with_input(self, label: &str) -> Result<Self> {
        Ok(Self {
            input: lookup(label)?,
            ..self
        })
    }

    /// Returns a copy writing another output encoding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an unknown label.
    pub fn with_output(self, label: &str) -> Result<Self> {
        Ok(Self {
            output: lookup(label)?,
            ..self
        })
    }

    /// Name of the input encoding.
    #[must_use]
    pub fn input_name(&self) -> &'static str {
        self.input.name()
    }

    /// Name of the output encoding.
    #[must_use]
    pub fn output_name(&self) -> &'static str {
        self.output.name()
    }

    /// True when input and output encodings are the same.
    #[must_use]
    pub fn is_passthrough(&self) -> bool {
        self.input == self.output
    }

    /// Decodes source bytes; malformed sequences become U+FFFD.
    #[must_use]
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        self.input.decode_without_bom_handling(bytes).0
    }

    /// Encodes text for an output sink.
    #[must_use]
    pub fn encode<'a>(&self, text: &'a str) -> Cow<'a, [u8]> {
        self.output.encode(text).0
    }

    /// Converts the string cells of a decoded row for processing.
    ///
    /// Numeric-looking strings are left untouched. Other strings are
    /// narrowed to the output encoding when it differs from the input, then
    /// stripped of artifacts and trimmed.
    #[must_use]
    pub fn normalize_row(&self, mut row: Row) -> Row {
        for value in row.values_mut() {
            if let Value::String(text) = value {
                if !looks_numeric(text) {
                    *text = self.normalize_text(text);
                }
            }
        }
        row
    }

    fn normalize_text(&self, text: &str) -> String {
        let narrowed = if self.is_passthrough() {
            Cow::Borrowed(text)
        } else {
            let bytes = self.encode(text);
            Cow::Owned(self.output.decode_without_bom_handling(&bytes).0.into_owned())
        };
        let mut cleaned = narrowed.into_owned();
        for artifact in &self.artifacts {
            cleaned = cleaned.replace(artifact.as_str(), " ");
        }
        cleaned.trim().to_string()
    }
}

fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Configuration(format!("unknown character encoding '{label}'")))
}

/// Numeric strings in the loose sense: optional sign, digits, fraction, exponent.
fn looks_numeric(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.bytes().any(|b| b.is_ascii_digit())
        && trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}
