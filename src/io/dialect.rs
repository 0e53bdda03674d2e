//! CSV dialect settings.

use crate::config::ImporterConfig;
use crate::{Error, Result};

/// Delimiter, enclosure, escape and record terminator of a CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    delimiter: u8,
    enclosure: u8,
    escape: u8,
    crlf: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            enclosure: b'"',
            escape: b'\\',
            crlf: false,
        }
    }
}

impl CsvDialect {
    /// Builds a dialect from single ASCII characters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a character is not a single ASCII
    /// byte or `newline` is neither `\n` nor `\r\n`.
    pub fn new(delimiter: char, enclosure: char, escape: char, newline: &str) -> Result<Self> {
        Ok(Self {
            delimiter: ascii("delimiter", delimiter)?,
            enclosure: ascii("enclosure", enclosure)?,
            escape: ascii("escape", escape)?,
            crlf: is_crlf(newline)?,
        })
    }

    /// Builds the dialect described by an importer configuration.
    ///
    /// # Errors
    ///
    /// Same as [`CsvDialect::new`].
    pub fn from_config(config: &ImporterConfig) -> Result<Self> {
        Self::new(
            config.delimiter,
            config.enclosure,
            config.escape,
            &config.newline,
        )
    }

    /// Returns a copy with another delimiter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `delimiter` is not ASCII.
    pub fn with_delimiter(self, delimiter: char) -> Result<Self> {
        Ok(Self {
            delimiter: ascii("delimiter", delimiter)?,
            ..self
        })
    }

    /// Returns a copy with another enclosure.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `enclosure` is not ASCII.
    pub fn with_enclosure(self, enclosure: char) -> Result<Self> {
        Ok(Self {
            enclosure: ascii("enclosure", enclosure)?,
            ..self
        })
    }

    /// Returns a copy with another escape character.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `escape` is not ASCII.
    pub fn with_escape(self, escape: char) -> Result<Self> {
        Ok(Self {
            escape: ascii("escape", escape)?,
            ..self
        })
    }

    /// Returns a copy with another record terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for anything but `\n` and `\r\n`.
    pub fn with_newline(self, newline: &str) -> Result<Self> {
        Ok(Self {
            crlf: is_crlf(newline)?,
            ..self
        })
    }

    /// The field delimiter.
    #[must_use]
    pub const fn delimiter(&self) -> char {
        self.delimiter as char
    }

    /// Reader accepting `\n`, `\r` and `\r\n` terminators, with ragged rows.
    #[must_use]
    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.enclosure)
            .escape(Some(self.escape));
        builder
    }

    /// Writer using this dialect's terminator.
    #[must_use]
    pub fn writer_builder(&self) -> csv::WriterBuilder {
        let mut builder = csv::WriterBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .quote(self.enclosure)
            .terminator(if self.crlf {
                csv::Terminator::CRLF
            } else {
                csv::Terminator::Any(b'\n')
            });
        builder
    }
}

fn is_crlf(newline: &str) -> Result<bool> {
    match newline {
        "\n" => Ok(false),
        "\r\n" => Ok(true),
        other => Err(Error::Configuration(format!(
            "unsupported newline {other:?}; use \"\\n\" or \"\\r\\n\""
        ))),
    }
}

fn ascii(setting: &str, c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| {
            Error::Configuration(format!("CSV {setting} must be a single ASCII character, got {c:?}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_config_defaults() {
        let dialect = CsvDialect::from_config(&ImporterConfig::default()).unwrap();
        assert_eq!(dialect, CsvDialect::default());
    }

    #[test]
    fn test_rejects_non_ascii_and_unknown_newline() {
        assert!(matches!(
            CsvDialect::new('§', '"', '\\', "\n"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            CsvDialect::new(',', '"', '\\', "\r"),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_with_setters() {
        let dialect = CsvDialect::default()
            .with_delimiter(';')
            .unwrap()
            .with_newline("\r\n")
            .unwrap();
        assert_eq!(dialect.delimiter(), ';');
        assert!(dialect.crlf);
        assert_eq!(dialect.enclosure, b'"');
    }
}
