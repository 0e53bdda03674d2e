//! Accumulated header validation errors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category for required columns missing from the header row.
pub const REQUIRED_FIELDS_CATEGORY: &str = "Required fields not found:";
/// Category for failed required-headers filters.
pub const HEADERS_ERROR_CATEGORY: &str = "Headers error:";
/// Category for header names that occur more than once.
pub const DUPLICATED_HEADERS_CATEGORY: &str = "Duplicated values:";

/// Every header problem found during one initialisation pass.
///
/// Serialises to `{"quantity": N, "<category>": [messages], ...}` with the
/// categories in the order they were first reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    quantity: usize,
    #[serde(flatten)]
    categories: IndexMap<String, Vec<String>>,
}

impl ValidationReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one error under a category.
    pub fn push(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.categories
            .entry(category.into())
            .or_default()
            .push(message.into());
        self.quantity += 1;
    }

    /// Total number of errors across all categories.
    #[must_use]
    pub const fn quantity(&self) -> usize {
        self.quantity
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    /// Messages recorded under one category.
    #[must_use]
    pub fn messages(&self, category: &str) -> &[String] {
        self.categories.get(category).map_or(&[], Vec::as_slice)
    }

    /// Iterates over `(category, messages)` in report order.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.categories
            .iter()
            .map(|(category, messages)| (category.as_str(), messages.as_slice()))
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_across_categories() {
        let mut report = ValidationReport::new();
        assert!(report.is_empty());

        report.push(REQUIRED_FIELDS_CATEGORY, "The \"serial_number\" field is required");
        report.push(DUPLICATED_HEADERS_CATEGORY, "title");
        report.push(DUPLICATED_HEADERS_CATEGORY, "company");

        assert_eq!(report.quantity(), 3);
        assert_eq!(report.messages(DUPLICATED_HEADERS_CATEGORY), ["title", "company"]);
        assert!(report.messages(HEADERS_ERROR_CATEGORY).is_empty());
        assert_eq!(
            report.to_string(),
            r#"{"quantity":3,"Required fields not found:":["The \"serial_number\" field is required"],"Duplicated values:":["title","company"]}"#
        );
    }
}
