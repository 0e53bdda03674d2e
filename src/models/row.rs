//! Row and header representations.
//!
//! A [`Row`] is an insertion-ordered map from lower-cased header name to a
//! JSON value. Freshly read rows only hold strings (or `null` for padded
//! short records); casting may turn cells into numbers, booleans or arrays.

use indexmap::IndexMap;
use serde_json::Value;

/// One CSV record keyed by header name.
pub type Row = IndexMap<String, Value>;

/// Ordered column names read from line 1 of a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    names: Vec<String>,
}

impl HeaderSet {
    /// Builds a header set, lower-casing and stripping non-printable characters.
    #[must_use]
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = raw
            .into_iter()
            .map(|name| sanitize_header(name.as_ref()))
            .collect();
        Self { names }
    }

    /// Returns the header names in file order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the source had no header columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns true if a column with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Returns every name that occurs more than once, once per extra occurrence.
    ///
    /// Duplicates are reported, never silently removed.
    #[must_use]
    pub fn duplicates(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.names
            .iter()
            .filter(|name| !seen.insert(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    /// Projects a row onto these headers; missing columns become empty strings.
    #[must_use]
    pub fn project(&self, row: &Row) -> Row {
        self.names
            .iter()
            .map(|name| {
                let value = row
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| Value::String(String::new()));
                (name.clone(), value)
            })
            .collect()
    }
}

/// Lower-cases a header and removes control / non-printable characters.
fn sanitize_header(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() && *c != '\u{feff}')
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Renders a cell value the way it is written to an output CSV.
#[must_use]
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(|v| !v.is_array() && !v.is_object()) => items
            .iter()
            .map(render_cell)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Returns true for `null` or strings that are empty after trimming.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
