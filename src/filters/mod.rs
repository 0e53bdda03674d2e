//! Filter capabilities and the per-importer filter registry.
//!
//! Three kinds of filters plug into the row pipeline:
//!
//! | Kind | Trait | Runs against |
//! |------|-------|--------------|
//! | Required headers | [`HeadersFilter`] | the header row, once per run |
//! | Validation | [`ValidationFilter`] | a whole row (global) or one field |
//! | Cast | [`CastFilter`] | one field value |
//!
//! Filters are registered by name in a [`FilterRegistry`] owned by the
//! importer definition. Closures are wrapped by the adapters in
//! [`closure`] and registered under the default name `filter`.

pub mod closure;
mod registry;

pub use closure::{ClosureCastFilter, ClosureHeadersFilter, ClosureValidationFilter};
pub use registry::{FilterRegistry, FilterTable};

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::models::{HeaderSet, Row};

/// Default error message of a failed headers filter.
pub const DEFAULT_HEADERS_ERROR: &str = "Headers error occurred";
/// Default error message of a failed validation filter.
pub const DEFAULT_FIELD_ERROR: &str = "Field error occurred";

/// The three filter tables of a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Required-headers filters.
    Headers,
    /// Row and field validation filters.
    Validation,
    /// Field cast filters.
    Cast,
}

impl FilterKind {
    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Headers => "headers",
            Self::Validation => "validation",
            Self::Cast => "cast",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display name used when a filter is registered without an explicit name.
pub trait Nameable {
    /// Returns the display name; defaults to the short type name.
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Checks the header row before any record is read.
pub trait HeadersFilter: Nameable + Send + Sync {
    /// Returns true when the headers are acceptable.
    fn filter(&self, headers: &HeaderSet) -> bool;

    /// Message reported under `Headers error:` when the filter fails.
    fn error_message(&self) -> String {
        DEFAULT_HEADERS_ERROR.to_string()
    }
}

/// What a validation filter is evaluated against.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    /// The whole cast row (global filters).
    Row(&'a Row),
    /// One field of the cast row.
    Field {
        /// Column name.
        name: &'a str,
        /// Cast value.
        value: &'a Value,
    },
}

impl<'a> Subject<'a> {
    /// Looks up a field value in either subject shape.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        match *self {
            Self::Row(row) => row.get(field),
            Self::Field { name, value } => (name == field).then_some(value),
        }
    }

    /// Returns the field value, if this is a field subject.
    #[must_use]
    pub const fn value(&self) -> Option<&'a Value> {
        match *self {
            Self::Row(_) => None,
            Self::Field { value, .. } => Some(value),
        }
    }

    /// Returns the field value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&'a str> {
        self.value().and_then(Value::as_str)
    }
}

/// Decides whether a row (or one of its fields) is valid.
pub trait ValidationFilter: Nameable + Send + Sync {
    /// Returns true when the subject is valid.
    fn filter(&self, subject: Subject<'_>) -> bool;

    /// Global filters run once per row against the full row.
    fn is_global(&self) -> bool {
        false
    }

    /// Human-readable failure message.
    fn error_message(&self) -> String {
        DEFAULT_FIELD_ERROR.to_string()
    }
}

/// Transforms a single field value.
pub trait CastFilter: Nameable + Send + Sync {
    /// Returns the transformed value.
    fn cast(&self, value: Value) -> Value;
}

/// A filter of any kind, for the kind-generic registration entry point.
#[derive(Clone)]
pub enum AnyFilter {
    /// Required-headers filter.
    Headers(Arc<dyn HeadersFilter>),
    /// Validation filter.
    Validation(Arc<dyn ValidationFilter>),
    /// Cast filter.
    Cast(Arc<dyn CastFilter>),
}

impl AnyFilter {
    /// Returns the kind this filter implements.
    #[must_use]
    pub const fn kind(&self) -> FilterKind {
        match self {
            Self::Headers(_) => FilterKind::Headers,
            Self::Validation(_) => FilterKind::Validation,
            Self::Cast(_) => FilterKind::Cast,
        }
    }

    /// Returns the filter's display name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Headers(f) => f.name(),
            Self::Validation(f) => f.name(),
            Self::Cast(f) => f.name(),
        }
    }
}

impl fmt::Debug for AnyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyFilter")
            .field(&self.kind())
            .field(&self.name())
            .finish()
    }
}

/// Strips the module path and generic arguments from a type name.
#[must_use]
pub fn short_type_name(type_name: &str) -> String {
    let without_generics = type_name.split('<').next().unwrap_or(type_name);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct MyHeadersFilter;

    impl Nameable for MyHeadersFilter {}

    impl HeadersFilter for MyHeadersFilter {
        fn filter(&self, headers: &HeaderSet) -> bool {
            headers.contains("name")
        }
    }

    #[test]
    fn test_default_name_is_short_type_name() {
        assert_eq!(MyHeadersFilter.name(), "MyHeadersFilter");
        assert_eq!(MyHeadersFilter.error_message(), DEFAULT_HEADERS_ERROR);
        assert_eq!(short_type_name("a::b::C<d::E>"), "C");
    }

    #[test]
    fn test_subject_lookup() {
        let mut row = Row::new();
        row.insert("title".to_string(), json!("bad_word"));
        let value = json!("x");

        assert_eq!(Subject::Row(&row).get("title"), Some(&json!("bad_word")));
        assert_eq!(Subject::Row(&row).value(), None);

        let field = Subject::Field {
            name: "title",
            value: &value,
        };
        assert_eq!(field.get("title"), Some(&value));
        assert_eq!(field.get("company"), None);
        assert_eq!(field.as_str(), Some("x"));
    }

    #[test]
    fn test_any_filter_kind() {
        let filter = AnyFilter::Headers(Arc::new(MyHeadersFilter));
        assert_eq!(filter.kind(), FilterKind::Headers);
        assert_eq!(filter.name(), "MyHeadersFilter");
    }
}
