//! Adapters that turn closures into filters.
//!
//! Every adapter reports the display name `filter`, so several unnamed
//! closures of the same kind register as `filter`, `filter_2`, and so on.

use serde_json::Value;

use super::{CastFilter, DEFAULT_FIELD_ERROR, HeadersFilter, Nameable, Subject, ValidationFilter};
use crate::models::HeaderSet;

/// Display name of every closure adapter.
pub const CLOSURE_FILTER_NAME: &str = "filter";

/// Headers filter backed by a closure.
pub struct ClosureHeadersFilter<F> {
    closure: F,
    message: Option<String>,
}

impl<F> ClosureHeadersFilter<F>
where
    F: Fn(&HeaderSet) -> bool + Send + Sync,
{
    /// Wraps a closure.
    pub const fn new(closure: F) -> Self {
        Self {
            closure,
            message: None,
        }
    }

    /// Overrides the failure message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<F> Nameable for ClosureHeadersFilter<F> {
    fn name(&self) -> String {
        CLOSURE_FILTER_NAME.to_string()
    }
}

impl<F> HeadersFilter for ClosureHeadersFilter<F>
where
    F: Fn(&HeaderSet) -> bool + Send + Sync,
{
    fn filter(&self, headers: &HeaderSet) -> bool {
        (self.closure)(headers)
    }

    fn error_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| super::DEFAULT_HEADERS_ERROR.to_string())
    }
}

/// Validation filter backed by a closure.
///
/// Closure validation filters are global unless built with [`Self::field`].
pub struct ClosureValidationFilter<F> {
    closure: F,
    global: bool,
}

impl<F> ClosureValidationFilter<F>
where
    F: Fn(Subject<'_>) -> bool + Send + Sync,
{
    /// Wraps a closure evaluated once per row.
    pub const fn new(closure: F) -> Self {
        Self {
            closure,
            global: true,
        }
    }

    /// Wraps a closure evaluated against the fields that reference it.
    pub const fn field(closure: F) -> Self {
        Self {
            closure,
            global: false,
        }
    }
}

impl<F> Nameable for ClosureValidationFilter<F> {
    fn name(&self) -> String {
        CLOSURE_FILTER_NAME.to_string()
    }
}

impl<F> ValidationFilter for ClosureValidationFilter<F>
where
    F: Fn(Subject<'_>) -> bool + Send + Sync,
{
    fn filter(&self, subject: Subject<'_>) -> bool {
        (self.closure)(subject)
    }

    fn is_global(&self) -> bool {
        self.global
    }

    fn error_message(&self) -> String {
        DEFAULT_FIELD_ERROR.to_string()
    }
}

/// Cast filter backed by a closure.
pub struct ClosureCastFilter<F> {
    closure: F,
}

impl<F> ClosureCastFilter<F>
where
    F: Fn(Value) -> Value + Send + Sync,
{
    /// Wraps a closure.
    pub const fn new(closure: F) -> Self {
        Self { closure }
    }
}

impl<F> Nameable for ClosureCastFilter<F> {
    fn name(&self) -> String {
        CLOSURE_FILTER_NAME.to_string()
    }
}

impl<F> CastFilter for ClosureCastFilter<F>
where
    F: Fn(Value) -> Value + Send + Sync,
{
    fn cast(&self, value: Value) -> Value {
        (self.closure)(value)
    }
}
