//! Collision-safe filter registry.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::{
    AnyFilter, CastFilter, ClosureCastFilter, ClosureHeadersFilter, ClosureValidationFilter,
    FilterKind, HeadersFilter, Subject, ValidationFilter,
};
use crate::models::HeaderSet;

/// Named filters of one kind, in registration order.
pub struct FilterTable<T: ?Sized> {
    entries: IndexMap<String, Arc<T>>,
}

impl<T: ?Sized> Default for FilterTable<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T: ?Sized> Clone for FilterTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: ?Sized> FilterTable<T> {
    /// Returns the first free name derived from `base`: `base`, `base_2`, `base_3`, ...
    #[must_use]
    pub fn free_name(&self, base: &str) -> String {
        if !self.entries.contains_key(base) {
            return base.to_string();
        }
        (2_usize..)
            .map(|n| format!("{base}_{n}"))
            .find(|candidate| !self.entries.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Inserts under the first free name derived from `base`; never overwrites.
    fn insert(&mut self, base: &str, filter: Arc<T>) -> String {
        let name = self.free_name(base);
        self.entries.insert(name.clone(), filter);
        name
    }

    /// Returns true if a filter is registered under this name.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the filter registered under this name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.get(name).cloned()
    }

    /// Returns every registered filter keyed by name.
    #[must_use]
    pub const fn all(&self) -> &IndexMap<String, Arc<T>> {
        &self.entries
    }

    /// Iterates over `(name, filter)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<T>)> {
        self.entries.iter().map(|(name, filter)| (name.as_str(), filter))
    }

    /// Removes every filter.
    pub fn flush(&mut self) {
        self.entries.clear();
    }

    /// Number of registered filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Headers, validation and cast filters of one importer definition.
///
/// Each importer owns its own registry; registrations are never shared
/// between importer types.
#[derive(Default, Clone)]
pub struct FilterRegistry {
    headers: FilterTable<dyn HeadersFilter>,
    validation: FilterTable<dyn ValidationFilter>,
    cast: FilterTable<dyn CastFilter>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a filter of any kind.
    ///
    /// Returns the name it was stored under, or `None` when the filter does
    /// not implement `kind`.
    pub fn register(&mut self, kind: FilterKind, filter: AnyFilter, name: Option<&str>) -> Option<String> {
        if filter.kind() != kind {
            tracing::warn!(
                expected = %kind,
                actual = %filter.kind(),
                filter = %filter.name(),
                "Rejected filter registration"
            );
            return None;
        }
        let base = resolve_name(name, || filter.name());
        let registered = match filter {
            AnyFilter::Headers(f) => self.headers.insert(&base, f),
            AnyFilter::Validation(f) => self.validation.insert(&base, f),
            AnyFilter::Cast(f) => self.cast.insert(&base, f),
        };
        tracing::debug!(kind = %kind, name = %registered, "Registered filter");
        Some(registered)
    }

    /// Registers a required-headers filter.
    pub fn register_headers_filter<F>(&mut self, filter: F, name: Option<&str>) -> String
    where
        F: HeadersFilter + 'static,
    {
        self.register_headers_arc(Arc::new(filter), name)
    }

    /// Registers a required-headers closure under `name` or `filter`.
    pub fn register_headers_fn<F>(&mut self, closure: F, name: Option<&str>) -> String
    where
        F: Fn(&HeaderSet) -> bool + Send + Sync + 'static,
    {
        self.register_headers_filter(ClosureHeadersFilter::new(closure), name)
    }

    /// Registers several required-headers filters, keeping given names where free.
    pub fn register_headers_filters<I>(&mut self, filters: I) -> Vec<String>
    where
        I: IntoIterator<Item = (Option<String>, Arc<dyn HeadersFilter>)>,
    {
        filters
            .into_iter()
            .map(|(name, filter)| self.register_headers_arc(filter, name.as_deref()))
            .collect()
    }

    fn register_headers_arc(&mut self, filter: Arc<dyn HeadersFilter>, name: Option<&str>) -> String {
        let base = resolve_name(name, || filter.name());
        self.headers.insert(&base, filter)
    }

    /// Registers a validation filter.
    pub fn register_validation_filter<F>(&mut self, filter: F, name: Option<&str>) -> String
    where
        F: ValidationFilter + 'static,
    {
        self.register_validation_arc(Arc::new(filter), name)
    }

    /// Registers a global validation closure under `name` or `filter`.
    pub fn register_validation_fn<F>(&mut self, closure: F, name: Option<&str>) -> String
    where
        F: Fn(Subject<'_>) -> bool + Send + Sync + 'static,
    {
        self.register_validation_filter(ClosureValidationFilter::new(closure), name)
    }

    /// Registers several validation filters, keeping given names where free.
    pub fn register_validation_filters<I>(&mut self, filters: I) -> Vec<String>
    where
        I: IntoIterator<Item = (Option<String>, Arc<dyn ValidationFilter>)>,
    {
        filters
            .into_iter()
            .map(|(name, filter)| self.register_validation_arc(filter, name.as_deref()))
            .collect()
    }

    fn register_validation_arc(
        &mut self,
        filter: Arc<dyn ValidationFilter>,
        name: Option<&str>,
    ) -> String {
        let base = resolve_name(name, || filter.name());
        self.validation.insert(&base, filter)
    }

    /// Registers a cast filter.
    pub fn register_cast_filter<F>(&mut self, filter: F, name: Option<&str>) -> String
    where
        F: CastFilter + 'static,
    {
        self.register_cast_arc(Arc::new(filter), name)
    }

    /// Registers a cast closure under `name` or `filter`.
    pub fn register_cast_fn<F>(&mut self, closure: F, name: Option<&str>) -> String
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.register_cast_filter(ClosureCastFilter::new(closure), name)
    }

    /// Registers several cast filters, keeping given names where free.
    pub fn register_cast_filters<I>(&mut self, filters: I) -> Vec<String>
    where
        I: IntoIterator<Item = (Option<String>, Arc<dyn CastFilter>)>,
    {
        filters
            .into_iter()
            .map(|(name, filter)| self.register_cast_arc(filter, name.as_deref()))
            .collect()
    }

    fn register_cast_arc(&mut self, filter: Arc<dyn CastFilter>, name: Option<&str>) -> String {
        let base = resolve_name(name, || filter.name());
        self.cast.insert(&base, filter)
    }

    /// Required-headers filters.
    #[must_use]
    pub const fn headers(&self) -> &FilterTable<dyn HeadersFilter> {
        &self.headers
    }

    /// Validation filters.
    #[must_use]
    pub const fn validation(&self) -> &FilterTable<dyn ValidationFilter> {
        &self.validation
    }

    /// Cast filters.
    #[must_use]
    pub const fn cast(&self) -> &FilterTable<dyn CastFilter> {
        &self.cast
    }

    /// Returns true if a filter of `kind` is registered under `name`.
    #[must_use]
    pub fn exists(&self, kind: FilterKind, name: &str) -> bool {
        match kind {
            FilterKind::Headers => self.headers.exists(name),
            FilterKind::Validation => self.validation.exists(name),
            FilterKind::Cast => self.cast.exists(name),
        }
    }

    /// Returns the filter of `kind` registered under `name`.
    #[must_use]
    pub fn get(&self, kind: FilterKind, name: &str) -> Option<AnyFilter> {
        match kind {
            FilterKind::Headers => self.headers.get(name).map(AnyFilter::Headers),
            FilterKind::Validation => self.validation.get(name).map(AnyFilter::Validation),
            FilterKind::Cast => self.cast.get(name).map(AnyFilter::Cast),
        }
    }

    /// Returns every filter of `kind` keyed by name.
    #[must_use]
    pub fn all(&self, kind: FilterKind) -> IndexMap<String, AnyFilter> {
        match kind {
            FilterKind::Headers => collect_any(&self.headers, AnyFilter::Headers),
            FilterKind::Validation => collect_any(&self.validation, AnyFilter::Validation),
            FilterKind::Cast => collect_any(&self.cast, AnyFilter::Cast),
        }
    }

    /// Removes every filter of `kind`.
    pub fn flush(&mut self, kind: FilterKind) {
        match kind {
            FilterKind::Headers => self.headers.flush(),
            FilterKind::Validation => self.validation.flush(),
            FilterKind::Cast => self.cast.flush(),
        }
    }

    /// Returns true if a global validation filter is registered under `name`.
    #[must_use]
    pub fn is_global_validation(&self, name: &str) -> bool {
        self.validation
            .get(name)
            .is_some_and(|filter| filter.is_global())
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("headers", &self.headers.all().keys().collect::<Vec<_>>())
            .field("validation", &self.validation.all().keys().collect::<Vec<_>>())
            .field("cast", &self.cast.all().keys().collect::<Vec<_>>())
            .finish()
    }
}

fn resolve_name(explicit: Option<&str>, display: impl FnOnce() -> String) -> String {
    match explicit.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => display(),
    }
}

fn collect_any<T: ?Sized>(
    table: &FilterTable<T>,
    wrap: impl Fn(Arc<T>) -> AnyFilter,
) -> IndexMap<String, AnyFilter> {
    table
        .iter()
        .map(|(name, filter)| (name.to_string(), wrap(Arc::clone(filter))))
        .collect()
}
