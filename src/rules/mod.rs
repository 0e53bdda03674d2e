//! Rule resolution: header checks, row validation and row casting.
//!
//! Every rule reference of an [`ImportDefinition`] is resolved once per run
//! into a tagged step. Cast references become a registered cast filter, a
//! primitive cast or a pass-through; validation references become a
//! registered field filter or a rule for the [`DeclarativeValidator`].

mod cast;
mod date;
mod validator;

pub use cast::PrimitiveCast;
pub use date::{DateCaster, DatePrecision, SENTINEL_DATE, SENTINEL_DATETIME, parse_free_form};
pub use validator::{DeclarativeValidator, StandardValidator};

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::Result;
use crate::filters::{CastFilter, FilterRegistry, HeadersFilter, Subject, ValidationFilter};
use crate::models::{
    DUPLICATED_HEADERS_CATEGORY, HEADERS_ERROR_CATEGORY, HeaderSet, ImportDefinition,
    REQUIRED_FIELDS_CATEGORY, Row, ValidationReport,
};

/// One resolved cast reference.
#[derive(Clone)]
pub enum CastStep {
    /// A registered cast filter.
    Filter(String, Arc<dyn CastFilter>),
    /// A built-in type cast.
    Primitive(PrimitiveCast),
    /// An unknown name; the value passes through unchanged.
    Passthrough(String),
}

impl fmt::Debug for CastStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(name, _) => f.debug_tuple("Filter").field(name).finish(),
            Self::Primitive(cast) => f.debug_tuple("Primitive").field(cast).finish(),
            Self::Passthrough(name) => f.debug_tuple("Passthrough").field(name).finish(),
        }
    }
}

/// One resolved validation reference.
#[derive(Clone)]
pub enum ValidationStep {
    /// A registered non-global validation filter.
    Filter(String, Arc<dyn ValidationFilter>),
    /// A rule passed verbatim to the declarative validator.
    External(String),
}

impl fmt::Debug for ValidationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filter(name, _) => f.debug_tuple("Filter").field(name).finish(),
            Self::External(rule) => f.debug_tuple("External").field(rule).finish(),
        }
    }
}

/// Resolved steps of one column.
#[derive(Debug, Clone, Default)]
pub struct FieldPlan {
    /// Casts applied left to right.
    pub casts: Vec<CastStep>,
    /// Registered field filters, evaluated before external rules.
    pub filters: Vec<ValidationStep>,
    /// External rules joined with `|`, if any.
    pub external: Option<String>,
}

/// Compiled rules of one importer definition.
pub struct RuleResolver {
    required: Vec<String>,
    plans: IndexMap<String, FieldPlan>,
    headers_filters: Vec<Arc<dyn HeadersFilter>>,
    global_filters: Vec<(String, Arc<dyn ValidationFilter>)>,
    validator: Arc<dyn DeclarativeValidator>,
    dates: DateCaster,
}

impl fmt::Debug for RuleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleResolver")
            .field("required", &self.required)
            .field("plans", &self.plans)
            .field("headers_filters", &self.headers_filters.len())
            .field(
                "global_filters",
                &self.global_filters.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            )
            .field("dates", &self.dates)
            .finish_non_exhaustive()
    }
}

impl RuleResolver {
    /// Resolves every rule reference of `definition`.
    ///
    /// Validation references naming a global filter are skipped per field:
    /// global filters already run once against the whole row.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::RuleResolution`] if the validator rejects an
    /// external rule.
    pub fn compile(
        definition: &ImportDefinition,
        registry: &FilterRegistry,
        validator: Arc<dyn DeclarativeValidator>,
        dates: DateCaster,
    ) -> Result<Self> {
        let mut plans = IndexMap::new();

        for (field, rule) in &definition.mappings {
            let casts = rule
                .cast
                .iter()
                .map(|name| resolve_cast(registry, name))
                .collect();

            let mut filters = Vec::new();
            let mut external = Vec::new();
            for reference in &rule.validation {
                match registry.validation().get(reference) {
                    Some(filter) if filter.is_global() => {},
                    Some(filter) => filters.push(ValidationStep::Filter(reference.clone(), filter)),
                    None => external.push(reference.as_str()),
                }
            }
            let external = (!external.is_empty()).then(|| external.join("|"));
            if let Some(rules) = &external {
                validator.check(field, rules)?;
            }

            plans.insert(
                field.clone(),
                FieldPlan {
                    casts,
                    filters,
                    external,
                },
            );
        }

        let global_filters = registry
            .validation()
            .iter()
            .filter(|(_, filter)| filter.is_global())
            .map(|(name, filter)| (name.to_string(), Arc::clone(filter)))
            .collect();

        Ok(Self {
            required: definition.required_fields().map(str::to_string).collect(),
            plans,
            headers_filters: registry.headers().all().values().cloned().collect(),
            global_filters,
            validator,
            dates,
        })
    }

    /// Returns the resolved plan of a column.
    #[must_use]
    pub fn plan(&self, field: &str) -> Option<&FieldPlan> {
        self.plans.get(field)
    }

    /// Returns the date caster in use.
    #[must_use]
    pub const fn dates(&self) -> &DateCaster {
        &self.dates
    }

    /// Checks required columns and runs every headers filter.
    ///
    /// Errors accumulate in `report`; nothing fails fast.
    pub fn validate_headers(&self, headers: &HeaderSet, report: &mut ValidationReport) {
        for field in &self.required {
            if !headers.contains(field) {
                report.push(
                    REQUIRED_FIELDS_CATEGORY,
                    format!("The \"{field}\" field is required"),
                );
            }
        }
        for filter in &self.headers_filters {
            if !filter.filter(headers) {
                report.push(HEADERS_ERROR_CATEGORY, filter.error_message());
            }
        }
    }

    /// Reports every duplicated header name.
    pub fn check_duplicates(headers: &HeaderSet, report: &mut ValidationReport) {
        for name in headers.duplicates() {
            report.push(
                DUPLICATED_HEADERS_CATEGORY,
                format!("Csv headers has duplicated fields \"{name}\""),
            );
        }
    }

    /// Applies the cast chain of every present, non-null field.
    #[must_use]
    pub fn cast_row(&self, mut row: Row) -> Row {
        for (field, plan) in &self.plans {
            if plan.casts.is_empty() {
                continue;
            }
            let Some(slot) = row.get_mut(field) else {
                continue;
            };
            if slot.is_null() {
                continue;
            }
            let mut value = std::mem::take(slot);
            for step in &plan.casts {
                value = self.apply_cast(step, value);
            }
            *slot = value;
        }
        row
    }

    fn apply_cast(&self, step: &CastStep, value: Value) -> Value {
        match step {
            CastStep::Filter(_, filter) => filter.cast(value),
            CastStep::Primitive(cast) => cast.apply(value, &self.dates),
            CastStep::Passthrough(_) => value,
        }
    }

    /// Validates a cast row.
    ///
    /// Global filters run first and short-circuit. Field filters then run
    /// per present field, followed by one batch call to the declarative
    /// validator for the remaining rules.
    ///
    /// # Errors
    ///
    /// Propagates validator errors such as unknown rules.
    pub fn validate_row(&self, row: &Row) -> Result<bool> {
        for (name, filter) in &self.global_filters {
            if !filter.filter(Subject::Row(row)) {
                tracing::trace!(filter = %name, "Row rejected by global filter");
                return Ok(false);
            }
        }

        let mut external = IndexMap::new();
        for (field, plan) in &self.plans {
            let Some(value) = row.get(field) else {
                continue;
            };
            for step in &plan.filters {
                if let ValidationStep::Filter(name, filter) = step {
                    let subject = Subject::Field {
                        name: field.as_str(),
                        value,
                    };
                    if !filter.filter(subject) {
                        tracing::trace!(field = %field, filter = %name, "Field rejected by filter");
                        return Ok(false);
                    }
                }
            }
            if let Some(rules) = &plan.external {
                external.insert(field.clone(), rules.clone());
            }
        }

        if external.is_empty() {
            return Ok(true);
        }
        self.validator.validate(row, &external)
    }
}

fn resolve_cast(registry: &FilterRegistry, name: &str) -> CastStep {
    if let Some(filter) = registry.cast().get(name) {
        return CastStep::Filter(name.to_string(), filter);
    }
    PrimitiveCast::parse(name).map_or_else(
        || CastStep::Passthrough(name.to_string()),
        CastStep::Primitive,
    )
}
