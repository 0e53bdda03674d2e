//! Tolerant date casting with a sentinel fallback.
//!
//! With a configured format the value is parsed strictly; without one the
//! separators `/ \ | . ,` are normalised to `-` and a list of common layouts
//! is tried. Any failure produces the sentinel `0001-01-01` (`00:00:00`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// Date returned when parsing fails.
pub const SENTINEL_DATE: &str = "0001-01-01";
/// Timestamp returned when parsing fails.
pub const SENTINEL_DATETIME: &str = "0001-01-01 00:00:00";

const DATE_OUTPUT: &str = "%Y-%m-%d";
const DATETIME_OUTPUT: &str = "%Y-%m-%d %H:%M:%S";

static SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[/\\|.,]").expect("static regex")
});

const FREE_FORM_DATETIMES: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];

const FREE_FORM_DATES: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%Y%m%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%B %d- %Y",
    "%b %d- %Y",
];

/// Output precision of a date cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePrecision {
    /// `YYYY-MM-DD`.
    Date,
    /// `YYYY-MM-DD HH:MM:SS`.
    DateTime,
}

impl DatePrecision {
    const fn output(self) -> &'static str {
        match self {
            Self::Date => DATE_OUTPUT,
            Self::DateTime => DATETIME_OUTPUT,
        }
    }

    /// The fallback value for this precision.
    #[must_use]
    pub const fn sentinel(self) -> &'static str {
        match self {
            Self::Date => SENTINEL_DATE,
            Self::DateTime => SENTINEL_DATETIME,
        }
    }
}

/// Casts strings to normalised dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateCaster {
    format: Option<String>,
}

impl DateCaster {
    /// Creates a caster; `format` uses PHP-style tokens (`Y-m-d`) or chrono `%` directives.
    #[must_use]
    pub fn new(format: Option<&str>) -> Self {
        let format = format
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(translate_format);
        Self { format }
    }

    /// Returns the chrono format in use, if any.
    #[must_use]
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Casts a value, falling back to the sentinel on failure.
    #[must_use]
    pub fn cast(&self, raw: &str, precision: DatePrecision) -> String {
        self.parse(raw).map_or_else(
            || precision.sentinel().to_string(),
            |parsed| parsed.format(precision.output()).to_string(),
        )
    }

    /// Parses a value without the sentinel fallback.
    #[must_use]
    pub fn parse(&self, raw: &str) -> Option<NaiveDateTime> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match &self.format {
            Some(format) => parse_with(raw, format),
            None => parse_free_form(raw),
        }
    }
}

fn parse_with(raw: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, format)
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Parses common layouts after separator normalisation.
#[must_use]
pub fn parse_free_form(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }

    let normalized = SEPARATORS.replace_all(raw, "-");
    let normalized = normalized.trim();

    FREE_FORM_DATETIMES
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(normalized, format).ok())
        .or_else(|| {
            FREE_FORM_DATES.iter().find_map(|format| {
                NaiveDate::parse_from_str(normalized, format)
                    .ok()
                    .map(|date| date.and_time(NaiveTime::MIN))
            })
        })
}

/// Translates PHP date tokens to chrono directives.
///
/// Formats that already contain `%` are returned unchanged.
fn translate_format(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }

    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let directive = match c {
            'd' | 'j' => "%d",
            'm' | 'n' => "%m",
            'Y' => "%Y",
            'y' => "%y",
            'H' | 'G' => "%H",
            'h' | 'g' => "%I",
            'i' => "%M",
            's' => "%S",
            'A' | 'a' => "%p",
            'M' => "%b",
            'F' => "%B",
            'D' => "%a",
            'l' => "%A",
            'U' => "%s",
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
                continue;
            },
            other => {
                out.push(other);
                continue;
            },
        };
        out.push_str(directive);
    }
    out
}
