//! Declarative field validation.
//!
//! Rules are pipe separated, e.g. `required|numeric|min:1`. The
//! [`StandardValidator`] implements the commonly used subset:
//!
//! | Rule | Passes when |
//! |------|-------------|
//! | `required`, `filled` | value is not blank |
//! | `nullable` | value is blank (remaining rules skipped) |
//! | `numeric`, `integer` | value parses as a number / whole number |
//! | `string`, `boolean` | value has that type (`0`, `1`, `true`, `false` for booleans) |
//! | `email`, `date` | value looks like an address / parses as a date |
//! | `alpha`, `alpha_num`, `alpha_dash` | value only holds those characters |
//! | `min:n`, `max:n`, `between:a,b`, `size:n` | numeric value or string length in range |
//! | `in:a,b`, `not_in:a,b` | value is (not) in the list |
//! | `digits:n` | value is exactly `n` digits |
//! | `regex:pattern` | pattern matches |
//!
//! Apart from `required` and `filled`, rules are skipped for blank values.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::date::parse_free_form;
use crate::models::Row;
use crate::models::row::{is_blank, render_cell};
use crate::{Error, Result};

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex: email")
});

/// Validates rows against declarative rule strings.
pub trait DeclarativeValidator: Send + Sync {
    /// Returns true when every field passes its rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleResolution`] for a rule the validator does not know.
    fn validate(&self, row: &Row, rules: &IndexMap<String, String>) -> Result<bool>;

    /// Checks that every rule in `rules` is known, before any row is read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleResolution`] for the first unknown rule.
    fn check(&self, field: &str, rules: &str) -> Result<()> {
        let _ = (field, rules);
        Ok(())
    }
}

/// Built-in implementation of the common rule set.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardValidator;

#[derive(Debug, Clone, PartialEq)]
enum Rule {
    Required,
    Nullable,
    Numeric,
    Integer,
    String,
    Boolean,
    Email,
    Date,
    Alpha,
    AlphaNum,
    AlphaDash,
    Min(f64),
    Max(f64),
    Between(f64, f64),
    Size(f64),
    In(Vec<String>),
    NotIn(Vec<String>),
    Digits(usize),
    Regex(String),
}

impl Rule {
    fn parse(field: &str, raw: &str) -> Result<Self> {
        let unknown = || Error::RuleResolution {
            field: field.to_string(),
            rule: raw.to_string(),
        };
        let (name, args) = raw
            .split_once(':')
            .map_or((raw, ""), |(name, args)| (name, args));
        let number = |s: &str| s.trim().parse::<f64>().map_err(|_| unknown());
        let list = || args.split(',').map(|s| s.trim().to_string()).collect();

        let rule = match name.trim() {
            "required" | "filled" => Self::Required,
            "nullable" => Self::Nullable,
            "numeric" => Self::Numeric,
            "integer" => Self::Integer,
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "email" => Self::Email,
            "date" => Self::Date,
            "alpha" => Self::Alpha,
            "alpha_num" => Self::AlphaNum,
            "alpha_dash" => Self::AlphaDash,
            "min" => Self::Min(number(args)?),
            "max" => Self::Max(number(args)?),
            "size" => Self::Size(number(args)?),
            "between" => {
                let (low, high) = args.split_once(',').ok_or_else(unknown)?;
                Self::Between(number(low)?, number(high)?)
            },
            "in" => Self::In(list()),
            "not_in" => Self::NotIn(list()),
            "digits" => Self::Digits(args.trim().parse().map_err(|_| unknown())?),
            "regex" => {
                let pattern = args.trim_matches('/').to_string();
                Regex::new(&pattern).map_err(|_| unknown())?;
                Self::Regex(pattern)
            },
            _ => return Err(unknown()),
        };
        Ok(rule)
    }

    const fn is_implicit(&self) -> bool {
        matches!(self, Self::Required)
    }
}

fn parse_rules(field: &str, rules: &str) -> Result<Vec<Rule>> {
    rules
        .split('|')
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
        .map(|rule| Rule::parse(field, rule))
        .collect()
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Size of a value: the number for numeric rules, the element count for
/// arrays, otherwise the character count.
#[allow(clippy::cast_precision_loss)]
fn size_of(value: &Value, numeric: bool) -> f64 {
    match value {
        Value::Array(items) => items.len() as f64,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        other if numeric => as_number(other).unwrap_or(0.0),
        other => render_cell(other).chars().count() as f64,
    }
}

fn passes(rule: &Rule, value: &Value, numeric: bool) -> bool {
    let text = || render_cell(value);
    match rule {
        Rule::Required => !is_blank(value),
        Rule::Nullable => true,
        Rule::Numeric => as_number(value).is_some(),
        Rule::Integer => match value {
            Value::Number(n) => n.is_i64() || n.is_u64(),
            Value::String(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        },
        Rule::String => value.is_string(),
        Rule::Boolean => matches!(
            value,
            Value::Bool(_)
        ) || matches!(text().as_str(), "0" | "1" | "true" | "false"),
        Rule::Email => EMAIL.is_match(&text()),
        Rule::Date => parse_free_form(&text()).is_some(),
        Rule::Alpha => text().chars().all(char::is_alphabetic),
        Rule::AlphaNum => text().chars().all(char::is_alphanumeric),
        Rule::AlphaDash => text()
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_'),
        Rule::Min(min) => size_of(value, numeric) >= *min,
        Rule::Max(max) => size_of(value, numeric) <= *max,
        Rule::Between(low, high) => {
            let size = size_of(value, numeric);
            size >= *low && size <= *high
        },
        Rule::Size(expected) => (size_of(value, numeric) - expected).abs() < f64::EPSILON,
        Rule::In(list) => list.contains(&text()),
        Rule::NotIn(list) => !list.contains(&text()),
        Rule::Digits(len) => {
            let text = text();
            text.chars().count() == *len && text.chars().all(|c| c.is_ascii_digit())
        },
        Rule::Regex(pattern) => Regex::new(pattern).is_ok_and(|re| re.is_match(&text())),
    }
}

impl StandardValidator {
    /// Creates the validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn validate_field(field: &str, value: &Value, rules: &str) -> Result<bool> {
        let rules = parse_rules(field, rules)?;
        let blank = is_blank(value);
        if blank && rules.contains(&Rule::Nullable) {
            return Ok(true);
        }
        let numeric = rules
            .iter()
            .any(|rule| matches!(rule, Rule::Numeric | Rule::Integer));

        Ok(rules
            .iter()
            .filter(|rule| !blank || rule.is_implicit())
            .all(|rule| passes(rule, value, numeric)))
    }
}

impl DeclarativeValidator for StandardValidator {
    fn validate(&self, row: &Row, rules: &IndexMap<String, String>) -> Result<bool> {
        for (field, field_rules) in rules {
            let value = row.get(field).unwrap_or(&Value::Null);
            if !Self::validate_field(field, value, field_rules)? {
                tracing::trace!(field = %field, rules = %field_rules, "Field failed validation");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn check(&self, field: &str, rules: &str) -> Result<()> {
        parse_rules(field, rules).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn check(value: Value, rules: &str) -> bool {
        let mut row = Row::new();
        row.insert("field".to_string(), value);
        let mut map = IndexMap::new();
        map.insert("field".to_string(), rules.to_string());
        StandardValidator.validate(&row, &map).unwrap()
    }

    #[test_case(json!("1"), "numeric", true ; "numeric string")]
    #[test_case(json!("x"), "numeric", false ; "non numeric string")]
    #[test_case(json!(""), "numeric", true ; "blank skips non implicit rules")]
    #[test_case(json!(""), "required|numeric", false ; "blank fails required")]
    #[test_case(json!("12"), "integer|min:10|max:20", true ; "integer in range")]
    #[test_case(json!("25"), "integer|between:10,20", false ; "integer out of range")]
    #[test_case(json!("abcd"), "string|min:5", false ; "string too short")]
    #[test_case(json!("guitar@esp.com"), "email", true ; "valid email")]
    #[test_case(json!("guitar"), "email", false ; "invalid email")]
    #[test_case(json!("ESP"), "in:ESP,Ibanez", true ; "in list")]
    #[test_case(json!("Gibson"), "not_in:ESP,Ibanez", true ; "not in list")]
    #[test_case(json!("0042"), "digits:4", true ; "exact digits")]
    #[test_case(json!("guitar-one_2"), "alpha_dash", true ; "alpha dash")]
    #[test_case(json!("guitar one"), "alpha", false ; "alpha rejects spaces")]
    #[test_case(json!("2017/02/26"), "date", true ; "date")]
    #[test_case(json!("1"), "boolean", true ; "boolean")]
    #[test_case(Value::Null, "nullable|numeric", true ; "nullable")]
    #[test_case(json!("AB-12"), "regex:/^[A-Z]+-\\d+$/", true ; "regex")]
    fn test_rules(value: Value, rules: &str, expected: bool) {
        assert_eq!(check(value, rules), expected);
    }

    #[test]
    fn test_unknown_rule_is_an_error() {
        let err = StandardValidator
            .check("title", "string|bad_word_validation")
            .unwrap_err();
        assert!(matches!(
            err,
            Error::RuleResolution { ref field, ref rule }
                if field == "title" && rule == "bad_word_validation"
        ));
        assert!(StandardValidator.check("title", "min:abc").is_err());
    }
}
