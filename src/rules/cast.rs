//! Primitive type casts.

use serde_json::{Number, Value};

use super::date::{DateCaster, DatePrecision};
use crate::models::row::render_cell;

/// Built-in casts selected by type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveCast {
    /// `int`, `integer`.
    Integer,
    /// `real`, `float`, `double`.
    Float,
    /// `string`.
    String,
    /// `bool`, `boolean`.
    Boolean,
    /// `array`.
    Array,
    /// `date`.
    Date,
    /// `datetime`, `date_time`.
    DateTime,
}

impl PrimitiveCast {
    /// Resolves a type name; `None` for names that are not primitive types.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "int" | "integer" => Some(Self::Integer),
            "real" | "float" | "double" => Some(Self::Float),
            "string" => Some(Self::String),
            "bool" | "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            "date" => Some(Self::Date),
            "datetime" | "date_time" => Some(Self::DateTime),
            _ => None,
        }
    }

    /// Applies the cast. `null` is never cast.
    #[must_use]
    pub fn apply(self, value: Value, dates: &DateCaster) -> Value {
        if value.is_null() {
            return value;
        }
        match self {
            Self::Integer => Value::Number(Number::from(to_integer(&value))),
            Self::Float => Number::from_f64(to_float(&value)).map_or(Value::Null, Value::Number),
            Self::String => Value::String(to_string(&value)),
            Self::Boolean => Value::Bool(to_bool(&value)),
            Self::Array => match value {
                Value::Array(_) => value,
                other => Value::Array(vec![other]),
            },
            Self::Date => Value::String(dates.cast(&to_string(&value), DatePrecision::Date)),
            Self::DateTime => {
                Value::String(dates.cast(&to_string(&value), DatePrecision::DateTime))
            },
        }
    }
}

/// Parses the leading numeric prefix of a string (`"12abc"` is 12, `"abc"` is 0).
fn leading_number(s: &str) -> f64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start {
        return 0.0;
    }
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(0.0)
}

#[allow(clippy::cast_possible_truncation)]
fn to_integer(value: &Value) -> i64 {
    match value {
        Value::Bool(b) => i64::from(*b),
        Value::Number(n) => n
            .as_i64()
            .unwrap_or_else(|| n.as_f64().map_or(0, |f| f.trunc() as i64)),
        Value::String(s) => leading_number(s).trunc() as i64,
        Value::Array(items) => i64::from(!items.is_empty()),
        Value::Null | Value::Object(_) => 0,
    }
}

fn to_float(value: &Value) -> f64 {
    match value {
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => leading_number(s),
        Value::Array(items) => f64::from(u8::from(!items.is_empty())),
        Value::Null | Value::Object(_) => 0.0,
    }
}

fn to_string(value: &Value) -> String {
    match value {
        Value::Bool(false) => String::new(),
        other => render_cell(other),
    }
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !(s.is_empty() || s == "0"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cast(kind: &str, value: Value) -> Value {
        PrimitiveCast::parse(kind)
            .unwrap()
            .apply(value, &DateCaster::default())
    }

    #[test]
    fn test_parse_names() {
        assert_eq!(PrimitiveCast::parse("INTEGER"), Some(PrimitiveCast::Integer));
        assert_eq!(PrimitiveCast::parse("double"), Some(PrimitiveCast::Float));
        assert_eq!(PrimitiveCast::parse("date_time"), Some(PrimitiveCast::DateTime));
        assert_eq!(PrimitiveCast::parse("lowercase"), None);
    }

    #[test]
    fn test_leading_number() {
        assert!((leading_number("12abc") - 12.0).abs() < f64::EPSILON);
        assert!((leading_number(" -1.5x") + 1.5).abs() < f64::EPSILON);
        assert!((leading_number("1e3") - 1000.0).abs() < f64::EPSILON);
        assert!(leading_number("abc").abs() < f64::EPSILON);
        assert!(leading_number(".").abs() < f64::EPSILON);
    }

    #[test]
    fn test_null_is_never_cast() {
        for kind in ["int", "float", "string", "bool", "array", "date", "datetime"] {
            assert_eq!(cast(kind, Value::Null), Value::Null, "{kind}");
        }
    }

    #[test]
    fn test_casts() {
        assert_eq!(cast("int", json!("42 guitars")), json!(42));
        assert_eq!(cast("int", json!("1.9")), json!(1));
        assert_eq!(cast("float", json!("1.5")), json!(1.5));
        assert_eq!(cast("string", json!(7)), json!("7"));
        assert_eq!(cast("bool", json!("0")), json!(false));
        assert_eq!(cast("bool", json!("no")), json!(true));
        assert_eq!(cast("array", json!("x")), json!(["x"]));
        assert_eq!(cast("date", json!("2017/02/26")), json!("2017-02-26"));
    }
}
