//! Scalar value helpers: display text, input coercion and ordering

use serde_json::{Number, Value};
use std::cmp::Ordering;

/// Render a cell value the way it is shown in the grid.
///
/// Integral floats print without a fractional part so that `30.0` from the
/// server and `30` typed by the user compare equal.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", f as i64)
        }
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

/// `null` and the empty string both render as an empty cell
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Coerce raw editor text against the value a field had when editing began.
///
/// - numeric baseline: blank input becomes `null`, a parsable number becomes
///   a JSON number, anything else is kept as the raw string
/// - any other baseline: the raw string is used unchanged
pub fn coerce_input(baseline: Option<&Value>, raw: &str) -> Value {
    match baseline {
        Some(Value::Number(_)) => parse_number(raw),
        _ => Value::String(raw.to_string()),
    }
}

/// Parse text as a JSON number; blank is `null`, garbage passes through.
pub fn parse_number(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// Equality used for dirty tracking: compares rendered text
pub fn same_display(a: &Value, b: &Value) -> bool {
    display_string(a) == display_string(b)
}

/// Ordering for client-side sorts of non-blank values.
///
/// Numbers compare numerically and strings lexically; mixed kinds fall
/// back to their rendered text.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => display_string(a).cmp(&display_string(b)),
    }
}

/// Case-insensitive substring match against the rendered value
pub fn contains_ignore_case(value: &Value, needle_lower: &str) -> bool {
    display_string(value).to_lowercase().contains(needle_lower)
}
