//! Row and parameter access helpers shared by the builtin capabilities.

use serde_json::{Map, Value};

/// Numeric field value, accepting numbers and numeric strings.
pub(crate) fn f64_of(row: &Value, field: &str) -> Option<f64> {
    match row.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn str_of<'a>(row: &'a Value, field: &str) -> Option<&'a str> {
    row.get(field).and_then(|v| v.as_str())
}

/// Field value rendered as a grouping key.
pub(crate) fn key_of(row: &Value, field: &str) -> String {
    match row.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "<null>".to_string(),
        Some(other) => other.to_string(),
    }
}

pub(crate) fn str_param<'a>(params: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    params.get(name).and_then(|v| v.as_str())
}

pub(crate) fn str_param_or<'a>(
    params: &'a Map<String, Value>,
    name: &str,
    default: &'a str,
) -> &'a str {
    str_param(params, name).unwrap_or(default)
}

pub(crate) fn int_param_or(params: &Map<String, Value>, name: &str, default: i64) -> i64 {
    params.get(name).and_then(|v| v.as_i64()).unwrap_or(default)
}
