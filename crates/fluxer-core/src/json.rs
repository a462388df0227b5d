//! Lenient accessors over loosely-typed server JSON.

use serde_json::Value;

/// A field that is present and not null
pub(crate) fn field<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    raw.get(key).filter(|v| !v.is_null())
}

/// The first of `keys` that is present and not null
pub(crate) fn first_field<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| field(raw, key))
}

/// Render any JSON value as text the way a loosely-typed client would
pub(crate) fn coerce_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(coerce_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// `field` coerced to text, empty when absent
pub(crate) fn string_field(raw: &Value, key: &str) -> String {
    field(raw, key).map(coerce_string).unwrap_or_default()
}

/// `field` only if it is already a string
pub(crate) fn opt_string(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

/// `field` only if it is a non-negative integer
pub(crate) fn opt_u64(raw: &Value, key: &str) -> Option<u64> {
    raw.get(key).and_then(Value::as_u64)
}

/// Whether a value would count as "set" in a conditional
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A list body: either a bare array or an object wrapping one under `key`
pub(crate) fn extract_list<'a>(raw: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    raw.as_array()
        .or_else(|| raw.get(key).and_then(Value::as_array))
}
