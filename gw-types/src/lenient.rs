//! Lenient field decoding for controller output.
//!
//! The controller firmware is not strict about JSON types: numbers show up as
//! strings and addresses as numbers depending on the build. These helpers
//! accept either form and are used through `#[serde(deserialize_with)]`.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// Interpret a JSON value as an integer.
///
/// Accepts integers, floats (truncated), booleans and strings holding a
/// decimal integer. Returns `None` for anything else.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Interpret a JSON value as a float.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Interpret a JSON value as text.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional<'de, D, T>(
    deserializer: D,
    convert: fn(&Value) -> Option<T>,
    expected: &str,
) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => convert(&value)
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected {expected}, got {value}"))),
    }
}

/// Optional integer field.
pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    optional(deserializer, as_i64, "an integer")
}

/// Optional float field.
pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    optional(deserializer, as_f64, "a number")
}

/// Optional text field.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    optional(deserializer, as_string, "a string")
}

/// Required integer field (use with `#[serde(default)]` for a fallback).
pub fn i64_value<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_i64(&value).ok_or_else(|| de::Error::custom(format!("expected an integer, got {value}")))
}

/// Required float field (use with `#[serde(default)]` for a fallback).
pub fn f64_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    as_f64(&value).ok_or_else(|| de::Error::custom(format!("expected a number, got {value}")))
}
