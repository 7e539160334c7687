//! Typed access into imported JSON, reporting the codec that asked.

use serde_json::{Map, Value as JsonValue};
use xnb_core::{Result, XnbError};

pub(crate) fn as_bool(json: &JsonValue, codec: &str) -> Result<bool> {
    json.as_bool().ok_or_else(|| XnbError::invalid_value(codec, "a JSON boolean"))
}

pub(crate) fn as_i64(json: &JsonValue, codec: &str) -> Result<i64> {
    json.as_i64().ok_or_else(|| XnbError::invalid_value(codec, "a JSON integer"))
}

/// `null` stands in for non-finite floats, which JSON cannot carry.
pub(crate) fn as_f64(json: &JsonValue, codec: &str) -> Result<f64> {
    match json {
        JsonValue::Null => Ok(f64::NAN),
        _ => json.as_f64().ok_or_else(|| XnbError::invalid_value(codec, "a JSON number")),
    }
}

pub(crate) fn as_str<'a>(json: &'a JsonValue, codec: &str) -> Result<&'a str> {
    json.as_str().ok_or_else(|| XnbError::invalid_value(codec, "a JSON string"))
}

pub(crate) fn as_array<'a>(json: &'a JsonValue, codec: &str) -> Result<&'a [JsonValue]> {
    json.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| XnbError::invalid_value(codec, "a JSON array"))
}

pub(crate) fn as_object<'a>(json: &'a JsonValue, codec: &str) -> Result<&'a Map<String, JsonValue>> {
    json.as_object().ok_or_else(|| XnbError::invalid_value(codec, "a JSON object"))
}

pub(crate) fn field<'a>(json: &'a JsonValue, codec: &str, name: &'static str) -> Result<&'a JsonValue> {
    as_object(json, codec)?
        .get(name)
        .ok_or_else(|| XnbError::invalid_value(codec, name))
}
