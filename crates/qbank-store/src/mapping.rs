use serde::Serialize;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// The value held by a mapping-valued namespace: sub-key -> JSON value.
pub type Mapping = serde_json::Map<String, Value>;

/// Decode persisted text as a mapping.
///
/// Malformed JSON and JSON that is not an object are both reported as
/// [`StoreError::Corrupted`] against `key`.
pub fn parse_mapping(key: &str, text: &str) -> StoreResult<Mapping> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Corrupted {
            key: key.to_string(),
            reason: format!("expected a JSON object, found {}", kind_of(&other)),
        }),
        Err(e) => Err(StoreError::Corrupted {
            key: key.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Convert a caller value into JSON.
pub fn to_value<T: Serialize>(value: T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Serialize a JSON value to the text form that is persisted and sent.
pub fn to_text(value: &Value) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
