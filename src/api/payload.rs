//! JSON request bodies

use serde::Serialize;
use serde_json::{Map, Value};

/// Serialize a request body, dropping null object members
pub fn to_payload<T: Serialize + ?Sized>(body: &T) -> serde_json::Result<Value> {
    serde_json::to_value(body).map(|value| compact(&value))
}

/// Copy of `value` without null object members, at any depth.
///
/// Nulls inside arrays are kept.
pub fn compact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), compact(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(compact).collect()),
        other => other.clone(),
    }
}
