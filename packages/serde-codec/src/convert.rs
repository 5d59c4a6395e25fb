//! Conversions between Value and serde types.

use serde::de::DeserializeOwned;
use serde::Serialize;
use vatobj_core::{Value, VomError};

/// Convert a Value to a Rust type via serde.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, VomError> {
    let json = value_to_json(&value)?;
    serde_json::from_value(json).map_err(|e| VomError::Decode {
        message: e.to_string(),
    })
}

/// Convert a Rust type to a Value via serde.
pub fn to_value<T: Serialize>(data: &T) -> Result<Value, VomError> {
    let json = serde_json::to_value(data).map_err(|e| VomError::Encode {
        message: e.to_string(),
    })?;
    Ok(json_to_value(json))
}

/// Convert a Value to serde_json::Value.
///
/// Fails for values JSON cannot carry faithfully: the ground form must
/// round-trip exactly, so nothing is rewritten on the way out.
pub fn value_to_json(value: &Value) -> Result<serde_json::Value, VomError> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Integer(i) => Ok(serde_json::Value::Number((*i).into())),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .ok_or_else(|| VomError::Encode {
                message: format!("float {} has no JSON ground form", x),
            }),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Bytes(_) => Err(VomError::Encode {
            message: "binary bytes have no JSON ground form".to_string(),
        }),
        Value::Array(arr) => {
            let elements: Result<Vec<_>, _> = arr.iter().map(value_to_json).collect();
            Ok(serde_json::Value::Array(elements?))
        }
        Value::Map(map) => {
            let mut object = serde_json::Map::new();
            for (k, v) in map {
                object.insert(k.clone(), value_to_json(v)?);
            }
            Ok(serde_json::Value::Object(object))
        }
    }
}

/// Convert serde_json::Value to a Value.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => {
            Value::Array(arr.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(obj) => Value::Map(
            obj.into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}
