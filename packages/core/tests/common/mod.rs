//! Shared fixtures: a JSON test codec and manager construction helpers.

use std::cell::RefCell;
use std::rc::Rc;

use vatobj_core::{
    Codec, Kind, KindDecl, MemoryVatstore, Value, VirtualObjectManager, VomConfig, VomError,
};

/// Test codec that carries values as JSON strings.
pub struct TestJsonCodec;

impl Codec for TestJsonCodec {
    fn serialize(&self, value: &Value) -> Result<String, VomError> {
        let json = value_to_json(value)?;
        serde_json::to_string(&json).map_err(|e| VomError::Encode {
            message: e.to_string(),
        })
    }

    fn unserialize(&self, ground: &str) -> Result<Value, VomError> {
        let json: serde_json::Value =
            serde_json::from_str(ground).map_err(|e| VomError::Decode {
                message: e.to_string(),
            })?;
        Ok(json_to_value(json))
    }
}

fn value_to_json(value: &Value) -> Result<serde_json::Value, VomError> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Integer(i) => Ok(serde_json::Value::Number((*i).into())),
        Value::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .ok_or_else(|| VomError::Encode {
                message: format!("float {} has no JSON form", x),
            }),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Bytes(_) => Err(VomError::Encode {
            message: "binary bytes have no JSON form".to_string(),
        }),
        Value::Array(arr) => Ok(serde_json::Value::Array(
            arr.iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Map(map) => {
            let mut object = serde_json::Map::new();
            for (k, v) in map {
                object.insert(k.clone(), value_to_json(v)?);
            }
            Ok(serde_json::Value::Object(object))
        }
    }
}

fn json_to_value(json: serde_json::Value) -> Value {
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

/// A manager over a fresh in-memory vatstore, which is also returned so
/// tests can inspect what was persisted.
pub fn new_manager(cache_size: usize) -> (Rc<RefCell<MemoryVatstore>>, VirtualObjectManager) {
    let vatstore = Rc::new(RefCell::new(MemoryVatstore::new()));
    let manager = VirtualObjectManager::new(
        vatstore.clone(),
        Rc::new(TestJsonCodec),
        VomConfig { cache_size },
    );
    (vatstore, manager)
}

/// A kind with one `count` field initialized from the first argument.
pub fn counter_kind(manager: &VirtualObjectManager) -> Kind {
    manager.make_kind(KindDecl::new(["count"]).on_initialize(|state, args| {
        state.set(
            "count",
            args.first().cloned().unwrap_or(Value::Integer(0)),
        )
    }))
}
