//! JSON codec implementation.

use vatobj_core::{Codec, Value, VomError};

use crate::convert::{json_to_value, value_to_json};

/// The JSON ground-form codec.
///
/// This is the default codec for most hosts: every value becomes one JSON
/// string at the vatstore boundary.
///
/// # Example
///
/// ```rust
/// use vatobj_core::{Codec, Value};
/// use vatobj_serde_codec::JsonCodec;
///
/// let codec = JsonCodec;
/// let ground = codec.serialize(&Value::Integer(7)).unwrap();
/// assert_eq!(ground, "7");
/// assert_eq!(codec.unserialize(&ground).unwrap(), Value::Integer(7));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
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
