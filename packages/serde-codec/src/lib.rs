//! JSON ground-form codec for the virtual object manager.
//!
//! The manager's core is codec-agnostic; this package supplies the
//! production codec: values are serialized to JSON strings at the
//! vatstore boundary and parsed back on rehydration. Values JSON cannot
//! carry faithfully (non-finite floats, binary bytes) are rejected at
//! serialize time rather than silently rewritten.

mod codec;
mod convert;

pub use codec::JsonCodec;
pub use convert::{from_value, json_to_value, to_value, value_to_json};
