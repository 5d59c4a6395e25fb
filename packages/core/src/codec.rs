//! The codec seam: user values to and from their ground form.

use crate::{Value, VomError};

/// Codec for converting between [`Value`] and its ground form.
///
/// The ground form is a serialized string, the only shape that crosses
/// the vatstore boundary. This crate never interprets ground forms; it
/// only stores them, compares them against the tombstone sentinel, and
/// hands them back to the codec.
///
/// A codec must round-trip exactly: `unserialize(serialize(v)?)? == v`
/// for every value it accepts. Values with no faithful ground form must
/// be rejected at `serialize` time, never rewritten.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn Codec>`.
pub trait Codec {
    /// Encode one value into its ground form.
    fn serialize(&self, value: &Value) -> Result<String, VomError>;

    /// Decode a ground form back into a value.
    fn unserialize(&self, ground: &str) -> Result<Value, VomError>;
}

impl<T: Codec + ?Sized> Codec for Box<T> {
    fn serialize(&self, value: &Value) -> Result<String, VomError> {
        self.as_ref().serialize(value)
    }

    fn unserialize(&self, ground: &str) -> Result<Value, VomError> {
        self.as_ref().unserialize(ground)
    }
}
