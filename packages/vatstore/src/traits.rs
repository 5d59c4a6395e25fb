//! The core vatstore trait.

use crate::VatstoreError;

/// The reserved value marking a deleted entry.
///
/// Higher layers that cannot observe key liveness (the weak store) mark
/// deletion by overwriting the entry with this sentinel instead of issuing
/// a `delete`. The empty string is never produced by any codec (every
/// encoded value is at least one token), so it is distinguishable both
/// from live values and from absence.
pub const TOMBSTONE: &str = "";

/// Durable string-to-string key-value storage.
///
/// Keys are opaque strings; values are arbitrary serialized strings.
/// Every mutation goes through one `set` call and is observed atomically
/// by the next `get`.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn Vatstore>`.
pub trait Vatstore {
    /// Read the value at a key.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The key does not exist (not an error condition).
    /// * `Ok(Some(value))` - The value at the key.
    /// * `Err(VatstoreError)` - A transport or system error occurred.
    fn get(&self, key: &str) -> Result<Option<String>, VatstoreError>;

    /// Write a value at a key, overwriting any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), VatstoreError>;

    /// Remove a key outright.
    ///
    /// Removing an absent key is a no-op. Layers that need deletion to be
    /// observable as a marker (rather than as absence) use
    /// [`TOMBSTONE`] with [`set`](Vatstore::set) instead.
    fn delete(&mut self, key: &str) -> Result<(), VatstoreError>;
}

// Blanket implementations for references and boxes

impl<T: Vatstore + ?Sized> Vatstore for &mut T {
    fn get(&self, key: &str) -> Result<Option<String>, VatstoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), VatstoreError> {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &str) -> Result<(), VatstoreError> {
        (**self).delete(key)
    }
}

impl<T: Vatstore + ?Sized> Vatstore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, VatstoreError> {
        self.as_ref().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), VatstoreError> {
        self.as_mut().set(key, value)
    }

    fn delete(&mut self, key: &str) -> Result<(), VatstoreError> {
        self.as_mut().delete(key)
    }
}
