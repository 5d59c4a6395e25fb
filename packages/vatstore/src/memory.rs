//! In-memory vatstore backend.

use std::collections::BTreeMap;

use crate::{Vatstore, VatstoreError};

/// An in-memory vatstore over a `BTreeMap`.
///
/// The map is ordered so that dumps and snapshots are deterministic,
/// which keeps persistence-layer tests stable.
///
/// # Example
///
/// ```rust
/// use vatobj_vatstore::{MemoryVatstore, Vatstore};
///
/// let mut store = MemoryVatstore::new();
/// store.set("key", "value").unwrap();
///
/// // Simulate a host restart: snapshot, then restore into a fresh store.
/// let image = store.snapshot();
/// let restarted = MemoryVatstore::restore(image);
/// assert_eq!(restarted.get("key").unwrap().as_deref(), Some("value"));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryVatstore {
    data: BTreeMap<String, String>,
}

impl MemoryVatstore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out the full key-value image.
    ///
    /// The image round-trips through [`restore`](MemoryVatstore::restore)
    /// to simulate a durable store surviving a host restart.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.data.clone()
    }

    /// Build a store from a previously captured image.
    pub fn restore(image: BTreeMap<String, String>) -> Self {
        Self { data: image }
    }

    /// Number of keys currently present.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterate keys with a given prefix, in order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.data
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_str())
    }
}

impl Vatstore for MemoryVatstore {
    fn get(&self, key: &str) -> Result<Option<String>, VatstoreError> {
        Ok(self.data.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), VatstoreError> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), VatstoreError> {
        self.data.remove(key);
        Ok(())
    }
}
