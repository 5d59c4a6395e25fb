//! Vatstore: the durable key-value layer under the virtual object manager.
//!
//! This layer is transport-only: keys and values are opaque strings, and
//! the only semantics are `get`, `set`, and `delete`. Everything above it
//! (object state layout, weak-store key prefixes, tombstones as deletion
//! markers) is defined by higher layers.
//!
//! # Example
//!
//! ```rust
//! use vatobj_vatstore::{MemoryVatstore, Vatstore};
//!
//! let mut store = MemoryVatstore::new();
//! store.set("o+1/1", "{\"count\":\"7\"}").unwrap();
//! assert_eq!(store.get("o+1/1").unwrap().as_deref(), Some("{\"count\":\"7\"}"));
//! ```

mod error;
mod memory;
mod traits;

pub use error::VatstoreError;
pub use memory::MemoryVatstore;
pub use traits::{Vatstore, TOMBSTONE};
