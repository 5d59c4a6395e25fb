//! Virtual object manager: a bounded in-memory working set over a
//! durable object population.
//!
//! User code holds [`Representative`]s - ordinary-looking handles onto
//! long-lived "virtual objects" - while the manager keeps only a bounded
//! number of their states resident, fetching and flushing the rest
//! through a [`Vatstore`]. The moving parts:
//!
//! - [`Cache`]: bounded LRU over the live state entries, with
//!   fetch-on-miss and store-on-eviction hooks
//! - [`Kind`] / [`KindDecl`]: class-like declarations minting instances
//!   with a declared state schema
//! - [`WeakStore`]: associative maps that persist bindings for virtual
//!   keys and weakly hold plain in-memory keys
//! - [`VirtualObjectManager`]: the facade wiring it all to a vatstore
//!   and a [`Codec`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use vatobj_core::{KindDecl, Value, VirtualObjectManager, VomConfig};
//! use vatobj_vatstore::MemoryVatstore;
//!
//! let vatstore = Rc::new(RefCell::new(MemoryVatstore::new()));
//! let manager = VirtualObjectManager::new(vatstore, codec, VomConfig::default());
//!
//! let counter = manager.make_kind(KindDecl::new(["count"]).on_initialize(
//!     |state, args| state.set("count", args[0].clone()),
//! ));
//! let c = counter.make_instance(&[Value::Integer(7)])?;
//! assert_eq!(c.get("count")?, Value::Integer(7));
//! ```
//!
//! The manager is single-threaded and cooperative: no operation suspends,
//! and no locks are taken. Re-entrancy is supported - an initializer may
//! mint further instances, and an accessor may evict the entry another
//! accessor is about to touch.

mod cache;
mod codec;
mod error;
mod kind;
mod manager;
mod representative;
mod slot;
mod value;
mod weak_store;

pub use cache::{Cache, CacheStats, FetchFn, InnerSelf, RawData, StoreFn};
pub use codec::Codec;
pub use error::VomError;
pub use kind::{InitFn, Kind, KindDecl, StateData};
pub use manager::{VirtualObjectManager, VomConfig, DEFAULT_CACHE_SIZE};
pub use representative::Representative;
pub use slot::{SlotInfo, SlotParser, SlotTable, SlotType, VatSlotParser};
pub use value::Value;
pub use weak_store::{PlainKey, WeakKey, WeakStore};

// Re-export the store layer for convenience
pub use vatobj_vatstore::{MemoryVatstore, Vatstore, VatstoreError, TOMBSTONE};
