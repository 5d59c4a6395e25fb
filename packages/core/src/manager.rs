//! The virtual object manager facade.
//!
//! Wires the cache's fetch/store hooks to a vatstore, owns the kind
//! registry and the slot table, and hands out weak stores, kind makers,
//! and representatives.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vatobj_vatstore::Vatstore;

use crate::cache::{Cache, CacheStats, FetchFn, RawData, StoreFn};
use crate::kind::{Kind, KindDecl};
use crate::slot::{SlotParser, SlotTable, VatSlotParser};
use crate::weak_store::WeakStore;
use crate::{Codec, Representative, VomError};

/// Default bound on resident instances.
pub const DEFAULT_CACHE_SIZE: usize = 100;

/// Manager configuration, embeddable in a host config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VomConfig {
    /// How many instances may hold live state in memory at once.
    pub cache_size: usize,
}

impl Default for VomConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
        }
    }
}

/// State shared by the facade and everything it hands out.
pub(crate) struct VomShared {
    pub(crate) cache: RefCell<Cache>,
    pub(crate) vatstore: Rc<RefCell<dyn Vatstore>>,
    pub(crate) codec: Rc<dyn Codec>,
    pub(crate) slot_parser: Rc<dyn SlotParser>,
    pub(crate) slot_table: RefCell<SlotTable>,
    pub(crate) kinds: RefCell<BTreeMap<u64, KindInfo>>,
    pub(crate) next_kind_id: Cell<u64>,
    pub(crate) next_store_id: Cell<u64>,
}

/// What the registry keeps per kind: enough to reanimate instances.
pub(crate) struct KindInfo {
    pub(crate) fields: Rc<[String]>,
}

/// The virtual object manager.
///
/// User code holds [`Representative`]s onto a persistent object graph;
/// the manager keeps only a bounded working set of their state resident,
/// with the remainder in the vatstore.
///
/// All operations are single-threaded and run to completion; re-entrant
/// calls (an initializer minting further instances, an accessor evicting
/// the entry another accessor is about to touch) are legal.
pub struct VirtualObjectManager {
    shared: Rc<VomShared>,
}

impl VirtualObjectManager {
    /// Create a manager over a vatstore with the standard slot grammar.
    pub fn new(
        vatstore: Rc<RefCell<dyn Vatstore>>,
        codec: Rc<dyn Codec>,
        config: VomConfig,
    ) -> Self {
        Self::with_slot_parser(vatstore, codec, Rc::new(VatSlotParser), config)
    }

    /// Create a manager with a custom slot parser.
    pub fn with_slot_parser(
        vatstore: Rc<RefCell<dyn Vatstore>>,
        codec: Rc<dyn Codec>,
        slot_parser: Rc<dyn SlotParser>,
        config: VomConfig,
    ) -> Self {
        let fetch: FetchFn = {
            let vatstore = vatstore.clone();
            Box::new(move |instance_key: &str| -> Result<RawData, VomError> {
                let stored = vatstore.borrow().get(instance_key)?;
                let stored = stored.ok_or_else(|| VomError::MissingState {
                    instance_key: instance_key.to_string(),
                })?;
                serde_json::from_str(&stored).map_err(|e| VomError::Decode {
                    message: format!("bad state record for {}: {}", instance_key, e),
                })
            })
        };
        let store: StoreFn = {
            let vatstore = vatstore.clone();
            Box::new(
                move |instance_key: &str, raw_data: &RawData| -> Result<(), VomError> {
                    let encoded = serde_json::to_string(raw_data).map_err(|e| VomError::Encode {
                        message: format!("bad state record for {}: {}", instance_key, e),
                    })?;
                    vatstore.borrow_mut().set(instance_key, &encoded)?;
                    Ok(())
                },
            )
        };

        Self {
            shared: Rc::new(VomShared {
                cache: RefCell::new(Cache::new(config.cache_size, fetch, store)),
                vatstore,
                codec,
                slot_parser,
                slot_table: RefCell::new(SlotTable::new()),
                kinds: RefCell::new(BTreeMap::new()),
                next_kind_id: Cell::new(1),
                next_store_id: Cell::new(1),
            }),
        }
    }

    /// Register a kind and return its instance maker.
    pub fn make_kind(&self, decl: KindDecl) -> Kind {
        let kind_id = self.shared.next_kind_id.get();
        self.shared.next_kind_id.set(kind_id + 1);

        let (fields, init) = decl.into_parts();
        self.shared.kinds.borrow_mut().insert(
            kind_id,
            KindInfo {
                fields: fields.clone(),
            },
        );
        debug!(kind_id, "registered kind");
        Kind::new(self.shared.clone(), kind_id, fields, init)
    }

    /// Create a weak store whose error messages are tagged with `key_name`.
    pub fn make_weak_store(&self, key_name: &str) -> WeakStore {
        let store_id = self.shared.next_store_id.get();
        self.shared.next_store_id.set(store_id + 1);
        debug!(store_id, key_name, "created weak store");
        WeakStore::new(self.shared.clone(), store_id, key_name)
    }

    /// Evict every resident instance to the vatstore.
    ///
    /// Fails with [`VomError::CacheOverflow`] if an initialization is in
    /// progress, since such state is not yet in storable shape.
    pub fn flush_cache(&self) -> Result<(), VomError> {
        self.shared.cache.borrow_mut().flush()
    }

    /// Produce a representative for an existing instance from its vref.
    ///
    /// Returns the already-bound representative when one exists;
    /// otherwise fetches the instance's state and mints a fresh one.
    pub fn representative_for(&self, vref: &str) -> Result<Representative, VomError> {
        if let Some(rep) = self.shared.slot_table.borrow().representative_for(vref) {
            return Ok(rep);
        }

        let info = self.shared.slot_parser.parse(vref)?;
        if !info.is_virtual() {
            return Err(VomError::InvalidSlot {
                slot: vref.to_string(),
                message: "not a virtual object reference".to_string(),
            });
        }
        if !self.shared.kinds.borrow().contains_key(&info.id) {
            return Err(VomError::UnknownKind { kind_id: info.id });
        }

        self.shared.cache.borrow_mut().lookup(vref)?;
        let rep = Representative::new(self.shared.clone(), vref.to_string());
        self.shared.slot_table.borrow_mut().bind(&rep, vref);
        Ok(rep)
    }

    /// The declared state fields of a registered kind.
    pub fn kind_fields(&self, kind_id: u64) -> Option<Vec<String>> {
        self.shared
            .kinds
            .borrow()
            .get(&kind_id)
            .map(|info| info.fields.to_vec())
    }

    /// Counters describing cache traffic so far.
    pub fn cache_stats(&self) -> CacheStats {
        self.shared.cache.borrow().stats()
    }

    /// Number of instances currently holding live state.
    pub fn resident_count(&self) -> usize {
        self.shared.cache.borrow().len()
    }
}
