//! Weak stores: associative maps keyed by object identity.
//!
//! A weak store holds values against two flavors of key. Virtual object
//! representatives are persisted: the binding lives in the vatstore under
//! a store-qualified key and survives eviction and host restarts. Plain
//! in-memory keys are held weakly: once the key's last handle is dropped,
//! the binding counts as absent.

use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::trace;
use vatobj_vatstore::TOMBSTONE;

use crate::manager::VomShared;
use crate::representative::ReprInner;
use crate::slot::SlotType;
use crate::{Representative, Value, VomError};

/// An opaque identity token usable as a non-virtual weak-store key.
///
/// Cloning shares identity; a fresh call to [`PlainKey::new`] makes a
/// distinct key.
#[derive(Clone)]
pub struct PlainKey {
    inner: Rc<()>,
}

impl PlainKey {
    pub fn new() -> Self {
        Self { inner: Rc::new(()) }
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }
}

impl Default for PlainKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PlainKey {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for PlainKey {}

impl std::fmt::Debug for PlainKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PlainKey").field(&self.addr()).finish()
    }
}

/// A key accepted by a weak store.
#[derive(Clone, Debug)]
pub enum WeakKey {
    Virtual(Representative),
    Plain(PlainKey),
}

impl WeakKey {
    fn addr(&self) -> usize {
        match self {
            WeakKey::Virtual(rep) => rep.addr(),
            WeakKey::Plain(key) => key.addr(),
        }
    }

    fn anchor(&self) -> Anchor {
        match self {
            WeakKey::Virtual(rep) => Anchor::Repr(rep.anchor()),
            WeakKey::Plain(key) => Anchor::Plain(Rc::downgrade(&key.inner)),
        }
    }
}

impl From<&Representative> for WeakKey {
    fn from(rep: &Representative) -> Self {
        WeakKey::Virtual(rep.clone())
    }
}

impl From<&PlainKey> for WeakKey {
    fn from(key: &PlainKey) -> Self {
        WeakKey::Plain(key.clone())
    }
}

/// Weak hold on a key's backing allocation, so a dead key's binding can
/// be recognized and dropped.
enum Anchor {
    Plain(Weak<()>),
    Repr(Weak<ReprInner>),
}

impl Anchor {
    fn alive(&self) -> bool {
        match self {
            Anchor::Plain(w) => w.strong_count() > 0,
            Anchor::Repr(w) => w.strong_count() > 0,
        }
    }
}

struct PlainEntry {
    anchor: Anchor,
    value: Value,
}

/// A map-like store keyed by virtual object identity.
///
/// Created by the manager; each store has its own identity (`store_id`)
/// and its own in-memory map for non-virtual keys, while virtual-key
/// bindings share the vatstore.
///
/// Known limitation: virtual keys are not weakly held. Once bound, the
/// vatstore entry persists indefinitely, because nothing can observe that
/// the representative has become unreferenced.
pub struct WeakStore {
    shared: Rc<VomShared>,
    store_id: u64,
    key_name: String,
    plain: HashMap<usize, PlainEntry>,
}

impl WeakStore {
    pub(crate) fn new(shared: Rc<VomShared>, store_id: u64, key_name: &str) -> Self {
        Self {
            shared,
            store_id,
            key_name: key_name.to_string(),
            plain: HashMap::new(),
        }
    }

    /// This store's identity within its manager.
    pub fn store_id(&self) -> u64 {
        self.store_id
    }

    /// The tag used in this store's error messages.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Number of plain-key bindings whose key is still alive.
    pub fn live_plain_count(&self) -> usize {
        self.plain
            .values()
            .filter(|entry| entry.anchor.alive())
            .count()
    }

    /// Whether a key currently has a binding.
    pub fn has(&self, key: &WeakKey) -> Result<bool, VomError> {
        match self.persisted_key(key)? {
            Some(vkey) => Ok(self.live_persisted(&vkey)?.is_some()),
            None => Ok(self.live_plain(key).is_some()),
        }
    }

    /// Create a binding. Fails if the key is already bound.
    pub fn init(&mut self, key: &WeakKey, value: &Value) -> Result<(), VomError> {
        match self.persisted_key(key)? {
            Some(vkey) => {
                if self.live_persisted(&vkey)?.is_some() {
                    return Err(self.already_registered());
                }
                let ground = self.shared.codec.serialize(value)?;
                self.shared.vatstore.borrow_mut().set(&vkey, &ground)?;
                trace!(vkey = %vkey, "weak store bound virtual key");
            }
            None => {
                if self.live_plain(key).is_some() {
                    return Err(self.already_registered());
                }
                self.plain.insert(
                    key.addr(),
                    PlainEntry {
                        anchor: key.anchor(),
                        value: value.clone(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Read a binding. Fails if the key is not bound.
    pub fn get(&self, key: &WeakKey) -> Result<Value, VomError> {
        match self.persisted_key(key)? {
            Some(vkey) => {
                let ground = self.live_persisted(&vkey)?.ok_or_else(|| self.not_found())?;
                self.shared.codec.unserialize(&ground)
            }
            None => match self.live_plain(key) {
                Some(entry) => Ok(entry.value.clone()),
                None => Err(self.not_found()),
            },
        }
    }

    /// Overwrite an existing binding. Fails if the key is not bound.
    pub fn set(&mut self, key: &WeakKey, value: &Value) -> Result<(), VomError> {
        match self.persisted_key(key)? {
            Some(vkey) => {
                if self.live_persisted(&vkey)?.is_none() {
                    return Err(self.not_found());
                }
                let ground = self.shared.codec.serialize(value)?;
                self.shared.vatstore.borrow_mut().set(&vkey, &ground)?;
            }
            None => {
                self.purge_if_dead(key);
                match self.plain.get_mut(&key.addr()) {
                    Some(entry) => entry.value = value.clone(),
                    None => return Err(self.not_found()),
                }
            }
        }
        Ok(())
    }

    /// Remove a binding. Fails if the key is not bound.
    ///
    /// A virtual key's vatstore entry is overwritten with the tombstone
    /// sentinel rather than deleted; every operation on this store treats
    /// a tombstoned entry as absent, so the key may be bound again.
    pub fn delete(&mut self, key: &WeakKey) -> Result<(), VomError> {
        match self.persisted_key(key)? {
            Some(vkey) => {
                if self.live_persisted(&vkey)?.is_none() {
                    return Err(self.not_found());
                }
                self.shared.vatstore.borrow_mut().set(&vkey, TOMBSTONE)?;
                trace!(vkey = %vkey, "weak store tombstoned virtual key");
            }
            None => {
                self.purge_if_dead(key);
                if self.plain.remove(&key.addr()).is_none() {
                    return Err(self.not_found());
                }
            }
        }
        Ok(())
    }

    /// The vatstore key for a virtual key, or `None` for keys that live
    /// in the in-memory map.
    fn persisted_key(&self, key: &WeakKey) -> Result<Option<String>, VomError> {
        let slot = match key {
            WeakKey::Virtual(rep) => self.shared.slot_table.borrow().slot_for(rep),
            WeakKey::Plain(_) => None,
        };
        let slot = match slot {
            Some(slot) => slot,
            None => return Ok(None),
        };
        let info = self.shared.slot_parser.parse(&slot)?;
        if info.slot_type == SlotType::Object && info.is_virtual() {
            Ok(Some(format!("ws{}.{}", self.store_id, slot)))
        } else {
            Ok(None)
        }
    }

    fn live_persisted(&self, vkey: &str) -> Result<Option<String>, VomError> {
        let stored = self.shared.vatstore.borrow().get(vkey)?;
        Ok(stored.filter(|v| v.as_str() != TOMBSTONE))
    }

    fn live_plain(&self, key: &WeakKey) -> Option<&PlainEntry> {
        self.plain
            .get(&key.addr())
            .filter(|entry| entry.anchor.alive())
    }

    /// Drop a stale binding whose key allocation was reused.
    fn purge_if_dead(&mut self, key: &WeakKey) {
        let dead = self
            .plain
            .get(&key.addr())
            .map(|entry| !entry.anchor.alive())
            .unwrap_or(false);
        if dead {
            self.plain.remove(&key.addr());
        }
    }

    fn already_registered(&self) -> VomError {
        VomError::AlreadyRegistered {
            key_name: self.key_name.clone(),
        }
    }

    fn not_found(&self) -> VomError {
        VomError::NotFound {
            key_name: self.key_name.clone(),
        }
    }
}

impl std::fmt::Debug for WeakStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakStore")
            .field("store_id", &self.store_id)
            .field("key_name", &self.key_name)
            .field("plain_entries", &self.plain.len())
            .finish()
    }
}
