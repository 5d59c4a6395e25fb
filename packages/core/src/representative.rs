//! Representatives: the stable handles user code holds.

use std::rc::{Rc, Weak};

use crate::manager::VomShared;
use crate::{Value, VomError};

/// The in-memory handle for one virtual object instance.
///
/// A representative has stable identity for the life of the manager while
/// its state shuttles in and out of the cache arbitrarily many times.
/// Every accessor looks the instance's entry up through the cache, so a
/// detached instance is rehydrated transparently - including between two
/// accesses inside the same user call, should a re-entrant access evict
/// it in the interim.
///
/// Cloning is cheap and shares identity: clones compare equal and count
/// as the same key in a weak store.
#[derive(Clone)]
pub struct Representative {
    inner: Rc<ReprInner>,
}

pub(crate) struct ReprInner {
    shared: Rc<VomShared>,
    instance_key: String,
}

impl Representative {
    pub(crate) fn new(shared: Rc<VomShared>, instance_key: String) -> Self {
        Self {
            inner: Rc::new(ReprInner {
                shared,
                instance_key,
            }),
        }
    }

    /// The durable reference for this instance.
    pub fn vref(&self) -> &str {
        &self.inner.instance_key
    }

    /// Read a property, rehydrating the instance's state if it was
    /// evicted.
    pub fn get(&self, property: &str) -> Result<Value, VomError> {
        let ground = {
            let mut cache = self.inner.shared.cache.borrow_mut();
            let entry = cache.lookup(&self.inner.instance_key)?;
            let raw_data = entry.raw_data().expect("resident entry holds raw data");
            raw_data
                .get(property)
                .cloned()
                .ok_or_else(|| VomError::UnknownProperty {
                    property: property.to_string(),
                })?
        };
        self.inner.shared.codec.unserialize(&ground)
    }

    /// Write a property.
    ///
    /// The value is serialized before the cache is touched: a
    /// serialization failure must not mutate state, and the encoded form
    /// must already exist in case the lookup evicts and rehydrates the
    /// very entry being written.
    pub fn set(&self, property: &str, value: &Value) -> Result<(), VomError> {
        let ground = self
            .inner
            .shared
            .codec
            .serialize(value)
            .map_err(|e| VomError::NonSerializable {
                property: property.to_string(),
                message: e.to_string(),
            })?;

        let mut cache = self.inner.shared.cache.borrow_mut();
        let entry = cache.lookup(&self.inner.instance_key)?;
        let raw_data = entry.raw_data_mut().expect("resident entry holds raw data");
        if !raw_data.contains_key(property) {
            return Err(VomError::UnknownProperty {
                property: property.to_string(),
            });
        }
        raw_data.insert(property.to_string(), ground);
        Ok(())
    }

    /// Identity address, used to key the slot table and weak stores.
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    pub(crate) fn anchor(&self) -> Weak<ReprInner> {
        Rc::downgrade(&self.inner)
    }
}

impl PartialEq for Representative {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Representative {}

impl std::fmt::Debug for Representative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Representative")
            .field("vref", &self.inner.instance_key)
            .finish()
    }
}
