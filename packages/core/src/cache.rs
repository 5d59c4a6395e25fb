//! The bounded LRU cache of inner selves.
//!
//! Each virtual object instance has at most one *inner self*: the cache
//! entry owning the live copy of its state. The cache keeps a bounded
//! number of them resident. A miss pulls state in through the `fetch`
//! hook; eviction pushes the victim's state out through the `store` hook.
//! Entries whose initialization is still in progress are rotated past the
//! eviction window instead of being written out, because their state is
//! not yet in storable shape.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, trace};

use crate::VomError;

/// One instance's state in ground form: property name to encoded value.
pub type RawData = BTreeMap<String, String>;

/// Pulls an instance's state from storage on a cache miss.
pub type FetchFn = Box<dyn Fn(&str) -> Result<RawData, VomError>>;

/// Pushes an instance's state to storage on eviction.
pub type StoreFn = Box<dyn Fn(&str, &RawData) -> Result<(), VomError>>;

/// The cache entry owning an instance's live state.
///
/// An entry is in the `live_table` and the LRU list exactly once, or in
/// neither. The LRU links are the neighbor instance keys; they are only
/// meaningful while the entry is resident.
pub struct InnerSelf {
    instance_key: String,
    raw_data: Option<RawData>,
    initializing: bool,
    prev: Option<String>,
    next: Option<String>,
}

impl InnerSelf {
    /// A resident entry holding fetched or committed state.
    pub(crate) fn resident(instance_key: &str, raw_data: RawData) -> Self {
        Self {
            instance_key: instance_key.to_string(),
            raw_data: Some(raw_data),
            initializing: false,
            prev: None,
            next: None,
        }
    }

    /// A placeholder for an instance whose initialization is in progress.
    ///
    /// It occupies a slot (so the instance is protected from the moment
    /// minting starts) but holds no committed state yet.
    pub(crate) fn initializing(instance_key: &str) -> Self {
        Self {
            instance_key: instance_key.to_string(),
            raw_data: Some(RawData::new()),
            initializing: true,
            prev: None,
            next: None,
        }
    }

    pub fn instance_key(&self) -> &str {
        &self.instance_key
    }

    pub fn is_initializing(&self) -> bool {
        self.initializing
    }

    pub(crate) fn raw_data(&self) -> Option<&RawData> {
        self.raw_data.as_ref()
    }

    pub(crate) fn raw_data_mut(&mut self) -> Option<&mut RawData> {
        self.raw_data.as_mut()
    }

    /// Install committed state and end the initialization window.
    pub(crate) fn install(&mut self, raw_data: RawData) {
        self.raw_data = Some(raw_data);
        self.initializing = false;
    }
}

impl std::fmt::Debug for InnerSelf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InnerSelf")
            .field("instance_key", &self.instance_key)
            .field("resident", &self.raw_data.is_some())
            .field("initializing", &self.initializing)
            .finish()
    }
}

/// Monotonic counters describing cache traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the live table.
    pub hits: u64,
    /// Lookups that went to storage.
    pub misses: u64,
    /// Entries written out and dropped by eviction.
    pub evictions: u64,
    /// Initializing tails rotated past the eviction window.
    pub refreshes: u64,
}

/// Bounded LRU over inner selves with two-sided storage hooks.
pub struct Cache {
    size: usize,
    live_table: HashMap<String, InnerSelf>,
    lru_head: Option<String>,
    lru_tail: Option<String>,
    fetch: FetchFn,
    store: StoreFn,
    stats: CacheStats,
}

impl Cache {
    pub fn new(size: usize, fetch: FetchFn, store: StoreFn) -> Self {
        Self {
            size,
            live_table: HashMap::new(),
            lru_head: None,
            lru_tail: None,
            fetch,
            store,
            stats: CacheStats::default(),
        }
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.live_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_table.is_empty()
    }

    pub fn contains(&self, instance_key: &str) -> bool {
        self.live_table.contains_key(instance_key)
    }

    /// The most recently used instance key.
    pub fn mru(&self) -> Option<&str> {
        self.lru_head.as_deref()
    }

    /// The least recently used instance key.
    pub fn lru(&self) -> Option<&str> {
        self.lru_tail.as_deref()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Find an instance's entry, fetching it from storage on a miss.
    ///
    /// The returned entry is at the head of the LRU list.
    pub fn lookup(&mut self, instance_key: &str) -> Result<&mut InnerSelf, VomError> {
        if self.live_table.contains_key(instance_key) {
            self.stats.hits += 1;
            self.refresh(instance_key);
        } else {
            self.stats.misses += 1;
            trace!(instance_key, "cache miss, fetching");
            let raw_data = (self.fetch)(instance_key)?;
            self.remember(InnerSelf::resident(instance_key, raw_data))?;
        }
        Ok(self
            .live_table
            .get_mut(instance_key)
            .expect("entry is live after refresh or remember"))
    }

    /// Insert an entry under LRU discipline. A no-op if the instance is
    /// already resident.
    ///
    /// Room is made first, so the incoming entry lands within the bound
    /// and is never itself an eviction candidate. Inserting while other
    /// initializations are in progress works: `make_room` rotates
    /// initializing tails instead of evicting them.
    pub fn remember(&mut self, inner: InnerSelf) -> Result<(), VomError> {
        if self.live_table.contains_key(&inner.instance_key) {
            return Ok(());
        }
        self.make_room()?;
        let key = inner.instance_key.clone();
        self.live_table.insert(key.clone(), inner);
        self.push_head(&key);
        Ok(())
    }

    /// Move a resident entry to the head of the LRU list. A no-op if it
    /// is already the head.
    pub fn refresh(&mut self, instance_key: &str) {
        if self.lru_head.as_deref() == Some(instance_key) {
            return;
        }
        if !self.live_table.contains_key(instance_key) {
            return;
        }
        self.unlink(instance_key);
        self.push_head(instance_key);
    }

    /// Evict entries from the tail until the next insertion fits.
    ///
    /// Initializing tails are rotated back to the head instead of being
    /// evicted; if every resident slot is occupied by an in-progress
    /// initialization the rotation cannot converge and the call fails
    /// with [`VomError::CacheOverflow`].
    fn make_room(&mut self) -> Result<(), VomError> {
        let mut refresh_count = 0usize;
        while self.live_table.len() >= self.size && !self.live_table.is_empty() {
            let tail_key = match self.lru_tail.clone() {
                Some(key) => key,
                None => break,
            };

            let tail_initializing = self
                .live_table
                .get(&tail_key)
                .map(|entry| entry.initializing)
                .unwrap_or(false);
            if tail_initializing {
                refresh_count += 1;
                if refresh_count > self.size {
                    debug!(size = self.size, "cache overflow: all tails initializing");
                    return Err(VomError::CacheOverflow);
                }
                self.stats.refreshes += 1;
                self.refresh(&tail_key);
                continue;
            }

            // Write the victim out before dropping it, so a storage
            // failure leaves the entry resident.
            {
                let entry = self
                    .live_table
                    .get(&tail_key)
                    .expect("tail key is in the live table");
                let raw_data = entry
                    .raw_data
                    .as_ref()
                    .expect("resident entry holds raw data");
                (self.store)(&tail_key, raw_data)?;
            }
            self.unlink(&tail_key);
            self.live_table.remove(&tail_key);
            self.stats.evictions += 1;
            trace!(instance_key = %tail_key, "evicted to storage");
        }
        Ok(())
    }

    /// Evict every resident entry to storage.
    pub fn flush(&mut self) -> Result<(), VomError> {
        let saved_size = self.size;
        self.size = 0;
        let result = self.make_room();
        self.size = saved_size;
        if result.is_ok() {
            debug!("cache flushed");
        }
        result
    }

    /// Drop an entry without writing it out.
    ///
    /// Used to unwind a failed initialization; an abandoned initializing
    /// entry would otherwise occupy a slot forever.
    pub fn forget(&mut self, instance_key: &str) {
        if self.live_table.contains_key(instance_key) {
            self.unlink(instance_key);
            self.live_table.remove(instance_key);
        }
    }

    fn push_head(&mut self, instance_key: &str) {
        let old_head = self.lru_head.replace(instance_key.to_string());
        if let Some(ref head_key) = old_head {
            if let Some(head) = self.live_table.get_mut(head_key) {
                head.prev = Some(instance_key.to_string());
            }
        } else {
            self.lru_tail = Some(instance_key.to_string());
        }
        if let Some(entry) = self.live_table.get_mut(instance_key) {
            entry.prev = None;
            entry.next = old_head;
        }
    }

    fn unlink(&mut self, instance_key: &str) {
        let (prev, next) = match self.live_table.get_mut(instance_key) {
            Some(entry) => (entry.prev.take(), entry.next.take()),
            None => return,
        };
        match prev {
            Some(ref prev_key) => {
                if let Some(entry) = self.live_table.get_mut(prev_key) {
                    entry.next = next.clone();
                }
            }
            None => self.lru_head = next.clone(),
        }
        match next {
            Some(ref next_key) => {
                if let Some(entry) = self.live_table.get_mut(next_key) {
                    entry.prev = prev;
                }
            }
            None => self.lru_tail = prev,
        }
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("size", &self.size)
            .field("resident", &self.live_table.len())
            .field("mru", &self.lru_head)
            .field("lru", &self.lru_tail)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// A cache over a shared map, with observable fetch/store counters.
    struct Harness {
        cache: Cache,
        backing: Rc<RefCell<BTreeMap<String, RawData>>>,
        fetches: Rc<RefCell<Vec<String>>>,
        stores: Rc<RefCell<Vec<String>>>,
    }

    fn harness(size: usize) -> Harness {
        let backing: Rc<RefCell<BTreeMap<String, RawData>>> = Rc::new(RefCell::new(BTreeMap::new()));
        let fetches: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let stores: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

        let fetch: FetchFn = {
            let backing = backing.clone();
            let fetches = fetches.clone();
            Box::new(move |key: &str| -> Result<RawData, VomError> {
                fetches.borrow_mut().push(key.to_string());
                backing
                    .borrow()
                    .get(key)
                    .cloned()
                    .ok_or_else(|| VomError::MissingState {
                        instance_key: key.to_string(),
                    })
            })
        };
        let store: StoreFn = {
            let backing = backing.clone();
            let stores = stores.clone();
            Box::new(move |key: &str, raw: &RawData| -> Result<(), VomError> {
                stores.borrow_mut().push(key.to_string());
                backing.borrow_mut().insert(key.to_string(), raw.clone());
                Ok(())
            })
        };

        Harness {
            cache: Cache::new(size, fetch, store),
            backing,
            fetches,
            stores,
        }
    }

    fn raw(prop: &str, ground: &str) -> RawData {
        let mut data = RawData::new();
        data.insert(prop.to_string(), ground.to_string());
        data
    }

    fn seed(h: &Harness, key: &str, ground: &str) {
        h.backing
            .borrow_mut()
            .insert(key.to_string(), raw("p", ground));
    }

    #[test]
    fn lookup_fetches_on_miss_and_hits_after() {
        let mut h = harness(2);
        seed(&h, "o+1/1", "a");

        let entry = h.cache.lookup("o+1/1").unwrap();
        assert_eq!(entry.raw_data().unwrap().get("p").unwrap(), "a");
        assert_eq!(h.fetches.borrow().len(), 1);

        h.cache.lookup("o+1/1").unwrap();
        assert_eq!(h.fetches.borrow().len(), 1, "second lookup is a hit");

        let stats = h.cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn lookup_of_unknown_key_fails() {
        let mut h = harness(2);
        let result = h.cache.lookup("o+1/9");
        assert!(matches!(result, Err(VomError::MissingState { .. })));
        assert!(h.cache.is_empty(), "failed fetch leaves nothing resident");
    }

    #[test]
    fn lookup_moves_entry_to_head() {
        let mut h = harness(3);
        seed(&h, "o+1/1", "a");
        seed(&h, "o+1/2", "b");

        h.cache.lookup("o+1/1").unwrap();
        h.cache.lookup("o+1/2").unwrap();
        assert_eq!(h.cache.mru(), Some("o+1/2"));
        assert_eq!(h.cache.lru(), Some("o+1/1"));

        h.cache.lookup("o+1/1").unwrap();
        assert_eq!(h.cache.mru(), Some("o+1/1"));
        assert_eq!(h.cache.lru(), Some("o+1/2"));
    }

    #[test]
    fn residency_stays_within_size() {
        let mut h = harness(2);
        for i in 1..=5 {
            seed(&h, &format!("o+1/{}", i), "x");
        }
        for i in 1..=5 {
            h.cache.lookup(&format!("o+1/{}", i)).unwrap();
            assert!(h.cache.len() <= 2);
        }
        assert_eq!(h.cache.stats().evictions, 3);
    }

    #[test]
    fn eviction_follows_lru_order() {
        let mut h = harness(2);
        seed(&h, "o+1/1", "a");
        seed(&h, "o+1/2", "b");
        seed(&h, "o+1/3", "c");

        h.cache.lookup("o+1/1").unwrap();
        h.cache.lookup("o+1/2").unwrap();
        // Touch 1 so 2 becomes the LRU victim.
        h.cache.lookup("o+1/1").unwrap();
        h.cache.lookup("o+1/3").unwrap();

        assert!(h.cache.contains("o+1/1"));
        assert!(!h.cache.contains("o+1/2"));
        assert_eq!(h.stores.borrow().as_slice(), &["o+1/2".to_string()]);
    }

    #[test]
    fn size_one_alternation_evicts_and_restores() {
        let mut h = harness(1);
        seed(&h, "o+1/1", "a");
        seed(&h, "o+1/2", "b");

        for _ in 0..3 {
            let entry = h.cache.lookup("o+1/1").unwrap();
            assert_eq!(entry.raw_data().unwrap().get("p").unwrap(), "a");
            let entry = h.cache.lookup("o+1/2").unwrap();
            assert_eq!(entry.raw_data().unwrap().get("p").unwrap(), "b");
        }

        // Every access after the first round is a miss: each lookup
        // evicts the other entry.
        assert_eq!(h.cache.stats().misses, 6);
        assert_eq!(h.cache.stats().hits, 0);
        assert!(h.cache.stats().evictions >= 5);
    }

    #[test]
    fn mutations_survive_a_round_trip() {
        let mut h = harness(1);
        seed(&h, "o+1/1", "a");
        seed(&h, "o+1/2", "b");

        h.cache
            .lookup("o+1/1")
            .unwrap()
            .raw_data_mut()
            .unwrap()
            .insert("p".to_string(), "a2".to_string());
        // Evict 1 by pulling in 2, then read 1 back.
        h.cache.lookup("o+1/2").unwrap();
        let entry = h.cache.lookup("o+1/1").unwrap();
        assert_eq!(entry.raw_data().unwrap().get("p").unwrap(), "a2");
    }

    #[test]
    fn initializing_tail_is_rotated_not_evicted() {
        let mut h = harness(2);
        seed(&h, "o+1/1", "a");
        seed(&h, "o+1/2", "b");

        h.cache.remember(InnerSelf::initializing("o+9/1")).unwrap();
        h.cache.lookup("o+1/1").unwrap();
        // The initializing entry is now the tail; pulling in another
        // entry must rotate it and evict the plain entry instead.
        h.cache.lookup("o+1/2").unwrap();

        assert!(h.cache.contains("o+9/1"));
        assert!(!h.cache.contains("o+1/1"));
        assert_eq!(h.stores.borrow().as_slice(), &["o+1/1".to_string()]);
        assert!(h.cache.stats().refreshes >= 1);
    }

    #[test]
    fn all_tails_initializing_overflows() {
        let mut h = harness(2);
        h.cache.remember(InnerSelf::initializing("o+9/1")).unwrap();
        h.cache.remember(InnerSelf::initializing("o+9/2")).unwrap();

        let result = h.cache.remember(InnerSelf::initializing("o+9/3"));
        assert!(matches!(result, Err(VomError::CacheOverflow)));
        // The overflowing entry was not inserted.
        assert_eq!(h.cache.len(), 2);
        assert!(h.stores.borrow().is_empty(), "nothing was written out");
    }

    #[test]
    fn flush_stores_everything_and_empties() {
        let mut h = harness(4);
        for i in 1..=3 {
            seed(&h, &format!("o+1/{}", i), "x");
            h.cache.lookup(&format!("o+1/{}", i)).unwrap();
        }

        h.cache.flush().unwrap();
        assert!(h.cache.is_empty());
        assert_eq!(h.cache.mru(), None);
        assert_eq!(h.cache.lru(), None);
        assert_eq!(h.stores.borrow().len(), 3);

        // The cache still works after a flush.
        h.cache.lookup("o+1/1").unwrap();
        assert_eq!(h.cache.len(), 1);
    }

    #[test]
    fn flush_with_initializing_entry_overflows() {
        let mut h = harness(2);
        h.cache.remember(InnerSelf::initializing("o+9/1")).unwrap();
        assert!(matches!(h.cache.flush(), Err(VomError::CacheOverflow)));
    }

    #[test]
    fn remember_is_idempotent() {
        let mut h = harness(2);
        seed(&h, "o+1/1", "a");
        h.cache.lookup("o+1/1").unwrap();

        h.cache
            .remember(InnerSelf::resident("o+1/1", raw("p", "other")))
            .unwrap();
        let entry = h.cache.lookup("o+1/1").unwrap();
        assert_eq!(
            entry.raw_data().unwrap().get("p").unwrap(),
            "a",
            "existing entry wins"
        );
        assert_eq!(h.cache.len(), 1);
    }

    #[test]
    fn forget_drops_without_storing() {
        let mut h = harness(2);
        h.cache.remember(InnerSelf::initializing("o+9/1")).unwrap();
        h.cache.forget("o+9/1");

        assert!(h.cache.is_empty());
        assert_eq!(h.cache.mru(), None);
        assert!(h.stores.borrow().is_empty());

        // Forgetting an absent key is a no-op.
        h.cache.forget("o+9/1");
    }

    #[test]
    fn forget_middle_entry_keeps_list_consistent() {
        let mut h = harness(3);
        for i in 1..=3 {
            seed(&h, &format!("o+1/{}", i), "x");
            h.cache.lookup(&format!("o+1/{}", i)).unwrap();
        }

        h.cache.forget("o+1/2");
        assert_eq!(h.cache.mru(), Some("o+1/3"));
        assert_eq!(h.cache.lru(), Some("o+1/1"));

        // Walk both neighbors through a refresh to exercise the links.
        h.cache.lookup("o+1/1").unwrap();
        assert_eq!(h.cache.mru(), Some("o+1/1"));
        assert_eq!(h.cache.lru(), Some("o+1/3"));
    }

    proptest! {
        /// Residency stays bounded and the last-touched key is the MRU,
        /// for arbitrary access sequences over a small key space.
        #[test]
        fn random_access_keeps_invariants(
            size in 1usize..5,
            accesses in proptest::collection::vec(0u8..8, 1..60),
        ) {
            let mut h = harness(size);
            for i in 0..8 {
                seed(&h, &format!("o+1/{}", i), "x");
            }
            for idx in accesses {
                let key = format!("o+1/{}", idx);
                h.cache.lookup(&key).unwrap();
                prop_assert!(h.cache.len() <= size);
                prop_assert_eq!(h.cache.mru(), Some(key.as_str()));
            }
            h.cache.flush().unwrap();
            prop_assert!(h.cache.is_empty());
        }
    }
}
