//! Kinds: class-like declarations for families of virtual objects, and
//! the minting of new instances.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use tracing::debug;

use crate::cache::{InnerSelf, RawData};
use crate::manager::VomShared;
use crate::{Codec, Representative, Value, VomError};

/// An initialize callback: populates a fresh instance's state from the
/// minting arguments.
pub type InitFn = dyn Fn(&mut StateData, &[Value]) -> Result<(), VomError>;

/// Declaration of a kind: its state schema and optional initializer.
///
/// The field list is declared up front; the initializer may populate any
/// subset of it. Fields it leaves unset do not become properties of the
/// minted instances.
///
/// # Example
///
/// ```rust,ignore
/// let decl = KindDecl::new(["count"]).on_initialize(|state, args| {
///     state.set("count", args.first().cloned().unwrap_or(Value::Integer(0)))
/// });
/// let counter = manager.make_kind(decl);
/// let c = counter.make_instance(&[Value::Integer(7)])?;
/// ```
pub struct KindDecl {
    fields: Vec<String>,
    init: Option<Rc<InitFn>>,
}

impl KindDecl {
    /// Declare a kind with the given state fields.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            init: None,
        }
    }

    /// Attach the initializer run for every minted instance.
    pub fn on_initialize<F>(mut self, init: F) -> Self
    where
        F: Fn(&mut StateData, &[Value]) -> Result<(), VomError> + 'static,
    {
        self.init = Some(Rc::new(init));
        self
    }

    pub(crate) fn into_parts(self) -> (Rc<[String]>, Option<Rc<InitFn>>) {
        (self.fields.into(), self.init)
    }
}

/// The mutable state record an initializer populates, consumed once.
///
/// Carries an initialization sentinel: committing the record while the
/// sentinel is still set is refused, so half-built state can never reach
/// the cache or the vatstore.
pub struct StateData {
    fields: Rc<[String]>,
    values: BTreeMap<String, Value>,
    initializing: bool,
}

impl StateData {
    fn new(fields: Rc<[String]>) -> Self {
        Self {
            fields,
            values: BTreeMap::new(),
            initializing: true,
        }
    }

    /// Set a declared field. Undeclared fields are rejected.
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), VomError> {
        if !self.fields.iter().any(|f| f == field) {
            return Err(VomError::UnknownProperty {
                property: field.to_string(),
            });
        }
        self.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Read back a field set earlier in the same initialization.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    fn finish(&mut self) {
        self.initializing = false;
    }

    /// Serialize every populated field to its ground form.
    ///
    /// The first failure aborts the commit, naming the offending field.
    fn commit(self, codec: &dyn Codec) -> Result<RawData, VomError> {
        if self.initializing {
            return Err(VomError::StillInitializing);
        }
        let mut raw_data = RawData::new();
        for (field, value) in &self.values {
            let ground = codec
                .serialize(value)
                .map_err(|e| VomError::NonSerializable {
                    property: field.clone(),
                    message: e.to_string(),
                })?;
            raw_data.insert(field.clone(), ground);
        }
        Ok(raw_data)
    }
}

/// The maker handle for one registered kind.
///
/// Cloning shares the kind: clones mint from the same instance-id
/// sequence.
#[derive(Clone)]
pub struct Kind {
    inner: Rc<KindInner>,
}

struct KindInner {
    shared: Rc<VomShared>,
    kind_id: u64,
    fields: Rc<[String]>,
    init: Option<Rc<InitFn>>,
    next_instance_id: Cell<u64>,
}

impl Kind {
    pub(crate) fn new(
        shared: Rc<VomShared>,
        kind_id: u64,
        fields: Rc<[String]>,
        init: Option<Rc<InitFn>>,
    ) -> Self {
        Self {
            inner: Rc::new(KindInner {
                shared,
                kind_id,
                fields,
                init,
                next_instance_id: Cell::new(1),
            }),
        }
    }

    pub fn kind_id(&self) -> u64 {
        self.inner.kind_id
    }

    /// The declared state fields.
    pub fn fields(&self) -> &[String] {
        &self.inner.fields
    }

    /// Mint a new instance of this kind.
    ///
    /// The instance occupies a cache slot - protected from eviction -
    /// from before its initializer runs until the initializer's state has
    /// been committed, so the initializer may freely access other virtual
    /// objects or mint further instances. On any failure the slot is
    /// released and nothing is persisted.
    pub fn make_instance(&self, args: &[Value]) -> Result<Representative, VomError> {
        let seq = self.inner.next_instance_id.get();
        self.inner.next_instance_id.set(seq + 1);
        let instance_key = format!("o+{}/{}", self.inner.kind_id, seq);
        debug!(instance_key = %instance_key, "minting instance");

        {
            let mut cache = self.inner.shared.cache.borrow_mut();
            cache.remember(InnerSelf::initializing(&instance_key))?;
        }

        match self.run_initializer(args) {
            Ok(raw_data) => {
                {
                    let mut cache = self.inner.shared.cache.borrow_mut();
                    let entry = cache.lookup(&instance_key)?;
                    entry.install(raw_data);
                }
                let rep = Representative::new(self.inner.shared.clone(), instance_key.clone());
                self.inner
                    .shared
                    .slot_table
                    .borrow_mut()
                    .bind(&rep, &instance_key);
                Ok(rep)
            }
            Err(e) => {
                self.inner.shared.cache.borrow_mut().forget(&instance_key);
                Err(e)
            }
        }
    }

    /// Run the initializer and commit the state it built.
    ///
    /// No cache borrow is held here: the initializer is user code and may
    /// re-enter the manager.
    fn run_initializer(&self, args: &[Value]) -> Result<RawData, VomError> {
        let mut state = StateData::new(self.inner.fields.clone());
        if let Some(init) = &self.inner.init {
            init(&mut state, args)?;
        }
        state.finish();
        state.commit(self.inner.shared.codec.as_ref())
    }
}

impl std::fmt::Debug for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kind")
            .field("kind_id", &self.inner.kind_id)
            .field("fields", &self.inner.fields)
            .finish()
    }
}
