//! Error types for the virtual object layer.

use vatobj_vatstore::VatstoreError;

/// Errors from the virtual object manager.
///
/// These are semantic errors (registry misses, precondition violations,
/// encoding failures) in addition to the transport errors from the
/// vatstore layer, which propagate unchanged.
#[derive(Debug)]
pub enum VomError {
    /// Every resident cache slot is occupied by an in-progress
    /// initialization, so eviction cannot make room. Programmer error.
    CacheOverflow,

    /// A virtual object reference names a kind that was never registered.
    UnknownKind { kind_id: u64 },

    /// Weak-store `init` on a key that is already registered.
    AlreadyRegistered { key_name: String },

    /// Weak-store `get`/`set`/`delete` on a key that is not registered.
    NotFound { key_name: String },

    /// A state property could not be encoded to its ground form.
    NonSerializable { property: String, message: String },

    /// State was committed while its initialization sentinel was still
    /// set. Defensive assertion.
    StillInitializing,

    /// Accessor for a property the committed state does not carry.
    UnknownProperty { property: String },

    /// The vatstore holds no state record for an instance key.
    MissingState { instance_key: String },

    /// A slot string does not follow the slot grammar, or names the
    /// wrong flavor of slot for the operation.
    InvalidSlot { slot: String, message: String },

    /// Codec failed to encode a value.
    Encode { message: String },

    /// Codec failed to decode a ground form.
    Decode { message: String },

    /// Error from the vatstore layer.
    Store(VatstoreError),
}

impl std::fmt::Display for VomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VomError::CacheOverflow => {
                write!(f, "cache overflowed with objects still being initialized")
            }
            VomError::UnknownKind { kind_id } => write!(f, "unknown kind {}", kind_id),
            VomError::AlreadyRegistered { key_name } => {
                write!(f, "{} already registered", key_name)
            }
            VomError::NotFound { key_name } => write!(f, "{} not found", key_name),
            VomError::NonSerializable { property, message } => {
                write!(f, "property '{}' is not serializable: {}", property, message)
            }
            VomError::StillInitializing => {
                write!(f, "state committed while initialization is still in progress")
            }
            VomError::UnknownProperty { property } => {
                write!(f, "unknown property '{}'", property)
            }
            VomError::MissingState { instance_key } => {
                write!(f, "no stored state for {}", instance_key)
            }
            VomError::InvalidSlot { slot, message } => {
                write!(f, "invalid slot '{}': {}", slot, message)
            }
            VomError::Encode { message } => write!(f, "encode error: {}", message),
            VomError::Decode { message } => write!(f, "decode error: {}", message),
            VomError::Store(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for VomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VomError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VatstoreError> for VomError {
    fn from(e: VatstoreError) -> Self {
        VomError::Store(e)
    }
}
