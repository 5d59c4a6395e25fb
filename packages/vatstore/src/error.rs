//! Error types for the vatstore layer.
//!
//! Errors at this level are transport-focused. No semantic errors like
//! "unknown kind" or "key not registered" - those belong in higher layers.

/// Errors from a vatstore backend.
///
/// These are transport and system-level errors only. Semantic errors
/// (missing object state, weak-store precondition violations) belong in
/// higher layers.
#[derive(Debug)]
pub enum VatstoreError {
    /// Generic I/O or transport failure.
    ///
    /// Use this for disk errors, IPC failures, database driver errors, etc.
    Transport(Box<dyn std::error::Error + Send + Sync>),

    /// The operation is not supported by this backend.
    ///
    /// For example, deleting from an append-only backend.
    NotSupported,

    /// Resource limit exceeded.
    ///
    /// Memory exhaustion, disk full, too many open handles, etc.
    ResourceExhausted,
}

impl std::fmt::Display for VatstoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VatstoreError::Transport(e) => write!(f, "transport error: {}", e),
            VatstoreError::NotSupported => write!(f, "operation not supported"),
            VatstoreError::ResourceExhausted => write!(f, "resource exhausted"),
        }
    }
}

impl std::error::Error for VatstoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VatstoreError::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VatstoreError {
    fn from(e: std::io::Error) -> Self {
        VatstoreError::Transport(Box::new(e))
    }
}
