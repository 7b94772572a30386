use std::io;

/// Errors from object store operations.
///
/// Backends wrap their native failures into this enum at the adapter
/// boundary so callers can route on kind instead of matching strings.
#[derive(Debug, thiserror::Error)]
pub enum ObjError {
    /// The named object does not exist.
    #[error("object not found: {name}")]
    NotFound { name: String },

    /// The object name is not valid for this store.
    #[error("invalid object name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// I/O error from the underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ObjError {
    /// The operation failed because the object does not exist.
    ///
    /// Callers use this as a control-flow signal (e.g. cache miss), never
    /// as a user-visible failure.
    pub fn is_not_exist(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// The operation may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }

    /// The caller may treat the operation as a successful no-op.
    ///
    /// Deleting an object that is already gone is the canonical case.
    pub fn is_ignorable(&self) -> bool {
        self.is_not_exist()
    }
}

/// Result alias for object store operations.
pub type ObjResult<T> = Result<T, ObjError>;
