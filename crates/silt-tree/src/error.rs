/// Errors from hash-tree construction and decoding.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TreeError {
    /// A path was inserted twice.
    #[error("duplicate path: {0}")]
    DuplicatePath(String),

    /// A file and a directory collided at one path.
    #[error("path {0} is a file, not a directory")]
    NotADirectory(String),

    /// The path is not a valid relative tree path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Serialized bytes are not a canonical tree encoding.
    #[error("corrupt tree encoding: {0}")]
    Corrupt(String),
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

impl From<silt_hash::EncodingError> for TreeError {
    fn from(err: silt_hash::EncodingError) -> Self {
        match err {
            silt_hash::EncodingError::Corrupt(reason) => Self::Corrupt(reason),
        }
    }
}
