use silt_obj::ObjError;
use silt_tree::TreeError;
use silt_types::FilesetId;

/// Errors from fileset storage operations.
#[derive(Debug, thiserror::Error)]
pub enum FilesetError {
    /// No fileset with this id exists in the store.
    #[error("fileset not found: {0}")]
    NotFound(FilesetId),

    /// Stored bytes do not hash to the id they are stored under.
    #[error("fileset hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        expected: FilesetId,
        computed: FilesetId,
    },

    /// The stored bytes are not a canonical tree encoding.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Object store failure.
    #[error(transparent)]
    Obj(#[from] ObjError),
}

/// Result alias for fileset operations.
pub type FilesetResult<T> = Result<T, FilesetError>;
