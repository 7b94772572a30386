use silt_fileset::FilesetError;
use silt_types::CommitRef;

/// Errors from commit store operations.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// The commit already has a finished total; staging is closed.
    #[error("commit is finished: {0}")]
    Finished(CommitRef),

    /// A stored fileset id could not be parsed.
    #[error("corrupt commit store row: {0}")]
    Corrupt(String),

    /// Fileset storage failure.
    #[error(transparent)]
    Fileset(#[from] FilesetError),

    /// Database failure.
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

/// Result alias for commit store operations.
pub type CommitResult<T> = Result<T, CommitError>;
