use silt_commit::CommitError;
use silt_fileset::FilesetError;
use silt_obj::ObjError;
use silt_tree::TreeError;

/// Errors from processing one datum.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The user binary exited with a non-accepted status. `code` is
    /// `None` when the process died to a signal.
    #[error("user code failed: {}", exit_label(.code))]
    UserCode { code: Option<i32> },

    /// The transform cannot be executed as declared.
    #[error("invalid transform: {0}")]
    InvalidTransform(String),

    /// The datum does not line up with the pipeline's declared inputs.
    #[error("datum has {data} file slices for {inputs} declared inputs")]
    DatumMismatch { inputs: usize, data: usize },

    /// A datum file path would escape its input directory.
    #[error("invalid datum file path: {0:?}")]
    InvalidDatumPath(String),

    /// An output path could not be represented as an object name.
    #[error("non-utf8 path under the output root: {0}")]
    NonUtf8Path(String),

    /// Object store failure.
    #[error(transparent)]
    Obj(#[from] ObjError),

    /// Hash-tree assembly failure.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Fileset storage failure.
    #[error(transparent)]
    Fileset(#[from] FilesetError),

    /// Commit store failure.
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// Local filesystem or process I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker-internal task failed.
    #[error("internal: {0}")]
    Internal(String),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}

impl WorkerError {
    /// Whether this is a user-code failure (the orchestrator's retry
    /// policy treats those differently from infrastructure errors).
    pub fn is_user_code_failure(&self) -> bool {
        matches!(self, Self::UserCode { .. })
    }
}

/// Result alias for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;
