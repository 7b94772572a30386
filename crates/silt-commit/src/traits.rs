use async_trait::async_trait;
use silt_types::{CommitRef, FilesetId};

use crate::error::CommitResult;

/// Modifier applied by [`CommitStore::update_fileset`]: receives the
/// commit's current fileset and returns its replacement. Callers needing
/// storage work precompute the replacement id before calling.
pub type UpdateFn = Box<dyn FnOnce(FilesetId) -> CommitResult<FilesetId> + Send>;

/// Accumulates fileset references per commit.
///
/// Invariants every implementation upholds:
/// - Staging order is the order of successful `add_fileset` returns
///   (total order per commit) and is the merge order on reads.
/// - A finished total supersedes staging for reads.
/// - `drop_filesets` releases all staging and total references; physical
///   deletion stays asynchronous in the tracker.
#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Append a fileset to the commit's staging list. The reference is
    /// cloned to a pinned lease so it outlives the caller's.
    async fn add_fileset(&self, commit: &CommitRef, id: FilesetId) -> CommitResult<()>;

    /// The commit's current fileset: the finished total (under a fresh
    /// default-TTL lease) if set, otherwise a fresh compose of staging.
    async fn get_fileset(&self, commit: &CommitRef) -> CommitResult<FilesetId>;

    /// Set the commit's finished total.
    async fn set_fileset(&self, commit: &CommitRef, id: FilesetId) -> CommitResult<()>;

    /// Read-modify-write the finished total: composes-or-reads the
    /// current state, applies `apply`, stores the result pinned, and
    /// drops the prior working reference.
    async fn update_fileset(&self, commit: &CommitRef, apply: UpdateFn) -> CommitResult<()>;

    /// Release every staging and total reference held for the commit.
    async fn drop_filesets(&self, commit: &CommitRef) -> CommitResult<()>;
}
