use std::sync::Arc;
use std::time::{Duration, Instant};

use silt_obj::ObjectStore;
use silt_tree::{codec, HashTree};
use silt_types::FilesetId;

use crate::error::{FilesetError, FilesetResult};
use crate::tracker::Tracker;
use crate::ttl::Ttl;

/// Object name for a fileset's canonical bytes.
pub fn fileset_path(id: &FilesetId) -> String {
    format!("filesets/{}", id.to_hex())
}

/// Content-addressed store of hash-trees with TTL-leased references.
///
/// Ids are content hashes, so creating an already-present fileset
/// deduplicates to a no-op write, and `clone_ref` returns an id
/// value-equal to its input. What it mints is a fresh lease with its own
/// lifetime, detaching the caller from the original reference.
pub struct FilesetStorage {
    store: Arc<dyn ObjectStore>,
    tracker: Tracker,
}

impl FilesetStorage {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            tracker: Tracker::new(),
        }
    }

    /// The underlying object store.
    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// The lease table.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Persist a tree and lease the resulting fileset.
    pub async fn create(&self, tree: &HashTree, ttl: Ttl) -> FilesetResult<FilesetId> {
        self.create_bytes(&codec::serialize(tree), ttl).await
    }

    /// Persist pre-serialized canonical tree bytes and lease the result.
    ///
    /// The bytes are validated before storing; non-canonical input fails.
    pub async fn create_bytes(&self, bytes: &[u8], ttl: Ttl) -> FilesetResult<FilesetId> {
        codec::deserialize(bytes)?;
        let id = codec::tree_id(bytes);
        let path = fileset_path(&id);
        if !self.store.exists(&path).await {
            self.store.put(&path, bytes).await?;
        }
        self.tracker.add(id, ttl);
        tracing::debug!(fileset = %id.short_hex(), "created fileset reference");
        Ok(id)
    }

    /// Load and verify a fileset's tree.
    pub async fn get(&self, id: &FilesetId) -> FilesetResult<HashTree> {
        let bytes = match self.store.get(&fileset_path(id)).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_exist() => return Err(FilesetError::NotFound(*id)),
            Err(err) => return Err(err.into()),
        };
        let computed = codec::tree_id(&bytes);
        if computed != *id {
            return Err(FilesetError::HashMismatch {
                expected: *id,
                computed,
            });
        }
        Ok(codec::deserialize(&bytes)?)
    }

    /// Whether a fileset's bytes exist in the store.
    pub async fn exists(&self, id: &FilesetId) -> bool {
        self.store.exists(&fileset_path(id)).await
    }

    /// Take a fresh lease on existing content, detaching from the
    /// caller's original reference lifetime.
    pub async fn clone_ref(&self, id: &FilesetId, ttl: Ttl) -> FilesetResult<FilesetId> {
        if !self.exists(id).await {
            return Err(FilesetError::NotFound(*id));
        }
        self.tracker.add(*id, ttl);
        Ok(*id)
    }

    /// Merge an ordered sequence of filesets into one and lease it.
    ///
    /// Later entries override earlier ones at leaf granularity and
    /// directories union. Composing an empty sequence yields the empty
    /// fileset.
    pub async fn compose(&self, ids: &[FilesetId], ttl: Ttl) -> FilesetResult<FilesetId> {
        let mut trees = Vec::with_capacity(ids.len());
        for id in ids {
            trees.push(self.get(id).await?);
        }
        let merged = silt_tree::merge(trees);
        self.create(&merged, ttl).await
    }

    /// Release one lease. When the last lease goes, the stored bytes are
    /// deleted best-effort (an object already gone is ignorable).
    pub async fn drop_ref(&self, id: &FilesetId) -> FilesetResult<()> {
        if self.tracker.release(id) {
            self.delete_content(id).await;
        }
        Ok(())
    }

    /// Sweep expired leases and delete content that became unreferenced.
    /// Returns how many filesets were physically deleted.
    pub async fn reap(&self) -> usize {
        let unreferenced = self.tracker.reap_expired(Instant::now());
        let count = unreferenced.len();
        for id in unreferenced {
            self.delete_content(&id).await;
        }
        count
    }

    /// Spawn a background sweep running at the given interval.
    pub fn spawn_reaper(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let storage = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let reaped = storage.reap().await;
                if reaped > 0 {
                    tracing::info!(reaped, "swept expired filesets");
                }
            }
        })
    }

    async fn delete_content(&self, id: &FilesetId) {
        match self.store.delete(&fileset_path(id)).await {
            Ok(()) => {}
            Err(err) if err.is_ignorable() => {
                tracing::warn!(fileset = %id.short_hex(), %err, "ignoring delete failure");
            }
            Err(err) => {
                // Deletion is best-effort; the bytes linger until the next
                // sweep or an operator cleanup.
                tracing::warn!(fileset = %id.short_hex(), %err, "failed to delete fileset bytes");
            }
        }
    }
}
