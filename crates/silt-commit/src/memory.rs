use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use silt_fileset::{FilesetStorage, Ttl};
use silt_types::{CommitRef, FilesetId};
use tokio::sync::Mutex;

use crate::error::{CommitError, CommitResult};
use crate::traits::{CommitStore, UpdateFn};

/// In-memory commit store for tests and single-node modes.
///
/// Two maps under one mutex, keyed by `(repo, commit id)`. The mutex makes
/// `add`/`get`/`set`/`update`/`drop` linearizable per commit.
pub struct MemCommitStore {
    storage: Arc<FilesetStorage>,
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    staging: HashMap<String, Vec<FilesetId>>,
    finished: HashMap<String, FilesetId>,
}

impl MemCommitStore {
    pub fn new(storage: Arc<FilesetStorage>) -> Self {
        Self {
            storage,
            inner: Mutex::new(State::default()),
        }
    }
}

#[async_trait]
impl CommitStore for MemCommitStore {
    async fn add_fileset(&self, commit: &CommitRef, id: FilesetId) -> CommitResult<()> {
        let mut state = self.inner.lock().await;
        let key = commit.key();
        if state.finished.contains_key(&key) {
            return Err(CommitError::Finished(commit.clone()));
        }
        let pinned = self.storage.clone_ref(&id, Ttl::None).await?;
        state.staging.entry(key).or_default().push(pinned);
        Ok(())
    }

    async fn get_fileset(&self, commit: &CommitRef) -> CommitResult<FilesetId> {
        let state = self.inner.lock().await;
        let key = commit.key();
        if let Some(id) = state.finished.get(&key) {
            return Ok(self.storage.clone_ref(id, Ttl::default_lease()).await?);
        }
        let staged = state.staging.get(&key).cloned().unwrap_or_default();
        Ok(self.storage.compose(&staged, Ttl::default_lease()).await?)
    }

    async fn set_fileset(&self, commit: &CommitRef, id: FilesetId) -> CommitResult<()> {
        let mut state = self.inner.lock().await;
        let pinned = self.storage.clone_ref(&id, Ttl::None).await?;
        if let Some(prior) = state.finished.insert(commit.key(), pinned) {
            self.storage.drop_ref(&prior).await?;
        }
        Ok(())
    }

    async fn update_fileset(&self, commit: &CommitRef, apply: UpdateFn) -> CommitResult<()> {
        let mut state = self.inner.lock().await;
        let key = commit.key();
        let (current, composed) = match state.finished.get(&key) {
            Some(id) => (*id, false),
            None => {
                let staged = state.staging.get(&key).cloned().unwrap_or_default();
                let id = self.storage.compose(&staged, Ttl::default_lease()).await?;
                (id, true)
            }
        };
        let replacement = match apply(current) {
            Ok(replacement) => replacement,
            Err(err) => {
                // The on-the-fly compose holds its own lease; a rejected
                // modifier must not strand it. The finished total keeps
                // its stored reference.
                if composed {
                    let _ = self.storage.drop_ref(&current).await;
                }
                return Err(err);
            }
        };
        let pinned = self.storage.clone_ref(&replacement, Ttl::None).await?;
        state.finished.insert(key, pinned);
        self.storage.drop_ref(&current).await?;
        Ok(())
    }

    async fn drop_filesets(&self, commit: &CommitRef) -> CommitResult<()> {
        let mut state = self.inner.lock().await;
        let key = commit.key();
        for id in state.staging.remove(&key).unwrap_or_default() {
            self.storage.drop_ref(&id).await?;
        }
        if let Some(id) = state.finished.remove(&key) {
            self.storage.drop_ref(&id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use silt_obj::InMemoryObjectStore;
    use silt_tree::{Node, TreeBuilder};
    use silt_types::BlockRef;

    use super::*;

    fn setup() -> (Arc<FilesetStorage>, MemCommitStore) {
        let storage = Arc::new(FilesetStorage::new(Arc::new(InMemoryObjectStore::new())));
        let store = MemCommitStore::new(Arc::clone(&storage));
        (storage, store)
    }

    async fn fileset_with_file(
        storage: &FilesetStorage,
        path: &str,
        byte: u8,
    ) -> FilesetId {
        let mut b = TreeBuilder::new();
        b.put_file(path, 1, vec![BlockRef::whole([byte; 32], 1)])
            .unwrap();
        storage.create(&b.finish(), Ttl::None).await.unwrap()
    }

    fn commit() -> CommitRef {
        CommitRef::new("repo", "c1")
    }

    // -----------------------------------------------------------------------
    // Read-your-writes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_contains_every_added_path() {
        let (storage, store) = setup();
        let a = fileset_with_file(&storage, "a.txt", 1).await;
        let b = fileset_with_file(&storage, "b/c.txt", 2).await;

        store.add_fileset(&commit(), a).await.unwrap();
        store.add_fileset(&commit(), b).await.unwrap();

        let got = store.get_fileset(&commit()).await.unwrap();
        let tree = storage.get(&got).await.unwrap();
        assert!(tree.get("a.txt").is_some());
        assert!(tree.get("b/c.txt").is_some());
    }

    // -----------------------------------------------------------------------
    // Staging merge order
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn later_add_wins_at_overlapping_leaf() {
        let (storage, store) = setup();
        let first = fileset_with_file(&storage, "p", 1).await;
        let second = fileset_with_file(&storage, "p", 2).await;

        store.add_fileset(&commit(), first).await.unwrap();
        store.add_fileset(&commit(), second).await.unwrap();

        let got = store.get_fileset(&commit()).await.unwrap();
        let tree = storage.get(&got).await.unwrap();
        let Some(Node::File { blocks, .. }) = tree.get("p") else {
            panic!("expected file at p");
        };
        assert_eq!(blocks[0].hash, [2; 32]);
    }

    // -----------------------------------------------------------------------
    // Finished supersedes staging
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn add_to_finished_commit_fails() {
        let (storage, store) = setup();
        let total = fileset_with_file(&storage, "done", 1).await;
        let extra = fileset_with_file(&storage, "late", 2).await;

        store.set_fileset(&commit(), total).await.unwrap();
        let err = store.add_fileset(&commit(), extra).await.unwrap_err();
        assert!(matches!(err, CommitError::Finished(_)));
    }

    #[tokio::test]
    async fn get_returns_total_not_staging() {
        let (storage, store) = setup();
        let staged = fileset_with_file(&storage, "staged", 1).await;
        let total = fileset_with_file(&storage, "total", 2).await;

        store.add_fileset(&commit(), staged).await.unwrap();
        store.set_fileset(&commit(), total).await.unwrap();

        let got = store.get_fileset(&commit()).await.unwrap();
        assert_eq!(got, total);
        let tree = storage.get(&got).await.unwrap();
        assert!(tree.get("total").is_some());
        assert!(tree.get("staged").is_none());
    }

    #[tokio::test]
    async fn get_of_empty_commit_is_the_empty_fileset() {
        let (storage, store) = setup();
        let got = store.get_fileset(&commit()).await.unwrap();
        assert!(storage.get(&got).await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn update_composes_then_stores_replacement() {
        let (storage, store) = setup();
        let staged = fileset_with_file(&storage, "old", 1).await;
        let replacement = fileset_with_file(&storage, "new", 2).await;

        store.add_fileset(&commit(), staged).await.unwrap();
        store
            .update_fileset(&commit(), Box::new(move |_current| Ok(replacement)))
            .await
            .unwrap();

        let got = store.get_fileset(&commit()).await.unwrap();
        assert_eq!(got, replacement);
    }

    #[tokio::test]
    async fn update_error_leaves_commit_unfinished() {
        let (storage, store) = setup();
        let staged = fileset_with_file(&storage, "keep", 1).await;
        store.add_fileset(&commit(), staged).await.unwrap();

        let err = store
            .update_fileset(
                &commit(),
                Box::new(|_| Err(CommitError::Corrupt("modifier refused".into()))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommitError::Corrupt(_)));

        // Composing a single-entry staging list reproduces the staged
        // content, so the on-the-fly compose leased the staged id; a
        // rejected modifier must give that lease back. Two remain: the
        // creation lease and the staging pin.
        assert_eq!(storage.tracker().lease_count(&staged), 2);

        // Still readable through staging, and still open for adds.
        let extra = fileset_with_file(&storage, "more", 2).await;
        store.add_fileset(&commit(), extra).await.unwrap();
    }

    // -----------------------------------------------------------------------
    // Drop
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn drop_releases_staging_and_total_references() {
        let (storage, store) = setup();
        let staged = fileset_with_file(&storage, "s", 1).await;
        let total = fileset_with_file(&storage, "t", 2).await;

        store.add_fileset(&commit(), staged).await.unwrap();
        store.set_fileset(&commit(), total).await.unwrap();
        store.drop_filesets(&commit()).await.unwrap();

        // Only the creation leases from this test remain.
        assert_eq!(storage.tracker().lease_count(&staged), 1);
        assert_eq!(storage.tracker().lease_count(&total), 1);

        // The commit reads as empty again.
        let got = store.get_fileset(&commit()).await.unwrap();
        assert!(storage.get(&got).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn commits_are_isolated_by_key() {
        let (storage, store) = setup();
        let a = fileset_with_file(&storage, "a", 1).await;
        let other = CommitRef::new("repo", "c2");

        store.add_fileset(&commit(), a).await.unwrap();
        let got = store.get_fileset(&other).await.unwrap();
        assert!(storage.get(&got).await.unwrap().is_empty());
    }
}
