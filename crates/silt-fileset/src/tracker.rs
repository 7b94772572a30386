use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use silt_types::FilesetId;

use crate::ttl::Ttl;

/// Lease table for fileset references.
///
/// Each `create`/`clone_ref`/`compose` adds one lease for an id; a lease
/// is either pinned or carries an expiry deadline. An id stays live while
/// any lease remains. The tracker only does bookkeeping; physical
/// deletion of unreferenced content is the storage layer's job, performed
/// asynchronously after `release` or a `reap_expired` sweep reports an id
/// as unreferenced.
#[derive(Debug, Default)]
pub struct Tracker {
    leases: Mutex<HashMap<FilesetId, Vec<Option<Instant>>>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one lease for `id`.
    pub fn add(&self, id: FilesetId, ttl: Ttl) {
        let deadline = ttl.deadline(Instant::now());
        self.leases
            .lock()
            .expect("lock poisoned")
            .entry(id)
            .or_default()
            .push(deadline);
    }

    /// Release one lease (most recently added first). Returns `true` when
    /// this release left the id unreferenced and it was live before.
    pub fn release(&self, id: &FilesetId) -> bool {
        let mut leases = self.leases.lock().expect("lock poisoned");
        let Some(entry) = leases.get_mut(id) else {
            return false;
        };
        entry.pop();
        if entry.is_empty() {
            leases.remove(id);
            true
        } else {
            false
        }
    }

    /// Whether any lease for `id` remains.
    pub fn is_live(&self, id: &FilesetId) -> bool {
        self.leases.lock().expect("lock poisoned").contains_key(id)
    }

    /// Number of live leases for `id`.
    pub fn lease_count(&self, id: &FilesetId) -> usize {
        self.leases
            .lock()
            .expect("lock poisoned")
            .get(id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Drop every lease whose deadline has passed. Returns the ids that
    /// became unreferenced in this sweep.
    pub fn reap_expired(&self, now: Instant) -> Vec<FilesetId> {
        let mut leases = self.leases.lock().expect("lock poisoned");
        let mut unreferenced = Vec::new();
        leases.retain(|id, entry| {
            entry.retain(|deadline| match deadline {
                None => true,
                Some(at) => *at > now,
            });
            if entry.is_empty() {
                unreferenced.push(*id);
                false
            } else {
                true
            }
        });
        unreferenced
    }
}
