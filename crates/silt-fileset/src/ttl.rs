use std::time::{Duration, Instant};

/// Default lease lifetime for read-side references (cache-style clones and
/// on-the-fly composes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Lifetime of one fileset reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ttl {
    /// Pinned: retained until an explicit drop.
    None,
    /// Lease expiring after the given duration; expiry authorizes
    /// garbage collection.
    After(Duration),
}

impl Ttl {
    /// The standard read-side lease.
    pub fn default_lease() -> Self {
        Self::After(DEFAULT_TTL)
    }

    /// Absolute expiry for a lease taken at `now`; pinned leases have none.
    pub fn deadline(&self, now: Instant) -> Option<Instant> {
        match self {
            Self::None => None,
            Self::After(duration) => Some(now + *duration),
        }
    }
}
