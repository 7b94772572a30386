//! Content-addressed fileset storage for silt.
//!
//! A fileset is a hash-tree persisted in the object store under the hash
//! of its canonical bytes. Filesets are immutable; what has a lifetime is
//! the *reference*: every `create`, `clone_ref`, and `compose` registers a
//! lease (pinned or TTL-bounded) with the [`Tracker`], and the stored
//! bytes are only physically deleted once no live lease remains.
//!
//! # Key Types
//!
//! - [`FilesetStorage`] — create / get / clone_ref / compose / drop_ref
//! - [`Tracker`] — lease table driving deferred physical deletion
//! - [`Ttl`] — pinned (`None`) or deadline-bounded lease lifetime

pub mod error;
pub mod storage;
pub mod tracker;
pub mod ttl;

pub use error::{FilesetError, FilesetResult};
pub use storage::{fileset_path, FilesetStorage};
pub use tracker::Tracker;
pub use ttl::{Ttl, DEFAULT_TTL};
