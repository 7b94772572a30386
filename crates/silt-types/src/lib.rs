//! Foundation types for the silt pipeline worker engine.
//!
//! This crate provides the identity and value types shared by every other
//! silt crate. Every other silt crate depends on `silt-types`.
//!
//! # Key Types
//!
//! - [`BlockRef`] — content-addressed pointer to a byte range in the object store
//! - [`FilesetId`] — content-addressed identifier of a persisted hash-tree
//! - [`Tag`] — external name under which an output tree is recorded
//! - [`CommitRef`] — `(repo, commit id)` pair naming an accumulation unit
//! - [`FileInfo`] — one input file slice of a datum
//! - [`Transform`] — user command, stdin, environment, accepted exit codes
//! - [`PipelineInfo`] — declared inputs plus the transform

pub mod block;
pub mod commit;
pub mod datum;
pub mod error;
pub mod fileset;
pub mod pipeline;
pub mod tag;

pub use block::BlockRef;
pub use commit::CommitRef;
pub use datum::FileInfo;
pub use error::TypeError;
pub use fileset::FilesetId;
pub use pipeline::{Input, PipelineInfo, Transform};
pub use tag::Tag;
