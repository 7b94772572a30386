//! Canonical hash-tree engine for silt.
//!
//! A hash-tree is an immutable mapping from POSIX-style relative paths to
//! directory or file nodes, where files hold ordered block references.
//! Trees serialize to a canonical wire form (children in byte-wise
//! lexicographic order, depth first), so two trees with equal contents
//! produce bitwise-identical bytes and therefore one fileset id.
//!
//! # Key Types
//!
//! - [`HashTree`] — the immutable tree
//! - [`TreeBuilder`] — single-writer accumulator (`put_dir` / `put_file`)
//! - [`codec`] — the pinned v1 wire format (`serialize` / `deserialize`)
//! - [`merge`] — ordered composition with last-writer-wins leaves
//!
//! # Design Rules
//!
//! 1. Every non-root path's parent exists and is a directory; files are
//!    leaves.
//! 2. The builder auto-creates missing parent chains and rejects
//!    duplicate leaves.
//! 3. `codec::serialize` is deterministic; `codec::deserialize` rejects
//!    non-canonical input.
//! 4. The tree hash is the domain-separated BLAKE3 of the serialized
//!    bytes.

pub mod builder;
pub mod codec;
pub mod error;
pub mod merge;
pub mod tree;

pub use builder::TreeBuilder;
pub use codec::{deserialize, serialize, tree_id};
pub use error::{TreeError, TreeResult};
pub use merge::merge;
pub use tree::{HashTree, Node};
