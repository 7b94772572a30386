//! Domain-separated hashing and canonical encodings for silt.
//!
//! Everything content-addressed in silt hashes through this crate so that
//! every hash carries a domain tag and a pinned encoding version. The two
//! compatibility-critical encodings (the tree wire format and the datum
//! fingerprint) build on the varint primitives in [`encoding`].
//!
//! # Key Items
//!
//! - [`ContentHasher`] — domain-tagged BLAKE3 hasher
//! - [`hash_datum`] — deterministic fingerprint of `(datum, transform)`
//! - [`encoding`] — length-prefixed canonical encoding primitives

pub mod datum;
pub mod encoding;
pub mod error;
pub mod hasher;

pub use datum::hash_datum;
pub use error::EncodingError;
pub use hasher::ContentHasher;
