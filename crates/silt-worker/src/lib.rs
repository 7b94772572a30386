//! Pipeline worker execution engine.
//!
//! Turns one processing request (a datum: a tuple of input file slices)
//! into one content-addressed output tree, recorded under the
//! datum's fingerprint tag. Recomputation is deduplicated by the tag:
//! a request whose tag already exists in the object store short-circuits
//! without touching the user binary.
//!
//! The flow, end to end: fingerprint the datum, probe the cache, stage
//! inputs under the input root, run the user transform against the output
//! root, upload the produced files as content-addressed blocks, assemble
//! the canonical hash-tree, persist it as a fileset, and finally write the
//! serialized tree under `tags/<tag>`. The tag write is the commit point,
//! so a failed run never leaves a visible cache entry.

pub mod config;
pub mod error;
pub mod runner;
pub mod transfer;
pub mod worker;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use worker::{ProcessRequest, ProcessResponse, Worker};
