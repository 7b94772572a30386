use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Local filesystem and throughput settings for one worker instance.
///
/// Every declared input materializes under `<input_root>/<input name>/`;
/// the user binary writes its results under `output_root`. Both are
/// configuration, never hardcoded, so tests and embedders can point a
/// worker anywhere.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Directory the inputs are staged under.
    pub input_root: PathBuf,
    /// Directory the user binary writes output files to.
    pub output_root: PathBuf,
    /// Maximum bytes per uploaded block.
    pub max_block_size: usize,
    /// Bound on concurrent file uploads within one process call.
    pub upload_parallelism: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("/pfs"),
            output_root: PathBuf::from("/pfs/out"),
            max_block_size: 8 * 1024 * 1024,
            upload_parallelism: 8,
        }
    }
}
