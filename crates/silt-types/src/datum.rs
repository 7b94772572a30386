use serde::{Deserialize, Serialize};

use crate::block::BlockRef;

/// One input file slice of a datum.
///
/// A datum is a `Vec<FileInfo>` positionally aligned with the pipeline's
/// declared inputs. `name` echoes the input the slice belongs to, `hash` is
/// the strong content hash that enters the datum fingerprint, and `blocks`
/// lets the transfer layer materialize the file's bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Name of the declared input this slice belongs to.
    pub name: String,
    /// Logical path of the file relative to its input root.
    pub path: String,
    /// Strong content hash of the file, hex-encoded.
    pub hash: String,
    /// Total file size in bytes.
    pub size: u64,
    /// Block references that reassemble the file's content.
    pub blocks: Vec<BlockRef>,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            hash: hash.into(),
            size: 0,
            blocks: Vec::new(),
        }
    }

    pub fn with_blocks(mut self, size: u64, blocks: Vec<BlockRef>) -> Self {
        self.size = size;
        self.blocks = blocks;
        self
    }
}
