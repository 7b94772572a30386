use serde::{Deserialize, Serialize};

/// Content-addressed pointer to a contiguous byte range in the object store.
///
/// Immutable once created. The `hash` names the stored block object; the
/// `offset`/`length` pair bounds the referenced slice within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    /// BLAKE3 hash of the block contents.
    pub hash: [u8; 32],
    /// Byte offset of the referenced range within the block object.
    pub offset: u64,
    /// Length of the referenced range in bytes.
    pub length: u64,
}

impl BlockRef {
    /// A reference covering a whole block of the given length.
    pub fn whole(hash: [u8; 32], length: u64) -> Self {
        Self {
            hash,
            offset: 0,
            length,
        }
    }

    /// Hex-encoded block hash.
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}
