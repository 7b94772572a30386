/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a block and a tree with identical bytes can never
/// collide. The tags double as encoding version pins: a change to a
/// canonical encoding must bump the tag.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for block objects.
    pub const BLOCK: Self = Self {
        domain: "silt-block-v1",
    };
    /// Hasher for serialized hash-trees (fileset ids).
    pub const TREE: Self = Self {
        domain: "silt-tree-v1",
    };
    /// Hasher for datum fingerprints (tags).
    pub const DATUM: Self = Self {
        domain: "silt-datum-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        *hasher.finalize().as_bytes()
    }

    /// Verify that data produces the expected digest.
    pub fn verify(&self, data: &[u8], expected: &[u8; 32]) -> bool {
        self.hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
