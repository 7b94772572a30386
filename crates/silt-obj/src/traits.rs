use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ObjResult;

/// Boxed byte stream returned by [`ObjectStore::reader`].
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Streaming writer for one object.
///
/// Bytes written before `close` may be buffered or in flight; only a
/// successful `close` publishes the object. Dropping a writer without
/// closing abandons the upload and publishes nothing.
#[async_trait]
pub trait ObjectWriter: AsyncWrite + Send + Unpin {
    /// Finish the upload. Completes only after the object is durably
    /// stored, and surfaces any upload error.
    async fn close(self: Box<Self>) -> ObjResult<()>;
}

/// Opaque blob store keyed by string names.
///
/// All implementations must satisfy these invariants:
/// - Writes to distinct names do not interfere; concurrent writes to the
///   same name race with last-writer-wins at the byte level.
/// - `reader` exposes a bounded slice of the object; `size == 0` means
///   "to the end of the object".
/// - `walk` visits every object under the prefix, recursively, in
///   store-native order. The callback must not re-enter the store.
/// - All failures are wrapped into [`crate::ObjError`] at this boundary.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Open a streaming writer for the named object.
    async fn writer(&self, name: &str) -> ObjResult<Box<dyn ObjectWriter>>;

    /// Random-access read of `[offset, offset + size)`; `size == 0` reads
    /// to the end of the object.
    async fn reader(&self, name: &str, offset: u64, size: u64) -> ObjResult<BoxedReader>;

    /// Invoke `visit(name)` for each object under `prefix`.
    async fn walk(
        &self,
        prefix: &str,
        visit: &mut (dyn for<'a> FnMut(&'a str) -> ObjResult<()> + Send),
    ) -> ObjResult<()>;

    /// Delete the named object. Returns `NotFound` (ignorable) if the
    /// object is already gone.
    async fn delete(&self, name: &str) -> ObjResult<()>;

    /// Whether the named object exists.
    async fn exists(&self, name: &str) -> bool;

    /// Write a whole object in one call.
    async fn put(&self, name: &str, data: &[u8]) -> ObjResult<()> {
        let mut w = self.writer(name).await?;
        w.write_all(data).await?;
        w.close().await
    }

    /// Read a whole object into memory.
    async fn get(&self, name: &str) -> ObjResult<Vec<u8>> {
        let mut r = self.reader(name, 0, 0).await?;
        let mut buf = Vec::new();
        r.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}
