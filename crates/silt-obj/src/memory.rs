use std::collections::BTreeMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::{ObjError, ObjResult};
use crate::traits::{BoxedReader, ObjectStore, ObjectWriter};

type Objects = Arc<RwLock<BTreeMap<String, Vec<u8>>>>;

/// In-memory, map-based object store.
///
/// Intended for tests and embedding. Objects live in a `BTreeMap` behind a
/// `RwLock`, so walk order is lexicographic and reads are concurrent.
/// Writers buffer locally and publish on `close`, mirroring the pipe
/// semantics of remote backends.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Objects,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn writer(&self, name: &str) -> ObjResult<Box<dyn ObjectWriter>> {
        Ok(Box::new(MemWriter {
            name: name.to_string(),
            buf: Vec::new(),
            objects: Arc::clone(&self.objects),
        }))
    }

    async fn reader(&self, name: &str, offset: u64, size: u64) -> ObjResult<BoxedReader> {
        let map = self.objects.read().expect("lock poisoned");
        let data = map.get(name).ok_or_else(|| ObjError::NotFound {
            name: name.to_string(),
        })?;
        let start = (offset as usize).min(data.len());
        let end = if size == 0 {
            data.len()
        } else {
            start.saturating_add(size as usize).min(data.len())
        };
        Ok(Box::new(io::Cursor::new(data[start..end].to_vec())))
    }

    async fn walk(
        &self,
        prefix: &str,
        visit: &mut (dyn for<'a> FnMut(&'a str) -> ObjResult<()> + Send),
    ) -> ObjResult<()> {
        let map = self.objects.read().expect("lock poisoned");
        for name in map
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
        {
            visit(name)?;
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> ObjResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        match map.remove(name) {
            Some(_) => Ok(()),
            None => Err(ObjError::NotFound {
                name: name.to_string(),
            }),
        }
    }

    async fn exists(&self, name: &str) -> bool {
        self.objects
            .read()
            .expect("lock poisoned")
            .contains_key(name)
    }
}

struct MemWriter {
    name: String,
    buf: Vec<u8>,
    objects: Objects,
}

impl AsyncWrite for MemWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ObjectWriter for MemWriter {
    async fn close(self: Box<Self>) -> ObjResult<()> {
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(self.name, self.buf);
        Ok(())
    }
}
