use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ObjError, ObjResult};
use crate::traits::{BoxedReader, ObjectStore, ObjectWriter};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed object store: one file per object under a root
/// directory, with `/` in object names mapping to subdirectories.
///
/// Writers stream into a temp file and publish with an atomic rename on
/// `close`, so readers never observe a partially written object and
/// concurrent writers to the same name settle last-writer-wins.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    /// Open a store rooted at the given directory, creating it if needed.
    pub async fn new(root: impl Into<PathBuf>) -> ObjResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// The root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> ObjResult<PathBuf> {
        if name.is_empty() {
            return Err(ObjError::InvalidName {
                name: name.to_string(),
                reason: "empty name".into(),
            });
        }
        let rel = Path::new(name);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(ObjError::InvalidName {
                        name: name.to_string(),
                        reason: "names must be relative, without `.` or `..`".into(),
                    })
                }
            }
        }
        Ok(self.root.join(rel))
    }

    fn not_found(name: &str, err: io::Error) -> ObjError {
        if err.kind() == io::ErrorKind::NotFound {
            ObjError::NotFound {
                name: name.to_string(),
            }
        } else {
            ObjError::Io(err)
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn writer(&self, name: &str) -> ObjResult<Box<dyn ObjectWriter>> {
        let dst = self.object_path(name)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Unique temp name so concurrent writers to one object never share
        // a temp file; the rename is the publication point.
        let tmp = dst.with_file_name(format!(
            "{}.{}.{}.tmp",
            dst.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed),
        ));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp)
            .await?;
        Ok(Box::new(LocalWriter { file, tmp, dst }))
    }

    async fn reader(&self, name: &str, offset: u64, size: u64) -> ObjResult<BoxedReader> {
        let path = self.object_path(name)?;
        let mut file = File::open(&path)
            .await
            .map_err(|e| Self::not_found(name, e))?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        if size > 0 {
            Ok(Box::new(file.take(size)))
        } else {
            Ok(Box::new(file))
        }
    }

    async fn walk(
        &self,
        prefix: &str,
        visit: &mut (dyn for<'a> FnMut(&'a str) -> ObjResult<()> + Send),
    ) -> ObjResult<()> {
        for entry in walkdir::WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let Some(rel) = rel.to_str() else {
                tracing::warn!(path = %entry.path().display(), "skipping non-utf8 object name");
                continue;
            };
            let name = rel.replace(std::path::MAIN_SEPARATOR, "/");
            if name.ends_with(".tmp") || !name.starts_with(prefix) {
                continue;
            }
            visit(&name)?;
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> ObjResult<()> {
        let path = self.object_path(name)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| Self::not_found(name, e))
    }

    async fn exists(&self, name: &str) -> bool {
        match self.object_path(name) {
            Ok(path) => fs::metadata(path).await.is_ok(),
            Err(_) => false,
        }
    }
}

struct LocalWriter {
    file: File,
    tmp: PathBuf,
    dst: PathBuf,
}

impl AsyncWrite for LocalWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.file).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_shutdown(cx)
    }
}

#[async_trait]
impl ObjectWriter for LocalWriter {
    async fn close(mut self: Box<Self>) -> ObjResult<()> {
        let publish = async {
            self.file.flush().await?;
            self.file.sync_all().await?;
            fs::rename(&self.tmp, &self.dst).await
        };
        match publish.await {
            Ok(()) => Ok(()),
            Err(err) => {
                let _ = fs::remove_file(&self.tmp).await;
                Err(err.into())
            }
        }
    }
}

impl Drop for LocalWriter {
    fn drop(&mut self) {
        // An unclosed writer abandons its upload; sweep the temp file.
        let _ = std::fs::remove_file(&self.tmp);
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn store() -> (TempDir, LocalObjectStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path()).await.unwrap();
        (dir, store)
    }

    // -----------------------------------------------------------------------
    // Put / get / atomic publication
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_and_get_nested_name() {
        let (_dir, store) = store().await;
        store.put("blocks/ab/cd", b"payload").await.unwrap();
        assert_eq!(store.get("blocks/ab/cd").await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn close_publishes_atomically() {
        let (_dir, store) = store().await;
        let mut w = store.writer("obj").await.unwrap();
        w.write_all(b"data").await.unwrap();
        assert!(!store.exists("obj").await);
        w.close().await.unwrap();
        assert!(store.exists("obj").await);
    }

    #[tokio::test]
    async fn dropped_writer_leaves_no_object_or_temp() {
        let (dir, store) = store().await;
        let mut w = store.writer("obj").await.unwrap();
        w.write_all(b"data").await.unwrap();
        drop(w);
        assert!(!store.exists("obj").await);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "temp files must be swept: {leftovers:?}");
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (_dir, store) = store().await;
        assert!(store.get("nope").await.unwrap_err().is_not_exist());
    }

    // -----------------------------------------------------------------------
    // Name validation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn rejects_parent_traversal() {
        let (_dir, store) = store().await;
        let err = store.put("../escape", b"x").await.unwrap_err();
        assert!(matches!(err, ObjError::InvalidName { .. }));
    }

    #[tokio::test]
    async fn rejects_absolute_and_empty_names() {
        let (_dir, store) = store().await;
        assert!(matches!(
            store.put("/abs", b"x").await.unwrap_err(),
            ObjError::InvalidName { .. }
        ));
        assert!(matches!(
            store.put("", b"x").await.unwrap_err(),
            ObjError::InvalidName { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Bounded reads
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reader_offset_and_size() {
        let (_dir, store) = store().await;
        store.put("obj", b"hello world").await.unwrap();

        let mut r = store.reader("obj", 6, 5).await.unwrap();
        let mut buf = Vec::new();
        r.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"world");
    }

    #[tokio::test]
    async fn reader_size_zero_reads_to_end() {
        let (_dir, store) = store().await;
        store.put("obj", b"hello world").await.unwrap();

        let mut r = store.reader("obj", 0, 0).await.unwrap();
        let mut buf = Vec::new();
        r.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello world");
    }

    // -----------------------------------------------------------------------
    // Walk / delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn walk_filters_by_prefix() {
        let (_dir, store) = store().await;
        store.put("tags/t1", b"1").await.unwrap();
        store.put("tags/t2", b"2").await.unwrap();
        store.put("blocks/b1", b"3").await.unwrap();

        let mut seen = Vec::new();
        store
            .walk("tags/", &mut |name| {
                seen.push(name.to_string());
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(seen, vec!["tags/t1", "tags/t2"]);
    }

    #[tokio::test]
    async fn delete_missing_is_ignorable() {
        let (_dir, store) = store().await;
        assert!(store.delete("gone").await.unwrap_err().is_ignorable());
    }
}
