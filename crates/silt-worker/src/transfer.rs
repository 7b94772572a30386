use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use silt_fileset::{FilesetStorage, Ttl};
use silt_hash::ContentHasher;
use silt_obj::ObjectStore;
use silt_tree::{codec, TreeBuilder};
use silt_types::{BlockRef, FileInfo, FilesetId, Input, Tag};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};

/// Object name for a content-addressed block.
pub fn block_path(hash: &[u8; 32]) -> String {
    format!("blocks/{}", hex::encode(hash))
}

/// Object name for a tag's serialized tree bytes.
pub fn tag_path(tag: &Tag) -> String {
    format!("tags/{tag}")
}

/// Stage a datum's inputs under the input root.
///
/// Input `i` lands at `<input_root>/<inputs[i].name>/<path>`. Eager inputs
/// stream every block into a regular file up front. Lazy inputs get a
/// named pipe plus a feeder task that parks until the user process opens
/// the pipe, then streams the blocks through it: content materializes on
/// first read, and nothing downstream can tell the difference. Returned
/// handles let the caller retire feeders whose pipe was never opened.
pub async fn download(
    store: &Arc<dyn ObjectStore>,
    inputs: &[Input],
    data: &[FileInfo],
    input_root: &Path,
) -> WorkerResult<Vec<JoinHandle<()>>> {
    if inputs.len() != data.len() {
        return Err(WorkerError::DatumMismatch {
            inputs: inputs.len(),
            data: data.len(),
        });
    }

    // On any staging failure the feeders spawned so far must be aborted:
    // a dropped `JoinHandle` detaches the task, and a detached feeder
    // addresses its destination by path, so it could later write stale
    // blocks into a different datum's input staged at the same path.
    let mut feeders = Vec::new();
    if let Err(err) = stage_inputs(store, inputs, data, input_root, &mut feeders).await {
        for feeder in &feeders {
            feeder.abort();
        }
        return Err(err);
    }
    Ok(feeders)
}

async fn stage_inputs(
    store: &Arc<dyn ObjectStore>,
    inputs: &[Input],
    data: &[FileInfo],
    input_root: &Path,
    feeders: &mut Vec<JoinHandle<()>>,
) -> WorkerResult<()> {
    for (input, info) in inputs.iter().zip(data) {
        let rel = Path::new(&info.path);
        if info.path.is_empty()
            || !rel
                .components()
                .all(|c| matches!(c, std::path::Component::Normal(_)))
        {
            return Err(WorkerError::InvalidDatumPath(info.path.clone()));
        }
        let dest = input_root.join(&input.name).join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        // A previous datum may have left a file (or pipe) here; a stale
        // pipe would wedge the eager open below.
        match fs::remove_file(&dest).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        if input.lazy {
            feeders.push(spawn_lazy_feeder(
                Arc::clone(store),
                info.blocks.clone(),
                dest,
            )?);
        } else {
            let mut file = File::create(&dest).await?;
            write_blocks(store, &info.blocks, &mut file).await?;
            file.flush().await?;
        }
    }
    Ok(())
}

/// Walk the output root and persist it as a content-addressed tree.
///
/// Directories (empty ones included) become `put_dir` records; files are
/// chunked into blocks, uploaded with bounded parallelism, and recorded
/// with `put_file`. The shared builder is single-writer, so recording is
/// serialized behind a mutex. Once everything is in, the tree is
/// finalized, persisted as a fileset, and only then written under the
/// tag; the tag write is the commit point.
pub async fn upload(
    store: &Arc<dyn ObjectStore>,
    filesets: &Arc<FilesetStorage>,
    config: &WorkerConfig,
    tag: &Tag,
) -> WorkerResult<FilesetId> {
    let builder = Arc::new(Mutex::new(TreeBuilder::new()));
    let permits = Arc::new(Semaphore::new(config.upload_parallelism.max(1)));
    let mut uploads: JoinSet<WorkerResult<()>> = JoinSet::new();

    for entry in walkdir::WalkDir::new(&config.output_root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.path() == config.output_root {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(&config.output_root)
            .expect("walk stays under the output root");
        let Some(rel) = rel.to_str() else {
            return Err(WorkerError::NonUtf8Path(
                entry.path().to_string_lossy().into_owned(),
            ));
        };
        let rel = rel.replace(std::path::MAIN_SEPARATOR, "/");

        let file_type = entry.file_type();
        if file_type.is_dir() {
            builder
                .lock()
                .expect("lock poisoned")
                .put_dir(&rel)?;
        } else if file_type.is_file() {
            let store = Arc::clone(store);
            let builder = Arc::clone(&builder);
            let permits = Arc::clone(&permits);
            let path = entry.path().to_path_buf();
            let max_block_size = config.max_block_size;
            uploads.spawn(async move {
                let _permit = permits.acquire_owned().await.expect("semaphore closed");
                let (size, blocks) = put_blocks(&store, &path, max_block_size).await?;
                builder
                    .lock()
                    .expect("lock poisoned")
                    .put_file(&rel, size, blocks)?;
                Ok(())
            });
        } else {
            tracing::warn!(path = %entry.path().display(), "skipping non-regular output entry");
        }
    }

    while let Some(joined) = uploads.join_next().await {
        joined.map_err(|err| WorkerError::Internal(format!("upload task: {err}")))??;
    }

    let tree = {
        let mut guard = builder.lock().expect("lock poisoned");
        std::mem::take(&mut *guard).finish()
    };
    let bytes = codec::serialize(&tree);
    let fileset = filesets.create_bytes(&bytes, Ttl::default_lease()).await?;
    store.put(&tag_path(tag), &bytes).await?;
    tracing::info!(%tag, fileset = %fileset.short_hex(), files = tree.len(), "tagged output tree");
    Ok(fileset)
}

/// Chunk one local file into content-addressed blocks, skipping blocks
/// the store already holds.
async fn put_blocks(
    store: &Arc<dyn ObjectStore>,
    path: &Path,
    max_block_size: usize,
) -> WorkerResult<(u64, Vec<BlockRef>)> {
    let mut file = File::open(path).await?;
    let mut buf = vec![0u8; max_block_size.max(1)];
    let mut blocks = Vec::new();
    let mut total = 0u64;

    loop {
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            break;
        }
        let chunk = &buf[..filled];
        let hash = ContentHasher::BLOCK.hash(chunk);
        let name = block_path(&hash);
        if !store.exists(&name).await {
            store.put(&name, chunk).await?;
        }
        blocks.push(BlockRef::whole(hash, filled as u64));
        total += filled as u64;
        if filled < buf.len() {
            break;
        }
    }
    Ok((total, blocks))
}

async fn write_blocks(
    store: &Arc<dyn ObjectStore>,
    blocks: &[BlockRef],
    dst: &mut (dyn AsyncWrite + Send + Unpin),
) -> WorkerResult<()> {
    for block in blocks {
        let mut reader: Box<dyn AsyncRead + Send + Unpin> = store
            .reader(&block_path(&block.hash), block.offset, block.length)
            .await?;
        tokio::io::copy(&mut reader, dst).await?;
    }
    Ok(())
}

fn spawn_lazy_feeder(
    store: Arc<dyn ObjectStore>,
    blocks: Vec<BlockRef>,
    path: PathBuf,
) -> WorkerResult<JoinHandle<()>> {
    nix::unistd::mkfifo(&path, nix::sys::stat::Mode::from_bits_truncate(0o644))
        .map_err(nix_err)?;
    Ok(tokio::spawn(async move {
        if let Err(err) = feed_fifo(&store, &blocks, &path).await {
            tracing::warn!(path = %path.display(), %err, "lazy input feeder failed");
        }
    }))
}

/// Stream blocks into a named pipe once a reader shows up.
///
/// A plain write-only open would block the thread until the user process
/// opens the pipe; polling with `O_NONBLOCK` keeps the feeder an ordinary
/// abortable task. Once a reader exists, the descriptor is flipped back
/// to blocking so bulk writes don't surface `EAGAIN`.
async fn feed_fifo(
    store: &Arc<dyn ObjectStore>,
    blocks: &[BlockRef],
    path: &Path,
) -> WorkerResult<()> {
    let file = loop {
        match std::fs::OpenOptions::new()
            .write(true)
            .custom_flags(nix::fcntl::OFlag::O_NONBLOCK.bits())
            .open(path)
        {
            Ok(file) => break file,
            Err(err) if err.raw_os_error() == Some(nix::errno::Errno::ENXIO as i32) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Err(err) => return Err(err.into()),
        }
    };

    {
        use std::os::unix::io::AsRawFd;

        let fd = file.as_raw_fd();
        let flags = nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_GETFL).map_err(nix_err)?;
        let mut oflags = nix::fcntl::OFlag::from_bits_truncate(flags);
        oflags.remove(nix::fcntl::OFlag::O_NONBLOCK);
        nix::fcntl::fcntl(fd, nix::fcntl::FcntlArg::F_SETFL(oflags)).map_err(nix_err)?;
    }

    let mut file = File::from_std(file);
    write_blocks(store, blocks, &mut file).await?;
    file.flush().await?;
    Ok(())
}

fn nix_err(errno: nix::errno::Errno) -> WorkerError {
    WorkerError::Io(std::io::Error::from_raw_os_error(errno as i32))
}
