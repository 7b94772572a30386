//! End-to-end worker scenarios: cache behavior, output capture, exit-code
//! handling, and commit accumulation, all against the in-memory object
//! store and real user processes.

use std::sync::Arc;

use silt_commit::{CommitStore, MemCommitStore};
use silt_fileset::FilesetStorage;
use silt_hash::{hash_datum, ContentHasher};
use silt_obj::{InMemoryObjectStore, ObjectStore};
use silt_tree::{codec, HashTree, Node};
use silt_types::{BlockRef, CommitRef, FileInfo, Input, PipelineInfo, Transform};
use silt_worker::{ProcessRequest, Worker, WorkerConfig};
use tempfile::TempDir;

struct Harness {
    mem: InMemoryObjectStore,
    store: Arc<dyn ObjectStore>,
    filesets: Arc<FilesetStorage>,
    dirs: TempDir,
}

impl Harness {
    fn new() -> Self {
        let mem = InMemoryObjectStore::new();
        let store: Arc<dyn ObjectStore> = Arc::new(mem.clone());
        let filesets = Arc::new(FilesetStorage::new(Arc::clone(&store)));
        Self {
            mem,
            store,
            filesets,
            dirs: TempDir::new().unwrap(),
        }
    }

    fn config(&self) -> WorkerConfig {
        WorkerConfig {
            input_root: self.dirs.path().join("in"),
            output_root: self.dirs.path().join("out"),
            max_block_size: 8 * 1024 * 1024,
            upload_parallelism: 4,
        }
    }

    fn worker(&self, pipeline: PipelineInfo) -> Worker {
        Worker::new(
            Arc::clone(&self.store),
            Arc::clone(&self.filesets),
            pipeline,
            self.config(),
        )
    }

    /// Shell transform with OUT and SPY pointing into the harness dirs.
    fn sh(&self, script: &str) -> Transform {
        let mut t = Transform::new(vec!["sh".into(), "-c".into(), script.into()]);
        t.env.insert(
            "OUT".into(),
            self.config().output_root.to_str().unwrap().into(),
        );
        t.env.insert(
            "IN".into(),
            self.config().input_root.to_str().unwrap().into(),
        );
        t.env
            .insert("SPY".into(), self.spy_path().to_str().unwrap().into());
        t
    }

    fn spy_path(&self) -> std::path::PathBuf {
        self.dirs.path().join("spy")
    }

    fn spy_runs(&self) -> usize {
        match std::fs::read_to_string(self.spy_path()) {
            Ok(contents) => contents.lines().count(),
            Err(_) => 0,
        }
    }

    /// Seed one input file's blocks and return its datum slice.
    async fn seed_input(&self, input: &str, path: &str, content: &[u8]) -> FileInfo {
        let hash = ContentHasher::BLOCK.hash(content);
        let name = format!("blocks/{}", hex::encode(hash));
        if !self.store.exists(&name).await {
            self.store.put(&name, content).await.unwrap();
        }
        FileInfo::new(input, path, hex::encode(hash)).with_blocks(
            content.len() as u64,
            vec![BlockRef::whole(hash, content.len() as u64)],
        )
    }

    async fn tagged_tree(&self, tag: &silt_types::Tag) -> HashTree {
        let bytes = self.store.get(&format!("tags/{tag}")).await.unwrap();
        codec::deserialize(&bytes).unwrap()
    }
}

fn pipeline(inputs: Vec<Input>, transform: Transform) -> PipelineInfo {
    PipelineInfo::new("scenario", inputs, transform)
}

fn file_node<'t>(tree: &'t HashTree, path: &str) -> (&'t u64, &'t Vec<BlockRef>) {
    match tree.get(path) {
        Some(Node::File { size, blocks }) => (size, blocks),
        other => panic!("expected file at {path}, found {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// S1: cache hit short-circuits everything
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cache_hit_skips_the_user_process() {
    let h = Harness::new();
    let p = pipeline(
        vec![Input::new("x")],
        h.sh("echo ran >> \"$SPY\""),
    );
    let data = vec![FileInfo::new("x", "f", "h1")];

    // Pre-seed the tag object the datum would produce.
    let tag = hash_datum(&data, &p);
    h.store
        .put(&format!("tags/{tag}"), b"pre-seeded tree bytes")
        .await
        .unwrap();
    let objects_before = h.mem.len();

    let worker = h.worker(p);
    let resp = worker.process(ProcessRequest { data }).await.unwrap();

    assert_eq!(resp.tag, tag);
    assert_eq!(h.spy_runs(), 0, "user binary must not run on a cache hit");
    assert_eq!(h.mem.len(), objects_before, "no new objects on a cache hit");
}

// ---------------------------------------------------------------------------
// S2: empty output still produces a canonical (empty) tagged tree
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_output_produces_the_empty_tree_at_the_tag() {
    let h = Harness::new();
    let p = pipeline(vec![Input::new("x")], Transform::new(vec!["true".into()]));
    let data = vec![FileInfo::new("x", "f", "h1")];
    let expected_tag = hash_datum(&data, &p);

    let resp = h
        .worker(p)
        .process(ProcessRequest { data })
        .await
        .unwrap();

    assert_eq!(resp.tag, expected_tag);
    let bytes = h.store.get(&format!("tags/{}", resp.tag)).await.unwrap();
    assert_eq!(bytes, codec::serialize(&HashTree::empty()));
}

// ---------------------------------------------------------------------------
// S3: a single produced file, and tag idempotence across invocations
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_file_output_and_second_call_hits_the_cache() {
    let h = Harness::new();
    let p = pipeline(
        vec![Input::new("x")],
        h.sh("printf hello > \"$OUT/a.txt\"; echo ran >> \"$SPY\""),
    );
    let data = vec![FileInfo::new("x", "f", "h1")];

    let worker = h.worker(p);
    let first = worker
        .process(ProcessRequest { data: data.clone() })
        .await
        .unwrap();

    let tree = h.tagged_tree(&first.tag).await;
    let (size, blocks) = file_node(&tree, "a.txt");
    assert_eq!(*size, 5);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].hash, ContentHasher::BLOCK.hash(b"hello"));
    assert_eq!(blocks[0].length, 5);

    let second = worker.process(ProcessRequest { data }).await.unwrap();
    assert_eq!(second.tag, first.tag);
    assert_eq!(h.spy_runs(), 1, "user binary runs exactly once across both calls");
}

// ---------------------------------------------------------------------------
// S4: transform-accepted exit codes succeed
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn accepted_exit_code_tags_an_empty_tree() {
    let h = Harness::new();
    let mut transform = h.sh("exit 3");
    transform.accept_return_codes = vec![3];
    let p = pipeline(vec![Input::new("x")], transform);
    let data = vec![FileInfo::new("x", "f", "h1")];

    let resp = h
        .worker(p)
        .process(ProcessRequest { data })
        .await
        .unwrap();

    assert!(h.tagged_tree(&resp.tag).await.is_empty());
}

// ---------------------------------------------------------------------------
// S5: user failure publishes nothing
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn user_failure_leaves_no_tag_behind() {
    let h = Harness::new();
    let p = pipeline(vec![Input::new("x")], Transform::new(vec!["false".into()]));
    let data = vec![FileInfo::new("x", "f", "h1")];
    let tag = hash_datum(&data, &p);

    let err = h
        .worker(p)
        .process(ProcessRequest { data })
        .await
        .unwrap_err();

    assert!(err.is_user_code_failure());
    assert!(
        !h.store.exists(&format!("tags/{tag}")).await,
        "a failed datum must not create a cache entry"
    );
}

// ---------------------------------------------------------------------------
// S6: commit accumulation through the worker
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn later_datum_wins_in_the_accumulated_commit() {
    let h = Harness::new();
    let commits: Arc<dyn CommitStore> =
        Arc::new(MemCommitStore::new(Arc::clone(&h.filesets)));
    let commit = CommitRef::new("repo", "c1");

    let p = pipeline(
        vec![Input::new("x")],
        h.sh("cp \"$IN/x/data.txt\" \"$OUT/p\""),
    );
    let worker = h
        .worker(p)
        .with_output_commit(Arc::clone(&commits), commit.clone());

    let first = h.seed_input("x", "data.txt", b"first").await;
    let second = h.seed_input("x", "data.txt", b"second").await;
    worker
        .process(ProcessRequest { data: vec![first] })
        .await
        .unwrap();
    worker
        .process(ProcessRequest { data: vec![second] })
        .await
        .unwrap();

    let total = commits.get_fileset(&commit).await.unwrap();
    let tree = h.filesets.get(&total).await.unwrap();
    let (_, blocks) = file_node(&tree, "p");
    assert_eq!(blocks[0].hash, ContentHasher::BLOCK.hash(b"second"));
}

// ---------------------------------------------------------------------------
// Empty directories survive the round trip
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn empty_output_directory_is_preserved() {
    let h = Harness::new();
    let p = pipeline(vec![Input::new("x")], h.sh("mkdir -p \"$OUT/empty\""));
    let data = vec![FileInfo::new("x", "f", "h1")];

    let resp = h
        .worker(p)
        .process(ProcessRequest { data })
        .await
        .unwrap();

    let tree = h.tagged_tree(&resp.tag).await;
    assert!(matches!(tree.get("empty"), Some(Node::Directory { .. })));
}

// ---------------------------------------------------------------------------
// Lazy inputs behave exactly like eager ones downstream
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lazy_input_materializes_on_first_read() {
    let h = Harness::new();
    let p = pipeline(
        vec![Input::lazy("x")],
        h.sh("cat \"$IN/x/data.txt\" > \"$OUT/copy\""),
    );
    let data = vec![h.seed_input("x", "data.txt", b"on demand").await];

    let resp = h
        .worker(p)
        .process(ProcessRequest { data })
        .await
        .unwrap();

    let tree = h.tagged_tree(&resp.tag).await;
    let (size, blocks) = file_node(&tree, "copy");
    assert_eq!(*size, 9);
    assert_eq!(blocks[0].hash, ContentHasher::BLOCK.hash(b"on demand"));
}

// ---------------------------------------------------------------------------
// Deterministic tags are exposed without processing
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tag_for_matches_process_output() {
    let h = Harness::new();
    let p = pipeline(vec![Input::new("x")], Transform::new(vec!["true".into()]));
    let data = vec![FileInfo::new("x", "f", "h1")];

    let worker = h.worker(p);
    let predicted = worker.tag_for(&data);
    let resp = worker.process(ProcessRequest { data }).await.unwrap();
    assert_eq!(predicted, resp.tag);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn process_future_is_send() {
    // The coordinator must be callable from spawned tasks.
    let h = Harness::new();
    let p = pipeline(vec![Input::new("x")], Transform::new(vec!["true".into()]));
    let worker = Arc::new(h.worker(p));
    let data = vec![FileInfo::new("x", "f", "h1")];

    let cloned = Arc::clone(&worker);
    let handle = tokio::spawn(async move {
        cloned.process(ProcessRequest { data }).await
    });
    handle.await.unwrap().unwrap();
}
