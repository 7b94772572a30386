use std::sync::Arc;

use serde::{Deserialize, Serialize};
use silt_commit::CommitStore;
use silt_fileset::FilesetStorage;
use silt_hash::hash_datum;
use silt_obj::ObjectStore;
use silt_types::{CommitRef, FileInfo, PipelineInfo, Tag};
use tokio::sync::Mutex;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::runner;
use crate::transfer::{self, tag_path};

/// One processing request: the datum's file slices, positionally aligned
/// with the pipeline's declared inputs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub data: Vec<FileInfo>,
}

/// The tag under which the datum's output tree is recorded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub tag: Tag,
}

/// The end-to-end coordinator for one worker instance.
///
/// `process` is safe to call concurrently: every caller races the cache
/// probe, but from download onward callers serialize behind a worker-wide
/// mutex because all user processes share one output directory. No
/// cross-worker locking exists or is needed: the output is content
/// addressed, so two workers computing the same datum write byte-identical
/// objects and the later tag write is a harmless overwrite.
pub struct Worker {
    store: Arc<dyn ObjectStore>,
    filesets: Arc<FilesetStorage>,
    pipeline: PipelineInfo,
    config: WorkerConfig,
    output_commit: Option<(Arc<dyn CommitStore>, CommitRef)>,
    user_process: Mutex<()>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        filesets: Arc<FilesetStorage>,
        pipeline: PipelineInfo,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            filesets,
            pipeline,
            config,
            output_commit: None,
            user_process: Mutex::new(()),
        }
    }

    /// Accumulate every produced output fileset into the given commit.
    pub fn with_output_commit(
        mut self,
        commits: Arc<dyn CommitStore>,
        commit: CommitRef,
    ) -> Self {
        self.output_commit = Some((commits, commit));
        self
    }

    /// Process one datum end to end; returns the output tag.
    ///
    /// The tag is deterministic in `(datum, transform)`, and the tag
    /// object is written last, so: a cache hit returns without spawning
    /// the user binary, and any failure before the tag write leaves no
    /// visible cache entry; the next invocation recomputes over whatever
    /// is on disk.
    pub async fn process(&self, req: ProcessRequest) -> WorkerResult<ProcessResponse> {
        // Inputs are fingerprinted sorted by input name, so the tag is
        // stable even if the pipeline author reorders the input list.
        let tag = hash_datum(&req.data, &self.pipeline);

        if self.store.exists(&tag_path(&tag)).await {
            tracing::info!(pipeline = %self.pipeline.name, %tag, "cache hit");
            return Ok(ProcessResponse { tag });
        }
        tracing::info!(pipeline = %self.pipeline.name, %tag, "cache miss, computing");

        // One user process at a time: the shared output directory makes
        // the whole producing window single-tenant, not just the exec.
        let _serial = self.user_process.lock().await;

        let feeders = transfer::download(
            &self.store,
            &self.pipeline.inputs,
            &req.data,
            &self.config.input_root,
        )
        .await?;

        let run_result = runner::run_user_code(&self.pipeline.transform, &self.config.output_root).await;
        // Lazy feeders whose pipe was never opened have nothing left to do.
        for feeder in feeders {
            feeder.abort();
        }
        run_result?;

        let fileset = transfer::upload(&self.store, &self.filesets, &self.config, &tag).await?;

        if let Some((commits, commit)) = &self.output_commit {
            commits.add_fileset(commit, fileset).await?;
        }

        Ok(ProcessResponse { tag })
    }

    /// The tag this worker would compute for a datum, without processing.
    pub fn tag_for(&self, data: &[FileInfo]) -> Tag {
        hash_datum(data, &self.pipeline)
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("pipeline", &self.pipeline.name)
            .field("output_root", &self.config.output_root)
            .finish()
    }
}
