use std::path::Path;
use std::process::Stdio;

use silt_types::Transform;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{WorkerError, WorkerResult};

/// Run the user binary for one datum.
///
/// argv is the transform's command vector, stdin the newline-joined stdin
/// lines plus a trailing newline, stdout/stderr inherited so user output
/// lands in the worker's logs. Exit code 0, or any code the transform
/// declares acceptable, is success; everything else, including death by
/// signal, is a user-code failure.
///
/// Exactly one user process runs at a time per worker: callers hold the
/// worker-wide mutex across the whole producing window, because every
/// user process shares the one output directory.
pub async fn run_user_code(transform: &Transform, output_root: &Path) -> WorkerResult<()> {
    let Some((binary, args)) = transform.cmd.split_first() else {
        return Err(WorkerError::InvalidTransform(
            "transform command is empty".into(),
        ));
    };

    // The output directory must exist before the user binary starts.
    tokio::fs::create_dir_all(output_root).await?;

    let mut child = Command::new(binary)
        .args(args)
        .envs(&transform.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        let mut input = transform.stdin.join("\n");
        input.push('\n');
        // A user binary that never reads stdin closes the pipe early;
        // that is not an error.
        if let Err(err) = stdin.write_all(input.as_bytes()).await {
            tracing::debug!(%err, "user process closed stdin early");
        }
    }

    let status = child.wait().await?;
    match status.code() {
        Some(0) => Ok(()),
        Some(code) if transform.accept_return_codes.contains(&code) => {
            tracing::info!(code, "user code exit accepted by transform");
            Ok(())
        }
        code => {
            tracing::warn!(?code, "user code failed");
            Err(WorkerError::UserCode { code })
        }
    }
}
