// ABOUTME: Worker process spawning and bidirectional stdio relay
// ABOUTME: Host stdin flows to the worker, worker stdout flows back to the host until the worker exits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Engify.ai

use std::process::{ExitStatus, Stdio};

use tokio::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use super::handoff::HandoffFrame;
use crate::config::environment::{HandoffMode, LauncherConfig};
use crate::errors::{AppError, AppResult};

/// Start the worker with piped stdin/stdout and the launcher's stderr
///
/// # Errors
/// Returns an error if the worker executable cannot be started
pub fn spawn_worker(config: &LauncherConfig, frame: &HandoffFrame) -> AppResult<Child> {
    let mut command = Command::new(&config.worker_program);
    command
        .args(&config.worker_args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    // Stdin mode adds nothing to argv; the frame is written to the pipe by the caller
    if config.handoff == HandoffMode::Argv {
        command
            .arg(frame.user_id.as_str())
            .arg(frame.access_token.expose());
    }

    let child = command.spawn().map_err(|e| {
        AppError::internal(format!(
            "Failed to start worker {}: {e}",
            config.worker_program.display()
        ))
    })?;
    debug!(pid = ?child.id(), handoff = ?config.handoff, "Worker spawned");
    Ok(child)
}

/// Pipe `host_in` into the worker and the worker's stdout into `host_out`.
///
/// Returns once the worker has exited and its output has been drained. Host EOF
/// closes the worker's stdin so it can shut down on its own.
///
/// # Errors
/// Returns an error if the worker's pipes are unavailable or waiting on it fails
pub async fn relay<R, W>(mut child: Child, host_in: R, host_out: W) -> AppResult<ExitStatus>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut worker_in = child
        .stdin
        .take()
        .ok_or_else(|| AppError::internal("Worker stdin is not piped"))?;
    let mut worker_out = child
        .stdout
        .take()
        .ok_or_else(|| AppError::internal("Worker stdout is not piped"))?;

    let inbound = tokio::spawn(async move {
        let mut host_in = host_in;
        let copied = io::copy(&mut host_in, &mut worker_in).await;
        if let Err(e) = worker_in.shutdown().await {
            debug!(error = %e, "Worker stdin already closed");
        }
        copied
    });

    let outbound = tokio::spawn(async move {
        let mut host_out = host_out;
        let copied = io::copy(&mut worker_out, &mut host_out).await?;
        host_out.flush().await?;
        Ok::<u64, io::Error>(copied)
    });

    let status = child
        .wait()
        .await
        .map_err(|e| AppError::internal(format!("Failed to wait for worker: {e}")))?;

    // The host may never close stdin; stop pumping once nobody reads it
    inbound.abort();

    match outbound.await {
        Ok(Ok(bytes)) => debug!(bytes, "Worker output drained"),
        Ok(Err(e)) => warn!(error = %e, "Relaying worker output failed"),
        Err(e) => warn!(error = %e, "Output relay task failed"),
    }

    debug!(?status, "Worker exited");
    Ok(status)
}
