//! Control socket: server (during `tubeq get`) and client (`tubeq cancel`, `tubeq status`).
//! Protocol: one request per line, one JSON response line each.

use anyhow::{Context, Result};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tubeq_core::control::{self, ControlRequest, ControlResponse};
use tubeq_core::queue::JobQueue;

/// Binds `path` and serves control requests against `queue` until the process exits.
/// Refuses to take over a socket another live `tubeq get` is answering on.
pub fn spawn_control_listener(
    queue: JobQueue,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    if path.exists() {
        if std::os::unix::net::UnixStream::connect(&path).is_ok() {
            anyhow::bail!("another tubeq instance is listening on {}", path.display());
        }
        std::fs::remove_file(&path)
            .with_context(|| format!("remove stale socket {}", path.display()))?;
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let queue = queue.clone();
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            if line.trim().is_empty() {
                                continue;
                            }
                            let resp = control::handle_line(&queue, &line);
                            if write.write_all(resp.to_line().as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Send one request to the running instance and wait for its response.
pub async fn send_request(req: &ControlRequest) -> Result<ControlResponse> {
    let path = control::default_control_socket_path()?;
    if !path.exists() {
        anyhow::bail!(
            "no running `tubeq get` (control socket {} not found)",
            path.display()
        );
    }
    let stream = UnixStream::connect(&path)
        .await
        .with_context(|| format!("connect {}", path.display()))?;
    let (read, mut write) = stream.into_split();
    write.write_all(req.to_line().as_bytes()).await?;
    let line = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("control socket closed without a response")?;
    serde_json::from_str(&line).context("parse control response")
}
