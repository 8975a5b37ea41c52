//! Control socket: server (during `trackq run`) and client (`add`, `status`, `stop`).
//! One request line per connection; the reply is written and the connection closed.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use trackq_core::control::{self, ControlRequest};
use trackq_core::Orchestrator;

/// Binds `path` and spawns a task answering control requests against `orch`.
/// A `stop` request fires `stop`.
pub fn spawn_control_listener(
    orch: Arc<Orchestrator>,
    stop: Arc<Notify>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path: PathBuf = path.as_ref().to_path_buf();
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create control socket dir {}", dir.display()))?;
    }
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;

    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let orch = Arc::clone(&orch);
                    let stop = Arc::clone(&stop);
                    tokio::spawn(async move {
                        if let Err(e) = serve_one(stream, &orch, &stop).await {
                            tracing::debug!("control connection: {:#}", e);
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn serve_one(stream: UnixStream, orch: &Orchestrator, stop: &Notify) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut line = String::new();
    BufReader::new(read).read_line(&mut line).await?;

    let reply = match ControlRequest::parse(&line) {
        Ok(ControlRequest::Enqueue(tracks)) => control::added_reply(orch.enqueue(tracks)),
        Ok(ControlRequest::Status) => control::status_reply(&orch.records())?,
        Ok(ControlRequest::Stop) => {
            tracing::info!("stop requested over control socket");
            stop.notify_one();
            "ok\n".to_string()
        }
        Err(e) => control::error_reply(&e),
    };
    write.write_all(reply.as_bytes()).await?;
    write.shutdown().await?;
    Ok(())
}

/// Sends one request and returns the full reply.
pub async fn request(socket_path: &Path, req: &ControlRequest) -> Result<String> {
    if !socket_path.exists() {
        bail!(
            "no running trackq instance (control socket {} not found)",
            socket_path.display()
        );
    }
    let mut stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect {}", socket_path.display()))?;
    stream.write_all(req.to_line()?.as_bytes()).await?;
    stream.shutdown().await?;
    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;
    Ok(reply)
}
