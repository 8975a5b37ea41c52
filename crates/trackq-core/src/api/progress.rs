//! Progress channel: one server-sent-event stream per download attempt.
//!
//! A background task reads the stream, writes progress into the store and
//! sends exactly one terminal result over a oneshot. Cancelling the token
//! (or dropping the handle) closes the stream.

use futures_util::StreamExt;
use serde::Deserialize;
use std::future::Future;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::sse::SseDecoder;
use super::BackendClient;
use crate::config::Timing;
use crate::error::DownloadError;
use crate::store::DownloadStore;

/// One decoded progress payload: `{progress?: number, status?: string}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressEvent {
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Pending,
    Completed,
    NotFound,
    Failed,
}

impl ProgressEvent {
    /// Reported percentage, truncated and clamped to 0..=100. Only a
    /// completing event shows 100.
    fn percent(&self) -> Option<u8> {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.floor().clamp(0.0, 100.0) as u8)
    }

    fn verdict(&self) -> Verdict {
        match self.status.as_deref() {
            Some("not_found") => Verdict::NotFound,
            Some("failed") => Verdict::Failed,
            Some("completed") => Verdict::Completed,
            _ if self.progress.map(|p| p >= 100.0).unwrap_or(false) => Verdict::Completed,
            _ => Verdict::Pending,
        }
    }
}

/// Why one stream connection ended without a verdict.
enum Interruption {
    Fatal(DownloadError),
    Lost(String),
}

/// Handle to an armed progress channel. Owned by the driver for one attempt.
pub struct ProgressChannel {
    cancel: CancellationToken,
    result: Option<oneshot::Receiver<Result<(), DownloadError>>>,
}

impl ProgressChannel {
    /// Starts listening for `remote_id`, writing progress into `key`'s record.
    /// The channel is cancelled together with `parent`.
    pub fn open(
        client: BackendClient,
        remote_id: i64,
        store: DownloadStore,
        key: String,
        timing: &Timing,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let (tx, rx) = oneshot::channel();
        let listener = Listener {
            client,
            remote_id,
            store,
            key,
            timing: *timing,
            lost_since: None,
        };
        let token = cancel.clone();
        let ceiling = timing.progress_timeout;
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(DownloadError::Stopped),
                r = tokio::time::timeout(ceiling, listener.run()) => {
                    r.unwrap_or(Err(DownloadError::ChannelTimeout(ceiling)))
                }
            };
            let _ = tx.send(result);
        });
        Self {
            cancel,
            result: Some(rx),
        }
    }

    /// Terminal result of the channel. Cancel-safe; yields once.
    pub async fn wait(&mut self) -> Result<(), DownloadError> {
        let Some(rx) = self.result.as_mut() else {
            return Err(DownloadError::Stopped);
        };
        let result = rx.await.unwrap_or(Err(DownloadError::Stopped));
        self.result = None;
        result
    }

    /// Closes the stream. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ProgressChannel {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Listener {
    client: BackendClient,
    remote_id: i64,
    store: DownloadStore,
    key: String,
    timing: Timing,
    lost_since: Option<Instant>,
}

impl Listener {
    async fn run(mut self) -> Result<(), DownloadError> {
        loop {
            let reason = match self.stream_once().await {
                Ok(()) => return Ok(()),
                Err(Interruption::Fatal(e)) => return Err(e),
                Err(Interruption::Lost(reason)) => reason,
            };
            let since = *self.lost_since.get_or_insert_with(Instant::now);
            let deadline = since + self.timing.reconnect_grace;
            let now = Instant::now();
            if now >= deadline {
                return Err(DownloadError::ChannelConnectionLost(reason));
            }
            tracing::debug!(
                track = %self.key,
                remote_id = self.remote_id,
                "progress stream interrupted ({}); reconnecting",
                reason
            );
            tokio::time::sleep(self.timing.reconnect_delay.min(deadline - now)).await;
        }
    }

    async fn stream_once(&mut self) -> Result<(), Interruption> {
        let response = match self.within_grace(self.client.open_progress(self.remote_id)).await? {
            Ok(r) => r,
            Err(e @ DownloadError::AuthRequired) => return Err(Interruption::Fatal(e)),
            Err(e) => return Err(Interruption::Lost(e.to_string())),
        };
        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        loop {
            match self.within_grace(body.next()).await? {
                Some(Ok(chunk)) => {
                    for payload in decoder.feed(&chunk) {
                        if self.handle(&payload)? {
                            return Ok(());
                        }
                    }
                }
                Some(Err(e)) => return Err(Interruption::Lost(e.to_string())),
                None => {
                    for payload in decoder.finish() {
                        if self.handle(&payload)? {
                            return Ok(());
                        }
                    }
                    return Err(Interruption::Lost("progress stream ended".to_string()));
                }
            }
        }
    }

    /// Applies one payload. Ok(true) once the download completed.
    fn handle(&mut self, payload: &str) -> Result<bool, Interruption> {
        let event: ProgressEvent = match serde_json::from_str(payload) {
            Ok(ev) => ev,
            Err(e) => {
                tracing::warn!(track = %self.key, "ignoring malformed progress event: {}", e);
                return Ok(false);
            }
        };
        self.lost_since = None;
        if let Some(pct) = event.percent() {
            self.store.set_progress(&self.key, pct);
        }
        match event.verdict() {
            Verdict::Pending => Ok(false),
            Verdict::Completed => {
                self.store.set_progress(&self.key, 100);
                Ok(true)
            }
            Verdict::NotFound => Err(Interruption::Fatal(DownloadError::ChannelNotFound)),
            Verdict::Failed => Err(Interruption::Fatal(DownloadError::ChannelFailed)),
        }
    }

    /// While the stream is down, bounds `fut` by the end of the grace window.
    async fn within_grace<F: Future>(&self, fut: F) -> Result<F::Output, Interruption> {
        match self.lost_since {
            Some(since) => {
                tokio::time::timeout_at(since + self.timing.reconnect_grace, fut)
                    .await
                    .map_err(|_| Interruption::Lost("progress stream did not recover".to_string()))
            }
            None => Ok(fut.await),
        }
    }
}
