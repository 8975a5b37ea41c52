//! Single-track download driver.
//!
//! Takes one admitted track to a final record: submit, race the submission
//! against the progress channel, fall back one quality tier when the backend
//! says the tier is unavailable, finalize, notify. Errors stop here.

mod fallback;

pub use fallback::{FallbackDecision, FallbackState, QualityFallback};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::api::{BackendClient, DownloadRequest, ProgressChannel, SubmitOutcome};
use crate::config::{DownloadOptions, Timing};
use crate::error::DownloadError;
use crate::notify::{Notice, Notifier};
use crate::quality::Quality;
use crate::store::{DownloadStore, Outcome};
use crate::track::TrackRef;

pub struct DownloadDriver {
    client: BackendClient,
    store: DownloadStore,
    notifier: Arc<dyn Notifier>,
    quality: Quality,
    options: DownloadOptions,
    timing: Timing,
}

impl DownloadDriver {
    pub fn new(
        client: BackendClient,
        store: DownloadStore,
        notifier: Arc<dyn Notifier>,
        quality: Quality,
        options: DownloadOptions,
        timing: Timing,
    ) -> Self {
        Self {
            client,
            store,
            notifier,
            quality,
            options,
            timing,
        }
    }

    pub fn store(&self) -> &DownloadStore {
        &self.store
    }

    /// Drives `track` to completed or failed. `cancel` is the stop signal.
    pub async fn drive(&self, track: TrackRef, cancel: CancellationToken) {
        let span = tracing::info_span!("drive", track = %track.id);
        self.drive_inner(track, cancel).instrument(span).await
    }

    async fn drive_inner(&self, track: TrackRef, cancel: CancellationToken) {
        let key = track.id.clone();
        let Some(remote_id) = track.remote_id() else {
            self.fail(&track, DownloadError::MissingIdentity);
            return;
        };

        let mut fallback = QualityFallback::new(self.quality);
        self.store.mark_downloading(&key, fallback.quality());

        let result = loop {
            let quality = fallback.quality();
            tracing::debug!(remote_id, quality = %quality, "submitting download");
            match self.attempt(&track, remote_id, quality, &cancel).await {
                Ok(filename) => {
                    fallback.on_success();
                    break Ok(filename);
                }
                Err(err) => match fallback.on_failure(&err) {
                    FallbackDecision::RetryAt(lower) => {
                        tracing::info!(from = %quality, to = %lower, "quality unavailable ({}); retrying", err);
                        self.store.restart_at(&key, lower);
                    }
                    FallbackDecision::GiveUp => break Err(err),
                },
            }
        };

        match result {
            Ok(filename) => {
                tracing::info!(filename = %filename, quality = %fallback.quality(), "download completed");
                self.store.finish(&key, Outcome::Completed { filename });
                if fallback.fell_back() {
                    self.notifier.notify(Notice::warning(format!(
                        "{} downloaded in {} ({} not available)",
                        track.display_name(),
                        fallback.quality(),
                        self.quality
                    )));
                }
            }
            Err(err) if err.is_stopped() => {
                tracing::debug!("download stopped");
                self.store.finish(
                    &key,
                    Outcome::Failed {
                        message: err.to_string(),
                    },
                );
            }
            Err(err) => self.fail(&track, err),
        }
    }

    /// One submission at `quality`. Returns the result filename.
    async fn attempt(
        &self,
        track: &TrackRef,
        remote_id: i64,
        quality: Quality,
        cancel: &CancellationToken,
    ) -> Result<String, DownloadError> {
        let mut channel = ProgressChannel::open(
            self.client.clone(),
            remote_id,
            self.store.clone(),
            track.id.clone(),
            &self.timing,
            cancel,
        );
        let request = DownloadRequest::for_track(track, remote_id, quality, &self.options);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(DownloadError::Stopped),
            submitted = self.client.submit(&request) => match submitted {
                Ok(outcome @ SubmitOutcome::Exists { .. }) => {
                    tracing::debug!("already in library");
                    Ok(outcome.filename().unwrap_or_else(|| track.display_name()))
                }
                Ok(outcome) => channel
                    .wait()
                    .await
                    .map(|()| outcome.filename().unwrap_or_else(|| track.display_name())),
                Err(err) => Err(err),
            },
            finished = channel.wait() => finished.map(|()| track.display_name()),
        };

        channel.close();
        result
    }

    fn fail(&self, track: &TrackRef, err: DownloadError) {
        tracing::warn!("download failed: {}", err);
        let message = err.to_string();
        self.store.finish(
            &track.id,
            Outcome::Failed {
                message: message.clone(),
            },
        );
        self.notifier.notify(Notice::error(format!(
            "Failed to download {}: {}",
            track.display_name(),
            message
        )));
    }
}
