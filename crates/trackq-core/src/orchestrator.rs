//! Facade handed to the presentation layer: enqueue tracks, observe records,
//! start and stop the scheduler.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::BackendClient;
use crate::auth::{CredentialSource, CredentialStore};
use crate::config::{DownloadOptions, Timing, TrackqConfig};
use crate::driver::DownloadDriver;
use crate::notify::Notifier;
use crate::quality::Quality;
use crate::scheduler::Scheduler;
use crate::store::{DownloadRecord, DownloadStore, EnqueueSummary};
use crate::track::TrackRef;

/// Resolved settings for one orchestrator.
#[derive(Debug, Clone)]
pub struct Settings {
    pub backend_url: String,
    pub max_concurrent: usize,
    pub quality: Quality,
    pub options: DownloadOptions,
    pub timing: Timing,
}

impl Settings {
    pub fn from_config(cfg: &TrackqConfig) -> Self {
        Self {
            backend_url: cfg.backend_url.clone(),
            max_concurrent: cfg.max_concurrent_downloads,
            quality: cfg.quality,
            options: cfg.download_options(),
            timing: cfg.timing(),
        }
    }
}

pub struct Orchestrator {
    store: DownloadStore,
    scheduler: Scheduler,
}

impl Orchestrator {
    pub fn new(
        settings: Settings,
        credentials: Arc<dyn CredentialSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let client = BackendClient::new(&settings.backend_url, credentials, &settings.timing)?;
        let store = DownloadStore::new(settings.max_concurrent);
        let driver = DownloadDriver::new(
            client,
            store.clone(),
            notifier,
            settings.quality,
            settings.options,
            settings.timing,
        );
        let scheduler = Scheduler::new(Arc::new(driver), settings.timing);
        Ok(Self { store, scheduler })
    }

    /// Builds an orchestrator with credentials taken from the config.
    pub fn from_config(cfg: &TrackqConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let credentials = Arc::new(CredentialStore::new(cfg.credentials()));
        Self::new(Settings::from_config(cfg), credentials, notifier)
    }

    pub fn enqueue(&self, tracks: impl IntoIterator<Item = TrackRef>) -> EnqueueSummary {
        let summary = self.store.enqueue(tracks);
        tracing::info!(added = summary.added, skipped = summary.skipped, "enqueued");
        summary
    }

    /// Snapshot of every record, in enqueue order.
    pub fn records(&self) -> Vec<DownloadRecord> {
        self.store.snapshot()
    }

    pub fn record(&self, id: &str) -> Option<DownloadRecord> {
        self.store.record(id)
    }

    /// Fires whenever a record, the queue or the bound changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.store.subscribe()
    }

    pub fn start(&self) -> bool {
        self.scheduler.start()
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub async fn wait_until_drained(&self) {
        self.store.wait_until_drained().await
    }

    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.store.set_max_concurrent(max_concurrent);
    }

    pub fn store(&self) -> &DownloadStore {
        &self.store
    }
}
