//! Queue scheduler.
//!
//! One background loop admits tracks from the store (FIFO, bounded by the
//! store's concurrency limit) and runs a driver task for each. Stopping
//! cancels every open progress channel and waits for the drivers.

mod run;

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Timing;
use crate::driver::DownloadDriver;
use crate::store::DownloadStore;

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Scheduler {
    store: DownloadStore,
    driver: Arc<DownloadDriver>,
    timing: Timing,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(driver: Arc<DownloadDriver>, timing: Timing) -> Self {
        Self {
            store: driver.store().clone(),
            driver,
            timing,
            running: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawns the loop. Returns false if it is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut running = self.lock();
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return false;
        }
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run::run_loop(
            self.store.clone(),
            Arc::clone(&self.driver),
            self.timing,
            cancel.clone(),
        ));
        *running = Some(Running { cancel, handle });
        tracing::info!(max_concurrent = self.store.max_concurrent(), "scheduler started");
        true
    }

    /// Stops the loop and waits until every in-flight record is final.
    /// No-op when not running.
    pub async fn stop(&self) {
        let Some(running) = self.lock().take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            tracing::error!("scheduler loop join: {}", e);
        }
        tracing::info!("scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BackendClient;
    use crate::auth::CredentialStore;
    use crate::config::DownloadOptions;
    use crate::notify::MemoryNotifier;
    use crate::quality::Quality;
    use crate::store::DownloadStatus;
    use crate::track::TrackRef;
    use std::time::Duration;

    fn scheduler(store: DownloadStore, notifier: Arc<MemoryNotifier>) -> Scheduler {
        let timing = Timing {
            idle_poll: Duration::from_millis(20),
            busy_poll: Duration::from_millis(10),
            ..Timing::default()
        };
        // Nothing listens here; tracks without a remote id never touch it.
        let client = BackendClient::new(
            "http://127.0.0.1:9/api/",
            Arc::new(CredentialStore::default()),
            &timing,
        )
        .unwrap();
        let driver = DownloadDriver::new(
            client,
            store,
            notifier,
            Quality::HiResLossless,
            DownloadOptions::default(),
            timing,
        );
        Scheduler::new(Arc::new(driver), timing)
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_is_a_noop_when_stopped() {
        let store = DownloadStore::new(2);
        let sched = scheduler(store, Arc::new(MemoryNotifier::new()));
        sched.stop().await;
        assert!(sched.start());
        assert!(!sched.start());
        assert!(sched.is_running());
        sched.stop().await;
        assert!(!sched.is_running());
        assert!(sched.start());
        sched.stop().await;
    }

    #[tokio::test]
    async fn tracks_without_remote_id_fail_without_network() {
        let store = DownloadStore::new(1);
        let notifier = Arc::new(MemoryNotifier::new());
        let sched = scheduler(store.clone(), Arc::clone(&notifier));
        store.enqueue([
            TrackRef::new("local-a", "A", "One"),
            TrackRef::new("local-b", "B", "Two"),
        ]);
        sched.start();
        tokio::time::timeout(Duration::from_secs(5), store.wait_until_drained())
            .await
            .expect("drained");
        sched.stop().await;

        for rec in store.snapshot() {
            assert_eq!(rec.status, DownloadStatus::Failed);
            assert_eq!(rec.error_message.as_deref(), Some("Track ID is missing"));
        }
        assert_eq!(notifier.notices().len(), 2);
    }
}
