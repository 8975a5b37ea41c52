//! The scheduler loop: admit from the store, spawn a driver per admitted track.

use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Timing;
use crate::driver::DownloadDriver;
use crate::store::{Admission, DownloadStore};

/// Runs until `cancel` fires, then waits for in-flight drivers to finalize.
///
/// Each tick fills free slots from the head of the queue, then sleeps the
/// busy or idle interval. A finished driver or a store change (enqueue,
/// bound change) wakes the loop early.
pub(super) async fn run_loop(
    store: DownloadStore,
    driver: Arc<DownloadDriver>,
    timing: Timing,
    cancel: CancellationToken,
) {
    let mut join_set = JoinSet::new();
    let mut changes = store.subscribe();

    loop {
        let pause = loop {
            match store.admit_next() {
                Admission::Admitted { slot, track } => {
                    tracing::debug!(track = %track.id, in_flight = store.in_flight(), "admitted");
                    let driver = Arc::clone(&driver);
                    let token = cancel.child_token();
                    join_set.spawn(async move {
                        let _slot = slot;
                        driver.drive(track, token).await;
                    });
                }
                Admission::Busy => break timing.busy_poll,
                Admission::Idle => break timing.idle_poll,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(res) = join_set.join_next(), if !join_set.is_empty() => {
                if let Err(e) = res {
                    tracing::error!("download task join: {}", e);
                }
            }
            _ = changes.changed() => {}
            _ = tokio::time::sleep(pause) => {}
        }
    }

    if !join_set.is_empty() {
        tracing::info!(in_flight = join_set.len(), "stopping; waiting for in-flight downloads");
    }
    while let Some(res) = join_set.join_next().await {
        if let Err(e) = res {
            tracing::error!("download task join: {}", e);
        }
    }
}
