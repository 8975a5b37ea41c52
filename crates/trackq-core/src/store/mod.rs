//! Shared download state: pending FIFO queue plus one record per track.
//!
//! The store is an explicit handle (cheap to clone) given to the scheduler
//! loop, the drivers and the presentation layer. The loop only admits and
//! counts; a driver is the only writer of the record it was admitted with.
//! Every mutation bumps a `watch` version so observers can re-render.

mod record;
mod slot;

pub use record::{DownloadRecord, DownloadStatus, Outcome};
pub use slot::Slot;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

use crate::quality::Quality;
use crate::track::TrackRef;

/// Result of `enqueue`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EnqueueSummary {
    /// Tracks that became queued.
    pub added: usize,
    /// Tracks rejected because the same identity is already queued or downloading.
    pub skipped: usize,
}

/// Decision for one scheduling tick.
#[derive(Debug)]
pub enum Admission {
    /// Head of the queue, removed and holding a slot.
    Admitted { slot: Slot, track: TrackRef },
    /// Something is in flight (at capacity, or nothing else queued).
    Busy,
    /// Queue empty and nothing in flight.
    Idle,
}

struct Inner {
    queue: VecDeque<TrackRef>,
    records: HashMap<String, DownloadRecord>,
    order: Vec<String>,
    in_flight: HashSet<String>,
    max_concurrent: usize,
}

struct Shared {
    inner: Mutex<Inner>,
    version: watch::Sender<u64>,
}

#[derive(Clone)]
pub struct DownloadStore {
    shared: Arc<Shared>,
}

impl DownloadStore {
    pub fn new(max_concurrent: usize) -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    queue: VecDeque::new(),
                    records: HashMap::new(),
                    order: Vec::new(),
                    in_flight: HashSet::new(),
                    max_concurrent: max_concurrent.max(1),
                }),
                version,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump(&self) {
        self.shared.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Change notifications; the value is a monotonically increasing version.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.version.subscribe()
    }

    /// Appends tracks to the pending queue.
    ///
    /// A track whose identity is already queued or downloading is skipped,
    /// and so is a track whose remote id is shared by an active record (both
    /// would listen on the same progress stream). A track with a final (or
    /// no) record gets a fresh queued record.
    pub fn enqueue(&self, tracks: impl IntoIterator<Item = TrackRef>) -> EnqueueSummary {
        let mut summary = EnqueueSummary::default();
        {
            let mut inner = self.lock();
            for track in tracks {
                let key = track.id.clone();
                let remote_id = track.remote_id();
                let busy = inner.in_flight.contains(&key)
                    || inner.records.values().any(|r| {
                        !r.status.is_final()
                            && (r.track.id == key
                                || (remote_id.is_some() && r.track.remote_id() == remote_id))
                    });
                if busy {
                    tracing::debug!(track = %key, "already queued or downloading; skipped");
                    summary.skipped += 1;
                    continue;
                }
                if inner.records.contains_key(&key) {
                    inner.order.retain(|k| k != &key);
                }
                inner.order.push(key.clone());
                inner
                    .records
                    .insert(key, DownloadRecord::queued(track.clone()));
                inner.queue.push_back(track);
                summary.added += 1;
            }
        }
        if summary.added > 0 {
            self.bump();
        }
        summary
    }

    /// Takes the head of the queue if a slot is free. Removal from the queue
    /// and slot reservation happen under one lock.
    pub fn admit_next(&self) -> Admission {
        let mut inner = self.lock();
        if inner.in_flight.len() >= inner.max_concurrent {
            return Admission::Busy;
        }
        let Some(track) = inner.queue.pop_front() else {
            return if inner.in_flight.is_empty() {
                Admission::Idle
            } else {
                Admission::Busy
            };
        };
        let key = track.id.clone();
        inner.in_flight.insert(key.clone());
        drop(inner);
        Admission::Admitted {
            slot: Slot {
                store: self.clone(),
                key,
            },
            track,
        }
    }

    pub(crate) fn release_slot(&self, key: &str) {
        let orphaned = {
            let mut inner = self.lock();
            inner.in_flight.remove(key);
            match inner.records.get_mut(key) {
                Some(rec) if !rec.status.is_final() => {
                    rec.finalize(Outcome::Failed {
                        message: "Download aborted".to_string(),
                    });
                    true
                }
                _ => false,
            }
        };
        if orphaned {
            tracing::warn!(track = %key, "slot released before the record was finalized");
        }
        self.bump();
    }

    /// Queued → downloading, progress 0, at `quality`.
    pub fn mark_downloading(&self, key: &str, quality: Quality) {
        self.update(key, |rec| {
            if rec.status.is_final() {
                return false;
            }
            rec.status = DownloadStatus::Downloading;
            rec.progress = 0;
            rec.quality = Some(quality);
            true
        });
    }

    /// Sets progress of a downloading record (clamped to 100). Returns false
    /// if the record is not downloading.
    pub fn set_progress(&self, key: &str, progress: u8) -> bool {
        self.update(key, |rec| {
            if rec.status != DownloadStatus::Downloading {
                return false;
            }
            let progress = progress.min(100);
            if rec.progress == progress {
                return false;
            }
            rec.progress = progress;
            true
        })
    }

    /// Fallback retry: same record, progress back to 0, new tier.
    pub fn restart_at(&self, key: &str, quality: Quality) {
        self.update(key, |rec| {
            if rec.status != DownloadStatus::Downloading {
                return false;
            }
            rec.progress = 0;
            rec.quality = Some(quality);
            true
        });
    }

    /// Finalizes a record exactly once. Returns false if it was already final.
    pub fn finish(&self, key: &str, outcome: Outcome) -> bool {
        self.update(key, |rec| {
            if rec.status.is_final() {
                return false;
            }
            rec.finalize(outcome);
            true
        })
    }

    fn update(&self, key: &str, f: impl FnOnce(&mut DownloadRecord) -> bool) -> bool {
        let changed = {
            let mut inner = self.lock();
            match inner.records.get_mut(key) {
                Some(rec) => f(rec),
                None => false,
            }
        };
        if changed {
            self.bump();
        }
        changed
    }

    pub fn record(&self, key: &str) -> Option<DownloadRecord> {
        self.lock().records.get(key).cloned()
    }

    /// All records in enqueue order.
    pub fn snapshot(&self) -> Vec<DownloadRecord> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|k| inner.records.get(k).cloned())
            .collect()
    }

    pub fn queue_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    pub fn downloading_count(&self) -> usize {
        self.lock()
            .records
            .values()
            .filter(|r| r.status == DownloadStatus::Downloading)
            .count()
    }

    pub fn max_concurrent(&self) -> usize {
        self.lock().max_concurrent
    }

    /// Changes the concurrency bound; takes effect on the next tick.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.lock().max_concurrent = max_concurrent.max(1);
        self.bump();
    }

    /// Queue empty and nothing in flight.
    pub fn is_drained(&self) -> bool {
        let inner = self.lock();
        inner.queue.is_empty() && inner.in_flight.is_empty()
    }

    /// Resolves once the store is drained.
    pub async fn wait_until_drained(&self) {
        let mut rx = self.subscribe();
        loop {
            if self.is_drained() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
