//! RAII guard for one in-flight download slot.

use super::DownloadStore;

/// Holds one of the store's concurrency slots; releases it when dropped,
/// so a driver task that ends (or panics) always frees its slot.
#[must_use = "dropping the slot releases it immediately"]
pub struct Slot {
    pub(super) store: DownloadStore,
    pub(super) key: String,
}

impl Slot {
    /// Identity of the admitted track.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.store.release_slot(&self.key);
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot").field("key", &self.key).finish()
    }
}
