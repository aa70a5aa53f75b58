//! Task registry - weak back-references to every outstanding transfer.
//!
//! The registry never owns a [`TransferTask`]; downloaders do. It exists so that
//! all transfers of one owner (or of the whole process) can be cancelled in bulk,
//! e.g. when a screen that started downloads is torn down.

use crate::transfer::TransferTask;
use crate::types::{OwnerId, TransferId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

type Entries = HashMap<OwnerId, HashMap<TransferId, Weak<TransferTask>>>;

/// Registry of active transfers keyed by owning downloader
#[derive(Default)]
pub struct TaskRegistry {
    entries: Mutex<Entries>,
}

impl TaskRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Track a transfer
    pub fn register(&self, task: &Arc<TransferTask>) {
        self.lock()
            .entry(task.owner())
            .or_default()
            .insert(task.id(), Arc::downgrade(task));
    }

    /// Stop tracking a transfer (no-op if unknown)
    pub fn deregister(&self, owner: OwnerId, id: TransferId) {
        let mut entries = self.lock();
        if let Some(tasks) = entries.get_mut(&owner) {
            tasks.remove(&id);
            if tasks.is_empty() {
                entries.remove(&owner);
            }
        }
    }

    /// Cancel every live transfer of `owner` and forget them
    ///
    /// Returns how many running transfers this call cancelled.
    pub fn cancel_all(&self, owner: OwnerId) -> usize {
        let tasks = self.lock().remove(&owner).unwrap_or_default();

        let mut cancelled = 0;
        for task in tasks.values().filter_map(Weak::upgrade) {
            if task.cancel() {
                cancelled += 1;
            }
        }

        if cancelled > 0 {
            tracing::info!(owner_id = owner.0, cancelled, "Cancelled all transfers of owner");
        }
        cancelled
    }

    /// Cancel every live transfer of every owner
    pub fn cancel_everything(&self) -> usize {
        let owners: Vec<OwnerId> = self.lock().keys().copied().collect();
        owners.into_iter().map(|owner| self.cancel_all(owner)).sum()
    }

    /// Number of live transfers belonging to `owner`
    pub fn active_count(&self, owner: OwnerId) -> usize {
        self.lock()
            .get(&owner)
            .map(|tasks| tasks.values().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    /// Number of live transfers across all owners
    pub fn total_active(&self) -> usize {
        self.lock()
            .values()
            .flat_map(|tasks| tasks.values())
            .filter(|w| w.strong_count() > 0)
            .count()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("total_active", &self.total_active())
            .finish()
    }
}
