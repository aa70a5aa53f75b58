//! Invalidation and teardown.

use super::{Downloader, lock_slot};

impl Downloader {
    /// Cancel and release every transfer owned by this downloader
    ///
    /// Idempotent and safe to call with no active transfer. Once this returns, no
    /// further event of any cancelled transfer is delivered and their partially
    /// written payloads are removed. Also runs when the downloader is dropped.
    pub fn invalidate_tasks(&self) {
        let active = lock_slot(&self.active).take();

        let mut cancelled = self.services.registry.cancel_all(self.owner);
        if let Some(task) = active
            && task.cancel()
        {
            cancelled += 1;
        }

        if cancelled > 0 {
            tracing::info!(owner_id = self.owner.0, cancelled, "Invalidated transfers");
        }
    }
}
