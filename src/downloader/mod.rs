//! Download orchestration split into focused submodules.
//!
//! The [`Downloader`] struct and its methods are organized by concern:
//! - [`control`] - accepting download calls (validation, busy slot, spawning)
//! - [`pipeline`] - the work a spawned download performs
//! - [`lifecycle`] - invalidation and teardown
//! - [`events`] - the per-call event channel handed back to callers

mod control;
mod events;
mod lifecycle;
mod pipeline;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use events::{DownloadEvents, DownloadOutcome};

use crate::config::Config;
use crate::error::Result;
use crate::registry::TaskRegistry;
use crate::resolver::DetailResolver;
use crate::sink::{AlwaysGranted, MediaSink, PermissionGate};
use crate::transfer::TransferTask;
use crate::types::{OwnerId, Progress, TransferId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Source of owner identifiers, unique per process
static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// External collaborators a downloader talks to
///
/// Every field is a trait object so hosts can plug in their own platform
/// integrations.
#[derive(Clone)]
pub struct DownloaderServices {
    /// Turns user URLs into media descriptors
    pub resolver: Arc<dyn DetailResolver>,
    /// Decides whether a finished payload can be stored
    pub sink: Arc<dyn MediaSink>,
    /// Checked before every transfer
    pub permission: Arc<dyn PermissionGate>,
    /// Shared registry for bulk cancellation (may be shared between downloaders)
    pub registry: Arc<TaskRegistry>,
}

impl DownloaderServices {
    /// Services with an always-granted permission gate and a private registry
    pub fn new(resolver: Arc<dyn DetailResolver>, sink: Arc<dyn MediaSink>) -> Self {
        Self {
            resolver,
            sink,
            permission: Arc::new(AlwaysGranted),
            registry: Arc::new(TaskRegistry::new()),
        }
    }

    /// Replace the permission gate
    pub fn with_permission_gate(mut self, permission: Arc<dyn PermissionGate>) -> Self {
        self.permission = permission;
        self
    }

    /// Use a shared task registry
    pub fn with_registry(mut self, registry: Arc<TaskRegistry>) -> Self {
        self.registry = registry;
        self
    }
}

/// The single transfer slot of a downloader
pub(crate) type ActiveSlot = Arc<Mutex<Option<Arc<TransferTask>>>>;

pub(crate) fn lock_slot(slot: &Mutex<Option<Arc<TransferTask>>>) -> MutexGuard<'_, Option<Arc<TransferTask>>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Orchestrates downloads of resolved media
///
/// A downloader runs at most one transfer at a time. A call made while a
/// transfer is active fails with [`DownloadError::Busy`](crate::DownloadError::Busy)
/// on its own event channel; the running transfer is not affected.
///
/// Dropping the downloader invalidates its transfers, so no orphaned transfer
/// keeps writing to disk.
pub struct Downloader {
    /// Identity of this downloader in the task registry
    pub(crate) owner: OwnerId,
    /// HTTP client used for payload transfers
    pub(crate) client: reqwest::Client,
    /// Configuration (shared with spawned transfers)
    pub(crate) config: Arc<Config>,
    /// External collaborators
    pub(crate) services: DownloaderServices,
    /// The transfer currently running, if any
    pub(crate) active: ActiveSlot,
    /// Source of transfer identifiers
    pub(crate) next_transfer_id: AtomicU64,
}

impl Downloader {
    /// Create a downloader
    ///
    /// Validates the configuration and builds the transfer HTTP client. The temp
    /// directory is created lazily by the first transfer.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{Config, Downloader, DownloaderServices, DirectorySink, HttpDetailResolver};
    /// use std::sync::Arc;
    ///
    /// # fn example() -> media_dl::Result<()> {
    /// let config = Config::default();
    /// let resolver = Arc::new(HttpDetailResolver::new(&config.resolver)?);
    /// let sink = Arc::new(DirectorySink::new("/tmp/library"));
    /// let downloader = Downloader::new(config, DownloaderServices::new(resolver, sink))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: Config, services: DownloaderServices) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.transfer.connect_timeout)
            .user_agent(config.transfer.user_agent.clone())
            .build()?;

        let owner = OwnerId(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed));

        tracing::debug!(
            owner_id = owner.0,
            resolver = services.resolver.name(),
            temp_dir = %config.transfer.temp_dir.display(),
            "Downloader created"
        );

        Ok(Self {
            owner,
            client,
            config: Arc::new(config),
            services,
            active: Arc::new(Mutex::new(None)),
            next_transfer_id: AtomicU64::new(1),
        })
    }

    /// Identity of this downloader in the task registry
    pub fn owner_id(&self) -> OwnerId {
        self.owner
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Task registry this downloader registers its transfers with
    pub fn registry(&self) -> Arc<TaskRegistry> {
        Arc::clone(&self.services.registry)
    }

    /// Identifier of the running transfer, if any
    pub fn active_transfer(&self) -> Option<TransferId> {
        lock_slot(&self.active).as_ref().map(|task| task.id())
    }

    /// Progress of the running transfer, if any
    pub fn active_progress(&self) -> Option<Progress> {
        lock_slot(&self.active).as_ref().map(|task| task.progress())
    }

    /// Whether a transfer is running
    ///
    /// A cancelled transfer that is still winding down does not count.
    pub fn is_busy(&self) -> bool {
        lock_slot(&self.active)
            .as_ref()
            .is_some_and(|task| !task.is_cancelled())
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader")
            .field("owner", &self.owner)
            .field("active_transfer", &self.active_transfer())
            .finish()
    }
}

impl Drop for Downloader {
    fn drop(&mut self) {
        self.invalidate_tasks();
    }
}
