//! Accepting download calls - validation, the busy slot and spawning.

use crate::error::DownloadError;
use crate::transfer::{EventEmitter, TransferTask};
use crate::types::{PlatformType, TransferId, VideoQuality};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::mpsc;

use super::pipeline::{self, PipelineContext};
use super::{DownloadEvents, Downloader, lock_slot};

/// Check that `url` is a non-empty, well-formed absolute URL
pub(crate) fn validate_url(url: &str) -> Result<url::Url, DownloadError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(DownloadError::InvalidUrl("URL is empty".to_string()));
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    if parsed.cannot_be_a_base() || parsed.host_str().is_none_or(str::is_empty) {
        return Err(DownloadError::InvalidUrl(format!(
            "{}: not an absolute URL",
            trimmed
        )));
    }

    Ok(parsed)
}

impl Downloader {
    /// Start downloading the media behind `url`
    ///
    /// Returns immediately. Results arrive on the returned [`DownloadEvents`]:
    /// zero or more progress events followed by exactly one terminal event
    /// ([`Event::Completed`](crate::Event::Completed) or
    /// [`Event::Failed`](crate::Event::Failed)), unless the transfer is
    /// cancelled, in which case the channel closes without a terminal event.
    /// Dropping the returned handle cancels the transfer.
    ///
    /// Must be called from within a Tokio runtime; outside of one the call fails
    /// with a transport fault.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: Downloader) {
    /// let mut events = downloader.download(
    ///     "https://youtu.be/dQw4w9WgXcQ",
    ///     PlatformType::YouTube,
    ///     VideoQuality::P720,
    /// );
    /// while let Some(event) = events.recv().await {
    ///     match event {
    ///         Event::Progress(p) => println!("progress: {:?}", p.fraction()),
    ///         Event::Completed(file) => println!("saved to {}", file.path().display()),
    ///         Event::Failed(e) => println!("failed: {}", e.user_message()),
    ///     }
    /// }
    /// # }
    /// ```
    pub fn download(&self, url: &str, platform: PlatformType, quality: VideoQuality) -> DownloadEvents {
        match self.try_download(url, platform, quality) {
            Ok(events) => events,
            Err(e) => DownloadEvents::failed(e),
        }
    }

    /// Start downloading, reporting a rejected call up front
    ///
    /// Same as [`download`](Self::download), except that a call rejected before
    /// any transfer starts ([`DownloadError::InvalidUrl`], [`DownloadError::Busy`]
    /// or a missing runtime) returns the error instead of a channel holding it.
    /// An `Ok` result means the call now owns this downloader's transfer slot.
    pub fn try_download(
        &self,
        url: &str,
        platform: PlatformType,
        quality: VideoQuality,
    ) -> Result<DownloadEvents, DownloadError> {
        if let Err(e) = validate_url(url) {
            tracing::warn!(owner_id = self.owner.0, error = %e, "Rejected download with invalid URL");
            return Err(e);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            tracing::error!(owner_id = self.owner.0, error = %e, "Download called outside of a Tokio runtime");
            DownloadError::TransportFault(e.to_string())
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let task = {
            let mut slot = lock_slot(&self.active);
            // A cancelled task may still occupy the slot while its future winds down
            if let Some(running) = slot.as_ref()
                && !running.is_cancelled()
            {
                tracing::warn!(
                    owner_id = self.owner.0,
                    transfer_id = running.id().0,
                    "Rejected download while another transfer is active"
                );
                return Err(DownloadError::Busy);
            }

            let id = TransferId(self.next_transfer_id.fetch_add(1, Ordering::Relaxed));
            let task = Arc::new(TransferTask::new(
                id,
                self.owner,
                &self.config.transfer.temp_dir,
                EventEmitter::new(tx),
            ));
            self.services.registry.register(&task);
            *slot = Some(Arc::clone(&task));
            task
        };

        tracing::info!(
            owner_id = self.owner.0,
            transfer_id = task.id().0,
            %platform,
            %quality,
            "Download accepted"
        );

        let events = DownloadEvents::new(rx, Arc::clone(&task));
        let ctx = PipelineContext {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            services: self.services.clone(),
            slot: Arc::clone(&self.active),
        };
        let url = url.trim().to_string();
        runtime.spawn(pipeline::run(ctx, task, url, platform, quality));

        Ok(events)
    }
}
