//! Caller-visible download state
//!
//! [`DownloadSession`] drives a [`Downloader`] and folds its events into a single
//! [`SessionState`] snapshot. Snapshots are published through a
//! [`tokio::sync::watch`] channel, so observers always see a consistent state and
//! never a half-applied update.

use crate::config::Config;
use crate::downloader::{Downloader, DownloaderServices};
use crate::error::{DownloadError, Result};
use crate::sink::MediaSink;
use crate::types::{DownloadStatus, DownloadedFile, Event, PlatformType, Progress, VideoQuality};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of everything a presentation layer needs to render a download
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SessionState {
    /// Overall status
    pub status: DownloadStatus,
    /// Last numeric progress in [0.0, 1.0]
    pub progress: f64,
    /// A transfer is running and reporting numeric progress
    pub is_downloading: bool,
    /// Work has started but no numeric progress has arrived yet
    pub show_loader: bool,
    /// Error the last download ended with
    pub error: Option<DownloadError>,
    /// Short text for `error`
    pub error_message: Option<String>,
    /// The user must grant media library access in the system settings
    pub show_settings_prompt: bool,
}

/// One screen's worth of download state
///
/// Dropping the session drops its downloader, which invalidates any transfer
/// still running.
pub struct DownloadSession {
    downloader: Downloader,
    sink: Arc<dyn MediaSink>,
    state: watch::Sender<SessionState>,
}

impl DownloadSession {
    /// Wrap an existing downloader; finished files are committed to `sink`
    pub fn new(downloader: Downloader, sink: Arc<dyn MediaSink>) -> Self {
        let (state, _rx) = watch::channel(SessionState::default());
        Self {
            downloader,
            sink,
            state,
        }
    }

    /// Build the downloader and the session in one go
    pub fn from_config(config: Config, services: DownloaderServices) -> Result<Self> {
        let sink = Arc::clone(&services.sink);
        Ok(Self::new(Downloader::new(config, services)?, sink))
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The underlying downloader
    pub fn downloader(&self) -> &Downloader {
        &self.downloader
    }

    /// Download the media behind `url` and commit it to the media sink
    ///
    /// Resolves once the download has ended and returns the final state. A call
    /// made while another download of this session is running leaves the state
    /// untouched; the state is reset only after the call has been accepted.
    pub async fn download_media(
        &self,
        url: &str,
        platform: PlatformType,
        quality: VideoQuality,
    ) -> SessionState {
        let mut events = match self.downloader.try_download(url, platform, quality) {
            Ok(events) => events,
            Err(DownloadError::Busy) => {
                tracing::warn!(owner_id = self.downloader.owner_id().0, "Download already in progress");
                return self.state();
            }
            // A rejected call never overwrites the state of a running download
            Err(_) if self.downloader.is_busy() => return self.state(),
            Err(e) => {
                self.state.send_modify(|s| *s = SessionState::default());
                self.apply_failure(e);
                return self.state();
            }
        };

        // Reset only once the call owns the transfer slot
        self.state.send_modify(|s| {
            *s = SessionState {
                status: DownloadStatus::Downloading,
                show_loader: true,
                ..SessionState::default()
            };
        });

        let mut terminal = None;
        while let Some(event) = events.recv().await {
            match event {
                Event::Progress(progress) => self.apply_progress(progress),
                event => {
                    terminal = Some(event);
                    break;
                }
            }
        }

        match terminal {
            Some(Event::Completed(file)) => self.commit(file).await,
            Some(Event::Failed(e)) => self.apply_failure(e),
            Some(Event::Progress(_)) | None => {
                self.state.send_modify(|s| {
                    s.status = DownloadStatus::None;
                    s.show_loader = false;
                    s.is_downloading = false;
                });
            }
        }

        self.state()
    }

    /// Cancel the running download, if any, and return to idle
    pub fn cancel(&self) {
        self.downloader.invalidate_tasks();
        self.state.send_modify(|s| {
            s.status = DownloadStatus::None;
            s.progress = 0.0;
            s.show_loader = false;
            s.is_downloading = false;
        });
    }

    /// Clear the error and the settings prompt
    pub fn dismiss_error(&self) {
        self.state.send_modify(|s| {
            s.error = None;
            s.error_message = None;
            s.show_settings_prompt = false;
        });
    }

    fn apply_progress(&self, progress: Progress) {
        let Some(fraction) = progress.fraction() else {
            return;
        };
        self.state.send_modify(|s| {
            if s.show_loader {
                s.show_loader = false;
                s.is_downloading = true;
            }
            s.progress = fraction;
        });
    }

    async fn commit(&self, file: DownloadedFile) {
        match self.sink.commit(file.path(), file.kind()).await {
            Ok(()) => {
                self.state.send_modify(|s| {
                    s.status = DownloadStatus::Downloaded;
                    s.show_loader = false;
                    s.is_downloading = false;
                });
            }
            Err(e) => {
                tracing::warn!(path = %file.path().display(), error = %e, "Failed to commit download");
                self.apply_failure(e);
            }
        }
    }

    fn apply_failure(&self, error: DownloadError) {
        self.state.send_modify(|s| {
            s.show_loader = false;
            s.is_downloading = false;
            if error.requires_settings_redirect() {
                s.status = DownloadStatus::None;
                s.show_settings_prompt = true;
            } else {
                s.status = DownloadStatus::Failed;
                s.error_message = Some(error.user_message().to_string());
                s.error = Some(error);
            }
        });
    }
}

impl std::fmt::Debug for DownloadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadSession")
            .field("downloader", &self.downloader)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
