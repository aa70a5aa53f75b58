//! Transfer task - one in-flight HTTP transfer with cancellation and progress.
//!
//! A [`TransferTask`] owns:
//! - a cancellation token
//! - a monotonic progress counter
//! - the destination path of the payload (unique per task)
//! - the sending half of its download call's event channel
//!
//! Cancellation closes the event channel and cancels the token under the same lock
//! that every send takes. Once [`TransferTask::cancel`] returns no further event is
//! delivered, even if a terminal event was being produced on another thread, and
//! [`DownloadEvents`](crate::DownloadEvents) discards anything still buffered. A
//! transfer whose terminal event was already sent cannot be cancelled any more.

use crate::classify::{classify_io, classify_response, classify_transport};
use crate::error::DownloadError;
use crate::types::{Event, OwnerId, Progress, TransferId};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Write buffer for the destination file
const WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Sending half of a download call's event channel
///
/// Progress events can be sent any number of times; the terminal event consumes
/// the sender. Closing drops the sender without sending anything.
pub(crate) struct EventEmitter {
    tx: Mutex<Option<mpsc::UnboundedSender<Event>>>,
}

impl EventEmitter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Event>>> {
        self.tx.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Send a progress event; returns false once the channel is closed
    pub(crate) fn progress(&self, progress: Progress) -> bool {
        match self.lock().as_ref() {
            Some(tx) => tx.send(Event::Progress(progress)).is_ok(),
            None => false,
        }
    }

    /// Send the terminal event and close the channel
    ///
    /// Returns false if the channel was already closed (cancelled or finished).
    pub(crate) fn finish(&self, event: Event) -> bool {
        match self.lock().take() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Close the channel without a terminal event
    ///
    /// `on_close` runs under the lock and only if the channel was still open.
    /// Returns whether this call closed it.
    pub(crate) fn close_with(&self, on_close: impl FnOnce()) -> bool {
        let mut tx = self.lock();
        if tx.take().is_some() {
            on_close();
            true
        } else {
            false
        }
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.lock().is_none()
    }
}

/// Monotonic progress fraction in [0.0, 1.0]
///
/// Stores the f64 bit pattern; for non-negative floats the bit patterns order the
/// same way as the values, so `fetch_max` keeps the counter monotonic.
#[derive(Debug, Default)]
pub(crate) struct ProgressCounter {
    known: AtomicBool,
    bits: AtomicU64,
}

impl ProgressCounter {
    /// Raise the counter to `fraction`; returns true if it moved
    pub(crate) fn advance(&self, fraction: f64) -> bool {
        let fraction = fraction.clamp(0.0, 1.0);
        let was_known = self.known.swap(true, Ordering::AcqRel);
        let previous = self.bits.fetch_max(fraction.to_bits(), Ordering::AcqRel);
        !was_known || previous < fraction.to_bits()
    }

    pub(crate) fn get(&self) -> Progress {
        if self.known.load(Ordering::Acquire) {
            Progress::Fraction(f64::from_bits(self.bits.load(Ordering::Acquire)))
        } else {
            Progress::Indeterminate
        }
    }
}

/// Outcome of a successful transfer, before post-transfer checks
pub(crate) struct TransferOutput {
    pub(crate) file: tempfile::TempPath,
    pub(crate) size_bytes: u64,
}

/// One in-flight network transfer
pub struct TransferTask {
    id: TransferId,
    owner: OwnerId,
    token: CancellationToken,
    progress: ProgressCounter,
    destination: PathBuf,
    pub(crate) events: EventEmitter,
}

impl TransferTask {
    pub(crate) fn new(
        id: TransferId,
        owner: OwnerId,
        temp_dir: &Path,
        events: EventEmitter,
    ) -> Self {
        let destination = temp_dir.join(format!(
            "transfer-{}-{}-{}.part",
            std::process::id(),
            owner,
            id
        ));
        Self {
            id,
            owner,
            token: CancellationToken::new(),
            progress: ProgressCounter::default(),
            destination,
            events,
        }
    }

    /// Transfer identifier
    pub fn id(&self) -> TransferId {
        self.id
    }

    /// Owning downloader
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Latest progress
    pub fn progress(&self) -> Progress {
        self.progress.get()
    }

    /// Where the payload is written while the transfer runs
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Cancel the transfer
    ///
    /// Idempotent. After this returns, no progress or terminal event of this
    /// transfer reaches the caller. Returns false if the transfer was already
    /// cancelled or had already delivered its terminal event.
    pub fn cancel(&self) -> bool {
        let cancelled = self.events.close_with(|| self.token.cancel());
        if cancelled {
            tracing::debug!(transfer_id = self.id.0, owner_id = self.owner.0, "Cancelling transfer");
        }
        cancelled
    }

    /// Whether the transfer was cancelled before it finished
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    fn report(&self, progress: Progress) {
        match progress {
            Progress::Indeterminate => {
                self.events.progress(Progress::Indeterminate);
            }
            Progress::Fraction(f) => {
                if self.progress.advance(f) {
                    self.events.progress(self.progress.get());
                }
            }
        }
    }

    /// Run the HTTP GET and stream the body to the destination path
    ///
    /// Emits progress events while receiving. Does not emit the terminal event;
    /// the caller decides what the outcome means.
    pub(crate) async fn execute(
        &self,
        client: &reqwest::Client,
        url: &str,
        progress_step: f64,
    ) -> Result<TransferOutput, DownloadError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport(&e))?;

        let status = response.status().as_u16();
        tracing::debug!(transfer_id = self.id.0, status, "Transfer response received");

        if !response.status().is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| classify_transport(&e))?;
            return Err(classify_response(status, &body)
                .unwrap_or(DownloadError::BadServerResponse(Some(status))));
        }

        let total = response.content_length().filter(|len| *len > 0);

        if let Some(parent) = self.destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| classify_io(&e))?;
        }
        let file = tokio::fs::File::create(&self.destination)
            .await
            .map_err(|e| classify_io(&e))?;
        // From here on the file is removed if the transfer does not complete
        let temp_path = tempfile::TempPath::from_path(&self.destination);
        let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

        match total {
            Some(_) => self.report(Progress::Fraction(0.0)),
            None => self.report(Progress::Indeterminate),
        }

        let mut received: u64 = 0;
        let mut last_reported = 0.0_f64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify_transport(&e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| classify_io(&e))?;
            received += chunk.len() as u64;

            if let Some(total) = total {
                let fraction = (received as f64 / total as f64).min(1.0);
                let finished = fraction >= 1.0 && last_reported < 1.0;
                if fraction - last_reported >= progress_step || finished {
                    self.report(Progress::Fraction(fraction));
                    last_reported = fraction;
                }
            }
        }

        writer.flush().await.map_err(|e| classify_io(&e))?;

        if let Some(total) = total
            && received < total
        {
            return Err(DownloadError::TransportFault(format!(
                "connection closed after {} of {} bytes",
                received, total
            )));
        }

        tracing::debug!(transfer_id = self.id.0, bytes = received, "Transfer body received");

        Ok(TransferOutput {
            file: temp_path,
            size_bytes: received,
        })
    }
}

impl std::fmt::Debug for TransferTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTask")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("cancelled", &self.is_cancelled())
            .field("progress", &self.progress())
            .field("destination", &self.destination)
            .finish()
    }
}
