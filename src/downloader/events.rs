//! Per-call event channel.

use crate::error::DownloadError;
use crate::transfer::TransferTask;
use crate::types::{DownloadedFile, Event, Progress};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Receiving half of one download call's events
///
/// Yields zero or more [`Event::Progress`] followed by exactly one terminal
/// event. After the terminal event, or after the transfer was cancelled,
/// [`recv`](Self::recv) returns `None`; events still buffered at the moment of
/// cancellation are discarded.
///
/// Dropping the handle before the terminal event cancels the transfer.
#[derive(Debug)]
pub struct DownloadEvents {
    rx: UnboundedReceiverStream<Event>,
    /// `None` when the call was rejected before a transfer was started
    task: Option<Arc<TransferTask>>,
}

/// Everything one download call produced
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Progress events in delivery order
    pub progress: Vec<Progress>,
    /// Terminal event; `None` if the transfer was cancelled
    pub terminal: Option<Event>,
}

impl DownloadOutcome {
    /// Collapse the terminal event into a result
    ///
    /// `None` when the download was cancelled.
    pub fn into_result(self) -> Option<Result<DownloadedFile, DownloadError>> {
        match self.terminal? {
            Event::Completed(file) => Some(Ok(file)),
            Event::Failed(e) => Some(Err(e)),
            Event::Progress(_) => None,
        }
    }
}

impl DownloadEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Event>, task: Arc<TransferTask>) -> Self {
        Self {
            rx: UnboundedReceiverStream::new(rx),
            task: Some(task),
        }
    }

    /// A channel holding nothing but `error`
    pub(crate) fn failed(error: DownloadError) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Event::Failed(error)).ok();
        Self {
            rx: UnboundedReceiverStream::new(rx),
            task: None,
        }
    }

    /// Next event, or `None` once the channel is finished
    pub async fn recv(&mut self) -> Option<Event> {
        let Some(task) = &self.task else {
            return self.rx.next().await;
        };

        tokio::select! {
            biased;
            _ = task.token().cancelled() => None,
            event = self.rx.next() => event,
        }
    }

    /// Drain the channel until it finishes
    pub async fn wait(mut self) -> DownloadOutcome {
        let mut progress = Vec::new();
        while let Some(event) = self.recv().await {
            match event {
                Event::Progress(p) => progress.push(p),
                terminal => {
                    return DownloadOutcome {
                        progress,
                        terminal: Some(terminal),
                    };
                }
            }
        }
        DownloadOutcome {
            progress,
            terminal: None,
        }
    }

    /// Convert into a [`futures::Stream`] of events
    ///
    /// The stream ends like [`recv`](Self::recv) does; dropping it early cancels
    /// the transfer.
    pub fn into_stream(self) -> BoxStream<'static, Event> {
        futures::stream::unfold(self, |mut events| async move {
            let event = events.recv().await?;
            Some((event, events))
        })
        .boxed()
    }
}

impl Drop for DownloadEvents {
    fn drop(&mut self) {
        if let Some(task) = self.task.take()
            && task.cancel()
        {
            tracing::debug!(transfer_id = task.id().0, "Event handle dropped, transfer cancelled");
        }
    }
}
