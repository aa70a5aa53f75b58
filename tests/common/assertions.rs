//! Custom test assertions for end-to-end tests

use media_dl::{DownloadError, DownloadEvents, DownloadedFile, Event, Progress};
use std::time::Duration;

/// Result of waiting for a download's terminal event
#[derive(Debug)]
pub enum WaitResult {
    /// Download completed with a file
    Completed(DownloadedFile),
    /// Download failed
    Failed(DownloadError),
    /// Channel finished without a terminal event (cancelled)
    ChannelClosed,
    /// Timeout waiting for the terminal event
    Timeout,
}

/// Drain `events` until the terminal event, collecting progress on the way
pub async fn wait_for_terminal(
    mut events: DownloadEvents,
    timeout: Duration,
) -> (Vec<Progress>, WaitResult) {
    let mut progress = Vec::new();
    let result = tokio::time::timeout(timeout, async {
        while let Some(event) = events.recv().await {
            match event {
                Event::Progress(p) => progress.push(p),
                Event::Completed(file) => return WaitResult::Completed(file),
                Event::Failed(e) => return WaitResult::Failed(e),
            }
        }
        WaitResult::ChannelClosed
    })
    .await
    .unwrap_or(WaitResult::Timeout);

    (progress, result)
}

/// Assert progress values are within [0, 1] and never decrease
pub fn assert_progress_monotonic(progress: &[Progress]) {
    let mut last = 0.0_f64;
    for p in progress {
        if let Progress::Fraction(f) = *p {
            assert!((0.0..=1.0).contains(&f), "progress {} out of range", f);
            assert!(f >= last, "progress decreased from {} to {}", last, f);
            last = f;
        }
    }
}

/// Unwrap a failure or panic with the actual result
pub fn expect_failure(result: WaitResult) -> DownloadError {
    match result {
        WaitResult::Failed(e) => e,
        other => panic!("expected failure, got {:?}", other),
    }
}

/// Unwrap a completion or panic with the actual result
pub fn expect_completion(result: WaitResult) -> DownloadedFile {
    match result {
        WaitResult::Completed(file) => file,
        other => panic!("expected completion, got {:?}", other),
    }
}
