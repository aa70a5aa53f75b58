use super::*;
use crate::downloader::{Downloader, DownloaderServices};
use crate::registry::TaskRegistry;
use crate::resolver::StaticResolver;
use crate::sink::{DirectorySink, MediaSink};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Sink that takes its time deciding, so a finished transfer sits in the
/// compatibility check while its progress events wait unread in the channel
struct SlowSink(Duration);

#[async_trait]
impl MediaSink for SlowSink {
    async fn is_compatible(&self, _path: &Path, _kind: DownloadType) -> bool {
        tokio::time::sleep(self.0).await;
        true
    }

    async fn commit(&self, _path: &Path, _kind: DownloadType) -> Result<(), DownloadError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_invalidate_silences_running_transfer() {
    let server = MockServer::start().await;
    mount_slow_payload(
        &server,
        "/media/video.mp4",
        mp4_payload(1024),
        Duration::from_secs(2),
    )
    .await;

    let t = create_test_downloader();
    t.serve_video(video_descriptor(format!("{}/media/video.mp4", server.uri())));

    let events = t
        .downloader
        .download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);
    assert!(t.downloader.is_busy());

    tokio::time::sleep(Duration::from_millis(100)).await;
    t.downloader.invalidate_tasks();
    assert!(!t.downloader.is_busy());

    let outcome = tokio::time::timeout(Duration::from_secs(1), events.wait())
        .await
        .unwrap();
    assert!(outcome.terminal.is_none());

    // The spawned future drops its partial payload once it observes the cancellation
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(t.leftover_payloads(), 0);
}

#[tokio::test]
async fn test_invalidate_twice_is_noop() {
    let t = create_test_downloader();
    t.downloader.invalidate_tasks();
    t.downloader.invalidate_tasks();
    assert!(!t.downloader.is_busy());
    assert_eq!(t.downloader.active_transfer(), None);
}

#[tokio::test]
async fn test_invalidate_after_completion_is_noop() {
    let server = MockServer::start().await;
    mount_payload(&server, "/media/video.mp4", mp4_payload(1024)).await;

    let t = create_test_downloader();
    t.serve_video(video_descriptor(format!("{}/media/video.mp4", server.uri())));

    let outcome = t
        .downloader
        .download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720)
        .wait()
        .await;
    assert!(matches!(outcome.terminal, Some(Event::Completed(_))));

    t.downloader.invalidate_tasks();
    t.downloader.invalidate_tasks();
}

#[tokio::test]
async fn test_new_download_after_invalidate_is_accepted() {
    let server = MockServer::start().await;
    mount_slow_payload(
        &server,
        "/media/video.mp4",
        mp4_payload(1024),
        Duration::from_millis(300),
    )
    .await;

    let t = create_test_downloader();
    t.serve_video(video_descriptor(format!("{}/media/video.mp4", server.uri())));

    let cancelled = t
        .downloader
        .download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);
    t.downloader.invalidate_tasks();

    let retried = t
        .downloader
        .download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720)
        .wait()
        .await;
    assert!(matches!(retried.terminal, Some(Event::Completed(_))));
    assert!(cancelled.wait().await.terminal.is_none());
}

#[tokio::test]
async fn test_dropping_downloader_cancels_transfer() {
    let server = MockServer::start().await;
    mount_slow_payload(
        &server,
        "/media/video.mp4",
        mp4_payload(1024),
        Duration::from_secs(2),
    )
    .await;

    let t = create_test_downloader();
    t.serve_video(video_descriptor(format!("{}/media/video.mp4", server.uri())));

    let events = t
        .downloader
        .download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);
    drop(t.downloader);

    let outcome = tokio::time::timeout(Duration::from_secs(1), events.wait())
        .await
        .unwrap();
    assert!(outcome.terminal.is_none());
}

#[tokio::test]
async fn test_shared_registry_bulk_cancellation() {
    let server = MockServer::start().await;
    mount_slow_payload(
        &server,
        "/media/video.mp4",
        mp4_payload(1024),
        Duration::from_secs(2),
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(TaskRegistry::new());
    let resolver = StaticResolver::new();
    resolver.insert(
        VIDEO_PAGE_URL,
        PlatformType::YouTube,
        video_descriptor(format!("{}/media/video.mp4", server.uri())),
    );

    let make = || {
        let services = DownloaderServices::new(
            Arc::new(resolver.clone()),
            Arc::new(DirectorySink::new(dir.path().join("library"))),
        )
        .with_registry(registry.clone());
        Downloader::new(test_config(dir.path()), services).unwrap()
    };
    let a = make();
    let b = make();
    assert_ne!(a.owner_id(), b.owner_id());

    let events_a = a.download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);
    let events_b = b.download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);
    assert_eq!(registry.total_active(), 2);

    assert_eq!(registry.cancel_all(a.owner_id()), 1);
    let outcome_a = tokio::time::timeout(Duration::from_secs(1), events_a.wait())
        .await
        .unwrap();
    assert!(outcome_a.terminal.is_none());
    assert_eq!(registry.active_count(b.owner_id()), 1);

    assert_eq!(registry.cancel_everything(), 1);
    let outcome_b = tokio::time::timeout(Duration::from_secs(1), events_b.wait())
        .await
        .unwrap();
    assert!(outcome_b.terminal.is_none());
}

#[tokio::test]
async fn test_invalidate_discards_buffered_progress() {
    let server = MockServer::start().await;
    mount_payload(&server, "/media/video.mp4", mp4_payload(4 * 1024)).await;

    let t = create_test_downloader_with_sink(Arc::new(SlowSink(Duration::from_millis(500))));
    t.serve_video(video_descriptor(format!("{}/media/video.mp4", server.uri())));

    let events = t
        .downloader
        .download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);

    // The body is in; progress is buffered and the sink is still deciding
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(t.downloader.active_progress(), Some(Progress::Fraction(1.0)));
    t.downloader.invalidate_tasks();

    let outcome = tokio::time::timeout(Duration::from_secs(2), events.wait())
        .await
        .unwrap();
    assert!(outcome.progress.is_empty(), "delivered after cancellation: {:?}", outcome.progress);
    assert!(outcome.terminal.is_none());
}

#[tokio::test]
async fn test_dropping_event_handle_cancels_transfer() {
    let server = MockServer::start().await;
    mount_slow_payload(
        &server,
        "/media/video.mp4",
        mp4_payload(1024),
        Duration::from_secs(2),
    )
    .await;

    let t = create_test_downloader();
    t.serve_video(video_descriptor(format!("{}/media/video.mp4", server.uri())));

    let events = t
        .downloader
        .download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(t.downloader.is_busy());

    drop(events);
    assert!(!t.downloader.is_busy());

    // The spawned future releases the slot and its partial payload
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(t.downloader.active_transfer(), None);
    assert_eq!(t.downloader.registry().active_count(t.downloader.owner_id()), 0);
    assert_eq!(t.leftover_payloads(), 0);

    let retry = t
        .downloader
        .try_download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);
    assert!(retry.is_ok());
}

#[tokio::test]
async fn test_dropping_handle_after_completion_keeps_result() {
    let server = MockServer::start().await;
    mount_payload(&server, "/media/video.mp4", mp4_payload(1024)).await;

    let t = create_test_downloader();
    t.serve_video(video_descriptor(format!("{}/media/video.mp4", server.uri())));

    let mut events = t
        .downloader
        .download(VIDEO_PAGE_URL, PlatformType::YouTube, VideoQuality::P720);
    let file = loop {
        match events.recv().await {
            Some(Event::Completed(file)) => break file,
            Some(Event::Progress(_)) => continue,
            other => panic!("expected completion, got {:?}", other),
        }
    };
    drop(events);

    assert!(file.path().exists());
    assert!(!t.downloader.is_busy());
}
