//! Shared test helpers for creating Downloader instances in tests.

use crate::config::Config;
use crate::downloader::{Downloader, DownloaderServices};
use crate::resolver::StaticResolver;
use crate::sink::{DirectorySink, MediaSink, StaticGate};
use crate::types::{DownloadType, MediaAsset, MediaDescriptor, PlatformType, VideoQuality};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

/// URL the tests "paste"
pub(crate) const VIDEO_PAGE_URL: &str = "https://youtu.be/dQw4w9WgXcQ";
pub(crate) const PHOTO_PAGE_URL: &str = "https://www.instagram.com/p/C0ffee/";

/// Minimal ISO base media header followed by `len` bytes of filler
pub(crate) fn mp4_payload(len: usize) -> Vec<u8> {
    let mut bytes = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom".to_vec();
    bytes.resize(bytes.len() + len, 0xAB);
    bytes
}

/// JPEG SOI/APP0 header followed by filler
pub(crate) fn jpeg_payload(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    bytes.resize(bytes.len() + len, 0x11);
    bytes
}

pub(crate) fn video_descriptor(asset_url: String) -> MediaDescriptor {
    MediaDescriptor {
        title: Some("Test video".to_string()),
        kind: DownloadType::Video,
        qualities: vec![VideoQuality::P360, VideoQuality::P720],
        assets: vec![MediaAsset {
            url: asset_url,
            kind: DownloadType::Video,
            quality: Some(VideoQuality::P720),
        }],
    }
}

pub(crate) fn photo_descriptor(asset_url: String) -> MediaDescriptor {
    MediaDescriptor {
        title: None,
        kind: DownloadType::Photo,
        qualities: vec![],
        assets: vec![MediaAsset {
            url: asset_url,
            kind: DownloadType::Photo,
            quality: None,
        }],
    }
}

/// A downloader wired to in-memory collaborators
pub(crate) struct TestDownloader {
    pub(crate) downloader: Downloader,
    pub(crate) resolver: StaticResolver,
    pub(crate) gate: Arc<StaticGate>,
    pub(crate) config: Config,
    /// Keeps the temp and library directories alive
    pub(crate) dir: tempfile::TempDir,
}

impl TestDownloader {
    /// Register `descriptor` for the YouTube test URL
    pub(crate) fn serve_video(&self, descriptor: MediaDescriptor) {
        self.resolver
            .insert(VIDEO_PAGE_URL, PlatformType::YouTube, descriptor);
    }

    /// Register `descriptor` for the Instagram test URL
    pub(crate) fn serve_photo(&self, descriptor: MediaDescriptor) {
        self.resolver
            .insert(PHOTO_PAGE_URL, PlatformType::Instagram, descriptor);
    }

    /// Payload files currently left in the temp directory
    pub(crate) fn leftover_payloads(&self) -> usize {
        match std::fs::read_dir(&self.config.transfer.temp_dir) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.transfer.temp_dir = dir.join("temp");
    config.transfer.timeout = Some(Duration::from_secs(10));
    config.transfer.connect_timeout = Duration::from_secs(5);
    config
}

/// Create a downloader with a static resolver, a directory sink and a granted gate
pub(crate) fn create_test_downloader() -> TestDownloader {
    create_test_downloader_with(|_| {})
}

/// Same as [`create_test_downloader`] but lets the test tweak the configuration
pub(crate) fn create_test_downloader_with(tweak: impl FnOnce(&mut Config)) -> TestDownloader {
    build_test_downloader(tweak, None)
}

/// Same as [`create_test_downloader`] with a custom media sink
pub(crate) fn create_test_downloader_with_sink(sink: Arc<dyn MediaSink>) -> TestDownloader {
    build_test_downloader(|_| {}, Some(sink))
}

fn build_test_downloader(
    tweak: impl FnOnce(&mut Config),
    sink: Option<Arc<dyn MediaSink>>,
) -> TestDownloader {
    let dir = tempdir().unwrap();
    let mut config = test_config(dir.path());
    tweak(&mut config);

    let resolver = StaticResolver::new();
    let gate = Arc::new(StaticGate::new(true));
    let sink = sink.unwrap_or_else(|| {
        Arc::new(DirectorySink::new(dir.path().join("library"))) as Arc<dyn MediaSink>
    });

    let services = DownloaderServices::new(Arc::new(resolver.clone()), sink)
        .with_permission_gate(gate.clone());
    let downloader = Downloader::new(config.clone(), services).unwrap();

    TestDownloader {
        downloader,
        resolver,
        gate,
        config,
        dir,
    }
}
