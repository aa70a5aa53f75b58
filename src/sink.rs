//! Media library sink and permission gate seams.
//!
//! The downloader checks [`MediaSink::is_compatible`] before reporting a
//! completion; the session calls [`MediaSink::commit`] afterwards.
//! [`PermissionGate::ensure_granted`] runs before any transfer starts.

use crate::error::DownloadError;
use crate::types::DownloadType;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::AsyncReadExt;

/// Bytes read from the start of a file for format sniffing
const SNIFF_LEN: usize = 16;

/// Destination that persists finished files into the device media store
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Whether the file at `path` can be stored as `kind`
    async fn is_compatible(&self, path: &Path, kind: DownloadType) -> bool;

    /// Persist the file; fails with [`DownloadError::NotCompatible`] if it cannot be stored
    async fn commit(&self, path: &Path, kind: DownloadType) -> Result<(), DownloadError>;
}

/// Access check for the media library
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Succeeds when access is granted; otherwise [`DownloadError::PermissionDenied`]
    async fn ensure_granted(&self) -> Result<(), DownloadError>;
}

/// Gate that always grants access (desktop / tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysGranted;

#[async_trait]
impl PermissionGate for AlwaysGranted {
    async fn ensure_granted(&self) -> Result<(), DownloadError> {
        Ok(())
    }
}

/// Gate whose answer can be flipped at runtime
#[derive(Debug, Default)]
pub struct StaticGate {
    granted: AtomicBool,
}

impl StaticGate {
    /// Create a gate with the given initial answer
    pub fn new(granted: bool) -> Self {
        Self {
            granted: AtomicBool::new(granted),
        }
    }

    /// Change the answer
    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }
}

#[async_trait]
impl PermissionGate for StaticGate {
    async fn ensure_granted(&self) -> Result<(), DownloadError> {
        if self.granted.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DownloadError::PermissionDenied)
        }
    }
}

/// Detected container format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    IsoMedia,
    Heic,
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl Format {
    fn sniff(header: &[u8]) -> Option<Format> {
        if header.len() >= 12 && &header[4..8] == b"ftyp" {
            return match &header[8..12] {
                b"heic" | b"heix" | b"mif1" | b"msf1" => Some(Format::Heic),
                _ => Some(Format::IsoMedia),
            };
        }
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Format::Jpeg);
        }
        if header.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Format::Png);
        }
        if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
            return Some(Format::Gif);
        }
        if header.len() >= 12 && header.starts_with(b"RIFF") && &header[8..12] == b"WEBP" {
            return Some(Format::WebP);
        }
        None
    }

    fn extension(&self) -> &'static str {
        match self {
            Format::IsoMedia => "mp4",
            Format::Heic => "heic",
            Format::Jpeg => "jpg",
            Format::Png => "png",
            Format::Gif => "gif",
            Format::WebP => "webp",
        }
    }

    fn supports(&self, kind: DownloadType) -> bool {
        match kind {
            DownloadType::Video => matches!(self, Format::IsoMedia),
            DownloadType::Photo => !matches!(self, Format::IsoMedia),
        }
    }
}

/// Sink that copies finished files into a library directory
///
/// Compatibility is decided from the file header: videos must be ISO base media
/// files (mp4 / mov), photos JPEG, PNG, GIF, WebP or HEIC.
#[derive(Debug)]
pub struct DirectorySink {
    library_dir: PathBuf,
    counter: AtomicU64,
}

impl DirectorySink {
    /// Store committed files under `library_dir`
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
            counter: AtomicU64::new(0),
        }
    }

    /// Library location
    pub fn library_dir(&self) -> &Path {
        &self.library_dir
    }

    async fn detect(path: &Path) -> Option<Format> {
        let mut file = tokio::fs::File::open(path).await.ok()?;
        let mut header = [0u8; SNIFF_LEN];
        let mut filled = 0;
        while filled < SNIFF_LEN {
            match file.read(&mut header[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(_) => return None,
            }
        }
        Format::sniff(&header[..filled])
    }
}

#[async_trait]
impl MediaSink for DirectorySink {
    async fn is_compatible(&self, path: &Path, kind: DownloadType) -> bool {
        Self::detect(path)
            .await
            .is_some_and(|format| format.supports(kind))
    }

    async fn commit(&self, path: &Path, kind: DownloadType) -> Result<(), DownloadError> {
        let format = match Self::detect(path).await {
            Some(format) if format.supports(kind) => format,
            _ => return Err(DownloadError::NotCompatible),
        };

        let name = format!(
            "{}-{}.{}",
            chrono::Utc::now().format("%Y%m%d-%H%M%S"),
            self.counter.fetch_add(1, Ordering::Relaxed),
            format.extension()
        );
        let target = self.library_dir.join(name);

        let stored = async {
            tokio::fs::create_dir_all(&self.library_dir).await?;
            tokio::fs::copy(path, &target).await
        }
        .await;
        if let Err(e) = stored {
            tracing::error!(path = %path.display(), target = %target.display(), error = %e, "Failed to store media");
            return Err(DownloadError::NotCompatible);
        }

        tracing::info!(target = %target.display(), ?kind, "Media saved to library");
        Ok(())
    }
}
