//! Core types for media-dl

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::DownloadError;

/// Unique identifier for a single transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(pub u64);

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the downloader that owns a set of transfers
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source platform of a media URL
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformType {
    /// youtube.com / youtu.be
    #[serde(rename = "youtube")]
    YouTube,
    /// instagram.com
    Instagram,
}

impl PlatformType {
    /// Guess the platform from a user-supplied URL
    ///
    /// Anything mentioning `instagram` is treated as Instagram; everything else
    /// is handed to the YouTube resolver, which rejects unsupported domains itself.
    pub fn detect(url: &str) -> Self {
        if url.to_ascii_lowercase().contains("instagram") {
            PlatformType::Instagram
        } else {
            PlatformType::YouTube
        }
    }

    /// Path segment used by the resolver API
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::YouTube => "youtube",
            PlatformType::Instagram => "instagram",
        }
    }
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested resolution tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VideoQuality {
    /// 144p
    #[serde(rename = "144p")]
    P144,
    /// 240p
    #[serde(rename = "240p")]
    P240,
    /// 360p
    #[serde(rename = "360p")]
    P360,
    /// 480p
    #[serde(rename = "480p")]
    P480,
    /// 720p
    #[serde(rename = "720p")]
    P720,
    /// 1080p
    #[serde(rename = "1080p")]
    P1080,
    /// 1440p
    #[serde(rename = "1440p")]
    P1440,
    /// 2160p
    #[serde(rename = "2160p")]
    P2160,
}

impl VideoQuality {
    /// Label as used on the wire ("720p")
    pub fn label(&self) -> &'static str {
        match self {
            VideoQuality::P144 => "144p",
            VideoQuality::P240 => "240p",
            VideoQuality::P360 => "360p",
            VideoQuality::P480 => "480p",
            VideoQuality::P720 => "720p",
            VideoQuality::P1080 => "1080p",
            VideoQuality::P1440 => "1440p",
            VideoQuality::P2160 => "2160p",
        }
    }
}

impl std::fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of media a download produces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    /// Video file
    Video,
    /// Still image
    Photo,
}

impl DownloadType {
    /// Default file extension for this kind
    pub fn extension(&self) -> &'static str {
        match self {
            DownloadType::Video => "mp4",
            DownloadType::Photo => "jpg",
        }
    }
}

/// Caller-visible status of a download session
///
/// Transitions are one-way (`None -> Downloading -> Downloaded | Failed`); going
/// back to `None` only happens when a fresh download call is made.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Idle
    #[default]
    None,
    /// Transfer in progress
    Downloading,
    /// File committed to the media library
    Downloaded,
    /// Download ended with an error
    Failed,
}

/// One downloadable asset of a resolved media item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Direct URL of the payload
    pub url: String,
    /// Kind of payload behind the URL
    pub kind: DownloadType,
    /// Quality tier, if the asset is quality specific
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<VideoQuality>,
}

/// Structured metadata returned by a detail resolver
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Title for display
    #[serde(default)]
    pub title: Option<String>,
    /// Declared media kind
    pub kind: DownloadType,
    /// Qualities the resolver reports as available
    #[serde(default)]
    pub qualities: Vec<VideoQuality>,
    /// Direct payload URLs
    pub assets: Vec<MediaAsset>,
}

impl MediaDescriptor {
    /// Pick the asset to transfer for the requested quality
    ///
    /// The request must be one of the advertised qualities (when any are
    /// advertised). A quality-tagged asset wins over an untagged one.
    pub fn select_asset(&self, quality: VideoQuality) -> Result<&MediaAsset, DownloadError> {
        if !self.qualities.is_empty() && !self.qualities.contains(&quality) {
            return Err(DownloadError::QualityNotAvailable);
        }

        self.assets
            .iter()
            .find(|a| a.quality == Some(quality))
            .or_else(|| self.assets.iter().find(|a| a.quality.is_none()))
            .ok_or(DownloadError::QualityNotAvailable)
    }
}

/// Transfer progress as reported on the event channel
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Progress {
    /// Total size unknown (no Content-Length)
    Indeterminate,
    /// Fraction received, in [0.0, 1.0]
    Fraction(f64),
}

impl Progress {
    /// Numeric fraction, if known
    pub fn fraction(&self) -> Option<f64> {
        match self {
            Progress::Indeterminate => None,
            Progress::Fraction(f) => Some(*f),
        }
    }
}

/// A finished download handed over to the caller
///
/// The file lives in the configured temp directory and is deleted when this value
/// is dropped, unless the caller takes it over with [`DownloadedFile::keep`].
#[derive(Debug)]
pub struct DownloadedFile {
    path: tempfile::TempPath,
    kind: DownloadType,
    size_bytes: u64,
}

impl DownloadedFile {
    pub(crate) fn new(path: tempfile::TempPath, kind: DownloadType, size_bytes: u64) -> Self {
        Self {
            path,
            kind,
            size_bytes,
        }
    }

    /// Location of the downloaded payload
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Kind of media
    pub fn kind(&self) -> DownloadType {
        self.kind
    }

    /// Number of bytes written
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Stop automatic deletion and return the path
    pub fn keep(self) -> std::io::Result<PathBuf> {
        self.path.keep().map_err(|e| e.error)
    }
}

/// Event delivered on a download's event channel
///
/// For a single download call, zero or more `Progress` events precede exactly one
/// terminal event (`Completed` or `Failed`).
#[derive(Debug)]
pub enum Event {
    /// Transfer progress update
    Progress(Progress),

    /// Transfer finished and the payload passed the compatibility check
    Completed(DownloadedFile),

    /// Download failed
    Failed(DownloadError),
}

impl Event {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Event::Progress(_))
    }
}
