//! Error types for media-dl
//!
//! Three layers of errors live here:
//! - [`Error`] - crate-level failures (configuration, I/O, HTTP client setup)
//! - [`DownloadError`] - the closed set of terminal failures a download can end with
//! - [`ResolveError`] - failures reported by a detail resolver
//!
//! Every fault that happens inside a download is converted into a [`DownloadError`]
//! before it reaches the caller. Raw transport or platform errors never cross the
//! [`Downloader`](crate::Downloader) boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// Returned by constructors and configuration helpers. Failures of an individual
/// download are never returned through this type; they arrive as
/// [`Event::Failed`](crate::Event::Failed) on the download's event channel.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "progress_step")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Detail resolver error
    #[error("resolver error: {0}")]
    Resolve(#[from] ResolveError),

    /// Terminal download failure surfaced outside of an event channel
    #[error("download error: {0}")]
    Download(#[from] DownloadError),
}

/// Terminal failure of a single download
///
/// This is a closed taxonomy: every way a download can fail maps onto exactly one
/// variant. None of them are retried internally; retrying is the caller's decision
/// and always means issuing a fresh download call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum DownloadError {
    /// URL was empty or not a well-formed absolute URL (detected before any network call)
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Media library access was not granted
    #[error("permission to access the media library was denied")]
    PermissionDenied,

    /// The server rejected the URL as not belonging to a supported YouTube domain
    #[error("not a valid YouTube URL")]
    NotValidYouTubeUrl,

    /// The requested quality is not offered for this media
    #[error("requested quality is not available")]
    QualityNotAvailable,

    /// The media is longer than the server is willing to process
    #[error("media duration is too long")]
    DurationTooHigh,

    /// The server's structured error body could not be decoded
    #[error("failed to decode server error response")]
    DecodeFailed,

    /// Client-side HTTP failure without a recognised domain meaning
    #[error("bad request: {0}")]
    BadRequest(String),

    /// HTTP 5xx from the server
    #[error("internal server error (HTTP {0})")]
    InternalServerError(u16),

    /// Unexpected HTTP status or otherwise malformed server response
    #[error("bad server response{}", .0.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    BadServerResponse(Option<u16>),

    /// Downloaded payload cannot be stored in the media library
    #[error("downloaded media is not compatible with the media library")]
    NotCompatible,

    /// Connection, timeout or stream failure unrelated to an HTTP status
    #[error("transport fault: {0}")]
    TransportFault(String),

    /// A download is already running on this downloader
    #[error("a download is already in progress")]
    Busy,
}

impl DownloadError {
    /// Stable machine-readable code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            DownloadError::InvalidUrl(_) => "invalid_url",
            DownloadError::PermissionDenied => "permission_denied",
            DownloadError::NotValidYouTubeUrl => "not_valid_youtube_url",
            DownloadError::QualityNotAvailable => "quality_not_available",
            DownloadError::DurationTooHigh => "duration_too_high",
            DownloadError::DecodeFailed => "decode_failed",
            DownloadError::BadRequest(_) => "bad_request",
            DownloadError::InternalServerError(_) => "internal_server_error",
            DownloadError::BadServerResponse(_) => "bad_server_response",
            DownloadError::NotCompatible => "not_compatible",
            DownloadError::TransportFault(_) => "transport_fault",
            DownloadError::Busy => "busy",
        }
    }

    /// Short message suitable for showing to an end user
    pub fn user_message(&self) -> &'static str {
        match self {
            DownloadError::InvalidUrl(_) => "Please enter a valid URL.",
            DownloadError::PermissionDenied => {
                "Allow access to your photo library in Settings to save downloads."
            }
            DownloadError::NotValidYouTubeUrl => "This doesn't look like a YouTube link.",
            DownloadError::QualityNotAvailable => "The selected quality isn't available.",
            DownloadError::DurationTooHigh => "This video is too long to download.",
            DownloadError::DecodeFailed
            | DownloadError::BadRequest(_)
            | DownloadError::BadServerResponse(_) => "Failed to Download",
            DownloadError::InternalServerError(_) => {
                "The server ran into a problem. Please try again later."
            }
            DownloadError::NotCompatible => "This file can't be saved to your library.",
            DownloadError::TransportFault(_) => "Check your connection and try again.",
            DownloadError::Busy => "A download is already in progress.",
        }
    }

    /// Whether the caller should send the user to the system settings instead of
    /// showing a generic error
    pub fn requires_settings_redirect(&self) -> bool {
        matches!(self, DownloadError::PermissionDenied)
    }
}

/// Failure reported by a detail resolver
///
/// Each variant carries the human-readable message supplied by the server, or a
/// default text when the server did not provide one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Response could not be decoded into a media descriptor
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP 400
    #[error("bad request: {0}")]
    BadRequest(String),

    /// HTTP 401
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 403
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// HTTP 404
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP 5xx
    #[error("server error: {0}")]
    ServerError(String),

    /// Anything else, including transport failures
    #[error("unknown error: {0}")]
    UnknownError(String),
}

impl ResolveError {
    /// The human-readable message carried by this error
    pub fn message(&self) -> &str {
        match self {
            ResolveError::InvalidResponse(m)
            | ResolveError::BadRequest(m)
            | ResolveError::Unauthorized(m)
            | ResolveError::Forbidden(m)
            | ResolveError::NotFound(m)
            | ResolveError::ServerError(m)
            | ResolveError::UnknownError(m) => m,
        }
    }
}
