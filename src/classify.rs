//! Failure classification
//!
//! Maps raw signals (HTTP status + body, transport errors, resolver errors) onto
//! [`DownloadError`]. This is the only place where server error bodies are read.
//!
//! Server error bodies are small JSON objects:
//!
//! ```json
//! { "code": "duration_too_high", "message": "Video duration is too high" }
//! ```
//!
//! `code` is the stable contract and is checked first. Servers that only send
//! `message` are matched on the known message texts.

use crate::error::{DownloadError, ResolveError};
use serde::Deserialize;

/// Message the server sends for a URL outside the supported YouTube domains
pub const NOT_VALID_DOMAIN_MESSAGE: &str = "Not a valid YouTube domain";
/// Message the server sends when the requested quality does not exist
pub const QUALITY_UNAVAILABLE_MESSAGE: &str = "Requested quality is not available";
/// Message the server sends when the media is too long to process
pub const DURATION_TOO_HIGH_MESSAGE: &str = "Video duration is too high";

/// Structured error body returned by the server on 4xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct ServerErrorBody {
    /// Stable error code, when the server provides one
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl ServerErrorBody {
    /// Domain meaning of this body, if it has one
    fn domain_error(&self) -> Option<DownloadError> {
        if let Some(code) = self.code.as_deref() {
            match code {
                "not_valid_domain" | "not_valid_youtube_url" => {
                    return Some(DownloadError::NotValidYouTubeUrl);
                }
                "requested_quality_unavailable" | "quality_not_available" => {
                    return Some(DownloadError::QualityNotAvailable);
                }
                "duration_too_high" => return Some(DownloadError::DurationTooHigh),
                _ => {}
            }
        }

        match self.message.as_str() {
            NOT_VALID_DOMAIN_MESSAGE => Some(DownloadError::NotValidYouTubeUrl),
            QUALITY_UNAVAILABLE_MESSAGE => Some(DownloadError::QualityNotAvailable),
            DURATION_TOO_HIGH_MESSAGE => Some(DownloadError::DurationTooHigh),
            _ => None,
        }
    }
}

/// Classify an HTTP response by status code and body
///
/// Returns `None` for 2xx.
pub fn classify_response(status: u16, body: &[u8]) -> Option<DownloadError> {
    match status {
        200..=299 => None,
        400..=499 => {
            let decoded: ServerErrorBody = match serde_json::from_slice(body) {
                Ok(b) => b,
                Err(e) => {
                    tracing::debug!(status, error = %e, "Undecodable error body");
                    return Some(DownloadError::DecodeFailed);
                }
            };
            Some(
                decoded
                    .domain_error()
                    .unwrap_or(DownloadError::BadRequest(decoded.message)),
            )
        }
        500..=599 => Some(DownloadError::InternalServerError(status)),
        _ => Some(DownloadError::BadServerResponse(Some(status))),
    }
}

/// Classify a transport-level failure from the HTTP client
pub fn classify_transport(err: &reqwest::Error) -> DownloadError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else if err.is_decode() || err.is_body() {
        "response body interrupted"
    } else {
        "request failed"
    };
    DownloadError::TransportFault(format!("{}: {}", kind, err))
}

/// Classify a local I/O failure while writing the payload
pub fn classify_io(err: &std::io::Error) -> DownloadError {
    DownloadError::TransportFault(format!("failed to write payload: {}", err))
}

impl From<ResolveError> for DownloadError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::BadRequest(message)
            | ResolveError::Unauthorized(message)
            | ResolveError::Forbidden(message)
            | ResolveError::NotFound(message) => {
                let body = ServerErrorBody {
                    code: None,
                    message,
                };
                body.domain_error()
                    .unwrap_or(DownloadError::BadRequest(body.message))
            }
            ResolveError::ServerError(_) => DownloadError::InternalServerError(500),
            ResolveError::InvalidResponse(_) => DownloadError::DecodeFailed,
            ResolveError::UnknownError(_) => DownloadError::BadServerResponse(None),
        }
    }
}
