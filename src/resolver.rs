//! Detail resolvers - turn a user-supplied URL into a [`MediaDescriptor`].
//!
//! The [`DetailResolver`] trait is the seam the downloader consumes. Two
//! implementations are provided:
//!
//! - [`HttpDetailResolver`]: queries the details API over HTTP
//! - [`StaticResolver`]: hands back a descriptor that was resolved earlier
//!   (e.g. when the caller already showed the available qualities to the user)

use crate::config::ResolverConfig;
use crate::error::{Error, ResolveError, Result};
use crate::types::{MediaDescriptor, PlatformType};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Source of media metadata
#[async_trait]
pub trait DetailResolver: Send + Sync {
    /// Resolve `url` on `platform` into a descriptor
    async fn resolve(
        &self,
        url: &str,
        platform: PlatformType,
    ) -> std::result::Result<MediaDescriptor, ResolveError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

/// Resolver backed by the details API
///
/// Issues `GET {api_base_url}/api/{platform}/details?url=<url>`.
pub struct HttpDetailResolver {
    client: reqwest::Client,
    base_url: url::Url,
}

impl HttpDetailResolver {
    /// Build a resolver from configuration
    pub fn new(config: &ResolverConfig) -> Result<Self> {
        let mut base_url = url::Url::parse(&config.api_base_url).map_err(|e| Error::Config {
            message: format!("invalid api_base_url '{}': {}", config.api_base_url, e),
            key: Some("api_base_url".to_string()),
        })?;
        // Endpoints are joined relative to the base, which keeps a path prefix only
        // when it ends in a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn details_url(&self, url: &str, platform: PlatformType) -> std::result::Result<url::Url, ResolveError> {
        let mut endpoint = self
            .base_url
            .join(&format!("api/{}/details", platform.as_str()))
            .map_err(|e| ResolveError::UnknownError(format!("invalid details endpoint: {}", e)))?;
        endpoint.query_pairs_mut().append_pair("url", url);
        Ok(endpoint)
    }

    fn error_for_status(status: u16, body: &[u8]) -> ResolveError {
        let server_message = serde_json::from_slice::<MessageBody>(body)
            .map(|b| b.message)
            .ok();
        let message = |default: &str| {
            server_message
                .clone()
                .unwrap_or_else(|| default.to_string())
        };

        match status {
            400 => ResolveError::BadRequest(message("The request was malformed.")),
            401 => ResolveError::Unauthorized(message("Authentication is required.")),
            403 => ResolveError::Forbidden(message("Access to this media is forbidden.")),
            404 => ResolveError::NotFound(message("The media could not be found.")),
            500..=599 => ResolveError::ServerError(message("The server encountered an error.")),
            _ => ResolveError::UnknownError(message("An unknown error occurred.")),
        }
    }
}

#[async_trait]
impl DetailResolver for HttpDetailResolver {
    async fn resolve(
        &self,
        url: &str,
        platform: PlatformType,
    ) -> std::result::Result<MediaDescriptor, ResolveError> {
        if url.trim().is_empty() {
            return Err(ResolveError::BadRequest("URL must not be empty.".to_string()));
        }

        let endpoint = self.details_url(url, platform)?;
        tracing::debug!(%platform, endpoint = %endpoint, "Resolving media details");

        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| ResolveError::UnknownError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ResolveError::UnknownError(e.to_string()))?;

        if !(200..=299).contains(&status) {
            let err = Self::error_for_status(status, &body);
            tracing::warn!(%platform, status, error = %err, "Details request failed");
            return Err(err);
        }

        serde_json::from_slice(&body).map_err(|e| ResolveError::InvalidResponse(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Resolver that serves descriptors registered ahead of time
///
/// Unknown URLs resolve to [`ResolveError::NotFound`].
#[derive(Default, Clone)]
pub struct StaticResolver {
    descriptors: Arc<Mutex<HashMap<(String, PlatformType), MediaDescriptor>>>,
}

impl StaticResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the descriptor for `url` on `platform`
    pub fn insert(&self, url: impl Into<String>, platform: PlatformType, descriptor: MediaDescriptor) {
        self.descriptors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((url.into(), platform), descriptor);
    }
}

#[async_trait]
impl DetailResolver for StaticResolver {
    async fn resolve(
        &self,
        url: &str,
        platform: PlatformType,
    ) -> std::result::Result<MediaDescriptor, ResolveError> {
        self.descriptors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(url.to_string(), platform))
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(format!("no details for {}", url)))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
