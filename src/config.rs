//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Transfer behavior configuration (temp storage, timeouts, progress granularity)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Directory receiving in-flight payloads (default: `<os temp>/media-dl`)
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// Whole-transfer timeout (default: 300s, None = no timeout)
    ///
    /// Expiry is reported exactly like a transport fault.
    #[serde(default = "default_transfer_timeout", with = "optional_duration_secs")]
    pub timeout: Option<Duration>,

    /// TCP connect timeout (default: 30s)
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Minimum fraction delta between two progress events (default: 0.01)
    #[serde(default = "default_progress_step")]
    pub progress_step: f64,

    /// User-Agent header sent with transfer requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            temp_dir: default_temp_dir(),
            timeout: default_transfer_timeout(),
            connect_timeout: default_connect_timeout(),
            progress_step: default_progress_step(),
            user_agent: default_user_agent(),
        }
    }
}

/// Detail resolver API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Base URL of the details API (default: "http://localhost:8080")
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Request timeout (default: 30s)
    #[serde(default = "default_resolver_timeout", with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            timeout: default_resolver_timeout(),
        }
    }
}

/// Main configuration for media-dl
///
/// - [`transfer`](TransferConfig) - temp storage, timeouts, progress granularity
/// - [`resolver`](ResolverConfig) - details API location
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Config {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that serde cannot check on its own
    pub fn validate(&self) -> Result<()> {
        let step = self.transfer.progress_step;
        if !(step > 0.0 && step <= 1.0) {
            return Err(Error::Config {
                message: format!("progress_step must be in (0, 1], got {}", step),
                key: Some("progress_step".to_string()),
            });
        }

        if self.transfer.timeout == Some(Duration::ZERO) {
            return Err(Error::Config {
                message: "transfer timeout must be greater than zero".to_string(),
                key: Some("timeout".to_string()),
            });
        }

        if self.transfer.connect_timeout.is_zero() {
            return Err(Error::Config {
                message: "connect_timeout must be greater than zero".to_string(),
                key: Some("connect_timeout".to_string()),
            });
        }

        if self.resolver.timeout.is_zero() {
            return Err(Error::Config {
                message: "resolver timeout must be greater than zero".to_string(),
                key: Some("resolver.timeout".to_string()),
            });
        }

        url::Url::parse(&self.resolver.api_base_url).map_err(|e| Error::Config {
            message: format!("invalid api_base_url '{}': {}", self.resolver.api_base_url, e),
            key: Some("api_base_url".to_string()),
        })?;

        Ok(())
    }
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir().join("media-dl")
}

fn default_transfer_timeout() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_progress_step() -> f64 {
    0.01
}

fn default_user_agent() -> String {
    format!("media-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_api_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_resolver_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Durations are written as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod optional_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
