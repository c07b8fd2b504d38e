//! Configuration types for picker-sync

use crate::error::{Error, Result};
use crate::types::SessionFilters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Largest page size the Picker API accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Picker API connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the Picker API (default: "https://photospicker.googleapis.com/v1")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 30 seconds)
    #[serde(
        default = "default_request_timeout",
        rename = "request_timeout_secs",
        with = "duration_serde"
    )]
    pub request_timeout: Duration,

    /// Log request/response details at info level (default: false)
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            debug_logging: false,
        }
    }
}

/// Session polling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between session status checks (default: 2000 ms)
    #[serde(
        default = "default_poll_interval",
        rename = "poll_interval_ms",
        with = "duration_millis_serde"
    )]
    pub poll_interval: Duration,

    /// Wall-clock budget for the user to finish picking (default: 10 minutes)
    ///
    /// Enforced by counting polls, not by aborting in-flight requests.
    #[serde(
        default = "default_session_timeout",
        rename = "session_timeout_secs",
        with = "duration_serde"
    )]
    pub session_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            session_timeout: default_session_timeout(),
        }
    }
}

impl PollingConfig {
    /// Number of still-active polls after which the session times out
    ///
    /// With the defaults (2s interval, 10 minute budget) this is 300.
    pub fn max_polls(&self) -> u32 {
        let interval = self.poll_interval.as_millis().max(1);
        let polls = self.session_timeout.as_millis().div_ceil(interval);
        u32::try_from(polls).unwrap_or(u32::MAX).max(1)
    }
}

/// Result pagination settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Items requested per page; capped at 100 by the API (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Safety limit on pages fetched for one session (default: 100)
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

impl FetchConfig {
    /// Page size actually sent to the API (1..=100)
    pub fn effective_page_size(&self) -> u32 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// Main configuration for the picker session stack
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Picker API connection settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Session polling settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Result pagination settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Filters applied to every new session
    #[serde(default)]
    pub filters: SessionFilters,
}

impl Config {
    /// Parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    /// Check settings that would make the protocol misbehave
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url).map_err(|e| Error::Config {
            message: format!("invalid base URL '{}': {}", self.api.base_url, e),
            key: Some("api.base_url".to_string()),
        })?;

        if self.polling.poll_interval.is_zero() {
            return Err(Error::Config {
                message: "poll interval must be greater than zero".to_string(),
                key: Some("polling.poll_interval_ms".to_string()),
            });
        }

        if self.polling.session_timeout.is_zero() {
            return Err(Error::Config {
                message: "session timeout must be greater than zero".to_string(),
                key: Some("polling.session_timeout_secs".to_string()),
            });
        }

        if self.fetch.max_pages == 0 {
            return Err(Error::Config {
                message: "max_pages must be at least 1".to_string(),
                key: Some("fetch.max_pages".to_string()),
            });
        }

        Ok(())
    }
}

fn default_base_url() -> String {
    "https://photospicker.googleapis.com/v1".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(600) // 10 minutes
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_max_pages() -> u32 {
    100
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
