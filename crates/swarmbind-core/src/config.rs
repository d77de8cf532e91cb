//! Configuration types for the swarmbind system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::labels::DEFAULT_LABEL_PREFIX;

/// Main swarmbind configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// DNS management API configuration
    pub gateway: GatewayConfig,

    /// Service label convention
    #[serde(default)]
    pub labels: LabelConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a configuration for the given gateway with default settings
    pub fn new(gateway: GatewayConfig) -> Self {
        Self {
            gateway,
            labels: LabelConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.gateway.validate()?;
        self.labels.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Connection settings for the DNS management API
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the firewall without path (e.g. "https://fw.example.org")
    pub base_url: String,

    /// API key used as basic-auth user
    pub api_key: String,

    /// API secret used as basic-auth password
    /// ⚠️ NEVER log this value
    pub api_secret: String,
}

// Custom Debug implementation that hides the API secret
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<REDACTED>")
            .finish()
    }
}

impl GatewayConfig {
    /// Create a new gateway configuration
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Validate the gateway configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.base_url.is_empty() {
            return Err(crate::Error::config("Gateway URL cannot be empty"));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "Gateway URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }
        if self.api_key.is_empty() {
            return Err(crate::Error::config("Gateway API key cannot be empty"));
        }
        if self.api_secret.is_empty() {
            return Err(crate::Error::config("Gateway API secret cannot be empty"));
        }
        Ok(())
    }

    /// Base URL without trailing slashes
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Service label convention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Namespace prefix of mapping labels
    #[serde(default = "default_label_prefix")]
    pub prefix: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            prefix: default_label_prefix(),
        }
    }
}

impl LabelConfig {
    /// Validate the label configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.prefix.is_empty() {
            return Err(crate::Error::config("Label prefix cannot be empty"));
        }
        if self.prefix.starts_with('.') || self.prefix.ends_with('.') {
            return Err(crate::Error::config(format!(
                "Label prefix must not start or end with '.'. Got: {}",
                self.prefix
            )));
        }
        Ok(())
    }
}

fn default_label_prefix() -> String {
    DEFAULT_LABEL_PREFIX.to_string()
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Timeout applied to every gateway and orchestration request (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of retries for retryable failures of idempotent calls
    ///
    /// Record creation is never retried.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay between retry attempts (in milliseconds)
    #[serde(default = "default_retry_delay_millis")]
    pub retry_delay_millis: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, engine events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_millis: default_retry_delay_millis(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        if self.max_retries > 10 {
            return Err(crate::Error::config(format!(
                "Max retries must be between 0 and 10. Got: {}",
                self.max_retries
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry delay as a [`Duration`]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_millis)
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> usize {
    2
}

fn default_retry_delay_millis() -> u64 {
    1000
}

fn default_event_channel_capacity() -> usize {
    1000
}
