//! Synchronization configuration module
//!
//! Provides the client-side configuration for a space session: where the
//! server lives and how aggressively to reconnect.

use std::time::Duration;
use thiserror::Error;

/// Configuration for one space session
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Server base URL, e.g. `http://127.0.0.1:3000`
    pub server_url: String,
    /// Base reconnect delay (doubled per attempt)
    pub base_delay: Duration,
    /// Exponent at which the backoff delay stops growing
    pub backoff_cap_exponent: u32,
    /// Attempts after which reconnection becomes terminal
    pub max_reconnect_attempts: u32,
    /// How long to wait for the transport to open
    pub connect_timeout: Duration,
    /// Whether abnormal closes schedule a reconnect at all
    pub reconnect_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            base_delay: Duration::from_millis(1000),
            backoff_cap_exponent: 4,
            max_reconnect_attempts: 5,
            connect_timeout: Duration::from_secs(10),
            reconnect_enabled: true,
        }
    }
}

impl SyncConfig {
    /// Create a new SyncConfigBuilder
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// The WebSocket endpoint for a space, derived from the server URL.
    pub fn ws_url(&self, space_id: uuid::Uuid) -> String {
        let base = if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.server_url.clone()
        };
        format!("{}/ws/space/{}", base.trim_end_matches('/'), space_id)
    }

    /// An absolute REST URL for a path like `/api/snippets/{id}`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), path)
    }
}

/// Builder for SyncConfig
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    server_url: Option<String>,
    base_delay: Option<Duration>,
    backoff_cap_exponent: Option<u32>,
    max_reconnect_attempts: Option<u32>,
    connect_timeout: Option<Duration>,
    reconnect_enabled: Option<bool>,
}

impl SyncConfigBuilder {
    /// Set the server base URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the base reconnect delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    /// Set the backoff cap exponent
    pub fn backoff_cap_exponent(mut self, exponent: u32) -> Self {
        self.backoff_cap_exponent = Some(exponent);
        self
    }

    /// Set the maximum reconnect attempts
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    /// Set the transport connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Enable or disable automatic reconnection
    pub fn reconnect_enabled(mut self, enabled: bool) -> Self {
        self.reconnect_enabled = Some(enabled);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let defaults = SyncConfig::default();
        let server_url = self
            .server_url
            .ok_or(ConfigError::MissingValue("server_url"))?;
        if !server_url.starts_with("http://") && !server_url.starts_with("https://") {
            return Err(ConfigError::InvalidUrl(server_url));
        }
        Ok(SyncConfig {
            server_url,
            base_delay: self.base_delay.unwrap_or(defaults.base_delay),
            backoff_cap_exponent: self
                .backoff_cap_exponent
                .unwrap_or(defaults.backoff_cap_exponent),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            reconnect_enabled: self
                .reconnect_enabled
                .unwrap_or(defaults.reconnect_enabled),
        })
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
}
