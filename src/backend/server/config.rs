/**
 * Server Configuration
 *
 * This module handles loading of server configuration from the
 * environment, with sensible defaults for local development.
 *
 * # Error Handling
 *
 * Configuration errors are logged but do not prevent server startup; the
 * defaults apply instead.
 */

use std::time::Duration;

/// Tunables for the running server
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// How often sessions ping their peers
    pub ping_interval: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
        }
    }
}

impl ServerSettings {
    /// Load settings from environment variables.
    ///
    /// - `PING_INTERVAL_SECS` - keepalive interval (default 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ping_interval = match std::env::var("PING_INTERVAL_SECS") {
            Ok(value) => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    tracing::warn!(
                        "Invalid PING_INTERVAL_SECS '{}', using default",
                        value
                    );
                    defaults.ping_interval
                }
            },
            Err(_) => defaults.ping_interval,
        };
        Self { ping_interval }
    }
}
