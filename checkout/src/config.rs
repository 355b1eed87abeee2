//! Configuration management for checkout sessions.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Checkout configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Reservation service client configuration
    pub api: ApiConfig,
    /// Session runtime configuration
    pub session: SessionConfig,
    /// Log level (trace, debug, info, warn, error) or a full `EnvFilter` directive
    pub log_level: String,
}

/// Reservation service client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the reservation service, without trailing slash
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Whole-request timeout in seconds
    pub request_timeout: u64,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

/// Session runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Countdown tick period in milliseconds (default: 1000)
    pub countdown_tick_ms: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            api: ApiConfig {
                base_url: lookup("STAGEPASS_API_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.api.base_url),
                token: lookup("STAGEPASS_API_TOKEN").filter(|t| !t.is_empty()),
                request_timeout: lookup("STAGEPASS_REQUEST_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.api.request_timeout),
                connect_timeout: lookup("STAGEPASS_CONNECT_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.api.connect_timeout),
            },
            session: SessionConfig {
                countdown_tick_ms: lookup("STAGEPASS_COUNTDOWN_TICK_MS")
                    .and_then(|s| s.parse().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(defaults.session.countdown_tick_ms),
                shutdown_timeout: lookup("STAGEPASS_SHUTDOWN_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.session.shutdown_timeout),
            },
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8080/api".to_string(),
                token: None,
                request_timeout: 30,
                connect_timeout: 10,
            },
            session: SessionConfig {
                countdown_tick_ms: 1000,
                shutdown_timeout: 5,
            },
            log_level: "info".to_string(),
        }
    }
}

impl ApiConfig {
    /// Whole-request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Connection timeout
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl SessionConfig {
    /// Countdown tick period
    #[must_use]
    pub const fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    /// Graceful shutdown timeout
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None);

        assert_eq!(config.api.base_url, "http://localhost:8080/api");
        assert_eq!(config.api.token, None);
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.session.countdown_tick(), Duration::from_secs(1));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides_from_environment() {
        let config = Config::from_lookup(lookup_from(&[
            ("STAGEPASS_API_URL", "https://api.stagepass.test/v1/"),
            ("STAGEPASS_API_TOKEN", "secret"),
            ("STAGEPASS_REQUEST_TIMEOUT_SECS", "12"),
            ("STAGEPASS_COUNTDOWN_TICK_MS", "250"),
            ("RUST_LOG", "debug"),
        ]));

        assert_eq!(config.api.base_url, "https://api.stagepass.test/v1");
        assert_eq!(config.api.token.as_deref(), Some("secret"));
        assert_eq!(config.api.request_timeout, 12);
        assert_eq!(config.session.countdown_tick(), Duration::from_millis(250));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("STAGEPASS_REQUEST_TIMEOUT_SECS", "soon"),
            ("STAGEPASS_COUNTDOWN_TICK_MS", "0"),
            ("STAGEPASS_API_TOKEN", ""),
        ]));

        assert_eq!(config.api.request_timeout, 30);
        assert_eq!(config.session.countdown_tick_ms, 1000);
        assert_eq!(config.api.token, None);
    }
}
