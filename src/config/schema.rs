//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the health check service.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener serving `/health`.
    pub listener: ListenerConfig,

    /// Aggregator timing.
    pub health: HealthConfig,

    pub observability: ObservabilityConfig,

    /// HTTP dependencies to probe.
    pub checks: Vec<CheckConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Aggregator timing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    /// Nominal period between runs of each check.
    pub interval_secs: u64,

    /// Grace period before a failing check is reported CRITICAL.
    pub critical_error_timeout_secs: u64,
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn critical_error_timeout(&self) -> Duration {
        Duration::from_secs(self.critical_error_timeout_secs)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            critical_error_timeout_secs: 90,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One HTTP dependency check.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CheckConfig {
    pub name: String,

    /// URL probed with `GET`.
    pub url: String,

    /// Per-request timeout.
    #[serde(default = "default_check_timeout_secs")]
    pub timeout_secs: u64,
}

impl CheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_check_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.health.interval(), Duration::from_secs(10));
        assert_eq!(config.health.critical_error_timeout(), Duration::from_secs(90));
        assert!(config.checks.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:3000"

            [health]
            interval_secs = 30

            [observability]
            log_format = "json"
            metrics_enabled = true

            [[checks]]
            name = "upstream api"
            url = "http://127.0.0.1:4000/health"

            [[checks]]
            name = "search"
            url = "http://127.0.0.1:4001/health"
            timeout_secs = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:3000");
        assert_eq!(config.health.interval_secs, 30);
        assert_eq!(config.health.critical_error_timeout_secs, 90);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.checks.len(), 2);
        assert_eq!(config.checks[0].timeout_secs, 5);
        assert_eq!(config.checks[1].timeout(), Duration::from_secs(2));
    }
}
