//! Configuration types for optrack

use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
///
/// Every section is optional in the file; a missing file plus defaults
/// is a valid deployment. The remote host service runs the same binary
/// with its own file, so the two registries' cache TTLs are
/// independently configurable and never assumed equal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub health: HealthCheckConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the operations API binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Refresh cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum age of cached operation state before a query refreshes,
    /// in seconds. Overridable via `OPERATIONS_CACHE_TTL`.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: f64,
}

fn default_ttl_secs() -> f64 {
    1.0
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs_f64(self.ttl_secs.max(0.0))
    }
}

/// Health monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    #[serde(default = "default_stuck_intervals")]
    pub stuck_intervals: u32,
}

fn default_check_interval_secs() -> u64 {
    60
}
fn default_operation_timeout_secs() -> u64 {
    30 * 60
}
fn default_stuck_intervals() -> u32 {
    3
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
            stuck_intervals: default_stuck_intervals(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_metrics_port() -> u16 {
    9090
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file and apply env overrides
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_overrides(std::env::var("OPERATIONS_CACHE_TTL").ok().as_deref());
        Ok(config)
    }

    fn apply_overrides(&mut self, cache_ttl: Option<&str>) {
        if let Some(raw) = cache_ttl {
            match raw.parse::<f64>() {
                Ok(secs) if secs >= 0.0 => self.cache.ttl_secs = secs,
                _ => tracing::warn!(value = raw, "Ignoring invalid OPERATIONS_CACHE_TTL"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_deserialize() {
        let toml = r#"
            [server]
            bind_addr = "127.0.0.1:9000"

            [cache]
            ttl_secs = 0.5

            [health]
            check_interval_secs = 30
            operation_timeout_secs = 600
            stuck_intervals = 5

            [telemetry]
            metrics_port = 9191
            log_level = "debug"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.cache.ttl_secs, 0.5);
        assert_eq!(config.health.operation_timeout_secs, 600);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_config_defaults_from_empty_file() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.cache.ttl_secs, 1.0);
        assert_eq!(config.cache.ttl(), Duration::from_secs(1));
        assert_eq!(config.health.check_interval_secs, 60);
        assert_eq!(config.health.operation_timeout_secs, 1800);
        assert_eq!(config.telemetry.metrics_port, 9090);
    }

    #[test]
    fn test_partial_section() {
        let toml = r#"
            [cache]
            ttl_secs = 2.0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.ttl_secs, 2.0);
        assert_eq!(config.health.stuck_intervals, 3);
    }

    #[test]
    fn test_env_override_wins() {
        let mut config = Config::default();
        config.apply_overrides(Some("0.25"));
        assert_eq!(config.cache.ttl_secs, 0.25);
        assert_eq!(config.cache.ttl(), Duration::from_millis(250));
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = Config::default();
        config.apply_overrides(Some("fast"));
        assert_eq!(config.cache.ttl_secs, 1.0);
        config.apply_overrides(Some("-3"));
        assert_eq!(config.cache.ttl_secs, 1.0);
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[cache]\nttl_secs = 3.0\n").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.cache.ttl_secs, 3.0);
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(result.is_err());
    }
}
