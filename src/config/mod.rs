//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading
//! - Configuration validation
//! - Default value handling
//!
//! # Example
//!
//! ```
//! use panel_monitoring::config::MonitoringConfig;
//!
//! // Use MonitoringConfig::from_env() in production
//! let config = MonitoringConfig::default();
//! assert!(config.enabled);
//! assert!(!config.development);
//! assert_eq!(config.report_interval().as_secs(), 30);
//! ```

mod validation;

pub use validation::{
    validate_config, LOG_LEVELS, MAX_REPORT_INTERVAL_MS, MIN_REPORT_INTERVAL_MS,
};

use std::time::Duration;

use crate::error::ConfigError;

/// Default storage directory for persisted snapshots.
pub const DEFAULT_STORAGE_DIR: &str = "./data/monitoring";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default development-mode report interval in milliseconds.
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 30_000;

/// Default page URL attached to captured errors.
pub const DEFAULT_PAGE_URL: &str = "app://panel-monitor";

/// Default user agent attached to captured errors and reports.
pub const DEFAULT_USER_AGENT: &str = concat!("panel-monitoring/", env!("CARGO_PKG_VERSION"));

/// Monitoring configuration.
///
/// `enabled` gates the global error hooks and the performance observers.
/// API metrics are always collected. `development` turns on the periodic
/// console summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringConfig {
    /// Whether error hooks and performance observers are installed.
    pub enabled: bool,
    /// Development build: log a periodic summary.
    pub development: bool,
    /// Interval of the development summary in milliseconds.
    pub report_interval_ms: u64,
    /// Directory holding persisted snapshots.
    pub storage_dir: String,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
    /// Page URL recorded with errors and reports.
    pub page_url: String,
    /// User agent recorded with errors and reports.
    pub user_agent: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            development: false,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            storage_dir: DEFAULT_STORAGE_DIR.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            page_url: DEFAULT_PAGE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional environment variables (with defaults):
    /// - `MONITORING_ENABLED`: Install hooks and observers (default: `true`)
    /// - `MONITORING_DEV_MODE`: Periodic console summary (default: `false`)
    /// - `MONITORING_REPORT_INTERVAL_MS`: Summary interval (default: `30000`)
    /// - `MONITORING_STORAGE_DIR`: Snapshot directory (default: `./data/monitoring`)
    /// - `MONITORING_PAGE_URL`: Page URL for records (default: `app://panel-monitor`)
    /// - `MONITORING_USER_AGENT`: User agent for records
    /// - `LOG_LEVEL`: Logging level (default: `info`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a boolean or integer cannot be parsed, or
    /// any value fails validation (see [`validate_config`]).
    #[must_use = "configuration should be used"]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let config = Self {
            enabled: parse_env_bool("MONITORING_ENABLED", true)?,
            development: parse_env_bool("MONITORING_DEV_MODE", false)?,
            report_interval_ms: parse_env_u64(
                "MONITORING_REPORT_INTERVAL_MS",
                DEFAULT_REPORT_INTERVAL_MS,
            )?,
            storage_dir: env_or("MONITORING_STORAGE_DIR", DEFAULT_STORAGE_DIR),
            log_level: env_or("LOG_LEVEL", DEFAULT_LOG_LEVEL),
            page_url: env_or("MONITORING_PAGE_URL", DEFAULT_PAGE_URL),
            user_agent: env_or("MONITORING_USER_AGENT", DEFAULT_USER_AGENT),
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Interval of the development-mode summary.
    #[must_use]
    pub const fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

/// Parse an environment variable as u64, using a default if not set.
fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as a boolean flag, using a default if not set.
fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                var: name.into(),
                reason: "must be true or false".into(),
            }),
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to set up a clean test environment.
    fn setup_test_env() {
        for var in [
            "MONITORING_ENABLED",
            "MONITORING_DEV_MODE",
            "MONITORING_REPORT_INTERVAL_MS",
            "MONITORING_STORAGE_DIR",
            "MONITORING_PAGE_URL",
            "MONITORING_USER_AGENT",
            "LOG_LEVEL",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env_defaults() {
        setup_test_env();

        let config = MonitoringConfig::from_env().expect("should load config");

        assert_eq!(config, MonitoringConfig::default());
    }

    #[test]
    #[serial]
    fn test_config_from_env_with_all_vars() {
        setup_test_env();

        env::set_var("MONITORING_ENABLED", "false");
        env::set_var("MONITORING_DEV_MODE", "yes");
        env::set_var("MONITORING_REPORT_INTERVAL_MS", "5000");
        env::set_var("MONITORING_STORAGE_DIR", "/tmp/panel");
        env::set_var("MONITORING_PAGE_URL", "https://admin.example.com/users");
        env::set_var("MONITORING_USER_AGENT", "admin-shell/2.0");
        env::set_var("LOG_LEVEL", "debug");

        let config = MonitoringConfig::from_env().expect("should load config");

        assert!(!config.enabled);
        assert!(config.development);
        assert_eq!(config.report_interval_ms, 5000);
        assert_eq!(config.storage_dir, "/tmp/panel");
        assert_eq!(config.page_url, "https://admin.example.com/users");
        assert_eq!(config.user_agent, "admin-shell/2.0");
        assert_eq!(config.log_level, "debug");

        setup_test_env();
    }

    #[test]
    #[serial]
    fn test_config_invalid_bool() {
        setup_test_env();
        env::set_var("MONITORING_DEV_MODE", "maybe");

        let err = MonitoringConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "MONITORING_DEV_MODE"
        ));

        setup_test_env();
    }

    #[test]
    #[serial]
    fn test_config_invalid_interval_format() {
        setup_test_env();
        env::set_var("MONITORING_REPORT_INTERVAL_MS", "soon");

        let err = MonitoringConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "MONITORING_REPORT_INTERVAL_MS"
        ));

        setup_test_env();
    }

    #[test]
    #[serial]
    fn test_config_interval_validation_failure() {
        setup_test_env();
        env::set_var("MONITORING_REPORT_INTERVAL_MS", "10"); // Too low

        let err = MonitoringConfig::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "MONITORING_REPORT_INTERVAL_MS"
        ));

        setup_test_env();
    }

    #[test]
    fn test_report_interval_duration() {
        let config = MonitoringConfig {
            report_interval_ms: 1500,
            ..MonitoringConfig::default()
        };
        assert_eq!(config.report_interval(), Duration::from_millis(1500));
    }

    #[test]
    fn test_default_user_agent_has_version() {
        assert!(DEFAULT_USER_AGENT.starts_with("panel-monitoring/"));
        assert!(DEFAULT_USER_AGENT.len() > "panel-monitoring/".len());
    }
}
