//! Configuration validation.
//!
//! This module provides validation logic for configuration values,
//! ensuring they are within acceptable ranges.

use super::MonitoringConfig;
use crate::error::ConfigError;

/// Minimum allowed report interval in milliseconds (1 second).
pub const MIN_REPORT_INTERVAL_MS: u64 = 1000;

/// Maximum allowed report interval in milliseconds (1 hour).
pub const MAX_REPORT_INTERVAL_MS: u64 = 3_600_000;

/// Accepted log levels.
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if any value is out of range:
/// - `MONITORING_REPORT_INTERVAL_MS` must be between 1000 and 3600000
/// - `MONITORING_STORAGE_DIR`, `MONITORING_PAGE_URL` and `MONITORING_USER_AGENT` must not be empty
/// - `LOG_LEVEL` must be one of [`LOG_LEVELS`]
#[must_use = "validation result should be checked"]
pub fn validate_config(config: &MonitoringConfig) -> Result<(), ConfigError> {
    if config.report_interval_ms < MIN_REPORT_INTERVAL_MS
        || config.report_interval_ms > MAX_REPORT_INTERVAL_MS
    {
        return Err(ConfigError::InvalidValue {
            var: "MONITORING_REPORT_INTERVAL_MS".into(),
            reason: format!(
                "must be between {MIN_REPORT_INTERVAL_MS} and {MAX_REPORT_INTERVAL_MS} ms"
            ),
        });
    }

    for (var, value) in [
        ("MONITORING_STORAGE_DIR", &config.storage_dir),
        ("MONITORING_PAGE_URL", &config.page_url),
        ("MONITORING_USER_AGENT", &config.user_agent),
    ] {
        if value.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                var: var.into(),
                reason: "must not be empty".into(),
            });
        }
    }

    if !LOG_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        return Err(ConfigError::InvalidValue {
            var: "LOG_LEVEL".into(),
            reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
        });
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&MonitoringConfig::default()).is_ok());
    }

    #[test]
    fn test_interval_too_low() {
        let config = MonitoringConfig {
            report_interval_ms: MIN_REPORT_INTERVAL_MS - 1,
            ..MonitoringConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "MONITORING_REPORT_INTERVAL_MS"
        ));
    }

    #[test]
    fn test_interval_too_high() {
        let config = MonitoringConfig {
            report_interval_ms: MAX_REPORT_INTERVAL_MS + 1,
            ..MonitoringConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_interval_bounds_inclusive() {
        for report_interval_ms in [MIN_REPORT_INTERVAL_MS, MAX_REPORT_INTERVAL_MS] {
            let config = MonitoringConfig {
                report_interval_ms,
                ..MonitoringConfig::default()
            };
            assert!(validate_config(&config).is_ok());
        }
    }

    #[test]
    fn test_empty_page_url() {
        let config = MonitoringConfig {
            page_url: "  ".to_string(),
            ..MonitoringConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "MONITORING_PAGE_URL"
        ));
    }

    #[test]
    fn test_empty_storage_dir() {
        let config = MonitoringConfig {
            storage_dir: String::new(),
            ..MonitoringConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { var, .. } if var == "MONITORING_STORAGE_DIR"
        ));
    }

    #[test]
    fn test_unknown_log_level() {
        let config = MonitoringConfig {
            log_level: "verbose".to_string(),
            ..MonitoringConfig::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "LOG_LEVEL"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let config = MonitoringConfig {
            log_level: "DEBUG".to_string(),
            ..MonitoringConfig::default()
        };
        assert!(validate_config(&config).is_ok());
    }
}
