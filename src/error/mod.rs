//! Error types for panel monitoring.
//!
//! This module defines a hierarchical error system:
//! - [`MonitoringError`]: Top-level errors returned by the facade and the
//!   probe binary
//! - [`StorageError`]: Snapshot persistence errors
//! - [`ObserveError`]: Performance observer registration errors
//! - [`ConfigError`]: Configuration errors
//!
//! Ingestion (`record_request`, `log_error`) never fails because of its
//! input. Only persistence and setup return errors, and callers decide
//! whether to log or ignore them.

use thiserror::Error;

/// Top-level monitoring error.
#[derive(Debug, Error)]
pub enum MonitoringError {
    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Report serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value storage errors.
///
/// These mirror the ways browser storage fails: the backend is missing,
/// the quota is exhausted, or a value cannot be read back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The storage backend is not available.
    #[error("Storage unavailable: {message}")]
    Unavailable {
        /// Description of why storage is unavailable.
        message: String,
    },

    /// Writing the value would exceed the storage quota.
    #[error("Quota exceeded writing {key}: {bytes} bytes over limit of {limit}")]
    QuotaExceeded {
        /// The key being written.
        key: String,
        /// Size of the store after the write.
        bytes: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// I/O failure reading or writing a key.
    #[error("I/O error on {key}: {message}")]
    Io {
        /// The key involved.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// A snapshot could not be encoded or decoded.
    #[error("Serialization failed: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// Key contains characters the backend cannot store.
    #[error("Invalid storage key: {key}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Performance observer registration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ObserveError {
    /// The host does not support this entry type.
    #[error("Unsupported entry type: {entry_type}")]
    Unsupported {
        /// The entry type name.
        entry_type: String,
    },

    /// The host refused the registration.
    #[error("Observer registration failed for {entry_type}: {message}")]
    Registration {
        /// The entry type name.
        entry_type: String,
        /// Description of the failure.
        message: String,
    },
}

/// Configuration errors.
///
/// These errors represent failures in configuration loading and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}
