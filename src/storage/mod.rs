//! Snapshot persistence.
//!
//! This module provides:
//! - The [`KeyValueStore`] abstraction (the `localStorage` of the host)
//! - [`MemoryStore`]: in-process store with an optional byte quota
//! - [`FileStore`]: one JSON file per key in a directory
//! - JSON helpers that load a snapshot only while it is still fresh
//!
//! Snapshots are best effort. Every save returns a [`Result`] and the
//! caller decides whether a failure matters; in-memory buffers are never
//! touched by a failed save.
//!
//! # Example
//!
//! ```
//! use panel_monitoring::storage::{KeyValueStore, MemoryStore};
//!
//! let store = MemoryStore::new();
//! store.set("api_metrics", "{}").unwrap();
//! assert_eq!(store.get("api_metrics").unwrap().as_deref(), Some("{}"));
//! ```

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;

/// Storage key of the API metrics snapshot.
pub const METRICS_STORAGE_KEY: &str = "api_metrics";

/// Storage key of the error log snapshot.
pub const ERRORS_STORAGE_KEY: &str = "error_logs";

/// String key-value store holding JSON snapshots.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend rejects the write.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// A persisted value that records when it was written.
pub trait Timestamped {
    /// Epoch milliseconds of the save.
    fn saved_at(&self) -> i64;
}

/// Serialize `value` as JSON under `key`.
///
/// # Errors
///
/// Returns [`StorageError`] if encoding or the write fails.
pub fn save_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let encoded = serde_json::to_string(value)?;
    store.set(key, &encoded)?;
    tracing::debug!(key, bytes = encoded.len(), "Snapshot saved");
    Ok(())
}

/// Read and decode the JSON value under `key`.
///
/// # Errors
///
/// Returns [`StorageError`] if the read fails or the value is not valid JSON
/// for `T`.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    store
        .get(key)?
        .map(|raw| serde_json::from_str(&raw).map_err(StorageError::from))
        .transpose()
}

/// Load a snapshot saved less than `max_age_ms` before `now_ms`.
///
/// Stale, missing and unreadable snapshots all yield `None`; nothing is
/// merged and nothing is raised.
pub fn load_fresh<T: DeserializeOwned + Timestamped>(
    store: &dyn KeyValueStore,
    key: &str,
    now_ms: i64,
    max_age_ms: i64,
) -> Option<T> {
    match load_json::<T>(store, key) {
        Ok(Some(snapshot)) => {
            let age = now_ms.saturating_sub(snapshot.saved_at());
            if age < max_age_ms {
                Some(snapshot)
            } else {
                tracing::debug!(key, age_ms = age, "Discarding stale snapshot");
                None
            }
        }
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to load snapshot");
            None
        }
    }
}
