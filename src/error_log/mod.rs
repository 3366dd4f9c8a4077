//! Runtime error capture.
//!
//! This module provides:
//! - [`ErrorLogger`]: bounded FIFO buffer of captured errors with listeners
//! - Noise filtering, type classification and critical-error detection
//! - [`GlobalErrorHooks`]: panic hook capturing uncaught runtime errors
//! - [`spawn_watched`]: task spawner capturing failed background work
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use panel_monitoring::error_log::{ErrorLogger, ErrorReport, ErrorSource};
//! use panel_monitoring::storage::MemoryStore;
//! use panel_monitoring::traits::{RealTimeProvider, StaticPage};
//!
//! let logger = ErrorLogger::new(
//!     true,
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(RealTimeProvider),
//!     Arc::new(StaticPage::new("https://partner.example.com", "doc-test")),
//! );
//!
//! assert!(logger.log_error(ErrorReport::new("x is undefined", ErrorSource::Javascript)).unwrap());
//! // Known browser noise is dropped
//! assert!(!logger.log_error(ErrorReport::new("ResizeObserver loop limit exceeded", ErrorSource::Javascript)).unwrap());
//! assert_eq!(logger.summary(None).total_errors, 1);
//! ```

mod filter;
mod hooks;

pub use filter::{error_type, is_critical, should_ignore, IGNORED_PATTERNS};
pub use hooks::{hooks_installed, spawn_watched, GlobalErrorHooks};

use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::StorageError;
use crate::storage::{self, KeyValueStore, Timestamped, ERRORS_STORAGE_KEY};
use crate::traits::{ErrorSink, PageContext, TimeProvider};

/// Maximum number of errors kept in memory.
pub const MAX_ERRORS: usize = 500;

/// A snapshot is saved after every this many insertions.
pub const SNAPSHOT_INTERVAL: usize = 20;

/// Number of newest errors written to a snapshot.
pub const SNAPSHOT_SIZE: usize = 50;

/// Errors listed in `recent_errors` of a summary.
pub const MAX_RECENT_ERRORS: usize = 20;

/// Errors listed in `critical_errors` of a summary.
pub const MAX_CRITICAL_ERRORS: usize = 10;

/// Snapshots older than this (24 hours) are discarded on load.
pub const SNAPSHOT_MAX_AGE_MS: i64 = 24 * 60 * 60 * 1000;

/// Persisted session keys checked, in order, for the current user id.
pub const SESSION_KEYS: [&str; 2] = ["user", "partner_user"];

/// Where an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSource {
    /// Failed HTTP request.
    Api,
    /// Render failure reported by the UI error boundary.
    React,
    /// Uncaught synchronous runtime error.
    Javascript,
    /// Failed background task nobody awaited.
    Promise,
}

impl ErrorSource {
    /// Wire name of the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::React => "react",
            Self::Javascript => "javascript",
            Self::Promise => "promise",
        }
    }
}

impl std::fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorLog {
    /// Unique id: capture time plus a random suffix.
    pub id: String,
    /// Error message.
    pub message: String,
    /// Stack trace, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Origin of the error.
    pub source: ErrorSource,
    /// Capture time (epoch milliseconds).
    pub timestamp: i64,
    /// Page URL at capture time.
    pub url: String,
    /// Host user agent.
    pub user_agent: String,
    /// Signed-in user, when a persisted session was readable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Free-form context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<Value>,
}

/// Input to [`ErrorLogger::log_error`].
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    /// Error message.
    pub message: String,
    /// Origin of the error.
    pub source: ErrorSource,
    /// Stack trace.
    pub stack: Option<String>,
    /// Free-form context.
    pub additional_data: Option<Value>,
}

impl ErrorReport {
    /// Create a report without stack or context.
    #[must_use]
    pub fn new(message: impl Into<String>, source: ErrorSource) -> Self {
        Self {
            message: message.into(),
            source,
            stack: None,
            additional_data: None,
        }
    }

    /// Attach a stack trace.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Attach context.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.additional_data = Some(data);
        self
    }
}

/// Aggregate over the errors of a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    /// Errors in the window.
    pub total_errors: u64,
    /// Count per coarse type (see [`error_type`]).
    pub errors_by_type: BTreeMap<String, u64>,
    /// Count per source.
    pub errors_by_source: BTreeMap<ErrorSource, u64>,
    /// Newest errors, oldest first.
    pub recent_errors: Vec<ErrorLog>,
    /// Newest critical errors, oldest first.
    pub critical_errors: Vec<ErrorLog>,
}

impl ErrorSummary {
    fn from_errors<'a>(errors: impl Iterator<Item = &'a ErrorLog>) -> Self {
        let mut summary = Self::default();
        let mut recent: VecDeque<&ErrorLog> = VecDeque::new();
        let mut critical: VecDeque<&ErrorLog> = VecDeque::new();

        for error in errors {
            summary.total_errors += 1;
            *summary
                .errors_by_type
                .entry(error_type(&error.message).to_string())
                .or_insert(0) += 1;
            *summary.errors_by_source.entry(error.source).or_insert(0) += 1;

            push_bounded(&mut recent, error, MAX_RECENT_ERRORS);
            if is_critical(error) {
                push_bounded(&mut critical, error, MAX_CRITICAL_ERRORS);
            }
        }

        summary.recent_errors = recent.into_iter().cloned().collect();
        summary.critical_errors = critical.into_iter().cloned().collect();
        summary
    }
}

fn push_bounded<T>(items: &mut VecDeque<T>, item: T, cap: usize) {
    if items.len() == cap {
        items.pop_front();
    }
    items.push_back(item);
}

/// Export envelope produced by [`ErrorLogger::export_errors`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorExport {
    /// Summary over every buffered error.
    pub summary: ErrorSummary,
    /// Export time (RFC 3339).
    pub timestamp: String,
    /// Host user agent.
    pub user_agent: String,
    /// Host page URL.
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorSnapshot {
    errors: Vec<ErrorLog>,
    timestamp: i64,
}

impl Timestamped for ErrorSnapshot {
    fn saved_at(&self) -> i64 {
        self.timestamp
    }
}

type Listener = Arc<dyn Fn(&ErrorLog) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Handle returned by [`ErrorLogger::on_error`].
///
/// Dropping it keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Remove the listener this subscription registered.
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock_listeners(&listeners)
                .entries
                .retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock_listeners(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(|poison_error| {
        tracing::warn!(error = %poison_error, "Listener lock poisoned, using recovered data");
        poison_error.into_inner()
    })
}

/// Thread-safe error logger.
///
/// Holds at most [`MAX_ERRORS`] entries and drops the oldest first.
pub struct ErrorLogger {
    enabled: bool,
    errors: RwLock<VecDeque<ErrorLog>>,
    inserted: Mutex<u64>,
    listeners: Arc<Mutex<Listeners>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeProvider>,
    page: Arc<dyn PageContext>,
}

impl std::fmt::Debug for ErrorLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorLogger")
            .field("enabled", &self.enabled)
            .field("len", &self.len())
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl ErrorLogger {
    /// Create a logger, restoring a snapshot younger than 24 hours.
    ///
    /// `enabled` only controls [`ErrorLogger::install_global_handlers`];
    /// explicit logging always works.
    #[must_use]
    pub fn new(
        enabled: bool,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeProvider>,
        page: Arc<dyn PageContext>,
    ) -> Self {
        let restored: VecDeque<ErrorLog> = storage::load_fresh::<ErrorSnapshot>(
            store.as_ref(),
            ERRORS_STORAGE_KEY,
            clock.now_millis(),
            SNAPSHOT_MAX_AGE_MS,
        )
        .map(|snapshot| snapshot.errors.into_iter().collect())
        .unwrap_or_default();

        if !restored.is_empty() {
            tracing::debug!(count = restored.len(), "Restored error log snapshot");
        }

        Self {
            enabled,
            errors: RwLock::new(restored),
            inserted: Mutex::new(0),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            store,
            clock,
            page,
        }
    }

    /// Whether global handlers may be installed.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<ErrorLog>> {
        self.errors.read().unwrap_or_else(|poison_error| {
            tracing::warn!(
                error = %poison_error,
                "Reading errors from poisoned lock, using recovered data"
            );
            poison_error.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<ErrorLog>> {
        self.errors.write().unwrap_or_else(|poison_error| {
            tracing::warn!(
                error = %poison_error,
                "Writing errors through poisoned lock, using recovered data"
            );
            poison_error.into_inner()
        })
    }

    /// Capture an error.
    ///
    /// Returns `Ok(false)` when the message matches the noise filter; nothing
    /// is recorded and no listener runs. Otherwise the error is recorded,
    /// every listener is called, and every [`SNAPSHOT_INTERVAL`]th insertion
    /// saves a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the periodic snapshot could not be saved.
    /// The error is recorded regardless.
    pub fn log_error(&self, report: ErrorReport) -> Result<bool, StorageError> {
        let Some((entry, snapshot)) = self.insert(report) else {
            return Ok(false);
        };

        self.notify(&entry);

        if let Some(errors) = snapshot {
            self.persist(errors)?;
        }
        Ok(true)
    }

    /// Like [`ErrorLogger::log_error`], but listeners run on a separate
    /// thread. Used from the panic hook, where a panicking listener would
    /// abort the process.
    pub(crate) fn log_error_deferred(
        self: &Arc<Self>,
        report: ErrorReport,
    ) -> Result<bool, StorageError> {
        let Some((entry, snapshot)) = self.insert(report) else {
            return Ok(false);
        };

        let logger = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("error-listeners".to_string())
            .spawn(move || logger.notify(&entry));
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Failed to dispatch error listeners");
        }

        if let Some(errors) = snapshot {
            self.persist(errors)?;
        }
        Ok(true)
    }

    /// Record an error unless filtered; returns it with the snapshot due.
    fn insert(&self, report: ErrorReport) -> Option<(ErrorLog, Option<Vec<ErrorLog>>)> {
        if should_ignore(&report.message) {
            return None;
        }

        let timestamp = self.clock.now_millis();
        let entry = ErrorLog {
            id: new_error_id(timestamp),
            message: report.message,
            stack: report.stack,
            source: report.source,
            timestamp,
            url: self.page.url(),
            user_agent: self.page.user_agent(),
            user_id: self.current_user_id(),
            additional_data: report.additional_data,
        };

        let mut errors = self.write();
        if errors.len() >= MAX_ERRORS {
            errors.pop_front();
        }
        errors.push_back(entry.clone());

        let mut inserted = self
            .inserted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *inserted += 1;
        let snapshot =
            (*inserted % SNAPSHOT_INTERVAL as u64 == 0).then(|| newest(&errors, SNAPSHOT_SIZE));
        drop(inserted);
        drop(errors);

        Some((entry, snapshot))
    }

    /// Capture a failed API request.
    ///
    /// `error` is kept as JSON when it parses as JSON (an upstream error
    /// payload), otherwise as text.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the periodic snapshot could not be saved.
    pub fn log_api_error(
        &self,
        url: &str,
        status: Option<u16>,
        error: &str,
    ) -> Result<bool, StorageError> {
        let message = status.map_or_else(
            || format!("API Error: Network Error {url}"),
            |status| format!("API Error: {status} {url}"),
        );
        let upstream =
            serde_json::from_str::<Value>(error).unwrap_or_else(|_| Value::String(error.into()));
        let report = ErrorReport::new(message, ErrorSource::Api).with_data(json!({
            "url": url,
            "status": status,
            "error": upstream,
        }));
        self.log_error(report)
    }

    /// Capture a render failure from the UI error boundary.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the periodic snapshot could not be saved.
    pub fn log_react_error(
        &self,
        message: &str,
        stack: Option<&str>,
        component_stack: Option<&str>,
    ) -> Result<bool, StorageError> {
        let mut report = ErrorReport::new(message, ErrorSource::React);
        if let Some(stack) = stack {
            report = report.with_stack(stack);
        }
        if let Some(component_stack) = component_stack {
            report = report.with_data(json!({ "componentStack": component_stack }));
        }
        self.log_error(report)
    }

    /// Summarize errors newer than `window`, or all errors.
    #[must_use]
    pub fn summary(&self, window: Option<Duration>) -> ErrorSummary {
        let errors = self.read();
        match window {
            Some(window) => {
                let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
                let cutoff = self.clock.now_millis().saturating_sub(window_ms);
                ErrorSummary::from_errors(errors.iter().filter(|e| e.timestamp >= cutoff))
            }
            None => ErrorSummary::from_errors(errors.iter()),
        }
    }

    /// Summarize the last `minutes` minutes.
    #[must_use]
    pub fn recent_errors(&self, minutes: u64) -> ErrorSummary {
        self.summary(Some(Duration::from_secs(minutes * 60)))
    }

    /// Register a listener called synchronously with every recorded error.
    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ErrorLog) + Send + Sync + 'static,
    {
        let mut listeners = lock_listeners(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(handler)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        lock_listeners(&self.listeners).entries.len()
    }

    /// Copy of every buffered error, oldest first.
    #[must_use]
    pub fn all_errors(&self) -> Vec<ErrorLog> {
        self.read().iter().cloned().collect()
    }

    /// Number of buffered errors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every error and persist the empty state.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the empty snapshot could not be saved.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.write().clear();
        self.persist(Vec::new())
    }

    /// Save the newest errors now.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the snapshot could not be saved.
    pub fn save(&self) -> Result<(), StorageError> {
        let errors = newest(&self.read(), SNAPSHOT_SIZE);
        self.persist(errors)
    }

    /// Serialize a summary with host details for download.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON encoding fails.
    pub fn export_errors(&self) -> Result<String, serde_json::Error> {
        let export = ErrorExport {
            summary: self.summary(None),
            timestamp: self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_agent: self.page.user_agent(),
            url: self.page.url(),
        };
        serde_json::to_string_pretty(&export)
    }

    /// Install the process-wide handlers, unless disabled.
    ///
    /// The handlers stay active until the returned value is dropped or a
    /// later install takes them over. Only one logger captures panics at a
    /// time.
    #[must_use]
    pub fn install_global_handlers(self: &Arc<Self>) -> Option<GlobalErrorHooks> {
        self.enabled
            .then(|| GlobalErrorHooks::install(Arc::clone(self)))
    }

    fn notify(&self, entry: &ErrorLog) {
        let listeners: Vec<(u64, Listener)> = lock_listeners(&self.listeners).entries.clone();

        for (id, listener) in listeners {
            let outcome =
                hooks::suppress_capture(|| panic::catch_unwind(AssertUnwindSafe(|| listener(entry))));
            if let Err(payload) = outcome {
                tracing::error!(
                    listener_id = id,
                    panic = %hooks::panic_payload_message(payload.as_ref()),
                    "Error listener panicked"
                );
            }
        }
    }

    fn current_user_id(&self) -> Option<String> {
        let raw = SESSION_KEYS
            .iter()
            .find_map(|key| self.store.get(key).ok().flatten())?;

        let session: Value = serde_json::from_str(&raw).ok()?;
        match session.get("id")? {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }

    fn persist(&self, errors: Vec<ErrorLog>) -> Result<(), StorageError> {
        let snapshot = ErrorSnapshot {
            errors,
            timestamp: self.clock.now_millis(),
        };
        storage::save_json(self.store.as_ref(), ERRORS_STORAGE_KEY, &snapshot)
    }
}

impl ErrorSink for ErrorLogger {
    fn log_api_error(
        &self,
        url: &str,
        status: Option<u16>,
        error: &str,
    ) -> Result<(), StorageError> {
        Self::log_api_error(self, url, status, error).map(|_| ())
    }
}

fn new_error_id(timestamp: i64) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{timestamp}-{}", &random[..9])
}

fn newest<T: Clone>(items: &VecDeque<T>, count: usize) -> Vec<T> {
    items
        .iter()
        .skip(items.len().saturating_sub(count))
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_utils::{logger_with, test_page, TEST_NOW};
    use crate::traits::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn js(message: &str) -> ErrorReport {
        ErrorReport::new(message, ErrorSource::Javascript)
    }

    #[test]
    fn test_log_error_populates_context() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        let recorded = logger
            .log_error(js("x is undefined").with_stack("at main.js:1:1"))
            .unwrap();
        assert!(recorded);

        let errors = logger.all_errors();
        assert_eq!(errors.len(), 1);
        let error = &errors[0];
        assert_eq!(error.message, "x is undefined");
        assert_eq!(error.stack.as_deref(), Some("at main.js:1:1"));
        assert_eq!(error.source, ErrorSource::Javascript);
        assert_eq!(error.timestamp, TEST_NOW);
        assert_eq!(error.url, "https://admin.example.com/dashboard");
        assert_eq!(error.user_agent, "test-agent");
        assert!(error.user_id.is_none());
        assert!(error.id.starts_with(&format!("{TEST_NOW}-")));
        assert_eq!(error.id.len(), TEST_NOW.to_string().len() + 10);
    }

    #[test]
    fn test_ids_are_unique() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        logger.log_error(js("a")).unwrap();
        logger.log_error(js("b")).unwrap();
        let errors = logger.all_errors();
        assert_ne!(errors[0].id, errors[1].id);
    }

    #[test]
    fn test_ignored_message_has_no_effect() {
        let (logger, store, _clock) = logger_with(MemoryStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let _subscription = logger.on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let recorded = logger
            .log_error(js("Failed to execute 'attachShadow' on 'Element'"))
            .unwrap();

        assert!(!recorded);
        assert!(logger.all_errors().is_empty());
        assert_eq!(logger.summary(None).total_errors, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        for i in 0..=MAX_ERRORS {
            logger.log_error(js(&format!("error {i}"))).unwrap();
        }

        let errors = logger.all_errors();
        assert_eq!(errors.len(), MAX_ERRORS);
        assert_eq!(errors[0].message, "error 1");
        assert_eq!(errors[MAX_ERRORS - 1].message, format!("error {MAX_ERRORS}"));
    }

    #[test]
    fn test_listener_called_once_then_unsubscribed() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        let messages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&messages);
        let subscription = logger.on_error(move |error| {
            sink.lock().unwrap().push(error.message.clone());
        });

        logger.log_error(js("first")).unwrap();
        assert_eq!(*messages.lock().unwrap(), vec!["first".to_string()]);

        subscription.unsubscribe();
        assert_eq!(logger.listener_count(), 0);

        logger.log_error(js("second")).unwrap();
        assert_eq!(messages.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unsubscribe_removes_only_its_listener() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        let first = logger.on_error(|_| {});
        let _second = logger.on_error(|_| {});
        assert_eq!(logger.listener_count(), 2);

        first.unsubscribe();
        assert_eq!(logger.listener_count(), 1);
    }

    #[test]
    fn test_unsubscribe_after_logger_dropped() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        let subscription = logger.on_error(|_| {});
        drop(logger);
        subscription.unsubscribe();
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let _bad = logger.on_error(|_| panic!("listener bug"));
        let seen = Arc::clone(&calls);
        let _good = logger.on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(logger.log_error(js("one")).unwrap());
        assert!(logger.log_error(js("two")).unwrap());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(logger.listener_count(), 2);
        assert_eq!(logger.len(), 2);
    }

    #[test]
    fn test_log_api_error() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        logger
            .log_api_error("/api/users", Some(503), r#"{"detail":"maintenance"}"#)
            .unwrap();
        logger
            .log_api_error("/api/partners", None, "connection reset")
            .unwrap();

        let errors = logger.all_errors();
        assert_eq!(errors[0].message, "API Error: 503 /api/users");
        assert_eq!(errors[0].source, ErrorSource::Api);
        let data = errors[0].additional_data.as_ref().unwrap();
        assert_eq!(data["status"], 503);
        assert_eq!(data["error"]["detail"], "maintenance");

        assert_eq!(errors[1].message, "API Error: Network Error /api/partners");
        let data = errors[1].additional_data.as_ref().unwrap();
        assert!(data["status"].is_null());
        assert_eq!(data["error"], "connection reset");
    }

    #[test]
    fn test_log_react_error() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        logger
            .log_react_error(
                "Cannot read properties of null",
                Some("at UserTable"),
                Some("in UserTable\n in Page"),
            )
            .unwrap();

        let error = &logger.all_errors()[0];
        assert_eq!(error.source, ErrorSource::React);
        assert_eq!(error.stack.as_deref(), Some("at UserTable"));
        assert_eq!(
            error.additional_data.as_ref().unwrap()["componentStack"],
            "in UserTable\n in Page"
        );
    }

    #[test]
    fn test_summary_groups_and_critical() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        logger.log_api_error("/api/users", Some(500), "boom").unwrap();
        logger.log_api_error("/api/users", Some(404), "missing").unwrap();
        logger.log_error(js("Request timeout")).unwrap();
        logger
            .log_react_error("render failed", None, None)
            .unwrap();
        logger
            .log_error(ErrorReport::new("Network Error", ErrorSource::Promise))
            .unwrap();

        let summary = logger.summary(None);
        assert_eq!(summary.total_errors, 5);
        assert_eq!(summary.errors_by_type.get("API Error"), Some(&2));
        assert_eq!(summary.errors_by_type.get("Timeout"), Some(&1));
        assert_eq!(summary.errors_by_type.get("Network"), Some(&1));
        assert_eq!(summary.errors_by_type.get("Other"), Some(&1));
        assert_eq!(summary.errors_by_source.get(&ErrorSource::Api), Some(&2));
        assert_eq!(summary.errors_by_source.get(&ErrorSource::React), Some(&1));
        assert_eq!(summary.recent_errors.len(), 5);

        let critical: Vec<&str> = summary
            .critical_errors
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(
            critical,
            vec!["API Error: 500 /api/users", "render failed", "Network Error"]
        );
    }

    #[test]
    fn test_summary_caps_recent_and_critical() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        for i in 0..30 {
            logger.log_react_error(&format!("render {i}"), None, None).unwrap();
        }
        let summary = logger.summary(None);
        assert_eq!(summary.recent_errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(summary.critical_errors.len(), MAX_CRITICAL_ERRORS);
        assert_eq!(summary.recent_errors[0].message, "render 10");
        assert_eq!(summary.critical_errors[9].message, "render 29");
    }

    #[test]
    fn test_recent_errors_window() {
        let (logger, _store, clock) = logger_with(MemoryStore::new());
        logger.log_error(js("early")).unwrap();
        clock.advance_ms(10 * 60_000);
        logger.log_error(js("late")).unwrap();

        assert_eq!(logger.recent_errors(5).total_errors, 1);
        assert_eq!(logger.recent_errors(15).total_errors, 2);
    }

    #[test]
    fn test_summary_serializes_sources_as_keys() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        logger.log_error(js("a")).unwrap();
        let json = serde_json::to_value(logger.summary(None)).unwrap();
        assert_eq!(json["errorsBySource"]["javascript"], 1);
        assert_eq!(json["totalErrors"], 1);
    }

    #[test]
    fn test_user_id_from_first_session_key() {
        let store = MemoryStore::new();
        store.set("user", r#"{"id": 42, "name": "Admin"}"#).unwrap();
        store.set("partner_user", r#"{"id": "p-7"}"#).unwrap();
        let (logger, _store, _clock) = logger_with(store);

        logger.log_error(js("a")).unwrap();
        assert_eq!(logger.all_errors()[0].user_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_user_id_from_partner_session() {
        let store = MemoryStore::new();
        store.set("partner_user", r#"{"id": "p-7"}"#).unwrap();
        let (logger, _store, _clock) = logger_with(store);

        logger.log_error(js("a")).unwrap();
        assert_eq!(logger.all_errors()[0].user_id.as_deref(), Some("p-7"));
    }

    #[test]
    fn test_user_id_unreadable_session() {
        let store = MemoryStore::new();
        store.set("user", "not json").unwrap();
        store.set("partner_user", r#"{"id": "p-7"}"#).unwrap();
        let (logger, _store, _clock) = logger_with(store);

        logger.log_error(js("a")).unwrap();
        assert!(logger.all_errors()[0].user_id.is_none());
    }

    #[test]
    fn test_snapshot_every_twentieth_insertion() {
        let (logger, store, _clock) = logger_with(MemoryStore::new());
        for i in 0..19 {
            logger.log_error(js(&format!("e{i}"))).unwrap();
        }
        assert!(store.get(ERRORS_STORAGE_KEY).unwrap().is_none());

        logger.log_error(js("e19")).unwrap();
        let raw = store.get(ERRORS_STORAGE_KEY).unwrap().unwrap();
        let snapshot: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot["errors"].as_array().unwrap().len(), 20);
        assert_eq!(snapshot["timestamp"], TEST_NOW);
    }

    #[test]
    fn test_snapshot_keeps_newest_fifty() {
        let (logger, store, _clock) = logger_with(MemoryStore::new());
        for i in 0..60 {
            logger.log_error(js(&format!("e{i}"))).unwrap();
        }
        let raw = store.get(ERRORS_STORAGE_KEY).unwrap().unwrap();
        let snapshot: Value = serde_json::from_str(&raw).unwrap();
        let errors = snapshot["errors"].as_array().unwrap();
        assert_eq!(errors.len(), SNAPSHOT_SIZE);
        assert_eq!(errors[0]["message"], "e10");
    }

    #[test]
    fn test_snapshot_failure_still_records() {
        let (logger, _store, _clock) = logger_with(MemoryStore::with_quota(32));
        for i in 0..19 {
            logger.log_error(js(&format!("e{i}"))).unwrap();
        }
        let err = logger.log_error(js("e19")).unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(logger.len(), 20);
    }

    #[test]
    fn test_restores_snapshot_within_a_day() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(TEST_NOW));
        {
            let logger = ErrorLogger::new(true, store.clone(), clock.clone(), test_page());
            logger.log_error(js("persisted")).unwrap();
            logger.save().unwrap();
        }

        clock.advance_ms(SNAPSHOT_MAX_AGE_MS - 1);
        let restored = ErrorLogger::new(true, store.clone(), clock.clone(), test_page());
        assert_eq!(restored.all_errors()[0].message, "persisted");

        clock.advance_ms(1);
        let discarded = ErrorLogger::new(true, store, clock, test_page());
        assert!(discarded.is_empty());
    }

    #[test]
    fn test_clear_persists_empty_state() {
        let (logger, store, _clock) = logger_with(MemoryStore::new());
        logger.log_error(js("a")).unwrap();
        logger.clear().unwrap();

        assert!(logger.is_empty());
        let raw = store.get(ERRORS_STORAGE_KEY).unwrap().unwrap();
        let snapshot: Value = serde_json::from_str(&raw).unwrap();
        assert!(snapshot["errors"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_export_errors_round_trip() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        logger.log_error(js("a")).unwrap();

        let exported = logger.export_errors().unwrap();
        let parsed: ErrorExport = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed.summary.total_errors, 1);
        assert!(parsed.timestamp.starts_with("2026-01-15T10:00:00"));
    }

    #[test]
    fn test_disabled_logger_installs_nothing() {
        let store = Arc::new(MemoryStore::new());
        let logger = Arc::new(ErrorLogger::new(
            false,
            store,
            Arc::new(ManualClock::new(TEST_NOW)),
            test_page(),
        ));
        assert!(!logger.is_enabled());
        assert!(logger.install_global_handlers().is_none());
        assert!(logger.log_error(js("still logged")).unwrap());
    }

    #[test]
    fn test_error_sink_impl() {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        let sink: &dyn ErrorSink = &logger;
        sink.log_api_error("/api/settings", Some(401), "expired").unwrap();
        assert_eq!(logger.summary(None).errors_by_type.get("API Error"), Some(&1));
    }

    #[test]
    fn test_error_source_display() {
        assert_eq!(ErrorSource::Promise.to_string(), "promise");
        assert_eq!(
            serde_json::to_string(&ErrorSource::Javascript).unwrap(),
            "\"javascript\""
        );
    }
}
