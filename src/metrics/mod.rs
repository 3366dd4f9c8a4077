//! API request metrics.
//!
//! This module provides:
//! - [`ApiMetricsCollector`]: bounded FIFO buffer of request outcomes
//! - Windowed summaries grouped by status and endpoint
//! - [`MetricsInterceptor`] and [`InstrumentedClient`] feeding the collector
//!   from `reqwest` calls
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use panel_monitoring::metrics::{ApiMetricsCollector, ApiRequestMetric};
//! use panel_monitoring::storage::MemoryStore;
//! use panel_monitoring::traits::{ManualClock, StaticPage};
//!
//! let collector = ApiMetricsCollector::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(ManualClock::new(1_000)),
//!     Arc::new(StaticPage::new("https://admin.example.com", "doc-test")),
//! );
//! collector.record_request(ApiRequestMetric::new("/api/users", "GET", Some(200), 10.0, 1_000)).unwrap();
//! collector.record_request(ApiRequestMetric::new("/api/users", "GET", Some(200), 20.0, 1_000)).unwrap();
//! collector.record_request(ApiRequestMetric::new("/api/partners", "GET", Some(500), 30.0, 1_000)).unwrap();
//!
//! let summary = collector.summary(None);
//! assert_eq!(summary.total_requests, 3);
//! assert_eq!(summary.failed_requests, 1);
//! assert!((summary.average_duration - 20.0).abs() < f64::EPSILON);
//! ```

// Allow intentional numeric casts for metrics calculations
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

mod interceptor;

pub use interceptor::{InstrumentedClient, MetricsInterceptor, RequestContext};

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::storage::{self, KeyValueStore, Timestamped, METRICS_STORAGE_KEY};
use crate::traits::{MetricsSink, PageContext, TimeProvider};

/// Maximum number of metrics kept in memory.
pub const MAX_METRICS: usize = 1000;

/// A snapshot is saved whenever the buffer length is a multiple of this.
pub const SNAPSHOT_INTERVAL: usize = 10;

/// Number of newest metrics written to a snapshot.
pub const SNAPSHOT_SIZE: usize = 100;

/// Maximum failed requests listed in a summary.
pub const MAX_RECENT_ERRORS: usize = 50;

/// Snapshots older than this (one hour) are discarded on load.
pub const SNAPSHOT_MAX_AGE_MS: i64 = 60 * 60 * 1000;

/// Outcome of one HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequestMetric {
    /// Request URL as issued by the client.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Response status, absent when no response arrived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Duration in milliseconds.
    pub duration: f64,
    /// Completion time (epoch milliseconds).
    pub timestamp: i64,
    /// Error message for failed requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the request succeeded.
    pub success: bool,
}

impl ApiRequestMetric {
    /// Create a metric. `success` is true for statuses below 400.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
        status: Option<u16>,
        duration: f64,
        timestamp: i64,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            status,
            duration,
            timestamp,
            error: None,
            success: matches!(status, Some(s) if s < 400),
        }
    }

    /// Attach an error message and mark the request failed.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.success = false;
        self
    }
}

/// Aggregate over the metrics of a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApiMetricsSummary {
    /// Requests in the window.
    pub total_requests: u64,
    /// Requests marked successful.
    pub successful_requests: u64,
    /// Requests marked failed.
    pub failed_requests: u64,
    /// Mean duration in milliseconds, 0 when empty.
    pub average_duration: f64,
    /// Sum of durations in milliseconds.
    pub total_duration: f64,
    /// Count per status code; `0` counts requests without a response.
    pub requests_by_status: BTreeMap<u16, u64>,
    /// Count per endpoint (last two path segments).
    pub requests_by_endpoint: BTreeMap<String, u64>,
    /// Newest failed requests, oldest first.
    pub recent_errors: Vec<ApiRequestMetric>,
    /// Timestamp of the newest request.
    pub last_request_time: Option<i64>,
}

impl ApiMetricsSummary {
    /// Share of successful requests (1.0 when empty).
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    fn from_metrics<'a>(metrics: impl Iterator<Item = &'a ApiRequestMetric>) -> Self {
        let mut summary = Self::default();
        let mut errors: VecDeque<&ApiRequestMetric> = VecDeque::new();

        for metric in metrics {
            summary.total_requests += 1;
            if metric.success {
                summary.successful_requests += 1;
            } else {
                summary.failed_requests += 1;
                if errors.len() == MAX_RECENT_ERRORS {
                    errors.pop_front();
                }
                errors.push_back(metric);
            }
            summary.total_duration += metric.duration;
            *summary
                .requests_by_status
                .entry(metric.status.unwrap_or(0))
                .or_insert(0) += 1;
            *summary
                .requests_by_endpoint
                .entry(endpoint_of(&metric.url))
                .or_insert(0) += 1;
            summary.last_request_time = Some(
                summary
                    .last_request_time
                    .map_or(metric.timestamp, |t| t.max(metric.timestamp)),
            );
        }

        if summary.total_requests > 0 {
            summary.average_duration = summary.total_duration / summary.total_requests as f64;
        }
        summary.recent_errors = errors.into_iter().cloned().collect();
        summary
    }
}

/// Group key for a URL: its last two path segments.
///
/// Scheme, host, query and fragment are ignored, so
/// `https://api.example.com/v1/users/42?tab=1` groups as `users/42`.
#[must_use]
pub fn endpoint_of(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| {
        rest.find('/').map_or("", |idx| &rest[idx..])
    });
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let start = segments.len().saturating_sub(2);
    if segments.is_empty() {
        "/".to_string()
    } else {
        segments[start..].join("/")
    }
}

/// Persisted form of the newest metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MetricsSnapshot {
    metrics: Vec<ApiRequestMetric>,
    timestamp: i64,
}

impl Timestamped for MetricsSnapshot {
    fn saved_at(&self) -> i64 {
        self.timestamp
    }
}

/// Export envelope produced by [`ApiMetricsCollector::export_metrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsExport {
    /// Summary over every buffered metric.
    pub summary: ApiMetricsSummary,
    /// Export time (RFC 3339).
    pub timestamp: String,
    /// Host user agent.
    pub user_agent: String,
    /// Host page URL.
    pub url: String,
}

/// Thread-safe collector of API request metrics.
///
/// Holds at most [`MAX_METRICS`] entries and drops the oldest first.
pub struct ApiMetricsCollector {
    metrics: RwLock<VecDeque<ApiRequestMetric>>,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn TimeProvider>,
    page: Arc<dyn PageContext>,
}

impl std::fmt::Debug for ApiMetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetricsCollector")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ApiMetricsCollector {
    /// Create a collector, restoring a snapshot younger than one hour.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn TimeProvider>,
        page: Arc<dyn PageContext>,
    ) -> Self {
        let restored: VecDeque<ApiRequestMetric> = storage::load_fresh::<MetricsSnapshot>(
            store.as_ref(),
            METRICS_STORAGE_KEY,
            clock.now_millis(),
            SNAPSHOT_MAX_AGE_MS,
        )
        .map(|snapshot| snapshot.metrics.into_iter().collect())
        .unwrap_or_default();

        if !restored.is_empty() {
            tracing::debug!(count = restored.len(), "Restored API metrics snapshot");
        }

        Self {
            metrics: RwLock::new(restored),
            store,
            clock,
            page,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<ApiRequestMetric>> {
        self.metrics.read().unwrap_or_else(|poison_error| {
            tracing::warn!(
                error = %poison_error,
                "Reading metrics from poisoned lock, using recovered data"
            );
            poison_error.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<ApiRequestMetric>> {
        self.metrics.write().unwrap_or_else(|poison_error| {
            tracing::warn!(
                error = %poison_error,
                "Writing metrics through poisoned lock, using recovered data"
            );
            poison_error.into_inner()
        })
    }

    /// Record a completed request.
    ///
    /// Evicts the oldest entry when full, and saves the newest
    /// [`SNAPSHOT_SIZE`] entries whenever the length is a multiple of
    /// [`SNAPSHOT_INTERVAL`]. The metric is kept even if that save fails.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the periodic snapshot could not be saved.
    pub fn record_request(&self, metric: ApiRequestMetric) -> Result<(), StorageError> {
        let snapshot = {
            let mut metrics = self.write();
            if metrics.len() >= MAX_METRICS {
                metrics.pop_front();
            }
            metrics.push_back(metric);
            (metrics.len() % SNAPSHOT_INTERVAL == 0).then(|| newest(&metrics, SNAPSHOT_SIZE))
        };

        match snapshot {
            Some(metrics) => self.persist(metrics),
            None => Ok(()),
        }
    }

    /// Summarize metrics newer than `window`, or all metrics.
    #[must_use]
    pub fn summary(&self, window: Option<Duration>) -> ApiMetricsSummary {
        let metrics = self.read();
        match window {
            Some(window) => {
                let cutoff = self.cutoff(window);
                ApiMetricsSummary::from_metrics(metrics.iter().filter(|m| m.timestamp >= cutoff))
            }
            None => ApiMetricsSummary::from_metrics(metrics.iter()),
        }
    }

    /// Summarize the last `minutes` minutes.
    #[must_use]
    pub fn recent_metrics(&self, minutes: u64) -> ApiMetricsSummary {
        self.summary(Some(Duration::from_secs(minutes * 60)))
    }

    /// Copy of every buffered metric, oldest first.
    #[must_use]
    pub fn all_metrics(&self) -> Vec<ApiRequestMetric> {
        self.read().iter().cloned().collect()
    }

    /// Number of buffered metrics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every metric and persist the empty state.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the empty snapshot could not be saved.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.write().clear();
        self.persist(Vec::new())
    }

    /// Save the newest metrics now.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the snapshot could not be saved.
    pub fn save(&self) -> Result<(), StorageError> {
        let metrics = newest(&self.read(), SNAPSHOT_SIZE);
        self.persist(metrics)
    }

    /// Serialize a summary with host details for download.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON encoding fails.
    pub fn export_metrics(&self) -> Result<String, serde_json::Error> {
        let export = MetricsExport {
            summary: self.summary(None),
            timestamp: self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
            user_agent: self.page.user_agent(),
            url: self.page.url(),
        };
        serde_json::to_string_pretty(&export)
    }

    fn cutoff(&self, window: Duration) -> i64 {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX);
        self.clock.now_millis().saturating_sub(window_ms)
    }

    fn persist(&self, metrics: Vec<ApiRequestMetric>) -> Result<(), StorageError> {
        let snapshot = MetricsSnapshot {
            metrics,
            timestamp: self.clock.now_millis(),
        };
        storage::save_json(self.store.as_ref(), METRICS_STORAGE_KEY, &snapshot)
    }
}

impl MetricsSink for ApiMetricsCollector {
    fn record_request(&self, metric: ApiRequestMetric) -> Result<(), StorageError> {
        Self::record_request(self, metric)
    }
}

fn newest<T: Clone>(items: &VecDeque<T>, count: usize) -> Vec<T> {
    items
        .iter()
        .skip(items.len().saturating_sub(count))
        .cloned()
        .collect()
}

/// Timer for measuring operation latency.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time in fractional milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::start()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::float_cmp,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_utils::{collector_with, metric_at, TEST_NOW};
    use crate::traits::ManualClock;
    use proptest::prelude::*;

    #[test]
    fn test_metric_new_success_from_status() {
        assert!(ApiRequestMetric::new("/a", "GET", Some(200), 1.0, 0).success);
        assert!(ApiRequestMetric::new("/a", "GET", Some(302), 1.0, 0).success);
        assert!(!ApiRequestMetric::new("/a", "GET", Some(404), 1.0, 0).success);
        assert!(!ApiRequestMetric::new("/a", "GET", None, 1.0, 0).success);
    }

    #[test]
    fn test_metric_with_error() {
        let metric = ApiRequestMetric::new("/a", "POST", Some(200), 1.0, 0).with_error("boom");
        assert_eq!(metric.error.as_deref(), Some("boom"));
        assert!(!metric.success);
    }

    #[test]
    fn test_metric_serializes_camel_case() {
        let metric = ApiRequestMetric::new("/api/users", "GET", Some(200), 12.5, 99);
        let json = serde_json::to_string(&metric).unwrap();
        assert!(json.contains("\"url\":\"/api/users\""));
        assert!(json.contains("\"status\":200"));
        assert!(json.contains("\"success\":true"));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_endpoint_of() {
        assert_eq!(endpoint_of("/api/users/42"), "users/42");
        assert_eq!(endpoint_of("/api/users?page=2"), "api/users");
        assert_eq!(
            endpoint_of("https://api.example.com/v1/partners/7/locations#map"),
            "7/locations"
        );
        assert_eq!(endpoint_of("/settings"), "settings");
        assert_eq!(endpoint_of("https://api.example.com"), "/");
        assert_eq!(endpoint_of(""), "/");
    }

    #[test]
    fn test_average_duration() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        for duration in [10.0, 20.0, 30.0] {
            collector
                .record_request(metric_at("/api/users", Some(200), duration, TEST_NOW))
                .unwrap();
        }

        let summary = collector.summary(None);
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.average_duration, 20.0);
        assert_eq!(summary.total_duration, 60.0);
    }

    #[test]
    fn test_empty_summary() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        let summary = collector.summary(None);
        assert_eq!(summary, ApiMetricsSummary::default());
        assert_eq!(summary.average_duration, 0.0);
        assert_eq!(summary.success_rate(), 1.0);
    }

    #[test]
    fn test_requests_by_status() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        for status in [200, 404, 500] {
            collector
                .record_request(metric_at("/api/promotions", Some(status), 5.0, TEST_NOW))
                .unwrap();
        }

        let summary = collector.summary(None);
        let expected: BTreeMap<u16, u64> = [(200, 1), (404, 1), (500, 1)].into_iter().collect();
        assert_eq!(summary.requests_by_status, expected);
        assert_eq!(summary.failed_requests, 2);
        assert_eq!(summary.successful_requests, 1);
        assert_eq!(summary.recent_errors.len(), 2);
        assert_eq!(summary.recent_errors[0].status, Some(404));
    }

    #[test]
    fn test_requests_without_status_grouped_under_zero() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        collector
            .record_request(metric_at("/api/users", None, 5.0, TEST_NOW).with_error("offline"))
            .unwrap();
        let summary = collector.summary(None);
        assert_eq!(summary.requests_by_status.get(&0), Some(&1));
    }

    #[test]
    fn test_requests_by_endpoint() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        collector
            .record_request(metric_at("/api/users?page=1", Some(200), 1.0, TEST_NOW))
            .unwrap();
        collector
            .record_request(metric_at("/api/users?page=2", Some(200), 1.0, TEST_NOW))
            .unwrap();
        collector
            .record_request(metric_at("/api/transactions", Some(200), 1.0, TEST_NOW))
            .unwrap();

        let summary = collector.summary(None);
        assert_eq!(summary.requests_by_endpoint.get("api/users"), Some(&2));
        assert_eq!(summary.requests_by_endpoint.get("api/transactions"), Some(&1));
    }

    #[test]
    fn test_recent_errors_capped() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        for i in 0..60 {
            collector
                .record_request(metric_at(format!("/api/e/{i}"), Some(500), 1.0, TEST_NOW))
                .unwrap();
        }
        let summary = collector.summary(None);
        assert_eq!(summary.recent_errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(summary.recent_errors[0].url, "/api/e/10");
        assert_eq!(summary.recent_errors[49].url, "/api/e/59");
    }

    #[test]
    fn test_time_window() {
        let (collector, _store, clock) = collector_with(MemoryStore::new());
        collector
            .record_request(metric_at("/old", Some(200), 1.0, TEST_NOW - 10 * 60_000))
            .unwrap();
        collector
            .record_request(metric_at("/new", Some(200), 1.0, TEST_NOW - 60_000))
            .unwrap();

        assert_eq!(collector.recent_metrics(5).total_requests, 1);
        assert_eq!(collector.recent_metrics(15).total_requests, 2);
        assert_eq!(collector.summary(None).total_requests, 2);

        clock.advance_ms(10 * 60_000);
        assert_eq!(collector.recent_metrics(5).total_requests, 0);
    }

    #[test]
    fn test_last_request_time() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        collector
            .record_request(metric_at("/a", Some(200), 1.0, TEST_NOW - 5))
            .unwrap();
        collector
            .record_request(metric_at("/b", Some(200), 1.0, TEST_NOW))
            .unwrap();
        assert_eq!(collector.summary(None).last_request_time, Some(TEST_NOW));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        for i in 0..(MAX_METRICS + 5) {
            collector
                .record_request(metric_at(format!("/api/{i}"), Some(200), 1.0, TEST_NOW))
                .unwrap();
        }

        let all = collector.all_metrics();
        assert_eq!(all.len(), MAX_METRICS);
        assert_eq!(all[0].url, "/api/5");
        assert_eq!(all[MAX_METRICS - 1].url, format!("/api/{}", MAX_METRICS + 4));
    }

    #[test]
    fn test_snapshot_every_tenth_record() {
        let (collector, store, _clock) = collector_with(MemoryStore::new());
        for i in 0..9 {
            collector
                .record_request(metric_at(format!("/api/{i}"), Some(200), 1.0, TEST_NOW))
                .unwrap();
        }
        assert!(store.get(METRICS_STORAGE_KEY).unwrap().is_none());

        collector
            .record_request(metric_at("/api/9", Some(200), 1.0, TEST_NOW))
            .unwrap();
        let raw = store.get(METRICS_STORAGE_KEY).unwrap().unwrap();
        let snapshot: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(snapshot["metrics"].as_array().unwrap().len(), 10);
        assert_eq!(snapshot["timestamp"], TEST_NOW);
    }

    #[test]
    fn test_snapshot_keeps_newest_hundred() {
        let (collector, store, _clock) = collector_with(MemoryStore::new());
        for i in 0..150 {
            collector
                .record_request(metric_at(format!("/api/{i}"), Some(200), 1.0, TEST_NOW))
                .unwrap();
        }
        let raw = store.get(METRICS_STORAGE_KEY).unwrap().unwrap();
        let snapshot: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let metrics = snapshot["metrics"].as_array().unwrap();
        assert_eq!(metrics.len(), SNAPSHOT_SIZE);
        assert_eq!(metrics[0]["url"], "/api/50");
    }

    #[test]
    fn test_failed_snapshot_keeps_metric() {
        let (collector, _store, _clock) = collector_with(MemoryStore::with_quota(16));
        for i in 0..9 {
            collector
                .record_request(metric_at(format!("/api/{i}"), Some(200), 1.0, TEST_NOW))
                .unwrap();
        }
        let err = collector
            .record_request(metric_at("/api/9", Some(200), 1.0, TEST_NOW))
            .unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(collector.len(), 10);
    }

    #[test]
    fn test_restores_fresh_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(TEST_NOW));
        let page = crate::test_utils::test_page();
        {
            let collector = ApiMetricsCollector::new(store.clone(), clock.clone(), page.clone());
            collector
                .record_request(metric_at("/api/users", Some(200), 1.0, TEST_NOW))
                .unwrap();
            collector.save().unwrap();
        }

        clock.advance_ms(SNAPSHOT_MAX_AGE_MS - 1);
        let restored = ApiMetricsCollector::new(store.clone(), clock.clone(), page.clone());
        assert_eq!(restored.len(), 1);

        clock.advance_ms(1);
        let discarded = ApiMetricsCollector::new(store, clock, page);
        assert!(discarded.is_empty());
    }

    #[test]
    fn test_clear_persists_empty_state() {
        let (collector, store, _clock) = collector_with(MemoryStore::new());
        for i in 0..10 {
            collector
                .record_request(metric_at(format!("/api/{i}"), Some(200), 1.0, TEST_NOW))
                .unwrap();
        }
        collector.clear().unwrap();

        assert!(collector.is_empty());
        let raw = store.get(METRICS_STORAGE_KEY).unwrap().unwrap();
        let snapshot: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(snapshot["metrics"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_all_metrics_is_a_copy() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        collector
            .record_request(metric_at("/api/users", Some(200), 1.0, TEST_NOW))
            .unwrap();
        let mut copy = collector.all_metrics();
        copy.clear();
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_export_metrics_round_trip() {
        let (collector, _store, _clock) = collector_with(MemoryStore::new());
        collector
            .record_request(metric_at("/api/users", Some(200), 4.0, TEST_NOW))
            .unwrap();

        let exported = collector.export_metrics().unwrap();
        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(value["summary"]["totalRequests"], 1);
        assert!(value["timestamp"].as_str().unwrap().ends_with('Z'));
        assert_eq!(value["userAgent"], "test-agent");
        assert_eq!(value["url"], "https://admin.example.com/dashboard");

        let parsed: MetricsExport = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed.summary.total_requests, 1);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_timer_default() {
        let timer = Timer::default();
        assert!(timer.elapsed_ms() < 100.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_buffer_bounded_and_counts_consistent(
            outcomes in proptest::collection::vec(any::<bool>(), 0..1200)
        ) {
            let (collector, _store, _clock) = collector_with(MemoryStore::new());
            for (i, ok) in outcomes.iter().enumerate() {
                let status = if *ok { 200 } else { 503 };
                let _ = collector.record_request(metric_at(format!("/p/{i}"), Some(status), 1.0, TEST_NOW));
            }

            let summary = collector.summary(None);
            prop_assert_eq!(summary.total_requests as usize, outcomes.len().min(MAX_METRICS));
            prop_assert_eq!(summary.successful_requests + summary.failed_requests, summary.total_requests);
            prop_assert!(collector.len() <= MAX_METRICS);
        }
    }
}
