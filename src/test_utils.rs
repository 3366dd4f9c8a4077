//! Test utilities and fixtures.
//!
//! This module provides shared testing infrastructure:
//! - A fixed test time and page context
//! - Collector, logger and monitor factories over a [`MemoryStore`]
//! - Metric builders
//!
//! Only compiled for tests (`#[cfg(test)]`).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use crate::error_log::ErrorLogger;
use crate::metrics::{ApiMetricsCollector, ApiRequestMetric};
use crate::performance::{EntryBus, PerformanceMonitor};
use crate::storage::MemoryStore;
use crate::traits::{ManualClock, StaticPage};

/// Fixed "now" used by tests: 2026-01-15T10:00:00Z.
pub const TEST_NOW: i64 = 1_768_471_200_000;

/// Page context used by every fixture.
#[must_use]
pub fn test_page() -> Arc<StaticPage> {
    Arc::new(StaticPage::new(
        "https://admin.example.com/dashboard",
        "test-agent",
    ))
}

/// Build a metric with `success` derived from the status.
#[must_use]
pub fn metric_at(
    url: impl Into<String>,
    status: Option<u16>,
    duration: f64,
    timestamp: i64,
) -> ApiRequestMetric {
    ApiRequestMetric::new(url, "GET", status, duration, timestamp)
}

/// Create a metrics collector over `store` with a clock at [`TEST_NOW`].
#[must_use]
pub fn collector_with(
    store: MemoryStore,
) -> (ApiMetricsCollector, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::new(TEST_NOW));
    let collector = ApiMetricsCollector::new(store.clone(), clock.clone(), test_page());
    (collector, store, clock)
}

/// Create an enabled error logger over `store` with a clock at [`TEST_NOW`].
#[must_use]
pub fn logger_with(store: MemoryStore) -> (ErrorLogger, Arc<MemoryStore>, Arc<ManualClock>) {
    let store = Arc::new(store);
    let clock = Arc::new(ManualClock::new(TEST_NOW));
    let logger = ErrorLogger::new(true, store.clone(), clock.clone(), test_page());
    (logger, store, clock)
}

/// Create a performance monitor observing a fresh [`EntryBus`].
#[must_use]
pub fn monitor_with(enabled: bool, bus: EntryBus) -> (PerformanceMonitor, Arc<EntryBus>) {
    let bus = Arc::new(bus);
    let clock = Arc::new(ManualClock::new(TEST_NOW));
    let monitor = PerformanceMonitor::new(enabled, bus.clone(), clock, test_page());
    (monitor, bus)
}
