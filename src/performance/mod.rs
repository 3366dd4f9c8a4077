//! Page performance sampling.
//!
//! [`PerformanceMonitor`] subscribes to a [`PerformanceSource`] and keeps one
//! [`PerformanceMetrics`] snapshot of the core web vitals, plus render time
//! and API call count supplied by the host.

mod observer;

pub use observer::{
    EntryBus, EntryCallback, EntryType, NavigationTiming, ObserverId, PerformanceEntry,
    PerformanceSource,
};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::metrics::Timer;
use crate::traits::{PageContext, TimeProvider};

/// Name of the paint entry that defines FCP.
pub const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// Good/poor thresholds for first contentful paint (ms).
pub const FCP_THRESHOLDS: (f64, f64) = (1800.0, 3000.0);
/// Good/poor thresholds for largest contentful paint (ms).
pub const LCP_THRESHOLDS: (f64, f64) = (2500.0, 4000.0);
/// Good/poor thresholds for first input delay (ms).
pub const FID_THRESHOLDS: (f64, f64) = (100.0, 300.0);
/// Good/poor thresholds for cumulative layout shift.
pub const CLS_THRESHOLDS: (f64, f64) = (0.1, 0.25);

/// Sampled performance values. Unset values are omitted when serialized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// First contentful paint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcp: Option<f64>,
    /// Largest contentful paint, latest candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lcp: Option<f64>,
    /// First input delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<f64>,
    /// Cumulative layout shift.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cls: Option<f64>,
    /// Time to first byte.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttfb: Option<f64>,
    /// Navigation start to end of the load event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_load_time: Option<f64>,
    /// API calls made so far, as reported by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_call_count: Option<u64>,
    /// Slowest measured render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_time: Option<f64>,
    /// When the monitor was created (epoch milliseconds).
    pub timestamp: i64,
}

impl PerformanceMetrics {
    fn apply(&mut self, entry: &PerformanceEntry) {
        match entry {
            PerformanceEntry::Paint { name, start_time } => {
                if name == FIRST_CONTENTFUL_PAINT {
                    self.fcp.get_or_insert(*start_time);
                }
            }
            PerformanceEntry::LargestContentfulPaint { start_time } => {
                self.lcp = Some(*start_time);
            }
            PerformanceEntry::FirstInput {
                start_time,
                processing_start,
            } => {
                self.fid.get_or_insert(processing_start - start_time);
            }
            PerformanceEntry::LayoutShift {
                value,
                had_recent_input,
            } => {
                if !had_recent_input {
                    *self.cls.get_or_insert(0.0) += value;
                }
            }
            PerformanceEntry::Navigation(timing) => self.apply_navigation(timing),
        }
    }

    fn apply_navigation(&mut self, timing: &NavigationTiming) {
        self.ttfb.get_or_insert_with(|| timing.ttfb());
        if let Some(load) = timing.page_load_time() {
            self.page_load_time.get_or_insert(load);
        }
    }
}

/// Overall rating derived from the web vitals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceRating {
    /// Average of at least 2.5 points.
    Good,
    /// Average of at least 1.5 points.
    NeedsImprovement,
    /// Anything lower.
    Poor,
}

impl PerformanceRating {
    /// Wire name of the rating.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::NeedsImprovement => "needs-improvement",
            Self::Poor => "poor",
        }
    }
}

impl std::fmt::Display for PerformanceRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate sampled metrics.
///
/// Each available vital scores 3 (good), 2 (needs improvement) or 1 (poor)
/// against its thresholds, which are exclusive: a value on a threshold
/// falls in the worse band. The average picks the rating. No data rates
/// good.
#[must_use]
pub fn rate(metrics: &PerformanceMetrics) -> PerformanceRating {
    let points: Vec<u32> = [
        (metrics.fcp, FCP_THRESHOLDS),
        (metrics.lcp, LCP_THRESHOLDS),
        (metrics.fid, FID_THRESHOLDS),
        (metrics.cls, CLS_THRESHOLDS),
    ]
    .into_iter()
    .filter_map(|(value, (good, poor))| {
        value.map(|v| {
            if v < good {
                3
            } else if v < poor {
                2
            } else {
                1
            }
        })
    })
    .collect();

    if points.is_empty() {
        return PerformanceRating::Good;
    }

    let average = f64::from(points.iter().sum::<u32>()) / points.len() as f64;
    if average >= 2.5 {
        PerformanceRating::Good
    } else if average >= 1.5 {
        PerformanceRating::NeedsImprovement
    } else {
        PerformanceRating::Poor
    }
}

/// Report produced by [`PerformanceMonitor::generate_report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    /// Current metrics.
    pub metrics: PerformanceMetrics,
    /// Host page URL.
    pub url: String,
    /// Host user agent.
    pub user_agent: String,
    /// Report time (epoch milliseconds).
    pub timestamp: i64,
}

type ReportCallback = Arc<dyn Fn(&PerformanceReport) + Send + Sync>;

/// Samples page performance from a [`PerformanceSource`].
///
/// A disabled monitor registers no observers and measures nothing, but
/// still answers queries.
pub struct PerformanceMonitor {
    enabled: bool,
    metrics: Arc<RwLock<PerformanceMetrics>>,
    observers: Mutex<Vec<ObserverId>>,
    report_callback: Mutex<Option<ReportCallback>>,
    source: Arc<dyn PerformanceSource>,
    clock: Arc<dyn TimeProvider>,
    page: Arc<dyn PageContext>,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("enabled", &self.enabled)
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

fn read_metrics(metrics: &RwLock<PerformanceMetrics>) -> RwLockReadGuard<'_, PerformanceMetrics> {
    metrics.read().unwrap_or_else(|poison_error| {
        tracing::warn!(
            error = %poison_error,
            "Reading performance metrics from poisoned lock, using recovered data"
        );
        poison_error.into_inner()
    })
}

fn write_metrics(
    metrics: &RwLock<PerformanceMetrics>,
) -> RwLockWriteGuard<'_, PerformanceMetrics> {
    metrics.write().unwrap_or_else(|poison_error| {
        tracing::warn!(
            error = %poison_error,
            "Writing performance metrics through poisoned lock, using recovered data"
        );
        poison_error.into_inner()
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PerformanceMonitor {
    /// Create a monitor and, when enabled, start observing `source`.
    #[must_use]
    pub fn new(
        enabled: bool,
        source: Arc<dyn PerformanceSource>,
        clock: Arc<dyn TimeProvider>,
        page: Arc<dyn PageContext>,
    ) -> Self {
        let monitor = Self {
            enabled,
            metrics: Arc::new(RwLock::new(PerformanceMetrics {
                timestamp: clock.now_millis(),
                ..PerformanceMetrics::default()
            })),
            observers: Mutex::new(Vec::new()),
            report_callback: Mutex::new(None),
            source,
            clock,
            page,
        };

        if enabled {
            monitor.start_observing();
        }
        monitor
    }

    fn start_observing(&self) {
        for entry_type in [
            EntryType::Paint,
            EntryType::LargestContentfulPaint,
            EntryType::FirstInput,
            EntryType::LayoutShift,
        ] {
            self.observe(entry_type);
        }

        let timing = self.source.navigation_timing();
        if let Some(timing) = &timing {
            write_metrics(&self.metrics).apply_navigation(timing);
        }
        if !timing.is_some_and(|t| t.is_loaded()) {
            self.observe(EntryType::Navigation);
        }
    }

    fn observe(&self, entry_type: EntryType) {
        let metrics = Arc::clone(&self.metrics);
        let callback: EntryCallback = Arc::new(move |entry: &PerformanceEntry| {
            write_metrics(&metrics).apply(entry);
        });

        match self.source.observe(entry_type, callback) {
            Ok(id) => lock(&self.observers).push(id),
            Err(e) => {
                tracing::warn!(entry_type = %entry_type, error = %e, "Performance observer not registered");
            }
        }
    }

    /// Whether the monitor is sampling.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Run `f`, keeping the slowest duration as the render time.
    ///
    /// `f` runs unchanged when the monitor is disabled.
    pub fn measure_render_time<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
        if !self.enabled {
            return f();
        }

        let timer = Timer::start();
        let result = f();
        let elapsed = timer.elapsed_ms();

        let mut metrics = write_metrics(&self.metrics);
        if metrics.render_time.is_none_or(|slowest| elapsed > slowest) {
            metrics.render_time = Some(elapsed);
        }
        drop(metrics);

        tracing::trace!(component = name, render_ms = elapsed, "Render measured");
        result
    }

    /// Set the number of API calls made so far.
    pub fn update_api_call_count(&self, count: u64) {
        write_metrics(&self.metrics).api_call_count = Some(count);
    }

    /// Copy of the current metrics.
    #[must_use]
    pub fn metrics(&self) -> PerformanceMetrics {
        read_metrics(&self.metrics).clone()
    }

    /// Current metrics with host details.
    #[must_use]
    pub fn generate_report(&self) -> PerformanceReport {
        PerformanceReport {
            metrics: self.metrics(),
            url: self.page.url(),
            user_agent: self.page.user_agent(),
            timestamp: self.clock.now_millis(),
        }
    }

    /// Set the callback that receives the final report on teardown.
    pub fn on_report<F>(&self, callback: F)
    where
        F: Fn(&PerformanceReport) + Send + Sync + 'static,
    {
        *lock(&self.report_callback) = Some(Arc::new(callback));
    }

    /// Page is going away: hand the final report to the callback.
    ///
    /// Returns the JSON payload of the report, which is logged at debug
    /// level but not transmitted. Does nothing when disabled.
    pub fn page_teardown(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let report = self.generate_report();
        let callback = lock(&self.report_callback).clone();
        if let Some(callback) = callback {
            callback(&report);
        }

        match serde_json::to_string(&report) {
            Ok(payload) => {
                tracing::debug!(payload = %payload, "Final performance report");
                Some(payload)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode final performance report");
                None
            }
        }
    }

    /// Rate the current metrics.
    #[must_use]
    pub fn performance_score(&self) -> PerformanceRating {
        rate(&read_metrics(&self.metrics))
    }

    /// Stop observing. Safe to call more than once.
    pub fn disconnect(&self) {
        let observers = std::mem::take(&mut *lock(&self.observers));
        for id in observers {
            self.source.disconnect(id);
        }
    }

    /// Number of active observer registrations.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        lock(&self.observers).len()
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::unreadable_literal
)]
mod tests {
    use super::*;
    use super::observer::MockPerformanceSource;
    use crate::error::ObserveError;
    use crate::test_utils::{monitor_with, test_page, TEST_NOW};
    use crate::traits::ManualClock;
    use static_assertions::assert_impl_all;

    assert_impl_all!(PerformanceMonitor: Send, Sync);
    assert_impl_all!(EntryBus: Send, Sync);

    fn paint(name: &str, at: f64) -> PerformanceEntry {
        PerformanceEntry::Paint {
            name: name.to_string(),
            start_time: at,
        }
    }

    fn shift(value: f64, had_recent_input: bool) -> PerformanceEntry {
        PerformanceEntry::LayoutShift {
            value,
            had_recent_input,
        }
    }

    #[test]
    fn test_enabled_monitor_observes_vitals() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        // Four vitals plus navigation, since no load has been seen yet.
        assert_eq!(monitor.observer_count(), 5);
        assert_eq!(bus.observer_count(), 5);
        assert_eq!(monitor.metrics().timestamp, TEST_NOW);
    }

    #[test]
    fn test_disabled_monitor_observes_nothing() {
        let (monitor, bus) = monitor_with(false, EntryBus::new());
        assert_eq!(bus.observer_count(), 0);
        bus.emit(&paint(FIRST_CONTENTFUL_PAINT, 500.0));
        assert!(monitor.metrics().fcp.is_none());
        assert_eq!(monitor.measure_render_time("Table", || 7), 7);
        assert!(monitor.metrics().render_time.is_none());
        assert!(monitor.page_teardown().is_none());
    }

    #[test]
    fn test_only_first_contentful_paint_sets_fcp() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        bus.emit(&paint("first-paint", 300.0));
        assert!(monitor.metrics().fcp.is_none());

        bus.emit(&paint(FIRST_CONTENTFUL_PAINT, 640.0));
        bus.emit(&paint(FIRST_CONTENTFUL_PAINT, 900.0));
        assert_eq!(monitor.metrics().fcp, Some(640.0));
    }

    #[test]
    fn test_lcp_takes_latest_candidate() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        bus.emit(&PerformanceEntry::LargestContentfulPaint { start_time: 1200.0 });
        bus.emit(&PerformanceEntry::LargestContentfulPaint { start_time: 2100.0 });
        assert_eq!(monitor.metrics().lcp, Some(2100.0));
    }

    #[test]
    fn test_fid_is_processing_delay_of_first_input() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        bus.emit(&PerformanceEntry::FirstInput {
            start_time: 1000.0,
            processing_start: 1042.5,
        });
        bus.emit(&PerformanceEntry::FirstInput {
            start_time: 2000.0,
            processing_start: 2500.0,
        });
        assert_eq!(monitor.metrics().fid, Some(42.5));
    }

    #[test]
    fn test_cls_ignores_shifts_after_input() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        bus.emit(&shift(0.05, false));
        bus.emit(&shift(0.5, true));
        bus.emit(&shift(0.03, false));
        let cls = monitor.metrics().cls.unwrap();
        assert!((cls - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_navigation_already_loaded() {
        let bus = EntryBus::new();
        bus.set_navigation_timing(NavigationTiming {
            start_time: 0.0,
            request_start: 30.0,
            response_start: 110.0,
            load_event_end: 1400.0,
        });
        let (monitor, bus) = monitor_with(true, bus);

        let metrics = monitor.metrics();
        assert_eq!(metrics.ttfb, Some(80.0));
        assert_eq!(metrics.page_load_time, Some(1400.0));
        // No navigation observer is needed once loaded.
        assert_eq!(bus.observer_count(), 4);
    }

    #[test]
    fn test_navigation_load_arrives_later() {
        let bus = EntryBus::new();
        let loading = NavigationTiming {
            start_time: 0.0,
            request_start: 30.0,
            response_start: 110.0,
            load_event_end: 0.0,
        };
        bus.set_navigation_timing(loading);
        let (monitor, bus) = monitor_with(true, bus);
        assert_eq!(monitor.metrics().ttfb, Some(80.0));
        assert!(monitor.metrics().page_load_time.is_none());

        bus.emit(&PerformanceEntry::Navigation(loading));
        assert!(monitor.metrics().page_load_time.is_none());

        bus.emit(&PerformanceEntry::Navigation(NavigationTiming {
            load_event_end: 2200.0,
            ..loading
        }));
        assert_eq!(monitor.metrics().page_load_time, Some(2200.0));
    }

    #[test]
    fn test_unsupported_observers_leave_metric_unset() {
        let bus = EntryBus::with_supported([EntryType::Paint, EntryType::Navigation]);
        let (monitor, bus) = monitor_with(true, bus);
        assert_eq!(monitor.observer_count(), 2);

        bus.emit(&shift(0.2, false));
        bus.emit(&paint(FIRST_CONTENTFUL_PAINT, 700.0));
        let metrics = monitor.metrics();
        assert!(metrics.cls.is_none());
        assert_eq!(metrics.fcp, Some(700.0));
    }

    #[test]
    fn test_registration_failures_with_mock_source() {
        let mut source = MockPerformanceSource::new();
        source.expect_observe().returning(|entry_type, _| {
            Err(ObserveError::Registration {
                entry_type: entry_type.to_string(),
                message: "observer quota reached".to_string(),
            })
        });
        source.expect_navigation_timing().return_const(None);
        source.expect_disconnect().times(0);

        let monitor = PerformanceMonitor::new(
            true,
            Arc::new(source),
            Arc::new(ManualClock::new(TEST_NOW)),
            test_page(),
        );
        assert_eq!(monitor.observer_count(), 0);
        assert_eq!(monitor.performance_score(), PerformanceRating::Good);
    }

    #[test]
    fn test_measure_render_time_keeps_maximum() {
        let (monitor, _bus) = monitor_with(true, EntryBus::new());
        let value = monitor.measure_render_time("Slow", || {
            std::thread::sleep(std::time::Duration::from_millis(15));
            "done"
        });
        assert_eq!(value, "done");
        let slowest = monitor.metrics().render_time.unwrap();
        assert!(slowest >= 15.0);

        monitor.measure_render_time("Fast", || ());
        assert_eq!(monitor.metrics().render_time, Some(slowest));
    }

    #[test]
    fn test_update_api_call_count() {
        let (monitor, _bus) = monitor_with(true, EntryBus::new());
        monitor.update_api_call_count(12);
        assert_eq!(monitor.metrics().api_call_count, Some(12));
    }

    #[test]
    fn test_generate_report_and_serialization() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        bus.emit(&paint(FIRST_CONTENTFUL_PAINT, 640.0));

        let report = monitor.generate_report();
        assert_eq!(report.url, "https://admin.example.com/dashboard");
        assert_eq!(report.user_agent, "test-agent");
        assert_eq!(report.timestamp, TEST_NOW);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["metrics"]["fcp"], 640.0);
        assert!(json["metrics"].get("lcp").is_none());
        assert_eq!(json["userAgent"], "test-agent");
    }

    #[test]
    fn test_page_teardown_calls_report_callback() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        bus.emit(&PerformanceEntry::LargestContentfulPaint { start_time: 1800.0 });

        let received = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&received);
        monitor.on_report(move |report| {
            *sink.lock().unwrap() = Some(report.clone());
        });

        let payload = monitor.page_teardown().unwrap();
        let report = received.lock().unwrap().clone().unwrap();
        assert_eq!(report.metrics.lcp, Some(1800.0));

        let decoded: PerformanceReport = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        monitor.disconnect();
        monitor.disconnect();
        assert_eq!(bus.observer_count(), 0);
        assert_eq!(monitor.observer_count(), 0);

        bus.emit(&paint(FIRST_CONTENTFUL_PAINT, 500.0));
        assert!(monitor.metrics().fcp.is_none());
    }

    #[test]
    fn test_drop_disconnects() {
        let (monitor, bus) = monitor_with(true, EntryBus::new());
        drop(monitor);
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn test_rate_without_data_is_good() {
        assert_eq!(rate(&PerformanceMetrics::default()), PerformanceRating::Good);
    }

    #[test]
    fn test_rate_thresholds() {
        let good = PerformanceMetrics {
            fcp: Some(1799.0),
            lcp: Some(2499.0),
            fid: Some(99.0),
            cls: Some(0.09),
            ..PerformanceMetrics::default()
        };
        assert_eq!(rate(&good), PerformanceRating::Good);

        let middling = PerformanceMetrics {
            fcp: Some(2000.0),
            lcp: Some(3000.0),
            fid: Some(200.0),
            cls: Some(0.2),
            ..PerformanceMetrics::default()
        };
        assert_eq!(rate(&middling), PerformanceRating::NeedsImprovement);

        let poor = PerformanceMetrics {
            fcp: Some(5000.0),
            lcp: Some(6000.0),
            fid: Some(500.0),
            cls: Some(0.4),
            ..PerformanceMetrics::default()
        };
        assert_eq!(rate(&poor), PerformanceRating::Poor);
    }

    #[test]
    fn test_rate_value_on_threshold_takes_lower_band() {
        let rated = |metrics: PerformanceMetrics| rate(&metrics);
        assert_eq!(
            rated(PerformanceMetrics {
                fcp: Some(1800.0),
                ..PerformanceMetrics::default()
            }),
            PerformanceRating::NeedsImprovement
        );
        assert_eq!(
            rated(PerformanceMetrics {
                lcp: Some(2500.0),
                ..PerformanceMetrics::default()
            }),
            PerformanceRating::NeedsImprovement
        );
        assert_eq!(
            rated(PerformanceMetrics {
                fid: Some(100.0),
                ..PerformanceMetrics::default()
            }),
            PerformanceRating::NeedsImprovement
        );
        assert_eq!(
            rated(PerformanceMetrics {
                cls: Some(0.1),
                ..PerformanceMetrics::default()
            }),
            PerformanceRating::NeedsImprovement
        );

        let on_poor_edge = PerformanceMetrics {
            fcp: Some(3000.0),
            lcp: Some(4000.0),
            fid: Some(300.0),
            cls: Some(0.25),
            ..PerformanceMetrics::default()
        };
        assert_eq!(rate(&on_poor_edge), PerformanceRating::Poor);
    }

    #[test]
    fn test_rate_averages_available_vitals() {
        // 3 + 1 = 4 over two vitals: 2.0
        let mixed = PerformanceMetrics {
            fcp: Some(900.0),
            cls: Some(0.5),
            ..PerformanceMetrics::default()
        };
        assert_eq!(rate(&mixed), PerformanceRating::NeedsImprovement);

        // 3 + 3 + 2 = 8 over three: 2.67
        let mostly_good = PerformanceMetrics {
            fcp: Some(900.0),
            lcp: Some(1000.0),
            fid: Some(250.0),
            ..PerformanceMetrics::default()
        };
        assert_eq!(rate(&mostly_good), PerformanceRating::Good);
    }

    #[test]
    fn test_rating_names() {
        assert_eq!(PerformanceRating::NeedsImprovement.to_string(), "needs-improvement");
        assert_eq!(
            serde_json::to_string(&PerformanceRating::Poor).unwrap(),
            "\"poor\""
        );
    }
}
