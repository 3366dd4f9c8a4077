//! Monitoring facade.
//!
//! [`Monitoring`] owns the three collectors and combines their output:
//!
//! - [`ApiMetricsCollector`]: outbound HTTP request outcomes
//! - [`ErrorLogger`]: captured runtime errors
//! - [`PerformanceMonitor`]: page performance signals
//!
//! [`Monitoring::initialize`] wires the process-wide parts (panic hook,
//! development reporter) and returns a [`MonitoringHandle`] that undoes them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use panel_monitoring::config::MonitoringConfig;
//! use panel_monitoring::monitoring::Monitoring;
//! use panel_monitoring::performance::EntryBus;
//! use panel_monitoring::storage::FileStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitoringConfig::from_env()?;
//! let store = Arc::new(FileStore::open(&config.storage_dir)?);
//! let monitoring = Monitoring::new(config, store, Arc::new(EntryBus::new()));
//! let handle = monitoring.initialize();
//!
//! let client = monitoring.client(reqwest::Client::new());
//! client.send(client.get("https://api.example.com/api/users")).await?;
//!
//! println!("{}", monitoring.export_data()?);
//! handle.stop();
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::MonitoringConfig;
use crate::error::MonitoringError;
use crate::error_log::{ErrorLog, ErrorLogger, ErrorSummary, GlobalErrorHooks};
use crate::metrics::{
    ApiMetricsCollector, ApiMetricsSummary, ApiRequestMetric, InstrumentedClient,
    MetricsInterceptor,
};
use crate::performance::{
    PerformanceMetrics, PerformanceMonitor, PerformanceRating, PerformanceReport,
    PerformanceSource,
};
use crate::storage::KeyValueStore;
use crate::traits::{RealTimeProvider, StaticPage, TimeProvider};

/// Window covered by [`Monitoring::report`] and the development summary.
pub const REPORT_WINDOW_MINUTES: u64 = 5;

/// Performance part of a [`MonitoringReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSection {
    /// Current metrics.
    pub metrics: PerformanceMetrics,
    /// Overall rating.
    pub score: PerformanceRating,
}

/// Combined report over the last few minutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringReport {
    /// API requests of the window.
    pub api_metrics: ApiMetricsSummary,
    /// Errors of the window.
    pub errors: ErrorSummary,
    /// Current performance.
    pub performance: PerformanceSection,
    /// Report time (epoch milliseconds).
    pub timestamp: i64,
}

/// Full dump produced by [`Monitoring::export_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringExport {
    /// Every buffered request.
    pub api_metrics: Vec<ApiRequestMetric>,
    /// Every buffered error.
    pub errors: Vec<ErrorLog>,
    /// Performance report.
    pub performance: PerformanceReport,
    /// Combined report.
    pub summary: MonitoringReport,
    /// Export time (RFC 3339).
    pub exported_at: String,
}

/// Owner of the monitoring collectors.
pub struct Monitoring {
    config: MonitoringConfig,
    api_metrics: Arc<ApiMetricsCollector>,
    errors: Arc<ErrorLogger>,
    performance: Arc<PerformanceMonitor>,
    clock: Arc<dyn TimeProvider>,
}

impl std::fmt::Debug for Monitoring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitoring")
            .field("config", &self.config)
            .field("api_metrics", &self.api_metrics)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

impl Monitoring {
    /// Build the collectors over `store` and `source`.
    ///
    /// Uses the system clock and the page URL and user agent from `config`.
    #[must_use]
    pub fn new(
        config: MonitoringConfig,
        store: Arc<dyn KeyValueStore>,
        source: Arc<dyn PerformanceSource>,
    ) -> Self {
        let clock: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);
        let page = Arc::new(StaticPage::new(&config.page_url, &config.user_agent));

        let api_metrics = Arc::new(ApiMetricsCollector::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            page.clone(),
        ));
        let errors = Arc::new(ErrorLogger::new(
            config.enabled,
            store,
            Arc::clone(&clock),
            page.clone(),
        ));
        let performance = Arc::new(PerformanceMonitor::new(
            config.enabled,
            source,
            Arc::clone(&clock),
            page,
        ));

        Self::from_parts(config, api_metrics, errors, performance, clock)
    }

    /// Assemble from existing collectors.
    #[must_use]
    pub const fn from_parts(
        config: MonitoringConfig,
        api_metrics: Arc<ApiMetricsCollector>,
        errors: Arc<ErrorLogger>,
        performance: Arc<PerformanceMonitor>,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            config,
            api_metrics,
            errors,
            performance,
            clock,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// API metrics collector.
    #[must_use]
    pub const fn api_metrics(&self) -> &Arc<ApiMetricsCollector> {
        &self.api_metrics
    }

    /// Error logger.
    #[must_use]
    pub const fn errors(&self) -> &Arc<ErrorLogger> {
        &self.errors
    }

    /// Performance monitor.
    #[must_use]
    pub const fn performance(&self) -> &Arc<PerformanceMonitor> {
        &self.performance
    }

    /// Install global handlers and, in development mode, start the
    /// periodic summary.
    ///
    /// The summary needs a tokio runtime; without one it is skipped with a
    /// warning. Everything is undone when the returned handle is stopped or
    /// dropped.
    pub fn initialize(&self) -> MonitoringHandle {
        tracing::info!(
            enabled = self.config.enabled,
            development = self.config.development,
            page_url = %self.config.page_url,
            "Monitoring initialized"
        );

        let hooks = self.errors.install_global_handlers();

        let reporter = if self.config.development {
            self.spawn_reporter()
        } else {
            None
        };

        MonitoringHandle {
            hooks,
            reporter,
            api_metrics: Arc::clone(&self.api_metrics),
            errors: Arc::clone(&self.errors),
            performance: Arc::clone(&self.performance),
            stopped: false,
        }
    }

    fn spawn_reporter(&self) -> Option<Reporter> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                tracing::warn!(error = %e, "No tokio runtime, periodic monitoring summary disabled");
                return None;
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let summaries = Arc::new(AtomicU64::new(0));
        let task = runtime.spawn(run_reporter(
            self.config.report_interval(),
            Arc::clone(&self.api_metrics),
            Arc::clone(&self.errors),
            Arc::clone(&self.performance),
            Arc::clone(&summaries),
            shutdown_rx,
        ));

        Some(Reporter {
            task,
            shutdown_tx,
            summaries,
        })
    }

    /// Combined report over the last [`REPORT_WINDOW_MINUTES`] minutes.
    #[must_use]
    pub fn report(&self) -> MonitoringReport {
        MonitoringReport {
            api_metrics: self.api_metrics.recent_metrics(REPORT_WINDOW_MINUTES),
            errors: self.errors.recent_errors(REPORT_WINDOW_MINUTES),
            performance: PerformanceSection {
                metrics: self.performance.metrics(),
                score: self.performance.performance_score(),
            },
            timestamp: self.clock.now_millis(),
        }
    }

    /// Everything collected, as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`MonitoringError::Serialization`] if JSON encoding fails.
    pub fn export_data(&self) -> Result<String, MonitoringError> {
        let export = MonitoringExport {
            api_metrics: self.api_metrics.all_metrics(),
            errors: self.errors.all_errors(),
            performance: self.performance.generate_report(),
            summary: self.report(),
            exported_at: self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Interceptor recording into the collector and reporting failed
    /// requests to the error logger.
    #[must_use]
    pub fn interceptor(&self) -> MetricsInterceptor {
        MetricsInterceptor::new(self.api_metrics.clone(), Arc::clone(&self.clock))
            .with_error_sink(self.errors.clone())
    }

    /// Wrap `client` with [`Monitoring::interceptor`].
    #[must_use]
    pub fn client(&self, client: reqwest::Client) -> InstrumentedClient {
        InstrumentedClient::new(client, self.interceptor())
    }

    /// Save both snapshots now.
    ///
    /// # Errors
    ///
    /// Returns the first storage failure as [`MonitoringError::Storage`];
    /// the error snapshot is still attempted when the metrics snapshot fails.
    pub fn persist(&self) -> Result<(), MonitoringError> {
        let metrics = self.api_metrics.save();
        let errors = self.errors.save();
        Ok(metrics.and(errors)?)
    }
}

struct Reporter {
    task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    summaries: Arc<AtomicU64>,
}

impl Reporter {
    /// Ask the task to exit; it finishes at its next poll.
    fn signal_shutdown(&self) {
        if self.shutdown_tx.send(true).is_err() {
            tracing::debug!("Monitoring reporter already stopped");
        }
    }
}

async fn run_reporter(
    period: Duration,
    api_metrics: Arc<ApiMetricsCollector>,
    errors: Arc<ErrorLogger>,
    performance: Arc<PerformanceMonitor>,
    summaries: Arc<AtomicU64>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));

    // Skip the first immediate tick
    interval.tick().await;

    tracing::debug!(interval = ?period, "Monitoring reporter started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if log_summary(&api_metrics, &errors, &performance) {
                    summaries.fetch_add(1, Ordering::Relaxed);
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    tracing::debug!("Monitoring reporter stopped");
                    break;
                }
            }
        }
    }
}

/// Log the recent activity; returns whether there was any.
fn log_summary(
    api_metrics: &ApiMetricsCollector,
    errors: &ErrorLogger,
    performance: &PerformanceMonitor,
) -> bool {
    let api = api_metrics.recent_metrics(REPORT_WINDOW_MINUTES);
    let errs = errors.recent_errors(REPORT_WINDOW_MINUTES);
    if api.total_requests == 0 && errs.total_errors == 0 {
        return false;
    }

    tracing::info!(
        api_requests = api.total_requests,
        api_failed = api.failed_requests,
        success_rate = api.success_rate(),
        average_ms = api.average_duration,
        errors = errs.total_errors,
        critical_errors = errs.critical_errors.len(),
        performance = %performance.performance_score(),
        "Monitoring summary"
    );
    true
}

/// Handle returned by [`Monitoring::initialize`].
///
/// Stopping it (or dropping it) stops the reporter, removes the global
/// hooks if this handle still owns them, runs the performance page teardown, disconnects the observers,
/// and saves both snapshots.
pub struct MonitoringHandle {
    hooks: Option<GlobalErrorHooks>,
    reporter: Option<Reporter>,
    api_metrics: Arc<ApiMetricsCollector>,
    errors: Arc<ErrorLogger>,
    performance: Arc<PerformanceMonitor>,
    stopped: bool,
}

impl std::fmt::Debug for MonitoringHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringHandle")
            .field("hooks_installed", &self.has_hooks())
            .field("reporting", &self.is_reporting())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl MonitoringHandle {
    /// Whether global error hooks are active.
    #[must_use]
    pub fn has_hooks(&self) -> bool {
        self.hooks.as_ref().is_some_and(GlobalErrorHooks::is_active)
    }

    /// Whether the periodic summary task is running.
    #[must_use]
    pub fn is_reporting(&self) -> bool {
        self.reporter
            .as_ref()
            .is_some_and(|reporter| !reporter.task.is_finished())
    }

    /// Number of periodic summaries logged so far.
    #[must_use]
    pub fn summaries_logged(&self) -> u64 {
        self.reporter
            .as_ref()
            .map_or(0, |reporter| reporter.summaries.load(Ordering::Relaxed))
    }

    /// Tear everything down.
    ///
    /// The reporter is signalled and exits on its own shortly after.
    pub fn stop(mut self) {
        self.shutdown();
    }

    /// Tear everything down after the reporter task has exited.
    pub async fn stop_and_wait(mut self) {
        if let Some(reporter) = self.reporter.take() {
            reporter.signal_shutdown();
            if let Err(e) = reporter.task.await {
                tracing::warn!(error = %e, "Monitoring reporter ended abnormally");
            }
        }
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Some(reporter) = self.reporter.take() {
            reporter.signal_shutdown();
        }
        drop(self.hooks.take());

        self.performance.page_teardown();
        self.performance.disconnect();

        if let Err(e) = self.api_metrics.save() {
            tracing::warn!(error = %e, "Failed to save API metrics on shutdown");
        }
        if let Err(e) = self.errors.save() {
            tracing::warn!(error = %e, "Failed to save error log on shutdown");
        }
        tracing::info!("Monitoring stopped");
    }
}

impl Drop for MonitoringHandle {
    fn drop(&mut self) {
        self.shutdown();
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
    use crate::error::StorageError;
    use crate::error_log::{hooks_installed, ErrorReport, ErrorSource};
    use crate::performance::{EntryBus, PerformanceEntry};
    use crate::storage::{MemoryStore, ERRORS_STORAGE_KEY, METRICS_STORAGE_KEY};
    use crate::test_utils::{metric_at, test_page, TEST_NOW};
    use crate::traits::ManualClock;
    use serial_test::serial;
    use static_assertions::assert_impl_all;

    assert_impl_all!(Monitoring: Send, Sync);
    assert_impl_all!(MonitoringHandle: Send);

    struct Fixture {
        monitoring: Monitoring,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        bus: Arc<EntryBus>,
    }

    fn fixture(config: MonitoringConfig) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(TEST_NOW));
        let bus = Arc::new(EntryBus::new());
        let page = test_page();

        let api_metrics = Arc::new(ApiMetricsCollector::new(
            store.clone(),
            clock.clone(),
            page.clone(),
        ));
        let errors = Arc::new(ErrorLogger::new(
            config.enabled,
            store.clone(),
            clock.clone(),
            page.clone(),
        ));
        let performance = Arc::new(PerformanceMonitor::new(
            config.enabled,
            bus.clone(),
            clock.clone(),
            page,
        ));
        let monitoring =
            Monitoring::from_parts(config, api_metrics, errors, performance, clock.clone());

        Fixture {
            monitoring,
            store,
            clock,
            bus,
        }
    }

    fn quiet_config() -> MonitoringConfig {
        MonitoringConfig {
            enabled: false,
            ..MonitoringConfig::default()
        }
    }

    #[test]
    fn test_report_covers_last_five_minutes() {
        let f = fixture(quiet_config());
        let m = &f.monitoring;
        m.api_metrics()
            .record_request(metric_at("/api/users", Some(200), 40.0, TEST_NOW - 10 * 60_000))
            .unwrap();
        m.api_metrics()
            .record_request(metric_at("/api/users", Some(500), 60.0, TEST_NOW - 60_000))
            .unwrap();
        m.errors()
            .log_error(ErrorReport::new("x is undefined", ErrorSource::Javascript))
            .unwrap();
        f.bus.emit(&PerformanceEntry::LargestContentfulPaint { start_time: 1000.0 });

        let report = m.report();
        assert_eq!(report.api_metrics.total_requests, 1);
        assert_eq!(report.api_metrics.failed_requests, 1);
        assert_eq!(report.errors.total_errors, 1);
        // Disabled monitors observe nothing.
        assert!(report.performance.metrics.lcp.is_none());
        assert_eq!(report.performance.score, PerformanceRating::Good);
        assert_eq!(report.timestamp, TEST_NOW);
    }

    #[test]
    fn test_report_wire_format() {
        let f = fixture(quiet_config());
        let json = serde_json::to_value(f.monitoring.report()).unwrap();
        assert!(json["apiMetrics"]["totalRequests"].is_u64());
        assert!(json["errors"]["totalErrors"].is_u64());
        assert_eq!(json["performance"]["score"], "good");
        assert_eq!(json["timestamp"], TEST_NOW);
    }

    #[test]
    fn test_export_data_contains_everything() {
        let f = fixture(quiet_config());
        let m = &f.monitoring;
        m.api_metrics()
            .record_request(metric_at("/api/partners", Some(201), 12.0, TEST_NOW - 20 * 60_000))
            .unwrap();
        m.errors()
            .log_error(ErrorReport::new("render failed", ErrorSource::React))
            .unwrap();
        f.clock.advance_ms(1_000);

        let exported = m.export_data().unwrap();
        let parsed: MonitoringExport = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed.api_metrics.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.summary.api_metrics.total_requests, 0);
        assert_eq!(parsed.summary.errors.critical_errors.len(), 1);
        assert_eq!(parsed.performance.url, "https://admin.example.com/dashboard");
        assert_eq!(parsed.exported_at, "2026-01-15T10:00:01.000Z");

        let raw: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert!(raw.get("exportedAt").is_some());
        assert!(raw.get("summary").is_some());
    }

    #[test]
    fn test_persist_saves_both_snapshots() {
        let f = fixture(quiet_config());
        f.monitoring
            .api_metrics()
            .record_request(metric_at("/api/users", Some(200), 5.0, TEST_NOW))
            .unwrap();
        f.monitoring.persist().unwrap();

        assert!(f.store.get(METRICS_STORAGE_KEY).unwrap().is_some());
        assert!(f.store.get(ERRORS_STORAGE_KEY).unwrap().is_some());
    }

    #[test]
    fn test_interceptor_forwards_failures_to_error_log() {
        let f = fixture(quiet_config());
        let interceptor = f.monitoring.interceptor();

        let ctx = interceptor.request("GET", "/api/transactions");
        interceptor.response(ctx, 503);

        let metrics = f.monitoring.api_metrics().all_metrics();
        assert_eq!(metrics.len(), 1);
        assert!(!metrics[0].success);

        let errors = f.monitoring.errors().all_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "API Error: 503 /api/transactions");
        assert_eq!(errors[0].source, ErrorSource::Api);
    }

    #[test]
    fn test_log_summary_only_with_activity() {
        let f = fixture(quiet_config());
        let m = &f.monitoring;
        assert!(!log_summary(m.api_metrics(), m.errors(), m.performance()));

        m.errors()
            .log_error(ErrorReport::new("Request timeout", ErrorSource::Promise))
            .unwrap();
        assert!(log_summary(m.api_metrics(), m.errors(), m.performance()));

        f.clock.advance_ms(6 * 60_000);
        assert!(!log_summary(m.api_metrics(), m.errors(), m.performance()));
    }

    #[test]
    fn test_initialize_without_runtime_skips_reporter() {
        let f = fixture(MonitoringConfig {
            development: true,
            ..quiet_config()
        });
        let handle = f.monitoring.initialize();
        assert!(!handle.is_reporting());
        assert!(!handle.has_hooks());
        handle.stop();
    }

    fn reporting_fixture() -> Fixture {
        let f = fixture(MonitoringConfig {
            development: true,
            report_interval_ms: 1_000,
            ..quiet_config()
        });
        f.monitoring
            .api_metrics()
            .record_request(metric_at("/api/users", Some(200), 5.0, TEST_NOW))
            .unwrap();
        f
    }

    #[tokio::test(start_paused = true)]
    async fn test_development_reporter_logs_each_interval() {
        let f = reporting_fixture();
        let handle = f.monitoring.initialize();

        // The immediate first tick is skipped.
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(handle.is_reporting());
        assert_eq!(handle.summaries_logged(), 0);

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(handle.summaries_logged(), 1);

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert_eq!(handle.summaries_logged(), 3);

        handle.stop_and_wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_skips_quiet_intervals() {
        let f = fixture(MonitoringConfig {
            development: true,
            report_interval_ms: 1_000,
            ..quiet_config()
        });
        let handle = f.monitoring.initialize();

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert!(handle.is_reporting());
        assert_eq!(handle.summaries_logged(), 0);
        handle.stop_and_wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_reporter_task() {
        let f = reporting_fixture();
        let handle = f.monitoring.initialize();
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(handle.summaries_logged(), 1);
        // Facade, handle and reporter task each hold the collector.
        assert_eq!(Arc::strong_count(f.monitoring.api_metrics()), 3);

        handle.stop();
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(Arc::strong_count(f.monitoring.api_metrics()), 1);
    }

    #[tokio::test]
    async fn test_reporter_not_started_outside_development() {
        let f = fixture(quiet_config());
        let handle = f.monitoring.initialize();
        assert!(!handle.is_reporting());
    }

    #[test]
    #[serial]
    fn test_enabled_initialize_installs_and_removes_hooks() {
        let f = fixture(MonitoringConfig::default());
        let handle = f.monitoring.initialize();
        assert!(handle.has_hooks());
        assert!(hooks_installed());
        assert_eq!(f.bus.observer_count(), 5);

        let reports = Arc::new(std::sync::Mutex::new(0));
        let seen = Arc::clone(&reports);
        f.monitoring.performance().on_report(move |_| {
            *seen.lock().unwrap() += 1;
        });

        handle.stop();
        assert!(!hooks_installed());
        assert_eq!(f.bus.observer_count(), 0);
        assert_eq!(*reports.lock().unwrap(), 1);
        assert!(f.store.get(METRICS_STORAGE_KEY).unwrap().is_some());
        assert!(f.store.get(ERRORS_STORAGE_KEY).unwrap().is_some());
    }

    #[test]
    #[serial]
    fn test_initialize_twice_records_panic_once() {
        let f = fixture(MonitoringConfig::default());
        let first = f.monitoring.initialize();
        let second = f.monitoring.initialize();
        assert!(!first.has_hooks());
        assert!(second.has_hooks());

        let _ = std::panic::catch_unwind(|| panic!("facade-reinit-boom"));
        let recorded = f
            .monitoring
            .errors()
            .all_errors()
            .iter()
            .filter(|e| e.message == "facade-reinit-boom")
            .count();
        assert_eq!(recorded, 1);

        drop(first);
        drop(second);
        assert!(!hooks_installed());
    }

    #[test]
    #[serial]
    fn test_handles_dropped_in_creation_order_leave_no_hook() {
        let f = fixture(MonitoringConfig::default());
        let first = f.monitoring.initialize();
        let second = f.monitoring.initialize();
        drop(first);
        assert!(hooks_installed());
        drop(second);
        assert!(!hooks_installed());

        let _ = std::panic::catch_unwind(|| panic!("facade-after-drop"));
        assert!(f
            .monitoring
            .errors()
            .all_errors()
            .iter()
            .all(|e| e.message != "facade-after-drop"));
    }

    #[test]
    #[serial]
    fn test_repeated_initialize_does_not_stack_hooks() {
        let f = fixture(MonitoringConfig::default());
        for _ in 0..3 {
            let handle = f.monitoring.initialize();
            assert!(hooks_installed());
            drop(handle);
        }
        assert!(!hooks_installed());
    }

    #[test]
    fn test_stop_tolerates_storage_failures() {
        let store = Arc::new(MemoryStore::with_quota(8));
        let clock = Arc::new(ManualClock::new(TEST_NOW));
        let page = test_page();
        let api_metrics = Arc::new(ApiMetricsCollector::new(
            store.clone(),
            clock.clone(),
            page.clone(),
        ));
        let errors = Arc::new(ErrorLogger::new(false, store.clone(), clock.clone(), page.clone()));
        let performance = Arc::new(PerformanceMonitor::new(
            false,
            Arc::new(EntryBus::new()),
            clock.clone(),
            page,
        ));
        let monitoring =
            Monitoring::from_parts(quiet_config(), api_metrics, errors, performance, clock);

        assert!(matches!(
            monitoring.persist(),
            Err(MonitoringError::Storage(StorageError::QuotaExceeded { .. }))
        ));
        monitoring.initialize().stop();
        assert!(store.is_empty());
    }

    #[test]
    fn test_new_uses_config_page() {
        let config = MonitoringConfig {
            enabled: false,
            page_url: "https://partner.example.com/rewards".to_string(),
            user_agent: "kiosk/2.1".to_string(),
            ..MonitoringConfig::default()
        };
        let monitoring = Monitoring::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(EntryBus::new()),
        );
        monitoring
            .errors()
            .log_error(ErrorReport::new("boom", ErrorSource::Javascript))
            .unwrap();

        let error = &monitoring.errors().all_errors()[0];
        assert_eq!(error.url, "https://partner.example.com/rewards");
        assert_eq!(error.user_agent, "kiosk/2.1");
        assert!(!monitoring.performance().is_enabled());
    }
}
