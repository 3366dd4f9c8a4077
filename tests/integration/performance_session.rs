//! Performance workflow: a page loads, paints, shifts and unloads.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use std::sync::{Arc, Mutex};

use panel_monitoring::error_log::ErrorLogger;
use panel_monitoring::config::MonitoringConfig;
use panel_monitoring::metrics::ApiMetricsCollector;
use panel_monitoring::monitoring::Monitoring;
use panel_monitoring::performance::{
    EntryBus, EntryType, NavigationTiming, PerformanceEntry, PerformanceMonitor,
    PerformanceRating, PerformanceReport,
};
use panel_monitoring::storage::MemoryStore;
use panel_monitoring::traits::{ManualClock, StaticPage};

const NOW: i64 = 1_768_471_200_000;

fn session(bus: Arc<EntryBus>) -> Monitoring {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(NOW));
    let page = Arc::new(StaticPage::new("https://admin.example.com/home", "session-agent"));
    Monitoring::from_parts(
        MonitoringConfig::default(),
        Arc::new(ApiMetricsCollector::new(store.clone(), clock.clone(), page.clone())),
        Arc::new(ErrorLogger::new(false, store, clock.clone(), page.clone())),
        Arc::new(PerformanceMonitor::new(true, bus, clock.clone(), page)),
        clock,
    )
}

#[test]
fn test_page_session_from_load_to_teardown() {
    let bus = Arc::new(EntryBus::new());
    bus.set_navigation_timing(NavigationTiming {
        start_time: 0.0,
        request_start: 40.0,
        response_start: 190.0,
        load_event_end: 0.0,
    });
    let monitoring = session(bus.clone());
    let performance = monitoring.performance();

    let final_report: Arc<Mutex<Option<PerformanceReport>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&final_report);
    performance.on_report(move |report| {
        *sink.lock().unwrap() = Some(report.clone());
    });

    bus.emit(&PerformanceEntry::Paint {
        name: "first-paint".to_string(),
        start_time: 800.0,
    });
    bus.emit(&PerformanceEntry::Paint {
        name: "first-contentful-paint".to_string(),
        start_time: 1_100.0,
    });
    bus.emit(&PerformanceEntry::LargestContentfulPaint { start_time: 1_500.0 });
    bus.emit(&PerformanceEntry::LargestContentfulPaint { start_time: 2_300.0 });
    bus.emit(&PerformanceEntry::LayoutShift {
        value: 0.04,
        had_recent_input: false,
    });
    bus.emit(&PerformanceEntry::FirstInput {
        start_time: 3_000.0,
        processing_start: 3_060.0,
    });
    bus.emit(&PerformanceEntry::Navigation(NavigationTiming {
        start_time: 0.0,
        request_start: 40.0,
        response_start: 190.0,
        load_event_end: 2_600.0,
    }));
    performance.update_api_call_count(4);
    let rows = performance.measure_render_time("RewardsTable", || vec![1, 2, 3]);
    assert_eq!(rows.len(), 3);

    let metrics = performance.metrics();
    assert_eq!(metrics.fcp, Some(1_100.0));
    assert_eq!(metrics.lcp, Some(2_300.0));
    assert_eq!(metrics.fid, Some(60.0));
    assert_eq!(metrics.ttfb, Some(150.0));
    assert_eq!(metrics.page_load_time, Some(2_600.0));
    assert_eq!(metrics.api_call_count, Some(4));
    assert!(metrics.render_time.is_some());
    assert_eq!(performance.performance_score(), PerformanceRating::Good);

    let report = monitoring.report();
    assert_eq!(report.performance.score, PerformanceRating::Good);

    monitoring.initialize().stop();
    assert_eq!(bus.observer_count(), 0);

    let delivered = final_report.lock().unwrap().clone().unwrap();
    assert_eq!(delivered.url, "https://admin.example.com/home");
    assert_eq!(delivered.metrics.lcp, Some(2_300.0));
}

#[test]
fn test_limited_host_still_reports() {
    let bus = Arc::new(EntryBus::with_supported([EntryType::Paint]));
    let monitoring = session(bus.clone());

    bus.emit(&PerformanceEntry::Paint {
        name: "first-contentful-paint".to_string(),
        start_time: 3_500.0,
    });
    bus.emit(&PerformanceEntry::LargestContentfulPaint { start_time: 9_000.0 });

    let metrics = monitoring.performance().metrics();
    assert_eq!(metrics.fcp, Some(3_500.0));
    assert!(metrics.lcp.is_none());
    assert_eq!(
        monitoring.performance().performance_score(),
        PerformanceRating::Poor
    );
}
