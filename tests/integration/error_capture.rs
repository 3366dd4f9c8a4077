//! Error capture workflow: install hooks, fail in several ways, inspect.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};

use panel_monitoring::config::MonitoringConfig;
use panel_monitoring::error_log::{hooks_installed, spawn_watched, ErrorSource};
use panel_monitoring::monitoring::Monitoring;
use panel_monitoring::performance::EntryBus;
use panel_monitoring::storage::{KeyValueStore, MemoryStore};
use serial_test::serial;

fn enabled_monitoring(store: Arc<MemoryStore>) -> Monitoring {
    Monitoring::new(
        MonitoringConfig::default(),
        store,
        Arc::new(EntryBus::new()),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_error_capture_session() {
    let store = Arc::new(MemoryStore::new());
    store.set("partner_user", r#"{"id": 314, "role": "partner"}"#).unwrap();
    let monitoring = enabled_monitoring(store);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = monitoring.errors().on_error(move |error| {
        sink.lock().unwrap().push((error.source, error.message.clone()));
    });

    let handle = monitoring.initialize();
    assert!(hooks_installed());

    // Synchronous panic caught by the caller.
    let _ = std::panic::catch_unwind(|| panic!("workflow: widget state corrupted"));

    // Background task failing with an error value.
    let failed = spawn_watched(monitoring.errors(), async {
        Err::<(), _>("workflow: sync rejected")
    });
    assert_eq!(failed.await.unwrap(), None);

    // Render failure from the UI layer.
    monitoring
        .errors()
        .log_react_error("workflow: render failed", None, Some("in RewardsTable"))
        .unwrap();

    // Browser noise never shows up.
    let _ = std::panic::catch_unwind(|| panic!("ResizeObserver loop limit exceeded"));

    handle.stop();
    assert!(!hooks_installed());
    subscription.unsubscribe();

    let errors: Vec<_> = monitoring
        .errors()
        .all_errors()
        .into_iter()
        .filter(|e| e.message.starts_with("workflow:"))
        .collect();
    let sources: Vec<ErrorSource> = errors.iter().map(|e| e.source).collect();
    assert_eq!(
        sources,
        vec![ErrorSource::Javascript, ErrorSource::Promise, ErrorSource::React]
    );
    assert!(errors.iter().all(|e| e.user_id.as_deref() == Some("314")));

    // Listeners for panics run on their own thread; wait for them.
    for _ in 0..100 {
        if seen.lock().unwrap().len() >= 3 {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    let delivered: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|(_, message)| message.clone())
        .filter(|message| message.starts_with("workflow:"))
        .collect();
    assert_eq!(delivered.len(), 3);
    assert!(!delivered.iter().any(|m| m.contains("ResizeObserver")));

    let summary = monitoring.errors().summary(None);
    assert!(summary.critical_errors.iter().any(|e| e.source == ErrorSource::React));
}

#[tokio::test]
#[serial]
async fn test_task_panic_recorded_once_without_hooks() {
    let monitoring = Monitoring::new(
        MonitoringConfig {
            enabled: false,
            ..MonitoringConfig::default()
        },
        Arc::new(MemoryStore::new()),
        Arc::new(EntryBus::new()),
    );
    let _handle = monitoring.initialize();
    assert!(!hooks_installed());

    let task = spawn_watched(monitoring.errors(), async {
        if monitoring_is_broken() {
            panic!("workflow: task exploded");
        }
        Ok::<u8, String>(1)
    });
    assert_eq!(task.await.unwrap(), None);

    let errors = monitoring.errors().all_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, ErrorSource::Promise);
    assert_eq!(errors[0].message, "workflow: task exploded");
}

fn monitoring_is_broken() -> bool {
    std::hint::black_box(true)
}
