//! Process-wide capture of uncaught failures.
//!
//! Two sources are covered:
//! - Panics anywhere in the process, through a chained panic hook
//!   ([`GlobalErrorHooks`], source `javascript`).
//! - Background tasks whose failure nobody observes, through
//!   [`spawn_watched`] (source `promise`).
//!
//! Capture is suppressed on a thread while it is already inside the logger,
//! so a panicking listener or a failure while recording cannot recurse.
//!
//! At most one capturing hook exists per process. Installing again hands
//! capture to the newest logger instead of chaining a second hook.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::Cell;
use std::future::Future;
use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use super::{ErrorLogger, ErrorReport, ErrorSource};

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static>;

thread_local! {
    static CAPTURE_SUPPRESSED: Cell<bool> = const { Cell::new(false) };
}

/// The logger currently receiving panics and the hook it replaced.
struct Registration {
    generation: u64,
    logger: Arc<ErrorLogger>,
    previous: Arc<PanicHook>,
}

/// Read by the panic hook; never held across `take_hook`/`set_hook`.
static ACTIVE: Mutex<Option<Registration>> = Mutex::new(None);

/// Serializes install and removal so hook swaps cannot interleave.
static INSTALL_LOCK: Mutex<()> = Mutex::new(());

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Generation of a registration whose owner was dropped during a panic.
const ORPHANED: u64 = 0;

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("Error hook registry lock was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn active_logger() -> Option<Arc<ErrorLogger>> {
    lock_recovering(&ACTIVE)
        .as_ref()
        .map(|registration| Arc::clone(&registration.logger))
}

/// Whether a [`GlobalErrorHooks`] is currently active.
#[must_use]
pub fn hooks_installed() -> bool {
    lock_recovering(&ACTIVE).is_some()
}

/// Whether panics are currently recorded into `logger` by the hook.
fn captured_by_hook(logger: &Arc<ErrorLogger>) -> bool {
    lock_recovering(&ACTIVE)
        .as_ref()
        .is_some_and(|registration| Arc::ptr_eq(&registration.logger, logger))
}

/// Run `f` with capture disabled on this thread.
pub(crate) fn suppress_capture<R>(f: impl FnOnce() -> R) -> R {
    let previous = CAPTURE_SUPPRESSED.with(|flag| flag.replace(true));
    let result = f();
    CAPTURE_SUPPRESSED.with(|flag| flag.set(previous));
    result
}

fn capture_suppressed() -> bool {
    CAPTURE_SUPPRESSED.with(Cell::get)
}

/// Text of a panic payload.
pub(crate) fn panic_payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Installed panic hook that records every panic in an [`ErrorLogger`].
///
/// The hook chains to whatever hook was installed before it, so default
/// panic output is kept. Installing while another `GlobalErrorHooks` is
/// alive moves capture to the new logger and leaves the older value
/// inactive. Dropping the active value restores the hook that was in place
/// before the first install; dropping an inactive one does nothing.
pub struct GlobalErrorHooks {
    generation: u64,
}

impl std::fmt::Debug for GlobalErrorHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalErrorHooks")
            .field("generation", &self.generation)
            .field("active", &self.is_active())
            .finish()
    }
}

impl GlobalErrorHooks {
    pub(crate) fn install(logger: Arc<ErrorLogger>) -> Self {
        let _install = lock_recovering(&INSTALL_LOCK);
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::SeqCst);

        {
            let mut active = lock_recovering(&ACTIVE);
            if let Some(registration) = active.as_mut() {
                registration.generation = generation;
                registration.logger = logger;
                tracing::debug!(generation, "Global error hooks handed to new logger");
                return Self { generation };
            }
        }

        let previous: Arc<PanicHook> = Arc::new(panic::take_hook());
        let chained = Arc::clone(&previous);
        panic::set_hook(Box::new(move |info| {
            if !capture_suppressed() {
                if let Some(logger) = active_logger() {
                    suppress_capture(|| record_panic(&logger, info));
                }
            }
            chained(info);
        }));

        *lock_recovering(&ACTIVE) = Some(Registration {
            generation,
            logger,
            previous,
        });
        tracing::debug!(generation, "Global error hooks installed");
        Self { generation }
    }

    /// Whether this value still owns the process panic hook.
    #[must_use]
    pub fn is_active(&self) -> bool {
        lock_recovering(&ACTIVE)
            .as_ref()
            .is_some_and(|registration| registration.generation == self.generation)
    }
}

impl Drop for GlobalErrorHooks {
    fn drop(&mut self) {
        let _install = lock_recovering(&INSTALL_LOCK);

        let previous = {
            let mut active = lock_recovering(&ACTIVE);
            let owned = active
                .as_ref()
                .is_some_and(|registration| registration.generation == self.generation);
            if !owned {
                return;
            }
            if std::thread::panicking() {
                // Swapping hooks while unwinding aborts the process. The hook
                // stays, owned by no value, until the next install takes it.
                if let Some(registration) = active.as_mut() {
                    registration.generation = ORPHANED;
                }
                return;
            }
            active.take().map(|registration| registration.previous)
        };
        let Some(previous) = previous else {
            return;
        };

        drop(panic::take_hook());
        panic::set_hook(Box::new(move |info| previous(info)));
        tracing::debug!(generation = self.generation, "Global error hooks removed");
    }
}

fn record_panic(logger: &Arc<ErrorLogger>, info: &PanicHookInfo<'_>) {
    let message = panic_payload_message(info.payload());
    let mut stack = info
        .location()
        .map(|location| format!("at {location}"))
        .unwrap_or_default();

    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        stack.push('\n');
        stack.push_str(&backtrace.to_string());
    }

    let mut report = ErrorReport::new(message, ErrorSource::Javascript);
    if !stack.is_empty() {
        report = report.with_stack(stack);
    }
    if let Err(e) = logger.log_error_deferred(report) {
        tracing::warn!(error = %e, "Failed to persist error log snapshot");
    }
}

/// Spawn `future` on the current tokio runtime, recording its failure.
///
/// An `Err` output is logged with source `promise`. A panic is logged the
/// same way unless active [`GlobalErrorHooks`] already record panics into
/// this same logger. The returned handle yields the task's value, or
/// `None` if it failed.
///
/// # Panics
///
/// Panics if called outside a tokio runtime, like [`tokio::spawn`].
pub fn spawn_watched<F, T, E>(logger: &Arc<ErrorLogger>, future: F) -> JoinHandle<Option<T>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let logger = Arc::clone(logger);
    let task = tokio::spawn(future);

    tokio::spawn(async move {
        match task.await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                record_rejection(&logger, e.to_string());
                None
            }
            Err(join_error) if join_error.is_panic() => {
                if !captured_by_hook(&logger) {
                    let payload = join_error.into_panic();
                    record_rejection(&logger, panic_payload_message(payload.as_ref()));
                }
                None
            }
            Err(_) => None,
        }
    })
}

fn record_rejection(logger: &ErrorLogger, message: String) {
    let report = ErrorReport::new(message, ErrorSource::Promise);
    if let Err(e) = logger.log_error(report) {
        tracing::warn!(error = %e, "Failed to persist error log snapshot");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::test_utils::logger_with;
    use serial_test::serial;

    fn shared_logger() -> Arc<ErrorLogger> {
        let (logger, _store, _clock) = logger_with(MemoryStore::new());
        Arc::new(logger)
    }

    fn count_matching(logger: &ErrorLogger, needle: &str) -> usize {
        logger
            .all_errors()
            .iter()
            .filter(|e| e.message.contains(needle))
            .count()
    }

    #[test]
    fn test_panic_payload_message() {
        let text: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_payload_message(text.as_ref()), "static text");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_payload_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_payload_message(other.as_ref()), "Box<dyn Any>");
    }

    #[test]
    fn test_suppress_capture_restores_flag() {
        assert!(!capture_suppressed());
        suppress_capture(|| {
            assert!(capture_suppressed());
            suppress_capture(|| assert!(capture_suppressed()));
            assert!(capture_suppressed());
        });
        assert!(!capture_suppressed());
    }

    #[test]
    #[serial]
    fn test_panic_is_captured_until_hooks_dropped() {
        let logger = shared_logger();
        let hooks = logger.install_global_handlers().expect("enabled logger");
        assert!(hooks_installed());

        let result = panic::catch_unwind(|| panic!("hook-test-boom"));
        assert!(result.is_err());

        let captured: Vec<_> = logger
            .all_errors()
            .into_iter()
            .filter(|e| e.message == "hook-test-boom")
            .collect();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].source, ErrorSource::Javascript);
        assert!(captured[0].stack.as_deref().unwrap().starts_with("at "));

        drop(hooks);
        assert!(!hooks_installed());

        let _ = panic::catch_unwind(|| panic!("hook-test-after-drop"));
        assert_eq!(count_matching(&logger, "hook-test-after-drop"), 0);
    }

    #[test]
    #[serial]
    fn test_ignored_panic_message_not_recorded() {
        let logger = shared_logger();
        let _hooks = logger.install_global_handlers().expect("enabled logger");

        let _ = panic::catch_unwind(|| panic!("Script error. hook-test-noise"));
        assert_eq!(count_matching(&logger, "hook-test-noise"), 0);
    }

    #[test]
    #[serial]
    fn test_panicking_listener_does_not_recurse() {
        let logger = shared_logger();
        let _hooks = logger.install_global_handlers().expect("enabled logger");
        let _bad = logger.on_error(|error| {
            if error.message == "hook-test-trigger" {
                panic!("hook-test-listener");
            }
        });
        let (tx, rx) = std::sync::mpsc::channel();
        let tx = std::sync::Mutex::new(tx);
        let _good = logger.on_error(move |error| {
            let _ = tx.lock().unwrap().send(error.message.clone());
        });

        let _ = panic::catch_unwind(|| panic!("hook-test-trigger"));

        let delivered = rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .expect("listeners dispatched");
        assert_eq!(delivered, "hook-test-trigger");
        assert_eq!(count_matching(&logger, "hook-test-trigger"), 1);
        assert_eq!(count_matching(&logger, "hook-test-listener"), 0);
    }

    #[test]
    #[serial]
    fn test_second_install_records_each_panic_once() {
        let logger = shared_logger();
        let first = logger.install_global_handlers().expect("enabled logger");
        let second = logger.install_global_handlers().expect("enabled logger");
        assert!(!first.is_active());
        assert!(second.is_active());

        let _ = panic::catch_unwind(|| panic!("hook-test-reinstall"));
        assert_eq!(count_matching(&logger, "hook-test-reinstall"), 1);

        drop(first);
        drop(second);
        assert!(!hooks_installed());
    }

    #[test]
    #[serial]
    fn test_drop_in_creation_order_removes_capture() {
        let logger = shared_logger();
        let first = logger.install_global_handlers().expect("enabled logger");
        let second = logger.install_global_handlers().expect("enabled logger");

        drop(first);
        assert!(hooks_installed());
        let _ = panic::catch_unwind(|| panic!("hook-test-after-first-drop"));
        assert_eq!(count_matching(&logger, "hook-test-after-first-drop"), 1);

        drop(second);
        assert!(!hooks_installed());
        let _ = panic::catch_unwind(|| panic!("hook-test-after-all-dropped"));
        assert_eq!(count_matching(&logger, "hook-test-after-all-dropped"), 0);
    }

    #[test]
    #[serial]
    fn test_install_moves_capture_to_newest_logger() {
        let old = shared_logger();
        let new = shared_logger();
        let _old_hooks = old.install_global_handlers().expect("enabled logger");
        let _new_hooks = new.install_global_handlers().expect("enabled logger");

        let _ = panic::catch_unwind(|| panic!("hook-test-handover"));
        assert_eq!(count_matching(&old, "hook-test-handover"), 0);
        assert_eq!(count_matching(&new, "hook-test-handover"), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_spawn_watched_success() {
        let logger = shared_logger();
        let handle = spawn_watched(&logger, async { Ok::<_, String>(5) });
        assert_eq!(handle.await.unwrap(), Some(5));
        assert!(logger.is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_spawn_watched_records_error() {
        let logger = shared_logger();
        let handle = spawn_watched(&logger, async {
            Err::<(), _>("sync job rejected: quota exhausted")
        });
        assert_eq!(handle.await.unwrap(), None);

        let errors = logger.all_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "sync job rejected: quota exhausted");
        assert_eq!(errors[0].source, ErrorSource::Promise);
    }

    #[tokio::test]
    #[serial]
    async fn test_spawn_watched_records_panic_without_hooks() {
        let logger = shared_logger();
        let handle = spawn_watched(&logger, async {
            if true {
                panic!("hook-test-task-panic");
            }
            Ok::<(), String>(())
        });
        assert_eq!(handle.await.unwrap(), None);

        let errors = logger.all_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "hook-test-task-panic");
        assert_eq!(errors[0].source, ErrorSource::Promise);
    }

    #[tokio::test]
    #[serial]
    async fn test_spawn_watched_panic_logged_once_with_hooks() {
        let logger = shared_logger();
        let hooks = logger.install_global_handlers().expect("enabled logger");

        let handle = spawn_watched(&logger, async {
            if true {
                panic!("hook-test-task-hooked");
            }
            Ok::<(), String>(())
        });
        assert_eq!(handle.await.unwrap(), None);
        drop(hooks);

        let captured: Vec<_> = logger
            .all_errors()
            .into_iter()
            .filter(|e| e.message == "hook-test-task-hooked")
            .collect();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].source, ErrorSource::Javascript);
    }
    #[tokio::test]
    #[serial]
    async fn test_spawn_watched_records_panic_when_hooks_serve_other_logger() {
        let hooked = shared_logger();
        let watched = shared_logger();
        let _hooks = hooked.install_global_handlers().expect("enabled logger");

        let handle = spawn_watched(&watched, async {
            if true {
                panic!("hook-test-foreign-hooks");
            }
            Ok::<(), String>(())
        });
        assert_eq!(handle.await.unwrap(), None);

        let captured: Vec<_> = watched
            .all_errors()
            .into_iter()
            .filter(|e| e.message == "hook-test-foreign-hooks")
            .collect();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].source, ErrorSource::Promise);
    }
}
