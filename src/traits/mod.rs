//! Trait definitions for mockable dependencies.
//!
//! This module defines traits for:
//! - [`TimeProvider`]: Time abstraction for testing
//! - [`PageContext`]: Page URL and user agent of the host
//! - [`MetricsSink`]: Where the HTTP interceptor records request outcomes
//! - [`ErrorSink`]: Where the HTTP interceptor reports failed requests
//!
//! # Mocking
//!
//! All traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.
//!
//! # Example
//!
//! ```
//! use panel_monitoring::traits::{ManualClock, TimeProvider};
//!
//! let clock = ManualClock::new(1_000);
//! clock.advance_ms(500);
//! assert_eq!(clock.now().timestamp_millis(), 1_500);
//! ```

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeZone, Utc};

use crate::error::StorageError;
use crate::metrics::ApiRequestMetric;

/// Time provider trait for mocking.
///
/// This trait abstracts time operations to allow for
/// deterministic testing of time-windowed summaries and snapshot freshness.
#[cfg_attr(test, mockall::automock)]
pub trait TimeProvider: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Current time as epoch milliseconds.
    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Real time provider using system clock.
///
/// This is the production implementation that returns the actual current time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock.
///
/// Starts at a fixed epoch-millisecond value and only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `millis` since the epoch.
    #[must_use]
    pub const fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Move the clock forward.
    pub fn advance_ms(&self, delta: i64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    /// Jump to an absolute time.
    pub fn set_ms(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeProvider for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }

    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Host page information attached to captured records.
#[cfg_attr(test, mockall::automock)]
pub trait PageContext: Send + Sync {
    /// URL of the page the user is on.
    fn url(&self) -> String;

    /// User agent of the host.
    fn user_agent(&self) -> String;
}

/// Page context with fixed values, usually taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPage {
    url: String,
    user_agent: String,
}

impl StaticPage {
    /// Create a page context.
    #[must_use]
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user_agent: user_agent.into(),
        }
    }
}

impl PageContext for StaticPage {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }
}

/// Destination for completed request metrics.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSink: Send + Sync {
    /// Record one completed or failed request.
    ///
    /// The metric is kept even when this returns an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if a periodic snapshot could not be saved.
    fn record_request(&self, metric: ApiRequestMetric) -> Result<(), StorageError>;
}

/// Destination for failed HTTP requests.
#[cfg_attr(test, mockall::automock)]
pub trait ErrorSink: Send + Sync {
    /// Report a failed request.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if a periodic snapshot could not be saved.
    fn log_api_error(
        &self,
        url: &str,
        status: Option<u16>,
        error: &str,
    ) -> Result<(), StorageError>;
}
