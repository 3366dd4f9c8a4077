//! Performance entry sources.
//!
//! A [`PerformanceSource`] delivers timing entries to registered callbacks,
//! one registration per entry type. [`EntryBus`] is the in-process source a
//! host feeds with entries it measures itself.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::ObserveError;

/// Kinds of performance entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryType {
    /// Paint timings (`first-paint`, `first-contentful-paint`).
    Paint,
    /// Largest contentful paint candidates.
    LargestContentfulPaint,
    /// The first user input.
    FirstInput,
    /// Layout shifts.
    LayoutShift,
    /// Navigation timing.
    Navigation,
}

impl EntryType {
    /// Every entry type.
    pub const ALL: [Self; 5] = [
        Self::Paint,
        Self::LargestContentfulPaint,
        Self::FirstInput,
        Self::LayoutShift,
        Self::Navigation,
    ];

    /// Wire name of the entry type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Paint => "paint",
            Self::LargestContentfulPaint => "largest-contentful-paint",
            Self::FirstInput => "first-input",
            Self::LayoutShift => "layout-shift",
            Self::Navigation => "navigation",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Navigation timing of the current page, in milliseconds from time origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationTiming {
    /// Start of the navigation.
    pub start_time: f64,
    /// When the request was sent.
    pub request_start: f64,
    /// When the first response byte arrived.
    pub response_start: f64,
    /// End of the load event; `0` while the page is still loading.
    pub load_event_end: f64,
}

impl NavigationTiming {
    /// Time to first byte.
    #[must_use]
    pub fn ttfb(&self) -> f64 {
        self.response_start - self.request_start
    }

    /// Whether the load event has completed.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.load_event_end > 0.0
    }

    /// Full page load time, once loaded.
    #[must_use]
    pub fn page_load_time(&self) -> Option<f64> {
        self.is_loaded()
            .then(|| self.load_event_end - self.start_time)
    }
}

/// One performance entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceEntry {
    /// A paint timing.
    Paint {
        /// `first-paint` or `first-contentful-paint`.
        name: String,
        /// When the paint happened.
        start_time: f64,
    },
    /// A largest contentful paint candidate.
    LargestContentfulPaint {
        /// When the candidate was rendered.
        start_time: f64,
    },
    /// The first user input.
    FirstInput {
        /// When the input happened.
        start_time: f64,
        /// When its handler started running.
        processing_start: f64,
    },
    /// A layout shift.
    LayoutShift {
        /// Shift score.
        value: f64,
        /// Whether user input preceded the shift.
        had_recent_input: bool,
    },
    /// Navigation timing update.
    Navigation(NavigationTiming),
}

impl PerformanceEntry {
    /// Type of this entry.
    #[must_use]
    pub const fn entry_type(&self) -> EntryType {
        match self {
            Self::Paint { .. } => EntryType::Paint,
            Self::LargestContentfulPaint { .. } => EntryType::LargestContentfulPaint,
            Self::FirstInput { .. } => EntryType::FirstInput,
            Self::LayoutShift { .. } => EntryType::LayoutShift,
            Self::Navigation(_) => EntryType::Navigation,
        }
    }
}

/// Callback receiving entries of one type.
pub type EntryCallback = Arc<dyn Fn(&PerformanceEntry) + Send + Sync>;

/// Registration handle returned by [`PerformanceSource::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Host source of performance entries.
#[cfg_attr(test, mockall::automock)]
pub trait PerformanceSource: Send + Sync {
    /// Register `callback` for entries of `entry_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ObserveError`] if the host cannot observe this type.
    fn observe(
        &self,
        entry_type: EntryType,
        callback: EntryCallback,
    ) -> Result<ObserverId, ObserveError>;

    /// Remove a registration. Unknown ids are ignored.
    fn disconnect(&self, id: ObserverId);

    /// Navigation timing recorded so far, if the host has any.
    fn navigation_timing(&self) -> Option<NavigationTiming>;
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    observers: Vec<(ObserverId, EntryType, EntryCallback)>,
    navigation: Option<NavigationTiming>,
}

/// In-process [`PerformanceSource`].
///
/// The host pushes entries with [`EntryBus::emit`]; they are delivered to
/// every observer of that type, outside the internal lock.
#[derive(Default)]
pub struct EntryBus {
    supported: Option<HashSet<EntryType>>,
    state: RwLock<BusState>,
}

impl std::fmt::Debug for EntryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryBus")
            .field("supported", &self.supported)
            .field("observers", &self.observer_count())
            .finish_non_exhaustive()
    }
}

impl EntryBus {
    /// Create a bus supporting every entry type.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus that only supports `types`.
    #[must_use]
    pub fn with_supported(types: impl IntoIterator<Item = EntryType>) -> Self {
        Self {
            supported: Some(types.into_iter().collect()),
            state: RwLock::default(),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, BusState> {
        self.state.read().unwrap_or_else(|poison_error| {
            tracing::warn!(error = %poison_error, "Entry bus lock poisoned, using recovered data");
            poison_error.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, BusState> {
        self.state.write().unwrap_or_else(|poison_error| {
            tracing::warn!(error = %poison_error, "Entry bus lock poisoned, using recovered data");
            poison_error.into_inner()
        })
    }

    /// Whether `entry_type` can be observed.
    #[must_use]
    pub fn supports(&self, entry_type: EntryType) -> bool {
        self.supported
            .as_ref()
            .is_none_or(|types| types.contains(&entry_type))
    }

    /// Record navigation timing without notifying observers.
    ///
    /// Used for timing known before any monitor is created.
    pub fn set_navigation_timing(&self, timing: NavigationTiming) {
        self.write().navigation = Some(timing);
    }

    /// Deliver `entry` to every observer of its type.
    ///
    /// Navigation entries also replace the stored navigation timing.
    /// Returns the number of callbacks invoked.
    pub fn emit(&self, entry: &PerformanceEntry) -> usize {
        let entry_type = entry.entry_type();
        let callbacks: Vec<EntryCallback> = {
            let mut state = self.write();
            if let PerformanceEntry::Navigation(timing) = entry {
                state.navigation = Some(*timing);
            }
            state
                .observers
                .iter()
                .filter(|(_, observed, _)| *observed == entry_type)
                .map(|(_, _, callback)| Arc::clone(callback))
                .collect()
        };

        for callback in &callbacks {
            callback(entry);
        }
        callbacks.len()
    }

    /// Number of active registrations.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.read().observers.len()
    }
}

impl PerformanceSource for EntryBus {
    fn observe(
        &self,
        entry_type: EntryType,
        callback: EntryCallback,
    ) -> Result<ObserverId, ObserveError> {
        if !self.supports(entry_type) {
            return Err(ObserveError::Unsupported {
                entry_type: entry_type.to_string(),
            });
        }

        let mut state = self.write();
        let id = ObserverId(state.next_id);
        state.next_id += 1;
        state.observers.push((id, entry_type, callback));
        Ok(id)
    }

    fn disconnect(&self, id: ObserverId) {
        self.write().observers.retain(|(observer, _, _)| *observer != id);
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        self.read().navigation
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_callback(counter: &Arc<AtomicUsize>) -> EntryCallback {
        let counter = Arc::clone(counter);
        Arc::new(move |_: &PerformanceEntry| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_entry_type_names() {
        assert_eq!(EntryType::LargestContentfulPaint.as_str(), "largest-contentful-paint");
        assert_eq!(
            serde_json::to_string(&EntryType::FirstInput).unwrap(),
            "\"first-input\""
        );
        for entry_type in EntryType::ALL {
            assert_eq!(
                serde_json::to_string(&entry_type).unwrap(),
                format!("\"{entry_type}\"")
            );
        }
    }

    #[test]
    fn test_navigation_timing_derivations() {
        let loading = NavigationTiming {
            start_time: 0.0,
            request_start: 20.0,
            response_start: 140.0,
            load_event_end: 0.0,
        };
        assert_eq!(loading.ttfb(), 120.0);
        assert!(!loading.is_loaded());
        assert!(loading.page_load_time().is_none());

        let loaded = NavigationTiming {
            load_event_end: 1_250.0,
            ..loading
        };
        assert_eq!(loaded.page_load_time(), Some(1_250.0));
    }

    #[test]
    fn test_emit_reaches_only_matching_observers() {
        let bus = EntryBus::new();
        let paints = Arc::new(AtomicUsize::new(0));
        let shifts = Arc::new(AtomicUsize::new(0));
        bus.observe(EntryType::Paint, counting_callback(&paints)).unwrap();
        bus.observe(EntryType::LayoutShift, counting_callback(&shifts))
            .unwrap();

        let delivered = bus.emit(&PerformanceEntry::Paint {
            name: "first-contentful-paint".to_string(),
            start_time: 900.0,
        });

        assert_eq!(delivered, 1);
        assert_eq!(paints.load(Ordering::SeqCst), 1);
        assert_eq!(shifts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_disconnect_stops_delivery() {
        let bus = EntryBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let id = bus.observe(EntryType::Paint, counting_callback(&calls)).unwrap();
        bus.disconnect(id);
        bus.disconnect(id);

        assert_eq!(bus.observer_count(), 0);
        let entry = PerformanceEntry::Paint {
            name: "first-paint".to_string(),
            start_time: 10.0,
        };
        assert_eq!(bus.emit(&entry), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsupported_entry_type() {
        let bus = EntryBus::with_supported([EntryType::Paint]);
        let calls = Arc::new(AtomicUsize::new(0));
        let err = bus
            .observe(EntryType::LayoutShift, counting_callback(&calls))
            .unwrap_err();
        assert_eq!(
            err,
            ObserveError::Unsupported {
                entry_type: "layout-shift".to_string()
            }
        );
        assert!(bus.supports(EntryType::Paint));
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn test_navigation_entries_update_stored_timing() {
        let bus = EntryBus::new();
        assert!(bus.navigation_timing().is_none());

        let timing = NavigationTiming {
            start_time: 0.0,
            request_start: 5.0,
            response_start: 55.0,
            load_event_end: 800.0,
        };
        bus.emit(&PerformanceEntry::Navigation(timing));
        assert_eq!(bus.navigation_timing(), Some(timing));
    }

    #[test]
    fn test_callback_may_register_observers() {
        let bus = Arc::new(EntryBus::new());
        let inner = Arc::clone(&bus);
        bus.observe(
            EntryType::Paint,
            Arc::new(move |_: &PerformanceEntry| {
                let _ = inner.observe(EntryType::Paint, Arc::new(|_: &PerformanceEntry| {}));
            }),
        )
        .unwrap();

        bus.emit(&PerformanceEntry::Paint {
            name: "first-paint".to_string(),
            start_time: 1.0,
        });
        assert_eq!(bus.observer_count(), 2);
    }
}
