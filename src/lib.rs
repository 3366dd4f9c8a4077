//! Panel Monitoring
//!
//! Client-side monitoring shared by the loyalty admin and partner panels.
//!
//! # Features
//!
//! - API metrics: outcome and latency of every outbound request, through a
//!   `reqwest` interceptor
//! - Error log: runtime errors from API calls, UI render failures, panics
//!   and failed background tasks, with noise filtering and listeners
//! - Performance: core web vitals, page load and render timings, rated
//!   good / needs-improvement / poor
//! - Snapshots of the recent history in a key-value store, restored on start
//!
//! # Quick Start
//!
//! ```bash
//! MONITORING_DEV_MODE=true ./panel-monitor https://api.example.com/api/health
//! ```
//!
//! # Architecture
//!
//! ```text
//!  reqwest ──▶ MetricsInterceptor ──▶ ApiMetricsCollector ─┐
//!                    │                                      │
//!  panics, tasks ────┴──────────────▶ ErrorLogger ──────────┼──▶ Monitoring ──▶ report / export
//!                                                           │
//!  PerformanceSource ───────────────▶ PerformanceMonitor ───┘
//!                                          │
//!                                  KeyValueStore (snapshots)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod error_log;
pub mod metrics;
pub mod monitoring;
pub mod performance;
pub mod storage;
pub mod traits;

#[cfg(test)]
mod test_utils;
