//! Workflow integration tests for panel monitoring.
//!
//! These tests drive the public API through complete sessions:
//! - Error capture across panics, failed tasks and listeners
//! - Performance sampling from first paint to teardown

mod error_capture;
mod performance_session;
