//! Workflow integration tests entry point.
//!
//! This module includes the multi-step monitoring workflows:
//! - Error capture: hooks → panic / failed task → listener → summary
//! - Performance session: observe → entries → teardown → score

mod integration;
