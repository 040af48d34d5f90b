//! Observability module for metrics.
//!
//! Logging goes through `tracing` (see [`crate::telemetry`]); counters and
//! histograms go through the `metrics` facade here.

mod metrics;

pub use self::metrics::{record_forward_test_candidates, record_trial, record_window};
