//! Metric recorders for walk-forward runs.
//!
//! The library only records through the `metrics` facade. Installing an
//! exporter (Prometheus or otherwise) is left to the embedding application;
//! without one, every call is a no-op.
//!
//! # Example
//!
//! ```ignore
//! use wfo_engine::observability::record_trial;
//!
//! record_trial("completed", 0.015);
//! ```

use ::metrics::{counter, histogram};

/// Record a finished trial.
///
/// # Arguments
///
/// * `state` - Trial state (`completed`, `failed`, `pruned`)
/// * `duration_seconds` - Wall time spent evaluating the trial
pub fn record_trial(state: &str, duration_seconds: f64) {
    counter!("wfo_trials_total", "state" => state.to_string()).increment(1);
    histogram!("wfo_trial_duration_seconds", "state" => state.to_string())
        .record(duration_seconds);
}

/// Record a closed walk-forward window.
///
/// # Arguments
///
/// * `trigger` - Why the window closed (`none`, `cusum`, `drawdown`,
///   `inactivity`, `max_period`)
pub fn record_window(trigger: &str) {
    counter!("wfo_windows_total", "trigger" => trigger.to_string()).increment(1);
}

/// Record forward-test candidate evaluations.
pub fn record_forward_test_candidates(evaluated: usize) {
    counter!("wfo_forward_test_candidates_total")
        .increment(u64::try_from(evaluated).unwrap_or(u64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_without_exporter_are_noops() {
        record_trial("completed", 0.01);
        record_window("max_period");
        record_forward_test_candidates(3);
    }

    #[test]
    fn test_candidate_count_takes_collection_len() {
        let candidates = vec!["a", "b"];
        record_forward_test_candidates(candidates.len());
        record_forward_test_candidates(usize::MAX);
    }
}
