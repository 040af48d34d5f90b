//! Progress tracking for trial evaluation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Outcome category of one evaluated task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Ran to completion.
    Completed,
    /// Simulator or evaluation failure.
    Failed,
    /// Stopped early by the pruner.
    Pruned,
}

/// Lock-free progress tracker shared by worker threads.
#[derive(Debug)]
pub struct ProgressTracker {
    total: u64,
    completed: AtomicU64,
    failed: AtomicU64,
    pruned: AtomicU64,
    start_time: Instant,
}

impl ProgressTracker {
    /// Create a tracker for up to `total` tasks.
    #[must_use]
    pub fn new(total: u64) -> Self {
        Self {
            total,
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            pruned: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a finished task.
    pub fn record(&self, state: TaskState) {
        let counter = match state {
            TaskState::Completed => &self.completed,
            TaskState::Failed => &self.failed,
            TaskState::Pruned => &self.pruned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Seconds since the tracker was created.
    #[must_use]
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Get current progress.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn progress(&self) -> Progress {
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let pruned = self.pruned.load(Ordering::Relaxed);
        let finished = completed + failed + pruned;
        let elapsed = self.start_time.elapsed();

        let tasks_per_sec = if elapsed.as_secs_f64() > 0.0 {
            finished as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        let remaining = self.total.saturating_sub(finished);
        let eta_secs = if tasks_per_sec > 0.0 {
            (remaining as f64 / tasks_per_sec) as u64
        } else {
            0
        };

        Progress {
            total: self.total,
            completed,
            failed,
            pruned,
            elapsed_secs: elapsed.as_secs(),
            eta_secs,
            tasks_per_sec,
        }
    }
}

/// Progress snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Progress {
    /// Task budget.
    pub total: u64,
    /// Completed tasks.
    pub completed: u64,
    /// Failed tasks.
    pub failed: u64,
    /// Pruned tasks.
    pub pruned: u64,
    /// Elapsed time in seconds.
    pub elapsed_secs: u64,
    /// Estimated time remaining in seconds.
    pub eta_secs: u64,
    /// Tasks processed per second.
    pub tasks_per_sec: f64,
}

impl Progress {
    /// Finished tasks in any state.
    #[must_use]
    pub const fn finished(&self) -> u64 {
        self.completed + self.failed + self.pruned
    }

    /// Get completion percentage.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            (self.finished() as f64 / self.total as f64) * 100.0
        }
    }
}
