//! Configuration for the worker pool.

use serde::{Deserialize, Serialize};

/// Configuration for parallel trial and candidate evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Maximum number of worker threads (0 = use all available).
    pub max_threads: usize,

    /// Batches smaller than this run on the calling thread.
    pub min_parallel_jobs: usize,

    /// Whether to log progress after every batch.
    pub track_progress: bool,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            max_threads: 0,
            min_parallel_jobs: 2,
            track_progress: true,
        }
    }
}

impl ParallelConfig {
    /// Single-threaded configuration, mainly for tests.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            max_threads: 1,
            min_parallel_jobs: usize::MAX,
            track_progress: false,
        }
    }
}
