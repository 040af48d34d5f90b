//! Bounded worker pool backed by a dedicated Rayon thread pool.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use super::config::ParallelConfig;
use super::error::ParallelError;

/// Evaluates immutable task values on a bounded pool.
///
/// Results always come back in task order, whatever order the workers
/// finish in.
#[derive(Debug)]
pub struct WorkerPool {
    pool: ThreadPool,
    config: ParallelConfig,
}

impl WorkerPool {
    /// Build a pool with `config.max_threads` threads (0 = all cores).
    ///
    /// # Errors
    ///
    /// Returns error if the thread pool cannot be created.
    pub fn new(config: ParallelConfig) -> Result<Self, ParallelError> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("wfo-worker-{i}"));
        if config.max_threads > 0 {
            builder = builder.num_threads(config.max_threads);
        }
        let pool = builder
            .build()
            .map_err(|e| ParallelError::ThreadPoolError {
                message: e.to_string(),
            })?;

        debug!(threads = pool.current_num_threads(), "Worker pool ready");
        Ok(Self { pool, config })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Pool configuration.
    #[must_use]
    pub const fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// Apply `f` to every task and return results in task order.
    pub fn map_ordered<T, R, F>(&self, tasks: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        if tasks.len() < self.config.min_parallel_jobs || self.threads() <= 1 {
            return tasks.iter().map(f).collect();
        }
        self.pool.install(|| tasks.par_iter().map(&f).collect())
    }
}
