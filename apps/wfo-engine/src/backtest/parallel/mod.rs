//! Parallel evaluation infrastructure using Rayon.
//!
//! Trials and forward-test candidates are self-contained task values that
//! go into a bounded pool and come back as result values in task order.
//! Nothing mutable is shared between workers except the atomic counters of
//! [`ProgressTracker`] and the [`CancellationToken`] flag.

mod cancel;
mod config;
mod error;
mod pool;
mod progress;

pub use cancel::CancellationToken;
pub use config::ParallelConfig;
pub use error::ParallelError;
pub use pool::WorkerPool;
pub use progress::{Progress, ProgressTracker, TaskState};
