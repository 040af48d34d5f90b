//! Error types for the worker pool.

use thiserror::Error;

/// Errors from worker pool setup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParallelError {
    /// Thread pool initialization failed.
    #[error("Failed to initialize thread pool: {message}")]
    ThreadPoolError {
        /// Error message.
        message: String,
    },
}
