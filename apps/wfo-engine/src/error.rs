//! Crate-level error type.
//!
//! Configuration problems are fatal and carry a reason. Per-trial and
//! per-window failures never surface here; they are recorded on the result
//! records and the run continues.

use thiserror::Error;

use crate::backtest::search::SearchError;
use crate::config::ConfigError;

/// Errors returned by a walk-forward run.
#[derive(Debug, Error)]
pub enum WalkForwardError {
    /// The dataset cannot hold the requested windows.
    #[error("Insufficient data: {reason}")]
    InsufficientData {
        /// What did not fit.
        reason: String,
    },

    /// A walk-forward setting is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The parameter space has nothing to optimize.
    #[error("Parameter space has no optimizable parameters")]
    NoOptimizableParameters,

    /// The holdout would consume the whole dataset.
    #[error("Holdout of {holdout_days} days leaves no data to optimize (dataset spans {available_days:.1} days)")]
    HoldoutTooLong {
        /// Requested holdout length.
        holdout_days: u32,
        /// Span of the dataset in days.
        available_days: f64,
    },

    /// The run was cancelled between windows.
    #[error("Walk-forward run cancelled")]
    Cancelled,

    /// The search configuration is invalid.
    #[error(transparent)]
    Search(SearchError),

    /// The run configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<SearchError> for WalkForwardError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NoOptimizableParameters => Self::NoOptimizableParameters,
            other => Self::Search(other),
        }
    }
}

impl WalkForwardError {
    /// Shorthand for [`WalkForwardError::InsufficientData`].
    pub(crate) fn insufficient(reason: impl Into<String>) -> Self {
        Self::InsufficientData {
            reason: reason.into(),
        }
    }
}
