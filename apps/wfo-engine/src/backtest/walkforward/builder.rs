//! Builder pattern for walk-forward engine configuration.

use std::sync::Arc;

use super::engine::WalkForwardEngine;
use super::types::{AdaptiveConfig, WalkForwardConfig, WindowMode};
use crate::backtest::forward_test::ForwardTestConfig;
use crate::backtest::metrics::MetricsCalculator;
use crate::backtest::parallel::{CancellationToken, ParallelConfig, WorkerPool};
use crate::backtest::search::SearchConfig;
use crate::backtest::simulator::BacktestSimulator;
use crate::error::WalkForwardError;

/// Builder for [`WalkForwardEngine`].
pub struct WalkForwardBuilder {
    simulator: Arc<dyn BacktestSimulator>,
    config: WalkForwardConfig,
    search: SearchConfig,
    parallel: ParallelConfig,
    calculator: MetricsCalculator,
    cancel: Option<CancellationToken>,
}

impl WalkForwardBuilder {
    /// Create a new builder around `simulator` with default settings.
    #[must_use]
    pub fn new(simulator: Arc<dyn BacktestSimulator>) -> Self {
        Self {
            simulator,
            config: WalkForwardConfig::default(),
            search: SearchConfig::default(),
            parallel: ParallelConfig::default(),
            calculator: MetricsCalculator::new(),
            cancel: None,
        }
    }

    /// Replace the whole walk-forward configuration.
    #[must_use]
    pub fn walk_forward(mut self, config: WalkForwardConfig) -> Self {
        self.config = config;
        self
    }

    /// Set window mode.
    #[must_use]
    pub const fn mode(mut self, mode: WindowMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set in-sample window size in days.
    #[must_use]
    pub const fn is_period_days(mut self, days: u32) -> Self {
        self.config.is_period_days = days;
        self
    }

    /// Set out-of-sample window size in days (fixed mode).
    #[must_use]
    pub const fn oos_period_days(mut self, days: u32) -> Self {
        self.config.oos_period_days = days;
        self
    }

    /// Set adaptive-mode trigger settings.
    #[must_use]
    pub const fn adaptive(mut self, adaptive: AdaptiveConfig) -> Self {
        self.config.adaptive = adaptive;
        self
    }

    /// Set indicator warmup bars taken before each traded range.
    #[must_use]
    pub const fn warmup_bars(mut self, bars: usize) -> Self {
        self.config.warmup_bars = bars;
        self
    }

    /// Set holdout forward-test settings.
    #[must_use]
    pub fn forward_test(mut self, forward_test: ForwardTestConfig) -> Self {
        self.config.forward_test = forward_test;
        self
    }

    /// Set the per-window search configuration.
    #[must_use]
    pub fn search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Set worker pool settings.
    #[must_use]
    pub const fn parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    /// Use a custom metrics calculator.
    #[must_use]
    pub const fn calculator(mut self, calculator: MetricsCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    /// Observe `cancel` during the run.
    #[must_use]
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the walk-forward engine.
    ///
    /// # Errors
    ///
    /// Returns [`WalkForwardError::InvalidConfig`] if the worker pool cannot
    /// be created.
    pub fn build(self) -> Result<WalkForwardEngine, WalkForwardError> {
        let pool = WorkerPool::new(self.parallel)
            .map_err(|e| WalkForwardError::InvalidConfig(e.to_string()))?;
        let engine = WalkForwardEngine::new(self.config, self.search, self.simulator, Arc::new(pool))
            .with_calculator(self.calculator);
        Ok(match self.cancel {
            Some(cancel) => engine.with_cancellation(cancel),
            None => engine,
        })
    }
}
