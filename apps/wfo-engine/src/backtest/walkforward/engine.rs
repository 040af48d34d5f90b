//! Walk-forward analysis engine.

use std::sync::Arc;

use tracing::{info, warn};

use super::planner::WindowPlanner;
use super::stitch::{OOSSegment, OOSStitcher};
use super::types::{WalkForwardConfig, WalkForwardResult};
use crate::backtest::forward_test::{ForwardTestValidator, HoldoutSplit, split_holdout};
use crate::backtest::metrics::MetricsCalculator;
use crate::backtest::parallel::{CancellationToken, WorkerPool};
use crate::backtest::params::ParameterSpace;
use crate::backtest::search::{ParameterSearchEngine, SearchConfig, SearchError};
use crate::backtest::simulator::{BacktestSimulator, PriceSeries};
use crate::error::WalkForwardError;

/// Runs holdout carve-out, window planning, stitching and the forward test.
pub struct WalkForwardEngine {
    config: WalkForwardConfig,
    search: ParameterSearchEngine,
    validator: ForwardTestValidator,
    cancel: CancellationToken,
}

impl WalkForwardEngine {
    /// Create a new walk-forward engine.
    #[must_use]
    pub fn new(
        config: WalkForwardConfig,
        search_config: SearchConfig,
        simulator: Arc<dyn BacktestSimulator>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        let validator = ForwardTestValidator::new(
            Arc::clone(&simulator),
            Arc::clone(&pool),
            config.forward_test.clone(),
        )
        .with_warmup_bars(config.warmup_bars);
        Self {
            search: ParameterSearchEngine::new(search_config, simulator, pool),
            validator,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `calculator` for every metric snapshot.
    #[must_use]
    pub fn with_calculator(mut self, calculator: MetricsCalculator) -> Self {
        self.search = self.search.with_calculator(calculator);
        self.validator = self.validator.with_calculator(calculator);
        self
    }

    /// Observe `cancel` between search batches and between windows.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.search = self.search.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Access the engine configuration.
    #[must_use]
    pub const fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    /// Search engine used for every window.
    #[must_use]
    pub const fn search_engine(&self) -> &ParameterSearchEngine {
        &self.search
    }

    /// Run the complete analysis.
    ///
    /// When the forward test is enabled the holdout is removed from `series`
    /// before the first window is planned.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration, too little data, a holdout
    /// that leaves nothing to optimize, or cancellation.
    pub fn run(
        &self,
        series: &PriceSeries,
        space: &ParameterSpace,
    ) -> Result<WalkForwardResult, WalkForwardError> {
        self.config.validate()?;
        self.search.config().validate()?;
        space.validate().map_err(SearchError::from)?;
        if series.is_empty() {
            return Err(WalkForwardError::insufficient("price series is empty"));
        }

        let forward_test = &self.config.forward_test;
        let split = if forward_test.enabled {
            split_holdout(series, forward_test.holdout_days)?
        } else {
            HoldoutSplit::none(series.len())
        };

        info!(
            bars = series.len(),
            optimization_bars = split.optimization_end,
            holdout_bars = split.holdout_end - split.optimization_end,
            mode = ?self.config.mode,
            is_days = self.config.is_period_days,
            "Starting walk-forward run"
        );

        let outcome = WindowPlanner::new(&self.config, &self.search)
            .with_cancellation(self.cancel.clone())
            .plan(series, split.optimization_end, space)?;

        let Some(last) = outcome.windows.last() else {
            return Err(WalkForwardError::insufficient(format!(
                "all {} windows failed",
                outcome.failed.len()
            )));
        };
        if !outcome.failed.is_empty() {
            warn!(
                failed = outcome.failed.len(),
                succeeded = outcome.windows.len(),
                "Some windows were skipped"
            );
        }

        let segments: Vec<OOSSegment> = outcome.windows.iter().map(|w| w.segment.clone()).collect();
        let stitched = OOSStitcher::new().stitch(&segments);

        let forward_test = if forward_test.enabled {
            if self.cancel.is_cancelled() {
                return Err(WalkForwardError::Cancelled);
            }
            Some(self.validator.validate(
                series,
                &split,
                &last.search.trials,
                last.window.bounds.is_days(),
            )?)
        } else {
            None
        };

        info!(
            windows = stitched.total_windows,
            failed = outcome.failed.len(),
            net_profit_pct = stitched.net_profit_pct,
            max_drawdown_pct = ?stitched.max_drawdown_pct,
            worst_wfe_pct = ?stitched.worst_wfe_pct,
            total_trades = stitched.total_trades,
            wfe_pct = ?stitched.wfe_pct,
            profitable_windows = stitched.profitable_windows,
            "Walk-forward run complete"
        );

        Ok(WalkForwardResult {
            config: self.config.clone(),
            windows: outcome.windows,
            failed_windows: outcome.failed,
            stitched,
            forward_test,
        })
    }
}
