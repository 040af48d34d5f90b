//! Plan preview settings for the binary.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::RunConfig;
use crate::backtest::coverage::{CoverageRequirements, CoverageScheduler};
use crate::backtest::forward_test::{HoldoutSplit, split_holdout};
use crate::backtest::params::ParamSet;
use crate::backtest::search::SearchError;
use crate::backtest::simulator::{Bar, PriceSeries, SimulationError};
use crate::backtest::walkforward::{WindowBounds, WindowMode, fixed_layout};
use crate::error::WalkForwardError;

/// Days from the Unix epoch to 2025-01-01.
const DEFAULT_START_DAYS: i64 = 20_089;

/// Synthetic bar grid used to preview the window layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// First bar timestamp.
    pub start: DateTime<Utc>,
    /// Last bar timestamp (inclusive).
    pub end: DateTime<Utc>,
    /// Bar spacing in minutes.
    pub bar_minutes: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let start = DateTime::UNIX_EPOCH + Duration::days(DEFAULT_START_DAYS);
        Self {
            start,
            end: start + Duration::days(364),
            bar_minutes: 1440,
        }
    }
}

impl PreviewConfig {
    /// Flat bars from `start` through `end` spaced `bar_minutes` apart.
    ///
    /// # Errors
    ///
    /// Returns an error if the grid is not strictly increasing. A zero
    /// `bar_minutes` yields a single bar.
    pub fn series(&self) -> Result<PriceSeries, SimulationError> {
        let step = Duration::minutes(i64::from(self.bar_minutes));
        let mut bars = Vec::new();
        let mut ts = self.start;
        while ts <= self.end {
            bars.push(Bar::flat(ts, 100.0));
            if step <= Duration::zero() {
                break;
            }
            ts += step;
        }
        PriceSeries::new(bars)
    }
}

/// Deterministic part of a run that needs no simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPreview {
    /// Window sizing mode.
    pub mode: WindowMode,
    /// Bars in the preview grid.
    pub bars: usize,
    /// Holdout carved from the end of the grid.
    pub holdout: HoldoutSplit,
    /// Categorical coverage requirements.
    pub coverage: CoverageRequirements,
    /// Coverage trials every window search starts with.
    pub initial_trials: Vec<ParamSet>,
    /// Window layout; adaptive windows depend on simulation and are omitted.
    pub windows: Option<Vec<WindowBounds>>,
}

impl PlanPreview {
    /// Build the preview for `config` over its preview grid.
    ///
    /// # Errors
    ///
    /// Returns an error when the grid cannot hold the holdout or two fixed
    /// windows, or the parameter space has nothing to optimize.
    pub fn build(config: &RunConfig) -> Result<Self, WalkForwardError> {
        let series = config
            .preview
            .series()
            .map_err(|e| WalkForwardError::InvalidConfig(e.to_string()))?;
        let walk_forward = &config.walk_forward;

        let holdout = if walk_forward.forward_test.enabled {
            split_holdout(&series, walk_forward.forward_test.holdout_days)?
        } else {
            HoldoutSplit::none(series.len())
        };

        let coverage =
            CoverageScheduler::requirements(&config.parameters).map_err(SearchError::from)?;
        let n_initial = config
            .search
            .initial_trials
            .unwrap_or(coverage.n_rec)
            .min(config.search.budget.max_trials);
        let initial_trials = CoverageScheduler::new()
            .generate_initial_trials(&config.parameters, n_initial)
            .map_err(SearchError::from)?;

        let windows = match walk_forward.mode {
            WindowMode::Fixed => Some(fixed_layout(
                &series,
                holdout.optimization_end,
                walk_forward.is_period_days,
                walk_forward.oos_period_days,
            )?),
            WindowMode::Adaptive => None,
        };

        Ok(Self {
            mode: walk_forward.mode,
            bars: series.len(),
            holdout,
            coverage,
            initial_trials,
            windows,
        })
    }
}
