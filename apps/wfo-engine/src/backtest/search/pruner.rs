//! Median pruning for single-objective searches.

use serde::{Deserialize, Serialize};

use super::types::{Direction, SearchError};
use crate::backtest::metrics::median;
use crate::backtest::simulator::BarRange;

/// Median pruner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningConfig {
    /// Whether pruning is on. Ignored for multi-objective searches.
    pub enabled: bool,
    /// Trials that must report before pruning starts.
    pub n_startup_trials: usize,
    /// Leading share of the IS slice simulated for the intermediate report.
    pub report_fraction: f64,
}

impl Default for PruningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            n_startup_trials: 5,
            report_fraction: 0.5,
        }
    }
}

impl PruningConfig {
    pub(crate) fn validate(&self) -> Result<(), SearchError> {
        if !(self.report_fraction > 0.0 && self.report_fraction < 1.0) {
            return Err(SearchError::InvalidConfig(format!(
                "pruning.report_fraction must be in (0, 1), got {}",
                self.report_fraction
            )));
        }
        Ok(())
    }
}

/// Prunes trials whose intermediate objective is worse than the median of
/// earlier reports.
#[derive(Debug, Clone, Copy)]
pub struct MedianPruner {
    n_startup_trials: usize,
    direction: Direction,
}

impl MedianPruner {
    /// Create a pruner for a single objective.
    #[must_use]
    pub const fn new(n_startup_trials: usize, direction: Direction) -> Self {
        Self {
            n_startup_trials,
            direction,
        }
    }

    /// Decide on a trial given the intermediate values reported by earlier
    /// trials. An unavailable intermediate value is pruned once pruning is
    /// active.
    #[must_use]
    pub fn should_prune(&self, intermediate: Option<f64>, reported: &[f64]) -> bool {
        if reported.len() < self.n_startup_trials {
            return false;
        }
        let Some(median) = median(reported) else {
            return false;
        };
        self.direction.score(intermediate) < self.direction.score(Some(median))
    }
}

/// Leading `fraction` of the tradable part of `range` (at least one bar).
#[must_use]
pub fn partial_range(range: BarRange, fraction: f64) -> BarRange {
    let bars = range.trading_bars();
    let keep = ((bars as f64 * fraction).ceil() as usize).clamp(1, bars.max(1));
    BarRange {
        end: range.trade_start + keep,
        ..range
    }
}
