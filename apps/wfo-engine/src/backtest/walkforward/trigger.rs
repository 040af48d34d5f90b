//! Re-optimization triggers for adaptive windows.
//!
//! The detector is built from the IS behaviour of the chosen parameters and
//! then polled as OOS trades accumulate. Checks run in a fixed order (CUSUM,
//! drawdown, inactivity) and the first one that fires wins.

use serde::{Deserialize, Serialize};

use super::types::{AdaptiveConfig, DetectedTrigger};
use crate::backtest::metrics::{max_drawdown_pct, mean, std_dev};
use crate::backtest::simulator::SimulationResult;

/// IS statistics the OOS behaviour is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IsBaseline {
    /// Mean IS trade return in percent.
    pub return_mean: Option<f64>,
    /// Sample standard deviation of IS trade returns.
    pub return_std: Option<f64>,
    /// IS max drawdown in percent; `None` without an IS equity curve.
    pub max_drawdown_pct: Option<f64>,
    /// IS trades per tradable bar.
    pub trades_per_bar: f64,
}

impl IsBaseline {
    /// Baseline from an IS simulation over `trading_bars` bars.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_simulation(sim: &SimulationResult, trading_bars: usize) -> Self {
        let returns: Vec<f64> = sim.trades.iter().map(|t| t.return_pct).collect();
        let trades_per_bar = if trading_bars == 0 {
            0.0
        } else {
            returns.len() as f64 / trading_bars as f64
        };
        Self {
            return_mean: mean(&returns),
            return_std: std_dev(&returns),
            max_drawdown_pct: max_drawdown_pct(&sim.equity_curve),
            trades_per_bar,
        }
    }
}

/// Decides whether an adaptive OOS window should close.
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    config: AdaptiveConfig,
    baseline: IsBaseline,
}

impl TriggerDetector {
    /// Create a detector for one window.
    #[must_use]
    pub fn new(config: &AdaptiveConfig, baseline: IsBaseline) -> Self {
        Self {
            config: config.clone(),
            baseline,
        }
    }

    /// The IS baseline in use.
    #[must_use]
    pub const fn baseline(&self) -> &IsBaseline {
        &self.baseline
    }

    /// Poll the detector.
    ///
    /// * `oos_returns` - return of every OOS trade so far, in exit order
    /// * `oos_drawdown_pct` - OOS max drawdown so far, `None` before the
    ///   first OOS bar
    /// * `recent_trades` - trades in the inactivity lookback
    /// * `recent_bars` - bars spanned by those trades
    #[must_use]
    pub fn evaluate(
        &self,
        oos_returns: &[f64],
        oos_drawdown_pct: Option<f64>,
        recent_trades: usize,
        recent_bars: usize,
    ) -> Option<DetectedTrigger> {
        if self.config.cusum_enabled && self.cusum_fired(oos_returns) {
            return Some(DetectedTrigger::Cusum);
        }
        if self.config.drawdown_enabled && self.drawdown_fired(oos_drawdown_pct) {
            return Some(DetectedTrigger::Drawdown);
        }
        if self.config.inactivity_enabled && self.inactivity_fired(recent_trades, recent_bars) {
            return Some(DetectedTrigger::Inactivity);
        }
        None
    }

    /// Standardized cumulative sum of OOS trade returns.
    #[must_use]
    pub fn cusum(&self, oos_returns: &[f64]) -> Option<f64> {
        let mu = self.baseline.return_mean?;
        let sigma = self.baseline.return_std.filter(|s| *s > 0.0)?;
        Some(oos_returns.iter().map(|r| (r - mu) / sigma).sum())
    }

    fn cusum_fired(&self, oos_returns: &[f64]) -> bool {
        self.cusum(oos_returns)
            .is_some_and(|s| s.abs() > self.config.cusum_threshold)
    }

    fn drawdown_fired(&self, oos_drawdown_pct: Option<f64>) -> bool {
        match (self.baseline.max_drawdown_pct, oos_drawdown_pct) {
            (Some(is_dd), Some(oos_dd)) if is_dd > 0.0 => {
                oos_dd > is_dd * self.config.dd_threshold_multiplier
            }
            _ => false,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn inactivity_fired(&self, recent_trades: usize, recent_bars: usize) -> bool {
        let expected = self.baseline.trades_per_bar;
        if expected <= 0.0 || recent_bars == 0 {
            return false;
        }
        let rate = recent_trades as f64 / recent_bars as f64;
        rate < expected / self.config.inactivity_multiplier
    }
}
