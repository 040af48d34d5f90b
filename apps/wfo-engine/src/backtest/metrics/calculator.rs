//! Performance calculator for simulation results.

use super::constants::{
    DAYS_PER_YEAR, HUNDRED, MIN_ANNUALIZE_DAYS, MIN_CONSISTENCY_MONTHS, MONTHS_PER_YEAR,
    RISK_FREE_RATE, TOLERANCE,
};
use super::math::{
    downside_deviation, drawdown_series, max_drawdown_pct, mean, monthly_returns, net_profit_pct,
    std_dev,
};
use super::types::{AdvancedMetrics, BasicMetrics, MetricSnapshot};
use crate::backtest::simulator::SimulationResult;

/// Stateless metrics calculator.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCalculator {
    risk_free_rate: f64,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self {
            risk_free_rate: RISK_FREE_RATE,
        }
    }
}

impl MetricsCalculator {
    /// Create a calculator with the default 2% annual risk-free rate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the annual risk-free rate used by Sharpe/Sortino.
    #[must_use]
    pub const fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    /// Basic and advanced metrics in one pass.
    #[must_use]
    pub fn snapshot(&self, sim: &SimulationResult) -> MetricSnapshot {
        let basic = self.basic(sim);
        let advanced = self.advanced_with(sim, &basic);
        MetricSnapshot { basic, advanced }
    }

    /// Net profit, drawdown, and trade statistics.
    #[must_use]
    pub fn basic(&self, sim: &SimulationResult) -> BasicMetrics {
        let (mut gross_profit, mut gross_loss) = (0.0, 0.0);
        let (mut winning_trades, mut losing_trades) = (0, 0);
        for trade in &sim.trades {
            if trade.net_pnl > 0.0 {
                gross_profit += trade.net_pnl;
                winning_trades += 1;
            } else if trade.net_pnl < 0.0 {
                gross_loss += trade.net_pnl.abs();
                losing_trades += 1;
            }
        }

        let total_trades = sim.trades.len();
        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * HUNDRED
        } else {
            0.0
        };

        BasicMetrics {
            net_profit_pct: net_profit_pct(&sim.equity_curve),
            max_drawdown_pct: max_drawdown_pct(&sim.equity_curve),
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            gross_profit,
            gross_loss,
        }
    }

    /// Sharpe, Sortino, RoMaD, profit factor, Ulcer Index, and consistency.
    #[must_use]
    pub fn advanced(&self, sim: &SimulationResult) -> AdvancedMetrics {
        self.advanced_with(sim, &self.basic(sim))
    }

    fn advanced_with(&self, sim: &SimulationResult, basic: &BasicMetrics) -> AdvancedMetrics {
        let monthly = monthly_returns(&sim.equity_curve, &sim.timestamps);
        let monthly_rf = self.risk_free_rate / MONTHS_PER_YEAR;
        let excess = mean(&monthly).map(|m| m - monthly_rf);
        let annualizer = MONTHS_PER_YEAR.sqrt();

        let sharpe = match (excess, std_dev(&monthly)) {
            (Some(excess), Some(std)) if std > TOLERANCE => Some(excess / std * annualizer),
            _ => None,
        };

        let sortino = if monthly.len() >= 2 && monthly.iter().any(|r| *r < 0.0) {
            match (excess, downside_deviation(&monthly)) {
                (Some(excess), Some(dd)) if dd > TOLERANCE => Some(excess / dd * annualizer),
                _ => None,
            }
        } else {
            None
        };

        let romad = basic
            .max_drawdown_pct
            .filter(|dd| *dd > TOLERANCE)
            .map(|dd| basic.net_profit_pct / dd);

        let profit_factor =
            (basic.gross_loss > TOLERANCE).then(|| basic.gross_profit / basic.gross_loss);

        let drawdowns = drawdown_series(&sim.equity_curve);
        let ulcer_index = mean(&drawdowns.iter().map(|d| d * d).collect::<Vec<_>>()).map(f64::sqrt);

        let consistency_score = (monthly.len() >= MIN_CONSISTENCY_MONTHS).then(|| {
            let profitable = monthly.iter().filter(|r| **r > 0.0).count();
            profitable as f64 / monthly.len() as f64 * HUNDRED
        });

        AdvancedMetrics {
            sharpe,
            sortino,
            romad,
            profit_factor,
            ulcer_index,
            consistency_score,
        }
    }
}

/// Compound annual growth rate of `profit_pct` earned over `days`.
///
/// Unavailable for spans of 30 days or less and for total losses.
#[must_use]
pub fn annualize(profit_pct: f64, days: f64) -> Option<f64> {
    let growth = 1.0 + profit_pct / HUNDRED;
    if days <= MIN_ANNUALIZE_DAYS || growth <= 0.0 || !growth.is_finite() {
        return None;
    }
    let cagr = (growth.powf(DAYS_PER_YEAR / days) - 1.0) * HUNDRED;
    cagr.is_finite().then_some(cagr)
}

/// Simple (non-compounded) annual rate of `profit_pct` earned over `days`.
#[must_use]
pub fn linear_annual_rate(profit_pct: f64, days: f64) -> Option<f64> {
    (days > 0.0).then(|| profit_pct * DAYS_PER_YEAR / days)
}
