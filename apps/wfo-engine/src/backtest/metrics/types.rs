//! Core types for backtest performance metrics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Trade and equity statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicMetrics {
    /// Net profit over the run in percent.
    pub net_profit_pct: f64,
    /// Maximum drawdown in percent of the running peak; `None` without an
    /// equity curve.
    pub max_drawdown_pct: Option<f64>,
    /// Closed trades.
    pub total_trades: usize,
    /// Trades with positive net P&L.
    pub winning_trades: usize,
    /// Trades with negative net P&L.
    pub losing_trades: usize,
    /// Winning trades in percent of all trades.
    pub win_rate: f64,
    /// Sum of winning trade P&L.
    pub gross_profit: f64,
    /// Absolute sum of losing trade P&L.
    pub gross_loss: f64,
}

/// Risk-adjusted statistics; `None` when the input is degenerate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvancedMetrics {
    /// Annualized Sharpe ratio from monthly returns.
    pub sharpe: Option<f64>,
    /// Annualized Sortino ratio from monthly returns.
    pub sortino: Option<f64>,
    /// Return over maximum drawdown.
    pub romad: Option<f64>,
    /// Gross profit / gross loss.
    pub profit_factor: Option<f64>,
    /// Root mean square drawdown.
    pub ulcer_index: Option<f64>,
    /// Profitable months in percent.
    pub consistency_score: Option<f64>,
}

/// Basic and advanced metrics of one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    /// Basic metrics.
    pub basic: BasicMetrics,
    /// Advanced metrics.
    pub advanced: AdvancedMetrics,
}

impl MetricSnapshot {
    /// Look up a metric by key.
    #[must_use]
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        let value = match key {
            MetricKey::NetProfitPct => Some(self.basic.net_profit_pct),
            MetricKey::MaxDrawdownPct => self.basic.max_drawdown_pct,
            MetricKey::TotalTrades => Some(self.basic.total_trades as f64),
            MetricKey::WinRate => Some(self.basic.win_rate),
            MetricKey::Sharpe => self.advanced.sharpe,
            MetricKey::Sortino => self.advanced.sortino,
            MetricKey::Romad => self.advanced.romad,
            MetricKey::ProfitFactor => self.advanced.profit_factor,
            MetricKey::UlcerIndex => self.advanced.ulcer_index,
            MetricKey::ConsistencyScore => self.advanced.consistency_score,
        };
        value.filter(|v| v.is_finite())
    }
}

/// Metrics that objectives and constraints can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    /// Net profit percent.
    NetProfitPct,
    /// Max drawdown percent.
    MaxDrawdownPct,
    /// Trade count.
    TotalTrades,
    /// Win rate percent.
    WinRate,
    /// Sharpe ratio.
    Sharpe,
    /// Sortino ratio.
    Sortino,
    /// Return over max drawdown.
    Romad,
    /// Profit factor.
    ProfitFactor,
    /// Ulcer index.
    UlcerIndex,
    /// Consistency score.
    ConsistencyScore,
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NetProfitPct => "net_profit_pct",
            Self::MaxDrawdownPct => "max_drawdown_pct",
            Self::TotalTrades => "total_trades",
            Self::WinRate => "win_rate",
            Self::Sharpe => "sharpe",
            Self::Sortino => "sortino",
            Self::Romad => "romad",
            Self::ProfitFactor => "profit_factor",
            Self::UlcerIndex => "ulcer_index",
            Self::ConsistencyScore => "consistency_score",
        };
        f.write_str(name)
    }
}
