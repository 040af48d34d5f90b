//! Boundary types for the external backtest simulator.
//!
//! The engine never simulates a strategy itself. It hands a read-only price
//! series, a bar range, and a parameter set to a [`BacktestSimulator`] and
//! consumes the trade list and equity curve that come back.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::params::ParamSet;

/// A single OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time.
    pub timestamp: DateTime<Utc>,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
}

impl Bar {
    /// Create a flat bar where every price equals `price`.
    #[must_use]
    pub const fn flat(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }
}

/// Time-ordered price series, shared read-only across workers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Create a series from bars.
    ///
    /// # Errors
    ///
    /// Returns an error if timestamps are not strictly increasing.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SimulationError> {
        if let Some(pos) = bars
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(SimulationError::InvalidData(format!(
                "timestamps must be strictly increasing (bar {} at {})",
                pos + 1,
                bars[pos + 1].timestamp
            )));
        }
        Ok(Self { bars })
    }

    /// All bars.
    #[must_use]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Number of bars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series has no bars.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Timestamp of bar `index`.
    #[must_use]
    pub fn timestamp(&self, index: usize) -> Option<DateTime<Utc>> {
        self.bars.get(index).map(|b| b.timestamp)
    }

    /// Index of the first bar whose timestamp is at or after `ts`
    /// (`len()` if none).
    #[must_use]
    pub fn first_at_or_after(&self, ts: DateTime<Utc>) -> usize {
        self.bars.partition_point(|b| b.timestamp < ts)
    }

    /// Index of the bar with timestamp exactly `ts`, or the last bar before it.
    #[must_use]
    pub fn last_at_or_before(&self, ts: DateTime<Utc>) -> Option<usize> {
        self.bars.partition_point(|b| b.timestamp <= ts).checked_sub(1)
    }

    /// Spacing between the last two bars, used to close the final bar's span.
    #[must_use]
    pub fn bar_interval(&self) -> Duration {
        match self.bars.as_slice() {
            [.., prev, last] => last.timestamp - prev.timestamp,
            _ => Duration::days(1),
        }
    }

    /// Exclusive end of the bar at `index`: the next bar's timestamp, or the
    /// final bar plus one bar interval.
    #[must_use]
    pub fn bar_end(&self, index: usize) -> Option<DateTime<Utc>> {
        match self.bars.get(index + 1) {
            Some(next) => Some(next.timestamp),
            None => self.timestamp(index).map(|ts| ts + self.bar_interval()),
        }
    }

    /// Exclusive end of the whole dataset.
    #[must_use]
    pub fn end_exclusive(&self) -> Option<DateTime<Utc>> {
        self.len().checked_sub(1).and_then(|last| self.bar_end(last))
    }
}

/// Bar index range handed to the simulator.
///
/// Bars in `warmup_start..trade_start` feed indicators only; trades may open
/// in `trade_start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRange {
    /// First bar used for indicator warmup.
    pub warmup_start: usize,
    /// First bar on which trading is allowed.
    pub trade_start: usize,
    /// Exclusive end bar.
    pub end: usize,
}

impl BarRange {
    /// Range without warmup.
    #[must_use]
    pub const fn new(trade_start: usize, end: usize) -> Self {
        Self {
            warmup_start: trade_start,
            trade_start,
            end,
        }
    }

    /// Range with up to `warmup_bars` of lookback before `trade_start`.
    #[must_use]
    pub const fn with_warmup(trade_start: usize, end: usize, warmup_bars: usize) -> Self {
        Self {
            warmup_start: trade_start.saturating_sub(warmup_bars),
            trade_start,
            end,
        }
    }

    /// Offset of the first tradable bar from the first bar handed over.
    #[must_use]
    pub const fn trade_start_offset(&self) -> usize {
        self.trade_start - self.warmup_start
    }

    /// Number of tradable bars.
    #[must_use]
    pub const fn trading_bars(&self) -> usize {
        self.end.saturating_sub(self.trade_start)
    }

    /// Whether the tradable part is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.trading_bars() == 0
    }
}

/// A closed trade produced by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Entry time.
    pub entry_time: DateTime<Utc>,
    /// Exit time.
    pub exit_time: DateTime<Utc>,
    /// Net profit or loss in account currency.
    pub net_pnl: f64,
    /// Net return of the trade in percent.
    pub return_pct: f64,
}

impl Trade {
    /// Whether this trade made money.
    #[must_use]
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}

/// Output of one simulator run.
///
/// `equity_curve[i]` is the account equity at `timestamps[i]`. All positions
/// are closed by the last timestamp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Closed trades ordered by exit time.
    pub trades: Vec<Trade>,
    /// Equity per bar.
    pub equity_curve: Vec<f64>,
    /// Bar timestamps matching `equity_curve`.
    pub timestamps: Vec<DateTime<Utc>>,
}

impl SimulationResult {
    /// Keep only the part of the result at or before `cutoff`.
    #[must_use]
    pub fn truncated(&self, cutoff: DateTime<Utc>) -> Self {
        let keep = self.timestamps.partition_point(|ts| *ts <= cutoff);
        Self {
            trades: self
                .trades
                .iter()
                .filter(|t| t.exit_time <= cutoff)
                .cloned()
                .collect(),
            equity_curve: self.equity_curve[..keep.min(self.equity_curve.len())].to_vec(),
            timestamps: self.timestamps[..keep].to_vec(),
        }
    }
}

/// Simulator failures. Recovered per trial or per window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    /// The requested range has no tradable bars.
    #[error("Empty simulation range {start}..{end}")]
    EmptyRange {
        /// First tradable bar.
        start: usize,
        /// Exclusive end bar.
        end: usize,
    },

    /// Input data is unusable.
    #[error("Invalid price data: {0}")]
    InvalidData(String),

    /// The strategy itself failed.
    #[error("Strategy failed: {0}")]
    Strategy(String),
}

/// External strategy simulator.
///
/// Implementations must be deterministic for identical inputs and must close
/// any open position at `range.end`.
#[cfg_attr(test, mockall::automock)]
pub trait BacktestSimulator: Send + Sync {
    /// Simulate `params` over `range` of `series`.
    fn run(
        &self,
        series: &PriceSeries,
        range: BarRange,
        params: &ParamSet,
    ) -> Result<SimulationResult, SimulationError>;
}
