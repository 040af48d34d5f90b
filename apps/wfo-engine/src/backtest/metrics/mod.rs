//! Performance metrics calculation for simulation results.
//!
//! Implements the metrics objectives and constraints can refer to:
//! - Net profit and maximum drawdown of the equity curve
//! - Trade counts and win rate
//! - Sharpe and Sortino ratios from calendar-month returns
//! - RoMaD, profit factor, Ulcer Index, and monthly consistency
//!
//! Degenerate inputs produce `None` instead of sentinel values.

mod calculator;
mod constants;
mod math;
mod types;

pub use calculator::{MetricsCalculator, annualize, linear_annual_rate};
pub use math::{max_drawdown_pct, mean, median, net_profit_pct, std_dev};
pub use types::{AdvancedMetrics, BasicMetrics, MetricKey, MetricSnapshot};
