//! Constants for performance metric calculations.

pub const HUNDRED: f64 = 100.0;
pub const DAYS_PER_YEAR: f64 = 365.0;
pub const MONTHS_PER_YEAR: f64 = 12.0;
/// Annual risk-free rate used by Sharpe and Sortino.
pub const RISK_FREE_RATE: f64 = 0.02;
/// Spans at or below this many days are not annualized.
pub const MIN_ANNUALIZE_DAYS: f64 = 30.0;
pub const MIN_CONSISTENCY_MONTHS: usize = 3;
pub const TOLERANCE: f64 = 1e-12;
