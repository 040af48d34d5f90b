//! Holdout carve-out.
//!
//! The holdout must be removed before any window is planned so no search ever
//! sees it. Callers split first and hand only `..optimization_end` to the
//! planner.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::backtest::simulator::{BarRange, PriceSeries};
use crate::backtest::walkforward::span_days;
use crate::error::WalkForwardError;

/// Split of a series into an optimization part and a trailing holdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldoutSplit {
    /// Exclusive end bar of the optimization part; first holdout bar.
    pub optimization_end: usize,
    /// Exclusive end bar of the holdout.
    pub holdout_end: usize,
}

impl HoldoutSplit {
    /// No holdout: everything is optimized.
    #[must_use]
    pub const fn none(len: usize) -> Self {
        Self {
            optimization_end: len,
            holdout_end: len,
        }
    }

    /// Whether a holdout exists.
    #[must_use]
    pub const fn has_holdout(&self) -> bool {
        self.holdout_end > self.optimization_end
    }

    /// Holdout bars with up to `warmup_bars` of lookback from the optimization
    /// part.
    #[must_use]
    pub const fn holdout_range(&self, warmup_bars: usize) -> BarRange {
        BarRange::with_warmup(self.optimization_end, self.holdout_end, warmup_bars)
    }

    /// First holdout timestamp and exclusive holdout end.
    #[must_use]
    pub fn holdout_span(&self, series: &PriceSeries) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        if !self.has_holdout() {
            return None;
        }
        let start = series.timestamp(self.optimization_end)?;
        let end = series.bar_end(self.holdout_end - 1)?;
        Some((start, end))
    }
}

/// Carve the last `holdout_days` off `series`.
///
/// # Errors
///
/// Returns [`WalkForwardError::HoldoutTooLong`] when the holdout would cover
/// the whole series, and [`WalkForwardError::InvalidConfig`] when it is
/// shorter than one bar.
pub fn split_holdout(
    series: &PriceSeries,
    holdout_days: u32,
) -> Result<HoldoutSplit, WalkForwardError> {
    let (Some(start), Some(end)) = (series.timestamp(0), series.end_exclusive()) else {
        return Err(WalkForwardError::insufficient("price series is empty"));
    };
    if holdout_days == 0 {
        return Ok(HoldoutSplit::none(series.len()));
    }

    let available_days = span_days(start, end);
    if f64::from(holdout_days) >= available_days {
        return Err(WalkForwardError::HoldoutTooLong {
            holdout_days,
            available_days,
        });
    }

    let holdout_start = series.first_at_or_after(end - Duration::days(i64::from(holdout_days)));
    if holdout_start >= series.len() {
        return Err(WalkForwardError::InvalidConfig(format!(
            "holdout of {holdout_days} days is shorter than one bar"
        )));
    }

    Ok(HoldoutSplit {
        optimization_end: holdout_start,
        holdout_end: series.len(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::backtest::simulator::Bar;

    fn daily(n: usize) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        PriceSeries::new(
            (0..n)
                .map(|i| Bar::flat(start + Duration::days(i as i64), 100.0))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_split_from_end() {
        let series = daily(365);
        let split = split_holdout(&series, 30).unwrap();
        assert_eq!(split.optimization_end, 335);
        assert_eq!(split.holdout_end, 365);

        let Some((start, end)) = split.holdout_span(&series) else {
            panic!("holdout should have a span");
        };
        assert_eq!(span_days(start, end), 30.0);

        let range = split.holdout_range(10);
        assert_eq!(range.warmup_start, 325);
        assert_eq!(range.trade_start, 335);
    }

    #[test]
    fn test_zero_days_is_no_holdout() {
        let split = split_holdout(&daily(10), 0).unwrap();
        assert!(!split.has_holdout());
        assert_eq!(split.optimization_end, 10);
    }

    #[test]
    fn test_holdout_too_long() {
        let err = split_holdout(&daily(100), 100).unwrap_err();
        assert!(matches!(
            err,
            WalkForwardError::HoldoutTooLong {
                holdout_days: 100,
                ..
            }
        ));
    }

    #[test]
    fn test_holdout_shorter_than_a_bar() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let weekly = PriceSeries::new(
            (0..20)
                .map(|i| Bar::flat(start + Duration::weeks(i), 100.0))
                .collect(),
        )
        .unwrap();
        assert!(matches!(
            split_holdout(&weekly, 3),
            Err(WalkForwardError::InvalidConfig(_))
        ));
    }
}
