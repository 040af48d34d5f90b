//! Statistical math utilities for performance metric calculations.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, Utc};

use super::constants::{HUNDRED, TOLERANCE};

/// Calculate mean of a slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Calculate sample standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let avg = mean(values)?;
    let variance_sum: f64 = values.iter().map(|v| (v - avg) * (v - avg)).sum();
    Some((variance_sum / (values.len() - 1) as f64).sqrt())
}

/// Calculate downside deviation (only negative returns, over the full count).
pub fn downside_deviation(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let variance_sum: f64 = values.iter().filter(|v| **v < 0.0).map(|v| v * v).sum();
    Some((variance_sum / values.len() as f64).sqrt())
}

/// Median of finite values, `None` if there are none.
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(f64::midpoint(sorted[mid - 1], sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

/// Drawdown from the running peak at every point, in percent.
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&value| {
            peak = peak.max(value);
            if peak > TOLERANCE {
                (peak - value) / peak * HUNDRED
            } else {
                0.0
            }
        })
        .collect()
}

/// Largest peak-to-trough decline in percent, `None` for an empty curve.
pub fn max_drawdown_pct(equity: &[f64]) -> Option<f64> {
    drawdown_series(equity).into_iter().reduce(f64::max)
}

/// Net profit of an equity curve in percent.
pub fn net_profit_pct(equity: &[f64]) -> f64 {
    match equity {
        [first, .., last] if first.abs() > TOLERANCE => (last / first - 1.0) * HUNDRED,
        _ => 0.0,
    }
}

/// Monthly returns as fractions.
///
/// The curve is sampled at the last point of each calendar month; the very
/// first point is the opening value. A first month holding only the opening
/// point contributes no return.
pub fn monthly_returns(equity: &[f64], timestamps: &[DateTime<Utc>]) -> Vec<f64> {
    let len = equity.len().min(timestamps.len());
    if len == 0 {
        return Vec::new();
    }

    // (index, value) of each month's last point
    let mut closes: Vec<(usize, f64)> = Vec::new();
    let mut current_month = None;
    for (i, (value, ts)) in equity[..len].iter().zip(&timestamps[..len]).enumerate() {
        let month = (ts.year(), ts.month());
        if current_month == Some(month) {
            if let Some(last) = closes.last_mut() {
                *last = (i, *value);
            }
        } else {
            closes.push((i, *value));
            current_month = Some(month);
        }
    }

    let mut previous = equity[0];
    let mut returns = Vec::with_capacity(closes.len());
    for (index, close) in closes {
        if index == 0 {
            continue;
        }
        if previous.abs() > TOLERANCE {
            returns.push(close / previous - 1.0);
        }
        previous = close;
    }
    returns
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10.0, 20.0, 30.0, 40.0]), Some(25.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        let Some(std) = std_dev(&[10.0, 20.0, 30.0, 40.0]) else {
            panic!("std_dev should succeed for non-empty values");
        };
        // Expected std dev ~ 12.9
        assert!(std > 12.0 && std < 14.0);
        assert_eq!(std_dev(&[1.0]), None);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn test_max_drawdown() {
        let curve = [100.0, 120.0, 90.0, 130.0, 117.0];
        assert!(max_drawdown_pct(&curve).is_some_and(|dd| (dd - 25.0).abs() < 1e-9));
        assert_eq!(max_drawdown_pct(&[100.0]), Some(0.0));
        assert_eq!(max_drawdown_pct(&[]), None);
    }

    #[test]
    fn test_monthly_returns_use_month_end() {
        let ts = [
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap(),
        ];
        let equity = [100.0, 110.0, 105.0, 99.0];

        let returns = monthly_returns(&equity, &ts);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.10).abs() < 1e-12);
        assert!((returns[1] - (99.0 / 110.0 - 1.0)).abs() < 1e-12);
    }
}
