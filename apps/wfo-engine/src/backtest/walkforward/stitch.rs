//! Stitching of per-window OOS results into one continuous curve.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backtest::metrics::{annualize, max_drawdown_pct, median, net_profit_pct};
use crate::backtest::simulator::SimulationResult;

/// OOS result of one window, ready to stitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OOSSegment {
    /// Window number.
    pub window_index: usize,
    /// OOS equity per bar.
    pub equity_curve: Vec<f64>,
    /// Timestamps matching `equity_curve`.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Trades closed in the OOS window.
    pub trade_count: usize,
    /// OOS net profit in percent.
    pub net_profit_pct: f64,
    /// OOS max drawdown in percent.
    pub max_drawdown_pct: Option<f64>,
    /// IS net profit of the chosen parameters in percent.
    pub is_net_profit_pct: f64,
    /// IS span in days.
    pub is_span_days: f64,
    /// OOS span in days.
    pub oos_span_days: f64,
}

impl OOSSegment {
    /// Segment from an OOS simulation.
    #[must_use]
    pub fn from_simulation(
        window_index: usize,
        oos: &SimulationResult,
        is_net_profit_pct: f64,
        is_span_days: f64,
        oos_span_days: f64,
    ) -> Self {
        Self {
            window_index,
            net_profit_pct: net_profit_pct(&oos.equity_curve),
            max_drawdown_pct: max_drawdown_pct(&oos.equity_curve),
            equity_curve: oos.equity_curve.clone(),
            timestamps: oos.timestamps.clone(),
            trade_count: oos.trades.len(),
            is_net_profit_pct,
            is_span_days,
            oos_span_days,
        }
    }

    /// Walk-forward efficiency of this window in percent.
    ///
    /// OOS profit per day over IS profit per day; `None` unless the IS profit
    /// is positive and both spans are non-empty.
    #[must_use]
    pub fn wfe_pct(&self) -> Option<f64> {
        if self.is_net_profit_pct <= 0.0 || self.is_span_days <= 0.0 || self.oos_span_days <= 0.0
        {
            return None;
        }
        let oos_rate = self.net_profit_pct / self.oos_span_days;
        let is_rate = self.is_net_profit_pct / self.is_span_days;
        Some(oos_rate / is_rate * 100.0)
    }
}

/// Continuous OOS performance across all windows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StitchedResult {
    /// Stitched equity curve.
    pub equity_curve: Vec<f64>,
    /// Timestamps matching `equity_curve`.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Net profit of the stitched curve in percent.
    pub net_profit_pct: f64,
    /// Max drawdown of the stitched curve in percent.
    pub max_drawdown_pct: Option<f64>,
    /// CAGR of the stitched curve; `None` for short or wiped-out runs.
    pub annualized_profit_pct: Option<f64>,
    /// Sum of OOS trades over all windows.
    pub total_trades: usize,
    /// Median per-window WFE.
    pub wfe_pct: Option<f64>,
    /// Lowest per-window WFE.
    pub worst_wfe_pct: Option<f64>,
    /// Per-window WFE in window order.
    pub window_wfe_pct: Vec<Option<f64>>,
    /// Median OOS net profit of a window.
    pub median_window_profit: Option<f64>,
    /// Worst OOS net profit of a window.
    pub worst_window_profit: Option<f64>,
    /// Windows with positive OOS net profit.
    pub profitable_windows: usize,
    /// Number of stitched windows.
    pub total_windows: usize,
}

/// Concatenates OOS segments in window order.
///
/// Each segment is rescaled so it starts where the previous one ended; the
/// first segment keeps its own starting equity.
#[derive(Debug, Clone, Copy, Default)]
pub struct OOSStitcher;

impl OOSStitcher {
    /// Create a stitcher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Stitch `segments`, ordered by window index.
    #[must_use]
    pub fn stitch(&self, segments: &[OOSSegment]) -> StitchedResult {
        let mut ordered: Vec<&OOSSegment> = segments.iter().collect();
        ordered.sort_by_key(|s| s.window_index);

        let mut equity_curve: Vec<f64> = Vec::new();
        let mut timestamps: Vec<DateTime<Utc>> = Vec::new();
        for segment in &ordered {
            let first = segment.equity_curve.first().copied();
            let scale = match (equity_curve.last(), first) {
                (Some(prev), Some(first)) if first > 0.0 => prev / first,
                _ => 1.0,
            };
            equity_curve.extend(segment.equity_curve.iter().map(|v| v * scale));
            timestamps.extend(segment.timestamps.iter().copied());
        }

        let net_profit = net_profit_pct(&equity_curve);
        let span_days: f64 = ordered.iter().map(|s| s.oos_span_days).sum();
        let window_wfe_pct: Vec<Option<f64>> = ordered.iter().map(|s| s.wfe_pct()).collect();
        let qualifying: Vec<f64> = window_wfe_pct.iter().flatten().copied().collect();
        let profits: Vec<f64> = ordered.iter().map(|s| s.net_profit_pct).collect();

        StitchedResult {
            max_drawdown_pct: max_drawdown_pct(&equity_curve),
            net_profit_pct: net_profit,
            annualized_profit_pct: annualize(net_profit, span_days),
            total_trades: ordered.iter().map(|s| s.trade_count).sum(),
            wfe_pct: median(&qualifying),
            worst_wfe_pct: qualifying.iter().copied().reduce(f64::min),
            window_wfe_pct,
            median_window_profit: median(&profits),
            worst_window_profit: profits.iter().copied().reduce(f64::min),
            profitable_windows: profits.iter().filter(|p| **p > 0.0).count(),
            total_windows: ordered.len(),
            equity_curve,
            timestamps,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn segment(index: usize, day: i64, curve: &[f64], trades: usize, is_profit: f64) -> OOSSegment {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        OOSSegment {
            window_index: index,
            equity_curve: curve.to_vec(),
            timestamps: (0..curve.len())
                .map(|i| start + Duration::days(i as i64))
                .collect(),
            trade_count: trades,
            net_profit_pct: net_profit_pct(curve),
            max_drawdown_pct: max_drawdown_pct(curve),
            is_net_profit_pct: is_profit,
            is_span_days: 90.0,
            oos_span_days: curve.len() as f64,
        }
    }

    #[test]
    fn test_rescaled_concatenation() {
        let segments = [
            segment(0, 0, &[100.0, 110.0], 2, 9.0),
            segment(1, 2, &[55.0, 49.5, 66.0], 3, 9.0),
        ];
        let result = OOSStitcher::new().stitch(&segments);

        assert_eq!(result.equity_curve, vec![100.0, 110.0, 110.0, 99.0, 132.0]);
        assert_eq!(result.timestamps.len(), 5);
        assert!((result.net_profit_pct - 32.0).abs() < 1e-9);
        assert!(result.max_drawdown_pct.is_some_and(|dd| (dd - 10.0).abs() < 1e-9));
        assert_eq!(result.total_trades, 5);
        assert_eq!(result.profitable_windows, 2);
        assert_eq!(result.total_windows, 2);
    }

    #[test]
    fn test_orders_by_window_index() {
        let segments = [
            segment(1, 2, &[100.0, 90.0], 1, 5.0),
            segment(0, 0, &[100.0, 200.0], 1, 5.0),
        ];
        let result = OOSStitcher::new().stitch(&segments);
        assert_eq!(result.equity_curve, vec![100.0, 200.0, 200.0, 180.0]);
        assert!((result.worst_window_profit.unwrap() + 10.0).abs() < 1e-9);
        assert!((result.median_window_profit.unwrap() - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_wfe_median_skips_losing_is() {
        let segments = [
            // OOS 10% over 2 days vs IS 9% over 90 days.
            segment(0, 0, &[100.0, 110.0], 1, 9.0),
            segment(1, 2, &[100.0, 100.0], 1, -3.0),
        ];
        let result = OOSStitcher::new().stitch(&segments);
        let expected = (10.0 / 2.0) / (9.0 / 90.0) * 100.0;
        assert!((result.wfe_pct.unwrap() - expected).abs() < 1e-9);
        assert!((result.worst_wfe_pct.unwrap() - expected).abs() < 1e-9);
        assert_eq!(result.window_wfe_pct[1], None);
    }

    #[test]
    fn test_worst_wfe_is_lowest_window() {
        let segments = [
            // OOS 10% over 2 days vs IS 9% over 90 days: WFE 5000%.
            segment(0, 0, &[100.0, 110.0], 1, 9.0),
            // OOS -10% over 2 days vs IS 9% over 90 days: WFE -5000%.
            segment(1, 2, &[100.0, 90.0], 1, 9.0),
            // OOS flat: WFE 0%.
            segment(2, 4, &[100.0, 100.0], 1, 9.0),
        ];
        let result = OOSStitcher::new().stitch(&segments);

        assert!((result.worst_wfe_pct.unwrap() + 5000.0).abs() < 1e-6);
        assert_eq!(result.wfe_pct, Some(0.0));
    }

    #[test]
    fn test_empty() {
        let result = OOSStitcher::new().stitch(&[]);
        assert_eq!(result.total_windows, 0);
        assert_eq!(result.wfe_pct, None);
        assert_eq!(result.worst_wfe_pct, None);
        assert_eq!(result.max_drawdown_pct, None);
        assert_eq!(result.worst_window_profit, None);
        assert_eq!(result.annualized_profit_pct, None);
    }
}
