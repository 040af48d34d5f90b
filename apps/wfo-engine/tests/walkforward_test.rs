//! Walk-forward integration tests.
//!
//! Runs the full engine against a deterministic wave simulator: holdout
//! split, window planning, per-window search, stitching and forward test.

#![allow(clippy::unwrap_used, clippy::float_cmp, clippy::cast_possible_wrap)]

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use wfo_engine::backtest::forward_test::profit_degradation;
use wfo_engine::backtest::metrics::annualize;
use wfo_engine::backtest::search::{SamplerConfig, SearchBudget};
use wfo_engine::backtest::walkforward::{AdaptiveConfig, TriggerKind, WindowMode};
use wfo_engine::backtest::{
    BacktestSimulator, Bar, BarRange, ForwardTestConfig, ParallelConfig, ParamSet, ParamValue,
    ParameterSpace, PriceSeries, SearchConfig, SimulationError, SimulationResult, Trade,
    WalkForwardBuilder, WalkForwardConfig,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Holds each trade for `hold` bars; the trade return is `edge` plus a
/// deterministic wave keyed on the exit bar.
struct WaveSimulator;

impl BacktestSimulator for WaveSimulator {
    fn run(
        &self,
        series: &PriceSeries,
        range: BarRange,
        params: &ParamSet,
    ) -> Result<SimulationResult, SimulationError> {
        if range.is_empty() {
            return Err(SimulationError::EmptyRange {
                start: range.trade_start,
                end: range.end,
            });
        }
        let hold = params
            .get("hold")
            .and_then(ParamValue::as_int)
            .unwrap_or(1)
            .max(1) as usize;
        let edge = params
            .get("edge")
            .and_then(ParamValue::as_float)
            .unwrap_or(0.0);

        let mut result = SimulationResult::default();
        let mut equity = 10_000.0;
        let mut entry = range.trade_start;
        for i in range.trade_start..range.end {
            let ts = series.bars()[i].timestamp;
            if i + 1 - entry == hold || i + 1 == range.end {
                let return_pct = edge + (i as f64 * 0.7).sin();
                let pnl = equity * return_pct / 100.0;
                equity += pnl;
                result.trades.push(Trade {
                    entry_time: series.bars()[entry].timestamp,
                    exit_time: ts,
                    net_pnl: pnl,
                    return_pct,
                });
                entry = i + 1;
            }
            result.equity_curve.push(equity);
            result.timestamps.push(ts);
        }
        Ok(result)
    }
}

fn daily(n: usize) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    PriceSeries::new(
        (0..n)
            .map(|i| Bar::flat(start + Duration::days(i as i64), 100.0))
            .collect(),
    )
    .unwrap()
}

fn space() -> ParameterSpace {
    ParameterSpace::builder()
        .int("hold", 1, 5, 1)
        .float("edge", -0.5, 1.0, Some(0.25))
}

fn search_config() -> SearchConfig {
    SearchConfig {
        sampler: SamplerConfig::Random,
        budget: SearchBudget {
            max_trials: 8,
            ..SearchBudget::default()
        },
        batch_size: 4,
        seed: 11,
        ..SearchConfig::default()
    }
}

fn quiet_adaptive(max_days: u32) -> AdaptiveConfig {
    AdaptiveConfig {
        max_oos_period_days: max_days,
        cusum_enabled: false,
        drawdown_enabled: false,
        inactivity_enabled: false,
        ..AdaptiveConfig::default()
    }
}

// =============================================================================
// Fixed mode
// =============================================================================

#[test]
fn test_fixed_year_tiles_nine_windows() {
    let engine = WalkForwardBuilder::new(Arc::new(WaveSimulator))
        .search(search_config())
        .parallel(ParallelConfig::sequential())
        .build()
        .unwrap();

    let series = daily(365);
    let result = engine.run(&series, &space()).unwrap();

    assert_eq!(result.windows.len(), 9);
    assert!(result.failed_windows.is_empty());

    let first = &result.windows[0].window.bounds;
    assert_eq!(first.is_start, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
    for window in result.windows() {
        assert_eq!(window.bounds.is_end, window.bounds.oos_start);
        assert_eq!(window.bounds.actual_oos_days, 30.0);
        assert_eq!(window.trigger_kind, TriggerKind::None);
    }
    for pair in result.windows.windows(2) {
        let (prev, next) = (&pair[0].window.bounds, &pair[1].window.bounds);
        assert_eq!(next.oos_start, prev.oos_end + Duration::days(1));
        assert_eq!(next.is_start, prev.is_start + Duration::days(30));
    }
}

#[test]
fn test_stitched_trade_count_matches_segments() {
    let engine = WalkForwardBuilder::new(Arc::new(WaveSimulator))
        .search(search_config())
        .parallel(ParallelConfig::sequential())
        .build()
        .unwrap();

    let result = engine.run(&daily(300), &space()).unwrap();
    let segment_trades: usize = result.windows.iter().map(|w| w.segment.trade_count).sum();

    assert_eq!(result.stitched.total_trades, segment_trades);
    assert_eq!(result.stitched.total_windows, result.windows.len());
    assert_eq!(
        result.stitched.equity_curve.len(),
        result.stitched.timestamps.len()
    );
    assert!(
        result
            .stitched
            .timestamps
            .windows(2)
            .all(|pair| pair[0] < pair[1])
    );
}

#[test]
fn test_runs_are_deterministic() {
    let build = || {
        WalkForwardBuilder::new(Arc::new(WaveSimulator))
            .search(search_config())
            .parallel(ParallelConfig {
                max_threads: 4,
                ..ParallelConfig::default()
            })
            .build()
            .unwrap()
    };
    let series = daily(240);

    let a = build().run(&series, &space()).unwrap();
    let b = build().run(&series, &space()).unwrap();

    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

// =============================================================================
// Adaptive mode
// =============================================================================

#[test]
fn test_adaptive_without_triggers_uses_max_period() {
    let config = WalkForwardConfig {
        mode: WindowMode::Adaptive,
        adaptive: quiet_adaptive(60),
        ..WalkForwardConfig::default()
    };
    let engine = WalkForwardBuilder::new(Arc::new(WaveSimulator))
        .walk_forward(config)
        .search(search_config())
        .parallel(ParallelConfig::sequential())
        .build()
        .unwrap();

    let result = engine.run(&daily(270), &space()).unwrap();

    assert_eq!(result.windows.len(), 3);
    for window in result.windows() {
        assert_eq!(window.trigger_kind, TriggerKind::MaxPeriod);
        assert_eq!(window.bounds.actual_oos_days, 60.0);
        assert_eq!(window.bounds.is_days(), 90.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_adaptive_windows_never_overlap(
        bars in 150_usize..260,
        is_days in 20_u32..60,
        max_days in 5_u32..40,
        min_trades in 1_usize..5,
        interval in 1_usize..4,
        cusum_threshold in 0.5_f64..5.0,
    ) {
        let config = WalkForwardConfig {
            mode: WindowMode::Adaptive,
            is_period_days: is_days,
            adaptive: AdaptiveConfig {
                max_oos_period_days: max_days,
                min_oos_trades: min_trades,
                check_interval_trades: interval,
                cusum_threshold,
                ..AdaptiveConfig::default()
            },
            ..WalkForwardConfig::default()
        };
        let engine = WalkForwardBuilder::new(Arc::new(WaveSimulator))
            .walk_forward(config)
            .search(SearchConfig {
                budget: SearchBudget { max_trials: 4, ..SearchBudget::default() },
                ..search_config()
            })
            .parallel(ParallelConfig::sequential())
            .build()
            .unwrap();

        let result = engine.run(&daily(bars), &space()).unwrap();
        prop_assert!(!result.windows.is_empty());

        for window in result.windows() {
            prop_assert_eq!(window.bounds.is_end, window.bounds.oos_start);
            prop_assert!(window.bounds.oos_start <= window.bounds.oos_end);
            prop_assert!(window.bounds.actual_oos_days <= f64::from(max_days));
        }
        for pair in result.windows.windows(2) {
            let (prev, next) = (&pair[0].window.bounds, &pair[1].window.bounds);
            prop_assert!(next.oos_start > prev.oos_end);
            prop_assert_eq!(next.oos_start_bar, prev.oos_end_bar + 1);
        }
    }
}

// =============================================================================
// Forward test
// =============================================================================

#[test]
fn test_forward_test_uses_unseen_holdout() {
    let config = WalkForwardConfig {
        forward_test: ForwardTestConfig {
            enabled: true,
            holdout_days: 45,
            top_k: 4,
            ..ForwardTestConfig::default()
        },
        ..WalkForwardConfig::default()
    };
    let engine = WalkForwardBuilder::new(Arc::new(WaveSimulator))
        .walk_forward(config)
        .search(search_config())
        .parallel(ParallelConfig::sequential())
        .build()
        .unwrap();

    let series = daily(300);
    let result = engine.run(&series, &space()).unwrap();
    let report = result.forward_test.unwrap();

    let last_oos_end = result.windows.last().unwrap().window.bounds.oos_end;
    assert!(report.holdout_start > last_oos_end);
    assert_eq!(report.holdout_days, 45.0);
    assert!(report.candidates.len() <= 4);
    assert!(!report.candidates.is_empty());
    for (i, candidate) in report.candidates.iter().enumerate() {
        assert_eq!(candidate.ft_rank, i + 1);
    }
}

#[test]
fn test_profit_degradation_of_losing_is_is_zero() {
    assert_eq!(profit_degradation(-10.0, 365.0, 5.0, 365.0), 0.0);
}

#[test]
fn test_annualize_edges() {
    assert_eq!(annualize(50.0, 20.0), None);
    let rate = annualize(60.0, 365.0).unwrap();
    assert!((rate - 60.0).abs() < 1e-9);
}
