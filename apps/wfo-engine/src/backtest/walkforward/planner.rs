//! Window planning and per-window evaluation.
//!
//! Fixed mode lays out every window up front from calendar offsets. Adaptive
//! mode walks a single bar cursor forward: each OOS window starts on the bar
//! after the previous OOS end, runs until the trigger detector fires or the
//! maximum OOS length is reached, and the next IS is the `is_period_days`
//! immediately before the new OOS start.

use chrono::Duration;
use tracing::{Level, debug, info, span, warn};

use super::stitch::OOSSegment;
use super::trigger::{IsBaseline, TriggerDetector};
use super::types::{
    FailedWindow, TriggerKind, WalkForwardConfig, Window, WindowBounds, WindowMode, WindowResult,
};
use crate::backtest::metrics::{MetricSnapshot, max_drawdown_pct};
use crate::backtest::parallel::CancellationToken;
use crate::backtest::params::ParameterSpace;
use crate::backtest::search::{ParameterSearchEngine, SearchError, SearchOutcome, TrialResult};
use crate::backtest::simulator::{BarRange, PriceSeries, SimulationResult};
use crate::error::WalkForwardError;
use crate::observability::record_window;

/// Fixed-mode layout over bars `..end` of `series`.
///
/// Window `k` starts its IS `k * oos_days` after the first bar; a window is
/// kept only if its OOS ends at or before the exclusive end of bar `end - 1`.
/// Windows whose OOS collapses to a single bar after alignment are dropped.
///
/// # Errors
///
/// Returns [`WalkForwardError::InsufficientData`] when fewer than two windows
/// fit.
pub fn fixed_layout(
    series: &PriceSeries,
    end: usize,
    is_days: u32,
    oos_days: u32,
) -> Result<Vec<WindowBounds>, WalkForwardError> {
    let end = end.min(series.len());
    let (Some(data_start), Some(data_end)) = (
        series.timestamp(0),
        end.checked_sub(1).and_then(|last| series.bar_end(last)),
    ) else {
        return Err(WalkForwardError::insufficient("price series is empty"));
    };

    let is_span = Duration::days(i64::from(is_days));
    let mut layout = Vec::new();
    for k in 0_i64.. {
        let is_start = data_start + Duration::days(i64::from(oos_days) * k);
        let oos_start = is_start + is_span;
        let oos_bound = oos_start + Duration::days(i64::from(oos_days));
        if oos_bound > data_end {
            break;
        }

        let is_start_bar = series.first_at_or_after(is_start);
        let oos_start_bar = series.first_at_or_after(oos_start);
        let oos_end_exclusive = series.first_at_or_after(oos_bound).min(end);
        if oos_end_exclusive <= oos_start_bar + 1 {
            debug!(k, %oos_start, "Dropping window with collapsed OOS span");
            continue;
        }
        if let Some(bounds) = WindowBounds::from_bars(
            series,
            layout.len(),
            is_start_bar,
            oos_start_bar,
            oos_end_exclusive - 1,
        ) {
            layout.push(bounds);
        }
    }

    if layout.len() < 2 {
        return Err(WalkForwardError::insufficient(format!(
            "fixed mode needs at least 2 windows of {is_days}+{oos_days} days, {} fit",
            layout.len()
        )));
    }
    Ok(layout)
}

/// Windows produced by a planning run.
#[derive(Debug, Default)]
pub struct PlanOutcome {
    /// Successful windows in order.
    pub windows: Vec<WindowResult>,
    /// Skipped windows.
    pub failed: Vec<FailedWindow>,
}

/// Why a single window did not produce a result.
enum WindowError {
    /// Log, record and move on.
    Skip(String),
    /// Stop the run.
    Abort(WalkForwardError),
}

impl From<SearchError> for WindowError {
    fn from(err: SearchError) -> Self {
        Self::Abort(err.into())
    }
}

/// Plans windows and evaluates each one.
pub struct WindowPlanner<'a> {
    config: &'a WalkForwardConfig,
    search: &'a ParameterSearchEngine,
    cancel: CancellationToken,
}

impl<'a> WindowPlanner<'a> {
    /// Create a planner that searches with `search`.
    #[must_use]
    pub fn new(config: &'a WalkForwardConfig, search: &'a ParameterSearchEngine) -> Self {
        Self {
            config,
            search,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe an external cancellation token between windows.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Plan and evaluate every window over bars `..end`.
    ///
    /// # Errors
    ///
    /// Returns an error if no window fits, the search configuration is
    /// invalid, or the run is cancelled.
    pub fn plan(
        &self,
        series: &PriceSeries,
        end: usize,
        space: &ParameterSpace,
    ) -> Result<PlanOutcome, WalkForwardError> {
        match self.config.mode {
            WindowMode::Fixed => self.plan_fixed(series, end, space),
            WindowMode::Adaptive => self.plan_adaptive(series, end, space),
        }
    }

    fn plan_fixed(
        &self,
        series: &PriceSeries,
        end: usize,
        space: &ParameterSpace,
    ) -> Result<PlanOutcome, WalkForwardError> {
        let layout = fixed_layout(
            series,
            end,
            self.config.is_period_days,
            self.config.oos_period_days,
        )?;
        info!(
            windows = layout.len(),
            is_days = self.config.is_period_days,
            oos_days = self.config.oos_period_days,
            "Planned fixed windows"
        );

        let mut outcome = PlanOutcome::default();
        for bounds in layout {
            self.check_cancelled()?;
            let window_span = span!(Level::DEBUG, "window", index = bounds.index);
            let _enter = window_span.enter();

            match self.evaluate_fixed(series, bounds, space) {
                Ok(result) => outcome.windows.push(result),
                Err(WindowError::Skip(reason)) => {
                    Self::skip(
                        &mut outcome,
                        bounds.index,
                        series,
                        bounds.is_start_bar,
                        bounds.oos_start_bar,
                        reason,
                    );
                }
                Err(WindowError::Abort(e)) => return Err(e),
            }
        }
        Ok(outcome)
    }

    fn evaluate_fixed(
        &self,
        series: &PriceSeries,
        bounds: WindowBounds,
        space: &ParameterSpace,
    ) -> Result<WindowResult, WindowError> {
        let is_range = self.range(bounds.is_start_bar, bounds.oos_start_bar);
        let (search, best) = self.search_window(series, bounds.index, is_range, space)?;

        let oos_range = self.range(bounds.oos_start_bar, bounds.oos_end_bar + 1);
        let (oos, oos_metrics) = self
            .search
            .evaluate(series, oos_range, &best.params)
            .map_err(|e| WindowError::Skip(format!("OOS simulation failed: {e}")))?;

        let is_metrics = best.metrics.clone();
        Ok(Self::finish(
            bounds,
            TriggerKind::None,
            &best,
            is_metrics,
            &oos,
            oos_metrics,
            search,
        ))
    }

    fn plan_adaptive(
        &self,
        series: &PriceSeries,
        end: usize,
        space: &ParameterSpace,
    ) -> Result<PlanOutcome, WalkForwardError> {
        let end = end.min(series.len());
        let Some(data_start) = series.timestamp(0) else {
            return Err(WalkForwardError::insufficient("price series is empty"));
        };
        let is_span = Duration::days(i64::from(self.config.is_period_days));
        let max_span = Duration::days(i64::from(self.config.adaptive.max_oos_period_days));

        let mut outcome = PlanOutcome::default();
        let mut cursor = series.first_at_or_after(data_start + is_span);
        let mut index = 0;

        while cursor + 1 < end {
            self.check_cancelled()?;
            let Some(oos_start) = series.timestamp(cursor) else {
                break;
            };
            let is_start_bar = series.first_at_or_after(oos_start - is_span);
            let max_end = series.first_at_or_after(oos_start + max_span).min(end);
            if max_end < cursor + 2 {
                debug!(cursor, "Dropping trailing window with collapsed OOS span");
                break;
            }

            let window_span = span!(Level::DEBUG, "window", index);
            let _enter = window_span.enter();

            match self.evaluate_adaptive(series, index, is_start_bar, cursor, max_end, space) {
                Ok(result) => {
                    cursor = result.window.bounds.oos_end_bar + 1;
                    outcome.windows.push(result);
                }
                Err(WindowError::Skip(reason)) => {
                    Self::skip(&mut outcome, index, series, is_start_bar, cursor, reason);
                    cursor = max_end;
                }
                Err(WindowError::Abort(e)) => return Err(e),
            }
            index += 1;
        }

        if index == 0 {
            return Err(WalkForwardError::insufficient(format!(
                "adaptive mode needs {} IS days plus at least two OOS bars",
                self.config.is_period_days
            )));
        }
        info!(
            windows = outcome.windows.len(),
            failed = outcome.failed.len(),
            "Planned adaptive windows"
        );
        Ok(outcome)
    }

    fn evaluate_adaptive(
        &self,
        series: &PriceSeries,
        index: usize,
        is_start_bar: usize,
        oos_start_bar: usize,
        max_end: usize,
        space: &ParameterSpace,
    ) -> Result<WindowResult, WindowError> {
        if is_start_bar >= oos_start_bar {
            return Err(WindowError::Skip("no IS bars before OOS start".to_string()));
        }
        let is_range = self.range(is_start_bar, oos_start_bar);
        let (search, best) = self.search_window(series, index, is_range, space)?;

        let (is_sim, is_metrics) = self
            .search
            .evaluate(series, is_range, &best.params)
            .map_err(|e| WindowError::Skip(format!("IS baseline simulation failed: {e}")))?;
        let detector = TriggerDetector::new(
            &self.config.adaptive,
            IsBaseline::from_simulation(&is_sim, is_range.trading_bars()),
        );

        let (probe, probe_metrics) = self
            .search
            .evaluate(series, self.range(oos_start_bar, max_end), &best.params)
            .map_err(|e| WindowError::Skip(format!("OOS simulation failed: {e}")))?;
        let (trigger, oos_end_exclusive) =
            self.scan(series, &detector, &probe, oos_start_bar, max_end);

        let (oos, oos_metrics) = if oos_end_exclusive < max_end {
            self.search
                .evaluate(series, self.range(oos_start_bar, oos_end_exclusive), &best.params)
                .map_err(|e| WindowError::Skip(format!("OOS simulation failed: {e}")))?
        } else {
            (probe, probe_metrics)
        };

        let bounds = WindowBounds::from_bars(
            series,
            index,
            is_start_bar,
            oos_start_bar,
            oos_end_exclusive - 1,
        )
        .ok_or_else(|| WindowError::Skip("window bounds outside the series".to_string()))?;

        Ok(Self::finish(bounds, trigger, &best, is_metrics, &oos, oos_metrics, search))
    }

    /// Poll the detector at every `check_interval_trades` boundary of the
    /// probe run. Returns the trigger and the exclusive OOS end bar.
    fn scan(
        &self,
        series: &PriceSeries,
        detector: &TriggerDetector,
        probe: &SimulationResult,
        oos_start_bar: usize,
        max_end: usize,
    ) -> (TriggerKind, usize) {
        let adaptive = &self.config.adaptive;
        let interval = adaptive.check_interval_trades.max(1);
        let returns: Vec<f64> = probe.trades.iter().map(|t| t.return_pct).collect();
        let exit_bar = |trade: usize| {
            series
                .last_at_or_before(probe.trades[trade].exit_time)
                .unwrap_or(oos_start_bar)
                .clamp(oos_start_bar, max_end - 1)
        };

        for count in (1..=returns.len())
            .filter(|n| *n >= adaptive.min_oos_trades && n % interval == 0)
        {
            let bar = exit_bar(count - 1);
            let so_far = probe.truncated(probe.trades[count - 1].exit_time);
            let lookback_start = if count > interval {
                exit_bar(count - interval - 1)
            } else {
                oos_start_bar
            };

            if let Some(trigger) = detector.evaluate(
                &returns[..count],
                max_drawdown_pct(&so_far.equity_curve),
                interval,
                (bar - lookback_start).max(1),
            ) {
                debug!(trades = count, bar, ?trigger, "Re-optimization trigger fired");
                let end = (bar + 1).max(oos_start_bar + 2).min(max_end);
                return (trigger.into(), end);
            }
        }
        (TriggerKind::MaxPeriod, max_end)
    }

    fn search_window(
        &self,
        series: &PriceSeries,
        index: usize,
        is_range: BarRange,
        space: &ParameterSpace,
    ) -> Result<(SearchOutcome, TrialResult), WindowError> {
        let seed = self.search.config().seed.wrapping_add(index as u64);
        let search = self.search.search_seeded(series, is_range, space, seed)?;
        if self.cancel.is_cancelled() {
            return Err(WindowError::Abort(WalkForwardError::Cancelled));
        }

        let Some(best) = search.best().cloned() else {
            return Err(WindowError::Skip(format!(
                "search produced no rankable trial ({} failed, {} pruned)",
                search.failed.len(),
                search.pruned
            )));
        };
        if !best.feasible {
            warn!(
                window = index,
                trial_id = best.trial_id,
                "No feasible trial; using the least violating one"
            );
        }
        Ok((search, best))
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        bounds: WindowBounds,
        trigger: TriggerKind,
        best: &TrialResult,
        is_metrics: MetricSnapshot,
        oos: &SimulationResult,
        oos_metrics: MetricSnapshot,
        search: SearchOutcome,
    ) -> WindowResult {
        let segment = OOSSegment::from_simulation(
            bounds.index,
            oos,
            is_metrics.basic.net_profit_pct,
            bounds.is_days(),
            bounds.actual_oos_days,
        );
        record_window(trigger.as_str());
        info!(
            window = bounds.index,
            is_start = %bounds.is_start,
            oos_start = %bounds.oos_start,
            oos_end = %bounds.oos_end,
            oos_days = bounds.actual_oos_days,
            trigger = trigger.as_str(),
            trial_id = best.trial_id,
            is_profit_pct = is_metrics.basic.net_profit_pct,
            oos_profit_pct = segment.net_profit_pct,
            oos_trades = segment.trade_count,
            "Window complete"
        );

        WindowResult {
            window: Window {
                bounds,
                trigger_kind: trigger,
                params: best.params.clone(),
                is_metrics,
            },
            oos_metrics,
            segment,
            search,
        }
    }

    fn skip(
        outcome: &mut PlanOutcome,
        index: usize,
        series: &PriceSeries,
        is_start_bar: usize,
        oos_start_bar: usize,
        reason: String,
    ) {
        let (Some(is_start), Some(oos_start)) =
            (series.timestamp(is_start_bar), series.timestamp(oos_start_bar))
        else {
            return;
        };
        warn!(window = index, %oos_start, reason = %reason, "Window skipped");
        record_window("failed");
        outcome.failed.push(FailedWindow {
            index,
            is_start,
            oos_start,
            reason,
        });
    }

    const fn range(&self, start: usize, end: usize) -> BarRange {
        BarRange::with_warmup(start, end, self.config.warmup_bars)
    }

    fn check_cancelled(&self) -> Result<(), WalkForwardError> {
        if self.cancel.is_cancelled() {
            return Err(WalkForwardError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use test_case::test_case;

    use super::*;
    use crate::backtest::parallel::{ParallelConfig, WorkerPool};
    use crate::backtest::search::{SamplerConfig, SearchBudget, SearchConfig};
    use crate::backtest::simulator::{Bar, MockBacktestSimulator, SimulationError, Trade};

    fn daily(n: usize) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        PriceSeries::new(
            (0..n)
                .map(|i| Bar::flat(start + Duration::days(i as i64), 100.0))
                .collect(),
        )
        .unwrap()
    }

    /// One single-bar trade per tradable bar; `bar_return` gives its return.
    fn per_bar_trades(
        series: &PriceSeries,
        range: BarRange,
        bar_return: impl Fn(usize) -> f64,
    ) -> SimulationResult {
        let mut equity = 100.0;
        let mut result = SimulationResult::default();
        for i in range.trade_start..range.end {
            let ts = series.bars()[i].timestamp;
            let r = bar_return(i);
            equity *= 1.0 + r / 100.0;
            result.trades.push(Trade {
                entry_time: ts,
                exit_time: ts,
                net_pnl: r,
                return_pct: r,
            });
            result.equity_curve.push(equity);
            result.timestamps.push(ts);
        }
        result
    }

    fn engine(sim: MockBacktestSimulator) -> ParameterSearchEngine {
        let config = SearchConfig {
            sampler: SamplerConfig::Random,
            budget: SearchBudget {
                max_trials: 4,
                ..SearchBudget::default()
            },
            batch_size: 4,
            ..SearchConfig::default()
        };
        let pool = WorkerPool::new(ParallelConfig::sequential()).unwrap();
        ParameterSearchEngine::new(config, Arc::new(sim), Arc::new(pool))
    }

    fn space() -> ParameterSpace {
        ParameterSpace::builder().int("x", 1, 10, 1)
    }

    #[test]
    fn test_fixed_layout_rolls_by_oos() {
        let series = daily(240);
        let layout = fixed_layout(&series, 240, 90, 30).unwrap();
        assert_eq!(layout.len(), 5);
        for (k, bounds) in layout.iter().enumerate() {
            assert_eq!(bounds.index, k);
            assert_eq!(bounds.is_start_bar, 30 * k);
            assert_eq!(bounds.oos_start_bar, 30 * k + 90);
            assert_eq!(bounds.oos_end_bar, 30 * k + 119);
            assert_eq!(bounds.actual_oos_days, 30.0);
        }
    }

    /// Daily bars for days `0..60` and `90..180` with `gap` extra bars from
    /// day 75 on.
    fn daily_with_gap(gap: usize) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let days = (0..60).chain(75..75 + gap as i64).chain(90..180);
        PriceSeries::new(
            days.map(|d| Bar::flat(start + Duration::days(d), 100.0))
                .collect(),
        )
        .unwrap()
    }

    // IS 30 / OOS 30: the second window's OOS covers days 60..90, where only
    // the gap bars live.
    #[test_case(1 => vec![30, 61, 91, 121] ; "single bar oos is dropped")]
    #[test_case(2 => vec![30, 60, 62, 92, 122] ; "two bar oos is kept")]
    fn test_fixed_layout_collapsed_oos(gap: usize) -> Vec<usize> {
        let series = daily_with_gap(gap);
        let layout = fixed_layout(&series, series.len(), 30, 30).unwrap();
        for (k, bounds) in layout.iter().enumerate() {
            assert_eq!(bounds.index, k);
            assert!(bounds.oos_end_bar > bounds.oos_start_bar);
        }
        layout.iter().map(|b| b.oos_start_bar).collect()
    }

    #[test]
    fn test_fixed_layout_needs_two_windows() {
        let series = daily(140);
        assert!(matches!(
            fixed_layout(&series, 140, 90, 30),
            Err(WalkForwardError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_fixed_plan_skips_failed_window() {
        let mut sim = MockBacktestSimulator::new();
        sim.expect_run().returning(|series, range, _| {
            if range.trade_start == 120 && range.trading_bars() == 30 {
                return Err(SimulationError::Strategy("oos broke".to_string()));
            }
            Ok(per_bar_trades(series, range, |_| 0.5))
        });
        let engine = engine(sim);
        let config = WalkForwardConfig::default();
        let series = daily(240);

        let outcome = WindowPlanner::new(&config, &engine)
            .plan(&series, series.len(), &space())
            .unwrap();

        assert_eq!(outcome.windows.len(), 4);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].index, 1);
        assert!(outcome.failed[0].reason.contains("oos broke"));
        assert!(
            outcome
                .windows
                .iter()
                .all(|w| w.window.trigger_kind == TriggerKind::None && w.segment.trade_count == 30)
        );
    }

    #[test]
    fn test_adaptive_max_period_then_cusum() {
        let mut sim = MockBacktestSimulator::new();
        sim.expect_run().returning(|series, range, _| {
            Ok(per_bar_trades(series, range, |bar| {
                if bar >= 200 {
                    -5.0
                } else if bar % 2 == 0 {
                    1.0
                } else {
                    3.0
                }
            }))
        });
        let engine = engine(sim);
        let mut config = WalkForwardConfig {
            mode: WindowMode::Adaptive,
            ..WalkForwardConfig::default()
        };
        config.adaptive.max_oos_period_days = 60;
        let series = daily(300);

        let outcome = WindowPlanner::new(&config, &engine)
            .plan(&series, series.len(), &space())
            .unwrap();
        let windows: Vec<&Window> = outcome.windows.iter().map(|w| &w.window).collect();

        assert_eq!(windows[0].bounds.oos_start_bar, 90);
        assert_eq!(windows[0].bounds.oos_end_bar, 149);
        assert_eq!(windows[0].trigger_kind, TriggerKind::MaxPeriod);
        assert_eq!(windows[0].bounds.actual_oos_days, 60.0);

        assert_eq!(windows[1].bounds.is_start_bar, 60);
        assert_eq!(windows[1].bounds.oos_end_bar, 200);
        assert_eq!(windows[1].trigger_kind, TriggerKind::Cusum);

        assert_eq!(windows[2].bounds.oos_start_bar, 201);
        for pair in windows.windows(2) {
            assert_eq!(pair[1].bounds.oos_start_bar, pair[0].bounds.oos_end_bar + 1);
            assert!(pair[1].bounds.oos_start > pair[0].bounds.oos_end);
        }
    }

    #[test]
    fn test_cancelled_between_windows() {
        let mut sim = MockBacktestSimulator::new();
        sim.expect_run()
            .returning(|series, range, _| Ok(per_bar_trades(series, range, |_| 0.5)));
        let engine = engine(sim);
        let config = WalkForwardConfig::default();
        let series = daily(240);
        let token = CancellationToken::new();
        token.cancel();

        let result = WindowPlanner::new(&config, &engine)
            .with_cancellation(token)
            .plan(&series, series.len(), &space());
        assert!(matches!(result, Err(WalkForwardError::Cancelled)));
    }
}
