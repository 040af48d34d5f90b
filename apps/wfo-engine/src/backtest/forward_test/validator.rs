//! Re-evaluation of the best search candidates on the holdout.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Level, info, span, warn};

use super::holdout::HoldoutSplit;
use crate::backtest::metrics::{MetricSnapshot, MetricsCalculator, annualize, linear_annual_rate};
use crate::backtest::parallel::WorkerPool;
use crate::backtest::params::ParamSet;
use crate::backtest::search::{Direction, TrialResult, compare_values};
use crate::backtest::simulator::{BacktestSimulator, PriceSeries};
use crate::backtest::walkforward::span_days;
use crate::error::WalkForwardError;
use crate::observability::record_forward_test_candidates;

/// How forward-test candidates are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForwardTestSort {
    /// Highest profit degradation ratio first.
    #[default]
    ProfitDegradation,
    /// Highest holdout RoMaD first.
    Romad,
}

/// Holdout forward-test settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardTestConfig {
    /// Whether to carve a holdout and run the forward test.
    pub enabled: bool,
    /// Holdout length in days, taken from the end of the series.
    pub holdout_days: u32,
    /// Candidates to re-evaluate (clamped to those available).
    pub top_k: usize,
    /// Result ordering.
    pub sort_by: ForwardTestSort,
}

impl Default for ForwardTestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            holdout_days: 30,
            top_k: 5,
            sort_by: ForwardTestSort::ProfitDegradation,
        }
    }
}

/// One candidate after the holdout run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardTestCandidate {
    /// Trial id within the final window's search.
    pub trial_id: usize,
    /// 1-based rank in that search.
    pub search_rank: usize,
    /// Candidate parameters.
    pub params: ParamSet,
    /// IS metrics from the search.
    pub is_metrics: MetricSnapshot,
    /// Holdout metrics.
    pub ft_metrics: MetricSnapshot,
    /// Annualized holdout return over annualized IS return.
    pub profit_degradation: f64,
    /// 1-based rank after the forward test.
    pub ft_rank: usize,
}

/// Forward-test outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardTestReport {
    /// First holdout bar.
    pub holdout_start: DateTime<Utc>,
    /// Exclusive holdout end.
    pub holdout_end: DateTime<Utc>,
    /// Holdout span in days.
    pub holdout_days: f64,
    /// IS span the candidates were searched on, in days.
    pub is_span_days: f64,
    /// Ranked candidates.
    pub candidates: Vec<ForwardTestCandidate>,
}

/// Ratio of annualized holdout return to annualized IS return.
///
/// CAGR is used when both sides have one; otherwise both sides fall back to
/// the linear rate. Returns `0.0` when the IS rate is not positive.
#[must_use]
pub fn profit_degradation(is_profit_pct: f64, is_days: f64, ft_profit_pct: f64, ft_days: f64) -> f64 {
    let (is_rate, ft_rate) = match (
        annualize(is_profit_pct, is_days),
        annualize(ft_profit_pct, ft_days),
    ) {
        (Some(is_rate), Some(ft_rate)) => (Some(is_rate), Some(ft_rate)),
        _ => (
            linear_annual_rate(is_profit_pct, is_days),
            linear_annual_rate(ft_profit_pct, ft_days),
        ),
    };
    match (is_rate, ft_rate) {
        (Some(is_rate), Some(ft_rate)) if is_rate > 0.0 => ft_rate / is_rate,
        _ => 0.0,
    }
}

/// Re-simulates the top search candidates on the holdout.
pub struct ForwardTestValidator {
    simulator: Arc<dyn BacktestSimulator>,
    pool: Arc<WorkerPool>,
    calculator: MetricsCalculator,
    config: ForwardTestConfig,
    warmup_bars: usize,
}

impl ForwardTestValidator {
    /// Create a validator.
    #[must_use]
    pub fn new(
        simulator: Arc<dyn BacktestSimulator>,
        pool: Arc<WorkerPool>,
        config: ForwardTestConfig,
    ) -> Self {
        Self {
            simulator,
            pool,
            calculator: MetricsCalculator::new(),
            config,
            warmup_bars: 0,
        }
    }

    /// Lookback taken from the bars before the holdout.
    #[must_use]
    pub const fn with_warmup_bars(mut self, warmup_bars: usize) -> Self {
        self.warmup_bars = warmup_bars;
        self
    }

    /// Use a custom metrics calculator.
    #[must_use]
    pub const fn with_calculator(mut self, calculator: MetricsCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    /// Re-evaluate the first `top_k` of `ranked` on the holdout.
    ///
    /// `ranked` must be in search rank order; `is_span_days` is the IS span
    /// the candidates were found on.
    ///
    /// # Errors
    ///
    /// Returns [`WalkForwardError::InvalidConfig`] if `split` has no holdout.
    pub fn validate(
        &self,
        series: &PriceSeries,
        split: &HoldoutSplit,
        ranked: &[TrialResult],
        is_span_days: f64,
    ) -> Result<ForwardTestReport, WalkForwardError> {
        let Some((holdout_start, holdout_end)) = split.holdout_span(series) else {
            return Err(WalkForwardError::InvalidConfig(
                "forward test requires a holdout".to_string(),
            ));
        };
        let ft_days = span_days(holdout_start, holdout_end);
        let range = split.holdout_range(self.warmup_bars);

        let top_k = self.config.top_k.min(ranked.len());
        let tasks: Vec<(usize, &TrialResult)> = ranked[..top_k]
            .iter()
            .enumerate()
            .map(|(i, trial)| (i + 1, trial))
            .collect();

        let ft_span = span!(Level::DEBUG, "forward_test", candidates = top_k);
        let _enter = ft_span.enter();

        let outcomes = self.pool.map_ordered(&tasks, |(_, trial)| {
            self.simulator
                .run(series, range, &trial.params)
                .map(|sim| self.calculator.snapshot(&sim))
        });

        let mut candidates: Vec<ForwardTestCandidate> = Vec::with_capacity(top_k);
        for ((search_rank, trial), outcome) in tasks.iter().zip(outcomes) {
            match outcome {
                Ok(ft_metrics) => candidates.push(ForwardTestCandidate {
                    trial_id: trial.trial_id,
                    search_rank: *search_rank,
                    params: trial.params.clone(),
                    profit_degradation: profit_degradation(
                        trial.metrics.basic.net_profit_pct,
                        is_span_days,
                        ft_metrics.basic.net_profit_pct,
                        ft_days,
                    ),
                    is_metrics: trial.metrics.clone(),
                    ft_metrics,
                    ft_rank: 0,
                }),
                Err(e) => {
                    warn!(trial_id = trial.trial_id, error = %e, "Forward test candidate failed");
                }
            }
        }

        self.rank(&mut candidates);
        record_forward_test_candidates(candidates.len());

        info!(
            candidates = candidates.len(),
            holdout_days = ft_days,
            best_trial = ?candidates.first().map(|c| c.trial_id),
            "Forward test complete"
        );

        Ok(ForwardTestReport {
            holdout_start,
            holdout_end,
            holdout_days: ft_days,
            is_span_days,
            candidates,
        })
    }

    fn rank(&self, candidates: &mut [ForwardTestCandidate]) {
        candidates.sort_by(|a, b| {
            let primary = match self.config.sort_by {
                ForwardTestSort::ProfitDegradation => b
                    .profit_degradation
                    .partial_cmp(&a.profit_degradation)
                    .unwrap_or(Ordering::Equal),
                ForwardTestSort::Romad => compare_values(
                    a.ft_metrics.advanced.romad,
                    b.ft_metrics.advanced.romad,
                    Direction::Maximize,
                ),
            };
            primary.then(a.search_rank.cmp(&b.search_rank))
        });
        for (i, candidate) in candidates.iter_mut().enumerate() {
            candidate.ft_rank = i + 1;
        }
    }
}
