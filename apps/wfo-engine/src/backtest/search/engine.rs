//! Batch-parallel parameter search over one IS slice.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{Level, debug, info, span, warn};

use super::pruner::{MedianPruner, partial_range};
use super::ranking::rank_trials;
use super::types::{
    FailedTrial, SearchConfig, SearchError, SearchOutcome, StopReason, TrialResult,
};
use crate::backtest::coverage::CoverageScheduler;
use crate::backtest::metrics::{MetricSnapshot, MetricsCalculator};
use crate::backtest::parallel::{CancellationToken, ProgressTracker, TaskState, WorkerPool};
use crate::backtest::params::{ParamSet, ParameterSpace};
use crate::backtest::simulator::{BacktestSimulator, BarRange, PriceSeries, SimulationError, SimulationResult};
use crate::observability::record_trial;

/// One trial handed to a worker.
#[derive(Debug, Clone)]
struct TrialTask {
    trial_id: usize,
    params: ParamSet,
}

/// What a worker hands back.
#[derive(Debug)]
enum TrialOutcome {
    Completed {
        trial: TrialResult,
        intermediate: Option<f64>,
    },
    Pruned {
        intermediate: Option<f64>,
    },
    Failed(String),
}

impl TrialOutcome {
    const fn state(&self) -> TaskState {
        match self {
            Self::Completed { .. } => TaskState::Completed,
            Self::Pruned { .. } => TaskState::Pruned,
            Self::Failed(_) => TaskState::Failed,
        }
    }
}

const fn state_label(state: TaskState) -> &'static str {
    match state {
        TaskState::Completed => "completed",
        TaskState::Failed => "failed",
        TaskState::Pruned => "pruned",
    }
}

/// Searches an IS slice for strategy parameters.
///
/// Coverage trials run first, then the configured sampler proposes batches
/// until the budget, timeout, patience or cancellation stops the search.
/// Limits are checked between batches only.
pub struct ParameterSearchEngine {
    config: SearchConfig,
    simulator: Arc<dyn BacktestSimulator>,
    pool: Arc<WorkerPool>,
    scheduler: CoverageScheduler,
    calculator: MetricsCalculator,
    cancel: CancellationToken,
}

impl ParameterSearchEngine {
    /// Create a search engine.
    #[must_use]
    pub fn new(
        config: SearchConfig,
        simulator: Arc<dyn BacktestSimulator>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config,
            simulator,
            pool,
            scheduler: CoverageScheduler::new(),
            calculator: MetricsCalculator::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a custom coverage scheduler.
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: CoverageScheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Use a custom metrics calculator.
    #[must_use]
    pub const fn with_calculator(mut self, calculator: MetricsCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    /// Observe an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Search configuration.
    #[must_use]
    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Simulate `params` over `range` and compute its metrics.
    ///
    /// # Errors
    ///
    /// Returns the simulator's error.
    pub fn evaluate(
        &self,
        series: &PriceSeries,
        range: BarRange,
        params: &ParamSet,
    ) -> Result<(SimulationResult, MetricSnapshot), SimulationError> {
        let sim = self.simulator.run(series, range, params)?;
        let metrics = self.calculator.snapshot(&sim);
        Ok((sim, metrics))
    }

    /// Search with the configured seed.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or parameter space.
    pub fn search(
        &self,
        series: &PriceSeries,
        range: BarRange,
        space: &ParameterSpace,
    ) -> Result<SearchOutcome, SearchError> {
        self.search_seeded(series, range, space, self.config.seed)
    }

    /// Search with an explicit sampler seed.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration or parameter space.
    pub fn search_seeded(
        &self,
        series: &PriceSeries,
        range: BarRange,
        space: &ParameterSpace,
        seed: u64,
    ) -> Result<SearchOutcome, SearchError> {
        self.config.validate()?;
        space.validate()?;
        if range.is_empty() {
            return Err(SearchError::InvalidConfig(format!(
                "empty search range {}..{}",
                range.trade_start, range.end
            )));
        }

        let coverage = CoverageScheduler::requirements(space)?;
        let max_trials = self.config.budget.max_trials;
        if max_trials < coverage.n_min {
            warn!(
                max_trials,
                n_min = coverage.n_min,
                "Trial budget below categorical coverage; some combinations will not be evaluated"
            );
        }

        let n_initial = self
            .config
            .initial_trials
            .unwrap_or(coverage.n_rec)
            .min(max_trials);
        let mut queue: VecDeque<ParamSet> = self
            .scheduler
            .generate_initial_trials(space, n_initial)?
            .into();

        let directions = self.config.directions();
        let mut sampler = self.config.sampler.build(space, &directions, seed);
        let pruner = if self.config.pruning.enabled && self.config.is_multi_objective() {
            debug!("Pruning disabled for multi-objective search");
            None
        } else if self.config.pruning.enabled {
            Some(MedianPruner::new(
                self.config.pruning.n_startup_trials,
                directions[0],
            ))
        } else {
            None
        };

        info!(
            max_trials,
            n_initial,
            combinations = coverage.combinations,
            sampler = sampler.name(),
            objectives = self.config.objectives.len(),
            pruning = pruner.is_some(),
            "Starting parameter search"
        );

        let tracker = ProgressTracker::new(max_trials as u64);
        let start = Instant::now();
        let timeout = self.config.budget.timeout_secs.map(Duration::from_secs);
        let primary_direction = directions[0];

        let mut completed: Vec<TrialResult> = Vec::new();
        let mut failed: Vec<FailedTrial> = Vec::new();
        let mut pruned = 0usize;
        let mut reported: Vec<f64> = Vec::new();
        let mut best_score = f64::NEG_INFINITY;
        let mut since_improvement = 0usize;
        let mut next_id = 0usize;
        let mut batch_index = 0usize;

        let stop_reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if next_id >= max_trials {
                break StopReason::Budget;
            }
            if timeout.is_some_and(|limit| start.elapsed() >= limit) {
                break StopReason::Timeout;
            }
            if self
                .config
                .budget
                .patience
                .is_some_and(|patience| since_improvement >= patience)
            {
                break StopReason::Patience;
            }

            let size = self.config.batch_size.min(max_trials - next_id);
            let mut proposals: Vec<ParamSet> = Vec::with_capacity(size);
            while proposals.len() < size {
                let Some(params) = queue.pop_front() else {
                    break;
                };
                proposals.push(params);
            }
            if proposals.len() < size {
                proposals.extend(sampler.suggest(&completed, size - proposals.len()));
            }

            let tasks: Vec<TrialTask> = proposals
                .into_iter()
                .enumerate()
                .map(|(k, params)| TrialTask {
                    trial_id: next_id + k,
                    params,
                })
                .collect();
            next_id += tasks.len();

            let batch_span = span!(Level::DEBUG, "search_batch", batch = batch_index, trials = tasks.len());
            let _enter = batch_span.enter();

            let outcomes = self.pool.map_ordered(&tasks, |task| {
                self.run_trial(series, range, task, pruner.as_ref(), &reported, &tracker)
            });

            if self.cancel.is_cancelled() {
                debug!(batch = batch_index, "Discarding batch after cancellation");
                break StopReason::Cancelled;
            }

            for (task, outcome) in tasks.iter().zip(outcomes) {
                match outcome {
                    TrialOutcome::Completed {
                        trial,
                        intermediate,
                    } => {
                        reported.extend(intermediate);
                        let score = primary_direction.score(trial.primary());
                        if score > best_score {
                            best_score = score;
                            since_improvement = 0;
                        } else {
                            since_improvement += 1;
                        }
                        completed.push(trial);
                    }
                    TrialOutcome::Pruned { intermediate } => {
                        reported.extend(intermediate);
                        pruned += 1;
                    }
                    TrialOutcome::Failed(reason) => {
                        warn!(trial_id = task.trial_id, error = %reason, "Trial failed");
                        failed.push(FailedTrial {
                            trial_id: task.trial_id,
                            reason,
                        });
                    }
                }
            }

            if self.pool.config().track_progress {
                let progress = tracker.progress();
                debug!(
                    progress_pct = progress.percentage(),
                    completed = progress.completed,
                    failed = progress.failed,
                    pruned = progress.pruned,
                    eta_secs = progress.eta_secs,
                    "Search progress"
                );
            }
            batch_index += 1;
        };

        let trials = rank_trials(completed, &directions);
        info!(
            completed = trials.len(),
            failed = failed.len(),
            pruned,
            stop_reason = ?stop_reason,
            best = ?trials.first().and_then(TrialResult::primary),
            elapsed_secs = tracker.elapsed_secs(),
            "Parameter search finished"
        );

        Ok(SearchOutcome {
            trials,
            failed,
            pruned,
            stop_reason,
            coverage,
        })
    }

    fn run_trial(
        &self,
        series: &PriceSeries,
        range: BarRange,
        task: &TrialTask,
        pruner: Option<&MedianPruner>,
        reported: &[f64],
        tracker: &ProgressTracker,
    ) -> TrialOutcome {
        let started = Instant::now();
        let outcome = self.evaluate_trial(series, range, task, pruner, reported);
        let state = outcome.state();
        tracker.record(state);
        record_trial(state_label(state), started.elapsed().as_secs_f64());
        outcome
    }

    fn evaluate_trial(
        &self,
        series: &PriceSeries,
        range: BarRange,
        task: &TrialTask,
        pruner: Option<&MedianPruner>,
        reported: &[f64],
    ) -> TrialOutcome {
        let primary_metric = self.config.objectives[0].metric;

        let mut intermediate = None;
        if let Some(pruner) = pruner {
            let partial = partial_range(range, self.config.pruning.report_fraction);
            match self.evaluate(series, partial, &task.params) {
                Ok((_, metrics)) => {
                    intermediate = metrics.get(primary_metric);
                    if pruner.should_prune(intermediate, reported) {
                        debug!(trial_id = task.trial_id, ?intermediate, "Trial pruned");
                        return TrialOutcome::Pruned { intermediate };
                    }
                }
                Err(e) => return TrialOutcome::Failed(e.to_string()),
            }
        }

        let metrics = match self.evaluate(series, range, &task.params) {
            Ok((_, metrics)) => metrics,
            Err(e) => return TrialOutcome::Failed(e.to_string()),
        };

        let objective_values = self
            .config
            .objectives
            .iter()
            .map(|o| metrics.get(o.metric))
            .collect();
        let constraint_values: Vec<f64> = self
            .config
            .constraints
            .iter()
            .map(|c| c.evaluate(&metrics))
            .collect();
        let feasible = constraint_values.iter().all(|v| *v <= 0.0);

        TrialOutcome::Completed {
            trial: TrialResult {
                trial_id: task.trial_id,
                params: task.params.clone(),
                objective_values,
                constraint_values,
                feasible,
                is_pareto: false,
                metrics,
            },
            intermediate,
        }
    }
}
