//! Types for the parameter search engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pruner::PruningConfig;
use super::sampler::SamplerConfig;
use crate::backtest::coverage::CoverageRequirements;
use crate::backtest::metrics::{MetricKey, MetricSnapshot};
use crate::backtest::params::{ParamSet, SpaceError};

/// Most objectives a single search accepts.
pub const MAX_OBJECTIVES: usize = 6;

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Higher is better.
    Maximize,
    /// Lower is better.
    Minimize,
}

impl Direction {
    /// Map a value onto a scale where higher is always better.
    /// Unavailable values become negative infinity.
    #[must_use]
    pub fn score(self, value: Option<f64>) -> f64 {
        match (self, value) {
            (Self::Maximize, Some(v)) if v.is_finite() => v,
            (Self::Minimize, Some(v)) if v.is_finite() => -v,
            _ => f64::NEG_INFINITY,
        }
    }
}

/// One optimization objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Objective {
    /// Metric to optimize.
    pub metric: MetricKey,
    /// Optimization direction.
    pub direction: Direction,
}

impl Objective {
    /// Maximize `metric`.
    #[must_use]
    pub const fn maximize(metric: MetricKey) -> Self {
        Self {
            metric,
            direction: Direction::Maximize,
        }
    }

    /// Minimize `metric`.
    #[must_use]
    pub const fn minimize(metric: MetricKey) -> Self {
        Self {
            metric,
            direction: Direction::Minimize,
        }
    }
}

/// Comparison used by a soft constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOp {
    /// Metric must be at least the threshold.
    Gte,
    /// Metric must be at most the threshold.
    Lte,
}

/// Soft constraint on a metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Constrained metric.
    pub metric: MetricKey,
    /// Comparison.
    pub op: ConstraintOp,
    /// Threshold.
    pub threshold: f64,
}

impl Constraint {
    /// Constraint value: `<= 0` satisfied, `> 0` violated.
    ///
    /// Missing or non-finite metrics count as violated with value `1.0`.
    #[must_use]
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> f64 {
        let Some(metric) = snapshot.get(self.metric) else {
            return 1.0;
        };
        let value = match self.op {
            ConstraintOp::Gte => self.threshold - metric,
            ConstraintOp::Lte => metric - self.threshold,
        };
        if value.is_finite() { value } else { 1.0 }
    }
}

/// Termination limits. Checked between batches only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchBudget {
    /// Maximum number of trials.
    pub max_trials: usize,
    /// Wall-clock limit in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Stop after this many completed trials without improvement.
    #[serde(default)]
    pub patience: Option<usize>,
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            max_trials: 100,
            timeout_secs: None,
            patience: None,
        }
    }
}

/// Search configuration shared by every window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// One to six objectives. The first is the primary objective.
    pub objectives: Vec<Objective>,
    /// Soft constraints.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Adaptive sampler used after the coverage trials.
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// Termination limits.
    #[serde(default)]
    pub budget: SearchBudget,
    /// Coverage trials before the sampler takes over (default `n_rec`).
    #[serde(default)]
    pub initial_trials: Option<usize>,
    /// Trials evaluated per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Base RNG seed.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Median pruning (single objective only).
    #[serde(default)]
    pub pruning: PruningConfig,
}

const fn default_batch_size() -> usize {
    8
}

const fn default_seed() -> u64 {
    42
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            objectives: vec![Objective::maximize(MetricKey::NetProfitPct)],
            constraints: Vec::new(),
            sampler: SamplerConfig::default(),
            budget: SearchBudget::default(),
            initial_trials: None,
            batch_size: default_batch_size(),
            seed: default_seed(),
            pruning: PruningConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Objective directions in order.
    #[must_use]
    pub fn directions(&self) -> Vec<Direction> {
        self.objectives.iter().map(|o| o.direction).collect()
    }

    /// Whether this is a multi-objective search.
    #[must_use]
    pub fn is_multi_objective(&self) -> bool {
        self.objectives.len() > 1
    }

    /// Check objective count, budget and sampler settings.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), SearchError> {
        let count = self.objectives.len();
        if count == 0 || count > MAX_OBJECTIVES {
            return Err(SearchError::InvalidObjectiveCount { count });
        }
        if self.budget.max_trials == 0 {
            return Err(SearchError::EmptyBudget);
        }
        if self.batch_size == 0 {
            return Err(SearchError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.constraints.iter().any(|c| !c.threshold.is_finite()) {
            return Err(SearchError::InvalidConfig(
                "constraint thresholds must be finite".to_string(),
            ));
        }
        self.pruning.validate()?;
        self.sampler.validate()
    }
}

/// A completed, rankable trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number within the search, in creation order.
    pub trial_id: usize,
    /// Evaluated parameters.
    pub params: ParamSet,
    /// One value per objective; `None` when the metric is unavailable.
    pub objective_values: Vec<Option<f64>>,
    /// One value per constraint; `> 0` means violated.
    pub constraint_values: Vec<f64>,
    /// Whether every constraint is satisfied.
    pub feasible: bool,
    /// Set by ranking: not dominated by any other feasible trial.
    pub is_pareto: bool,
    /// IS metrics of this trial.
    pub metrics: MetricSnapshot,
}

impl TrialResult {
    /// Primary objective value.
    #[must_use]
    pub fn primary(&self) -> Option<f64> {
        self.objective_values.first().copied().flatten()
    }

    /// Sum of positive constraint values.
    #[must_use]
    pub fn total_violation(&self) -> f64 {
        self.constraint_values.iter().map(|v| v.max(0.0)).sum()
    }
}

/// A trial the simulator could not evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTrial {
    /// Trial number.
    pub trial_id: usize,
    /// Failure reason.
    pub reason: String,
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Trial budget used up.
    Budget,
    /// Wall-clock limit reached.
    Timeout,
    /// No improvement for `patience` completed trials.
    Patience,
    /// Cancelled from outside.
    Cancelled,
}

/// Result of one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    /// Completed trials in rank order.
    pub trials: Vec<TrialResult>,
    /// Trials that failed.
    pub failed: Vec<FailedTrial>,
    /// Trials stopped by the pruner.
    pub pruned: usize,
    /// Why the search stopped.
    pub stop_reason: StopReason,
    /// Coverage requirements of the searched space.
    pub coverage: CoverageRequirements,
}

impl SearchOutcome {
    /// Best-ranked trial.
    #[must_use]
    pub fn best(&self) -> Option<&TrialResult> {
        self.trials.first()
    }

    /// Number of trials started.
    #[must_use]
    pub fn trials_started(&self) -> usize {
        self.trials.len() + self.failed.len() + self.pruned
    }
}

/// Search configuration and input errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SearchError {
    /// The parameter space has nothing to optimize.
    #[error("Parameter space has no optimizable parameters")]
    NoOptimizableParameters,

    /// Objective count outside 1..=6.
    #[error("Expected 1 to 6 objectives, got {count}")]
    InvalidObjectiveCount {
        /// Configured objective count.
        count: usize,
    },

    /// Zero trial budget.
    #[error("Trial budget must be positive")]
    EmptyBudget,

    /// The parameter space is malformed.
    #[error("Invalid parameter space: {0}")]
    Space(SpaceError),

    /// Any other invalid setting.
    #[error("Invalid search configuration: {0}")]
    InvalidConfig(String),
}

impl From<SpaceError> for SearchError {
    fn from(err: SpaceError) -> Self {
        match err {
            SpaceError::NoOptimizableParameters => Self::NoOptimizableParameters,
            other => Self::Space(other),
        }
    }
}
