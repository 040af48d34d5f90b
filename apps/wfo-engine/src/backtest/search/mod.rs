//! Parameter search over one in-sample slice.
//!
//! A search starts with the coverage schedule, then hands over to an adaptive
//! sampler. Trials run in batches on the worker pool; every result carries
//! its objectives, constraint values and metrics. Completed trials are
//! ranked deterministically: Pareto-optimal feasible trials first for
//! multi-objective searches, then by primary objective, then by trial id.

mod engine;
mod pruner;
mod ranking;
mod sampler;
mod types;

pub use engine::ParameterSearchEngine;
pub use pruner::{MedianPruner, PruningConfig, partial_range};
pub use ranking::{compare_values, crowding_distances, dominates, non_dominated_ranks, rank_trials};
pub use sampler::{Nsga2Sampler, RandomSampler, Sampler, SamplerConfig, SearchAxes, TpeSampler};
pub use types::{
    Constraint, ConstraintOp, Direction, FailedTrial, MAX_OBJECTIVES, Objective, SearchBudget,
    SearchConfig, SearchError, SearchOutcome, StopReason, TrialResult,
};
