//! Uniform random sampler.

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::{Sampler, SearchAxes};
use crate::backtest::params::ParamSet;
use crate::backtest::search::types::TrialResult;

/// Draws every axis uniformly, ignoring history.
#[derive(Debug)]
pub struct RandomSampler {
    axes: SearchAxes,
    rng: StdRng,
}

impl RandomSampler {
    /// Create a seeded random sampler.
    #[must_use]
    pub fn new(axes: SearchAxes, seed: u64) -> Self {
        Self {
            axes,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn name(&self) -> &'static str {
        "random"
    }

    fn suggest(&mut self, _history: &[TrialResult], count: usize) -> Vec<ParamSet> {
        (0..count)
            .map(|_| self.axes.random_params(&mut self.rng))
            .collect()
    }
}
