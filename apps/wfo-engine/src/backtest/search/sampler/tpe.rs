//! Tree-structured Parzen estimator for single-objective searches.
//!
//! History is split into a "good" share (`gamma`) and the rest. Each axis
//! gets an independent Parzen density per group; candidates are drawn from
//! the good densities and the one maximizing `l(x) / g(x)` is proposed.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Sampler, SearchAxes, standard_normal};
use crate::backtest::params::{CategoricalAxis, NumericAxis, ParamSet, ParamValue};
use crate::backtest::search::types::{Direction, TrialResult};

const MIN_BANDWIDTH: f64 = 0.02;
const MAX_BANDWIDTH: f64 = 0.5;

/// TPE sampler.
#[derive(Debug)]
pub struct TpeSampler {
    axes: SearchAxes,
    direction: Direction,
    gamma: f64,
    n_ei_candidates: usize,
    n_startup_trials: usize,
    rng: StdRng,
}

impl TpeSampler {
    /// Create a seeded TPE sampler.
    #[must_use]
    pub fn new(
        axes: SearchAxes,
        direction: Direction,
        gamma: f64,
        n_ei_candidates: usize,
        n_startup_trials: usize,
        seed: u64,
    ) -> Self {
        Self {
            axes,
            direction,
            gamma,
            n_ei_candidates: n_ei_candidates.max(1),
            n_startup_trials,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn propose(&mut self, good: &[&ParamSet], bad: &[&ParamSet]) -> ParamSet {
        let mut params = self.axes.base.clone();

        for axis in &self.axes.categorical {
            let good_model = CategoricalDensity::fit(axis, good);
            let bad_model = CategoricalDensity::fit(axis, bad);
            let mut best: Option<(f64, ParamValue)> = None;
            for _ in 0..self.n_ei_candidates {
                let index = good_model.sample(&mut self.rng);
                let score = good_model.log_pdf(index) - bad_model.log_pdf(index);
                if best.as_ref().is_none_or(|(s, _)| score > *s) {
                    best = axis.choices.get(index).cloned().map(|v| (score, v));
                }
            }
            if let Some((_, value)) = best {
                params.insert(axis.name.clone(), value);
            }
        }

        for axis in &self.axes.numeric {
            let good_model = NumericDensity::fit(axis, good);
            let bad_model = NumericDensity::fit(axis, bad);
            let mut best: Option<(f64, f64)> = None;
            for _ in 0..self.n_ei_candidates {
                let x = good_model.sample(&mut self.rng);
                let score = good_model.log_pdf(x) - bad_model.log_pdf(x);
                if best.is_none_or(|(s, _)| score > s) {
                    best = Some((score, x));
                }
            }
            if let Some((_, fraction)) = best {
                params.insert(axis.name.clone(), axis.value_at(fraction));
            }
        }

        params
    }
}

impl Sampler for TpeSampler {
    fn name(&self) -> &'static str {
        "tpe"
    }

    fn suggest(&mut self, history: &[TrialResult], count: usize) -> Vec<ParamSet> {
        let mut observed: Vec<(f64, usize, &ParamSet)> = history
            .iter()
            .filter(|t| t.feasible)
            .filter_map(|t| {
                t.primary()
                    .map(|v| (self.direction.score(Some(v)), t.trial_id, &t.params))
            })
            .collect();

        if observed.len() < self.n_startup_trials.max(2) {
            return (0..count)
                .map(|_| self.axes.random_params(&mut self.rng))
                .collect();
        }

        observed.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        let n = observed.len();
        let n_good = ((self.gamma * n as f64).ceil() as usize).clamp(1, n - 1);
        let good: Vec<&ParamSet> = observed[..n_good].iter().map(|o| o.2).collect();
        let bad: Vec<&ParamSet> = observed[n_good..].iter().map(|o| o.2).collect();

        (0..count).map(|_| self.propose(&good, &bad)).collect()
    }
}

/// Smoothed choice frequencies with a uniform prior.
struct CategoricalDensity {
    weights: Vec<f64>,
}

impl CategoricalDensity {
    fn fit(axis: &CategoricalAxis, observations: &[&ParamSet]) -> Self {
        let mut weights = vec![1.0; axis.choices.len().max(1)];
        for params in observations {
            if let Some(index) = params
                .get(&axis.name)
                .and_then(|v| axis.choices.iter().position(|c| c == v))
            {
                weights[index] += 1.0;
            }
        }
        let total: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= total;
        }
        Self { weights }
    }

    fn sample(&self, rng: &mut StdRng) -> usize {
        let mut target = rng.random::<f64>();
        for (i, w) in self.weights.iter().enumerate() {
            if target < *w {
                return i;
            }
            target -= w;
        }
        self.weights.len() - 1
    }

    fn log_pdf(&self, index: usize) -> f64 {
        self.weights.get(index).map_or(f64::NEG_INFINITY, |w| w.ln())
    }
}

/// Gaussian kernels over range fractions plus a uniform prior component.
struct NumericDensity {
    centers: Vec<f64>,
    bandwidth: f64,
}

impl NumericDensity {
    fn fit(axis: &NumericAxis, observations: &[&ParamSet]) -> Self {
        let centers: Vec<f64> = observations
            .iter()
            .filter_map(|p| p.get(&axis.name).and_then(|v| axis.fraction_of(v)))
            .collect();
        let bandwidth =
            ((centers.len().max(1) as f64).powf(-0.2) * 0.25).clamp(MIN_BANDWIDTH, MAX_BANDWIDTH);
        Self { centers, bandwidth }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        // The prior counts as one extra component.
        let pick = rng.random_range(0..=self.centers.len());
        match self.centers.get(pick) {
            Some(center) => standard_normal(rng)
                .mul_add(self.bandwidth, *center)
                .clamp(0.0, 1.0),
            None => rng.random::<f64>(),
        }
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let norm = 1.0 / (self.bandwidth * (2.0 * PI).sqrt());
        let kernels: f64 = self
            .centers
            .iter()
            .map(|c| {
                let z = (x - c) / self.bandwidth;
                norm * (-0.5 * z * z).exp()
            })
            .sum();
        // Uniform prior on [0, 1] has density 1.
        ((kernels + 1.0) / (self.centers.len() + 1) as f64).ln()
    }
}
