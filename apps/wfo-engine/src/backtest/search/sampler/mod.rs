//! Adaptive samplers that propose trials after the coverage schedule.
//!
//! All samplers are seeded with [`StdRng::seed_from_u64`] so the same seed,
//! space and history always produce the same proposals.

mod nsga;
mod random;
mod tpe;

use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub use nsga::Nsga2Sampler;
pub use random::RandomSampler;
pub use tpe::TpeSampler;

use super::types::{Direction, SearchError, TrialResult};
use crate::backtest::params::{CategoricalAxis, NumericAxis, ParamSet, ParamValue, ParameterSpace};

/// Proposes parameter sets from the trials completed so far.
pub trait Sampler: Send {
    /// Sampler name for logging.
    fn name(&self) -> &'static str;

    /// Propose `count` parameter sets. `history` holds completed trials in
    /// trial id order.
    fn suggest(&mut self, history: &[TrialResult], count: usize) -> Vec<ParamSet>;
}

/// Sampler selection and tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplerConfig {
    /// Uniform random sampling.
    Random,
    /// Tree-structured Parzen estimator (single objective).
    Tpe {
        /// Share of history treated as "good".
        #[serde(default = "default_gamma")]
        gamma: f64,
        /// Candidates scored per proposal.
        #[serde(default = "default_ei_candidates")]
        n_ei_candidates: usize,
        /// Completed trials needed before the model is used.
        #[serde(default = "default_tpe_startup")]
        n_startup_trials: usize,
    },
    /// NSGA-II evolutionary sampler.
    Nsga2 {
        /// Parent population size.
        #[serde(default = "default_population")]
        population_size: usize,
        /// Probability of uniform crossover.
        #[serde(default = "default_crossover")]
        crossover_prob: f64,
        /// Per-gene mutation probability (default `1 / genes`).
        #[serde(default)]
        mutation_prob: Option<f64>,
    },
}

const fn default_gamma() -> f64 {
    0.25
}

const fn default_ei_candidates() -> usize {
    24
}

const fn default_tpe_startup() -> usize {
    10
}

const fn default_population() -> usize {
    50
}

const fn default_crossover() -> f64 {
    0.9
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::Tpe {
            gamma: default_gamma(),
            n_ei_candidates: default_ei_candidates(),
            n_startup_trials: default_tpe_startup(),
        }
    }
}

impl SamplerConfig {
    /// NSGA-II with default settings.
    #[must_use]
    pub const fn nsga2_default() -> Self {
        Self::Nsga2 {
            population_size: default_population(),
            crossover_prob: default_crossover(),
            mutation_prob: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), SearchError> {
        let invalid = |msg: String| Err(SearchError::InvalidConfig(msg));
        match self {
            Self::Random => Ok(()),
            Self::Tpe {
                gamma,
                n_ei_candidates,
                ..
            } => {
                if !(*gamma > 0.0 && *gamma < 1.0) {
                    return invalid(format!("tpe gamma must be in (0, 1), got {gamma}"));
                }
                if *n_ei_candidates == 0 {
                    return invalid("tpe n_ei_candidates must be positive".to_string());
                }
                Ok(())
            }
            Self::Nsga2 {
                population_size,
                crossover_prob,
                mutation_prob,
            } => {
                if *population_size < 2 {
                    return invalid("nsga2 population_size must be at least 2".to_string());
                }
                if !(0.0..=1.0).contains(crossover_prob) {
                    return invalid(format!(
                        "nsga2 crossover_prob must be in [0, 1], got {crossover_prob}"
                    ));
                }
                if mutation_prob.is_some_and(|p| !(0.0..=1.0).contains(&p)) {
                    return invalid("nsga2 mutation_prob must be in [0, 1]".to_string());
                }
                Ok(())
            }
        }
    }

    /// Build a seeded sampler for `space`.
    ///
    /// Searches with two or more objectives always use NSGA-II; a configured
    /// NSGA-II keeps its settings, anything else falls back to the defaults.
    #[must_use]
    pub fn build(
        &self,
        space: &ParameterSpace,
        directions: &[Direction],
        seed: u64,
    ) -> Box<dyn Sampler> {
        let axes = SearchAxes::from_space(space);
        let config = match self {
            Self::Nsga2 { .. } => self.clone(),
            _ if directions.len() > 1 => Self::nsga2_default(),
            _ => self.clone(),
        };
        let direction = directions.first().copied().unwrap_or(Direction::Maximize);

        match config {
            Self::Random => Box::new(RandomSampler::new(axes, seed)),
            Self::Tpe {
                gamma,
                n_ei_candidates,
                n_startup_trials,
            } => Box::new(TpeSampler::new(
                axes,
                direction,
                gamma,
                n_ei_candidates,
                n_startup_trials,
                seed,
            )),
            Self::Nsga2 {
                population_size,
                crossover_prob,
                mutation_prob,
            } => Box::new(Nsga2Sampler::new(
                axes,
                directions.to_vec(),
                population_size,
                crossover_prob,
                mutation_prob,
                seed,
            )),
        }
    }
}

/// Optimizable axes plus the fixed values every proposal carries.
#[derive(Debug, Clone)]
pub struct SearchAxes {
    base: ParamSet,
    categorical: Vec<CategoricalAxis>,
    numeric: Vec<NumericAxis>,
}

impl SearchAxes {
    /// Axes of `space`.
    #[must_use]
    pub fn from_space(space: &ParameterSpace) -> Self {
        Self {
            base: space.fixed_values(),
            categorical: space.categorical_axes(),
            numeric: space.numeric_axes(),
        }
    }

    /// Number of optimizable axes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categorical.len() + self.numeric.len()
    }

    /// Whether there is nothing to sample.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn random_params(&self, rng: &mut StdRng) -> ParamSet {
        let mut params = self.base.clone();
        for axis in &self.categorical {
            params.insert(axis.name.clone(), sample_categorical(axis, rng));
        }
        for axis in &self.numeric {
            params.insert(axis.name.clone(), sample_numeric(axis, rng));
        }
        params
    }

    fn resample_axis(&self, index: usize, params: &mut ParamSet, rng: &mut StdRng) {
        if let Some(axis) = self.categorical.get(index) {
            params.insert(axis.name.clone(), sample_categorical(axis, rng));
        } else if let Some(axis) = self.numeric.get(index - self.categorical.len()) {
            params.insert(axis.name.clone(), sample_numeric(axis, rng));
        }
    }

    fn axis_name(&self, index: usize) -> Option<&str> {
        self.categorical
            .get(index)
            .map(|a| a.name.as_str())
            .or_else(|| {
                self.numeric
                    .get(index.checked_sub(self.categorical.len())?)
                    .map(|a| a.name.as_str())
            })
    }
}

fn sample_categorical(axis: &CategoricalAxis, rng: &mut StdRng) -> ParamValue {
    let index = rng.random_range(0..axis.choices.len().max(1));
    axis.choices
        .get(index)
        .cloned()
        .unwrap_or(ParamValue::Bool(false))
}

fn sample_numeric(axis: &NumericAxis, rng: &mut StdRng) -> ParamValue {
    match (axis.step, axis.max_level()) {
        (Some(step), Some(max_level)) => {
            let level = rng.random_range(0..=max_level);
            axis.snap(step.mul_add(level as f64, axis.low))
        }
        _ => axis.snap(rng.random_range(axis.low..=axis.high)),
    }
}

/// Standard normal draw (Box-Muller).
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
