//! NSGA-II evolutionary sampler.
//!
//! Parents are the elitist selection of all completed trials: feasible
//! trials by non-domination front and crowding distance, infeasible trials
//! after them by total constraint violation. Children come from binary
//! tournaments, uniform crossover and per-gene resampling mutation.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Sampler, SearchAxes};
use crate::backtest::params::ParamSet;
use crate::backtest::search::ranking::{crowding_distances, non_dominated_ranks};
use crate::backtest::search::types::{Direction, TrialResult};

/// NSGA-II sampler.
#[derive(Debug)]
pub struct Nsga2Sampler {
    axes: SearchAxes,
    directions: Vec<Direction>,
    population_size: usize,
    crossover_prob: f64,
    mutation_prob: Option<f64>,
    rng: StdRng,
}

/// A parent with its selection keys.
struct Parent<'a> {
    params: &'a ParamSet,
    rank: usize,
    crowding: f64,
}

impl Nsga2Sampler {
    /// Create a seeded NSGA-II sampler.
    #[must_use]
    pub fn new(
        axes: SearchAxes,
        directions: Vec<Direction>,
        population_size: usize,
        crossover_prob: f64,
        mutation_prob: Option<f64>,
        seed: u64,
    ) -> Self {
        Self {
            axes,
            directions,
            population_size: population_size.max(2),
            crossover_prob,
            mutation_prob,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Elitist parent selection from every completed trial.
    fn select_parents<'a>(&self, history: &'a [TrialResult]) -> Vec<Parent<'a>> {
        let (feasible, mut infeasible): (Vec<&TrialResult>, Vec<&TrialResult>) =
            history.iter().partition(|t| t.feasible);

        let points: Vec<&[Option<f64>]> = feasible
            .iter()
            .map(|t| t.objective_values.as_slice())
            .collect();
        let ranks = non_dominated_ranks(&points, &self.directions);
        let n_fronts = ranks.iter().max().map_or(0, |r| r + 1);

        let mut parents = Vec::with_capacity(self.population_size);
        for front in 0..n_fronts {
            let members: Vec<usize> = (0..feasible.len()).filter(|&i| ranks[i] == front).collect();
            let front_points: Vec<&[Option<f64>]> = members.iter().map(|&i| points[i]).collect();
            let crowding = crowding_distances(&front_points, &self.directions);

            let mut order: Vec<usize> = (0..members.len()).collect();
            order.sort_by(|&a, &b| {
                crowding[b]
                    .partial_cmp(&crowding[a])
                    .unwrap_or(Ordering::Equal)
                    .then(feasible[members[a]].trial_id.cmp(&feasible[members[b]].trial_id))
            });

            for k in order {
                if parents.len() >= self.population_size {
                    return parents;
                }
                parents.push(Parent {
                    params: &feasible[members[k]].params,
                    rank: front,
                    crowding: crowding[k],
                });
            }
        }

        infeasible.sort_by(|a, b| {
            a.total_violation()
                .total_cmp(&b.total_violation())
                .then(a.trial_id.cmp(&b.trial_id))
        });
        for (offset, trial) in infeasible.into_iter().enumerate() {
            if parents.len() >= self.population_size {
                break;
            }
            parents.push(Parent {
                params: &trial.params,
                rank: n_fronts + offset,
                crowding: 0.0,
            });
        }
        parents
    }

    /// Binary tournament: lower rank wins, then larger crowding distance.
    fn tournament(rng: &mut StdRng, parents: &[Parent<'_>]) -> usize {
        let a = rng.random_range(0..parents.len());
        let b = rng.random_range(0..parents.len());
        let (pa, pb) = (&parents[a], &parents[b]);
        let a_wins = match pa.rank.cmp(&pb.rank) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => pa.crowding >= pb.crowding,
        };
        if a_wins { a } else { b }
    }
}

impl Sampler for Nsga2Sampler {
    fn name(&self) -> &'static str {
        "nsga2"
    }

    fn suggest(&mut self, history: &[TrialResult], count: usize) -> Vec<ParamSet> {
        if history.len() < self.population_size || self.axes.is_empty() {
            return (0..count)
                .map(|_| self.axes.random_params(&mut self.rng))
                .collect();
        }

        let parents = self.select_parents(history);
        let genes = self.axes.len();
        let mutation_prob = self.mutation_prob.unwrap_or(1.0 / genes as f64);

        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            let first = Self::tournament(&mut self.rng, &parents);
            let second = Self::tournament(&mut self.rng, &parents);

            let mut child = parents[first].params.clone();
            if self.rng.random_bool(self.crossover_prob) {
                for gene in 0..genes {
                    let Some(name) = self.axes.axis_name(gene) else {
                        continue;
                    };
                    if !self.rng.random_bool(0.5) {
                        continue;
                    }
                    if let Some(value) = parents[second].params.get(name) {
                        child.insert(name.to_string(), value.clone());
                    }
                }
            }

            for gene in 0..genes {
                if self.rng.random_bool(mutation_prob) {
                    self.axes.resample_axis(gene, &mut child, &mut self.rng);
                }
            }
            children.push(child);
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::metrics::MetricSnapshot;
    use crate::backtest::params::{ParamValue, ParameterSpace};

    fn space() -> ParameterSpace {
        ParameterSpace::builder()
            .categorical("mode", &["a", "b"])
            .int("x", 0, 10, 1)
            .int("y", 0, 10, 1)
    }

    fn history() -> Vec<TrialResult> {
        (0..12)
            .map(|i| {
                let x = (i % 11) as i64;
                let y = 10 - x;
                let mut params = ParamSet::new();
                params.insert("mode".to_string(), ParamValue::from("a"));
                params.insert("x".to_string(), ParamValue::Int(x));
                params.insert("y".to_string(), ParamValue::Int(y));
                TrialResult {
                    trial_id: i,
                    params,
                    objective_values: vec![Some(x as f64), Some(y as f64)],
                    constraint_values: vec![if i == 11 { 5.0 } else { 0.0 }],
                    feasible: i != 11,
                    is_pareto: false,
                    metrics: MetricSnapshot::default(),
                }
            })
            .collect()
    }

    fn sampler(population: usize, seed: u64) -> Nsga2Sampler {
        Nsga2Sampler::new(
            SearchAxes::from_space(&space()),
            vec![Direction::Maximize, Direction::Maximize],
            population,
            0.9,
            None,
            seed,
        )
    }

    #[test]
    fn test_parents_prefer_feasible_fronts() {
        let hist = history();
        let s = sampler(11, 1);
        let parents = s.select_parents(&hist);
        assert_eq!(parents.len(), 11);
        // Every feasible point is on the x + y = 10 front.
        assert!(parents.iter().all(|p| p.rank == 0));
    }

    #[test]
    fn test_infeasible_fill_after_fronts() {
        let hist = history();
        let parents = sampler(12, 1).select_parents(&hist);
        assert_eq!(parents.len(), 12);
        assert_eq!(parents[11].rank, 1);
    }

    #[test]
    fn test_children_stay_in_domain_and_are_seeded() {
        let hist = history();
        let a = sampler(8, 5).suggest(&hist, 16);
        let b = sampler(8, 5).suggest(&hist, 16);
        assert_eq!(a, b);
        for child in &a {
            let x = child["x"].as_int().unwrap();
            assert!((0..=10).contains(&x));
            assert!(child.contains_key("mode") && child.contains_key("y"));
        }
    }

    #[test]
    fn test_small_history_is_random() {
        assert_eq!(sampler(50, 2).suggest(&history(), 4).len(), 4);
    }
}
