//! Deterministic trial ranking, Pareto dominance and crowding distance.

use std::cmp::Ordering;

use super::types::{Direction, TrialResult};

/// Order two objective values, better first. Unavailable values sort last.
#[must_use]
pub fn compare_values(a: Option<f64>, b: Option<f64>, direction: Direction) -> Ordering {
    direction
        .score(b)
        .partial_cmp(&direction.score(a))
        .unwrap_or(Ordering::Equal)
}

/// Whether `a` Pareto-dominates `b`: no worse on every objective and better
/// on at least one.
#[must_use]
pub fn dominates(a: &[Option<f64>], b: &[Option<f64>], directions: &[Direction]) -> bool {
    let mut strictly_better = false;
    for ((va, vb), dir) in a.iter().zip(b).zip(directions) {
        let (sa, sb) = (dir.score(*va), dir.score(*vb));
        if sa < sb {
            return false;
        }
        if sa > sb {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Non-dominated sorting. Returns the front index of every point (0 = Pareto).
#[must_use]
pub fn non_dominated_ranks(points: &[&[Option<f64>]], directions: &[Direction]) -> Vec<usize> {
    let n = points.len();
    let mut dominated_by = vec![0usize; n];
    let mut dominating: Vec<Vec<usize>> = vec![Vec::new(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(points[i], points[j], directions) {
                dominating[i].push(j);
                dominated_by[j] += 1;
            } else if dominates(points[j], points[i], directions) {
                dominating[j].push(i);
                dominated_by[i] += 1;
            }
        }
    }

    let mut ranks = vec![0usize; n];
    let mut front: Vec<usize> = (0..n).filter(|&i| dominated_by[i] == 0).collect();
    let mut rank = 0;
    while !front.is_empty() {
        let mut next = Vec::new();
        for &i in &front {
            ranks[i] = rank;
            for &j in &dominating[i] {
                dominated_by[j] -= 1;
                if dominated_by[j] == 0 {
                    next.push(j);
                }
            }
        }
        next.sort_unstable();
        front = next;
        rank += 1;
    }
    ranks
}

/// Crowding distance of each member of one front. Boundary points get
/// infinity.
#[must_use]
pub fn crowding_distances(points: &[&[Option<f64>]], directions: &[Direction]) -> Vec<f64> {
    let n = points.len();
    let mut distances = vec![0.0; n];
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    for (k, dir) in directions.iter().enumerate() {
        let scores: Vec<f64> = points
            .iter()
            .map(|p| p.get(k).map_or(f64::NEG_INFINITY, |v| dir.score(*v)))
            .collect();
        let finite_min = scores
            .iter()
            .copied()
            .filter(|s| s.is_finite())
            .fold(f64::INFINITY, f64::min);
        // Unavailable values sit just below the worst finite score.
        let scores: Vec<f64> = scores
            .into_iter()
            .map(|s| {
                if s.is_finite() {
                    s
                } else if finite_min.is_finite() {
                    finite_min - 1.0
                } else {
                    0.0
                }
            })
            .collect();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]).then(a.cmp(&b)));

        let (low, high) = (scores[order[0]], scores[order[n - 1]]);
        distances[order[0]] = f64::INFINITY;
        distances[order[n - 1]] = f64::INFINITY;
        let span = high - low;
        if span <= 0.0 {
            continue;
        }
        for w in 1..(n - 1) {
            let i = order[w];
            if distances[i].is_finite() {
                distances[i] += (scores[order[w + 1]] - scores[order[w - 1]]) / span;
            }
        }
    }
    distances
}

/// Flag Pareto trials and sort into final rank order.
///
/// Pareto membership is computed among feasible trials only. Multi-objective
/// tiers are feasible Pareto, feasible non-Pareto, then infeasible; single
/// objective runs only separate feasible from infeasible. Within a tier the
/// primary objective decides, then the lower trial id.
#[must_use]
pub fn rank_trials(mut trials: Vec<TrialResult>, directions: &[Direction]) -> Vec<TrialResult> {
    let feasible: Vec<usize> = (0..trials.len()).filter(|&i| trials[i].feasible).collect();
    let points: Vec<&[Option<f64>]> = feasible
        .iter()
        .map(|&i| trials[i].objective_values.as_slice())
        .collect();
    let ranks = non_dominated_ranks(&points, directions);
    let pareto: Vec<usize> = feasible
        .iter()
        .zip(&ranks)
        .filter(|(_, rank)| **rank == 0)
        .map(|(&i, _)| i)
        .collect();

    for trial in &mut trials {
        trial.is_pareto = false;
    }
    for i in pareto {
        trials[i].is_pareto = true;
    }

    let multi = directions.len() > 1;
    let tier = |t: &TrialResult| match (t.feasible, t.is_pareto) {
        (false, _) => 2,
        (true, true) if multi => 0,
        (true, _) if multi => 1,
        (true, _) => 0,
    };
    let primary = directions.first().copied().unwrap_or(Direction::Maximize);

    trials.sort_by(|a, b| {
        tier(a)
            .cmp(&tier(b))
            .then_with(|| compare_values(a.primary(), b.primary(), primary))
            .then_with(|| a.trial_id.cmp(&b.trial_id))
    });
    trials
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::metrics::MetricSnapshot;
    use crate::backtest::params::ParamSet;

    const MAX2: [Direction; 2] = [Direction::Maximize, Direction::Maximize];

    fn trial(id: usize, values: &[Option<f64>], feasible: bool) -> TrialResult {
        TrialResult {
            trial_id: id,
            params: ParamSet::new(),
            objective_values: values.to_vec(),
            constraint_values: vec![if feasible { 0.0 } else { 1.0 }],
            feasible,
            is_pareto: false,
            metrics: MetricSnapshot::default(),
        }
    }

    fn ids(trials: &[TrialResult]) -> Vec<usize> {
        trials.iter().map(|t| t.trial_id).collect()
    }

    #[test]
    fn test_compare_values_unavailable_last() {
        assert_eq!(
            compare_values(Some(1.0), Some(2.0), Direction::Maximize),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(Some(1.0), Some(2.0), Direction::Minimize),
            Ordering::Less
        );
        assert_eq!(
            compare_values(None, Some(-1e9), Direction::Minimize),
            Ordering::Greater
        );
    }

    #[test]
    fn test_dominance() {
        assert!(dominates(&[Some(2.0), Some(2.0)], &[Some(1.0), Some(2.0)], &MAX2));
        assert!(!dominates(&[Some(2.0), Some(1.0)], &[Some(1.0), Some(2.0)], &MAX2));
        assert!(!dominates(&[Some(1.0), Some(1.0)], &[Some(1.0), Some(1.0)], &MAX2));
        assert!(dominates(&[Some(0.0), Some(0.0)], &[None, Some(0.0)], &MAX2));
    }

    #[test]
    fn test_single_objective_ties_by_trial_id() {
        let trials = vec![
            trial(3, &[Some(5.0)], true),
            trial(1, &[Some(5.0)], true),
            trial(2, &[Some(9.0)], true),
            trial(0, &[None], true),
        ];
        let ranked = rank_trials(trials, &[Direction::Maximize]);
        assert_eq!(ids(&ranked), [2, 1, 3, 0]);
    }

    #[test]
    fn test_single_objective_infeasible_last() {
        let trials = vec![trial(0, &[Some(100.0)], false), trial(1, &[Some(1.0)], true)];
        let ranked = rank_trials(trials, &[Direction::Maximize]);
        assert_eq!(ids(&ranked), [1, 0]);
    }

    #[test]
    fn test_multi_objective_pareto_first() {
        let trials = vec![
            trial(0, &[Some(1.0), Some(1.0)], true), // dominated
            trial(1, &[Some(3.0), Some(1.0)], true),
            trial(2, &[Some(1.0), Some(3.0)], true),
            trial(3, &[Some(2.0), Some(0.5)], true), // dominated by 1
        ];
        let ranked = rank_trials(trials, &MAX2);
        assert_eq!(ids(&ranked), [1, 2, 3, 0]);
        assert!(ranked[0].is_pareto && ranked[1].is_pareto);
        assert!(!ranked[2].is_pareto && !ranked[3].is_pareto);
    }

    #[test]
    fn test_pareto_computed_among_feasible_only() {
        let trials = vec![
            trial(0, &[Some(10.0), Some(10.0)], false), // dominates all, infeasible
            trial(1, &[Some(2.0), Some(2.0)], true),
            trial(2, &[Some(1.0), Some(1.0)], true),
        ];
        let ranked = rank_trials(trials, &MAX2);
        assert_eq!(ids(&ranked), [1, 2, 0]);
        assert!(ranked[0].is_pareto);
        assert!(!ranked[2].is_pareto);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let make = || {
            (0..20)
                .map(|i| trial(i, &[Some((i % 4) as f64), Some((i % 3) as f64)], i % 5 != 0))
                .collect::<Vec<_>>()
        };
        let mut shuffled = make();
        shuffled.reverse();
        assert_eq!(ids(&rank_trials(make(), &MAX2)), ids(&rank_trials(shuffled, &MAX2)));
    }

    #[test]
    fn test_non_dominated_ranks_and_crowding() {
        let a = [Some(1.0), Some(4.0)];
        let b = [Some(2.0), Some(3.0)];
        let c = [Some(4.0), Some(1.0)];
        let d = [Some(1.0), Some(1.0)];
        let points: Vec<&[Option<f64>]> = vec![&a, &b, &c, &d];
        assert_eq!(non_dominated_ranks(&points, &MAX2), vec![0, 0, 0, 1]);

        let front: Vec<&[Option<f64>]> = vec![&a, &b, &c];
        let crowding = crowding_distances(&front, &MAX2);
        assert!(crowding[0].is_infinite() && crowding[2].is_infinite());
        assert!((crowding[1] - 2.0).abs() < 1e-12);
    }
}
