//! Deterministic initial trial schedule.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::primary::{NamePairingSelector, PrimaryAxisSelector};
use crate::backtest::params::{
    CategoricalAxis, NumericAxis, ParamSet, ParamValue, ParameterSpace, SpaceError,
};

const GAP_EPSILON: f64 = 1e-12;
const ROTATION_STRIDE: usize = 7;

/// Trial counts needed for full categorical coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRequirements {
    /// Product of categorical choice counts (1 if none).
    pub combinations: usize,
    /// Minimum trials to see every combination once.
    pub n_min: usize,
    /// Recommended trials (every combination at two anchors).
    pub n_rec: usize,
}

/// Builds the initial trial vectors that run before any adaptive sampler.
///
/// Pure index arithmetic: the same space and trial count always produce the
/// same ordered output.
#[derive(Debug)]
pub struct CoverageScheduler {
    selector: Box<dyn PrimaryAxisSelector>,
}

impl Default for CoverageScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverageScheduler {
    /// Scheduler using [`NamePairingSelector`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_selector(Box::new(NamePairingSelector))
    }

    /// Scheduler with a custom primary-axis selector.
    #[must_use]
    pub fn with_selector(selector: Box<dyn PrimaryAxisSelector>) -> Self {
        Self { selector }
    }

    /// Coverage requirements of `space`.
    ///
    /// # Errors
    ///
    /// [`SpaceError::TooManyCombinations`] if the combination count
    /// overflows.
    pub fn requirements(space: &ParameterSpace) -> Result<CoverageRequirements, SpaceError> {
        let combinations = space.combination_count()?;
        Ok(CoverageRequirements {
            combinations,
            n_min: combinations,
            n_rec: combinations.saturating_mul(2),
        })
    }

    /// Generate `n_trials` initial parameter sets.
    ///
    /// Full blocks enumerate every categorical combination with the primary
    /// numeric axis at that block's anchor; a trailing partial block covers
    /// a rotated slice of combinations at the next anchor.
    pub fn generate_initial_trials(
        &self,
        space: &ParameterSpace,
        n_trials: usize,
    ) -> Result<Vec<ParamSet>, SpaceError> {
        if space.optimizable().next().is_none() {
            return Err(SpaceError::NoOptimizableParameters);
        }

        let categorical = space.categorical_axes();
        let numeric = space.numeric_axes();
        let combinations = space.combination_count()?;
        let primary = self.selector.select(&categorical, &numeric);
        let full_blocks = n_trials / combinations;
        let remainder = n_trials % combinations;
        let anchors = anchor_fractions(full_blocks);
        let base = space.fixed_values();

        debug!(
            n_trials,
            combinations,
            full_blocks,
            remainder,
            primary = primary.map(|i| numeric[i].name.as_str()),
            "Generating coverage schedule"
        );

        let mut trials = Vec::with_capacity(n_trials);
        for &anchor in &anchors {
            for combo in 0..combinations {
                trials.push(build_trial(
                    &base,
                    &categorical,
                    &numeric,
                    primary,
                    combo,
                    anchor,
                ));
            }
        }

        if remainder > 0 {
            let anchor = partial_block_anchor(&anchors);
            let offset = full_blocks.wrapping_mul(ROTATION_STRIDE) % combinations;
            for j in 0..remainder {
                let combo = (offset + j) % combinations;
                trials.push(build_trial(
                    &base,
                    &categorical,
                    &numeric,
                    primary,
                    combo,
                    anchor,
                ));
            }
        }

        Ok(trials)
    }
}

/// Primary-axis anchor fractions for `blocks` full blocks.
///
/// `[0.5]` for one block, `[1/3, 2/3]` for two, evenly spaced from 0 to 1
/// for three or more.
#[must_use]
pub fn anchor_fractions(blocks: usize) -> Vec<f64> {
    match blocks {
        0 => Vec::new(),
        1 => vec![0.5],
        2 => vec![1.0 / 3.0, 2.0 / 3.0],
        n => (0..n).map(|i| i as f64 / (n - 1) as f64).collect(),
    }
}

/// Midpoint of the widest gap in `[0, 1]` left by `anchors`.
#[must_use]
pub fn partial_block_anchor(anchors: &[f64]) -> f64 {
    if anchors.is_empty() {
        return 0.5;
    }

    let mut points = Vec::with_capacity(anchors.len() + 2);
    points.push(0.0);
    points.extend_from_slice(anchors);
    points.push(1.0);
    points.sort_by(f64::total_cmp);

    let mut best = (0.0, 0.5);
    for pair in points.windows(2) {
        let width = pair[1] - pair[0];
        if width > best.0 + GAP_EPSILON {
            best = (width, f64::midpoint(pair[0], pair[1]));
        }
    }
    best.1
}

fn build_trial(
    base: &ParamSet,
    categorical: &[CategoricalAxis],
    numeric: &[NumericAxis],
    primary: Option<usize>,
    combo: usize,
    anchor: f64,
) -> ParamSet {
    let mut params = base.clone();

    // Mixed-radix decode, last axis varies fastest.
    let mut rest = combo;
    for axis in categorical.iter().rev() {
        let len = axis.choices.len().max(1);
        if let Some(choice) = axis.choices.get(rest % len) {
            params.insert(axis.name.clone(), choice.clone());
        }
        rest /= len;
    }

    for (i, axis) in numeric.iter().enumerate() {
        let fraction = if primary == Some(i) { anchor } else { 0.5 };
        params.insert(axis.name.clone(), axis.value_at(fraction));
    }

    params
}

/// Categorical combination of a trial, in declaration order.
#[must_use]
pub fn categorical_key(params: &ParamSet, categorical: &[CategoricalAxis]) -> Vec<ParamValue> {
    categorical
        .iter()
        .filter_map(|axis| params.get(&axis.name).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use test_case::test_case;

    use super::*;
    use crate::backtest::coverage::primary::NoPrimaryAxis;

    fn space() -> ParameterSpace {
        ParameterSpace::builder()
            .categorical("ma_type", &["SMA", "EMA", "HMA"])
            .boolean("use_filter")
            .int("ma_length", 10, 100, 10)
            .float("stop_pct", 1.0, 3.0, Some(0.5))
    }

    fn keys(trials: &[ParamSet]) -> Vec<String> {
        let categorical = space().categorical_axes();
        trials
            .iter()
            .map(|t| format!("{:?}", categorical_key(t, &categorical)))
            .collect()
    }

    #[test]
    fn test_requirements() {
        let req = CoverageScheduler::requirements(&space()).unwrap();
        assert_eq!(req.combinations, 6);
        assert_eq!(req.n_min, 6);
        assert_eq!(req.n_rec, 12);

        let numeric_only = ParameterSpace::builder().int("n", 1, 5, 1);
        assert_eq!(CoverageScheduler::requirements(&numeric_only).unwrap().n_min, 1);
    }

    #[test]
    fn test_full_block_covers_every_combination_once() {
        let trials = CoverageScheduler::new()
            .generate_initial_trials(&space(), 6)
            .unwrap();

        let unique: HashSet<String> = keys(&trials).into_iter().collect();
        assert_eq!(trials.len(), 6);
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn test_first_axis_varies_slowest() {
        let trials = CoverageScheduler::new()
            .generate_initial_trials(&space(), 6)
            .unwrap();

        let ma_types: Vec<_> = trials.iter().map(|t| t["ma_type"].as_str()).collect();
        assert_eq!(ma_types, ["SMA", "SMA", "EMA", "EMA", "HMA", "HMA"]);
        assert_eq!(trials[0]["use_filter"], ParamValue::Bool(false));
        assert_eq!(trials[1]["use_filter"], ParamValue::Bool(true));
    }

    #[test]
    fn test_output_is_deterministic() {
        let scheduler = CoverageScheduler::new();
        let first = scheduler.generate_initial_trials(&space(), 17).unwrap();
        let second = scheduler.generate_initial_trials(&space(), 17).unwrap();
        assert_eq!(first, second);
    }

    #[test_case(1 => vec![0.5] ; "one block")]
    #[test_case(2 => vec![1.0 / 3.0, 2.0 / 3.0] ; "two blocks")]
    #[test_case(3 => vec![0.0, 0.5, 1.0] ; "three blocks")]
    #[test_case(4 => vec![0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0] ; "four blocks")]
    fn test_anchor_table(blocks: usize) -> Vec<f64> {
        anchor_fractions(blocks)
    }

    #[test_case(&[] => 0.5 ; "no full block")]
    #[test_case(&[0.5] => 0.25 ; "lowest of equal gaps")]
    #[test_case(&[1.0 / 3.0, 2.0 / 3.0] => 1.0 / 6.0 ; "three equal gaps")]
    #[test_case(&[0.0, 0.5, 1.0] => 0.25 ; "endpoints covered")]
    fn test_partial_block_anchor(anchors: &[f64]) -> f64 {
        partial_block_anchor(anchors)
    }

    #[test]
    fn test_primary_axis_swept_and_others_at_midpoint() {
        let trials = CoverageScheduler::new()
            .generate_initial_trials(&space(), 12)
            .unwrap();

        // Two blocks: 10 + 90 * 1/3 = 40, 10 + 90 * 2/3 = 70.
        assert_eq!(trials[0]["ma_length"], ParamValue::Int(40));
        assert_eq!(trials[6]["ma_length"], ParamValue::Int(70));
        // Midpoint 2.0 is exactly a step level.
        assert!(trials.iter().all(|t| t["stop_pct"] == ParamValue::Float(2.0)));
    }

    #[test]
    fn test_partial_block_rotates_from_block_index() {
        let trials = CoverageScheduler::new()
            .generate_initial_trials(&space(), 8)
            .unwrap();
        assert_eq!(trials.len(), 8);

        // One full block, so offset = 7 mod 6 = 1 and anchor = 0.25.
        let full = keys(&trials[..6]);
        let partial = keys(&trials[6..]);
        assert_eq!(partial, vec![full[1].clone(), full[2].clone()]);
        // 10 + 90 * 0.25 = 32.5 snaps to the nearest level.
        assert_eq!(trials[6]["ma_length"], ParamValue::Int(30));
    }

    #[test]
    fn test_budget_below_combinations() {
        let trials = CoverageScheduler::new()
            .generate_initial_trials(&space(), 4)
            .unwrap();
        let ma_types: Vec<_> = trials.iter().map(|t| t["ma_type"].as_str()).collect();
        assert_eq!(ma_types, ["SMA", "SMA", "EMA", "EMA"]);
        assert_eq!(trials[0]["ma_length"], ParamValue::Int(50));
    }

    #[test]
    fn test_no_primary_axis_keeps_midpoints() {
        let scheduler = CoverageScheduler::with_selector(Box::new(NoPrimaryAxis));
        let trials = scheduler.generate_initial_trials(&space(), 18).unwrap();
        assert!(trials.iter().all(|t| t["ma_length"] == ParamValue::Int(50)));
    }

    #[test]
    fn test_fixed_parameters_are_carried() {
        let space = space().fixed("stop_pct", ParamValue::Float(1.5));
        let trials = CoverageScheduler::new()
            .generate_initial_trials(&space, 6)
            .unwrap();
        assert!(trials.iter().all(|t| t["stop_pct"] == ParamValue::Float(1.5)));
    }

    #[test]
    fn test_overflowing_space_is_rejected() {
        let choices: Vec<String> = (0..256).map(|c| format!("c{c}")).collect();
        let refs: Vec<&str> = choices.iter().map(String::as_str).collect();
        let space = (0..9).fold(ParameterSpace::builder(), |space, axis| {
            space.categorical(&format!("cat_{axis}"), &refs)
        });

        assert_eq!(
            CoverageScheduler::requirements(&space),
            Err(SpaceError::TooManyCombinations)
        );
        assert_eq!(
            CoverageScheduler::new().generate_initial_trials(&space, 4),
            Err(SpaceError::TooManyCombinations)
        );
    }

    #[test]
    fn test_rejects_space_without_optimizable_parameters() {
        let space = ParameterSpace::builder()
            .int("n", 1, 5, 1)
            .fixed("n", ParamValue::Int(3));
        assert_eq!(
            CoverageScheduler::new().generate_initial_trials(&space, 4),
            Err(SpaceError::NoOptimizableParameters)
        );
    }
}
