//! Coverage schedule invariants over generated parameter spaces.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;

use proptest::prelude::*;

use wfo_engine::backtest::ParameterSpace;
use wfo_engine::backtest::coverage::{CoverageScheduler, categorical_key};

fn build_space(choice_counts: &[usize]) -> ParameterSpace {
    let mut space = ParameterSpace::builder().int("length", 10, 200, 5);
    for (axis, &count) in choice_counts.iter().enumerate() {
        let choices: Vec<String> = (0..count).map(|c| format!("c{c}")).collect();
        let refs: Vec<&str> = choices.iter().map(String::as_str).collect();
        space = space.categorical(&format!("cat_{axis}"), &refs);
    }
    space
}

fn combination_counts(space: &ParameterSpace, trials: usize) -> HashMap<String, usize> {
    let categorical = space.categorical_axes();
    let schedule = CoverageScheduler::new()
        .generate_initial_trials(space, trials)
        .unwrap();
    assert_eq!(schedule.len(), trials);

    let mut counts = HashMap::new();
    for params in &schedule {
        let key = format!("{:?}", categorical_key(params, &categorical));
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

proptest! {
    #[test]
    fn prop_one_block_covers_every_combination_once(
        choice_counts in prop::collection::vec(2_usize..5, 1..4),
    ) {
        let space = build_space(&choice_counts);
        let combinations = CoverageScheduler::requirements(&space).unwrap().combinations;
        prop_assert_eq!(combinations, choice_counts.iter().product::<usize>());

        let counts = combination_counts(&space, combinations);
        prop_assert_eq!(counts.len(), combinations);
        prop_assert!(counts.values().all(|&n| n == 1));
    }

    #[test]
    fn prop_full_blocks_repeat_each_combination(
        choice_counts in prop::collection::vec(2_usize..4, 1..3),
        blocks in 1_usize..5,
    ) {
        let space = build_space(&choice_counts);
        let combinations = CoverageScheduler::requirements(&space).unwrap().combinations;

        let counts = combination_counts(&space, combinations * blocks);
        prop_assert_eq!(counts.len(), combinations);
        prop_assert!(counts.values().all(|&n| n == blocks));
    }

    #[test]
    fn prop_schedule_is_deterministic(
        choice_counts in prop::collection::vec(2_usize..5, 0..3),
        trials in 1_usize..40,
    ) {
        let space = build_space(&choice_counts);
        let scheduler = CoverageScheduler::new();
        let a = scheduler.generate_initial_trials(&space, trials).unwrap();
        let b = scheduler.generate_initial_trials(&space, trials).unwrap();
        prop_assert_eq!(a, b);
    }
}
