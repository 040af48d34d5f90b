//! True-holdout forward test.
//!
//! A trailing slice of the series is removed before optimization and only
//! used afterwards to re-evaluate the best parameter sets of the final
//! window's search.

mod holdout;
mod validator;

pub use holdout::{HoldoutSplit, split_holdout};
pub use validator::{
    ForwardTestCandidate, ForwardTestConfig, ForwardTestReport, ForwardTestSort,
    ForwardTestValidator, profit_degradation,
};
