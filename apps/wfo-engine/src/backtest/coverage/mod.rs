//! Deterministic initial coverage of the categorical parameter space.
//!
//! Before any adaptive sampler runs, the search evaluates a schedule that
//! visits every categorical combination while sweeping one primary numeric
//! axis across blocks.

mod primary;
mod scheduler;

pub use primary::{FixedPrimaryAxis, NamePairingSelector, NoPrimaryAxis, PrimaryAxisSelector};
pub use scheduler::{
    CoverageRequirements, CoverageScheduler, anchor_fractions, categorical_key,
    partial_block_anchor,
};
