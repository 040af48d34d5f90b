// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call,
        clippy::cast_possible_wrap
    )
)]

//! Walk-Forward Optimization Engine - Rust Core Library
//!
//! Deterministic walk-forward validation of trading-strategy parameters for
//! the Cream trading system.
//!
//! # Architecture
//!
//! Components, leaf first:
//!
//! - **Metrics**: basic and advanced performance metrics of one simulation
//!   - `MetricsCalculator`: net profit, drawdown, Sharpe, Sortino, RoMaD, ...
//! - **Coverage**: deterministic initial trials covering every categorical
//!   combination
//! - **Search**: budgeted, constrained, single- or multi-objective trial search
//!   - samplers: TPE, NSGA-II, random
//!   - median pruning, Pareto ranking
//! - **Walk-forward**: window planning, adaptive triggers, OOS stitching
//! - **Forward test**: top candidates re-run on a true holdout
//!
//! Strategy simulation is external: callers implement
//! [`backtest::BacktestSimulator`].
//!
//! Supporting modules:
//!
//! - `config`: YAML run configuration with environment interpolation
//! - `telemetry`: `tracing` subscriber setup
//! - `observability`: `metrics` counters and histograms

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Walk-forward optimization core.
pub mod backtest;

/// Run configuration loading and validation.
pub mod config;

/// Crate-level error type.
pub mod error;

/// Metrics facade instrumentation.
pub mod observability;

/// Tracing subscriber setup.
pub mod telemetry;

pub use backtest::{
    BacktestSimulator, ParameterSpace, PriceSeries, WalkForwardBuilder, WalkForwardConfig,
    WalkForwardEngine, WalkForwardResult,
};
pub use config::{ConfigError, RunConfig, load_config, load_config_from_string};
pub use error::WalkForwardError;
