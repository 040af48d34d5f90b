//! Walk-forward optimization of externally simulated strategies.
//!
//! This module provides the optimization side of a backtesting workflow:
//!
//! - **Windows**: fixed or trigger-driven adaptive IS/OOS windows over one series
//! - **Search**: coverage-seeded, budgeted parameter search with TPE, NSGA-II
//!   or random sampling, median pruning and Pareto ranking
//! - **Stitching**: OOS segments joined into one continuous equity curve
//! - **Forward test**: top candidates re-evaluated on an untouched holdout
//!
//! Strategy simulation is delegated to a [`BacktestSimulator`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wfo_engine::backtest::{ParameterSpace, WalkForwardBuilder, WindowMode};
//!
//! let engine = WalkForwardBuilder::new(Arc::new(my_simulator))
//!     .mode(WindowMode::Adaptive)
//!     .is_period_days(180)
//!     .build()?;
//!
//! let space = ParameterSpace::builder()
//!     .int("fast", 5, 50, 5)
//!     .int("slow", 20, 200, 10);
//!
//! let result = engine.run(&series, &space)?;
//! println!("OOS profit: {:.2}%", result.stitched.net_profit_pct);
//! ```

pub mod coverage;
pub mod forward_test;
pub mod metrics;
pub mod parallel;
pub mod params;
pub mod search;
pub mod simulator;
pub mod walkforward;

pub use coverage::{CoverageRequirements, CoverageScheduler};
pub use forward_test::{ForwardTestConfig, ForwardTestReport, ForwardTestValidator};
pub use metrics::{MetricKey, MetricSnapshot, MetricsCalculator};
pub use parallel::{CancellationToken, ParallelConfig, WorkerPool};
pub use params::{ParamSet, ParamValue, ParameterSpace};
pub use search::{Objective, ParameterSearchEngine, SearchConfig, SearchOutcome};
pub use simulator::{
    BacktestSimulator, Bar, BarRange, PriceSeries, SimulationError, SimulationResult, Trade,
};
pub use walkforward::{
    WalkForwardBuilder, WalkForwardConfig, WalkForwardEngine, WalkForwardResult, WindowMode,
};
