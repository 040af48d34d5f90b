//! Walk-forward optimization.
//!
//! Each window optimizes parameters on an in-sample (IS) span and tests the
//! winner on the out-of-sample (OOS) span that follows it. Only OOS results
//! are stitched into the reported equity curve:
//! - Fixed windows: constant IS/OOS lengths rolled forward by the OOS length
//! - Adaptive windows: OOS ends when a performance-degradation trigger fires
//! - Optional true holdout re-evaluated after the last window

mod builder;
mod engine;
mod planner;
mod stitch;
mod trigger;
mod types;

pub use builder::WalkForwardBuilder;
pub use engine::WalkForwardEngine;
pub use planner::{PlanOutcome, WindowPlanner, fixed_layout};
pub use stitch::{OOSSegment, OOSStitcher, StitchedResult};
pub use trigger::{IsBaseline, TriggerDetector};
pub use types::{
    AdaptiveConfig, DetectedTrigger, FailedWindow, TriggerKind, WalkForwardConfig,
    WalkForwardResult, Window, WindowBounds, WindowMode, WindowResult, span_days,
};
