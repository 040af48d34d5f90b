//! Core types for walk-forward analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stitch::{OOSSegment, StitchedResult};
use crate::backtest::forward_test::{ForwardTestConfig, ForwardTestReport};
use crate::backtest::metrics::MetricSnapshot;
use crate::backtest::params::ParamSet;
use crate::backtest::search::SearchOutcome;
use crate::backtest::simulator::PriceSeries;
use crate::error::WalkForwardError;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// How OOS windows are sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowMode {
    /// Constant IS/OOS lengths rolled forward by the OOS length.
    #[default]
    Fixed,
    /// OOS grows until a re-optimization trigger fires.
    Adaptive,
}

/// Why an adaptive window closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fixed window; no trigger applies.
    #[default]
    None,
    /// CUSUM drift of trade returns.
    Cusum,
    /// OOS drawdown exceeded the IS drawdown allowance.
    Drawdown,
    /// Trading slowed below the IS rate.
    Inactivity,
    /// Maximum OOS length reached without a trigger.
    MaxPeriod,
}

impl TriggerKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cusum => "cusum",
            Self::Drawdown => "drawdown",
            Self::Inactivity => "inactivity",
            Self::MaxPeriod => "max_period",
        }
    }
}

/// A trigger reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectedTrigger {
    /// CUSUM drift of trade returns.
    Cusum,
    /// Drawdown allowance exceeded.
    Drawdown,
    /// Trade rate collapsed.
    Inactivity,
}

impl From<DetectedTrigger> for TriggerKind {
    fn from(trigger: DetectedTrigger) -> Self {
        match trigger {
            DetectedTrigger::Cusum => Self::Cusum,
            DetectedTrigger::Drawdown => Self::Drawdown,
            DetectedTrigger::Inactivity => Self::Inactivity,
        }
    }
}

/// Adaptive-mode settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    /// Longest OOS window in days.
    pub max_oos_period_days: u32,
    /// Trades required before the detector is polled.
    pub min_oos_trades: usize,
    /// Poll the detector every this many trades.
    pub check_interval_trades: usize,
    /// CUSUM alarm level in IS standard deviations.
    pub cusum_threshold: f64,
    /// OOS drawdown allowance as a multiple of the IS drawdown.
    pub dd_threshold_multiplier: f64,
    /// Divisor applied to the IS trade rate for the inactivity floor.
    pub inactivity_multiplier: f64,
    /// Enable the CUSUM check.
    pub cusum_enabled: bool,
    /// Enable the drawdown check.
    pub drawdown_enabled: bool,
    /// Enable the inactivity check.
    pub inactivity_enabled: bool,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            max_oos_period_days: 90,
            min_oos_trades: 5,
            check_interval_trades: 3,
            cusum_threshold: 5.0,
            dd_threshold_multiplier: 1.5,
            inactivity_multiplier: 5.0,
            cusum_enabled: true,
            drawdown_enabled: true,
            inactivity_enabled: true,
        }
    }
}

/// Walk-forward settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardConfig {
    /// Window sizing mode.
    pub mode: WindowMode,
    /// IS length in days.
    pub is_period_days: u32,
    /// OOS length in days (fixed mode).
    pub oos_period_days: u32,
    /// Adaptive-mode settings.
    pub adaptive: AdaptiveConfig,
    /// Indicator lookback handed to the simulator before each range.
    pub warmup_bars: usize,
    /// Holdout forward test.
    pub forward_test: ForwardTestConfig,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            mode: WindowMode::Fixed,
            is_period_days: 90,
            oos_period_days: 30,
            adaptive: AdaptiveConfig::default(),
            warmup_bars: 0,
            forward_test: ForwardTestConfig::default(),
        }
    }
}

impl WalkForwardConfig {
    /// Check periods and thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`WalkForwardError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), WalkForwardError> {
        let invalid = |msg: &str| Err(WalkForwardError::InvalidConfig(msg.to_string()));

        if self.is_period_days == 0 {
            return invalid("is_period_days must be positive");
        }
        match self.mode {
            WindowMode::Fixed if self.oos_period_days == 0 => {
                return invalid("oos_period_days must be positive");
            }
            WindowMode::Adaptive => {
                let a = &self.adaptive;
                if a.max_oos_period_days == 0 {
                    return invalid("adaptive.max_oos_period_days must be positive");
                }
                if a.check_interval_trades == 0 {
                    return invalid("adaptive.check_interval_trades must be positive");
                }
                if !(a.cusum_threshold > 0.0) {
                    return invalid("adaptive.cusum_threshold must be positive");
                }
                if !(a.dd_threshold_multiplier > 0.0) {
                    return invalid("adaptive.dd_threshold_multiplier must be positive");
                }
                if !(a.inactivity_multiplier > 0.0) {
                    return invalid("adaptive.inactivity_multiplier must be positive");
                }
            }
            WindowMode::Fixed => {}
        }
        if self.forward_test.enabled {
            if self.forward_test.holdout_days == 0 {
                return invalid("forward_test.holdout_days must be positive");
            }
            if self.forward_test.top_k == 0 {
                return invalid("forward_test.top_k must be at least 1");
            }
        }
        Ok(())
    }
}

/// Bar-exact layout of one window.
///
/// `oos_end_bar` is inclusive. `is_end` equals `oos_start`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    /// Window number, 0-based.
    pub index: usize,
    /// First IS bar.
    pub is_start_bar: usize,
    /// First OOS bar (one past the last IS bar).
    pub oos_start_bar: usize,
    /// Last OOS bar.
    pub oos_end_bar: usize,
    /// Timestamp of the first IS bar.
    pub is_start: DateTime<Utc>,
    /// Exclusive IS end; equals `oos_start`.
    pub is_end: DateTime<Utc>,
    /// Timestamp of the first OOS bar.
    pub oos_start: DateTime<Utc>,
    /// Timestamp of the last OOS bar.
    pub oos_end: DateTime<Utc>,
    /// OOS span up to the exclusive end of the last OOS bar, in days.
    pub actual_oos_days: f64,
}

impl WindowBounds {
    /// Resolve timestamps for a bar layout. `None` if the layout is empty or
    /// outside the series.
    #[must_use]
    pub fn from_bars(
        series: &PriceSeries,
        index: usize,
        is_start_bar: usize,
        oos_start_bar: usize,
        oos_end_bar: usize,
    ) -> Option<Self> {
        if is_start_bar >= oos_start_bar || oos_start_bar > oos_end_bar {
            return None;
        }
        let is_start = series.timestamp(is_start_bar)?;
        let oos_start = series.timestamp(oos_start_bar)?;
        let oos_end = series.timestamp(oos_end_bar)?;
        let oos_exclusive_end = series.bar_end(oos_end_bar)?;
        Some(Self {
            index,
            is_start_bar,
            oos_start_bar,
            oos_end_bar,
            is_start,
            is_end: oos_start,
            oos_start,
            oos_end,
            actual_oos_days: span_days(oos_start, oos_exclusive_end),
        })
    }

    /// IS span in days.
    #[must_use]
    pub fn is_days(&self) -> f64 {
        span_days(self.is_start, self.is_end)
    }

    /// Number of OOS bars.
    #[must_use]
    pub const fn oos_bars(&self) -> usize {
        self.oos_end_bar + 1 - self.oos_start_bar
    }
}

/// Span between two timestamps in fractional days.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn span_days(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_seconds() as f64 / SECONDS_PER_DAY
}

/// A planned and evaluated window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Boundaries.
    #[serde(flatten)]
    pub bounds: WindowBounds,
    /// Why the OOS closed.
    pub trigger_kind: TriggerKind,
    /// Parameters chosen on the IS slice.
    pub params: ParamSet,
    /// IS metrics of the chosen parameters.
    pub is_metrics: MetricSnapshot,
}

impl Window {
    /// Window number.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.bounds.index
    }
}

/// Everything produced for one successful window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    /// The window.
    pub window: Window,
    /// OOS metrics of the chosen parameters.
    pub oos_metrics: MetricSnapshot,
    /// OOS equity segment for stitching.
    pub segment: OOSSegment,
    /// The IS search that chose the parameters.
    pub search: SearchOutcome,
}

/// A window that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedWindow {
    /// Window number.
    pub index: usize,
    /// First IS bar timestamp.
    pub is_start: DateTime<Utc>,
    /// First OOS bar timestamp.
    pub oos_start: DateTime<Utc>,
    /// Failure reason.
    pub reason: String,
}

/// Complete walk-forward run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    /// Configuration used.
    pub config: WalkForwardConfig,
    /// Successful windows in order.
    pub windows: Vec<WindowResult>,
    /// Skipped windows.
    pub failed_windows: Vec<FailedWindow>,
    /// Stitched OOS performance.
    pub stitched: StitchedResult,
    /// Holdout validation, when enabled.
    pub forward_test: Option<ForwardTestReport>,
}

impl WalkForwardResult {
    /// Window layouts in order.
    pub fn windows(&self) -> impl Iterator<Item = &Window> {
        self.windows.iter().map(|w| &w.window)
    }
}
