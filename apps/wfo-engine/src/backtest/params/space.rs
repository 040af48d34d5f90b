//! Parameter space declaration and axis helpers.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::value::{ParamSet, ParamValue};

/// Tolerance used when deciding whether a value sits exactly halfway
/// between two step levels.
const HALF_STEP_EPSILON: f64 = 1e-9;

/// Errors raised while validating a parameter space.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpaceError {
    /// No parameter is marked optimizable.
    #[error("Parameter space has no optimizable parameters")]
    NoOptimizableParameters,

    /// A parameter name appears twice.
    #[error("Duplicate parameter name '{0}'")]
    DuplicateName(String),

    /// The categorical choice counts multiply past `usize::MAX`.
    #[error("Too many categorical combinations to enumerate")]
    TooManyCombinations,

    /// Bounds, step or choices are unusable.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidBounds {
        /// Parameter name.
        name: String,
        /// What is wrong.
        reason: String,
    },
}

/// Kind and domain of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    /// Integer range (inclusive).
    Int {
        /// Lower bound.
        low: i64,
        /// Upper bound.
        high: i64,
        /// Step between levels.
        #[serde(default = "default_int_step")]
        step: i64,
    },
    /// Float range (inclusive), optionally stepped.
    Float {
        /// Lower bound.
        low: f64,
        /// Upper bound.
        high: f64,
        /// Step between levels (continuous if absent).
        #[serde(default)]
        step: Option<f64>,
    },
    /// Fixed set of choices.
    Categorical {
        /// Choices in declaration order.
        choices: Vec<String>,
    },
    /// Boolean flag.
    Bool,
}

const fn default_int_step() -> i64 {
    1
}

/// A declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Kind and domain.
    #[serde(flatten)]
    pub kind: ParamKind,
    /// Whether the optimizer searches this parameter.
    #[serde(default = "default_optimize")]
    pub optimize: bool,
    /// Value used when the parameter is not optimized.
    #[serde(default)]
    pub default: Option<ParamValue>,
}

const fn default_optimize() -> bool {
    true
}

impl ParamSpec {
    /// Whether the parameter is categorical or boolean.
    #[must_use]
    pub const fn is_categorical(&self) -> bool {
        matches!(self.kind, ParamKind::Categorical { .. } | ParamKind::Bool)
    }

    /// Value used when not optimized: the declared default, otherwise the
    /// first choice or the midpoint.
    #[must_use]
    pub fn fixed_value(&self) -> ParamValue {
        if let Some(value) = &self.default {
            return value.clone();
        }
        match &self.kind {
            ParamKind::Categorical { choices } => choices
                .first()
                .map_or(ParamValue::String(String::new()), |c| {
                    ParamValue::String(c.clone())
                }),
            ParamKind::Bool => ParamValue::Bool(false),
            _ => NumericAxis::from_spec(self).map_or(ParamValue::Int(0), |axis| axis.value_at(0.5)),
        }
    }

    fn validate(&self) -> Result<(), SpaceError> {
        let invalid = |reason: &str| SpaceError::InvalidBounds {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        match &self.kind {
            ParamKind::Int { low, high, step } => {
                if low > high {
                    return Err(invalid("low must not exceed high"));
                }
                if *step <= 0 {
                    return Err(invalid("step must be positive"));
                }
            }
            ParamKind::Float { low, high, step } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(invalid("bounds must be finite with low <= high"));
                }
                if step.is_some_and(|s| !s.is_finite() || s <= 0.0) {
                    return Err(invalid("step must be positive"));
                }
            }
            ParamKind::Categorical { choices } => {
                if choices.is_empty() {
                    return Err(invalid("at least one choice is required"));
                }
                let unique: HashSet<&String> = choices.iter().collect();
                if unique.len() != choices.len() {
                    return Err(invalid("choices must be unique"));
                }
            }
            ParamKind::Bool => {}
        }
        Ok(())
    }
}

/// Ordered parameter space, built once per run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSpace {
    params: Vec<ParamSpec>,
}

impl ParameterSpace {
    /// Create a space from specs in declaration order.
    #[must_use]
    pub const fn new(params: Vec<ParamSpec>) -> Self {
        Self { params }
    }

    /// Start an empty space for builder-style declaration.
    #[must_use]
    pub fn builder() -> Self {
        Self::default()
    }

    /// Declare an optimizable integer range.
    #[must_use]
    pub fn int(mut self, name: &str, low: i64, high: i64, step: i64) -> Self {
        self.push(name, ParamKind::Int { low, high, step });
        self
    }

    /// Declare an optimizable float range.
    #[must_use]
    pub fn float(mut self, name: &str, low: f64, high: f64, step: Option<f64>) -> Self {
        self.push(name, ParamKind::Float { low, high, step });
        self
    }

    /// Declare an optimizable categorical parameter.
    #[must_use]
    pub fn categorical(mut self, name: &str, choices: &[&str]) -> Self {
        let choices = choices.iter().map(|c| (*c).to_string()).collect();
        self.push(name, ParamKind::Categorical { choices });
        self
    }

    /// Declare an optimizable boolean.
    #[must_use]
    pub fn boolean(mut self, name: &str) -> Self {
        self.push(name, ParamKind::Bool);
        self
    }

    /// Fix a parameter at `value`.
    ///
    /// A declared parameter keeps its domain and stops being optimized. An
    /// undeclared name is appended as a fixed parameter whose domain is
    /// `value` alone.
    #[must_use]
    pub fn fixed(mut self, name: &str, value: ParamValue) -> Self {
        if let Some(spec) = self.params.iter_mut().find(|p| p.name == name) {
            spec.optimize = false;
            spec.default = Some(value);
            return self;
        }

        let kind = match &value {
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Int(v) => ParamKind::Int {
                low: *v,
                high: *v,
                step: 1,
            },
            ParamValue::Float(v) => ParamKind::Float {
                low: *v,
                high: *v,
                step: None,
            },
            ParamValue::String(v) => ParamKind::Categorical {
                choices: vec![v.clone()],
            },
        };
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            optimize: false,
            default: Some(value),
        });
        self
    }

    fn push(&mut self, name: &str, kind: ParamKind) {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            optimize: true,
            default: None,
        });
    }

    /// All declared parameters.
    #[must_use]
    pub fn specs(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Parameters the optimizer searches, in declaration order.
    pub fn optimizable(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.optimize)
    }

    /// Optimizable categorical and boolean axes.
    #[must_use]
    pub fn categorical_axes(&self) -> Vec<CategoricalAxis> {
        self.optimizable()
            .filter_map(CategoricalAxis::from_spec)
            .collect()
    }

    /// Optimizable numeric axes.
    #[must_use]
    pub fn numeric_axes(&self) -> Vec<NumericAxis> {
        self.optimizable().filter_map(NumericAxis::from_spec).collect()
    }

    /// Parameter set holding the fixed value of every non-optimized parameter.
    #[must_use]
    pub fn fixed_values(&self) -> ParamSet {
        self.params
            .iter()
            .filter(|p| !p.optimize)
            .map(|p| (p.name.clone(), p.fixed_value()))
            .collect()
    }

    /// Number of categorical combinations among optimizable parameters
    /// (1 if there are none).
    ///
    /// # Errors
    ///
    /// [`SpaceError::TooManyCombinations`] if the product overflows.
    pub fn combination_count(&self) -> Result<usize, SpaceError> {
        self.categorical_axes()
            .iter()
            .try_fold(1_usize, |acc, axis| acc.checked_mul(axis.choices.len().max(1)))
            .ok_or(SpaceError::TooManyCombinations)
    }

    /// Validate names, domains, and that something is optimizable.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), SpaceError> {
        let mut seen = HashSet::new();
        for spec in &self.params {
            if !seen.insert(spec.name.as_str()) {
                return Err(SpaceError::DuplicateName(spec.name.clone()));
            }
            spec.validate()?;
        }
        if self.optimizable().next().is_none() {
            return Err(SpaceError::NoOptimizableParameters);
        }
        self.combination_count()?;
        Ok(())
    }
}

/// A discrete axis: categorical choices or a boolean.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalAxis {
    /// Parameter name.
    pub name: String,
    /// Choices in declaration order.
    pub choices: Vec<ParamValue>,
}

impl CategoricalAxis {
    fn from_spec(spec: &ParamSpec) -> Option<Self> {
        let choices = match &spec.kind {
            ParamKind::Categorical { choices } => {
                choices.iter().map(|c| ParamValue::String(c.clone())).collect()
            }
            ParamKind::Bool => vec![ParamValue::Bool(false), ParamValue::Bool(true)],
            _ => return None,
        };
        Some(Self {
            name: spec.name.clone(),
            choices,
        })
    }
}

/// A numeric axis with optional stepping.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericAxis {
    /// Parameter name.
    pub name: String,
    /// Lower bound.
    pub low: f64,
    /// Upper bound.
    pub high: f64,
    /// Step between levels, `None` for continuous floats.
    pub step: Option<f64>,
    /// Whether values are integers.
    pub integer: bool,
}

impl NumericAxis {
    #[allow(clippy::cast_precision_loss)]
    fn from_spec(spec: &ParamSpec) -> Option<Self> {
        match &spec.kind {
            ParamKind::Int { low, high, step } => Some(Self {
                name: spec.name.clone(),
                low: *low as f64,
                high: *high as f64,
                step: Some(*step as f64),
                integer: true,
            }),
            ParamKind::Float { low, high, step } => Some(Self {
                name: spec.name.clone(),
                low: *low,
                high: *high,
                step: *step,
                integer: false,
            }),
            _ => None,
        }
    }

    /// Highest step level index (levels run `0..=max_level`).
    #[must_use]
    pub fn max_level(&self) -> Option<u64> {
        self.step
            .map(|step| ((self.high - self.low) / step + HALF_STEP_EPSILON).floor() as u64)
    }

    /// Value at `fraction` of the range, snapped to a valid step level.
    ///
    /// A position exactly halfway between two levels snaps to the lower one.
    #[must_use]
    pub fn value_at(&self, fraction: f64) -> ParamValue {
        let fraction = fraction.clamp(0.0, 1.0);
        let raw = (self.high - self.low).mul_add(fraction, self.low);
        self.snap(raw)
    }

    /// Snap an arbitrary value into the axis domain.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snap(&self, raw: f64) -> ParamValue {
        let raw = raw.clamp(self.low, self.high);
        let value = match (self.step, self.max_level()) {
            (Some(step), Some(max_level)) => {
                let position = (raw - self.low) / step;
                let lower = position.floor();
                let level = if (position - lower - 0.5).abs() < HALF_STEP_EPSILON {
                    lower
                } else {
                    position.round()
                };
                let level = level.clamp(0.0, max_level as f64);
                step.mul_add(level, self.low)
            }
            _ => raw,
        };

        if self.integer {
            ParamValue::Int(value.round() as i64)
        } else {
            ParamValue::Float(value)
        }
    }

    /// Position of `value` within the range as a fraction in `[0, 1]`.
    #[must_use]
    pub fn fraction_of(&self, value: &ParamValue) -> Option<f64> {
        let v = value.as_float()?;
        let width = self.high - self.low;
        if width <= 0.0 {
            return Some(0.5);
        }
        Some(((v - self.low) / width).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_declares_in_order() {
        let space = ParameterSpace::builder()
            .categorical("ma_type", &["SMA", "EMA"])
            .int("ma_length", 10, 50, 5)
            .boolean("use_filter")
            .float("stop_pct", 0.5, 3.0, None);

        let names: Vec<_> = space.specs().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["ma_type", "ma_length", "use_filter", "stop_pct"]);
        assert_eq!(space.categorical_axes().len(), 2);
        assert_eq!(space.numeric_axes().len(), 2);
    }

    #[test]
    fn test_validate_rejects_nothing_optimizable() {
        let space = ParameterSpace::builder()
            .int("len", 1, 10, 1)
            .fixed("len", ParamValue::Int(5));

        assert_eq!(space.validate(), Err(SpaceError::NoOptimizableParameters));
        assert_eq!(space.fixed_values().get("len"), Some(&ParamValue::Int(5)));
    }

    #[test]
    fn test_fixed_keeps_declared_domain() {
        let space = ParameterSpace::builder()
            .int("len", 1, 10, 1)
            .categorical("ma_type", &["SMA", "EMA"])
            .fixed("len", ParamValue::Int(5));

        assert_eq!(space.specs().len(), 2);
        assert_eq!(
            space.specs()[0].kind,
            ParamKind::Int {
                low: 1,
                high: 10,
                step: 1
            }
        );
        assert!(!space.specs()[0].optimize);
        assert!(space.numeric_axes().is_empty());
        assert_eq!(space.optimizable().count(), 1);
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_fixed_undeclared_name_declares_fixed_parameter() {
        let space = ParameterSpace::builder()
            .boolean("use_filter")
            .fixed("fee", ParamValue::Float(0.1))
            .fixed("venue", ParamValue::String("spot".to_string()));

        assert_eq!(space.specs().len(), 3);
        assert!(space.specs()[1..].iter().all(|p| !p.optimize));
        assert_eq!(space.fixed_values().get("fee"), Some(&ParamValue::Float(0.1)));
        assert_eq!(
            space.fixed_values().get("venue"),
            Some(&ParamValue::String("spot".to_string()))
        );
        assert_eq!(space.categorical_axes().len(), 1);
        assert!(space.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates_and_bad_bounds() {
        let dup = ParameterSpace::builder().boolean("a").boolean("a");
        assert!(matches!(dup.validate(), Err(SpaceError::DuplicateName(_))));

        let bad = ParameterSpace::builder().int("len", 10, 1, 1);
        assert!(matches!(bad.validate(), Err(SpaceError::InvalidBounds { .. })));
    }

    #[test]
    fn test_combination_count_overflow_is_an_error() {
        let choices: Vec<String> = (0..256).map(|c| format!("c{c}")).collect();
        let refs: Vec<&str> = choices.iter().map(String::as_str).collect();
        let space = (0..9).fold(ParameterSpace::builder(), |space, axis| {
            space.categorical(&format!("cat_{axis}"), &refs)
        });

        assert_eq!(
            space.combination_count(),
            Err(SpaceError::TooManyCombinations)
        );
        assert_eq!(space.validate(), Err(SpaceError::TooManyCombinations));

        let small = ParameterSpace::builder()
            .categorical("a", &["x", "y", "z"])
            .boolean("b")
            .int("n", 1, 5, 1);
        assert_eq!(small.combination_count(), Ok(6));
    }

    #[test]
    fn test_snap_halfway_rounds_down() {
        // Levels 10, 20, 30; 15 is exactly halfway between 10 and 20.
        let space = ParameterSpace::builder().int("len", 10, 30, 10);
        let axis = &space.numeric_axes()[0];

        assert_eq!(axis.value_at(0.25), ParamValue::Int(10));
        assert_eq!(axis.value_at(0.75), ParamValue::Int(20));
        assert_eq!(axis.value_at(0.26), ParamValue::Int(20));
        assert_eq!(axis.value_at(1.0), ParamValue::Int(30));
    }

    #[test]
    fn test_snap_respects_partial_last_step() {
        // Levels 0, 3, 6, 9; high of 10 is not a level.
        let space = ParameterSpace::builder().int("n", 0, 10, 3);
        let axis = &space.numeric_axes()[0];
        assert_eq!(axis.max_level(), Some(3));
        assert_eq!(axis.value_at(1.0), ParamValue::Int(9));
    }

    #[test]
    fn test_continuous_float_is_unquantized() {
        let space = ParameterSpace::builder().float("x", 1.0, 2.0, None);
        let axis = &space.numeric_axes()[0];
        assert_eq!(axis.value_at(0.3), ParamValue::Float(1.3));
    }

    #[test]
    fn test_parse_yaml_spec() {
        let yaml = r"
- name: ma_type
  type: categorical
  choices: [SMA, EMA, HMA]
- name: ma_length
  type: int
  low: 10
  high: 100
  step: 10
- name: commission
  type: float
  low: 0.0
  high: 1.0
  optimize: false
  default: 0.1
";
        let space: ParameterSpace = serde_yaml_bw::from_str(yaml).unwrap();
        assert!(space.validate().is_ok());
        assert_eq!(space.optimizable().count(), 2);
        assert_eq!(
            space.fixed_values().get("commission"),
            Some(&ParamValue::Float(0.1))
        );
    }
}
