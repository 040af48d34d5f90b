//! Primary numeric axis inference.
//!
//! The primary axis is the numeric parameter the coverage schedule sweeps
//! across blocks. Every other numeric axis stays at its midpoint.

use std::fmt::Debug;

use crate::backtest::params::{CategoricalAxis, NumericAxis};

const CATEGORY_SUFFIXES: [&str; 3] = ["type", "kind", "mode"];
const LENGTH_SUFFIXES: [&str; 3] = ["length", "len", "period"];

/// Chooses which numeric axis (by index into `numeric`) is swept.
pub trait PrimaryAxisSelector: Debug + Send + Sync {
    /// Index of the primary axis, or `None` to keep all numerics at midpoint.
    fn select(&self, categorical: &[CategoricalAxis], numeric: &[NumericAxis]) -> Option<usize>;
}

/// Pairs the dominant categorical axis with its length-like numeric axis.
///
/// `ma_type` with three choices pairs with `ma_length`, `maLen` or
/// `ma-period`. Falls back to the first numeric axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamePairingSelector;

impl PrimaryAxisSelector for NamePairingSelector {
    fn select(&self, categorical: &[CategoricalAxis], numeric: &[NumericAxis]) -> Option<usize> {
        if numeric.is_empty() {
            return None;
        }

        let paired = dominant(categorical)
            .and_then(|axis| stem(&axis.name))
            .and_then(|stem| {
                numeric.iter().position(|axis| {
                    let name = normalize(&axis.name);
                    LENGTH_SUFFIXES
                        .iter()
                        .any(|suffix| name == format!("{stem}{suffix}"))
                })
            });

        paired.or(Some(0))
    }
}

/// Always sweeps the named axis.
#[derive(Debug, Clone)]
pub struct FixedPrimaryAxis(pub String);

impl PrimaryAxisSelector for FixedPrimaryAxis {
    fn select(&self, _categorical: &[CategoricalAxis], numeric: &[NumericAxis]) -> Option<usize> {
        numeric.iter().position(|axis| axis.name == self.0)
    }
}

/// Never sweeps; every numeric axis sits at its midpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrimaryAxis;

impl PrimaryAxisSelector for NoPrimaryAxis {
    fn select(&self, _categorical: &[CategoricalAxis], _numeric: &[NumericAxis]) -> Option<usize> {
        None
    }
}

/// Categorical axis with the most choices; earliest wins ties.
fn dominant(categorical: &[CategoricalAxis]) -> Option<&CategoricalAxis> {
    categorical.iter().fold(None, |best: Option<&CategoricalAxis>, axis| match best {
        Some(b) if b.choices.len() >= axis.choices.len() => Some(b),
        _ => Some(axis),
    })
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn stem(name: &str) -> Option<String> {
    let normalized = normalize(name);
    CATEGORY_SUFFIXES
        .iter()
        .find_map(|suffix| normalized.strip_suffix(suffix))
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
