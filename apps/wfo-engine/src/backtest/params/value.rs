//! Parameter values and parameter sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A concrete parameter set, keyed by parameter name.
///
/// `BTreeMap` keeps iteration order stable so serialized trials and log
/// output are reproducible.
pub type ParamSet = BTreeMap<String, ParamValue>;

/// Parameter value that can be numeric, categorical or boolean.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean parameter.
    Bool(bool),
    /// Integer parameter.
    Int(i64),
    /// Float parameter.
    Float(f64),
    /// Categorical choice.
    String(String),
}

impl ParamValue {
    /// Get as integer if applicable.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Get as float if applicable.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as boolean if applicable.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string.
    #[must_use]
    pub fn as_str(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::Bool(v) => v.to_string(),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_value_conversions() {
        let int_val = ParamValue::Int(42);
        assert_eq!(int_val.as_int(), Some(42));
        assert_eq!(int_val.as_float(), Some(42.0));
        assert_eq!(int_val.as_str(), "42");

        let float_val = ParamValue::Float(3.5);
        assert_eq!(float_val.as_int(), Some(3));
        assert_eq!(float_val.as_float(), Some(3.5));

        let string_val = ParamValue::from("EMA");
        assert_eq!(string_val.as_int(), None);
        assert_eq!(string_val.as_str(), "EMA");

        assert_eq!(ParamValue::Bool(true).as_bool(), Some(true));
    }

    #[test]
    fn test_param_set_serializes_in_key_order() {
        let mut params = ParamSet::new();
        params.insert("z_len".to_string(), ParamValue::Int(5));
        params.insert("a_type".to_string(), ParamValue::from("SMA"));

        let json = serde_json::to_string(&params).unwrap();
        assert_eq!(json, r#"{"a_type":"SMA","z_len":5}"#);
    }
}
