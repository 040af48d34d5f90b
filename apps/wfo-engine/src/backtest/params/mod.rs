//! Strategy parameter declarations and concrete parameter sets.

mod space;
mod value;

pub use space::{
    CategoricalAxis, NumericAxis, ParamKind, ParamSpec, ParameterSpace, SpaceError,
};
pub use value::{ParamSet, ParamValue};
