//! Execution Transformers
//!
//! Whole-execution value pre-transforms applied before statistics, e.g. unit
//! conversion with a fixed rounding precision.

use crate::execution::Execution;
use std::borrow::Cow;

/// Value transform applied to a whole execution before statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    /// Leave the execution untouched.
    Identity,
    /// Multiply every invocation value by `factor` and round to
    /// `precision` decimal digits.
    ConstantFactor {
        /// Multiplier applied to every value.
        factor: f64,
        /// Number of decimal digits kept after scaling.
        precision: i32,
    },
}

impl Transform {
    /// Apply the transform, copying the tree only when values change.
    pub fn apply<'a>(&self, execution: &'a Execution) -> Cow<'a, Execution> {
        match *self {
            Transform::Identity => Cow::Borrowed(execution),
            Transform::ConstantFactor { factor, precision } => {
                let rounding = 10f64.powi(precision);
                Cow::Owned(
                    execution.map_values(|v| (v * factor * rounding).round() / rounding),
                )
            }
        }
    }
}
