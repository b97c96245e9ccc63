//! Core types shared by run providers and the evaluator.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The direction in which an objective was optimized.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Lower objective values are better.
    Minimize,
    /// Higher objective values are better.
    Maximize,
}

/// The outcome of a recorded trial.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TrialState {
    /// The trial completed and reported objective values.
    Complete,
    /// The trial crashed or was never evaluated. Its objective values are
    /// encoded as `NaN`.
    Failed,
}

/// An objective recorded by a run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Objective {
    /// Unique objective name, e.g. `"cost"` or `"accuracy"`.
    pub name: String,
    /// Known lower bound of the objective, if any.
    pub lower: Option<f64>,
    /// Known upper bound of the objective, if any.
    pub upper: Option<f64>,
    /// Whether the run minimized or maximized this objective.
    pub direction: Direction,
}

impl Objective {
    /// Creates an unbounded objective.
    #[must_use]
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            lower: None,
            upper: None,
            direction,
        }
    }

    /// Sets known bounds on the objective.
    #[must_use]
    pub fn bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = Some(lower);
        self.upper = Some(upper);
        self
    }
}

/// The fidelity level at which trials are selected.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Budget {
    /// Trials evaluated at exactly this budget.
    Value(f64),
    /// For each configuration, the trial evaluated at its highest budget.
    Combined,
}

impl PartialEq for Budget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a.to_bits() == b.to_bits(),
            (Self::Combined, Self::Combined) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => {
                #[allow(clippy::float_cmp)]
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{v:.0}")
                } else {
                    write!(f, "{}", (v * 100.0).round() / 100.0)
                }
            }
            Self::Combined => f.write_str("Combined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_labels_are_human_readable() {
        assert_eq!(Budget::Value(50.0).to_string(), "50");
        assert_eq!(Budget::Value(0.3333).to_string(), "0.33");
        assert_eq!(Budget::Combined.to_string(), "Combined");
    }

    #[test]
    fn budget_equality_is_bitwise() {
        assert_eq!(Budget::Value(1.0), Budget::Value(1.0));
        assert_ne!(Budget::Value(1.0), Budget::Value(2.0));
        assert_ne!(Budget::Value(1.0), Budget::Combined);
    }
}
