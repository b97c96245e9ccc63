//! Search-space hyperparameters and their numeric encoding.
//!
//! Every hyperparameter maps its raw values onto a fixed, finite encoded
//! [`Domain`]. Numeric hyperparameters are normalized to `[0, 1]` (in log
//! space when requested), ordinal levels become their index on an interval
//! that gives each level unit width, and categorical choices become their
//! index in an unordered category set. Inactive conditional hyperparameters
//! are encoded as [`INACTIVE`].
//!
//! # Example
//!
//! ```
//! use hpimportance::hyperparameter::{Hyperparameter, ParamValue};
//!
//! let lr = Hyperparameter::log_float("lr", 1e-4, 1e-1).unwrap();
//! let encoded = lr.encode(&ParamValue::Float(1e-1)).unwrap();
//! assert!((encoded - 1.0).abs() < 1e-12);
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Encoded value of a hyperparameter that is inactive in a configuration.
pub const INACTIVE: f64 = f64::NAN;

/// A raw hyperparameter value inside a configuration.
///
/// Categorical and ordinal values are stored as an index into their
/// choices.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ParamValue {
    /// A floating-point value.
    Float(f64),
    /// An integer value.
    Int(i64),
    /// A choice index for categorical or ordinal hyperparameters.
    Categorical(usize),
}

/// The kind of a hyperparameter together with its raw range.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HyperparameterKind {
    /// Continuous values in `[low, high]`.
    Float {
        /// Lower bound (inclusive).
        low: f64,
        /// Upper bound (inclusive).
        high: f64,
        /// Whether values are normalized in log space.
        log_scale: bool,
    },
    /// Integer values in `[low, high]`.
    Int {
        /// Lower bound (inclusive).
        low: i64,
        /// Upper bound (inclusive).
        high: i64,
        /// Whether values are normalized in log space.
        log_scale: bool,
    },
    /// Ordered levels `0..n_levels`.
    Ordinal {
        /// Number of levels.
        n_levels: usize,
    },
    /// Unordered choices `0..n_choices`.
    Categorical {
        /// Number of choices.
        n_choices: usize,
    },
}

/// The encoded numeric domain of one hyperparameter.
///
/// Trees split ordered dimensions at thresholds inside the interval and
/// unordered dimensions by partitioning the category set.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Domain {
    /// An ordered interval `[low, high]`.
    Interval {
        /// Lower end of the encoded range.
        low: f64,
        /// Upper end of the encoded range.
        high: f64,
    },
    /// An unordered set of `n` categories encoded as `0..n`.
    Categories(usize),
}

/// Activation condition of a conditional hyperparameter.
///
/// The child is active only when its parent is active and takes one of the
/// listed choice indices.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Condition {
    /// Name of the parent hyperparameter.
    pub parent: String,
    /// Parent choice indices under which the child is active.
    pub values: Vec<usize>,
}

/// One dimension of a run's search space.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hyperparameter {
    name: String,
    kind: HyperparameterKind,
    condition: Option<Condition>,
}

impl Hyperparameter {
    /// Creates a continuous hyperparameter on `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` or either bound is not finite.
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        check_bounds(low, high)?;
        Ok(Self::with_kind(
            name,
            HyperparameterKind::Float {
                low,
                high,
                log_scale: false,
            },
        ))
    }

    /// Creates a continuous hyperparameter normalized in log space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` and
    /// [`Error::InvalidLogBounds`] if `low` is not positive.
    pub fn log_float(name: impl Into<String>, low: f64, high: f64) -> Result<Self> {
        check_bounds(low, high)?;
        if low <= 0.0 {
            return Err(Error::InvalidLogBounds);
        }
        Ok(Self::with_kind(
            name,
            HyperparameterKind::Float {
                low,
                high,
                log_scale: true,
            },
        ))
    }

    /// Creates an integer hyperparameter on `[low, high]`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high`.
    #[allow(clippy::cast_precision_loss)]
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Result<Self> {
        check_bounds(low as f64, high as f64)?;
        Ok(Self::with_kind(
            name,
            HyperparameterKind::Int {
                low,
                high,
                log_scale: false,
            },
        ))
    }

    /// Creates an integer hyperparameter normalized in log space.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] if `low > high` and
    /// [`Error::InvalidLogBounds`] if `low` is not positive.
    #[allow(clippy::cast_precision_loss)]
    pub fn log_int(name: impl Into<String>, low: i64, high: i64) -> Result<Self> {
        check_bounds(low as f64, high as f64)?;
        if low <= 0 {
            return Err(Error::InvalidLogBounds);
        }
        Ok(Self::with_kind(
            name,
            HyperparameterKind::Int {
                low,
                high,
                log_scale: true,
            },
        ))
    }

    /// Creates an ordinal hyperparameter with `n_levels` ordered levels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] if `n_levels` is zero.
    pub fn ordinal(name: impl Into<String>, n_levels: usize) -> Result<Self> {
        if n_levels == 0 {
            return Err(Error::EmptyChoices);
        }
        Ok(Self::with_kind(name, HyperparameterKind::Ordinal { n_levels }))
    }

    /// Creates an unordered categorical hyperparameter with `n_choices` choices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] if `n_choices` is zero.
    pub fn categorical(name: impl Into<String>, n_choices: usize) -> Result<Self> {
        if n_choices == 0 {
            return Err(Error::EmptyChoices);
        }
        Ok(Self::with_kind(
            name,
            HyperparameterKind::Categorical { n_choices },
        ))
    }

    fn with_kind(name: impl Into<String>, kind: HyperparameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            condition: None,
        }
    }

    /// Makes this hyperparameter active only when `parent` takes one of `values`.
    #[must_use]
    pub fn conditional_on(
        mut self,
        parent: impl Into<String>,
        values: impl IntoIterator<Item = usize>,
    ) -> Self {
        self.condition = Some(Condition {
            parent: parent.into(),
            values: values.into_iter().collect(),
        });
        self
    }

    /// The unique name of this hyperparameter.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind and raw range.
    #[must_use]
    pub fn kind(&self) -> &HyperparameterKind {
        &self.kind
    }

    /// The activation condition, if this hyperparameter is conditional.
    #[must_use]
    pub fn condition(&self) -> Option<&Condition> {
        self.condition.as_ref()
    }

    /// The encoded domain used for tree splitting.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn domain(&self) -> Domain {
        match self.kind {
            HyperparameterKind::Float { .. } | HyperparameterKind::Int { .. } => {
                Domain::Interval {
                    low: 0.0,
                    high: 1.0,
                }
            }
            HyperparameterKind::Ordinal { n_levels } => Domain::Interval {
                low: -0.5,
                high: n_levels as f64 - 0.5,
            },
            HyperparameterKind::Categorical { n_choices } => Domain::Categories(n_choices),
        }
    }

    /// Encodes a raw value into this hyperparameter's domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the value has the wrong kind or lies
    /// outside the range.
    #[allow(clippy::cast_precision_loss)]
    pub fn encode(&self, value: &ParamValue) -> Result<f64> {
        match (&self.kind, *value) {
            (&HyperparameterKind::Float { low, high, log_scale }, ParamValue::Float(v)) => {
                self.normalize(v, low, high, log_scale)
            }
            (&HyperparameterKind::Int { low, high, log_scale }, ParamValue::Int(v)) => {
                self.normalize(v as f64, low as f64, high as f64, log_scale)
            }
            (
                &(HyperparameterKind::Ordinal { n_levels: n }
                | HyperparameterKind::Categorical { n_choices: n }),
                ParamValue::Categorical(index),
            ) => {
                if index < n {
                    Ok(index as f64)
                } else {
                    Err(self.invalid(format!("choice index {index} out of range 0..{n}")))
                }
            }
            (_, other) => Err(self.invalid(format!("unexpected value {other:?}"))),
        }
    }

    fn normalize(&self, v: f64, low: f64, high: f64, log_scale: bool) -> Result<f64> {
        if !(low..=high).contains(&v) {
            return Err(self.invalid(format!("{v} outside [{low}, {high}]")));
        }
        #[allow(clippy::float_cmp)]
        if low == high {
            return Ok(0.0);
        }
        if log_scale {
            Ok((v.ln() - low.ln()) / (high.ln() - low.ln()))
        } else {
            Ok((v - low) / (high - low))
        }
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidValue {
            name: self.name.clone(),
            reason,
        }
    }
}

fn check_bounds(low: f64, high: f64) -> Result<()> {
    if low.is_finite() && high.is_finite() && low <= high {
        Ok(())
    } else {
        Err(Error::InvalidBounds { low, high })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_encoding_is_normalized() {
        let hp = Hyperparameter::float("x", -5.0, 5.0).unwrap();
        assert!((hp.encode(&ParamValue::Float(0.0)).unwrap() - 0.5).abs() < 1e-12);
        assert!(hp.encode(&ParamValue::Float(6.0)).is_err());
        assert!(hp.encode(&ParamValue::Int(1)).is_err());
    }

    #[test]
    fn log_int_encoding_uses_log_space() {
        let hp = Hyperparameter::log_int("batch_size", 1, 100).unwrap();
        let mid = hp.encode(&ParamValue::Int(10)).unwrap();
        assert!((mid - 0.5).abs() < 1e-12, "got {mid}");
    }

    #[test]
    fn invalid_constructors() {
        assert!(matches!(
            Hyperparameter::float("x", 1.0, 0.0),
            Err(Error::InvalidBounds { .. })
        ));
        assert!(matches!(
            Hyperparameter::log_float("x", 0.0, 1.0),
            Err(Error::InvalidLogBounds)
        ));
        assert!(matches!(
            Hyperparameter::categorical("c", 0),
            Err(Error::EmptyChoices)
        ));
    }

    #[test]
    fn ordinal_levels_have_unit_width() {
        let hp = Hyperparameter::ordinal("size", 3).unwrap();
        assert_eq!(
            hp.domain(),
            Domain::Interval {
                low: -0.5,
                high: 2.5
            }
        );
        assert!((hp.encode(&ParamValue::Categorical(2)).unwrap() - 2.0).abs() < 1e-12);
        assert!(hp.encode(&ParamValue::Categorical(3)).is_err());
    }

    #[test]
    fn degenerate_range_encodes_to_zero() {
        let hp = Hyperparameter::int("fixed", 4, 4).unwrap();
        assert!(hp.encode(&ParamValue::Int(4)).unwrap().abs() < 1e-12);
    }
}
