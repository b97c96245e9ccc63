/// Errors returned by search-space construction, run providers and the
/// importance evaluator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with non-positive bounds.
    #[error("invalid log bounds: low must be positive for log scale")]
    InvalidLogBounds,

    /// Returned when a categorical or ordinal hyperparameter has no choices.
    #[error("categorical choices cannot be empty")]
    EmptyChoices,

    /// Returned when the surrogate cannot be fitted from the given input:
    /// no observations, a tree count below one, only failed objective
    /// values, or malformed rows.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Returned when a name is not part of the run's search space.
    #[error("unknown hyperparameter '{0}'")]
    UnknownHyperparameter(String),

    /// Returned when an objective id is out of range.
    #[error("unknown objective id {0}")]
    UnknownObjective(usize),

    /// Returned when a budget id is out of range.
    #[error("unknown budget id {0}")]
    UnknownBudget(usize),

    /// Returned when a configuration value does not fit its hyperparameter.
    #[error("invalid value for hyperparameter '{name}': {reason}")]
    InvalidValue {
        /// The name of the hyperparameter.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Returned when importances are requested before any successful
    /// calculation.
    #[error("importances requested before calculate")]
    NotCalculated,

    /// Returned when an importance result cannot be (de)serialized.
    #[cfg(feature = "serde")]
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}
