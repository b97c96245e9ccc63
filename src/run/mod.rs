//! Run providers: the source of encoded observations.
//!
//! The [`Run`] trait is the boundary between a recorded optimization run
//! and the importance evaluator. A provider knows the run's search space,
//! objectives and budgets, and turns the trials for one (objective, budget)
//! selection into a numeric design matrix with an aligned target vector.
//!
//! # Available providers
//!
//! | Provider | Description |
//! |----------|-------------|
//! | [`MemoryRun`] | Configurations and trials recorded in memory |
//!
//! # Implementing a custom provider
//!
//! Implement the four required methods ([`hyperparameters`](Run::hyperparameters),
//! [`objectives`](Run::objectives), [`budgets`](Run::budgets) and
//! [`encoded_data`](Run::encoded_data)); the lookup helpers have default
//! implementations built on top of them. Encoded rows must follow the order
//! of [`hyperparameters`](Run::hyperparameters), use each hyperparameter's
//! [`Domain`](crate::hyperparameter::Domain), and hold
//! [`INACTIVE`](crate::hyperparameter::INACTIVE) for inactive values.
//! Failed trials keep their row and carry a non-finite target.

mod memory;

pub use memory::MemoryRun;

use crate::error::{Error, Result};
use crate::hyperparameter::Hyperparameter;
use crate::types::{Budget, Objective};

/// Design matrix and target vector for one (objective, budget) selection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedData {
    /// One encoded configuration per row.
    pub x: Vec<Vec<f64>>,
    /// One objective value per row; non-finite for failed trials.
    pub y: Vec<f64>,
}

impl EncodedData {
    /// Number of rows, including failed ones.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.y.len()
    }

    /// Number of rows whose objective value is not finite.
    #[must_use]
    pub fn n_failed(&self) -> usize {
        self.y.iter().filter(|v| !v.is_finite()).count()
    }
}

/// A recorded optimization run.
pub trait Run {
    /// The search space, in encoding order.
    fn hyperparameters(&self) -> &[Hyperparameter];

    /// The objectives recorded for every trial.
    fn objectives(&self) -> &[Objective];

    /// The distinct budgets trials were evaluated at, ascending.
    fn budgets(&self) -> Vec<Budget>;

    /// Encode all trials for `objective` at `budget`.
    ///
    /// # Errors
    ///
    /// Returns an error if the objective or budget is not part of this run.
    fn encoded_data(&self, objective: &Objective, budget: Budget) -> Result<EncodedData>;

    /// Names of all hyperparameters, in encoding order.
    fn hyperparameter_names(&self) -> Vec<&str> {
        self.hyperparameters().iter().map(Hyperparameter::name).collect()
    }

    /// Look up a hyperparameter by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHyperparameter`] if no hyperparameter has this name.
    fn hyperparameter(&self, name: &str) -> Result<&Hyperparameter> {
        self.hyperparameters()
            .iter()
            .find(|hp| hp.name() == name)
            .ok_or_else(|| Error::UnknownHyperparameter(name.to_owned()))
    }

    /// Column index of a hyperparameter in the encoded matrix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHyperparameter`] if no hyperparameter has this name.
    fn hyperparameter_index(&self, name: &str) -> Result<usize> {
        self.hyperparameters()
            .iter()
            .position(|hp| hp.name() == name)
            .ok_or_else(|| Error::UnknownHyperparameter(name.to_owned()))
    }

    /// Look up an objective by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownObjective`] if `id` is out of range.
    fn objective(&self, id: usize) -> Result<&Objective> {
        self.objectives().get(id).ok_or(Error::UnknownObjective(id))
    }

    /// Names of all objectives.
    fn objective_names(&self) -> Vec<&str> {
        self.objectives().iter().map(|o| o.name.as_str()).collect()
    }

    /// Ids of all objectives.
    fn objective_ids(&self) -> Vec<usize> {
        (0..self.objectives().len()).collect()
    }

    /// Look up a budget by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownBudget`] if `id` is out of range.
    fn budget(&self, id: usize) -> Result<Budget> {
        self.budgets().get(id).copied().ok_or(Error::UnknownBudget(id))
    }

    /// Ids of all budgets.
    fn budget_ids(&self) -> Vec<usize> {
        (0..self.budgets().len()).collect()
    }

    /// Human-readable budget labels.
    fn budget_labels(&self) -> Vec<String> {
        self.budgets().iter().map(ToString::to_string).collect()
    }
}
