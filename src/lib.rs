#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Hyperparameter importance for recorded optimization runs, computed with
//! functional ANOVA (fANOVA) over a random-forest surrogate.
//!
//! A run provider turns the trials of one (objective, budget) selection into
//! encoded observations; the evaluator fits a forest of regression trees to
//! them and decomposes the variance of each tree's prediction into the
//! contributions of single hyperparameters and of their interactions.
//!
//! # Getting Started
//!
//! ```
//! use hpimportance::prelude::*;
//!
//! let mut run = MemoryRun::new(
//!     vec![
//!         Hyperparameter::log_float("learning_rate", 1e-4, 1e-1).unwrap(),
//!         Hyperparameter::categorical("optimizer", 3).unwrap(),
//!     ],
//!     vec![Objective::new("loss", Direction::Minimize)],
//! )
//! .unwrap();
//!
//! let mut rng = fastrand::Rng::with_seed(1);
//! for _ in 0..40 {
//!     let lr = 10f64.powf(-4.0 + 3.0 * rng.f64());
//!     let opt = rng.usize(..3);
//!     let id = run
//!         .add_config([
//!             ("learning_rate", ParamValue::Float(lr)),
//!             ("optimizer", ParamValue::Categorical(opt)),
//!         ])
//!         .unwrap();
//!     run.add_trial(id, 10.0, vec![lr.log10().abs() + 0.1 * opt as f64]).unwrap();
//! }
//!
//! let objective = run.objective(0).unwrap().clone();
//! let mut fanova = Fanova::new(&run);
//! fanova.calculate(&objective, Budget::Value(10.0), 16, 0).unwrap();
//!
//! for (name, importance) in fanova.importances(&[], true).unwrap() {
//!     println!("{name}: {:.3} ± {:.3}", importance.mean, importance.std);
//! }
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Hyperparameter`](hyperparameter::Hyperparameter) | One dimension of the search space, with its encoding and activation condition. |
//! | [`Run`](run::Run) | Source of the search space, objectives, budgets and encoded trials. |
//! | [`Fanova`] | Fit the surrogate for one selection and report importances. |
//! | [`Forest`](fanova::Forest) | The fitted surrogate trees. |
//! | [`ImportanceResult`] | Mean and standard deviation of every decomposed subset. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `serde` | `Serialize`/`Deserialize` on public types, JSON export of [`ImportanceResult`] | off |
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) while fitting and decomposing | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

mod error;
mod evaluator;
pub mod fanova;
pub mod hyperparameter;
mod rng_util;
pub mod run;
mod types;

pub use error::{Error, Result};
pub use evaluator::{CalculationKey, Fanova};
pub use fanova::{FanovaConfig, Importance, ImportanceResult};
pub use types::{Budget, Direction, Objective, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use hpimportance::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::evaluator::{CalculationKey, Fanova};
    pub use crate::fanova::{
        FanovaConfig, Forest, Importance, ImportanceResult, Observations, SubsetImportance,
    };
    pub use crate::hyperparameter::{Hyperparameter, ParamValue};
    pub use crate::run::{EncodedData, MemoryRun, Run};
    pub use crate::types::{Budget, Direction, Objective, TrialState};
}
