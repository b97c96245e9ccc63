//! fANOVA (functional ANOVA) hyperparameter importance via random forest.
//!
//! fANOVA decomposes the variance of the objective into contributions from
//! individual hyperparameters (**main effects**) and from hyperparameter
//! subsets such as pairs (**interaction effects**).
//!
//! # Algorithm
//!
//! 1. Fit a forest of randomized regression trees to the mapping
//!    `(encoded configuration) → objective` ([`Forest::fit`])
//! 2. Every tree partitions the encoded space into axis-aligned leaf boxes.
//!    Weighting each leaf by its share of the space volume gives the tree's
//!    total predictive variance
//! 3. For a subset `S`, average each leaf's prediction over the dimensions
//!    outside `S` to obtain the marginal prediction function; its variance,
//!    minus the variance already explained by the proper subsets of `S`,
//!    divided by the total variance, is the importance of `S` in that tree
//!    ([`decompose`])
//! 4. Report mean and standard deviation of each importance across trees
//!
//! # Reference
//!
//! Hutter, F., Hoos, H. & Leyton-Brown, K. (2014). "An Efficient
//! Approach for Assessing Hyperparameter Importance." ICML 2014.
//!
//! # Example
//!
//! ```
//! use hpimportance::fanova::{FanovaConfig, Forest, Observations, decompose};
//! use hpimportance::hyperparameter::Hyperparameter;
//! use hpimportance::run::EncodedData;
//!
//! let space = vec![
//!     Hyperparameter::float("x", 0.0, 1.0).unwrap(),
//!     Hyperparameter::float("y", 0.0, 1.0).unwrap(),
//! ];
//! let mut rng = fastrand::Rng::with_seed(1);
//! let x: Vec<Vec<f64>> = (0..100).map(|_| vec![rng.f64(), rng.f64()]).collect();
//! let y = x.iter().map(|row| 10.0 * row[0] + 0.1 * row[1]).collect();
//!
//! let observations = Observations::new(&space, EncodedData { x, y }).unwrap();
//! let forest = Forest::fit(&observations, &FanovaConfig::default()).unwrap();
//! let result = decompose(&forest, &[&["x"], &["y"]]).unwrap();
//!
//! assert!(result.get(&["x"]).unwrap().mean > result.get(&["y"]).unwrap().mean);
//! ```

mod decompose;
mod forest;
mod observations;
mod result;
mod tree;

pub use decompose::{MAX_SUBSET_SIZE, VarianceDecomposer, decompose};
pub use forest::Forest;
pub use observations::Observations;
pub use result::{Importance, ImportanceResult, SubsetImportance, SubsetKey};
pub use tree::{Bound, Leaf, SurrogateTree};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration of the surrogate forest.
///
/// Use [`Default::default()`] for the default forest settings, or
/// customize the tree-growing parameters. The evaluator overrides
/// [`n_trees`](Self::n_trees) and [`seed`](Self::seed) on every
/// [`calculate`](crate::Fanova::calculate) call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FanovaConfig {
    /// Number of trees in the forest (default: 16).
    pub n_trees: usize,
    /// Maximum depth of each tree. `None` for unlimited (default: `None`).
    pub max_depth: Option<usize>,
    /// Minimum samples required to split a node (default: 2).
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf node (default: 1).
    pub min_samples_leaf: usize,
    /// Fraction of hyperparameters drawn as split candidates at every node
    /// (default: 0.7). At least one candidate is always drawn.
    pub max_features: f64,
    /// Whether each tree is fitted on a bootstrap resample (default: `true`).
    pub bootstrap: bool,
    /// Seed controlling every random choice of the fit (default: 0).
    pub seed: u64,
}

impl Default for FanovaConfig {
    fn default() -> Self {
        Self {
            n_trees: 16,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 0.7,
            bootstrap: true,
            seed: 0,
        }
    }
}

impl FanovaConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.n_trees < 1 {
            return Err(Error::invalid_input("n_trees must be at least 1"));
        }
        if !(self.max_features > 0.0 && self.max_features <= 1.0) {
            return Err(Error::invalid_input(format!(
                "max_features must be in (0, 1], got {}",
                self.max_features
            )));
        }
        Ok(())
    }

    /// Number of candidate dimensions per split for `n_features` dimensions.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub(crate) fn candidates_per_split(&self, n_features: usize) -> usize {
        ((n_features as f64 * self.max_features).ceil() as usize).clamp(1, n_features.max(1))
    }
}
