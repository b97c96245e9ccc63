#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::decompose::LeafStatistics;
use super::observations::in_domain;
use super::{FanovaConfig, Observations, SurrogateTree};
use crate::error::{Error, Result};
use crate::hyperparameter::Domain;
use crate::rng_util;

/// An ensemble of surrogate trees fitted to one set of observations.
///
/// Fitting is a pure function of the observations and the configuration:
/// the same inputs and seed reproduce bit-identical trees.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Forest {
    names: Vec<String>,
    domains: Vec<Domain>,
    trees: Vec<SurrogateTree>,
    /// Leaf volume fractions, mean and variance of every tree.
    stats: Vec<LeafStatistics>,
    total_variances: Vec<f64>,
    /// Distinct activity patterns of the training rows.
    activity: Vec<Vec<bool>>,
    seed: u64,
}

impl Forest {
    /// Fit `config.n_trees` randomized trees.
    ///
    /// Each tree draws its own seed from a generator seeded with
    /// `config.seed`, then grows on a bootstrap resample (when enabled).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `config.n_trees` is zero or
    /// `config.max_features` is outside `(0, 1]`.
    pub fn fit(observations: &Observations, config: &FanovaConfig) -> Result<Self> {
        config.validate()?;
        if observations.is_empty() {
            return Err(Error::invalid_input("no observations"));
        }

        let n_samples = observations.len();
        let mut rng = fastrand::Rng::with_seed(config.seed);
        let all_rows: Vec<usize> = (0..n_samples).collect();

        let trees: Vec<SurrogateTree> = (0..config.n_trees)
            .map(|_| {
                let mut tree_rng = fastrand::Rng::with_seed(rng.u64(..));
                let rows = if config.bootstrap {
                    rng_util::bootstrap(n_samples, &mut tree_rng)
                } else {
                    all_rows.clone()
                };
                SurrogateTree::fit(observations, &rows, config, &mut tree_rng)
            })
            .collect();

        let stats: Vec<LeafStatistics> = trees
            .iter()
            .map(|tree| LeafStatistics::new(tree, &observations.domains))
            .collect();
        let total_variances = stats.iter().map(|s| s.variance).collect();

        let mut activity: Vec<Vec<bool>> = Vec::new();
        for row in &observations.x {
            let pattern: Vec<bool> = row.iter().map(|v| !v.is_nan()).collect();
            if !activity.contains(&pattern) {
                activity.push(pattern);
            }
        }

        trace_debug!(
            n_trees = trees.len(),
            n_samples,
            n_leaves = trees.iter().map(SurrogateTree::n_leaves).sum::<usize>(),
            "surrogate forest fitted"
        );

        Ok(Self {
            names: observations.names.clone(),
            domains: observations.domains.clone(),
            trees,
            stats,
            total_variances,
            activity,
            seed: config.seed,
        })
    }

    /// The fitted trees, in fitting order.
    #[must_use]
    pub fn trees(&self) -> &[SurrogateTree] {
        &self.trees
    }

    /// Number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Volume-weighted variance of each tree's leaf predictions.
    #[must_use]
    pub fn total_variances(&self) -> &[f64] {
        &self.total_variances
    }

    pub(crate) fn leaf_statistics(&self) -> &[LeafStatistics] {
        &self.stats
    }

    /// Hyperparameter names, in dimension order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Encoded domains, in dimension order.
    #[must_use]
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    /// The seed the forest was fitted with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Dimension index of a hyperparameter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHyperparameter`] if the forest has no such dimension.
    pub fn dimension(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::UnknownHyperparameter(name.to_owned()))
    }

    /// Whether at least one training row has every dimension in `dims` active.
    pub(crate) fn jointly_active(&self, dims: &[usize]) -> bool {
        self.activity
            .iter()
            .any(|pattern| dims.iter().all(|&d| pattern[d]))
    }

    /// Mean prediction of all trees at an encoded configuration.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(x)).sum::<f64>() / self.trees.len() as f64
    }

    /// Marginal prediction at encoded `values` of the dimensions `dims`.
    ///
    /// Every tree's prediction is averaged over all other dimensions,
    /// weighted by leaf volume. Returns mean and population standard
    /// deviation across trees.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `dims` and `values` differ in length,
    /// a dimension index is out of range, or a value is `NaN` or outside its
    /// dimension's encoded domain.
    pub fn marginal(&self, dims: &[usize], values: &[f64]) -> Result<(f64, f64)> {
        if dims.len() != values.len() {
            return Err(Error::invalid_input(format!(
                "{} dimensions but {} values",
                dims.len(),
                values.len()
            )));
        }
        if let Some(&d) = dims.iter().find(|&&d| d >= self.domains.len()) {
            return Err(Error::invalid_input(format!("dimension {d} out of range")));
        }
        if let Some((&d, &v)) = dims
            .iter()
            .zip(values)
            .find(|&(&d, &v)| !in_domain(v, self.domains[d]))
        {
            return Err(Error::invalid_input(format!(
                "value {v} of '{}' is outside its encoded domain",
                self.names[d]
            )));
        }

        let per_tree: Vec<f64> = self
            .trees
            .iter()
            .map(|tree| {
                tree.leaves()
                    .iter()
                    .filter(|leaf| {
                        dims.iter()
                            .zip(values)
                            .all(|(&d, &v)| leaf.bounds[d].contains(v, self.domains[d]))
                    })
                    .map(|leaf| {
                        let rest: f64 = leaf
                            .bounds
                            .iter()
                            .zip(&self.domains)
                            .enumerate()
                            .filter(|(d, _)| !dims.contains(d))
                            .map(|(_, (bound, &domain))| bound.fraction(domain))
                            .product();
                        leaf.value * rest
                    })
                    .sum()
            })
            .collect();

        Ok(super::result::mean_std(&per_tree))
    }
}
