//! Volume-weighted functional ANOVA over fitted surrogate trees.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::result::{Importance, ImportanceResult, SubsetImportance, SubsetKey, mean_std};
use super::{Forest, SurrogateTree};
use crate::error::{Error, Result};
use crate::hyperparameter::Domain;

/// Largest hyperparameter subset that can be decomposed.
///
/// The individual variance of a subset subtracts the individual variances of
/// all its proper subsets, so the work doubles with every added name.
pub const MAX_SUBSET_SIZE: usize = 10;

/// Per-leaf volume fractions of one tree and the resulting mean and variance
/// of its prediction under the uniform measure on the encoded space.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct LeafStatistics {
    /// `fractions[leaf][dim]`: share of the dimension's domain in the leaf.
    fractions: Vec<Vec<f64>>,
    /// Volume-weighted mean of the prediction.
    mean: f64,
    /// Volume-weighted variance of the prediction.
    pub(crate) variance: f64,
}

impl LeafStatistics {
    pub(crate) fn new(tree: &SurrogateTree, domains: &[Domain]) -> Self {
        let fractions: Vec<Vec<f64>> = tree
            .leaves()
            .iter()
            .map(|leaf| {
                leaf.bounds
                    .iter()
                    .zip(domains)
                    .map(|(bound, &domain)| bound.fraction(domain))
                    .collect()
            })
            .collect();
        let volumes: Vec<f64> = fractions.iter().map(|f| f.iter().product()).collect();
        let values = tree.leaves().iter().map(|leaf| leaf.value);

        let mean: f64 = volumes.iter().zip(values.clone()).map(|(v, y)| v * y).sum();
        let variance: f64 = volumes
            .iter()
            .zip(values)
            .map(|(v, y)| v * (y - mean).powi(2))
            .sum();

        Self {
            fractions,
            mean,
            variance,
        }
    }
}

/// Variance of the marginal prediction of `tree` over the dimensions `dims`.
///
/// With `c_l = (y_l − μ) · Π_{d∉S} w_{l,d}` the centred marginal is
/// `Σ_l c_l · 1[x_S ∈ box_l]`, so its variance is the sum of
/// `c_l · c_k · vol_S(box_l ∩ box_k)` over all leaf pairs. No grid over the
/// subset's dimensions is materialized.
fn marginal_variance(
    tree: &SurrogateTree,
    stats: &LeafStatistics,
    domains: &[Domain],
    dims: &[usize],
) -> f64 {
    let leaves = tree.leaves();
    let weights: Vec<f64> = leaves
        .iter()
        .zip(&stats.fractions)
        .map(|(leaf, fractions)| {
            let outside: f64 = fractions
                .iter()
                .enumerate()
                .filter(|(d, _)| !dims.contains(d))
                .map(|(_, f)| f)
                .product();
            (leaf.value - stats.mean) * outside
        })
        .collect();

    let mut variance = 0.0;
    for (i, (a, &wa)) in leaves.iter().zip(&weights).enumerate() {
        if wa == 0.0 {
            continue;
        }
        let own: f64 = dims.iter().map(|&d| stats.fractions[i][d]).product();
        variance += wa * wa * own;
        for (b, &wb) in leaves[i + 1..].iter().zip(&weights[i + 1..]) {
            if wb == 0.0 {
                continue;
            }
            let shared: f64 = dims
                .iter()
                .map(|&d| a.bounds[d].overlap(&b.bounds[d], domains[d]))
                .product();
            variance += 2.0 * wa * wb * shared;
        }
    }
    variance
}

/// Individual variance of `dims` in one tree: the marginal variance minus
/// the individual variances of all proper non-empty subsets. Subsets that are
/// never active together in the training data have none.
fn individual(
    memo: &mut HashMap<Vec<usize>, f64>,
    forest: &Forest,
    tree: &SurrogateTree,
    stats: &LeafStatistics,
    dims: &[usize],
) -> f64 {
    if let Some(&v) = memo.get(dims) {
        return v;
    }
    let v = if forest.jointly_active(dims) {
        let mut v = marginal_variance(tree, stats, forest.domains(), dims);
        let k = dims.len();
        for mask in 1..(1usize << k) - 1 {
            let sub: Vec<usize> = (0..k)
                .filter(|&i| mask & (1 << i) != 0)
                .map(|i| dims[i])
                .collect();
            v -= individual(memo, forest, tree, stats, &sub);
        }
        v
    } else {
        0.0
    };
    memo.insert(dims.to_vec(), v);
    v
}

/// Incremental fANOVA decomposition of one forest.
///
/// Leaf statistics come from the forest and individual variances are
/// memoised per subset, so decomposing a pair after its members costs only
/// the pair's own marginal. All methods are deterministic.
pub struct VarianceDecomposer {
    /// Individual variance per sorted dimension subset, one map per tree.
    memo: Vec<HashMap<Vec<usize>, f64>>,
}

impl VarianceDecomposer {
    /// Prepares an empty decomposition of `forest`.
    #[must_use]
    pub fn new(forest: &Forest) -> Self {
        Self {
            memo: vec![HashMap::new(); forest.n_trees()],
        }
    }

    /// Per-tree importance fractions of the subset of dimensions `dims`.
    ///
    /// `dims` must be sorted, free of duplicates and at most
    /// [`MAX_SUBSET_SIZE`] long. Trees with zero total variance, and subsets
    /// whose dimensions are never active together in the training data,
    /// yield 0.
    pub(crate) fn fractions(&mut self, forest: &Forest, dims: &[usize]) -> Vec<f64> {
        self.memo
            .iter_mut()
            .zip(forest.trees().iter().zip(forest.leaf_statistics()))
            .map(|(memo, (tree, stats))| {
                if stats.variance > 0.0 {
                    individual(memo, forest, tree, stats, dims) / stats.variance
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Importance of the named hyperparameter subset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHyperparameter`] if a name is not a dimension of
    /// the forest and [`Error::InvalidInput`] for an empty subset or one with
    /// more than [`MAX_SUBSET_SIZE`] hyperparameters.
    pub fn importance(&mut self, forest: &Forest, names: &[&str]) -> Result<SubsetImportance> {
        let dims = canonical_dims(forest, names)?;
        let per_tree = self.fractions(forest, &dims);
        let (mean, std) = mean_std(&per_tree);
        let subset: SubsetKey = dims.iter().map(|&d| forest.names()[d].clone()).collect();
        Ok(SubsetImportance {
            subset,
            importance: Importance { mean, std },
            per_tree,
        })
    }
}

pub(crate) fn canonical_dims(forest: &Forest, names: &[&str]) -> Result<Vec<usize>> {
    if names.is_empty() {
        return Err(Error::invalid_input("empty hyperparameter subset"));
    }
    let mut dims = names
        .iter()
        .map(|name| forest.dimension(name))
        .collect::<Result<Vec<_>>>()?;
    dims.sort_unstable();
    dims.dedup();
    if dims.len() > MAX_SUBSET_SIZE {
        return Err(Error::invalid_input(format!(
            "subset of {} hyperparameters exceeds the limit of {MAX_SUBSET_SIZE}",
            dims.len()
        )));
    }
    Ok(dims)
}

/// Decompose the variance of `forest` for every subset of hyperparameter names.
///
/// # Errors
///
/// Returns [`Error::UnknownHyperparameter`] if a subset names a hyperparameter
/// the forest was not fitted on and [`Error::InvalidInput`] for empty or
/// oversized subsets.
pub fn decompose(forest: &Forest, subsets: &[&[&str]]) -> Result<ImportanceResult> {
    let mut decomposer = VarianceDecomposer::new(forest);
    let mut result = ImportanceResult::new(forest);
    for names in subsets {
        result.insert(decomposer.importance(forest, names)?);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanova::{FanovaConfig, Observations};
    use crate::hyperparameter::Hyperparameter;
    use crate::rng_util;
    use crate::run::EncodedData;

    fn fit(f: impl Fn(&[f64]) -> f64, n: usize, seed: u64) -> Forest {
        let mut rng = fastrand::Rng::with_seed(seed);
        let space = vec![
            Hyperparameter::float("a", 0.0, 1.0).unwrap(),
            Hyperparameter::float("b", 0.0, 1.0).unwrap(),
            Hyperparameter::float("c", 0.0, 1.0).unwrap(),
        ];
        let x: Vec<Vec<f64>> = (0..n)
            .map(|_| (0..3).map(|_| rng_util::f64_range(&mut rng, 0.0, 1.0)).collect())
            .collect();
        let y = x.iter().map(|r| f(r)).collect();
        let obs = Observations::new(&space, EncodedData { x, y }).unwrap();
        Forest::fit(&obs, &FanovaConfig::default()).unwrap()
    }

    #[test]
    fn singletons_are_normalized_per_tree() {
        let forest = fit(|r| r[0] + 2.0 * r[1] * r[2], 150, 1);
        let mut decomposer = VarianceDecomposer::new(&forest);
        let singles: Vec<Vec<f64>> = (0..3)
            .map(|d| decomposer.fractions(&forest, &[d]))
            .collect();
        for t in 0..forest.n_trees() {
            let mut sum = 0.0;
            for single in &singles {
                assert!((-1e-9..=1.0 + 1e-9).contains(&single[t]), "got {}", single[t]);
                sum += single[t];
            }
            assert!(sum <= 1.0 + 1e-9, "tree {t} singles sum to {sum}");
        }
    }

    #[test]
    fn all_subsets_explain_the_total_variance() {
        let forest = fit(|r| r[0] * r[1] + r[2], 80, 2);
        let mut decomposer = VarianceDecomposer::new(&forest);
        let subsets: [&[usize]; 7] = [&[0], &[1], &[2], &[0, 1], &[0, 2], &[1, 2], &[0, 1, 2]];
        let mut totals = vec![0.0; forest.n_trees()];
        for dims in subsets {
            for (total, f) in totals.iter_mut().zip(decomposer.fractions(&forest, dims)) {
                *total += f;
            }
        }
        for total in totals {
            assert!((total - 1.0).abs() < 1e-6, "fractions sum to {total}");
        }
    }

    #[test]
    fn pair_identity_holds() {
        let forest = fit(|r| r[0] * r[1], 120, 3);
        let mut decomposer = VarianceDecomposer::new(&forest);
        let a = decomposer.fractions(&forest, &[0]);
        let b = decomposer.fractions(&forest, &[1]);
        let pair = decomposer.fractions(&forest, &[0, 1]);
        for (t, (tree, stats)) in forest
            .trees()
            .iter()
            .zip(forest.leaf_statistics())
            .enumerate()
        {
            if stats.variance <= 0.0 {
                continue;
            }
            let joint = marginal_variance(tree, stats, forest.domains(), &[0, 1]);
            let expected = joint / stats.variance - a[t] - b[t];
            assert!((pair[t] - expected).abs() < 1e-9);
            assert!(pair[t] >= -1e-9, "pair importance {}", pair[t]);
        }
    }

    #[test]
    fn marginal_over_every_dimension_is_the_total_variance() {
        let forest = fit(|r| r[0] + r[1] * r[2], 90, 6);
        for (tree, stats) in forest.trees().iter().zip(forest.leaf_statistics()) {
            let full = marginal_variance(tree, stats, forest.domains(), &[0, 1, 2]);
            assert!((full - stats.variance).abs() < 1e-9 * stats.variance.max(1.0));
        }
    }

    #[test]
    fn large_subsets_are_decomposed_or_rejected() {
        let n_dims = MAX_SUBSET_SIZE + 1;
        let space: Vec<Hyperparameter> = (0..n_dims)
            .map(|d| Hyperparameter::float(format!("h{d}"), 0.0, 1.0).unwrap())
            .collect();
        let mut rng = fastrand::Rng::with_seed(12);
        let x: Vec<Vec<f64>> = (0..80)
            .map(|_| (0..n_dims).map(|_| rng.f64()).collect())
            .collect();
        let y = x.iter().map(|r| r.iter().sum::<f64>() + r[0] * r[1]).collect();
        let obs = Observations::new(&space, EncodedData { x, y }).unwrap();
        let config = FanovaConfig {
            n_trees: 1,
            ..FanovaConfig::default()
        };
        let forest = Forest::fit(&obs, &config).unwrap();

        let names: Vec<String> = forest.names().to_vec();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let six = decompose(&forest, &[&names[..6]]).unwrap();
        assert!(six.get(&names[..6]).unwrap().mean.is_finite());

        let limit = decompose(&forest, &[&names[..MAX_SUBSET_SIZE]]).unwrap();
        assert!(limit.get(&names[..MAX_SUBSET_SIZE]).unwrap().mean.is_finite());

        assert!(matches!(
            decompose(&forest, &[&names[..]]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn never_jointly_active_subsets_contribute_nothing() {
        let space = vec![
            Hyperparameter::categorical("opt", 2).unwrap(),
            Hyperparameter::float("m", 0.0, 1.0)
                .unwrap()
                .conditional_on("opt", [0]),
            Hyperparameter::float("b", 0.0, 1.0)
                .unwrap()
                .conditional_on("opt", [1]),
        ];
        let mut rng = fastrand::Rng::with_seed(21);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..100 {
            let v = rng.f64();
            if i % 2 == 0 {
                x.push(vec![0.0, v, f64::NAN]);
                y.push(v);
            } else {
                x.push(vec![1.0, f64::NAN, v]);
                y.push(2.0 * v);
            }
        }
        let obs = Observations::new(&space, EncodedData { x, y }).unwrap();
        let forest = Forest::fit(&obs, &FanovaConfig::default()).unwrap();
        assert!(!forest.jointly_active(&[1, 2]));

        let mut decomposer = VarianceDecomposer::new(&forest);
        assert!(decomposer.fractions(&forest, &[1, 2]).iter().all(|&f| f == 0.0));
        assert!(decomposer.fractions(&forest, &[0, 1, 2]).iter().all(|&f| f == 0.0));
        for (memo, stats) in decomposer.memo.iter().zip(forest.leaf_statistics()) {
            if stats.variance > 0.0 {
                assert_eq!(memo.get([1, 2].as_slice()), Some(&0.0));
            }
        }
    }

    #[test]
    fn constant_dimension_has_zero_importance() {
        let space = vec![
            Hyperparameter::float("x", 0.0, 1.0).unwrap(),
            Hyperparameter::float("fixed", 0.0, 1.0).unwrap(),
        ];
        let x: Vec<Vec<f64>> = (0..50).map(|i| vec![f64::from(i) / 50.0, 0.5]).collect();
        let y = x.iter().map(|r| r[0] * r[0]).collect();
        let obs = Observations::new(&space, EncodedData { x, y }).unwrap();
        let forest = Forest::fit(&obs, &FanovaConfig::default()).unwrap();

        let result = decompose(&forest, &[&["fixed"], &["x"]]).unwrap();
        let fixed = result.get(&["fixed"]).unwrap();
        assert!(fixed.mean.abs() < 1e-12 && fixed.std.abs() < 1e-12);
        assert!(result.get(&["x"]).unwrap().mean > 0.99);
    }

    #[test]
    fn unknown_names_fail() {
        let forest = fit(|r| r[0], 30, 4);
        assert!(matches!(
            decompose(&forest, &[&["nope"]]),
            Err(Error::UnknownHyperparameter(name)) if name == "nope"
        ));
        assert!(matches!(
            decompose(&forest, &[&[]]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn decomposition_is_deterministic() {
        let forest = fit(|r| r[0] + r[1], 60, 5);
        let a = decompose(&forest, &[&["a"], &["b"], &["a", "b"]]).unwrap();
        let b = decompose(&forest, &[&["b", "a"], &["a"], &["b"]]).unwrap();
        let keys: [&[&str]; 3] = [&["a"], &["b"], &["a", "b"]];
        for key in keys {
            assert_eq!(a.get(key), b.get(key));
        }
    }
}
