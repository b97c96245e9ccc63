#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Forest;

/// Names of a hyperparameter subset, in search-space order.
pub type SubsetKey = Vec<String>;

/// Importance of a hyperparameter subset aggregated over the forest.
///
/// `std` is the population standard deviation across trees; it measures
/// surrogate uncertainty rather than observation noise.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Importance {
    /// Mean fraction of total variance across trees.
    pub mean: f64,
    /// Population standard deviation of the fraction across trees.
    pub std: f64,
}

impl From<Importance> for (f64, f64) {
    fn from(importance: Importance) -> Self {
        (importance.mean, importance.std)
    }
}

/// The decomposition of one hyperparameter subset.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubsetImportance {
    /// The subset, in search-space order.
    pub subset: SubsetKey,
    /// Aggregated importance.
    pub importance: Importance,
    /// Importance fraction in every tree, in fitting order.
    pub per_tree: Vec<f64>,
}

/// Importances of every decomposed subset of one fitted forest.
///
/// Entries keep their decomposition order. Subsets are matched regardless
/// of the order their names are given in.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImportanceResult {
    entries: Vec<SubsetImportance>,
    n_trees: usize,
    degenerate_trees: usize,
}

impl ImportanceResult {
    pub(crate) fn new(forest: &Forest) -> Self {
        let degenerate_trees = forest
            .total_variances()
            .iter()
            .filter(|&&v| v <= 0.0)
            .count();
        if degenerate_trees > 0 {
            trace_debug!(degenerate_trees, "surrogate trees without variance");
        }
        Self {
            entries: Vec::new(),
            n_trees: forest.n_trees(),
            degenerate_trees,
        }
    }

    pub(crate) fn insert(&mut self, entry: SubsetImportance) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.subset == entry.subset) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    pub(crate) fn entry(&self, names: &[&str]) -> Option<&SubsetImportance> {
        let mut wanted: Vec<&str> = names.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        self.entries.iter().find(|e| {
            let mut have: Vec<&str> = e.subset.iter().map(String::as_str).collect();
            have.sort_unstable();
            have == wanted
        })
    }

    /// Aggregated importance of a subset, if it has been decomposed.
    #[must_use]
    pub fn get(&self, names: &[&str]) -> Option<Importance> {
        self.entry(names).map(|e| e.importance)
    }

    /// Per-tree importance fractions of a subset, if it has been decomposed.
    #[must_use]
    pub fn per_tree(&self, names: &[&str]) -> Option<&[f64]> {
        self.entry(names).map(|e| e.per_tree.as_slice())
    }

    /// Whether a subset has been decomposed.
    #[must_use]
    pub fn contains(&self, names: &[&str]) -> bool {
        self.entry(names).is_some()
    }

    /// All decomposed subsets, in decomposition order.
    #[must_use]
    pub fn entries(&self) -> &[SubsetImportance] {
        &self.entries
    }

    /// Single-hyperparameter importances, sorted by descending mean.
    #[must_use]
    pub fn main_effects(&self) -> Vec<(String, Importance)> {
        let mut effects: Vec<(String, Importance)> = self
            .entries
            .iter()
            .filter(|e| e.subset.len() == 1)
            .map(|e| (e.subset[0].clone(), e.importance))
            .collect();
        effects.sort_by(|a, b| b.1.mean.total_cmp(&a.1.mean));
        effects
    }

    /// Importances of subsets with two or more hyperparameters, sorted by
    /// descending mean.
    #[must_use]
    pub fn interactions(&self) -> Vec<(SubsetKey, Importance)> {
        let mut effects: Vec<(SubsetKey, Importance)> = self
            .entries
            .iter()
            .filter(|e| e.subset.len() > 1)
            .map(|e| (e.subset.clone(), e.importance))
            .collect();
        effects.sort_by(|a, b| b.1.mean.total_cmp(&a.1.mean));
        effects
    }

    /// Number of trees the importances were aggregated over.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Number of trees whose prediction was constant. Those trees report
    /// importance 0 for every subset.
    #[must_use]
    pub fn degenerate_trees(&self) -> usize {
        self.degenerate_trees
    }

    /// Whether every tree was degenerate, e.g. because all objective values
    /// were identical.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.degenerate_trees == self.n_trees
    }

    /// Serialize to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if serialization fails.
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| crate::Error::Serialization(e.to_string()))
    }

    /// Deserialize from a JSON string produced by [`to_json`](Self::to_json).
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Serialization`] if the input is not a valid result.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| crate::Error::Serialization(e.to_string()))
    }
}

/// Mean and population standard deviation of a slice.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(names: &[&str], per_tree: Vec<f64>) -> SubsetImportance {
        let (mean, std) = mean_std(&per_tree);
        SubsetImportance {
            subset: names.iter().map(|s| (*s).to_owned()).collect(),
            importance: Importance { mean, std },
            per_tree,
        }
    }

    fn result() -> ImportanceResult {
        let mut result = ImportanceResult {
            entries: Vec::new(),
            n_trees: 2,
            degenerate_trees: 0,
        };
        result.insert(entry(&["a"], vec![0.1, 0.3]));
        result.insert(entry(&["b"], vec![0.5, 0.7]));
        result.insert(entry(&["a", "b"], vec![0.05, 0.15]));
        result
    }

    #[test]
    fn std_is_population_std() {
        let (mean, std) = mean_std(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert!((mean - 3.0).abs() < 1e-12);
        assert!((std - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(mean_std(&[]), (0.0, 0.0));
    }

    #[test]
    fn lookup_ignores_name_order() {
        let result = result();
        assert!(result.contains(&["b", "a"]));
        assert_eq!(result.per_tree(&["b", "a"]), Some(&[0.05, 0.15][..]));
        assert!(result.get(&["c"]).is_none());
    }

    #[test]
    fn effects_are_sorted_descending() {
        let result = result();
        let main = result.main_effects();
        assert_eq!(main[0].0, "b");
        assert_eq!(main[1].0, "a");
        assert_eq!(result.interactions().len(), 1);
        let (mean, std): (f64, f64) = main[0].1.into();
        assert!((mean - 0.6).abs() < 1e-12);
        assert!((std - 0.1).abs() < 1e-12);
    }

    #[test]
    fn insert_replaces_existing_subsets() {
        let mut result = result();
        result.insert(entry(&["a"], vec![0.9, 0.9]));
        assert_eq!(result.entries().len(), 3);
        assert!((result.get(&["a"]).unwrap().mean - 0.9).abs() < 1e-12);
    }
}
