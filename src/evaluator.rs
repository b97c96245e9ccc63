//! The fANOVA importance evaluator for recorded runs.
//!
//! [`Fanova`] ties a [`Run`] to the surrogate forest and the variance
//! decomposition. [`calculate`](Fanova::calculate) fits a forest for one
//! (objective, budget) selection and decomposes every single
//! hyperparameter; [`importances`](Fanova::importances) and
//! [`subset_importances`](Fanova::subset_importances) read the cached result
//! and decompose further subsets against the cached forest on demand.
//!
//! # Access contract
//!
//! The evaluator holds exactly one (forest, result) pair. Every method that
//! can change it takes `&mut self`, so a host sharing an evaluator between
//! threads must serialize access itself (e.g. behind a mutex); the
//! evaluator has no internal lock. A failed `calculate` leaves the previous
//! pair in place.
//!
//! # Example
//!
//! ```
//! use hpimportance::hyperparameter::{Hyperparameter, ParamValue};
//! use hpimportance::run::{MemoryRun, Run};
//! use hpimportance::{Budget, Direction, Fanova, Objective};
//!
//! let mut run = MemoryRun::new(
//!     vec![
//!         Hyperparameter::float("lr", 0.0, 1.0).unwrap(),
//!         Hyperparameter::float("dropout", 0.0, 1.0).unwrap(),
//!     ],
//!     vec![Objective::new("cost", Direction::Minimize)],
//! )
//! .unwrap();
//!
//! let mut rng = fastrand::Rng::with_seed(0);
//! for _ in 0..50 {
//!     let (lr, dropout) = (rng.f64(), rng.f64());
//!     let id = run
//!         .add_config([
//!             ("lr", ParamValue::Float(lr)),
//!             ("dropout", ParamValue::Float(dropout)),
//!         ])
//!         .unwrap();
//!     run.add_trial(id, 1.0, vec![5.0 * lr + 0.1 * dropout]).unwrap();
//! }
//!
//! let objective = run.objective(0).unwrap().clone();
//! let budget = run.budget(0).unwrap();
//!
//! let mut evaluator = Fanova::new(&run);
//! evaluator.calculate(&objective, budget, 10, 0).unwrap();
//! let importances = evaluator.importances(&[], true).unwrap();
//! assert_eq!(importances[0].0, "lr");
//! ```

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fanova::{
    FanovaConfig, Forest, Importance, ImportanceResult, Observations, SubsetKey,
    VarianceDecomposer,
};
use crate::run::Run;
use crate::types::{Budget, Objective};

/// The parameters a cached calculation was made with.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalculationKey {
    /// Name of the objective.
    pub objective: String,
    /// Selected budget.
    pub budget: Budget,
    /// Seed of the forest.
    pub seed: u64,
    /// Number of trees.
    pub n_trees: usize,
}

struct Calculation {
    key: CalculationKey,
    forest: Forest,
    decomposer: VarianceDecomposer,
    result: ImportanceResult,
}

/// fANOVA hyperparameter-importance evaluator over a recorded run.
pub struct Fanova<'r, R: Run + ?Sized> {
    run: &'r R,
    config: FanovaConfig,
    current: Option<Calculation>,
}

impl<'r, R: Run + ?Sized> Fanova<'r, R> {
    /// Creates an evaluator with the default forest configuration.
    #[must_use]
    pub fn new(run: &'r R) -> Self {
        Self::with_config(run, FanovaConfig::default())
    }

    /// Creates an evaluator with a custom forest configuration.
    ///
    /// `n_trees` and `seed` of `config` are replaced by the arguments of
    /// every [`calculate`](Self::calculate) call.
    #[must_use]
    pub fn with_config(run: &'r R, config: FanovaConfig) -> Self {
        Self {
            run,
            config,
            current: None,
        }
    }

    /// The run this evaluator reads from.
    #[must_use]
    pub fn run(&self) -> &'r R {
        self.run
    }

    /// Fit the surrogate forest for `objective` at `budget` and decompose
    /// every single hyperparameter.
    ///
    /// Failed trials are dropped before fitting. Calling again with the same
    /// objective, budget, tree count and seed keeps the cached result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `n_trees` is zero, the selection has
    /// no trials, or every trial failed, and forwards provider errors. The
    /// previously cached result is kept on error.
    pub fn calculate(
        &mut self,
        objective: &Objective,
        budget: Budget,
        n_trees: usize,
        seed: u64,
    ) -> Result<()> {
        let key = CalculationKey {
            objective: objective.name.clone(),
            budget,
            seed,
            n_trees,
        };
        if self.current.as_ref().is_some_and(|c| c.key == key) {
            trace_debug!(objective = %key.objective, %budget, "fanova result cached");
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "fanova_calculate",
            objective = %objective.name,
            %budget,
            n_trees,
            seed
        )
        .entered();

        if n_trees < 1 {
            return Err(Error::invalid_input("n_trees must be at least 1"));
        }

        let data = self.run.encoded_data(objective, budget)?;
        let observations = Observations::new(self.run.hyperparameters(), data)?;
        trace_debug!(
            kept = observations.len(),
            dropped = observations.n_dropped(),
            "observations encoded"
        );

        let config = FanovaConfig {
            n_trees,
            seed,
            ..self.config.clone()
        };
        let forest = Forest::fit(&observations, &config)?;

        let mut decomposer = VarianceDecomposer::new(&forest);
        let mut result = ImportanceResult::new(&forest);
        for name in forest.names() {
            result.insert(decomposer.importance(&forest, &[name.as_str()])?);
        }

        trace_info!(
            n_trees,
            seed,
            degenerate_trees = result.degenerate_trees(),
            "fanova calculated"
        );

        self.current = Some(Calculation {
            key,
            forest,
            decomposer,
            result,
        });
        Ok(())
    }

    /// Mean and standard deviation of the importance of each named
    /// hyperparameter.
    ///
    /// An empty `names` slice selects every hyperparameter of the run. With
    /// `sort`, entries are ordered by descending mean importance; otherwise
    /// they follow `names`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCalculated`] before a successful
    /// [`calculate`](Self::calculate) and [`Error::UnknownHyperparameter`] for
    /// names outside the search space.
    pub fn importances(&mut self, names: &[&str], sort: bool) -> Result<Vec<(String, Importance)>> {
        let all: Vec<String>;
        let names: Vec<&str> = if names.is_empty() {
            all = self.current()?.forest.names().to_vec();
            all.iter().map(String::as_str).collect()
        } else {
            names.to_vec()
        };

        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let (_, importance) = self.subset_importance(&[name])?;
            out.push((name.to_owned(), importance));
        }
        if sort {
            out.sort_by(|a, b| b.1.mean.total_cmp(&a.1.mean));
        }
        Ok(out)
    }

    /// Importance of arbitrary hyperparameter subsets.
    ///
    /// Subsets that have not been decomposed yet are decomposed against the
    /// cached forest, without refitting, and kept in the cached result.
    /// For subsets of two or more hyperparameters the importance excludes
    /// the contributions of their proper subsets, so a pair reports its pure
    /// interaction effect.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCalculated`] before a successful
    /// [`calculate`](Self::calculate), [`Error::UnknownHyperparameter`] for
    /// names outside the search space and [`Error::InvalidInput`] for an
    /// empty subset or one with more than
    /// [`MAX_SUBSET_SIZE`](crate::fanova::MAX_SUBSET_SIZE) hyperparameters.
    pub fn subset_importances(
        &mut self,
        subsets: &[&[&str]],
    ) -> Result<Vec<(SubsetKey, Importance)>> {
        subsets
            .iter()
            .map(|names| self.subset_importance(names))
            .collect()
    }

    fn subset_importance(&mut self, names: &[&str]) -> Result<(SubsetKey, Importance)> {
        let calc = self.current.as_mut().ok_or(Error::NotCalculated)?;
        if let Some(entry) = calc.result.entry(names) {
            return Ok((entry.subset.clone(), entry.importance));
        }
        let entry = calc.decomposer.importance(&calc.forest, names)?;
        let found = (entry.subset.clone(), entry.importance);
        calc.result.insert(entry);
        Ok(found)
    }

    /// The `n` hyperparameter pairs with the largest interaction importance.
    ///
    /// Every pair of the search space is decomposed on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCalculated`] before a successful
    /// [`calculate`](Self::calculate).
    pub fn most_important_pairs(&mut self, n: usize) -> Result<Vec<(SubsetKey, Importance)>> {
        let names = self.current()?.forest.names().to_vec();
        let mut pairs = Vec::new();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                pairs.push(self.subset_importance(&[a.as_str(), b.as_str()])?);
            }
        }
        pairs.sort_by(|x, y| y.1.mean.total_cmp(&x.1.mean));
        pairs.truncate(n);
        Ok(pairs)
    }

    /// Marginal prediction of the cached forest at encoded `values` of the
    /// named hyperparameters, as mean and standard deviation across trees.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotCalculated`] before a successful
    /// [`calculate`](Self::calculate), [`Error::UnknownHyperparameter`] for
    /// unknown names and [`Error::InvalidInput`] if `names` and `values`
    /// differ in length or a value lies outside its encoded domain.
    pub fn marginal(&self, names: &[&str], values: &[f64]) -> Result<(f64, f64)> {
        let forest = &self.current()?.forest;
        let dims = names
            .iter()
            .map(|name| forest.dimension(name))
            .collect::<Result<Vec<_>>>()?;
        forest.marginal(&dims, values)
    }

    /// The cached importance result, if any.
    #[must_use]
    pub fn result(&self) -> Option<&ImportanceResult> {
        self.current.as_ref().map(|c| &c.result)
    }

    /// The cached forest, if any.
    #[must_use]
    pub fn forest(&self) -> Option<&Forest> {
        self.current.as_ref().map(|c| &c.forest)
    }

    /// The parameters of the cached calculation, if any.
    #[must_use]
    pub fn calculation_key(&self) -> Option<&CalculationKey> {
        self.current.as_ref().map(|c| &c.key)
    }

    fn current(&self) -> Result<&Calculation> {
        self.current.as_ref().ok_or(Error::NotCalculated)
    }
}
