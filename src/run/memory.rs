use std::collections::{HashMap, HashSet};

use super::{EncodedData, Run};
use crate::error::{Error, Result};
use crate::hyperparameter::{Hyperparameter, INACTIVE, ParamValue};
use crate::types::{Budget, Objective, TrialState};

#[derive(Clone, Debug)]
struct TrialRecord {
    config_id: usize,
    budget: f64,
    values: Vec<f64>,
    state: TrialState,
}

/// A run whose configurations and trials live in memory.
///
/// Configurations are encoded once when added and deduplicated, so two
/// trials of the same configuration at different budgets share a config id.
///
/// # Examples
///
/// ```
/// use hpimportance::hyperparameter::{Hyperparameter, ParamValue};
/// use hpimportance::run::{MemoryRun, Run};
/// use hpimportance::{Budget, Direction, Objective};
///
/// let mut run = MemoryRun::new(
///     vec![Hyperparameter::float("x", 0.0, 1.0).unwrap()],
///     vec![Objective::new("cost", Direction::Minimize)],
/// )
/// .unwrap();
///
/// let id = run.add_config([("x", ParamValue::Float(0.25))]).unwrap();
/// run.add_trial(id, 10.0, vec![0.5]).unwrap();
///
/// let data = run
///     .encoded_data(&run.objectives()[0].clone(), Budget::Value(10.0))
///     .unwrap();
/// assert_eq!(data.x, vec![vec![0.25]]);
/// ```
#[derive(Clone, Debug)]
pub struct MemoryRun {
    hyperparameters: Vec<Hyperparameter>,
    objectives: Vec<Objective>,
    configs: Vec<Vec<f64>>,
    trials: Vec<TrialRecord>,
}

impl MemoryRun {
    /// Creates an empty run over the given search space and objectives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for duplicate names, no objectives, or
    /// cyclic conditions, and [`Error::UnknownHyperparameter`] when a
    /// condition names a parent that is not in the search space.
    pub fn new(hyperparameters: Vec<Hyperparameter>, objectives: Vec<Objective>) -> Result<Self> {
        let mut seen = HashSet::new();
        for hp in &hyperparameters {
            if !seen.insert(hp.name()) {
                return Err(Error::invalid_input(format!(
                    "duplicate hyperparameter '{}'",
                    hp.name()
                )));
            }
        }
        for hp in &hyperparameters {
            if let Some(cond) = hp.condition()
                && !seen.contains(cond.parent.as_str())
            {
                return Err(Error::UnknownHyperparameter(cond.parent.clone()));
            }
        }
        if objectives.is_empty() {
            return Err(Error::invalid_input("a run needs at least one objective"));
        }
        let mut names = HashSet::new();
        for objective in &objectives {
            if !names.insert(objective.name.as_str()) {
                return Err(Error::invalid_input(format!(
                    "duplicate objective '{}'",
                    objective.name
                )));
            }
        }

        let run = Self {
            hyperparameters,
            objectives,
            configs: Vec::new(),
            trials: Vec::new(),
        };
        run.check_acyclic()?;
        Ok(run)
    }

    fn check_acyclic(&self) -> Result<()> {
        let n = self.hyperparameters.len();
        for hp in &self.hyperparameters {
            let mut current = hp;
            let mut steps = 0;
            while let Some(cond) = current.condition() {
                steps += 1;
                if steps > n {
                    return Err(Error::invalid_input(format!(
                        "conditions of '{}' form a cycle",
                        hp.name()
                    )));
                }
                current = self.hyperparameter(&cond.parent)?;
            }
        }
        Ok(())
    }

    /// Encodes and records a configuration, returning its config id.
    ///
    /// Every active hyperparameter must have a value; inactive conditional
    /// hyperparameters must be left out. An identical configuration that was
    /// added before returns the existing id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownHyperparameter`] for names outside the search
    /// space and [`Error::InvalidValue`] for missing, superfluous or
    /// out-of-range values.
    pub fn add_config<S: AsRef<str>>(
        &mut self,
        values: impl IntoIterator<Item = (S, ParamValue)>,
    ) -> Result<usize> {
        let mut raw: HashMap<String, ParamValue> = HashMap::new();
        for (name, value) in values {
            let name = name.as_ref();
            self.hyperparameter(name)?;
            raw.insert(name.to_owned(), value);
        }

        let mut encoded = Vec::with_capacity(self.hyperparameters.len());
        for hp in &self.hyperparameters {
            let active = self.is_active(hp, &raw);
            match (active, raw.get(hp.name())) {
                (true, Some(value)) => encoded.push(hp.encode(value)?),
                (false, None) => encoded.push(INACTIVE),
                (true, None) => {
                    return Err(Error::InvalidValue {
                        name: hp.name().to_owned(),
                        reason: "missing value for active hyperparameter".into(),
                    });
                }
                (false, Some(_)) => {
                    return Err(Error::InvalidValue {
                        name: hp.name().to_owned(),
                        reason: "value given for inactive hyperparameter".into(),
                    });
                }
            }
        }

        if let Some(id) = self.configs.iter().position(|c| same_encoding(c, &encoded)) {
            return Ok(id);
        }
        self.configs.push(encoded);
        Ok(self.configs.len() - 1)
    }

    fn is_active(&self, hp: &Hyperparameter, raw: &HashMap<String, ParamValue>) -> bool {
        let Some(cond) = hp.condition() else {
            return true;
        };
        let Ok(parent) = self.hyperparameter(&cond.parent) else {
            return false;
        };
        self.is_active(parent, raw)
            && matches!(
                raw.get(parent.name()),
                Some(ParamValue::Categorical(i)) if cond.values.contains(i)
            )
    }

    /// Records a completed trial of `config_id` at `budget`.
    ///
    /// `values` holds one entry per objective. A later trial for the same
    /// configuration and budget replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown config id, a non-finite
    /// budget, or the wrong number of objective values.
    pub fn add_trial(&mut self, config_id: usize, budget: f64, values: Vec<f64>) -> Result<()> {
        if values.len() != self.objectives.len() {
            return Err(Error::invalid_input(format!(
                "expected {} objective values, got {}",
                self.objectives.len(),
                values.len()
            )));
        }
        self.record(TrialRecord {
            config_id,
            budget,
            values,
            state: TrialState::Complete,
        })
    }

    /// Records a failed trial of `config_id` at `budget`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown config id or a
    /// non-finite budget.
    pub fn add_failed_trial(&mut self, config_id: usize, budget: f64) -> Result<()> {
        self.record(TrialRecord {
            config_id,
            budget,
            values: vec![f64::NAN; self.objectives.len()],
            state: TrialState::Failed,
        })
    }

    fn record(&mut self, trial: TrialRecord) -> Result<()> {
        if trial.config_id >= self.configs.len() {
            return Err(Error::invalid_input(format!(
                "unknown config id {}",
                trial.config_id
            )));
        }
        if !trial.budget.is_finite() {
            return Err(Error::invalid_input("budget must be finite"));
        }
        if let Some(existing) = self.trials.iter_mut().find(|t| {
            t.config_id == trial.config_id && t.budget.to_bits() == trial.budget.to_bits()
        }) {
            *existing = trial;
        } else {
            self.trials.push(trial);
        }
        Ok(())
    }

    /// The encoded configuration with the given id.
    #[must_use]
    pub fn config(&self, config_id: usize) -> Option<&[f64]> {
        self.configs.get(config_id).map(Vec::as_slice)
    }

    /// Number of distinct configurations.
    #[must_use]
    pub fn n_configs(&self) -> usize {
        self.configs.len()
    }

    /// Number of recorded trials across all budgets.
    #[must_use]
    pub fn n_trials(&self) -> usize {
        self.trials.len()
    }

    /// Number of recorded trials that failed.
    #[must_use]
    pub fn n_failed_trials(&self) -> usize {
        self.trials
            .iter()
            .filter(|t| t.state == TrialState::Failed)
            .count()
    }
}

fn same_encoding(a: &[f64], b: &[f64]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
}

impl Run for MemoryRun {
    fn hyperparameters(&self) -> &[Hyperparameter] {
        &self.hyperparameters
    }

    fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    fn budgets(&self) -> Vec<Budget> {
        let mut values: Vec<f64> = self.trials.iter().map(|t| t.budget).collect();
        values.sort_by(f64::total_cmp);
        values.dedup_by(|a, b| a.to_bits() == b.to_bits());
        values.into_iter().map(Budget::Value).collect()
    }

    fn encoded_data(&self, objective: &Objective, budget: Budget) -> Result<EncodedData> {
        let column = self
            .objectives
            .iter()
            .position(|o| o.name == objective.name)
            .ok_or_else(|| {
                Error::invalid_input(format!(
                    "objective '{}' is not part of this run",
                    objective.name
                ))
            })?;

        let selected: Vec<&TrialRecord> = match budget {
            Budget::Value(b) => {
                let selected: Vec<_> = self
                    .trials
                    .iter()
                    .filter(|t| t.budget.to_bits() == b.to_bits())
                    .collect();
                if selected.is_empty() {
                    return Err(Error::invalid_input(format!(
                        "budget {budget} is not recorded in this run"
                    )));
                }
                selected
            }
            Budget::Combined => {
                let mut highest: Vec<Option<&TrialRecord>> = vec![None; self.configs.len()];
                for trial in &self.trials {
                    let slot = &mut highest[trial.config_id];
                    if slot.is_none_or(|best| trial.budget > best.budget) {
                        *slot = Some(trial);
                    }
                }
                highest.into_iter().flatten().collect()
            }
        };

        let mut data = EncodedData {
            x: Vec::with_capacity(selected.len()),
            y: Vec::with_capacity(selected.len()),
        };
        for trial in selected {
            data.x.push(self.configs[trial.config_id].clone());
            data.y.push(trial.values[column]);
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn conditional_run() -> MemoryRun {
        MemoryRun::new(
            vec![
                Hyperparameter::categorical("optimizer", 2).unwrap(),
                Hyperparameter::float("momentum", 0.0, 1.0)
                    .unwrap()
                    .conditional_on("optimizer", [1]),
            ],
            vec![Objective::new("cost", Direction::Minimize)],
        )
        .unwrap()
    }

    #[test]
    fn inactive_values_encode_as_nan() {
        let mut run = conditional_run();
        let id = run
            .add_config([("optimizer", ParamValue::Categorical(0))])
            .unwrap();
        let config = run.config(id).unwrap();
        assert!((config[0] - 0.0).abs() < 1e-12);
        assert!(config[1].is_nan());
    }

    #[test]
    fn rejects_values_that_violate_conditions() {
        let mut run = conditional_run();
        let err = run
            .add_config([
                ("optimizer", ParamValue::Categorical(0)),
                ("momentum", ParamValue::Float(0.5)),
            ])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));

        let err = run
            .add_config([("optimizer", ParamValue::Categorical(1))])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));
    }

    #[test]
    fn duplicate_configs_share_an_id() {
        let mut run = conditional_run();
        let a = run
            .add_config([("optimizer", ParamValue::Categorical(0))])
            .unwrap();
        let b = run
            .add_config([("optimizer", ParamValue::Categorical(0))])
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(run.n_configs(), 1);
    }

    #[test]
    fn unknown_parent_is_rejected() {
        let result = MemoryRun::new(
            vec![
                Hyperparameter::float("x", 0.0, 1.0)
                    .unwrap()
                    .conditional_on("missing", [0]),
            ],
            vec![Objective::new("cost", Direction::Minimize)],
        );
        assert!(matches!(result, Err(Error::UnknownHyperparameter(name)) if name == "missing"));
    }

    #[test]
    fn cyclic_conditions_are_rejected() {
        let result = MemoryRun::new(
            vec![
                Hyperparameter::categorical("a", 2)
                    .unwrap()
                    .conditional_on("b", [0]),
                Hyperparameter::categorical("b", 2)
                    .unwrap()
                    .conditional_on("a", [0]),
            ],
            vec![Objective::new("cost", Direction::Minimize)],
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn combined_budget_uses_highest_budget_per_config() {
        let mut run = conditional_run();
        let a = run
            .add_config([("optimizer", ParamValue::Categorical(0))])
            .unwrap();
        let b = run
            .add_config([
                ("optimizer", ParamValue::Categorical(1)),
                ("momentum", ParamValue::Float(0.9)),
            ])
            .unwrap();
        run.add_trial(a, 1.0, vec![5.0]).unwrap();
        run.add_trial(a, 3.0, vec![2.0]).unwrap();
        run.add_trial(b, 1.0, vec![4.0]).unwrap();
        run.add_failed_trial(b, 9.0).unwrap();

        let objective = run.objective(0).unwrap().clone();
        let data = run.encoded_data(&objective, Budget::Combined).unwrap();
        assert_eq!(data.n_rows(), 2);
        assert!((data.y[0] - 2.0).abs() < 1e-12);
        assert!(data.y[1].is_nan());
        assert_eq!(data.n_failed(), 1);
        assert_eq!(run.n_failed_trials(), 1);

        assert_eq!(run.budget_labels(), vec!["1", "3", "9"]);
        let low = run.encoded_data(&objective, run.budget(0).unwrap()).unwrap();
        assert_eq!(low.y, vec![5.0, 4.0]);
    }

    #[test]
    fn unknown_budget_and_objective() {
        let run = conditional_run();
        assert!(matches!(run.budget(0), Err(Error::UnknownBudget(0))));
        assert!(matches!(run.objective(3), Err(Error::UnknownObjective(3))));
        let other = Objective::new("accuracy", Direction::Maximize);
        assert!(run.encoded_data(&other, Budget::Combined).is_err());
    }
}
