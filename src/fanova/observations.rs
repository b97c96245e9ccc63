use crate::error::{Error, Result};
use crate::hyperparameter::{Domain, Hyperparameter};
use crate::run::EncodedData;

/// Validated training data for the surrogate forest.
///
/// Built from a provider's [`EncodedData`]: rows with a non-finite
/// objective value (failed or not evaluated trials) are dropped and every
/// remaining encoded value is checked against its hyperparameter's domain.
#[derive(Clone, Debug)]
pub struct Observations {
    pub(crate) names: Vec<String>,
    pub(crate) domains: Vec<Domain>,
    pub(crate) x: Vec<Vec<f64>>,
    pub(crate) y: Vec<f64>,
    n_dropped: usize,
}

impl Observations {
    /// Filters failed rows out of `data` and validates the rest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the data is empty, every row
    /// failed, row and target counts differ, a row has the wrong width, or an
    /// encoded value lies outside its domain.
    pub fn new(hyperparameters: &[Hyperparameter], data: EncodedData) -> Result<Self> {
        let EncodedData { x, y } = data;
        if x.len() != y.len() {
            return Err(Error::invalid_input(format!(
                "{} rows but {} objective values",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(Error::invalid_input("no observations"));
        }

        let names: Vec<String> = hyperparameters.iter().map(|hp| hp.name().to_owned()).collect();
        let domains: Vec<Domain> = hyperparameters.iter().map(Hyperparameter::domain).collect();

        let total = x.len();
        let (x, y): (Vec<Vec<f64>>, Vec<f64>) = x
            .into_iter()
            .zip(y)
            .filter(|(_, target)| target.is_finite())
            .unzip();
        if y.is_empty() {
            return Err(Error::invalid_input(format!(
                "all {total} objective values are failed or missing"
            )));
        }

        for (i, row) in x.iter().enumerate() {
            if row.len() != domains.len() {
                return Err(Error::invalid_input(format!(
                    "row {i} has {} values, expected {}",
                    row.len(),
                    domains.len()
                )));
            }
            for ((&value, domain), name) in row.iter().zip(&domains).zip(&names) {
                if !value.is_nan() && !in_domain(value, *domain) {
                    return Err(Error::invalid_input(format!(
                        "encoded value {value} of '{name}' in row {i} is outside its domain"
                    )));
                }
            }
        }

        Ok(Self {
            names,
            domains,
            n_dropped: total - y.len(),
            x,
            y,
        })
    }

    /// Number of observations kept for fitting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Always `false`: construction rejects empty observation sets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Number of failed rows dropped during construction.
    #[must_use]
    pub fn n_dropped(&self) -> usize {
        self.n_dropped
    }

    /// Hyperparameter names, in column order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) fn in_domain(value: f64, domain: Domain) -> bool {
    match domain {
        Domain::Interval { low, high } => value.is_finite() && value >= low && value <= high,
        Domain::Categories(n) => value.fract() == 0.0 && value >= 0.0 && value < n as f64,
    }
}
