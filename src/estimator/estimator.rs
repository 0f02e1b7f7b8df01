//! The [`Estimator`] struct can be used to store multiple [`DataSet`]s for convenient parameter
//! optimization.
use super::{DataSet, DataSetCost, EstimatorError, Loss};
use ndarray::{concatenate, Array1, ArrayView1, Axis};
use saftgm_core::Residual;
use std::fmt;
use std::fmt::Display;
use std::sync::Arc;

/// A collection of [`DataSet`]s and weights that can be used to
/// evaluate an equation of state versus experimental data.
pub struct Estimator<E: Residual> {
    data: Vec<Arc<dyn DataSet<E>>>,
    weights: Vec<f64>,
    losses: Vec<Loss>,
}

impl<E: Residual> Clone for Estimator<E> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            weights: self.weights.clone(),
            losses: self.losses.clone(),
        }
    }
}

impl<E: Residual> Estimator<E> {
    /// Create a new `Estimator` given `DataSet`s and weights.
    ///
    /// The weights are normalized and used as multiplicator when the
    /// cost function across all `DataSet`s is evaluated.
    pub fn new(
        data: Vec<Arc<dyn DataSet<E>>>,
        weights: Vec<f64>,
        losses: Vec<Loss>,
    ) -> Result<Self, EstimatorError> {
        if data.len() != weights.len() || data.len() != losses.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        if weights.iter().any(|&w| !w.is_finite() || w < 0.0) {
            return Err(EstimatorError::IncompatibleInput);
        }
        Ok(Self {
            data,
            weights,
            losses,
        })
    }

    /// Add a `DataSet` and its weight.
    pub fn add_data(&mut self, data: &Arc<dyn DataSet<E>>, weight: f64, loss: Loss) {
        self.data.push(data.clone());
        self.weights.push(weight);
        self.losses.push(loss);
    }

    fn normalized_weights(&self) -> Array1<f64> {
        let w = Array1::from_vec(self.weights.clone());
        let sum = w.sum();
        if sum > 0.0 {
            w / sum
        } else {
            Array1::from_elem(w.len(), 1.0 / w.len() as f64)
        }
    }

    fn collect(&self, costs: Vec<DataSetCost>) -> Result<(Array1<f64>, usize), EstimatorError> {
        let w = self.normalized_weights();
        let failed = costs.iter().map(|c| c.failed_points).sum();
        let weighted: Vec<_> = costs
            .into_iter()
            .zip(w.iter())
            .map(|(c, &wi)| c.residuals * wi)
            .collect();
        let aview: Vec<ArrayView1<f64>> = weighted.iter().map(|r| r.view()).collect();
        Ok((concatenate(Axis(0), &aview)?, failed))
    }

    /// Returns the weighted residuals of all `DataSet`s and the number of failed points.
    pub fn cost(&self, eos: &Arc<E>) -> Result<(Array1<f64>, usize), EstimatorError> {
        let costs = self
            .data
            .iter()
            .zip(&self.losses)
            .map(|(d, &loss)| d.cost(eos, loss))
            .collect();
        self.collect(costs)
    }

    /// Residuals if every point of every `DataSet` failed.
    pub fn penalty(&self) -> Result<(Array1<f64>, usize), EstimatorError> {
        self.collect(self.data.iter().map(|d| d.penalty()).collect())
    }

    /// Returns the properties as computed by the equation of state for each `DataSet`.
    pub fn predict(&self, eos: &Arc<E>) -> Vec<Array1<f64>> {
        self.data.iter().map(|d| d.predict(eos)).collect()
    }

    /// Returns the relative difference for each `DataSet`.
    pub fn relative_difference(&self, eos: &Arc<E>) -> Vec<Array1<f64>> {
        self.data
            .iter()
            .map(|d| d.relative_difference(eos))
            .collect()
    }

    /// Returns the mean absolute relative difference for each `DataSet`.
    pub fn mean_absolute_relative_difference(&self, eos: &Arc<E>) -> Array1<f64> {
        self.data
            .iter()
            .map(|d| d.mean_absolute_relative_difference(eos))
            .collect()
    }

    /// Returns the stored `DataSet`s.
    pub fn datasets(&self) -> Vec<Arc<dyn DataSet<E>>> {
        self.data.to_vec()
    }

    /// Total number of data points.
    pub fn datapoints(&self) -> usize {
        self.data.iter().map(|d| d.datapoints()).sum()
    }

    /// Representation as markdown string.
    pub fn markdown(&self) -> String {
        let mut f = String::from("| target | input | datapoints |\n|:-|:-|:-|");
        for d in self.data.iter() {
            f.push_str(&format!(
                "\n|{}|{}|{}|",
                d.target_str(),
                d.input_str().join(", "),
                d.datapoints()
            ));
        }
        f
    }
}

impl<E: Residual> Display for Estimator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.data.iter() {
            writeln!(f, "{}", d)?;
        }
        Ok(())
    }
}
