//! The [`DataSet`] trait provides routines that can be used for
//! optimization of parameters of equations of state given
//! a `target` which can be values from experimental data or
//! other models.
use super::Loss;
use super::FAILURE_PENALTY;
use ndarray::Array1;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use saftgm_core::{EosResult, Residual};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Weighted residuals of a data set together with the number of failed points.
#[derive(Clone, Debug)]
pub struct DataSetCost {
    pub residuals: Array1<f64>,
    pub failed_points: usize,
}

/// Utilities for working with experimental data.
///
/// Functionalities in the context of optimizations of
/// parameters of equations of state.
pub trait DataSet<E: Residual>: Send + Sync {
    /// Return target quantity.
    fn target(&self) -> &Array1<f64>;

    /// Return the description of the target quantity.
    fn target_str(&self) -> &str;

    /// Return the descriptions of the input quantities needed to compute the target.
    fn input_str(&self) -> Vec<&str>;

    /// Evaluation of the equation of state for a single data point.
    fn predict_point(&self, eos: &Arc<E>, index: usize) -> EosResult<f64>;

    /// Weights of the individual data points. Defaults to one.
    fn point_weights(&self) -> Option<&Array1<f64>> {
        None
    }

    /// Returns the number of experimental data points.
    fn datapoints(&self) -> usize {
        self.target().len()
    }

    /// Evaluation of the equation of state for every data point.
    fn predict_points(&self, eos: &Arc<E>) -> Vec<EosResult<f64>> {
        #[cfg(feature = "rayon")]
        let prediction = (0..self.datapoints())
            .into_par_iter()
            .map(|i| self.predict_point(eos, i))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let prediction = (0..self.datapoints())
            .map(|i| self.predict_point(eos, i))
            .collect();
        prediction
    }

    /// Evaluation of the equation of state for the target quantity.
    ///
    /// Failed points are reported as `NaN`.
    fn predict(&self, eos: &Arc<E>) -> Array1<f64> {
        self.predict_points(eos)
            .into_iter()
            .map(|p| p.unwrap_or(f64::NAN))
            .collect()
    }

    /// Returns the relative difference between the equation of state and the experimental values.
    fn relative_difference(&self, eos: &Arc<E>) -> Array1<f64> {
        let prediction = self.predict(eos);
        (&prediction - self.target()) / self.target()
    }

    /// Evaluate the cost function.
    ///
    /// Weighted relative differences are passed through the loss function
    /// and divided by the number of data points. Points for which the
    /// prediction failed are assigned [FAILURE_PENALTY].
    fn cost(&self, eos: &Arc<E>, loss: Loss) -> DataSetCost {
        let datapoints = self.datapoints() as f64;
        let target = self.target();
        let weights = self.point_weights();
        let mut failed_points = 0;
        let residuals = self
            .predict_points(eos)
            .into_iter()
            .enumerate()
            .map(|(i, p)| match p {
                Ok(p) if p.is_finite() => {
                    let w = weights.map_or(1.0, |w| w[i]);
                    loss.apply_scalar(w * (p - target[i]) / target[i]) / datapoints
                }
                Ok(_) => {
                    failed_points += 1;
                    debug!(dataset = self.target_str(), point = i, "non-finite prediction");
                    FAILURE_PENALTY / datapoints
                }
                Err(e) => {
                    failed_points += 1;
                    debug!(dataset = self.target_str(), point = i, error = %e, "prediction failed");
                    FAILURE_PENALTY / datapoints
                }
            })
            .collect();
        DataSetCost {
            residuals,
            failed_points,
        }
    }

    /// Cost of a data set for which no model could be built.
    fn penalty(&self) -> DataSetCost {
        let n = self.datapoints();
        DataSetCost {
            residuals: Array1::from_elem(n, FAILURE_PENALTY / n as f64),
            failed_points: n,
        }
    }

    /// Returns the mean of the absolute relative difference between the equation of state and the experimental values.
    fn mean_absolute_relative_difference(&self, eos: &Arc<E>) -> f64 {
        self.relative_difference(eos)
            .into_iter()
            .filter(|&x| x.is_finite())
            .enumerate()
            .fold(0.0, |mean, (i, x)| mean + (x.abs() - mean) / (i + 1) as f64)
    }
}

impl<E: Residual> fmt::Display for dyn DataSet<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DataSet(target: {}, input: {}, datapoints: {})",
            self.target_str(),
            self.input_str().join(", "),
            self.datapoints()
        )
    }
}
