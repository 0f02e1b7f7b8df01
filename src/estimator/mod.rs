//! Utilities for working with experimental data.
use saftgm_core::{EosError, PhaseHint};
use thiserror::Error;

mod dataset;
pub use dataset::{DataSet, DataSetCost};
mod estimator;
pub use estimator::Estimator;
mod loss;
pub use loss::Loss;
mod objective;
pub use objective::{Evaluation, FitParameter, ModelParameter, ParameterObjective, FAILURE_PENALTY};

// Properties
mod vapor_pressure;
pub use vapor_pressure::VaporPressure;
mod liquid_density;
pub use liquid_density::{EquilibriumLiquidDensity, LiquidDensity};
mod binary_vle;
pub use binary_vle::BinaryVlePressure;

/// Different phases of experimental data points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Vapor,
    Liquid,
}

impl From<Phase> for PhaseHint {
    fn from(value: Phase) -> Self {
        match value {
            Phase::Liquid => PhaseHint::Liquid,
            Phase::Vapor => PhaseHint::Vapor,
        }
    }
}

#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("Input has not the same amount of data as the target.")]
    IncompatibleInput,
    #[error(transparent)]
    ShapeError(#[from] ndarray::ShapeError),
    #[error("Invalid bounds for parameter {0}: [{1}, {2}].")]
    InvalidBounds(usize, f64, f64),
    #[error("No feasible parameter set found after {evaluations} evaluations.")]
    NoFeasibleFit {
        evaluations: usize,
        /// Best cost after every generation or iteration
        history: Vec<f64>,
    },
    #[error(transparent)]
    EosError(#[from] EosError),
}
