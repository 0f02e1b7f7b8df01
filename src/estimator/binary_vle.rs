use super::{DataSet, EstimatorError, Phase};
use itertools::izip;
use ndarray::{arr1, Array1};
use saftgm_core::units::REFERENCE_PRESSURE;
use saftgm_core::{Contributions, EosResult, PhaseEquilibrium, Residual, SolverOptions};
use std::sync::Arc;

/// Store experimental binary VLE data for the calculation of pressure residuals.
///
/// For liquid compositions the model pressure is a bubble point pressure,
/// for vapor compositions a dew point pressure. Temperatures in K,
/// pressures in Pa, compositions as mole fractions of the first component.
#[derive(Clone)]
pub struct BinaryVlePressure {
    target: Array1<f64>,
    temperature: Array1<f64>,
    molefracs: Array1<f64>,
    phase: Phase,
    weights: Option<Array1<f64>>,
    solver_options: SolverOptions,
}

impl BinaryVlePressure {
    pub fn new(
        temperature: Array1<f64>,
        pressure: Array1<f64>,
        molefracs: Array1<f64>,
        phase: Phase,
    ) -> Result<Self, EstimatorError> {
        if temperature.len() != pressure.len() || temperature.len() != molefracs.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        Ok(Self {
            target: pressure,
            temperature,
            molefracs,
            phase,
            weights: None,
            solver_options: SolverOptions::default(),
        })
    }

    /// Weights of the individual data points.
    pub fn weights(mut self, weights: Array1<f64>) -> Result<Self, EstimatorError> {
        if weights.len() != self.target.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        self.weights = Some(weights);
        Ok(self)
    }

    pub fn solver_options(mut self, solver_options: SolverOptions) -> Self {
        self.solver_options = solver_options;
        self
    }

    /// Data points as (temperature, pressure, molefrac) triples.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        izip!(&self.temperature, &self.target, &self.molefracs).map(|(&t, &p, &x)| (t, p, x))
    }
}

impl<E: Residual> DataSet<E> for BinaryVlePressure {
    fn target(&self) -> &Array1<f64> {
        &self.target
    }

    fn target_str(&self) -> &str {
        "pressure"
    }

    fn input_str(&self) -> Vec<&str> {
        let mut vec = vec!["temperature", "pressure"];
        vec.push(match self.phase {
            Phase::Vapor => "vapor molefracs",
            Phase::Liquid => "liquid molefracs",
        });
        vec
    }

    fn point_weights(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    fn predict_point(&self, eos: &Arc<E>, index: usize) -> EosResult<f64> {
        let t = self.temperature[index];
        let xi = self.molefracs[index];
        let molefracs = arr1(&[xi, 1.0 - xi]);
        // the experimental pressure is the initial guess
        let p_init = Some(self.target[index] / REFERENCE_PRESSURE);
        let options = (self.solver_options, self.solver_options);
        let vle = match self.phase {
            Phase::Vapor => PhaseEquilibrium::dew_point(eos, t, &molefracs, p_init, None, options),
            Phase::Liquid => {
                PhaseEquilibrium::bubble_point(eos, t, &molefracs, p_init, None, options)
            }
        }?;
        Ok(vle.vapor().pressure(Contributions::Total) * REFERENCE_PRESSURE)
    }
}
