use super::{DataSet, EstimatorError};
use ndarray::Array1;
use saftgm_core::units::REFERENCE_PRESSURE;
use saftgm_core::{
    Contributions, EosError, EosResult, PhaseEquilibrium, Residual, SolverOptions, State,
};
use std::sync::Arc;

/// Store experimental vapor pressure data.
///
/// Temperatures in K, pressures in Pa.
#[derive(Clone)]
pub struct VaporPressure {
    pub target: Array1<f64>,
    temperature: Array1<f64>,
    weights: Option<Array1<f64>>,
    max_temperature: f64,
    extrapolate: bool,
    solver_options: SolverOptions,
}

impl VaporPressure {
    /// Create a new data set for vapor pressure.
    ///
    /// If the equation of state fails to compute the vapor pressure
    /// (e.g. when it underestimates the critical point) the vapor
    /// pressure can be estimated.
    /// If `extrapolate` is `true`, the vapor pressure is estimated by
    /// calculating the slope of ln(p) over 1/T.
    /// If `extrapolate` is `false`, the point counts as failed.
    pub fn new(
        target: Array1<f64>,
        temperature: Array1<f64>,
        extrapolate: bool,
    ) -> Result<Self, EstimatorError> {
        if target.len() != temperature.len() || target.is_empty() {
            return Err(EstimatorError::IncompatibleInput);
        }
        let max_temperature = temperature.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        Ok(Self {
            target,
            temperature,
            weights: None,
            max_temperature,
            extrapolate,
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

    /// Return temperature.
    pub fn temperature(&self) -> Array1<f64> {
        self.temperature.clone()
    }

    /// Saturation pressure in reduced units.
    fn saturation_pressure<E: Residual>(&self, eos: &Arc<E>, temperature: f64) -> EosResult<f64> {
        PhaseEquilibrium::pure_t(eos, temperature, None, self.solver_options)
            .map(|vle| vle.vapor().pressure(Contributions::Total))
    }

    /// Coefficients of $\ln p=a+b/T$ through the critical point and the
    /// vapor pressure at $0.9T_c$.
    fn extrapolation<E: Residual>(&self, eos: &Arc<E>) -> EosResult<(f64, f64)> {
        let critical_point =
            State::critical_point(eos, Some(self.max_temperature), SolverOptions::default())?;
        let tc = critical_point.temperature;
        let pc = critical_point.pressure(Contributions::Total);

        let t0 = 0.9 * tc;
        let p0 = self.saturation_pressure(eos, t0)?;

        let b = (pc / p0).ln() / (1.0 / tc - 1.0 / t0);
        let a = pc.ln() - b / tc;
        Ok((a, b))
    }
}

impl<E: Residual> DataSet<E> for VaporPressure {
    fn target(&self) -> &Array1<f64> {
        &self.target
    }

    fn target_str(&self) -> &str {
        "vapor pressure"
    }

    fn input_str(&self) -> Vec<&str> {
        vec!["temperature"]
    }

    fn point_weights(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    fn predict_point(&self, eos: &Arc<E>, index: usize) -> EosResult<f64> {
        let t = self.temperature[index];
        match self.saturation_pressure(eos, t) {
            Ok(p) => Ok(p * REFERENCE_PRESSURE),
            Err(_) if self.extrapolate => {
                let (a, b) = self.extrapolation(eos)?;
                Ok((a + b / t).exp() * REFERENCE_PRESSURE)
            }
            Err(e) => Err(e),
        }
    }

    fn predict_points(&self, eos: &Arc<E>) -> Vec<EosResult<f64>> {
        let mut prediction: Vec<_> = self
            .temperature
            .iter()
            .map(|&t| self.saturation_pressure(eos, t).map(|p| p * REFERENCE_PRESSURE))
            .collect();
        if self.extrapolate && prediction.iter().any(|p| p.is_err()) {
            let extrapolation = self.extrapolation(eos);
            for (p, &t) in prediction.iter_mut().zip(self.temperature.iter()) {
                if p.is_err() {
                    *p = match &extrapolation {
                        Ok((a, b)) => Ok((a + b / t).exp() * REFERENCE_PRESSURE),
                        Err(e) => Err(EosError::Error(format!(
                            "vapor pressure extrapolation failed: {e}"
                        ))),
                    };
                }
            }
        }
        prediction
    }
}
