use super::{DataSet, EstimatorError, Phase};
use ndarray::{arr1, Array1};
use saftgm_core::units::REFERENCE_DENSITY;
use saftgm_core::{phase_properties, EosResult, PhaseEquilibrium, Residual, SolverOptions};
use std::sync::Arc;

/// Liquid density data as function of pressure and temperature.
///
/// Densities in mol/m³, temperatures in K and pressures in Pa.
#[derive(Clone)]
pub struct LiquidDensity {
    /// molar density
    pub target: Array1<f64>,
    /// temperature
    temperature: Array1<f64>,
    /// pressure
    pressure: Array1<f64>,
    weights: Option<Array1<f64>>,
}

impl LiquidDensity {
    /// A new data set for liquid densities with pressures and temperatures as input.
    pub fn new(
        target: Array1<f64>,
        temperature: Array1<f64>,
        pressure: Array1<f64>,
    ) -> Result<Self, EstimatorError> {
        if target.len() != temperature.len() || target.len() != pressure.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        Ok(Self {
            target,
            temperature,
            pressure,
            weights: None,
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

    /// Returns temperature of data points.
    pub fn temperature(&self) -> Array1<f64> {
        self.temperature.clone()
    }

    /// Returns pressure of data points.
    pub fn pressure(&self) -> Array1<f64> {
        self.pressure.clone()
    }
}

impl<E: Residual> DataSet<E> for LiquidDensity {
    fn target(&self) -> &Array1<f64> {
        &self.target
    }

    fn target_str(&self) -> &str {
        "liquid density"
    }

    fn input_str(&self) -> Vec<&str> {
        vec!["temperature", "pressure"]
    }

    fn point_weights(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    fn predict_point(&self, eos: &Arc<E>, index: usize) -> EosResult<f64> {
        phase_properties(
            eos,
            self.temperature[index],
            self.pressure[index],
            &arr1(&[1.0]),
            Phase::Liquid.into(),
        )
        .map(|state| state.density)
    }
}

/// Store experimental data of coexisting liquid (or vapor) densities and compare to the equation of state.
#[derive(Clone)]
pub struct EquilibriumLiquidDensity {
    pub target: Array1<f64>,
    temperature: Array1<f64>,
    phase: Phase,
    weights: Option<Array1<f64>>,
    solver_options: SolverOptions,
}

impl EquilibriumLiquidDensity {
    /// A new data set for saturated liquid densities with temperatures as input.
    pub fn new(
        target: Array1<f64>,
        temperature: Array1<f64>,
        vle_options: Option<SolverOptions>,
    ) -> Result<Self, EstimatorError> {
        if target.len() != temperature.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        Ok(Self {
            target,
            temperature,
            phase: Phase::Liquid,
            weights: None,
            solver_options: vle_options.unwrap_or_default(),
        })
    }

    /// Compare to the saturated vapor density instead.
    pub fn vapor(mut self) -> Self {
        self.phase = Phase::Vapor;
        self
    }

    /// Weights of the individual data points.
    pub fn weights(mut self, weights: Array1<f64>) -> Result<Self, EstimatorError> {
        if weights.len() != self.target.len() {
            return Err(EstimatorError::IncompatibleInput);
        }
        self.weights = Some(weights);
        Ok(self)
    }

    /// Returns temperature of data points.
    pub fn temperature(&self) -> Array1<f64> {
        self.temperature.clone()
    }
}

impl<E: Residual> DataSet<E> for EquilibriumLiquidDensity {
    fn target(&self) -> &Array1<f64> {
        &self.target
    }

    fn target_str(&self) -> &str {
        match self.phase {
            Phase::Liquid => "equilibrium liquid density",
            Phase::Vapor => "equilibrium vapor density",
        }
    }

    fn input_str(&self) -> Vec<&str> {
        vec!["temperature"]
    }

    fn point_weights(&self) -> Option<&Array1<f64>> {
        self.weights.as_ref()
    }

    fn predict_point(&self, eos: &Arc<E>, index: usize) -> EosResult<f64> {
        let vle =
            PhaseEquilibrium::pure_t(eos, self.temperature[index], None, self.solver_options)?;
        let state = match self.phase {
            Phase::Liquid => vle.liquid(),
            Phase::Vapor => vle.vapor(),
        };
        Ok(state.density * REFERENCE_DENSITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saftgammamie::test_utils::butane;
    use crate::saftgammamie::{SaftGammaMie, SaftGammaMieParameters};
    use approx::assert_relative_eq;
    use saftgm_core::parameter::Parameter;
    use saftgm_core::{solve_equilibrium, EquilibriumSpec};

    fn eos() -> Arc<SaftGammaMie> {
        Arc::new(SaftGammaMie::new(Arc::new(
            SaftGammaMieParameters::new_pure(butane()).unwrap(),
        )))
    }

    #[test]
    fn saturated_densities_match_equilibrium() {
        let eos = eos();
        let t = 300.0;
        let vle = solve_equilibrium(
            &eos,
            &EquilibriumSpec::Saturation { temperature: t },
            SolverOptions::default(),
        )
        .unwrap();
        let liquid = EquilibriumLiquidDensity::new(arr1(&[1e4]), arr1(&[t]), None).unwrap();
        let vapor = liquid.clone().vapor();
        assert_relative_eq!(
            liquid.predict_point(&eos, 0).unwrap(),
            vle[1].density,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            vapor.predict_point(&eos, 0).unwrap(),
            vle[0].density,
            max_relative = 1e-8
        );
    }

    #[test]
    fn compressed_liquid_is_denser() {
        let eos = eos();
        let data =
            LiquidDensity::new(arr1(&[1e4, 1e4]), arr1(&[300.0, 300.0]), arr1(&[1e6, 1e7]))
                .unwrap();
        let rho = data.predict(&eos);
        assert!(rho[1] > rho[0]);
        assert_relative_eq!(
            DataSet::<SaftGammaMie>::mean_absolute_relative_difference(&data, &eos),
            ((rho[0] / 1e4 - 1.0).abs() + (rho[1] / 1e4 - 1.0).abs()) / 2.0,
            max_relative = 1e-12
        );
    }
}
