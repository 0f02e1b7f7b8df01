//! Cost function of a parameter vector against an [Estimator].
use super::{Estimator, EstimatorError};
use crate::fit::Objective;
use crate::mixing_rules::MixingRules;
use crate::saftgammamie::{
    SaftGammaMie, SaftGammaMieBinaryRecord, SaftGammaMieOptions, SaftGammaMieParameters,
    SaftGammaMieRecord,
};
use ndarray::{Array1, Array2};
use saftgm_core::parameter::{ParameterError, PureRecord};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Residual assigned to a data point for which the prediction failed.
pub const FAILURE_PENALTY: f64 = 1e3;

/// Adjustable pure component parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelParameter {
    Nu,
    ShapeFactor,
    Sigma,
    EpsilonK,
    Lr,
    La,
    KappaAB,
    EpsilonKAB,
}

impl fmt::Display for ModelParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Nu => "nu",
            Self::ShapeFactor => "shape_factor",
            Self::Sigma => "sigma",
            Self::EpsilonK => "epsilon_k",
            Self::Lr => "lr",
            Self::La => "la",
            Self::KappaAB => "kappa_ab",
            Self::EpsilonKAB => "epsilon_k_ab",
        };
        write!(f, "{s}")
    }
}

/// A parameter of a single component that is varied during the fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitParameter {
    pub component: usize,
    pub parameter: ModelParameter,
}

impl FitParameter {
    pub fn new(component: usize, parameter: ModelParameter) -> Self {
        Self {
            component,
            parameter,
        }
    }

    fn is_association(&self) -> bool {
        matches!(
            self.parameter,
            ModelParameter::KappaAB | ModelParameter::EpsilonKAB
        )
    }

    fn get(&self, record: &SaftGammaMieRecord) -> f64 {
        let assoc = record.association_record;
        match self.parameter {
            ModelParameter::Nu => record.nu,
            ModelParameter::ShapeFactor => record.shape_factor,
            ModelParameter::Sigma => record.sigma,
            ModelParameter::EpsilonK => record.epsilon_k,
            ModelParameter::Lr => record.lr,
            ModelParameter::La => record.la,
            ModelParameter::KappaAB => assoc.map_or(f64::NAN, |a| a.kappa_ab),
            ModelParameter::EpsilonKAB => assoc.map_or(f64::NAN, |a| a.epsilon_k_ab),
        }
    }

    fn set(&self, record: &mut SaftGammaMieRecord, value: f64) {
        match self.parameter {
            ModelParameter::Nu => record.nu = value,
            ModelParameter::ShapeFactor => record.shape_factor = value,
            ModelParameter::Sigma => record.sigma = value,
            ModelParameter::EpsilonK => record.epsilon_k = value,
            ModelParameter::Lr => record.lr = value,
            ModelParameter::La => record.la = value,
            ModelParameter::KappaAB => {
                if let Some(a) = record.association_record.as_mut() {
                    a.kappa_ab = value
                }
            }
            ModelParameter::EpsilonKAB => {
                if let Some(a) = record.association_record.as_mut() {
                    a.epsilon_k_ab = value
                }
            }
        }
    }
}

/// Result of a single evaluation of the objective.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Evaluation {
    /// Sum of squares of the weighted residuals
    pub cost: f64,
    pub failed_points: usize,
    pub total_points: usize,
}

impl Evaluation {
    /// At least one data point could be predicted.
    pub fn is_feasible(&self) -> bool {
        self.failed_points < self.total_points
    }
}

/// Maps a vector of adjustable parameters to the cost of the
/// resulting SAFT-γ-Mie model against experimental data.
pub struct ParameterObjective {
    pure_records: Vec<PureRecord<SaftGammaMieRecord>>,
    binary_records: Option<Array2<SaftGammaMieBinaryRecord>>,
    mixing_rules: MixingRules,
    options: SaftGammaMieOptions,
    fit_parameters: Vec<FitParameter>,
    estimator: Estimator<SaftGammaMie>,
}

impl ParameterObjective {
    pub fn new(
        pure_records: Vec<PureRecord<SaftGammaMieRecord>>,
        fit_parameters: Vec<FitParameter>,
        estimator: Estimator<SaftGammaMie>,
    ) -> Result<Self, EstimatorError> {
        for p in fit_parameters.iter() {
            let record = pure_records
                .get(p.component)
                .ok_or(EstimatorError::IncompatibleInput)?;
            if p.is_association() && record.model_record.association_record.is_none() {
                return Err(EstimatorError::IncompatibleInput);
            }
        }
        if estimator.datapoints() == 0 {
            return Err(EstimatorError::IncompatibleInput);
        }
        Ok(Self {
            pure_records,
            binary_records: None,
            mixing_rules: MixingRules::default(),
            options: SaftGammaMieOptions::default(),
            fit_parameters,
            estimator,
        })
    }

    pub fn binary_records(mut self, binary_records: Array2<SaftGammaMieBinaryRecord>) -> Self {
        self.binary_records = Some(binary_records);
        self
    }

    pub fn mixing_rules(mut self, mixing_rules: MixingRules) -> Self {
        self.mixing_rules = mixing_rules;
        self
    }

    pub fn options(mut self, options: SaftGammaMieOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of adjustable parameters.
    pub fn dimension(&self) -> usize {
        self.fit_parameters.len()
    }

    pub fn fit_parameters(&self) -> &[FitParameter] {
        &self.fit_parameters
    }

    pub fn estimator(&self) -> &Estimator<SaftGammaMie> {
        &self.estimator
    }

    /// Current values of the adjustable parameters in the records.
    pub fn initial_values(&self) -> Array1<f64> {
        self.fit_parameters
            .iter()
            .map(|p| p.get(&self.pure_records[p.component].model_record))
            .collect()
    }

    /// Parameter set with the adjustable parameters replaced by `x`.
    pub fn parameters(&self, x: &[f64]) -> Result<SaftGammaMieParameters, ParameterError> {
        if x.len() != self.fit_parameters.len() {
            return Err(ParameterError::IncompatibleParameters(format!(
                "expected {} parameters, got {}",
                self.fit_parameters.len(),
                x.len()
            )));
        }
        let mut records = self.pure_records.clone();
        for (p, &v) in self.fit_parameters.iter().zip(x) {
            p.set(&mut records[p.component].model_record, v);
        }
        SaftGammaMieParameters::with_mixing_rules(
            records,
            self.binary_records.clone(),
            self.mixing_rules.clone(),
        )
    }

    /// Equation of state for the parameter vector `x`.
    pub fn eos(&self, x: &[f64]) -> Result<Arc<SaftGammaMie>, ParameterError> {
        Ok(Arc::new(SaftGammaMie::with_options(
            Arc::new(self.parameters(x)?),
            self.options,
        )))
    }

    /// Weighted residuals and the number of failed data points.
    ///
    /// A parameter vector that does not yield a valid model is penalized at every point.
    pub fn residuals(&self, x: &[f64]) -> Result<(Array1<f64>, usize), EstimatorError> {
        match self.eos(x) {
            Ok(eos) => self.estimator.cost(&eos),
            Err(e) => {
                debug!(error = %e, "invalid parameter vector");
                self.estimator.penalty()
            }
        }
    }

    pub fn evaluate(&self, x: &[f64]) -> Evaluation {
        let total_points = self.estimator.datapoints();
        match self.residuals(x) {
            Ok((r, failed_points)) => Evaluation {
                cost: r.mapv(|ri| ri * ri).sum(),
                failed_points,
                total_points,
            },
            Err(e) => {
                debug!(error = %e, "objective evaluation failed");
                Evaluation {
                    cost: FAILURE_PENALTY * FAILURE_PENALTY,
                    failed_points: total_points,
                    total_points,
                }
            }
        }
    }
}

impl Objective for ParameterObjective {
    fn evaluate(&self, x: &[f64]) -> Evaluation {
        ParameterObjective::evaluate(self, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{DataSet, Loss, VaporPressure};
    use crate::saftgammamie::test_utils::{methane, methanol};
    use approx::assert_relative_eq;
    use ndarray::arr1;

    fn vapor_pressure() -> Arc<dyn DataSet<SaftGammaMie>> {
        Arc::new(VaporPressure::new(arr1(&[1.0414e6]), arr1(&[150.0]), false).unwrap())
    }

    fn objective(parameters: Vec<FitParameter>) -> Result<ParameterObjective, EstimatorError> {
        let estimator = Estimator::new(vec![vapor_pressure()], vec![1.0], vec![Loss::Linear])?;
        ParameterObjective::new(vec![methane()], parameters, estimator)
    }

    #[test]
    fn initial_values_are_read_from_records() {
        let obj = objective(vec![
            FitParameter::new(0, ModelParameter::Sigma),
            FitParameter::new(0, ModelParameter::EpsilonK),
        ])
        .unwrap();
        assert_eq!(obj.dimension(), 2);
        assert_eq!(obj.initial_values(), arr1(&[3.7412, 153.36]));
        let p = obj.parameters(&[3.8, 160.0]).unwrap();
        assert_eq!(p.sigma[0], 3.8);
        assert_eq!(p.epsilon_k[0], 160.0);
    }

    #[test]
    fn unknown_component_is_rejected() {
        let obj = objective(vec![FitParameter::new(1, ModelParameter::Sigma)]);
        assert!(matches!(obj, Err(EstimatorError::IncompatibleInput)));
    }

    #[test]
    fn association_parameter_needs_association_record() {
        let obj = objective(vec![FitParameter::new(0, ModelParameter::EpsilonKAB)]);
        assert!(matches!(obj, Err(EstimatorError::IncompatibleInput)));

        let estimator =
            Estimator::new(vec![vapor_pressure()], vec![1.0], vec![Loss::Linear]).unwrap();
        let obj = ParameterObjective::new(
            vec![methanol()],
            vec![FitParameter::new(0, ModelParameter::EpsilonKAB)],
            estimator,
        )
        .unwrap();
        assert_eq!(obj.initial_values(), arr1(&[2904.7]));
    }

    #[test]
    fn invalid_model_is_penalized() {
        let obj = objective(vec![FitParameter::new(0, ModelParameter::Sigma)]).unwrap();
        let evaluation = obj.evaluate(&[-1.0]);
        assert_eq!(evaluation.failed_points, 1);
        assert_eq!(evaluation.total_points, 1);
        assert!(!evaluation.is_feasible());
        assert_relative_eq!(evaluation.cost, FAILURE_PENALTY * FAILURE_PENALTY);
    }

    #[test]
    fn generating_parameters_have_small_cost() {
        let obj = objective(vec![FitParameter::new(0, ModelParameter::EpsilonK)]).unwrap();
        let good = obj.evaluate(&[153.36]);
        let bad = obj.evaluate(&[140.0]);
        assert!(good.is_feasible());
        assert!(good.cost < 1e-3);
        assert!(bad.cost > good.cost);
    }
}
