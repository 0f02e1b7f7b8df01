use approx::assert_relative_eq;
use ndarray::{arr1, Array1};
use saftgm::estimator::{
    DataSet, Estimator, FitParameter, Loss, ModelParameter, ParameterObjective, VaporPressure,
};
use saftgm::fit::{DifferentialEvolutionOptions, NelderMeadOptions};
use saftgm::parameter::Parameter;
use saftgm::saftgammamie::{test_utils, SaftGammaMie, SaftGammaMieParameters};
use saftgm::{fit_parameters, solve_equilibrium, EquilibriumSpec, FitOptions, SolverOptions};
use std::error::Error;
use std::sync::Arc;

const TEMPERATURES: [f64; 3] = [120.0, 140.0, 160.0];

/// Vapor pressures of methane with the reference energy parameter.
fn synthetic_data() -> Result<Array1<f64>, Box<dyn Error>> {
    let eos = Arc::new(SaftGammaMie::new(Arc::new(
        SaftGammaMieParameters::new_pure(test_utils::methane())?,
    )));
    let mut p = Vec::new();
    for &temperature in TEMPERATURES.iter() {
        let vle = solve_equilibrium(
            &eos,
            &EquilibriumSpec::Saturation { temperature },
            SolverOptions::default(),
        )?;
        p.push(vle[0].pressure);
    }
    Ok(Array1::from_vec(p))
}

fn objective() -> Result<ParameterObjective, Box<dyn Error>> {
    let data: Arc<dyn DataSet<SaftGammaMie>> = Arc::new(VaporPressure::new(
        synthetic_data()?,
        arr1(&TEMPERATURES),
        false,
    )?);
    let estimator = Estimator::new(vec![data], vec![1.0], vec![Loss::Linear])?;
    let mut methane = test_utils::methane();
    methane.model_record.epsilon_k = 145.0;
    Ok(ParameterObjective::new(
        vec![methane],
        vec![FitParameter::new(0, ModelParameter::EpsilonK)],
        estimator,
    )?)
}

fn options() -> FitOptions {
    FitOptions {
        max_evaluations: 2000,
        differential_evolution: Some(DifferentialEvolutionOptions {
            population_factor: 8,
            max_generations: 15,
            ..Default::default()
        }),
        nelder_mead: Some(NelderMeadOptions::default()),
        ..Default::default()
    }
}

#[test]
fn recover_energy_parameter() -> Result<(), Box<dyn Error>> {
    let objective = objective()?;
    let initial = objective.initial_values();
    assert_eq!(initial, arr1(&[145.0]));
    let start = objective.evaluate(initial.as_slice().ok_or("not contiguous")?);
    assert!(start.is_feasible());

    let result = fit_parameters(&initial, &[(130.0, 180.0)], &objective, &options())?;
    assert_relative_eq!(result.parameters[0], 153.36, max_relative = 1e-4);
    assert!(result.cost < 1e-6 * start.cost);
    assert_eq!(result.failed_points, 0);
    assert!(result.evaluations <= 2000);
    assert!(result.history.windows(2).all(|w| w[1] <= w[0]));

    let eos = objective.eos(result.parameters.as_slice().ok_or("not contiguous")?)?;
    let deviation = objective.estimator().mean_absolute_relative_difference(&eos);
    assert!(deviation[0] < 1e-4);
    Ok(())
}

#[test]
fn fits_are_reproducible() -> Result<(), Box<dyn Error>> {
    let objective = objective()?;
    let initial = objective.initial_values();
    let options = FitOptions {
        max_evaluations: 60,
        ..options()
    };
    let a = fit_parameters(&initial, &[(130.0, 180.0)], &objective, &options)?;
    let b = fit_parameters(&initial, &[(130.0, 180.0)], &objective, &options)?;
    assert_eq!(a.parameters, b.parameters);
    assert_eq!(a.cost.to_bits(), b.cost.to_bits());
    assert_eq!(a.history, b.history);
    assert!(a.evaluations <= 60);
    Ok(())
}
