use approx::assert_relative_eq;
use saftgm::parameter::Parameter;
use saftgm::saftgammamie::{test_utils, SaftGammaMie, SaftGammaMieParameters};
use saftgm::{solve_equilibrium, EquilibriumSpec, PhaseEquilibrium, PhaseTag, SolverOptions};
use std::error::Error;
use std::sync::Arc;

fn methane() -> Result<Arc<SaftGammaMie>, Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_pure(test_utils::methane())?;
    Ok(Arc::new(SaftGammaMie::new(Arc::new(parameters))))
}

#[test]
fn vapor_pressure_methane() -> Result<(), Box<dyn Error>> {
    let eos = methane()?;
    // hard cap on the Maxwell iteration
    let vle = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Saturation { temperature: 150.0 },
        SolverOptions::new().max_iter(25),
    )?;
    let (vapor, liquid) = (&vle[0], &vle[1]);
    assert_eq!(vapor.phase, PhaseTag::Vapor);
    assert_eq!(liquid.phase, PhaseTag::Liquid);
    // experimental vapor pressure 1.0414 MPa
    assert_relative_eq!(vapor.pressure, 1.0414e6, max_relative = 1e-2);
    assert_relative_eq!(vapor.pressure, liquid.pressure, max_relative = 1e-8);
    assert_relative_eq!(
        vapor.fugacity_coefficients[0],
        liquid.fugacity_coefficients[0],
        max_relative = 1e-8
    );
    assert!(liquid.density > 10.0 * vapor.density);
    Ok(())
}

#[test]
fn vapor_pressure_increases_with_temperature() -> Result<(), Box<dyn Error>> {
    let eos = methane()?;
    let p: Vec<_> = [110.0, 130.0, 150.0, 170.0]
        .iter()
        .map(|&t| PhaseEquilibrium::vapor_pressure(&eos, t)[0])
        .collect();
    assert!(p.iter().all(|p| p.is_some()));
    assert!(p.windows(2).all(|w| w[0] < w[1]));
    Ok(())
}

#[test]
fn bubble_point_of_pure_component_is_saturation() -> Result<(), Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_pure(test_utils::butane())?;
    let eos = Arc::new(SaftGammaMie::new(Arc::new(parameters)));
    let t = 300.0;
    let saturation = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Saturation { temperature: t },
        SolverOptions::default(),
    )?;
    let dew = solve_equilibrium(
        &eos,
        &EquilibriumSpec::DewPoint {
            temperature: t,
            vapor_molefracs: ndarray::arr1(&[1.0]),
        },
        SolverOptions::default(),
    )?;
    assert_relative_eq!(saturation[0].pressure, dew[0].pressure, max_relative = 1e-10);
    Ok(())
}

#[test]
fn association_lowers_vapor_pressure() -> Result<(), Box<dyn Error>> {
    let associating = test_utils::methanol();
    let mut inert = associating.clone();
    inert.model_record.association_record = None;
    let t = 200.0;
    let p: Vec<_> = [associating, inert]
        .into_iter()
        .map(|record| -> Result<f64, Box<dyn Error>> {
            let parameters = Arc::new(SaftGammaMieParameters::new_pure(record)?);
            let eos = Arc::new(SaftGammaMie::new(parameters));
            let vle = solve_equilibrium(
                &eos,
                &EquilibriumSpec::Saturation { temperature: t },
                SolverOptions::default(),
            )?;
            Ok(vle[0].pressure)
        })
        .collect::<Result<_, _>>()?;
    assert!(p[0] < p[1]);
    Ok(())
}
