use approx::assert_relative_eq;
use saftgm::parameter::Parameter;
use saftgm::saftgammamie::{test_utils, SaftGammaMie, SaftGammaMieParameters};
use saftgm::{solve_equilibrium, EquilibriumSpec, PhaseTag, SolverOptions};
use std::error::Error;
use std::sync::Arc;

#[test]
fn critical_point_methane() -> Result<(), Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_pure(test_utils::methane())?;
    let eos = Arc::new(SaftGammaMie::new(Arc::new(parameters)));
    let cp = solve_equilibrium(&eos, &EquilibriumSpec::Critical, SolverOptions::default())?;
    assert_eq!(cp.len(), 1);
    assert_eq!(cp[0].phase, PhaseTag::Single);
    // Lafitte et al. (2013): 195.30 K, 5.15 MPa
    assert_relative_eq!(cp[0].temperature, 195.30, max_relative = 5e-3);
    assert_relative_eq!(cp[0].pressure, 5.15e6, max_relative = 1e-2);
    Ok(())
}

#[test]
fn saturation_above_critical_point_fails() -> Result<(), Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_pure(test_utils::methane())?;
    let eos = Arc::new(SaftGammaMie::new(Arc::new(parameters)));
    let vle = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Saturation { temperature: 220.0 },
        SolverOptions::default(),
    );
    assert!(vle.is_err());
    Ok(())
}

#[test]
fn critical_point_of_mixture_is_rejected() -> Result<(), Box<dyn Error>> {
    let eos = Arc::new(SaftGammaMie::new(Arc::new(test_utils::methane_butane()?)));
    let cp = solve_equilibrium(&eos, &EquilibriumSpec::Critical, SolverOptions::default());
    assert!(matches!(cp, Err(saftgm::EosError::IncompatibleComponents(1, 2))));
    Ok(())
}
