use approx::assert_relative_eq;
use ndarray::arr1;
use saftgm::parameter::Parameter;
use saftgm::saftgammamie::{test_utils, SaftGammaMie, SaftGammaMieParameters};
use saftgm::{solve_equilibrium, EosError, EquilibriumSpec, PhaseTag, SolverOptions};
use std::error::Error;
use std::sync::Arc;

fn methane_butane() -> Result<Arc<SaftGammaMie>, Box<dyn Error>> {
    Ok(Arc::new(SaftGammaMie::new(Arc::new(
        test_utils::methane_butane()?,
    ))))
}

#[test]
fn flash_methane_butane() -> Result<(), Box<dyn Error>> {
    let eos = methane_butane()?;
    let z = arr1(&[0.5, 0.5]);
    let p = 3e6;
    let phases = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Flash {
            temperature: 280.0,
            pressure: p,
            feed: z.clone(),
        },
        SolverOptions::default(),
    )?;
    assert_eq!(phases.len(), 2);
    let (vapor, liquid) = (&phases[0], &phases[1]);
    assert_eq!(vapor.phase, PhaseTag::Vapor);
    assert_eq!(liquid.phase, PhaseTag::Liquid);

    // methane accumulates in the vapor
    assert!(liquid.molefracs[0] < z[0] && z[0] < vapor.molefracs[0]);
    assert_relative_eq!(vapor.molefracs.sum(), 1.0, epsilon = 1e-10);
    assert_relative_eq!(liquid.molefracs.sum(), 1.0, epsilon = 1e-10);

    // material balance
    assert_relative_eq!(vapor.phase_fraction + liquid.phase_fraction, 1.0, epsilon = 1e-12);
    let balance =
        vapor.phase_fraction * &vapor.molefracs + liquid.phase_fraction * &liquid.molefracs;
    assert_relative_eq!(balance, z, epsilon = 1e-8);

    // phase equilibrium
    assert_relative_eq!(vapor.pressure, p, max_relative = 1e-8);
    assert_relative_eq!(liquid.pressure, p, max_relative = 1e-8);
    assert_relative_eq!(
        &vapor.molefracs * &vapor.fugacity_coefficients,
        &liquid.molefracs * &liquid.fugacity_coefficients,
        max_relative = 1e-6
    );
    Ok(())
}

#[test]
fn bubble_and_dew_point_methane_butane() -> Result<(), Box<dyn Error>> {
    let eos = methane_butane()?;
    let t = 280.0;
    let x = arr1(&[0.2, 0.8]);
    let bubble = solve_equilibrium(
        &eos,
        &EquilibriumSpec::BubblePoint {
            temperature: t,
            liquid_molefracs: x.clone(),
        },
        SolverOptions::default(),
    )?;
    let dew = solve_equilibrium(
        &eos,
        &EquilibriumSpec::DewPoint {
            temperature: t,
            vapor_molefracs: x.clone(),
        },
        SolverOptions::default(),
    )?;
    assert_relative_eq!(&bubble[1].molefracs, &x, epsilon = 1e-12);
    assert_relative_eq!(&dew[0].molefracs, &x, epsilon = 1e-12);
    assert!(bubble[0].molefracs[0] > x[0]);
    assert!(dew[1].molefracs[0] < x[0]);
    assert!(bubble[0].pressure > dew[0].pressure);
    for phases in [&bubble, &dew] {
        assert_relative_eq!(
            phases[0].residual_chemical_potential[0]
                - phases[1].residual_chemical_potential[0]
                + saftgm::units::RGAS
                    * t
                    * (phases[0].density * phases[0].molefracs[0]
                        / (phases[1].density * phases[1].molefracs[0]))
                        .ln(),
            0.0,
            epsilon = 1e-3
        );
    }
    Ok(())
}

#[test]
fn bubble_point_rejects_unnormalized_composition() -> Result<(), Box<dyn Error>> {
    let eos = methane_butane()?;
    let bubble = solve_equilibrium(
        &eos,
        &EquilibriumSpec::BubblePoint {
            temperature: 280.0,
            liquid_molefracs: arr1(&[0.1, 0.4]),
        },
        SolverOptions::default(),
    );
    assert!(matches!(bubble, Err(EosError::InvalidState(..))));
    Ok(())
}

#[test]
fn bubble_point_without_methane_is_butane_saturation() -> Result<(), Box<dyn Error>> {
    let eos = methane_butane()?;
    let butane = Arc::new(SaftGammaMie::new(Arc::new(
        SaftGammaMieParameters::new_pure(test_utils::butane())?,
    )));
    let t = 280.0;
    let saturation = solve_equilibrium(
        &butane,
        &EquilibriumSpec::Saturation { temperature: t },
        SolverOptions::default(),
    )?;
    let bubble = solve_equilibrium(
        &eos,
        &EquilibriumSpec::BubblePoint {
            temperature: t,
            liquid_molefracs: arr1(&[0.0, 1.0]),
        },
        SolverOptions::default(),
    )?;
    let (vapor, liquid) = (&bubble[0], &bubble[1]);
    assert_relative_eq!(vapor.pressure, saturation[0].pressure, max_relative = 1e-8);
    assert_relative_eq!(liquid.density, saturation[1].density, max_relative = 1e-8);
    assert_eq!(vapor.molefracs[0], 0.0);
    assert_eq!(liquid.phase_fraction, 1.0);
    Ok(())
}
