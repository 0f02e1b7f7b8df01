use approx::assert_relative_eq;
use ndarray::arr1;
use saftgm::mixing_rules::{derive_cross_parameters, MieSegment, MixingRules};
use saftgm::parameter::Parameter;
use saftgm::saftgammamie::{
    test_utils, SaftGammaMie, SaftGammaMieBinaryRecord, SaftGammaMieParameters,
};
use saftgm::{evaluate_state, solve_density, units, EosError, PhaseHint, SolverOptions};
use std::error::Error;
use std::f64::consts::PI;
use std::sync::Arc;

fn methane_butane() -> Result<Arc<SaftGammaMie>, Box<dyn Error>> {
    Ok(Arc::new(SaftGammaMie::new(Arc::new(
        test_utils::methane_butane()?,
    ))))
}

#[test]
fn evaluation_is_deterministic() -> Result<(), Box<dyn Error>> {
    let eos = methane_butane()?;
    let x = arr1(&[0.3, 0.7]);
    let a = evaluate_state(&eos, 300.0, 8000.0, &x)?;
    let b = evaluate_state(&eos, 300.0, 8000.0, &x)?;
    assert_eq!(a.pressure.to_bits(), b.pressure.to_bits());
    assert_eq!(a.ln_phi, b.ln_phi);
    assert_eq!(
        a.helmholtz_energy_contributions,
        b.helmholtz_energy_contributions
    );
    let names: Vec<_> = a
        .helmholtz_energy_contributions
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["ideal gas", "hard sphere", "dispersion + chain"]);
    let total: f64 = a.helmholtz_energy_contributions.iter().map(|(_, a)| a).sum();
    assert_relative_eq!(a.helmholtz_energy, total, max_relative = 1e-12);
    Ok(())
}

#[test]
fn ideal_gas_limit_uses_thermal_wavelength() -> Result<(), Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_pure(test_utils::methane())?;
    let eos = Arc::new(SaftGammaMie::new(Arc::new(parameters)));
    let (t, rho) = (300.0, 1.0);
    let state = evaluate_state(&eos, t, rho, &arr1(&[1.0]))?;
    let mass = eos.molar_weight()[0] * 1e-3 / units::NAV;
    let lambda = units::PLANCK / (2.0 * PI * mass * units::KB * t).sqrt() * 1e10;
    let rho_reduced = rho / units::REFERENCE_DENSITY;
    let expected = units::RGAS * t * ((rho_reduced * lambda.powi(3)).ln() - 1.0);
    let (name, ideal_gas) = &state.helmholtz_energy_contributions[0];
    assert_eq!(name, "ideal gas");
    assert_relative_eq!(*ideal_gas, expected, max_relative = 1e-12);
    assert_relative_eq!(state.helmholtz_energy, expected, max_relative = 1e-4);
    assert!(state.residual_helmholtz_energy().abs() < 1e-3 * units::RGAS * t);
    Ok(())
}

#[test]
fn no_root_above_close_packed_pressure() -> Result<(), Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_pure(test_utils::methane())?;
    let eos = Arc::new(SaftGammaMie::new(Arc::new(parameters)));
    // far above the pressure at the highest scanned packing fraction
    let p = 1e12 / units::REFERENCE_PRESSURE;
    let roots = solve_density(
        &eos,
        300.0,
        p,
        &arr1(&[1.0]),
        PhaseHint::None,
        SolverOptions::default(),
    );
    assert!(matches!(roots, Err(EosError::NoRealRoot(..))));
    Ok(())
}

#[test]
fn density_round_trip() -> Result<(), Box<dyn Error>> {
    let eos = methane_butane()?;
    let x = arr1(&[0.5, 0.5]);
    let t = 450.0;
    for p in [1e5, 1e6, 1e7, 5e7] {
        let rho = solve_density(
            &eos,
            t,
            p / units::REFERENCE_PRESSURE,
            &x,
            PhaseHint::None,
            SolverOptions::default(),
        )?
        .single()?;
        let state = evaluate_state(&eos, t, rho * units::REFERENCE_DENSITY, &x)?;
        assert_relative_eq!(state.pressure, p, max_relative = 1e-8);
    }
    Ok(())
}

#[test]
fn liquid_and_vapor_roots() -> Result<(), Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_pure(test_utils::butane())?;
    let eos = Arc::new(SaftGammaMie::new(Arc::new(parameters)));
    let x = arr1(&[1.0]);
    let (t, p) = (300.0, 1e5 / units::REFERENCE_PRESSURE);
    let options = SolverOptions::default();
    let vapor = solve_density(&eos, t, p, &x, PhaseHint::Vapor, options)?.single()?;
    let liquid = solve_density(&eos, t, p, &x, PhaseHint::Liquid, options)?.single()?;
    assert!(liquid > 100.0 * vapor);
    let all = solve_density(&eos, t, p, &x, PhaseHint::None, options)?;
    assert!(matches!(all.single(), Err(EosError::MultipleRootsAmbiguous(2))));
    Ok(())
}

#[test]
fn close_packing_is_out_of_physical_range() -> Result<(), Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_pure(test_utils::methane())?;
    let eos = Arc::new(SaftGammaMie::new(Arc::new(parameters)));
    let t = 150.0;
    // slightly beyond the packing fraction pi/(3 sqrt(2))
    let d = eos.parameters().hs_diameter(t)[0];
    let rho = 1.01 * (PI / (3.0 * 2f64.sqrt())) / (PI / 6.0 * d.powi(3)) * units::REFERENCE_DENSITY;
    let state = evaluate_state(&eos, t, rho, &arr1(&[1.0]));
    assert!(matches!(state, Err(EosError::OutOfPhysicalRange(_))));
    Ok(())
}

#[test]
fn invalid_composition_is_rejected() -> Result<(), Box<dyn Error>> {
    let eos = methane_butane()?;
    let state = evaluate_state(&eos, 300.0, 1000.0, &arr1(&[0.3, 0.6]));
    assert!(matches!(state, Err(EosError::InvalidState(..))));
    Ok(())
}

#[test]
fn cross_parameters_are_symmetric() -> Result<(), Box<dyn Error>> {
    let parameters = SaftGammaMieParameters::new_binary(
        vec![test_utils::methane(), test_utils::methanol()],
        Some(SaftGammaMieBinaryRecord::from(0.05)),
    )?;
    for m in [
        &parameters.sigma_ij,
        &parameters.epsilon_k_ij,
        &parameters.lr_ij,
        &parameters.la_ij,
    ] {
        assert_eq!(m, &m.t());
    }
    let a = MieSegment::new(3.7412, 153.36, 12.65, 6.0);
    let b = MieSegment::new(4.0887, 273.64, 13.65, 6.0);
    let rules = MixingRules::default();
    assert_eq!(
        derive_cross_parameters(&a, &b, &rules),
        derive_cross_parameters(&b, &a, &rules)
    );
    Ok(())
}

#[test]
fn parameters_from_json() -> Result<(), Box<dyn Error>> {
    let json = r#"[
        {
            "identifier": {"name": "methane"},
            "molarweight": 16.031,
            "model_record": {"nu": 1.0, "sigma": 3.7412, "epsilon_k": 153.36, "lr": 12.65, "la": 6.0}
        }
    ]"#;
    let records: Vec<saftgm::parameter::PureRecord<saftgm::saftgammamie::SaftGammaMieRecord>> =
        serde_json::from_str(json)?;
    let parameters = SaftGammaMieParameters::from_records(records, None)?;
    assert_eq!(parameters.m, arr1(&[1.0]));
    let reference = SaftGammaMieParameters::new_pure(test_utils::methane())?;
    assert_relative_eq!(parameters.sigma_ij, reference.sigma_ij);
    assert_relative_eq!(parameters.epsilon_k_ij, reference.epsilon_k_ij);
    Ok(())
}
