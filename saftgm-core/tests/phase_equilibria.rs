use approx::assert_relative_eq;
use ndarray::*;
use num_dual::DualNum;
use num_traits::Zero;
use saftgm_core::*;
use std::error::Error;
use std::sync::Arc;

/// Van der Waals fluid with geometric mixing of the attraction parameter.
/// b in Å³ and a in K Å³.
struct VanDerWaalsMixture {
    a: Array2<f64>,
    b: Array1<f64>,
}

impl VanDerWaalsMixture {
    fn new(a: &[f64], b: &[f64]) -> Self {
        let n = a.len();
        Self {
            a: Array2::from_shape_fn((n, n), |(i, j)| (a[i] * a[j]).sqrt()),
            b: Array1::from_vec(b.to_vec()),
        }
    }

    fn light_heavy() -> Self {
        Self::new(&[2.0e4, 5.0e4], &[30.0, 40.0])
    }
}

impl Residual for VanDerWaalsMixture {
    fn components(&self) -> usize {
        self.b.len()
    }

    fn subset(&self, component_list: &[usize]) -> EosResult<Self> {
        let a: Vec<_> = component_list.iter().map(|&i| self.a[(i, i)]).collect();
        let b: Vec<_> = component_list.iter().map(|&i| self.b[i]).collect();
        Ok(Self::new(&a, &b))
    }

    fn compute_max_density(&self, moles: &Array1<f64>) -> f64 {
        0.9 * moles.sum() / (moles * &self.b).sum()
    }

    fn packing_fraction(&self, _: f64, partial_density: &Array1<f64>) -> f64 {
        0.25 * (partial_density * &self.b).sum()
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(&'static str, D)> {
        let n = state.moles.sum();
        let mut nb = D::zero();
        let mut n2a = D::zero();
        for i in 0..self.components() {
            nb = nb + state.moles[i] * self.b[i];
            for j in 0..self.components() {
                n2a = n2a + state.moles[i] * state.moles[j] * self.a[(i, j)];
            }
        }
        let repulsion = -n * (-nb / state.volume + 1.0).ln();
        let attraction = -n2a / (state.volume * state.temperature);
        vec![("repulsion", repulsion), ("attraction", attraction)]
    }
}

fn pure() -> Arc<VanDerWaalsMixture> {
    Arc::new(VanDerWaalsMixture::new(&[5.0e4], &[40.0]))
}

#[test]
fn saturation_is_in_equilibrium() -> Result<(), Box<dyn Error>> {
    let eos = pure();
    let phases = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Saturation { temperature: 300.0 },
        SolverOptions::default(),
    )?;
    let [vapor, liquid] = [&phases[0], &phases[1]];
    assert_eq!(vapor.phase, PhaseTag::Vapor);
    assert_eq!(liquid.phase, PhaseTag::Liquid);
    assert!(vapor.density < liquid.density);
    assert_relative_eq!(vapor.pressure, liquid.pressure, max_relative = 1e-8);
    assert_relative_eq!(
        vapor.fugacity_coefficients[0],
        liquid.fugacity_coefficients[0],
        max_relative = 1e-8
    );
    Ok(())
}

#[test]
fn pure_bubble_point_is_saturation() -> Result<(), Box<dyn Error>> {
    let eos = pure();
    let saturation = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Saturation { temperature: 300.0 },
        SolverOptions::default(),
    )?;
    let bubble = solve_equilibrium(
        &eos,
        &EquilibriumSpec::BubblePoint {
            temperature: 300.0,
            liquid_molefracs: arr1(&[1.0]),
        },
        SolverOptions::default(),
    )?;
    assert_relative_eq!(saturation[0].pressure, bubble[0].pressure, max_relative = 1e-10);
    assert_eq!(bubble[1].phase_fraction, 1.0);
    Ok(())
}

#[test]
fn critical_point() -> Result<(), Box<dyn Error>> {
    let eos = pure();
    let cp = solve_equilibrium(&eos, &EquilibriumSpec::Critical, SolverOptions::default())?;
    assert_eq!(cp.len(), 1);
    assert_eq!(cp[0].phase, PhaseTag::Single);
    assert_relative_eq!(cp[0].temperature, 8.0 * 5.0e4 / (27.0 * 40.0), max_relative = 1e-6);
    assert_relative_eq!(
        cp[0].density,
        units::REFERENCE_DENSITY / 120.0,
        max_relative = 1e-6
    );
    Ok(())
}

#[test]
fn critical_point_of_mixture_is_rejected() {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let cp = solve_equilibrium(&eos, &EquilibriumSpec::Critical, SolverOptions::default());
    assert!(matches!(cp, Err(EosError::IncompatibleComponents(1, 2))));
}

#[test]
fn bubble_and_dew_point() -> Result<(), Box<dyn Error>> {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let t = 250.0;
    let z = arr1(&[0.3, 0.7]);
    let bubble = solve_equilibrium(
        &eos,
        &EquilibriumSpec::BubblePoint {
            temperature: t,
            liquid_molefracs: z.clone(),
        },
        SolverOptions::default(),
    )?;
    let dew = solve_equilibrium(
        &eos,
        &EquilibriumSpec::DewPoint {
            temperature: t,
            vapor_molefracs: z.clone(),
        },
        SolverOptions::default(),
    )?;

    for phases in [&bubble, &dew] {
        let (vapor, liquid) = (&phases[0], &phases[1]);
        assert_relative_eq!(vapor.molefracs.sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(liquid.molefracs.sum(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(vapor.pressure, liquid.pressure, max_relative = 1e-8);
        assert_relative_eq!(
            &vapor.molefracs * &vapor.fugacity_coefficients,
            &liquid.molefracs * &liquid.fugacity_coefficients,
            max_relative = 1e-6
        );
        // the light component accumulates in the vapor
        assert!(vapor.molefracs[0] > liquid.molefracs[0]);
    }
    assert_relative_eq!(&bubble[1].molefracs, &z, epsilon = 1e-12);
    assert_relative_eq!(&dew[0].molefracs, &z, epsilon = 1e-12);
    assert!(bubble[0].pressure > dew[0].pressure);
    Ok(())
}

#[test]
fn tp_flash_between_dew_and_bubble_point() -> Result<(), Box<dyn Error>> {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let t = 250.0;
    let z = arr1(&[0.3, 0.7]);
    let p_bubble = solve_equilibrium(
        &eos,
        &EquilibriumSpec::BubblePoint {
            temperature: t,
            liquid_molefracs: z.clone(),
        },
        SolverOptions::default(),
    )?[0]
        .pressure;
    let p_dew = solve_equilibrium(
        &eos,
        &EquilibriumSpec::DewPoint {
            temperature: t,
            vapor_molefracs: z.clone(),
        },
        SolverOptions::default(),
    )?[0]
        .pressure;

    let p = (p_bubble * p_dew).sqrt();
    let phases = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Flash {
            temperature: t,
            pressure: p,
            feed: z.clone(),
        },
        SolverOptions::new().max_iter(200).tol(1e-10),
    )?;
    let (vapor, liquid) = (&phases[0], &phases[1]);
    assert!(liquid.molefracs[0] < z[0] && z[0] < vapor.molefracs[0]);
    assert_relative_eq!(vapor.phase_fraction + liquid.phase_fraction, 1.0, epsilon = 1e-12);
    let balance =
        vapor.phase_fraction * &vapor.molefracs + liquid.phase_fraction * &liquid.molefracs;
    assert_relative_eq!(balance, z, epsilon = 1e-8);
    assert_relative_eq!(vapor.pressure, p, max_relative = 1e-8);
    assert_relative_eq!(liquid.pressure, p, max_relative = 1e-8);
    Ok(())
}

#[test]
fn flash_of_single_phase_feed_fails() {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    // far above the bubble pressure
    let flash = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Flash {
            temperature: 250.0,
            pressure: 1e9,
            feed: arr1(&[0.3, 0.7]),
        },
        SolverOptions::default(),
    );
    assert!(flash.is_err());
}

#[test]
fn invalid_feed_is_rejected() {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let flash = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Flash {
            temperature: 250.0,
            pressure: 1e6,
            feed: arr1(&[0.3, 0.6]),
        },
        SolverOptions::default(),
    );
    assert!(matches!(flash, Err(EosError::InvalidState(..))));
}

#[test]
fn close_packing_is_out_of_physical_range() {
    let eos = pure();
    // packing fraction 0.25 * 40 * 0.08 = 0.8
    let state = evaluate_state(&eos, 300.0, 0.08 * units::REFERENCE_DENSITY, &arr1(&[1.0]));
    assert!(matches!(state, Err(EosError::OutOfPhysicalRange(_))));
}

#[test]
fn evaluate_state_is_deterministic() -> Result<(), Box<dyn Error>> {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let x = arr1(&[0.4, 0.6]);
    let a = evaluate_state(&eos, 280.0, 5000.0, &x)?;
    let b = evaluate_state(&eos, 280.0, 5000.0, &x)?;
    assert_eq!(a.pressure.to_bits(), b.pressure.to_bits());
    assert_eq!(a.ln_phi, b.ln_phi);
    let names: Vec<_> = a
        .helmholtz_energy_contributions
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["ideal gas", "repulsion", "attraction"]);
    Ok(())
}

#[test]
fn density_round_trip() -> Result<(), Box<dyn Error>> {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let x = arr1(&[0.4, 0.6]);
    let t = 400.0;
    for p in [1e5, 1e6, 1e7] {
        let p_reduced = p / units::REFERENCE_PRESSURE;
        let rho = solve_density(&eos, t, p_reduced, &x, PhaseHint::None, SolverOptions::default())?
            .single()?;
        let state = evaluate_state(&eos, t, rho * units::REFERENCE_DENSITY, &x)?;
        assert_relative_eq!(state.pressure, p, max_relative = 1e-8);
    }
    Ok(())
}

#[test]
fn ideal_gas_helmholtz_energy_at_low_density() -> Result<(), Box<dyn Error>> {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let x = arr1(&[0.4, 0.6]);
    let (t, rho) = (300.0, 1.0);
    let state = evaluate_state(&eos, t, rho, &x)?;
    // unit thermal wavelength
    let rho_reduced = rho / units::REFERENCE_DENSITY;
    let expected = units::RGAS * t * ((x.mapv(|x| (x * rho_reduced).ln()) * &x).sum() - 1.0);
    let (name, ideal_gas) = &state.helmholtz_energy_contributions[0];
    assert_eq!(name, "ideal gas");
    assert_relative_eq!(*ideal_gas, expected, max_relative = 1e-12);
    assert_relative_eq!(state.helmholtz_energy, expected, max_relative = 1e-4);
    assert_relative_eq!(
        state.helmholtz_energy - state.residual_helmholtz_energy(),
        expected,
        max_relative = 1e-12
    );
    Ok(())
}

#[test]
fn bubble_and_dew_compositions_must_sum_to_one() {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let x = arr1(&[0.1, 0.4]);
    let bubble = solve_equilibrium(
        &eos,
        &EquilibriumSpec::BubblePoint {
            temperature: 250.0,
            liquid_molefracs: x.clone(),
        },
        SolverOptions::default(),
    );
    assert!(matches!(bubble, Err(EosError::InvalidState(..))));
    let dew = solve_equilibrium(
        &eos,
        &EquilibriumSpec::DewPoint {
            temperature: 250.0,
            vapor_molefracs: x,
        },
        SolverOptions::default(),
    );
    assert!(matches!(dew, Err(EosError::InvalidState(..))));

    // the single component shortcut validates as well
    let bubble = solve_equilibrium(
        &pure(),
        &EquilibriumSpec::BubblePoint {
            temperature: 300.0,
            liquid_molefracs: arr1(&[0.5]),
        },
        SolverOptions::default(),
    );
    assert!(matches!(bubble, Err(EosError::InvalidState(..))));
}

#[test]
fn absent_component_reduces_to_pure_saturation() -> Result<(), Box<dyn Error>> {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let heavy = Arc::new(eos.subset(&[1])?);
    let t = 250.0;
    let saturation = solve_equilibrium(
        &heavy,
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
    let dew = solve_equilibrium(
        &eos,
        &EquilibriumSpec::DewPoint {
            temperature: t,
            vapor_molefracs: arr1(&[0.0, 1.0]),
        },
        SolverOptions::default(),
    )?;
    for phases in [&bubble, &dew] {
        let (vapor, liquid) = (&phases[0], &phases[1]);
        assert_relative_eq!(vapor.pressure, saturation[0].pressure, max_relative = 1e-8);
        assert_relative_eq!(vapor.density, saturation[0].density, max_relative = 1e-8);
        assert_relative_eq!(liquid.density, saturation[1].density, max_relative = 1e-8);
        assert_eq!(vapor.molefracs, arr1(&[0.0, 1.0]));
        assert_eq!(liquid.molefracs, arr1(&[0.0, 1.0]));
    }
    Ok(())
}

#[test]
fn flash_reports_iteration_cap() -> Result<(), Box<dyn Error>> {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let t = 250.0;
    let z = arr1(&[0.3, 0.7]);
    let p_bubble = solve_equilibrium(
        &eos,
        &EquilibriumSpec::BubblePoint {
            temperature: t,
            liquid_molefracs: z.clone(),
        },
        SolverOptions::default(),
    )?[0]
        .pressure;
    let p_dew = solve_equilibrium(
        &eos,
        &EquilibriumSpec::DewPoint {
            temperature: t,
            vapor_molefracs: z.clone(),
        },
        SolverOptions::default(),
    )?[0]
        .pressure;
    let flash = solve_equilibrium(
        &eos,
        &EquilibriumSpec::Flash {
            temperature: t,
            pressure: (p_bubble * p_dew).sqrt(),
            feed: z,
        },
        SolverOptions::new().max_iter(1).tol(1e-14),
    );
    assert!(matches!(flash, Err(EosError::MaxIterationsExceeded(..))));
    Ok(())
}

#[test]
fn saturation_reports_iteration_cap() {
    let vle = solve_equilibrium(
        &pure(),
        &EquilibriumSpec::Saturation { temperature: 300.0 },
        SolverOptions::new().max_iter(1),
    );
    assert!(matches!(vle, Err(EosError::MaxIterationsExceeded(..))));
}

#[test]
fn identical_phases_collapse() {
    let eos = Arc::new(VanDerWaalsMixture::light_heavy());
    let z = arr1(&[0.3, 0.7]);
    // above the critical temperature of the mixture both phases converge to the same root
    let p = 1e6 / units::REFERENCE_PRESSURE;
    let options = SolverOptions::default();
    let vle =
        PhaseEquilibrium::bubble_point(&eos, 400.0, &z, Some(p), Some(&z), (options, options));
    assert!(matches!(vle, Err(EosError::PhaseCollapse(..))));
}
