use super::{PhaseEquilibrium, SolverOptions};
use crate::density_solver::PhaseHint;
use crate::equation_of_state::Residual;
use crate::errors::EosResult;
use crate::state::{validate_molefracs, Contributions, DensityInitialization, State};
use crate::units::{REFERENCE_DENSITY, REFERENCE_PRESSURE};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Specification of a phase equilibrium calculation.
///
/// Temperatures in K, pressures in Pa.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EquilibriumSpec {
    /// Liquid composition given; pressure and vapor composition are calculated.
    BubblePoint {
        temperature: f64,
        liquid_molefracs: Array1<f64>,
    },
    /// Vapor composition given; pressure and liquid composition are calculated.
    DewPoint {
        temperature: f64,
        vapor_molefracs: Array1<f64>,
    },
    /// Feed at given temperature and pressure; phase split and compositions are calculated.
    Flash {
        temperature: f64,
        pressure: f64,
        feed: Array1<f64>,
    },
    /// Vapor-liquid equilibrium of a pure component.
    Saturation { temperature: f64 },
    /// Critical point of a pure component.
    Critical,
}

/// Label of a phase in a [PhaseResult].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseTag {
    Vapor,
    Liquid,
    /// Homogeneous state, e.g. at the critical point.
    Single,
}

/// A single phase of an equilibrium result in SI units.
#[derive(Clone, Debug, Serialize)]
pub struct PhaseResult {
    pub phase: PhaseTag,
    /// Temperature in K
    pub temperature: f64,
    /// Pressure in Pa
    pub pressure: f64,
    /// Density in mol/m³
    pub density: f64,
    pub molefracs: Array1<f64>,
    /// Fraction of the total amount of substance in this phase
    pub phase_fraction: f64,
    /// Residual chemical potentials in J/mol
    pub residual_chemical_potential: Array1<f64>,
    pub fugacity_coefficients: Array1<f64>,
}

impl PhaseResult {
    pub fn from_state<E: Residual>(state: &State<E>, phase: PhaseTag, phase_fraction: f64) -> Self {
        Self {
            phase,
            temperature: state.temperature,
            pressure: state.pressure(Contributions::Total) * REFERENCE_PRESSURE,
            density: state.density * REFERENCE_DENSITY,
            molefracs: state.molefracs.clone(),
            phase_fraction,
            residual_chemical_potential: state.residual_chemical_potential_si(),
            fugacity_coefficients: state.ln_phi().mapv(f64::exp),
        }
    }

    fn from_equilibrium<E: Residual>(vle: &PhaseEquilibrium<E>, beta: f64) -> Vec<Self> {
        vec![
            Self::from_state(vle.vapor(), PhaseTag::Vapor, beta),
            Self::from_state(vle.liquid(), PhaseTag::Liquid, 1.0 - beta),
        ]
    }
}

/// Solve the phase equilibrium described by `spec`.
///
/// Two-phase results are ordered vapor first, liquid second. Bubble and
/// dew points report the phase fraction of the specified phase as one,
/// saturation results leave the phase fraction undetermined (NaN).
/// Bubble and dew points of a single component are computed as a saturation.
pub fn solve_equilibrium<E: Residual>(
    eos: &Arc<E>,
    spec: &EquilibriumSpec,
    options: SolverOptions,
) -> EosResult<Vec<PhaseResult>> {
    let inner = SolverOptions::default().verbosity(options.verbosity);
    match spec {
        EquilibriumSpec::BubblePoint {
            liquid_molefracs: molefracs,
            ..
        }
        | EquilibriumSpec::DewPoint {
            vapor_molefracs: molefracs,
            ..
        }
        | EquilibriumSpec::Flash { feed: molefracs, .. } => {
            eos.validate_moles(Some(molefracs))?;
            validate_molefracs(molefracs)?;
        }
        _ => (),
    }
    match spec {
        EquilibriumSpec::BubblePoint { temperature, .. }
        | EquilibriumSpec::DewPoint { temperature, .. }
            if eos.components() == 1 =>
        {
            let vle = PhaseEquilibrium::pure_t(eos, *temperature, None, options)?;
            let beta = match spec {
                EquilibriumSpec::BubblePoint { .. } => 0.0,
                _ => 1.0,
            };
            Ok(PhaseResult::from_equilibrium(&vle, beta))
        }
        EquilibriumSpec::BubblePoint {
            temperature,
            liquid_molefracs,
        } => {
            let vle = PhaseEquilibrium::bubble_point(
                eos,
                *temperature,
                liquid_molefracs,
                None,
                None,
                (inner, options),
            )?;
            Ok(PhaseResult::from_equilibrium(&vle, 0.0))
        }
        EquilibriumSpec::DewPoint {
            temperature,
            vapor_molefracs,
        } => {
            let vle = PhaseEquilibrium::dew_point(
                eos,
                *temperature,
                vapor_molefracs,
                None,
                None,
                (inner, options),
            )?;
            Ok(PhaseResult::from_equilibrium(&vle, 1.0))
        }
        EquilibriumSpec::Flash {
            temperature,
            pressure,
            feed,
        } => {
            let vle = PhaseEquilibrium::tp_flash(
                eos,
                *temperature,
                pressure / REFERENCE_PRESSURE,
                feed,
                None,
                options,
            )?;
            let beta = vle.vapor_phase_fraction();
            Ok(PhaseResult::from_equilibrium(&vle, beta))
        }
        EquilibriumSpec::Saturation { temperature } => {
            let vle = PhaseEquilibrium::pure_t(eos, *temperature, None, options)?;
            Ok(PhaseResult::from_equilibrium(&vle, f64::NAN))
        }
        EquilibriumSpec::Critical => {
            let cp = State::critical_point(eos, None, options)?;
            Ok(vec![PhaseResult::from_state(&cp, PhaseTag::Single, 1.0)])
        }
    }
}

/// Properties of a single phase at given temperature (K), pressure (Pa) and composition.
///
/// The hint selects the vapor or liquid branch; without a hint the phase
/// with the lower Gibbs energy is returned.
pub fn phase_properties<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    molefracs: &Array1<f64>,
    hint: PhaseHint,
) -> EosResult<PhaseResult> {
    let (initialization, tag) = match hint {
        PhaseHint::Vapor => (DensityInitialization::Vapor, PhaseTag::Vapor),
        PhaseHint::Liquid => (DensityInitialization::Liquid, PhaseTag::Liquid),
        PhaseHint::None => (DensityInitialization::None, PhaseTag::Single),
    };
    let state = State::new_tpx(
        eos,
        temperature,
        pressure / REFERENCE_PRESSURE,
        molefracs,
        initialization,
    )?;
    Ok(PhaseResult::from_state(&state, tag, 1.0))
}
