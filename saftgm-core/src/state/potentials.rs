use super::{Contributions, State};
use crate::equation_of_state::Residual;
use crate::errors::EosResult;
use crate::units::{REFERENCE_DENSITY, REFERENCE_MOLAR_ENERGY, REFERENCE_PRESSURE};
use ndarray::Array1;
use serde::Serialize;
use std::sync::Arc;

/// Thermodynamic potentials of a single state in SI units.
#[derive(Clone, Debug, Serialize)]
pub struct ThermodynamicPotentials {
    /// Temperature in K
    pub temperature: f64,
    /// Density in mol/m³
    pub density: f64,
    /// Mole fractions
    pub molefracs: Array1<f64>,
    /// Pressure in Pa
    pub pressure: f64,
    /// Compressibility factor
    pub compressibility: f64,
    /// Molar Helmholtz energy in J/mol
    pub helmholtz_energy: f64,
    /// Molar Helmholtz energy of every contribution in J/mol, starting with the ideal gas
    pub helmholtz_energy_contributions: Vec<(String, f64)>,
    /// Residual chemical potentials in J/mol
    pub residual_chemical_potential: Array1<f64>,
    /// Logarithmic fugacity coefficients
    pub ln_phi: Array1<f64>,
    /// Fugacity coefficients
    pub fugacity_coefficients: Array1<f64>,
}

impl ThermodynamicPotentials {
    /// Molar residual Helmholtz energy in J/mol.
    pub fn residual_helmholtz_energy(&self) -> f64 {
        self.helmholtz_energy_contributions
            .iter()
            .filter(|(name, _)| name != IDEAL_GAS)
            .map(|(_, a)| a)
            .sum()
    }
}

const IDEAL_GAS: &str = "ideal gas";

impl<E: Residual> From<&State<E>> for ThermodynamicPotentials {
    fn from(state: &State<E>) -> Self {
        let ln_phi = state.ln_phi();
        let molar = |a: f64| a / state.total_moles * REFERENCE_MOLAR_ENERGY;
        let mut helmholtz_energy_contributions =
            vec![(IDEAL_GAS.to_string(), molar(state.ideal_gas_helmholtz_energy()))];
        helmholtz_energy_contributions.extend(
            state
                .residual_helmholtz_energy_contributions()
                .into_iter()
                .map(|(name, a)| (name.to_string(), molar(a))),
        );
        Self {
            temperature: state.temperature,
            density: state.density * REFERENCE_DENSITY,
            molefracs: state.molefracs.clone(),
            pressure: state.pressure(Contributions::Total) * REFERENCE_PRESSURE,
            compressibility: state.compressibility(Contributions::Total),
            helmholtz_energy: molar(state.helmholtz_energy(Contributions::Total)),
            helmholtz_energy_contributions,
            residual_chemical_potential: state.residual_chemical_potential()
                * REFERENCE_MOLAR_ENERGY,
            fugacity_coefficients: ln_phi.mapv(f64::exp),
            ln_phi,
        }
    }
}

/// Evaluate the equation of state at given temperature (K), density (mol/m³) and composition.
///
/// Fails with [EosError::OutOfPhysicalRange](crate::EosError::OutOfPhysicalRange) if the
/// packing fraction reaches the close-packing limit and with
/// [EosError::InvalidState](crate::EosError::InvalidState) for invalid inputs.
pub fn evaluate_state<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    density: f64,
    molefracs: &Array1<f64>,
) -> EosResult<ThermodynamicPotentials> {
    let state = State::new_trho(eos, temperature, density / REFERENCE_DENSITY, molefracs)?;
    Ok(ThermodynamicPotentials::from(&state))
}
