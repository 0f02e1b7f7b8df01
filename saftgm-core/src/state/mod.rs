//! Description of a thermodynamic state.
//!
//! A thermodynamic state is defined by
//! * a temperature
//! * an array of mole numbers
//! * the volume
//!
//! Internally, all properties are computed using such states as input. Inside
//! this crate all state variables are reduced: temperature in K, volume in Å³,
//! amount of substance as number of molecules. Conversions to SI units happen
//! at the boundaries ([ThermodynamicPotentials], [PhaseResult](crate::PhaseResult)).
use crate::density_solver::{density_iteration, solve_density, PhaseHint};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::phase_equilibria::SolverOptions;
use ndarray::prelude::*;
use num_dual::*;
use std::fmt;
use std::sync::Arc;

mod critical_point;
mod potentials;
mod properties;
pub use potentials::{evaluate_state, ThermodynamicPotentials};

/// Possible contributions that can be computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Contributions {
    /// Only compute the ideal gas contribution
    IdealGas,
    /// Only compute the difference between the total and the ideal gas contribution
    Residual,
    /// Compute ideal gas and residual contributions
    Total,
}

/// Initial values in a density iteration.
#[derive(Clone, Copy, Debug)]
pub enum DensityInitialization {
    /// Calculate a vapor phase by initializing using the ideal gas.
    Vapor,
    /// Calculate a liquid phase by using the `max_density`.
    Liquid,
    /// Use the given density (in Å⁻³) as initial value.
    InitialDensity(f64),
    /// Calculate the most stable phase by calculating both a vapor and a liquid
    /// and return the one with the lower molar Gibbs energy.
    None,
}

/// Thermodynamic state of the system in reduced variables
/// including their derivatives.
///
/// Properties are stored as generalized (hyper) dual numbers which allows
/// for automatic differentiation.
#[derive(Clone, Debug)]
pub struct StateHD<D: DualNum<f64>> {
    /// temperature in Kelvin
    pub temperature: D,
    /// volume in Angstrom^3
    pub volume: D,
    /// number of particles
    pub moles: Array1<D>,
    /// mole fractions
    pub molefracs: Array1<D>,
    /// partial number densities in Angstrom^-3
    pub partial_density: Array1<D>,
}

impl<D: DualNum<f64> + Copy> StateHD<D> {
    /// Create a new `StateHD` for given temperature volume and moles.
    pub fn new(temperature: D, volume: D, moles: Array1<D>) -> Self {
        let total_moles = moles.sum();
        let partial_density = moles.mapv(|n| n / volume);
        let molefracs = moles.mapv(|n| n / total_moles);

        Self {
            temperature,
            volume,
            moles,
            molefracs,
            partial_density,
        }
    }

    // Since the molefracs can not be reproduced from moles if the density is zero,
    // this constructor exists specifically for these cases.
    pub(crate) fn new_virial(temperature: D, density: D, molefracs: Array1<f64>) -> Self {
        let volume = D::one();
        let partial_density = molefracs.mapv(|x| density * x);
        let moles = partial_density.mapv(|pd| pd * volume);
        let molefracs = molefracs.mapv(D::from);
        Self {
            temperature,
            volume,
            moles,
            molefracs,
            partial_density,
        }
    }
}

/// Thermodynamic state of the system.
///
/// The state is always specified by the variables of the Helmholtz energy: volume $V$,
/// temperature $T$ and mole numbers $N_i$. Additional to these variables, the state saves
/// properties like the density, that can be calculated directly from the basic variables.
/// The state also contains a reference to the equation of state used to create the state.
/// Therefore, it can be used directly to calculate all state properties.
///
/// `State` objects are meant to be immutable. If individual fields like `volume` are changed, the
/// calculations are wrong as the internal fields of the state are not updated.
#[derive(Debug)]
pub struct State<E> {
    /// Equation of state
    pub eos: Arc<E>,
    /// Temperature $T$ in K
    pub temperature: f64,
    /// Volume $V$ in Å³
    pub volume: f64,
    /// Mole numbers $N_i$ (number of molecules)
    pub moles: Array1<f64>,
    /// Total number of molecules $N=\sum_iN_i$
    pub total_moles: f64,
    /// Partial densities $\rho_i=\frac{N_i}{V}$ in Å⁻³
    pub partial_density: Array1<f64>,
    /// Total density $\rho=\frac{N}{V}=\sum_i\rho_i$ in Å⁻³
    pub density: f64,
    /// Mole fractions $x_i=\frac{N_i}{N}=\frac{\rho_i}{\rho}$
    pub molefracs: Array1<f64>,
}

impl<E> Clone for State<E> {
    fn clone(&self) -> Self {
        Self {
            eos: self.eos.clone(),
            temperature: self.temperature,
            volume: self.volume,
            moles: self.moles.clone(),
            total_moles: self.total_moles,
            partial_density: self.partial_density.clone(),
            density: self.density,
            molefracs: self.molefracs.clone(),
        }
    }
}

impl<E: Residual> fmt::Display for State<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.eos.components() == 1 {
            write!(f, "T = {:.5} K, ρ = {:.5e} Å⁻³", self.temperature, self.density)
        } else {
            write!(
                f,
                "T = {:.5} K, ρ = {:.5e} Å⁻³, x = {:.5}",
                self.temperature, self.density, self.molefracs
            )
        }
    }
}

/// Derivatives of the helmholtz energy.
#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug, PartialOrd, Ord)]
pub enum Derivative {
    /// Derivative with respect to system volume.
    DV,
    /// Derivative with respect to temperature.
    DT,
    /// Derivative with respect to component `i`.
    DN(usize),
}

/// # State constructors
impl<E: Residual> State<E> {
    /// Return a new `State` given a temperature, an array of mole numbers and a volume.
    ///
    /// This function validates the given properties, i.e. tests for signs and if
    /// values are finite, and rejects states at or beyond the close-packing limit
    /// with [EosError::OutOfPhysicalRange].
    pub fn new_nvt(
        eos: &Arc<E>,
        temperature: f64,
        volume: f64,
        moles: &Array1<f64>,
    ) -> EosResult<Self> {
        eos.validate_moles(Some(moles))?;
        validate(temperature, volume, moles)?;
        let state = Self::new_nvt_unchecked(eos, temperature, volume, moles);
        eos.check_packing(temperature, &state.partial_density)?;
        Ok(state)
    }

    pub(crate) fn new_nvt_unchecked(
        eos: &Arc<E>,
        temperature: f64,
        volume: f64,
        moles: &Array1<f64>,
    ) -> Self {
        let total_moles = moles.sum();
        let partial_density = moles / volume;
        let density = total_moles / volume;
        let molefracs = moles / total_moles;

        State {
            eos: eos.clone(),
            temperature,
            volume,
            moles: moles.to_owned(),
            total_moles,
            partial_density,
            density,
            molefracs,
        }
    }

    /// Return a new `State` for a pure component given a temperature and a density.
    pub fn new_pure(eos: &Arc<E>, temperature: f64, density: f64) -> EosResult<Self> {
        let moles = arr1(&[1.0]);
        Self::new_nvt(eos, temperature, 1.0 / density, &moles)
    }

    /// Return a new `State` for given temperature, density and composition.
    ///
    /// The mole fractions have to sum to one within `1e-10`.
    pub fn new_trho(
        eos: &Arc<E>,
        temperature: f64,
        density: f64,
        molefracs: &Array1<f64>,
    ) -> EosResult<Self> {
        validate_molefracs(molefracs)?;
        Self::new_nvt(eos, temperature, 1.0 / density, molefracs)
    }

    /// Return a new `State` using a density iteration. [DensityInitialization] is used to
    /// influence the calculation with respect to the possible solutions.
    ///
    /// If the local Newton iteration fails, the density is recomputed with the
    /// bracketing solver and the root closest to the requested branch is used.
    pub fn new_npt(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        moles: &Array1<f64>,
        density_initialization: DensityInitialization,
    ) -> EosResult<Self> {
        let max_density = eos.max_density(Some(moles))?;
        let x = moles / moles.sum();
        let bracketed = |hint: PhaseHint, rho0: Option<f64>| -> EosResult<Self> {
            let options = SolverOptions::default();
            let roots = solve_density(eos, temperature, pressure, &x, hint, options)?;
            let rho = match rho0 {
                Some(rho0) => roots.closest(rho0),
                None => roots.single()?,
            };
            Self::new_nvt(eos, temperature, moles.sum() / rho, moles)
        };

        // calculate state from initial density or given phase
        match density_initialization {
            DensityInitialization::InitialDensity(rho0) => {
                return density_iteration(eos, temperature, pressure, moles, rho0)
                    .or_else(|_| bracketed(PhaseHint::None, Some(rho0)))
            }
            DensityInitialization::Vapor => {
                return density_iteration(eos, temperature, pressure, moles, pressure / temperature)
                    .or_else(|_| bracketed(PhaseHint::Vapor, None))
            }
            DensityInitialization::Liquid => {
                return density_iteration(eos, temperature, pressure, moles, max_density)
                    .or_else(|_| bracketed(PhaseHint::Liquid, None))
            }
            DensityInitialization::None => (),
        }

        // calculate stable phase
        let liquid = density_iteration(eos, temperature, pressure, moles, max_density);

        if pressure < max_density * temperature {
            let rho_ideal = pressure / temperature;
            let vapor = density_iteration(eos, temperature, pressure, moles, rho_ideal);
            match (&liquid, &vapor) {
                (Ok(_), Err(_)) => liquid,
                (Err(_), Ok(_)) => vapor,
                (Ok(l), Ok(v)) => {
                    if l.residual_gibbs_energy() > v.residual_gibbs_energy() {
                        vapor
                    } else {
                        liquid
                    }
                }
                _ => Err(EosError::UndeterminedState(String::from(
                    "Density iteration did not find a solution.",
                ))),
            }
        } else {
            liquid
        }
    }

    /// Return a new `State` for given temperature, pressure and composition.
    pub fn new_tpx(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        molefracs: &Array1<f64>,
        density_initialization: DensityInitialization,
    ) -> EosResult<Self> {
        validate_molefracs(molefracs)?;
        Self::new_npt(eos, temperature, pressure, molefracs, density_initialization)
    }

    /// Update the state with the given temperature
    pub fn update_temperature(&self, temperature: f64) -> EosResult<Self> {
        Self::new_nvt(&self.eos, temperature, self.volume, &self.moles)
    }

    /// Creates a [StateHD] cloning temperature, volume and moles.
    pub fn derive0(&self) -> StateHD<f64> {
        StateHD::new(self.temperature, self.volume, self.moles.clone())
    }

    /// Creates a [StateHD] taking the first derivative.
    pub fn derive1(&self, derivative: Derivative) -> StateHD<Dual64> {
        let mut t = Dual64::from(self.temperature);
        let mut v = Dual64::from(self.volume);
        let mut n = self.moles.mapv(Dual64::from);
        match derivative {
            Derivative::DT => t = t.derivative(),
            Derivative::DV => v = v.derivative(),
            Derivative::DN(i) => n[i] = n[i].derivative(),
        }
        StateHD::new(t, v, n)
    }

    /// Creates a [StateHD] taking the first and second (partial) derivatives.
    pub fn derive2(&self, derivative: Derivative) -> StateHD<Dual2_64> {
        let mut t = Dual2_64::from(self.temperature);
        let mut v = Dual2_64::from(self.volume);
        let mut n = self.moles.mapv(Dual2_64::from);
        match derivative {
            Derivative::DT => t = t.derivative(),
            Derivative::DV => v = v.derivative(),
            Derivative::DN(i) => n[i] = n[i].derivative(),
        }
        StateHD::new(t, v, n)
    }

    /// Creates a [StateHD] taking the first and second (partial) derivatives.
    pub fn derive2_mixed(
        &self,
        derivative1: Derivative,
        derivative2: Derivative,
    ) -> StateHD<HyperDual64> {
        let mut t = HyperDual64::from(self.temperature);
        let mut v = HyperDual64::from(self.volume);
        let mut n = self.moles.mapv(HyperDual64::from);
        match derivative1 {
            Derivative::DT => t = t.derivative1(),
            Derivative::DV => v = v.derivative1(),
            Derivative::DN(i) => n[i] = n[i].derivative1(),
        }
        match derivative2 {
            Derivative::DT => t = t.derivative2(),
            Derivative::DV => v = v.derivative2(),
            Derivative::DN(i) => n[i] = n[i].derivative2(),
        }
        StateHD::new(t, v, n)
    }

    /// Creates a [StateHD] taking the first, second, and third derivative with respect to a single property.
    pub fn derive3(&self, derivative: Derivative) -> StateHD<Dual3_64> {
        let mut t = Dual3_64::from(self.temperature);
        let mut v = Dual3_64::from(self.volume);
        let mut n = self.moles.mapv(Dual3_64::from);
        match derivative {
            Derivative::DT => t = t.derivative(),
            Derivative::DV => v = v.derivative(),
            Derivative::DN(i) => n[i] = n[i].derivative(),
        };
        StateHD::new(t, v, n)
    }
}

/// Validate the given temperature, mole numbers and volume.
///
/// Properties are valid if
/// * they are finite
/// * they have a positive sign
fn validate(temperature: f64, volume: f64, moles: &Array1<f64>) -> EosResult<()> {
    if !temperature.is_finite() || temperature <= 0.0 {
        return Err(EosError::InvalidState(
            String::from("validate"),
            String::from("temperature"),
            temperature,
        ));
    }
    if !volume.is_finite() || volume.is_sign_negative() {
        return Err(EosError::InvalidState(
            String::from("validate"),
            String::from("volume"),
            volume,
        ));
    }
    for &n in moles.iter() {
        if !n.is_finite() || n.is_sign_negative() {
            return Err(EosError::InvalidState(
                String::from("validate"),
                String::from("moles"),
                n,
            ));
        }
    }
    Ok(())
}

/// Validate that mole fractions lie in [0, 1] and sum to one.
pub(crate) fn validate_molefracs(molefracs: &Array1<f64>) -> EosResult<()> {
    for &x in molefracs.iter() {
        if !x.is_finite() || !(0.0..=1.0).contains(&x) {
            return Err(EosError::InvalidState(
                String::from("validate_molefracs"),
                String::from("mole fraction"),
                x,
            ));
        }
    }
    let sum = molefracs.sum();
    if (sum - 1.0).abs() > 1e-10 {
        return Err(EosError::InvalidState(
            String::from("validate_molefracs"),
            String::from("sum of mole fractions"),
            sum,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::NAN;

    #[test]
    fn test_validate() {
        let moles = arr1(&[0.03, 0.02, 0.05]);
        assert!(validate(298.15, 3000.0, &moles).is_ok());
    }

    #[test]
    fn test_negative_temperature() {
        let moles = arr1(&[0.03, 0.02, 0.05]);
        assert!(validate(-298.15, 3000.0, &moles).is_err());
    }

    #[test]
    fn test_zero_temperature() {
        let moles = arr1(&[0.03, 0.02, 0.05]);
        assert!(validate(0.0, 3000.0, &moles).is_err());
    }

    #[test]
    fn test_nan_temperature() {
        let moles = arr1(&[0.03, 0.02, 0.05]);
        assert!(validate(NAN, 3000.0, &moles).is_err());
    }

    #[test]
    fn test_negative_mole_number() {
        let moles = arr1(&[-0.03, 0.02, 0.05]);
        assert!(validate(298.15, 3000.0, &moles).is_err());
    }

    #[test]
    fn test_nan_mole_number() {
        let moles = arr1(&[NAN, 0.02, 0.05]);
        assert!(validate(298.15, 3000.0, &moles).is_err());
    }

    #[test]
    fn test_negative_volume() {
        let moles = arr1(&[0.01, 0.02, 0.05]);
        assert!(validate(298.15, -3000.0, &moles).is_err());
    }

    #[test]
    fn test_molefracs() {
        assert!(validate_molefracs(&arr1(&[0.3, 0.7])).is_ok());
        assert!(validate_molefracs(&arr1(&[0.0, 1.0])).is_ok());
        assert!(validate_molefracs(&arr1(&[0.3, 0.6])).is_err());
        assert!(validate_molefracs(&arr1(&[-0.1, 1.1])).is_err());
    }
}
