use crate::errors::{EosError, EosResult};
use crate::state::StateHD;
use ndarray::prelude::*;
use num_dual::*;
use std::f64::consts::{PI, SQRT_2};

/// Packing fraction of a face-centered cubic arrangement of hard spheres.
///
/// States at or above this packing fraction are rejected before the
/// equation of state is evaluated.
pub const CLOSE_PACKING_FRACTION: f64 = PI / (3.0 * SQRT_2);

/// A residual Helmholtz energy model.
///
/// The model is written as a sum of independent contributions, each a
/// pure function of the state. All quantities are reduced: temperature in
/// K, volume in Å³, moles as number of molecules.
pub trait Residual: Send + Sync {
    /// Return the number of components in the system.
    fn components(&self) -> usize;

    /// Return a model consisting of the components contained in `component_list`.
    fn subset(&self, component_list: &[usize]) -> EosResult<Self>
    where
        Self: Sized;

    /// Return the maximum density in Angstrom^-3.
    ///
    /// This value is used as an estimate for a liquid phase for phase
    /// equilibria and other iterations. It is not explicitly meant to
    /// be a mathematical limit for the density.
    fn compute_max_density(&self, moles: &Array1<f64>) -> f64;

    /// Segment packing fraction $\zeta_3$ at the given temperature and partial densities.
    fn packing_fraction(&self, temperature: f64, partial_density: &Array1<f64>) -> f64;

    /// Evaluate the reduced Helmholtz energy $\beta A$ of each individual contribution
    /// and return them together with a name.
    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(&'static str, D)>;

    /// Logarithm of the cubed thermal de Broglie wavelength $\ln\Lambda_i^3$
    /// (Λ in Å) of every component at the given temperature.
    ///
    /// The default of Λ = 1 Å shifts the ideal gas Helmholtz energy by a
    /// linear function of the moles, which leaves phase equilibria unchanged.
    fn ln_lambda3(&self, _temperature: f64) -> Array1<f64> {
        Array1::zeros(self.components())
    }

    /// Evaluate the residual reduced Helmholtz energy $\beta A^\mathrm{res}$.
    fn evaluate_residual<D: DualNum<f64> + Copy>(&self, state: &StateHD<D>) -> D {
        self.residual_helmholtz_energy_contributions(state)
            .into_iter()
            .fold(D::zero(), |acc, (_, a)| acc + a)
    }

    /// Check if the provided optional mole number is consistent with the
    /// equation of state.
    ///
    /// For a pure component no moles need to be provided. In that case,
    /// a single molecule is used.
    fn validate_moles(&self, moles: Option<&Array1<f64>>) -> EosResult<Array1<f64>> {
        let l = moles.map_or(1, |m| m.len());
        if self.components() == l {
            match moles {
                Some(m) => Ok(m.to_owned()),
                None => Ok(Array::ones(1)),
            }
        } else {
            Err(EosError::IncompatibleComponents(self.components(), l))
        }
    }

    /// Calculate the maximum density.
    fn max_density(&self, moles: Option<&Array1<f64>>) -> EosResult<f64> {
        let m = self.validate_moles(moles)?;
        Ok(self.compute_max_density(&m))
    }

    /// Fail with [EosError::OutOfPhysicalRange] if the packing fraction reaches close packing.
    fn check_packing(&self, temperature: f64, partial_density: &Array1<f64>) -> EosResult<()> {
        let eta = self.packing_fraction(temperature, partial_density);
        if eta.is_finite() && eta < CLOSE_PACKING_FRACTION {
            Ok(())
        } else {
            Err(EosError::OutOfPhysicalRange(eta))
        }
    }

    /// Calculate the second virial coefficient $B(T)$ in Å³.
    fn second_virial_coefficient(
        &self,
        temperature: f64,
        moles: Option<&Array1<f64>>,
    ) -> EosResult<f64> {
        let m = self.validate_moles(moles)?;
        let x = &m / m.sum();
        let mut rho = HyperDual64::from(0.0);
        rho.eps1 = 1.0;
        rho.eps2 = 1.0;
        let t = HyperDual64::from(temperature);
        let s = StateHD::new_virial(t, rho, x);
        Ok(self.evaluate_residual(&s).eps1eps2 * 0.5)
    }
}
