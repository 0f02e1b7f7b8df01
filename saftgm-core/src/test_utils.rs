use crate::equation_of_state::Residual;
use crate::errors::EosResult;
use crate::state::StateHD;
use ndarray::Array1;
use num_dual::DualNum;

/// Van der Waals fluid with b in Å³ and a in K Å³.
pub(crate) struct VanDerWaals {
    pub a: f64,
    pub b: f64,
}

impl VanDerWaals {
    /// Critical temperature 8a/27b = 370.37 K, critical density 1/3b.
    pub(crate) fn standard() -> Self {
        Self { a: 5.0e4, b: 40.0 }
    }

    /// Analytic pressure in K/Å³.
    pub(crate) fn pressure(&self, temperature: f64, density: f64) -> f64 {
        density * temperature / (1.0 - self.b * density) - self.a * density * density
    }
}

impl Residual for VanDerWaals {
    fn components(&self) -> usize {
        1
    }

    fn subset(&self, _: &[usize]) -> EosResult<Self> {
        Ok(Self { a: self.a, b: self.b })
    }

    fn compute_max_density(&self, _: &Array1<f64>) -> f64 {
        0.9 / self.b
    }

    fn packing_fraction(&self, _: f64, partial_density: &Array1<f64>) -> f64 {
        partial_density.sum() * self.b * 0.25
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(&'static str, D)> {
        let n = state.moles.sum();
        let rho = n / state.volume;
        let a = -n * (-rho * self.b + 1.0).ln() - n * rho * self.a / state.temperature;
        vec![("van der Waals", a)]
    }
}
