use super::parameters::SaftGammaMieParameters;
use ndarray::Array1;
use num_dual::DualNum;
use saftgm_core::parameter::Parameter;
use saftgm_core::units::{KB, NAV, PLANCK};
use saftgm_core::{EosResult, Residual, StateHD};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_6, PI};
use std::sync::Arc;

pub(crate) mod association;
pub(crate) mod dispersion;
pub(crate) mod hard_sphere;
use dispersion::{a_disp, a_disp_chain, Properties};

/// Customization options for the SAFT-γ-Mie equation of state.
#[derive(Copy, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SaftGammaMieOptions {
    /// Packing fraction used as the upper bound of density iterations.
    pub max_eta: f64,
}

impl Default for SaftGammaMieOptions {
    fn default() -> Self {
        Self { max_eta: 0.5 }
    }
}

/// SAFT-γ-Mie equation of state for homonuclear chains of Mie segments.
pub struct SaftGammaMie {
    parameters: Arc<SaftGammaMieParameters>,
    options: SaftGammaMieOptions,
    chain: bool,
    association: bool,
}

impl SaftGammaMie {
    pub fn new(parameters: Arc<SaftGammaMieParameters>) -> Self {
        Self::with_options(parameters, SaftGammaMieOptions::default())
    }

    pub fn with_options(
        parameters: Arc<SaftGammaMieParameters>,
        options: SaftGammaMieOptions,
    ) -> Self {
        let chain = parameters.m.iter().any(|&m| m != 1.0);
        let association = !parameters.association.is_empty();
        Self {
            parameters,
            options,
            chain,
            association,
        }
    }

    pub fn parameters(&self) -> &Arc<SaftGammaMieParameters> {
        &self.parameters
    }

    pub fn options(&self) -> SaftGammaMieOptions {
        self.options
    }

    /// Molar weights in g/mol.
    pub fn molar_weight(&self) -> &Array1<f64> {
        &self.parameters.molarweight
    }
}

impl Residual for SaftGammaMie {
    fn components(&self) -> usize {
        self.parameters.m.len()
    }

    fn subset(&self, component_list: &[usize]) -> EosResult<Self> {
        Ok(Self::with_options(
            Arc::new(self.parameters.subset(component_list)?),
            self.options,
        ))
    }

    fn compute_max_density(&self, moles: &Array1<f64>) -> f64 {
        let p = &self.parameters;
        self.options.max_eta * moles.sum()
            / (FRAC_PI_6 * &p.m * p.sigma.mapv(|v| v.powi(3)) * moles).sum()
    }

    fn packing_fraction(&self, temperature: f64, partial_density: &Array1<f64>) -> f64 {
        hard_sphere::packing_fraction(&self.parameters, temperature, partial_density)
    }

    fn ln_lambda3(&self, temperature: f64) -> Array1<f64> {
        // Λ = h / sqrt(2π m kB T) in Å
        self.parameters.molarweight.mapv(|mw| {
            let mass = mw * 1e-3 / NAV;
            let lambda = PLANCK / (2.0 * PI * mass * KB * temperature).sqrt() * 1e10;
            3.0 * lambda.ln()
        })
    }

    fn residual_helmholtz_energy_contributions<D: DualNum<f64> + Copy>(
        &self,
        state: &StateHD<D>,
    ) -> Vec<(&'static str, D)> {
        let p = &self.parameters;
        let mut a = Vec::with_capacity(3);

        let d = p.hs_diameter(state.temperature);
        a.push(("hard sphere", hard_sphere::helmholtz_energy(p, state, &d)));

        let properties = Properties::new(p, state, &d);
        if self.chain {
            a.push(("dispersion + chain", a_disp_chain(p, &properties, state)));
        } else {
            a.push(("dispersion", a_disp(p, &properties, state)));
        }
        if self.association {
            a.push((
                "association",
                association::helmholtz_energy(p, state, properties.reduced_segment_density()),
            ));
        }
        a
    }
}
