//! BMCSL hard-sphere contribution for chains of tangent segments.
//!
//! The reduced Helmholtz energy density is
//! $$\frac{\beta A}{V}=\frac{6}{\pi}\left(\frac{3\zeta_1\zeta_2}{1-\zeta_3}+\frac{\zeta_2^3}{\zeta_3\left(1-\zeta_3\right)^2}+\left(\frac{\zeta_2^3}{\zeta_3^2}-\zeta_0\right)\ln\left(1-\zeta_3\right)\right)$$
//! with $\zeta_k=\frac{\pi}{6}\sum_i\rho_i m_i d_i^k$.
use crate::saftgammamie::parameters::SaftGammaMieParameters;
use ndarray::Array1;
use num_dual::DualNum;
use saftgm_core::StateHD;
use std::f64::consts::FRAC_PI_6;

/// Packing fractions $\zeta_0\ldots\zeta_3$ per unit of total density.
fn zeta_per_density<D: DualNum<f64> + Copy>(
    m: &Array1<f64>,
    molefracs: &Array1<D>,
    diameter: &Array1<D>,
) -> [D; 4] {
    let mut zeta = [D::zero(); 4];
    for i in 0..diameter.len() {
        let mut dk = D::one();
        for z in zeta.iter_mut() {
            *z += molefracs[i] * dk * (m[i] * FRAC_PI_6);
            dk *= diameter[i];
        }
    }
    zeta
}

/// Residual Helmholtz energy $\beta A^\mathrm{hs}$.
pub(crate) fn helmholtz_energy<D: DualNum<f64> + Copy>(
    parameters: &SaftGammaMieParameters,
    state: &StateHD<D>,
    diameter: &Array1<D>,
) -> D {
    let mut zeta = zeta_per_density(&parameters.m, &state.molefracs, diameter);
    // ratio taken before scaling to stay finite at zero density
    let zeta_23 = zeta[2] / zeta[3];
    let density = state.partial_density.sum();
    zeta.iter_mut().for_each(|z| *z *= density);
    let frac_1mz3 = -(zeta[3] - 1.0).recip();
    let a = (zeta[1] * zeta[2] * frac_1mz3 * 3.0
        + zeta[2].powi(2) * frac_1mz3.powi(2) * zeta_23
        + (zeta[2] * zeta_23.powi(2) - zeta[0]) * (-zeta[3]).ln_1p())
        / FRAC_PI_6;
    a * state.volume
}

/// Segment packing fraction $\zeta_3$ for given partial densities.
pub(crate) fn packing_fraction(
    parameters: &SaftGammaMieParameters,
    temperature: f64,
    partial_density: &Array1<f64>,
) -> f64 {
    let diameter = parameters.hs_diameter(temperature);
    (0..diameter.len())
        .map(|i| FRAC_PI_6 * partial_density[i] * parameters.m[i] * diameter[i].powi(3))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saftgammamie::parameters::test_utils::{butane, methane};
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use saftgm_core::parameter::Parameter;

    #[test]
    fn carnahan_starling_limit() {
        // a single component reduces to Carnahan-Starling per segment
        let p = SaftGammaMieParameters::new_pure(butane()).unwrap();
        let t = 250.0;
        let d = p.hs_diameter(t);
        let state = StateHD::new(t, 1e4, arr1(&[40.0]));
        let eta = packing_fraction(&p, t, &state.partial_density);
        let cs = 40.0 * p.m[0] * (4.0 * eta - 3.0 * eta.powi(2)) / (1.0 - eta).powi(2);
        assert_relative_eq!(helmholtz_energy(&p, &state, &d), cs, max_relative = 1e-12);
    }

    #[test]
    fn mixture_of_identical_components() {
        let pure = SaftGammaMieParameters::new_pure(methane()).unwrap();
        let mix = SaftGammaMieParameters::new_binary(vec![methane(), methane()], None).unwrap();
        let t = 150.0;
        let a_pure = helmholtz_energy(
            &pure,
            &StateHD::new(t, 1e4, arr1(&[100.0])),
            &pure.hs_diameter(t),
        );
        let a_mix = helmholtz_energy(
            &mix,
            &StateHD::new(t, 1e4, arr1(&[30.0, 70.0])),
            &mix.hs_diameter(t),
        );
        assert_relative_eq!(a_pure, a_mix, max_relative = 1e-12);
    }
}
