//! Monomer dispersion (Lafitte et al. 2013) and Mie chain contributions.
use crate::saftgammamie::parameters::SaftGammaMieParameters;
use ndarray::{Array1, Array2};
use num_dual::{Dual, DualNum};
use saftgm_core::StateHD;
use std::f64::consts::{FRAC_PI_6, PI};

/// Density dependent quantities shared by the dispersion, chain and association terms.
#[derive(Debug)]
pub(crate) struct Properties<D> {
    /// Temperature dependent diameter
    diameter: Array1<D>,
    /// total number density of segments
    pub segment_density: D,
    /// mole fraction of segments
    segment_molefracs: Array1<D>,
    /// mean segment number
    mean_segment_number: D,
    /// packing fraction using d(T) per unit segment density
    zeta_x_per_density: D,
    /// mixture packing fraction using d(T)
    zeta_x: D,
    /// mixture packing fraction using sigma
    pub zeta_x_bar: D,
    /// coefficients of the hard-sphere contact value
    k0: [D; 4],
}

impl<D: DualNum<f64> + Copy> Properties<D> {
    pub(crate) fn new(
        parameters: &SaftGammaMieParameters,
        state: &StateHD<D>,
        diameter: &Array1<D>,
    ) -> Self {
        let n = parameters.m.len();
        let x = &state.molefracs;

        let mean_segment_number = (0..n).fold(D::zero(), |acc, i| acc + x[i] * parameters.m[i]);
        let xs = Array1::from_shape_fn(n, |i| x[i] * parameters.m[i] / mean_segment_number);
        let segment_density = (0..n).fold(D::zero(), |acc, i| {
            acc + state.partial_density[i] * parameters.m[i]
        });

        let d3_ij =
            Array2::from_shape_fn((n, n), |(i, j)| ((diameter[i] + diameter[j]) * 0.5).powi(3));
        let mut zeta_x_per_density = D::zero();
        let mut zeta_x_bar = D::zero();
        for i in 0..n {
            for j in 0..n {
                zeta_x_per_density += xs[i] * xs[j] * d3_ij[[i, j]];
                zeta_x_bar += xs[i] * xs[j] * parameters.sigma_ij[[i, j]].powi(3);
            }
        }
        zeta_x_per_density *= FRAC_PI_6;
        let zeta_x = zeta_x_per_density * segment_density;
        zeta_x_bar *= segment_density * FRAC_PI_6;

        let frac_1mzeta3 = (-zeta_x + 1.0).powi(3).recip();
        let z = zeta_x;
        let z2 = z * z;
        let z3 = z2 * z;
        let k0 =
            -(-z + 1.0).ln() + z * (-z * 39.0 + z2 * 9.0 - z3 * 2.0 + 42.0) * frac_1mzeta3 / 6.0;
        let k1 = z * frac_1mzeta3 * 0.5 * (z3 + z * 6.0 - 12.0);
        let k2 = -z2 * 3.0 / 8.0 * frac_1mzeta3 * (-zeta_x + 1.0);
        let k3 = z * frac_1mzeta3 / 6.0 * (-z3 + z * 3.0 + 3.0);

        Self {
            diameter: diameter.clone(),
            segment_density,
            segment_molefracs: xs,
            mean_segment_number,
            zeta_x_per_density,
            zeta_x,
            zeta_x_bar,
            k0: [k0, k1, k2, k3],
        }
    }

    /// Reduced segment density $\rho_s\sigma_x^3$.
    pub(crate) fn reduced_segment_density(&self) -> D {
        self.zeta_x_bar / FRAC_PI_6
    }
}

const PHI: [[f64; 7]; 6] = [
    [7.5365557, -37.60463, 71.745953, -46.83552, -2.467982, -0.50272, 8.0956883],
    [-359.44, 1825.6, -3168.0, 1884.2, -0.82376, -3.1935, 3.709],
    [1550.9, -5070.1, 6534.6, -3288.7, -2.7171, 2.0883, 0.0],
    [-1.19932, 9.063632, -17.9482, 11.34027, 20.52142, -56.6377, 40.53683],
    [-1911.28, 21390.175, -51320.7, 37064.54, 1103.742, -3264.61, 2556.181],
    [9236.9, -129430.0, 357230.0, -315530.0, 1390.2, -4518.2, 4241.6],
];

const C: [[f64; 4]; 4] = [
    [0.81096, 1.7888, -37.578, 92.284],
    [1.0205, -19.341, 151.26, -463.50],
    [-1.9057, 22.845, -228.14, 973.92],
    [1.0885, -6.1962, 106.98, -677.64],
];

/// First and second order perturbation terms of a segment pair.
struct PairTerms<T> {
    /// $x_0=\sigma_{ij}/d_{ij}$
    x0: T,
    /// $x_0^\lambda(a^S_1+B)$ for $\lambda_a$, $\lambda_r$, $2\lambda_a$, $\lambda_a+\lambda_r$ and $2\lambda_r$
    a1s_b: [T; 5],
    a1: T,
    a2: T,
}

fn pair_terms<T: DualNum<f64> + Copy>(
    parameters: &SaftGammaMieParameters,
    i: usize,
    j: usize,
    segment_density: T,
    zeta_x: T,
    k_hs: T,
    d_ij: T,
) -> PairTerms<T> {
    let p = parameters;
    let eps_k = p.epsilon_k_ij[[i, j]];
    let la = p.la_ij[[i, j]];
    let lr = p.lr_ij[[i, j]];
    let c = p.c_ij[[i, j]];

    let x0 = d_ij.recip() * p.sigma_ij[[i, j]];
    let pref = segment_density * d_ij.powi(3) * eps_k * 2.0 * PI * c;
    let a1s_b = [la, lr, 2.0 * la, la + lr, 2.0 * lr].map(|l| a1s_b_ij(zeta_x, x0, l));
    let a1 = pref * (a1s_b[0] - a1s_b[1]);
    let a2 = pref * eps_k * c * k_hs * 0.5 * (a1s_b[2] - a1s_b[3] * 2.0 + a1s_b[4]);
    PairTerms { x0, a1s_b, a1, a2 }
}

/// Third order term and the fluctuation correction $\chi$ of a segment pair.
fn a3_chi<D: DualNum<f64> + Copy>(
    parameters: &SaftGammaMieParameters,
    i: usize,
    j: usize,
    zeta_x_bar: D,
) -> (D, D) {
    let eps_k = parameters.epsilon_k_ij[[i, j]];
    let alpha = parameters.alpha_ij[[i, j]];
    let a3 = -zeta_x_bar
        * f(3, alpha)
        * (zeta_x_bar * (zeta_x_bar * f(5, alpha) + f(4, alpha))).exp()
        * eps_k.powi(3);
    let chi = zeta_x_bar * f(0, alpha)
        + zeta_x_bar.powi(5) * f(1, alpha)
        + zeta_x_bar.powi(8) * f(2, alpha);
    (a3, chi)
}

fn isothermal_compressibility_hs<T: DualNum<f64> + Copy>(zeta_x: T) -> T {
    (zeta_x - 1.0).powi(4)
        / ((zeta_x + zeta_x.powi(2) - zeta_x.powi(3)) * 4.0 + zeta_x.powi(4) + 1.0)
}

/// Sum of the unlike-pair contributions (i < j) to a1, a2 and a3.
fn cross_terms<D: DualNum<f64> + Copy>(
    parameters: &SaftGammaMieParameters,
    properties: &Properties<D>,
    k_hs: D,
) -> [D; 3] {
    let n = parameters.m.len();
    let xs = &properties.segment_molefracs;
    let mut a = [D::zero(); 3];
    for i in 0..n {
        for j in i + 1..n {
            let d_ij = (properties.diameter[i] + properties.diameter[j]) * 0.5;
            let t = pair_terms(
                parameters,
                i,
                j,
                properties.segment_density,
                properties.zeta_x,
                k_hs,
                d_ij,
            );
            let (a3, chi) = a3_chi(parameters, i, j, properties.zeta_x_bar);
            let xs_ij = xs[i] * xs[j] * 2.0;
            a[0] += t.a1 * xs_ij;
            a[1] += t.a2 * xs_ij * (chi + 1.0);
            a[2] += a3 * xs_ij;
        }
    }
    a
}

/// First, second and third order perturbations for dispersive interactions.
pub(crate) fn a_disp<D: DualNum<f64> + Copy>(
    parameters: &SaftGammaMieParameters,
    properties: &Properties<D>,
    state: &StateHD<D>,
) -> D {
    let xs = &properties.segment_molefracs;
    let t_inv = state.temperature.recip();
    let k_hs = isothermal_compressibility_hs(properties.zeta_x);

    let [mut a1, mut a2, mut a3] = cross_terms(parameters, properties, k_hs);
    for i in 0..xs.len() {
        let t = pair_terms(
            parameters,
            i,
            i,
            properties.segment_density,
            properties.zeta_x,
            k_hs,
            properties.diameter[i],
        );
        let (a3_ii, chi) = a3_chi(parameters, i, i, properties.zeta_x_bar);
        let xs_ii = xs[i] * xs[i];
        a1 += t.a1 * xs_ii;
        a2 += t.a2 * xs_ii * (chi + 1.0);
        a3 += a3_ii * xs_ii;
    }
    state.moles.sum()
        * properties.mean_segment_number
        * (a1 * t_inv + a2 * t_inv.powi(2) + a3 * t_inv.powi(3))
}

/// Dispersion and chain contributions evaluated together.
///
/// The chain term needs the derivatives of the like-pair a1 and a2 with
/// respect to the segment density. They are obtained on the fly by
/// nesting the like-pair terms in a further dual number.
pub(crate) fn a_disp_chain<D: DualNum<f64> + Copy>(
    parameters: &SaftGammaMieParameters,
    properties: &Properties<D>,
    state: &StateHD<D>,
) -> D {
    let p = parameters;
    let k = &properties.k0;
    let xs = &properties.segment_molefracs;
    let t_inv = state.temperature.recip();
    let zeta_x_bar = properties.zeta_x_bar;

    let rho_s_dual = Dual::from_re(properties.segment_density).derivative();
    let zeta_x_dual = Dual::from_re(properties.zeta_x_per_density) * rho_s_dual;
    let k_hs_dual = isothermal_compressibility_hs(zeta_x_dual);
    let k_hs = k_hs_dual.re;

    let [mut a1, mut a2, mut a3] = cross_terms(parameters, properties, k_hs);
    let mut a_chain = D::zero();

    for i in 0..xs.len() {
        let eps_k = p.epsilon_k_ij[[i, i]];
        let la = p.la_ij[[i, i]];
        let lr = p.lr_ij[[i, i]];
        let c = p.c_ij[[i, i]];
        let di = properties.diameter[i];

        let t = pair_terms(
            parameters,
            i,
            i,
            rho_s_dual,
            zeta_x_dual,
            k_hs_dual,
            Dual::from_re(di),
        );
        let (a3_ii, chi) = a3_chi(parameters, i, i, zeta_x_bar);
        let xs_ii = xs[i] * xs[i];
        a1 += t.a1.re * xs_ii;
        a2 += t.a2.re * xs_ii * (chi + 1.0);
        a3 += a3_ii * xs_ii;

        // contact value of the Mie radial distribution function
        let [b_la, b_lr, b_2la, b_lalr, b_2lr] = t.a1s_b.map(|b| b.re);
        let x0 = t.x0.re;
        let pref = di.powi(3) * eps_k * 2.0 * PI;
        let g_hs = (k[0] + k[1] * x0 + k[2] * x0.powi(2) + k[3] * x0.powi(3)).exp();
        let g1 = t.a1.eps * 3.0 / pref - (b_la * la - b_lr * lr) * c;
        let g2_mca = t.a2.eps * 3.0 / pref / eps_k
            - (b_2lr * lr - b_lalr * (la + lr) + b_2la * la) * k_hs * c.powi(2);
        let beta_eps = t_inv * eps_k;
        let gamma = zeta_x_bar
            * beta_eps.exp_m1()
            * 10.0
            * (-(10.0 * (0.57 - p.alpha_ij[[i, i]])).tanh() + 1.0)
            * (-zeta_x_bar * 6.7 - zeta_x_bar.powi(2) * 8.0).exp();
        let g2 = g2_mca * (gamma + 1.0);
        let ln_g_mie = g_hs.ln() + (beta_eps * g1 + beta_eps.powi(2) * g2) / g_hs;
        a_chain -= state.molefracs[i] * (p.m[i] - 1.0) * ln_g_mie;
    }
    state.moles.sum()
        * (properties.mean_segment_number * (a1 * t_inv + a2 * t_inv.powi(2) + a3 * t_inv.powi(3))
            + a_chain)
}

#[inline]
fn zeta_eff<D: DualNum<f64> + Copy>(zeta: D, lambda: f64) -> D {
    let li = 1. / lambda;
    let li2 = li * li;
    let li3 = li * li2;
    let c = C.map(|ck| li * ck[1] + li2 * ck[2] + li3 * ck[3] + ck[0]);
    zeta * (zeta * (zeta * (zeta * c[3] + c[2]) + c[1]) + c[0])
}

/// Sutherland term (Eq. A 16) divided by 2 PI rho_s d_ij^3 epsilon_k_ij
#[inline]
fn a1s_ij<D: DualNum<f64> + Copy>(zeta_x: D, lambda: f64) -> D {
    let zeta_eff = zeta_eff(zeta_x, lambda);
    -(-zeta_eff * 0.5 + 1.0) / ((-zeta_eff + 1.0).powi(3) * (lambda - 3.0))
}

/// Eq. A 12 of Lafitte divided by 2 PI rho_s d_ij^3 epsilon_k_ij
#[inline]
fn b_ij<D: DualNum<f64> + Copy>(zeta_x: D, x0: D, lambda: f64) -> D {
    let x0_3ml = x0.powf(3.0 - lambda);
    let i = -(x0_3ml - 1.0) / (lambda - 3.0);
    let j = -(x0.powf(4.0 - lambda) * (lambda - 3.0) - x0_3ml * (lambda - 4.0) - 1.0)
        / ((lambda - 3.0) * (lambda - 4.0));
    ((-zeta_x * 0.5 + 1.0) * i - zeta_x * (zeta_x + 1.0) * 4.5 * j) * (-zeta_x + 1.0).powi(-3)
}

/// x0^l (a1s_ij + b_ij) without the prefactor C
#[inline]
fn a1s_b_ij<D: DualNum<f64> + Copy>(zeta_x: D, x0: D, lambda: f64) -> D {
    x0.powf(lambda) * (a1s_ij(zeta_x, lambda) + b_ij(zeta_x, x0, lambda))
}

fn f(k: usize, alpha: f64) -> f64 {
    let alpha2 = alpha * alpha;
    let alpha3 = alpha * alpha2;
    let phi = PHI[k];
    (alpha * phi[1] + alpha2 * phi[2] + alpha3 * phi[3] + phi[0])
        / (alpha * phi[4] + alpha2 * phi[5] + alpha3 * phi[6] + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saftgammamie::parameters::test_utils::{butane, ethane, methane};
    use approx::assert_relative_eq;
    use ndarray::arr1;
    use num_dual::Dual64;
    use saftgm_core::parameter::Parameter;

    fn evaluate(p: &SaftGammaMieParameters, state: &StateHD<f64>) -> (f64, f64) {
        let d = p.hs_diameter(state.temperature);
        let properties = Properties::new(p, state, &d);
        (
            a_disp(p, &properties, state),
            a_disp_chain(p, &properties, state),
        )
    }

    #[test]
    fn chain_vanishes_for_monomers() {
        let p = SaftGammaMieParameters::new_pure(methane()).unwrap();
        let state = StateHD::new(150.0, 1e3, arr1(&[15.0]));
        let (disp, disp_chain) = evaluate(&p, &state);
        assert!(disp < 0.0);
        assert_relative_eq!(disp, disp_chain, max_relative = 1e-12);
    }

    #[test]
    fn chain_formation_is_favourable() {
        let p = SaftGammaMieParameters::new_pure(butane()).unwrap();
        let state = StateHD::new(300.0, 1e3, arr1(&[6.0]));
        let (disp, disp_chain) = evaluate(&p, &state);
        assert!(disp_chain < disp);
    }

    #[test]
    fn mixture_of_identical_components() {
        let pure = SaftGammaMieParameters::new_pure(ethane()).unwrap();
        let mix = SaftGammaMieParameters::new_binary(vec![ethane(), ethane()], None).unwrap();
        let (_, a_pure) = evaluate(&pure, &StateHD::new(250.0, 1e3, arr1(&[8.0])));
        let (_, a_mix) = evaluate(&mix, &StateHD::new(250.0, 1e3, arr1(&[3.0, 5.0])));
        assert_relative_eq!(a_pure, a_mix, max_relative = 1e-10);
    }

    #[test]
    fn vanishes_in_the_ideal_gas_limit() {
        let p = SaftGammaMieParameters::new_pure(butane()).unwrap();
        let state = StateHD::new(300.0, 1e12, arr1(&[1.0]));
        let (_, a) = evaluate(&p, &state);
        assert!(a.abs() < 1e-8);
    }

    #[test]
    fn temperature_derivative_is_finite() {
        let p = SaftGammaMieParameters::new_pure(butane()).unwrap();
        let t = Dual64::from(300.0).derivative();
        let state = StateHD::new(t, Dual64::from(1e3), arr1(&[Dual64::from(6.0)]));
        let d = p.hs_diameter(t);
        let properties = Properties::new(&p, &state, &d);
        let a = a_disp_chain(&p, &properties, &state);
        assert!(a.re < 0.0);
        assert!(a.eps.is_finite());
    }
}
