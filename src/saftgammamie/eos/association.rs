//! Association contribution (Wertheim TPT1) in closed form.
//!
//! The bonding strength uses the Mie-fluid kernel of Dufal et al. (2015).
//! For mixtures, the fractions of non-bonded sites are assumed to be equal
//! for all components; site numbers and bonding strengths enter as mole
//! fraction weighted averages. For a single associating component this is
//! the exact TPT1 solution.
use crate::saftgammamie::parameters::SaftGammaMieParameters;
use crate::mixing_rules::AssociationCombiningRule;
use ndarray::{Array1, Array2};
use num_dual::DualNum;
use num_traits::Zero;
use saftgm_core::StateHD;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Pure component association parameters.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct AssociationRecord {
    /// Dimensionless association volume parameter
    pub kappa_ab: f64,
    /// Association energy parameter in units of Kelvin
    pub epsilon_k_ab: f64,
    /// \# of association sites of type A
    pub na: f64,
    /// \# of association sites of type B
    pub nb: f64,
}

impl AssociationRecord {
    pub fn new(kappa_ab: f64, epsilon_k_ab: f64, na: f64, nb: f64) -> Self {
        Self {
            kappa_ab,
            epsilon_k_ab,
            na,
            nb,
        }
    }
}

impl fmt::Display for AssociationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssociationRecord(kappa_ab={}", self.kappa_ab)?;
        write!(f, ", epsilon_k_ab={}", self.epsilon_k_ab)?;
        write!(f, ", na={}", self.na)?;
        write!(f, ", nb={})", self.nb)
    }
}

/// Binary association parameters that replace the combining rule.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default)]
pub struct BinaryAssociationRecord {
    /// Cross-association volume parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kappa_ab: Option<f64>,
    /// Cross-association energy parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epsilon_k_ab: Option<f64>,
}

impl BinaryAssociationRecord {
    pub fn new(kappa_ab: Option<f64>, epsilon_k_ab: Option<f64>) -> Self {
        Self {
            kappa_ab,
            epsilon_k_ab,
        }
    }
}

/// Association parameters of the associating components.
#[derive(Clone, Debug)]
pub struct AssociationParameters {
    /// Component index of every associating component
    pub assoc_comp: Array1<usize>,
    pub na: Array1<f64>,
    pub nb: Array1<f64>,
    /// Association energies in K
    pub epsilon_k_aibj: Array2<f64>,
    /// Bonding volumes in Å³
    pub bonding_volume_aibj: Array2<f64>,
}

impl AssociationParameters {
    pub fn new(
        records: &[Option<AssociationRecord>],
        sigma: &Array1<f64>,
        binary_records: &[((usize, usize), BinaryAssociationRecord)],
        rule: &dyn AssociationCombiningRule,
    ) -> Self {
        let sites: Vec<_> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.filter(|r| r.na + r.nb > 0.0).map(|r| (i, r)))
            .collect();
        let index: HashMap<_, _> = sites.iter().enumerate().map(|(a, &(i, _))| (i, a)).collect();

        let n = sites.len();
        let mut epsilon_k_aibj = Array2::from_shape_fn([n; 2], |(a, b)| {
            rule.epsilon_k_ab(sites[a].1.epsilon_k_ab, sites[b].1.epsilon_k_ab)
        });
        let mut bonding_volume_aibj = Array2::from_shape_fn([n; 2], |(a, b)| {
            let (i, ra) = sites[a];
            let (j, rb) = sites[b];
            rule.bonding_volume(ra.kappa_ab, rb.kappa_ab, sigma[i], sigma[j])
        });
        for &((i, j), record) in binary_records {
            if let (Some(&a), Some(&b)) = (index.get(&i), index.get(&j)) {
                if let Some(epsilon_k_ab) = record.epsilon_k_ab {
                    epsilon_k_aibj[[a, b]] = epsilon_k_ab;
                    epsilon_k_aibj[[b, a]] = epsilon_k_ab;
                }
                if let Some(kappa_ab) = record.kappa_ab {
                    let volume = rule.bonding_volume(kappa_ab, kappa_ab, sigma[i], sigma[j]);
                    bonding_volume_aibj[[a, b]] = volume;
                    bonding_volume_aibj[[b, a]] = volume;
                }
            }
        }

        Self {
            assoc_comp: sites.iter().map(|&(i, _)| i).collect(),
            na: sites.iter().map(|(_, r)| r.na).collect(),
            nb: sites.iter().map(|(_, r)| r.nb).collect(),
            epsilon_k_aibj,
            bonding_volume_aibj,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.assoc_comp.is_empty()
    }
}

/// Bonding strength $\Delta_{ij}$ in Å³ between the associating components.
fn association_strength<D: DualNum<f64> + Copy>(
    parameters: &SaftGammaMieParameters,
    temperature: D,
    reduced_segment_density: D,
) -> Array2<D> {
    let a = &parameters.association;
    let ac = &a.assoc_comp;
    Array2::from_shape_fn([ac.len(); 2], |(i, j)| {
        let tr = temperature / parameters.epsilon_k_ij[[ac[i], ac[j]]];
        let mut kernel = D::zero();
        let mut rho_n = D::one();
        for (n, c) in C.iter().enumerate() {
            // powers of the reduced temperature up to 10 - n
            let mut inner = D::zero();
            let mut trm = D::one();
            for &cm in c.iter().take(11 - n) {
                inner += trm * cm;
                trm *= tr;
            }
            kernel += inner * rho_n;
            rho_n *= reduced_segment_density;
        }
        kernel
            * a.bonding_volume_aibj[[i, j]]
            * (temperature.recip() * a.epsilon_k_aibj[[i, j]]).exp_m1()
    })
}

/// Residual Helmholtz energy $\beta A^\mathrm{assoc}$ of the state.
///
/// `reduced_segment_density` is $\rho_s\sigma_x^3$.
pub(crate) fn helmholtz_energy<D: DualNum<f64> + Copy>(
    parameters: &SaftGammaMieParameters,
    state: &StateHD<D>,
    reduced_segment_density: D,
) -> D {
    let a = &parameters.association;
    let x = a.assoc_comp.mapv(|i| state.molefracs[i]);

    // average number of sites per molecule
    let n_a = (0..x.len()).fold(D::zero(), |acc, i| acc + x[i] * a.na[i]);
    let n_b = (0..x.len()).fold(D::zero(), |acc, i| acc + x[i] * a.nb[i]);
    // no associating component present
    if n_a.re() + n_b.re() == 0.0 {
        return D::zero();
    }

    let delta = association_strength(parameters, state.temperature, reduced_segment_density);
    let density = state.partial_density.sum();
    let f = |x: D| x.ln() - x * 0.5 + 0.5;

    if n_a.re() == 0.0 || n_b.re() == 0.0 {
        // only one site type: sites bond among themselves
        let s = if n_b.re() == 0.0 { &a.na } else { &a.nb };
        let n_s = n_a + n_b;
        let mut delta_bar = D::zero();
        for i in 0..x.len() {
            for j in 0..x.len() {
                delta_bar += x[i] * s[i] * x[j] * s[j] * delta[[i, j]];
            }
        }
        let delta_bar = delta_bar / (n_s * n_s);
        let xs = ((delta_bar * density * n_s * 4.0 + 1.0).sqrt() + 1.0).recip() * 2.0;
        return state.moles.sum() * n_s * f(xs);
    }

    let mut delta_bar = D::zero();
    for i in 0..x.len() {
        for j in 0..x.len() {
            delta_bar += x[i] * a.na[i] * x[j] * a.nb[j] * delta[[i, j]];
        }
    }
    let delta_bar = delta_bar / (n_a * n_b);

    // site densities
    let rhoa = density * n_a;
    let rhob = density * n_b;

    // fraction of non-bonded association sites
    let sqrt = ((delta_bar * (rhoa - rhob) + 1.0).powi(2) + delta_bar * rhob * 4.0).sqrt();
    let xa = (sqrt + (delta_bar * (rhob - rhoa) + 1.0)).recip() * 2.0;
    let xb = (sqrt + (delta_bar * (rhoa - rhob) + 1.0)).recip() * 2.0;

    state.moles.sum() * (n_a * f(xa) + n_b * f(xb))
}


const C: [[f64; 11]; 11] = [
    [
        0.0756425183020431,
        -0.128667137050961,
        0.128350632316055,
        -0.0725321780970292,
        0.0257782547511452,
        -0.00601170055221687,
        0.000933363147191978,
        -9.55607377143667e-05,
        6.19576039900837e-06,
        -2.30466608213628e-07,
        3.74605718435540e-09,
    ],
    [
        0.134228218276565,
        -0.182682168504886,
        0.0771662412959262,
        -0.000717458641164565,
        -0.00872427344283170,
        0.00297971836051287,
        -0.000484863997651451,
        4.35262491516424e-05,
        -2.07789181640066e-06,
        4.13749349344802e-08,
        0.0,
    ],
    [
        -0.565116428942893,
        1.00930692226792,
        -0.660166945915607,
        0.214492212294301,
        -0.0388462990166792,
        0.00406016982985030,
        -0.000239515566373142,
        7.25488368831468e-06,
        -8.58904640281928e-08,
        0.0,
        0.0,
    ],
    [
        -0.387336382687019,
        -0.211614570109503,
        0.450442894490509,
        -0.176931752538907,
        0.0317171522104923,
        -0.00291368915845693,
        0.000130193710011706,
        -2.14505500786531e-06,
        0.0,
        0.0,
        0.0,
    ],
    [
        2.13713180911797,
        -2.02798460133021,
        0.336709255682693,
        0.00118106507393722,
        -0.00600058423301506,
        0.000626343952584415,
        -2.03636395699819e-05,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -0.300527494795524,
        2.89920714512243,
        -0.567134839686498,
        0.0518085125423494,
        -0.00239326776760414,
        4.15107362643844e-05,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -6.21028065719194,
        -1.92883360342573,
        0.284109761066570,
        -0.0157606767372364,
        0.000368599073256615,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        11.6083532818029,
        0.742215544511197,
        -0.0823976531246117,
        0.00186167650098254,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -10.2632535542427,
        -0.125035689035085,
        0.0114299144831867,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        4.65297446837297,
        -0.00192518067137033,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
    [
        -0.867296219639940,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
        0.0,
    ],
];
