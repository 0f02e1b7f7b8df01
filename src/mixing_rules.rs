//! Combining rules for unlike-pair parameters.
//!
//! Cross parameters are derived once, when a parameter set is built, from
//! the like-pair parameters of the two components. The rule for size,
//! energy and Mie exponents, the correction for multipole interactions and
//! the rule for the association parameters are independent strategies
//! that can be swapped through [MixingRules].
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Energy in K of 1 eV.
const EV_IN_K: f64 = 11604.518;
/// Conversion of a squared dipole moment from Debye² to K Å³.
const DEBYE2_IN_K_A3: f64 = 7243.0;

/// Polarizability, ionization energy and permanent dipole of a molecule.
///
/// The default record has no moments at all.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct MultipoleRecord {
    /// Polarizability volume in units of Angstrom^3
    pub polarizability: f64,
    /// First ionization energy in units of eV
    pub ionization_energy: f64,
    /// Permanent dipole moment in units of Debye
    pub dipole_moment: f64,
}

impl MultipoleRecord {
    pub fn new(polarizability: f64, ionization_energy: f64, dipole_moment: f64) -> Self {
        Self {
            polarizability,
            ionization_energy,
            dipole_moment,
        }
    }

    /// Squared dipole moment in K Å³.
    fn dipole_squared(&self) -> f64 {
        self.dipole_moment.powi(2) * DEBYE2_IN_K_A3
    }
}

impl fmt::Display for MultipoleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MultipoleRecord(polarizability={}, ionization_energy={}, dipole_moment={})",
            self.polarizability, self.ionization_energy, self.dipole_moment
        )
    }
}

/// Like-pair parameters of a single Mie segment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MieSegment {
    /// Segment diameter in units of Angstrom
    pub sigma: f64,
    /// Dispersion energy in units of Kelvin
    pub epsilon_k: f64,
    /// Repulsive Mie exponent
    pub lr: f64,
    /// Attractive Mie exponent
    pub la: f64,
    pub multipole: Option<MultipoleRecord>,
}

impl MieSegment {
    pub fn new(sigma: f64, epsilon_k: f64, lr: f64, la: f64) -> Self {
        Self {
            sigma,
            epsilon_k,
            lr,
            la,
            multipole: None,
        }
    }

    pub fn with_multipole(mut self, multipole: MultipoleRecord) -> Self {
        self.multipole = Some(multipole);
        self
    }
}

/// Unlike-pair Mie parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossParameters {
    pub sigma: f64,
    pub epsilon_k: f64,
    pub lr: f64,
    pub la: f64,
}

impl CrossParameters {
    /// Apply the binary interaction parameters $k_{ij}$ (energy) and
    /// $\gamma_{ij}$ (repulsive exponent).
    pub fn with_binary_corrections(self, k_ij: f64, gamma_ij: f64) -> Self {
        Self {
            epsilon_k: (1.0 - k_ij) * self.epsilon_k,
            lr: (1.0 - gamma_ij) * (self.lr - 3.0) + 3.0,
            ..self
        }
    }
}

/// Rule for the unlike-pair size, energy and exponents.
pub trait CombiningRule: Send + Sync {
    fn sigma(&self, a: &MieSegment, b: &MieSegment) -> f64 {
        0.5 * (a.sigma + b.sigma)
    }

    fn epsilon_k(&self, a: &MieSegment, b: &MieSegment) -> f64;

    /// Combine one of the Mie exponents.
    fn exponent(&self, lambda_a: f64, lambda_b: f64) -> f64;

    fn combine(&self, a: &MieSegment, b: &MieSegment) -> CrossParameters {
        CrossParameters {
            sigma: self.sigma(a, b),
            epsilon_k: self.epsilon_k(a, b),
            lr: self.exponent(a.lr, b.lr),
            la: self.exponent(a.la, b.la),
        }
    }
}

/// Combining rule of Lafitte et al. (2013).
///
/// $$\varepsilon_{ij}=\frac{\sqrt{\sigma_i^3\sigma_j^3}}{\sigma_{ij}^3}\sqrt{\varepsilon_i\varepsilon_j},~~~~\lambda_{ij}-3=\sqrt{(\lambda_i-3)(\lambda_j-3)}$$
#[derive(Clone, Copy, Debug, Default)]
pub struct LafitteCombiningRule;

impl CombiningRule for LafitteCombiningRule {
    fn epsilon_k(&self, a: &MieSegment, b: &MieSegment) -> f64 {
        let sigma_ij = self.sigma(a, b);
        (a.sigma.powi(3) * b.sigma.powi(3)).sqrt() / sigma_ij.powi(3)
            * (a.epsilon_k * b.epsilon_k).sqrt()
    }

    fn exponent(&self, lambda_a: f64, lambda_b: f64) -> f64 {
        ((lambda_a - 3.0) * (lambda_b - 3.0)).sqrt() + 3.0
    }
}

/// Lorentz-Berthelot rule: geometric energy, arithmetic exponents.
#[derive(Clone, Copy, Debug, Default)]
pub struct BerthelotCombiningRule;

impl CombiningRule for BerthelotCombiningRule {
    fn epsilon_k(&self, a: &MieSegment, b: &MieSegment) -> f64 {
        (a.epsilon_k * b.epsilon_k).sqrt()
    }

    fn exponent(&self, lambda_a: f64, lambda_b: f64) -> f64 {
        0.5 * (lambda_a + lambda_b)
    }
}

/// Correction of the unlike-pair dispersion energy for polar molecules.
pub trait MultipoleCorrection: Send + Sync {
    /// Factor applied to the combined $\varepsilon_{ij}$.
    fn epsilon_factor(&self, a: &MultipoleRecord, b: &MultipoleRecord) -> f64;
}

/// Scales $\varepsilon_{ij}$ by $C_{6,ij}/\sqrt{C_{6,ii}C_{6,jj}}$ with $C_6$
/// the sum of London dispersion and Debye induction coefficients.
///
/// Pairs without a permanent dipole are left unchanged, as are pairs in
/// which one segment has no polarizability.
#[derive(Clone, Copy, Debug, Default)]
pub struct LondonDebyeCorrection;

impl LondonDebyeCorrection {
    /// Dispersion coefficient $C_6$ in K Å⁶.
    pub fn c6(a: &MultipoleRecord, b: &MultipoleRecord) -> f64 {
        let ia = a.ionization_energy * EV_IN_K;
        let ib = b.ionization_energy * EV_IN_K;
        let london = (a.polarizability * b.polarizability) * (ia * ib) / (ia + ib) * 1.5;
        let debye = a.dipole_squared() * b.polarizability + b.dipole_squared() * a.polarizability;
        london + debye
    }
}

impl MultipoleCorrection for LondonDebyeCorrection {
    fn epsilon_factor(&self, a: &MultipoleRecord, b: &MultipoleRecord) -> f64 {
        if a.dipole_moment == 0.0 && b.dipole_moment == 0.0 {
            return 1.0;
        }
        let c6_aa_bb = Self::c6(a, a) * Self::c6(b, b);
        if c6_aa_bb > 0.0 {
            Self::c6(a, b) / c6_aa_bb.sqrt()
        } else {
            1.0
        }
    }
}

/// Rule for the cross association energy and bonding volume.
///
/// Bonding volumes are computed from the dimensionless $\kappa$ and the segment diameters.
pub trait AssociationCombiningRule: Send + Sync {
    fn epsilon_k_ab(&self, epsilon_a: f64, epsilon_b: f64) -> f64;

    /// Cross bonding volume in Å³.
    fn bonding_volume(&self, kappa_a: f64, kappa_b: f64, sigma_a: f64, sigma_b: f64) -> f64;
}

/// Arithmetic energy and geometric $\kappa\sigma^3$.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArithmeticEnergy;

impl AssociationCombiningRule for ArithmeticEnergy {
    fn epsilon_k_ab(&self, epsilon_a: f64, epsilon_b: f64) -> f64 {
        0.5 * (epsilon_a + epsilon_b)
    }

    fn bonding_volume(&self, kappa_a: f64, kappa_b: f64, sigma_a: f64, sigma_b: f64) -> f64 {
        (sigma_a * sigma_b).powf(1.5) * (kappa_a * kappa_b).sqrt()
    }
}

/// Geometric energy and geometric $\kappa$ on the arithmetic cross diameter.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeometricEnergy;

impl AssociationCombiningRule for GeometricEnergy {
    fn epsilon_k_ab(&self, epsilon_a: f64, epsilon_b: f64) -> f64 {
        (epsilon_a * epsilon_b).sqrt()
    }

    fn bonding_volume(&self, kappa_a: f64, kappa_b: f64, sigma_a: f64, sigma_b: f64) -> f64 {
        (0.5 * (sigma_a + sigma_b)).powi(3) * (kappa_a * kappa_b).sqrt()
    }
}

/// The set of strategies used to build cross parameters.
#[derive(Clone)]
pub struct MixingRules {
    pub combining_rule: Arc<dyn CombiningRule>,
    pub multipole: Option<Arc<dyn MultipoleCorrection>>,
    pub association: Arc<dyn AssociationCombiningRule>,
}

impl Default for MixingRules {
    fn default() -> Self {
        Self {
            combining_rule: Arc::new(LafitteCombiningRule),
            multipole: Some(Arc::new(LondonDebyeCorrection)),
            association: Arc::new(ArithmeticEnergy),
        }
    }
}

impl MixingRules {
    pub fn combining_rule<R: CombiningRule + 'static>(mut self, rule: R) -> Self {
        self.combining_rule = Arc::new(rule);
        self
    }

    pub fn multipole<M: MultipoleCorrection + 'static>(mut self, correction: Option<M>) -> Self {
        self.multipole = correction.map(|c| Arc::new(c) as Arc<dyn MultipoleCorrection>);
        self
    }

    pub fn association<R: AssociationCombiningRule + 'static>(mut self, rule: R) -> Self {
        self.association = Arc::new(rule);
        self
    }
}

impl fmt::Debug for MixingRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixingRules")
            .field("multipole", &self.multipole.is_some())
            .finish_non_exhaustive()
    }
}

/// Derive the unlike-pair parameters of two segments.
///
/// The multipole correction is applied if either segment carries multipole
/// data; a missing record counts as a segment without moments. Binary
/// interaction parameters are applied afterwards with
/// [CrossParameters::with_binary_corrections].
pub fn derive_cross_parameters(
    a: &MieSegment,
    b: &MieSegment,
    rules: &MixingRules,
) -> CrossParameters {
    let mut cross = rules.combining_rule.combine(a, b);
    if let Some(correction) = &rules.multipole {
        if a.multipole.is_some() || b.multipole.is_some() {
            let ma = a.multipole.unwrap_or_default();
            let mb = b.multipole.unwrap_or_default();
            cross.epsilon_k *= correction.epsilon_factor(&ma, &mb);
        }
    }
    cross
}
