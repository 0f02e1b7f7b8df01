use super::{Contributions, Derivative::*, State};
use crate::equation_of_state::Residual;
use crate::units::{REFERENCE_MOLAR_ENERGY, REFERENCE_PRESSURE};
use ndarray::{Array1, Array2};

/// # State properties
///
/// All properties are returned in reduced units: energies in K, pressures in K/Å³,
/// densities in Å⁻³.
impl<E: Residual> State<E> {
    fn contributions(ideal_gas: f64, residual: f64, contributions: Contributions) -> f64 {
        match contributions {
            Contributions::IdealGas => ideal_gas,
            Contributions::Total => ideal_gas + residual,
            Contributions::Residual => residual,
        }
    }

    fn derivative1_residual(&self, derivative: super::Derivative) -> f64 {
        let state = self.derive1(derivative);
        (self.eos.evaluate_residual(&state) * state.temperature).eps
    }

    fn derivative2_residual(&self, derivative: super::Derivative) -> f64 {
        let state = self.derive2(derivative);
        (self.eos.evaluate_residual(&state) * state.temperature).v2
    }

    fn derivative2_mixed_residual(
        &self,
        derivative1: super::Derivative,
        derivative2: super::Derivative,
    ) -> f64 {
        let state = self.derive2_mixed(derivative1, derivative2);
        (self.eos.evaluate_residual(&state) * state.temperature).eps1eps2
    }

    /// Residual Helmholtz energy $A^\text{res}$
    pub fn residual_helmholtz_energy(&self) -> f64 {
        self.eos.evaluate_residual(&self.derive0()) * self.temperature
    }

    /// Residual Helmholtz energy $A^\text{res}$ evaluated for each contribution of the equation of state.
    pub fn residual_helmholtz_energy_contributions(&self) -> Vec<(&'static str, f64)> {
        self.eos
            .residual_helmholtz_energy_contributions(&self.derive0())
            .into_iter()
            .map(|(name, a)| (name, a * self.temperature))
            .collect()
    }

    /// Ideal gas Helmholtz energy $A^\text{ig}=k_BT\sum_iN_i\left(\ln\left(\rho_i\Lambda_i^3\right)-1\right)$
    ///
    /// Components with zero moles do not contribute.
    pub fn ideal_gas_helmholtz_energy(&self) -> f64 {
        let ln_lambda3 = self.eos.ln_lambda3(self.temperature);
        self.temperature
            * self
                .partial_density
                .iter()
                .zip(ln_lambda3.iter())
                .zip(self.moles.iter())
                .filter(|((&rho, _), _)| rho > 0.0)
                .map(|((&rho, &l3), &n)| n * (rho.ln() + l3 - 1.0))
                .sum::<f64>()
    }

    /// Helmholtz energy $A$
    pub fn helmholtz_energy(&self, contributions: Contributions) -> f64 {
        let ideal_gas = self.ideal_gas_helmholtz_energy();
        Self::contributions(ideal_gas, self.residual_helmholtz_energy(), contributions)
    }

    /// Residual entropy $S^\text{res}=-\left(\frac{\partial A^\text{res}}{\partial T}\right)_{V,N_i}$
    pub fn residual_entropy(&self) -> f64 {
        -self.derivative1_residual(DT)
    }

    /// Pressure: $p=-\left(\frac{\partial A}{\partial V}\right)_{T,N_i}$
    pub fn pressure(&self, contributions: Contributions) -> f64 {
        let ideal_gas = self.density * self.temperature;
        let residual = -self.derivative1_residual(DV);
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Residual chemical potential: $\mu_i^\text{res}=\left(\frac{\partial A^\text{res}}{\partial N_i}\right)_{T,V,N_j}$
    pub fn residual_chemical_potential(&self) -> Array1<f64> {
        Array1::from_shape_fn(self.eos.components(), |i| self.derivative1_residual(DN(i)))
    }

    /// Compressibility factor: $Z=\frac{pV}{NRT}$
    pub fn compressibility(&self, contributions: Contributions) -> f64 {
        self.pressure(contributions) / (self.density * self.temperature)
    }

    // pressure derivatives

    /// Partial derivative of pressure w.r.t. volume: $\left(\frac{\partial p}{\partial V}\right)_{T,N_i}$
    pub fn dp_dv(&self, contributions: Contributions) -> f64 {
        let ideal_gas = -self.density * self.temperature / self.volume;
        let residual = -self.derivative2_residual(DV);
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Partial derivative of pressure w.r.t. density: $\left(\frac{\partial p}{\partial \rho}\right)_{T,N_i}$
    pub fn dp_drho(&self, contributions: Contributions) -> f64 {
        -self.volume / self.density * self.dp_dv(contributions)
    }

    /// Partial derivative of pressure w.r.t. temperature: $\left(\frac{\partial p}{\partial T}\right)_{V,N_i}$
    pub fn dp_dt(&self, contributions: Contributions) -> f64 {
        let ideal_gas = self.density;
        let residual = -self.derivative2_mixed_residual(DV, DT);
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Partial derivative of pressure w.r.t. moles: $\left(\frac{\partial p}{\partial N_i}\right)_{T,V,N_j}$
    pub fn dp_dni(&self, contributions: Contributions) -> Array1<f64> {
        let ideal_gas = self.temperature / self.volume;
        Array1::from_shape_fn(self.eos.components(), |i| {
            let residual = match contributions {
                Contributions::IdealGas => 0.0,
                _ => -self.derivative2_mixed_residual(DV, DN(i)),
            };
            Self::contributions(ideal_gas, residual, contributions)
        })
    }

    /// Second partial derivative of pressure w.r.t. volume: $\left(\frac{\partial^2 p}{\partial V^2}\right)_{T,N_j}$
    pub fn d2p_dv2(&self, contributions: Contributions) -> f64 {
        let ideal_gas = 2.0 * self.density * self.temperature / (self.volume * self.volume);
        let state = self.derive3(DV);
        let residual = -(self.eos.evaluate_residual(&state) * state.temperature).v3;
        Self::contributions(ideal_gas, residual, contributions)
    }

    /// Second partial derivative of pressure w.r.t. density: $\left(\frac{\partial^2 p}{\partial \rho^2}\right)_{T,N_j}$
    pub fn d2p_drho2(&self, contributions: Contributions) -> f64 {
        self.volume / (self.density * self.density)
            * (self.volume * self.d2p_dv2(contributions) + 2.0 * self.dp_dv(contributions))
    }

    // This function is designed specifically for use in density iterations
    pub(crate) fn p_dpdrho(&self) -> (f64, f64) {
        let state = self.derive2(DV);
        let a = self.eos.evaluate_residual(&state) * state.temperature;
        let p = self.density * self.temperature - a.v1;
        let dp_dv = -self.density * self.temperature / self.volume - a.v2;
        (p, -self.volume * dp_dv / self.density)
    }

    // This function is designed specifically for use in spinodal iterations
    pub(crate) fn d2pdrho2(&self) -> (f64, f64, f64) {
        let state = self.derive3(DV);
        let a = self.eos.evaluate_residual(&state) * state.temperature;
        let p = self.density * self.temperature - a.v1;
        let dp_dv = -self.density * self.temperature / self.volume - a.v2;
        let d2p_dv2 = 2.0 * self.density * self.temperature / (self.volume * self.volume) - a.v3;
        (
            p,
            -self.volume * dp_dv / self.density,
            self.volume / (self.density * self.density) * (2.0 * dp_dv + self.volume * d2p_dv2),
        )
    }

    /// Partial derivative of the residual chemical potential w.r.t. moles: $\left(\frac{\partial\mu_i^\text{res}}{\partial N_j}\right)_{T,V,N_k}$
    pub fn dmu_res_dni(&self) -> Array2<f64> {
        let n = self.eos.components();
        let mut dmu = Array2::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let d = self.derivative2_mixed_residual(DN(i), DN(j));
                dmu[(i, j)] = d;
                dmu[(j, i)] = d;
            }
        }
        dmu
    }

    /// Logarithm of the fugacity coefficient: $\ln\varphi_i=\beta\mu_i^\mathrm{res}\left(T,p,\lbrace N_i\rbrace\right)$
    pub fn ln_phi(&self) -> Array1<f64> {
        let ln_z = self.compressibility(Contributions::Total).ln();
        self.residual_chemical_potential() / self.temperature - ln_z
    }

    /// Partial molar volume: $v_i=\left(\frac{\partial V}{\partial N_i}\right)_{T,p,N_j}$
    pub fn partial_molar_volume(&self) -> Array1<f64> {
        -self.dp_dni(Contributions::Total) / self.dp_dv(Contributions::Total)
    }

    /// Partial derivative of the logarithm of the fugacity coefficient w.r.t. pressure: $\left(\frac{\partial\ln\varphi_i}{\partial p}\right)_{T,N_i}$
    pub fn dln_phi_dp(&self) -> Array1<f64> {
        self.partial_molar_volume() / self.temperature - 1.0 / self.pressure(Contributions::Total)
    }

    /// Partial derivative of the logarithm of the fugacity coefficient w.r.t. moles: $\left(\frac{\partial\ln\varphi_i}{\partial N_j}\right)_{T,p,N_k}$
    pub fn dln_phi_dnj(&self) -> Array2<f64> {
        let n = self.eos.components();
        let dmu_dni = self.dmu_res_dni();
        let dp_dni = self.dp_dni(Contributions::Total);
        let dp_dv = self.dp_dv(Contributions::Total);
        let dp_dn_2 = Array2::from_shape_fn((n, n), |(i, j)| dp_dni[i] * dp_dni[j]);
        (dmu_dni + dp_dn_2 / dp_dv) / self.temperature + 1.0 / self.total_moles
    }

    /// Residual internal energy: $U^\text{res}(T, V, \mathbf{n})=A^\text{res}+TS^\text{res}$
    pub fn residual_internal_energy(&self) -> f64 {
        self.temperature * self.residual_entropy() + self.residual_helmholtz_energy()
    }

    /// Residual Gibbs energy: $G^\text{res}(T,p,\mathbf{n})=A^\text{res}+p^\text{res}V-NRT \ln Z$
    pub fn residual_gibbs_energy(&self) -> f64 {
        self.pressure(Contributions::Residual) * self.volume + self.residual_helmholtz_energy()
            - self.total_moles * self.temperature * self.compressibility(Contributions::Total).ln()
    }

    /// Molar residual Gibbs energy in K.
    pub fn molar_residual_gibbs_energy(&self) -> f64 {
        self.residual_gibbs_energy() / self.total_moles
    }

    /// Hildebrand solubility parameter $\delta=\sqrt{-U^\text{res}/V}$ in MPa^0.5.
    ///
    /// Returns zero for states with positive residual internal energy.
    pub fn hildebrand_solubility_parameter(&self) -> f64 {
        let cohesive_energy_density =
            -self.residual_internal_energy() / self.volume * REFERENCE_PRESSURE;
        (cohesive_energy_density.max(0.0) * 1e-6).sqrt()
    }

    /// Residual chemical potentials in J/mol.
    pub fn residual_chemical_potential_si(&self) -> Array1<f64> {
        self.residual_chemical_potential() * REFERENCE_MOLAR_ENERGY
    }

    /// Pressure in Pa.
    pub fn pressure_si(&self, contributions: Contributions) -> f64 {
        self.pressure(contributions) * REFERENCE_PRESSURE
    }
}
