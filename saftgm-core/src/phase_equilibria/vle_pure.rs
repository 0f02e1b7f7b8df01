use super::{PhaseEquilibrium, SolverOptions, Verbosity};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{Contributions, State};
use ndarray::arr1;
use std::sync::Arc;

const MAX_ITER_PURE: usize = 50;
const TOL_PURE: f64 = 1e-12;

/// # Pure component phase equilibria
impl<E: Residual> PhaseEquilibrium<E> {
    /// Calculate the vapor-liquid equilibrium of a pure component
    /// at the given temperature.
    ///
    /// The iteration is started from the given initial state if provided,
    /// otherwise from an ideal gas estimate of the vapor pressure and,
    /// if that fails, from the spinodal pressures.
    pub fn pure_t(
        eos: &Arc<E>,
        temperature: f64,
        initial_state: Option<&PhaseEquilibrium<E>>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        if eos.components() != 1 {
            return Err(EosError::IncompatibleComponents(1, eos.components()));
        }
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_PURE, TOL_PURE);

        let mut vle = initial_state.and_then(|init| {
            Self::init_pure_state(init, temperature)
                .and_then(|vle| vle.iterate_pure_t(max_iter, tol, verbosity))
                .ok()
        });

        vle = vle.or_else(|| {
            Self::init_pure_ideal_gas(eos, temperature)
                .and_then(|vle| vle.iterate_pure_t(max_iter, tol, verbosity))
                .ok()
        });

        vle.map_or_else(
            || {
                Self::init_pure_spinodal(eos, temperature)
                    .and_then(|vle| vle.iterate_pure_t(max_iter, tol, verbosity))
            },
            Ok,
        )
    }

    fn iterate_pure_t(self, max_iter: usize, tol: f64, verbosity: Verbosity) -> EosResult<Self> {
        let mut p_old = self.vapor().pressure(Contributions::Total);
        let [mut vapor, mut liquid] = self.0;

        log_iter!(verbosity,
            " iter |     residual      |     pressure     |    liquid density    |    vapor density     | Newton steps"
        );
        log_iter!(verbosity, "{:-<106}", "");
        log_iter!(
            verbosity,
            " {:4} |                   | {:12.8e} | {:12.8e} | {:12.8e} |",
            0,
            p_old,
            liquid.density,
            vapor.density
        );

        let mut res = f64::NAN;
        for i in 1..=max_iter {
            let (p_l, p_rho_l) = liquid.p_dpdrho();
            let (p_v, p_rho_v) = vapor.p_dpdrho();
            let a_l_res = liquid.residual_helmholtz_energy() / liquid.total_moles;
            let a_v_res = vapor.residual_helmholtz_energy() / vapor.total_moles;

            // Maxwell construction for the new pressure
            let kt = vapor.temperature;
            let delta_v = 1.0 / vapor.density - 1.0 / liquid.density;
            let delta_a = a_v_res - a_l_res + kt * (vapor.density / liquid.density).ln();
            let mut p_new = -delta_a / delta_v;

            // a negative estimate is replaced by the ideal gas result, which is always positive
            if p_new.is_sign_negative() {
                p_new = p_v * ((-delta_a - p_v / vapor.density) / kt).exp();
            }

            // refine using the almost ideal behavior of the vapor
            let mut newton_iter = 0;
            let newton_tol = p_old * delta_v * tol;
            for _ in 0..20 {
                let p_frac = p_new / p_old;
                let f = p_new * delta_v + delta_a + (p_frac.ln() + 1.0 - p_frac) * kt;
                let df_dp = delta_v + (1.0 / p_new - 1.0 / p_old) * kt;
                p_new -= f / df_dp;
                newton_iter += 1;
                if f.abs() < newton_tol {
                    break;
                }
            }

            if !p_new.is_finite() {
                return Err(EosError::IterationFailed("pure_t".to_owned()));
            }

            // Newton steps for both densities
            let rho_l = liquid.density + (p_new - p_l) / p_rho_l;
            let rho_v = vapor.density + (p_new - p_v) / p_rho_v;
            liquid = State::new_pure(&liquid.eos, liquid.temperature, rho_l)?;
            vapor = State::new_pure(&vapor.eos, vapor.temperature, rho_v)?;
            if Self::is_trivial_solution(&vapor, &liquid) {
                return Err(EosError::PhaseCollapse("pure_t".to_owned()));
            }

            res = (p_new - p_old).abs();
            log_iter!(
                verbosity,
                " {:4} | {:14.8e} | {:12.8e} | {:12.8e} | {:12.8e} | {}",
                i,
                res,
                p_new,
                liquid.density,
                vapor.density,
                newton_iter
            );
            if res < p_old * tol {
                log_result!(
                    verbosity,
                    "PhaseEquilibrium::pure_t: calculation converged in {} step(s)\n",
                    i
                );
                return Ok(Self([vapor, liquid]));
            }
            p_old = p_new;
        }
        Err(EosError::MaxIterationsExceeded("pure_t".to_owned(), res))
    }

    fn init_pure_state(initial_state: &Self, temperature: f64) -> EosResult<Self> {
        let vapor = initial_state.vapor().update_temperature(temperature)?;
        let liquid = initial_state.liquid().update_temperature(temperature)?;
        Ok(Self([vapor, liquid]))
    }

    fn init_pure_ideal_gas(eos: &Arc<E>, temperature: f64) -> EosResult<Self> {
        let m = arr1(&[1.0]);
        let p = Self::starting_pressure_ideal_gas_bubble(eos, temperature, &m)?.0;
        PhaseEquilibrium::new_npt(eos, temperature, p, &m, &m)?.check_trivial_solution("pure_t")
    }

    fn init_pure_spinodal(eos: &Arc<E>, temperature: f64) -> EosResult<Self> {
        let m = arr1(&[1.0]);
        let p = Self::starting_pressure_spinodal(eos, temperature, &m)?;
        PhaseEquilibrium::new_npt(eos, temperature, p, &m, &m)
    }
}

impl<E: Residual> PhaseEquilibrium<E> {
    /// Calculate the pure component vapor pressures (K/Å³) of all
    /// components in the system for the given temperature.
    ///
    /// Components that are supercritical or for which the iteration fails yield `None`.
    pub fn vapor_pressure(eos: &Arc<E>, temperature: f64) -> Vec<Option<f64>> {
        (0..eos.components())
            .map(|i| {
                let pure_eos = Arc::new(eos.subset(&[i]).ok()?);
                PhaseEquilibrium::pure_t(&pure_eos, temperature, None, SolverOptions::default())
                    .map(|vle| vle.vapor().pressure(Contributions::Total))
                    .ok()
            })
            .collect()
    }

    /// Calculate the pure component phase equilibria of all
    /// components in the system at the given temperature.
    pub fn vle_pure_comps(eos: &Arc<E>, temperature: f64) -> Vec<Option<PhaseEquilibrium<E>>> {
        (0..eos.components())
            .map(|i| {
                let pure_eos = Arc::new(eos.subset(&[i]).ok()?);
                PhaseEquilibrium::pure_t(&pure_eos, temperature, None, SolverOptions::default())
                    .ok()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::VanDerWaals;
    use approx::assert_relative_eq;

    #[test]
    fn coexisting_phases_are_in_equilibrium() -> EosResult<()> {
        let eos = Arc::new(VanDerWaals::standard());
        let vle = PhaseEquilibrium::pure_t(&eos, 330.0, None, SolverOptions::default())?;
        let (v, l) = (vle.vapor(), vle.liquid());
        assert!(v.density < l.density);
        assert_relative_eq!(
            v.pressure(Contributions::Total),
            l.pressure(Contributions::Total),
            max_relative = 1e-8
        );
        let mu = |s: &State<VanDerWaals>| {
            s.residual_chemical_potential()[0] + s.temperature * s.density.ln()
        };
        assert_relative_eq!(mu(v), mu(l), max_relative = 1e-8);
        Ok(())
    }

    #[test]
    fn supercritical_vapor_pressure_is_none() {
        let eos = Arc::new(VanDerWaals::standard());
        assert!(PhaseEquilibrium::vapor_pressure(&eos, 450.0)[0].is_none());
        assert!(PhaseEquilibrium::vapor_pressure(&eos, 330.0)[0].is_some());
    }
}
