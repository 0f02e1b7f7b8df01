use super::{DensityInitialization, State, StateHD};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::phase_equilibria::{SolverOptions, Verbosity};
use ndarray::{arr1, arr2, Array1};
use num_dual::linalg::{norm, LU};
use num_dual::{Dual3, Dual64, DualNum};
use std::sync::Arc;

const MAX_ITER_CRIT_POINT: usize = 50;
const TOL_CRIT_POINT: f64 = 1e-8;

/// # Critical points
impl<E: Residual> State<E> {
    /// Calculate the pure component critical point of all components.
    pub fn critical_point_pure(
        eos: &Arc<E>,
        initial_temperature: Option<f64>,
        options: SolverOptions,
    ) -> EosResult<Vec<Self>> {
        (0..eos.components())
            .map(|i| {
                Self::critical_point(&Arc::new(eos.subset(&[i])?), initial_temperature, options)
            })
            .collect()
    }

    /// Calculate the critical point of a pure component.
    ///
    /// The critical point is found by a Newton iteration in temperature and density
    /// on the conditions $\left(\frac{\partial p}{\partial\rho}\right)_T=0$ and
    /// $\left(\frac{\partial^2 p}{\partial\rho^2}\right)_T=0$. Without an initial
    /// temperature, 300 K, 700 K and 500 K are tried in that order.
    pub fn critical_point(
        eos: &Arc<E>,
        initial_temperature: Option<f64>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        if eos.components() != 1 {
            return Err(EosError::IncompatibleComponents(1, eos.components()));
        }
        if let Some(t) = initial_temperature {
            return Self::critical_point_newton(eos, t, options);
        }
        let mut last = None;
        for t in [300.0, 700.0, 500.0] {
            match Self::critical_point_newton(eos, t, options) {
                Ok(s) => return Ok(s),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            EosError::MaxIterationsExceeded(String::from("Critical point"), f64::NAN)
        }))
    }

    fn critical_point_newton(
        eos: &Arc<E>,
        initial_temperature: f64,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_CRIT_POINT, TOL_CRIT_POINT);

        let mut t = initial_temperature;
        let max_density = eos.max_density(None)?;
        let mut rho = 0.3 * max_density;

        log_iter!(
            verbosity,
            " iter |    residual    |   temperature   |       density        "
        );
        log_iter!(verbosity, "{:-<64}", "");
        log_iter!(verbosity, " {:4} |                | {:13.8} | {:12.8e}", 0, t, rho);

        let mut residual = f64::NAN;
        for i in 1..=max_iter {
            // calculate residuals and derivatives w.r.t. temperature and density
            let (t_dual, rho_dual) = (Dual64::from(t), Dual64::from(rho));
            let res_t = critical_point_objective(&**eos, t_dual.derivative(), rho_dual);
            let res_r = critical_point_objective(&**eos, t_dual, rho_dual.derivative());
            let res = arr1(&[res_t[0].re, res_t[1].re]);
            residual = norm(&res);
            if !residual.is_finite() {
                return Err(EosError::IterationFailed(String::from("Critical point")));
            }

            // calculate Newton step
            let h = arr2(&[
                [res_t[0].eps, res_r[0].eps],
                [res_t[1].eps, res_r[1].eps],
            ]);
            let mut delta = LU::new(h)?.solve(&res);

            // reduce step if necessary
            if delta[0].abs() > 0.25 * t {
                delta *= 0.25 * t / delta[0].abs()
            }
            if delta[1].abs() > 0.03 * max_density {
                delta *= 0.03 * max_density / delta[1].abs()
            }

            // apply step
            t -= delta[0];
            rho -= delta[1];
            rho = f64::max(rho, 1e-4 * max_density);

            log_iter!(verbosity, " {:4} | {:14.8e} | {:13.8} | {:12.8e}", i, residual, t, rho);

            // check convergence
            if residual < tol {
                log_result!(
                    verbosity,
                    "Critical point calculation converged in {} step(s)\n",
                    i
                );
                return State::new_pure(eos, t, rho);
            }
        }
        Err(EosError::MaxIterationsExceeded(
            String::from("Critical point"),
            residual,
        ))
    }

    /// Calculate the vapor and liquid spinodal of a pure component at the given temperature.
    pub fn spinodal(
        eos: &Arc<E>,
        temperature: f64,
        options: SolverOptions,
    ) -> EosResult<[Self; 2]> {
        let critical_point = Self::critical_point(eos, None, options)?;
        if temperature >= critical_point.temperature {
            return Err(EosError::SuperCritical);
        }
        let spinodal_vapor =
            Self::calculate_spinodal(eos, temperature, DensityInitialization::Vapor, options)?;
        let rho = 2.0 * critical_point.density - spinodal_vapor.density;
        let spinodal_liquid = Self::calculate_spinodal(
            eos,
            temperature,
            DensityInitialization::InitialDensity(rho),
            options,
        )?;
        Ok([spinodal_vapor, spinodal_liquid])
    }

    fn calculate_spinodal(
        eos: &Arc<E>,
        temperature: f64,
        density_initialization: DensityInitialization,
        options: SolverOptions,
    ) -> EosResult<Self> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_CRIT_POINT, TOL_CRIT_POINT);

        let max_density = eos.max_density(None)?;
        let mut rho = match density_initialization {
            DensityInitialization::Vapor => 1e-5 * max_density,
            DensityInitialization::Liquid => max_density,
            DensityInitialization::InitialDensity(rho) => rho,
            DensityInitialization::None => {
                return Err(EosError::UndeterminedState(String::from(
                    "A spinodal requires a density initialization.",
                )))
            }
        };

        log_iter!(verbosity, " iter |    residual    |       density        ");
        log_iter!(verbosity, "{:-<46}", "");
        log_iter!(verbosity, " {:4} |                | {:12.8e}", 0, rho);

        for i in 1..=max_iter {
            // reduced objective: (dp/drho) / T
            let (_, dp_drho, d2p_drho2) = State::new_pure(eos, temperature, rho)?.d2pdrho2();
            let res = dp_drho / temperature;

            // calculate Newton step
            let mut delta = dp_drho / d2p_drho2;

            // reduce step if necessary
            if delta.abs() > 0.03 * max_density {
                delta *= 0.03 * max_density / delta.abs()
            }

            // apply step
            rho -= delta;
            rho = f64::max(rho, 1e-4 * max_density);

            log_iter!(verbosity, " {:4} | {:14.8e} | {:12.8e}", i, res.abs(), rho);

            // check convergence
            if res.abs() < tol {
                log_result!(verbosity, "Spinodal calculation converged in {} step(s)\n", i);
                return State::new_pure(eos, temperature, rho);
            }
        }
        Err(EosError::SuperCritical)
    }
}

/// Scaled pressure derivatives $\frac{1}{T}\frac{\partial p}{\partial\rho}$ and
/// $\frac{1}{T}\frac{\partial^2 p}{\partial\rho^2}$ of a pure component.
fn critical_point_objective<E: Residual>(
    eos: &E,
    temperature: Dual64,
    density: Dual64,
) -> Array1<Dual64> {
    // unit volume, so that the mole number equals the density
    let t = Dual3::from_re(temperature);
    let rho = Dual3::from_re(density).derivative();
    let state = StateHD::new(t, Dual3::from(1.0), arr1(&[rho]));
    let a = eos.evaluate_residual(&state);
    arr1(&[density * a.v2 + 1.0, a.v2 + density * a.v3])
}
