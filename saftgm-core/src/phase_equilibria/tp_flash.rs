use super::{PhaseEquilibrium, SolverOptions, Verbosity};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{Contributions, DensityInitialization, State};
use ndarray::*;
use num_dual::linalg::norm;
use std::sync::Arc;

const MAX_ITER_TP: usize = 400;
const TOL_TP: f64 = 1e-8;
const MAX_ITER_RR: usize = 50;

/// # Flash calculations
impl<E: Residual> PhaseEquilibrium<E> {
    /// Perform a Tp-flash calculation. If no initial values are
    /// given, the solution is initialized from estimated pure
    /// component vapor pressures.
    pub fn tp_flash(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        feed: &Array1<f64>,
        initial_state: Option<&PhaseEquilibrium<E>>,
        options: SolverOptions,
    ) -> EosResult<Self> {
        State::new_npt(eos, temperature, pressure, feed, DensityInitialization::None)?
            .tp_flash(initial_state, options)
    }
}

/// # Flash calculations
impl<E: Residual> State<E> {
    /// Perform a Tp-flash calculation using the [State] as feed.
    pub fn tp_flash(
        &self,
        initial_state: Option<&PhaseEquilibrium<E>>,
        options: SolverOptions,
    ) -> EosResult<PhaseEquilibrium<E>> {
        let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_TP, TOL_TP);

        let mut new_vle_state = match initial_state {
            Some(init) => init
                .clone()
                .update_pressure(self.temperature, self.pressure(Contributions::Total))?,
            None => PhaseEquilibrium::vle_init_k_values(self)?,
        };

        log_iter!(
            verbosity,
            " iter |    residual    |  phase I mole fractions  |  phase II mole fractions  "
        );
        log_iter!(verbosity, "{:-<77}", "");
        log_iter!(
            verbosity,
            " {:4} |                | {:10.8} | {:10.8}",
            0,
            new_vle_state.vapor().molefracs,
            new_vle_state.liquid().molefracs,
        );

        // 3 steps of successive substitution
        let mut iter = 0;
        new_vle_state.successive_substitution(self, 3, &mut iter, &mut None, tol, verbosity)?;

        // check whether the split lowers the Gibbs energy
        let beta = new_vle_state.vapor_phase_fraction();
        let tpd = [
            self.tangent_plane_distance(new_vle_state.vapor()),
            self.tangent_plane_distance(new_vle_state.liquid()),
        ];
        let dg = (1.0 - beta) * tpd[1] + beta * tpd[0];

        // fix if only tpd[1] is positive
        if tpd[0] < 0.0 && dg >= 0.0 {
            let k = (self.ln_phi() - new_vle_state.vapor().ln_phi()).mapv(f64::exp);
            new_vle_state.update_states(self, &k)?;
            new_vle_state.successive_substitution(self, 1, &mut iter, &mut None, tol, verbosity)?;
        }

        // fix if only tpd[0] is positive
        if tpd[1] < 0.0 && dg >= 0.0 {
            let k = (new_vle_state.liquid().ln_phi() - self.ln_phi()).mapv(f64::exp);
            new_vle_state.update_states(self, &k)?;
            new_vle_state.successive_substitution(self, 1, &mut iter, &mut None, tol, verbosity)?;
        }

        new_vle_state.accelerated_successive_substitution(
            self, &mut iter, max_iter, tol, verbosity,
        )?;

        new_vle_state.check_trivial_solution("tp_flash")
    }

    fn tangent_plane_distance(&self, trial_state: &State<E>) -> f64 {
        let ln_phi_z = self.ln_phi();
        let ln_phi_w = trial_state.ln_phi();
        let z = &self.molefracs;
        let w = &trial_state.molefracs;
        (w * &(w.mapv(f64::ln) + ln_phi_w - z.mapv(f64::ln) - ln_phi_z)).sum()
    }
}

impl<E: Residual> PhaseEquilibrium<E> {
    fn accelerated_successive_substitution(
        &mut self,
        feed_state: &State<E>,
        iter: &mut usize,
        max_iter: usize,
        tol: f64,
        verbosity: Verbosity,
    ) -> EosResult<()> {
        let mut res = f64::NAN;
        for _ in 0..max_iter {
            // do 5 successive substitution steps and check for convergence
            let mut k_vec = Array::zeros((4, self.vapor().eos.components()));
            let history = &mut Some(&mut k_vec);
            match self.successive_substitution(feed_state, 5, iter, history, tol, verbosity)? {
                Ok(()) => {
                    log_result!(
                        verbosity,
                        "Tp flash: calculation converged in {} step(s)\n",
                        iter
                    );
                    return Ok(());
                }
                Err(r) => res = r,
            }

            let gibbs = self.total_gibbs_energy();

            let k = match extrapolate_k_values(&k_vec) {
                Some(k) => k,
                None => continue,
            };

            // accept the extrapolation only if it lowers the Gibbs energy
            let mut trial_vle_state = self.clone();
            if trial_vle_state.update_states(feed_state, &k).is_ok()
                && trial_vle_state.total_gibbs_energy() < gibbs
            {
                *self = trial_vle_state;
            }
        }
        Err(EosError::MaxIterationsExceeded("tp_flash".to_owned(), res))
    }

    /// Returns `Ok(())` on convergence and the last residual otherwise.
    fn successive_substitution(
        &mut self,
        feed_state: &State<E>,
        iterations: usize,
        iter: &mut usize,
        k_vec: &mut Option<&mut Array2<f64>>,
        abs_tol: f64,
        verbosity: Verbosity,
    ) -> EosResult<Result<(), f64>> {
        let mut res = f64::NAN;
        for i in 0..iterations {
            let ln_phi_v = self.vapor().ln_phi();
            let ln_phi_l = self.liquid().ln_phi();
            let k = (&ln_phi_l - &ln_phi_v).mapv(f64::exp);

            // check for convergence
            *iter += 1;
            let res_vec = ln_phi_l - ln_phi_v
                + (&self.liquid().molefracs / &self.vapor().molefracs).map(|&i| {
                    if i > 0.0 {
                        i.ln()
                    } else {
                        0.0
                    }
                });
            res = norm(&res_vec);
            log_iter!(
                verbosity,
                " {:4} | {:14.8e} | {:.8} | {:.8}",
                iter,
                res,
                self.vapor().molefracs,
                self.liquid().molefracs,
            );
            if res < abs_tol {
                return Ok(Ok(()));
            }

            self.update_states(feed_state, &k)?;
            if let Some(k_vec) = k_vec {
                if let Some(row) = history_row(i, iterations) {
                    k_vec
                        .index_axis_mut(Axis(0), row)
                        .assign(&k.map(|ki| if *ki > 0.0 { ki.ln() } else { 0.0 }));
                }
            }
        }
        Ok(Err(res))
    }

    fn update_states(&mut self, feed_state: &State<E>, k: &Array1<f64>) -> EosResult<()> {
        // vapor phase fraction from the Rachford-Rice equation
        let beta = rachford_rice(&feed_state.molefracs, k, Some(self.vapor_phase_fraction()))?;

        let v = &feed_state.moles * &(beta * k / (1.0 - beta + beta * k));
        let l = &feed_state.moles * &((1.0 - beta) / (1.0 - beta + beta * k));
        self.update_moles(feed_state.pressure(Contributions::Total), [&v, &l])?;
        Ok(())
    }

    /// Initial phase split from the compressed-liquid estimate of the
    /// pure component vapor pressures, $K_i=p_i^\mathrm{sat}/p$.
    fn vle_init_k_values(feed_state: &State<E>) -> EosResult<Self> {
        let eos = &feed_state.eos;
        let temperature = feed_state.temperature;
        let pressure = feed_state.pressure(Contributions::Total);
        let k = (0..eos.components())
            .map(|i| {
                let pure = Arc::new(eos.subset(&[i])?);
                let (p_sat, _) =
                    Self::starting_pressure_ideal_gas_bubble(&pure, temperature, &arr1(&[1.0]))?;
                Ok(p_sat / pressure)
            })
            .collect::<EosResult<Array1<f64>>>()?;

        let beta =
            rachford_rice(&feed_state.molefracs, &k, None).map_err(|_| EosError::NoPhaseSplit)?;
        let v = &feed_state.moles * &(beta * &k / (1.0 - beta + beta * &k));
        let l = &feed_state.moles * &((1.0 - beta) / (1.0 - beta + beta * &k));
        let vle = Self::new_npt(eos, temperature, pressure, &v, &l)?;
        if Self::is_trivial_solution(vle.vapor(), vle.liquid()) {
            return Err(EosError::NoPhaseSplit);
        }
        Ok(vle)
    }
}

/// Row of the ln K history written by step `i` of `iterations` successive
/// substitution steps. The last four steps are kept.
fn history_row(i: usize, iterations: usize) -> Option<usize> {
    (i + 4 >= iterations).then(|| i + 4 - iterations)
}

/// Extrapolate the limit of four consecutive ln K vectors (one per row)
/// assuming the differences follow a two term linear recurrence.
///
/// Returns `None` if the recurrence is singular.
fn extrapolate_k_values(ln_k: &Array2<f64>) -> Option<Array1<f64>> {
    let delta_vec = &ln_k.slice(s![1.., ..]) - &ln_k.slice(s![..3, ..]);
    let delta = Array::from_shape_fn((3, 3), |(i, j)| {
        (&delta_vec.index_axis(Axis(0), i) * &delta_vec.index_axis(Axis(0), j)).sum()
    });
    let d = delta[(0, 1)] * delta[(0, 1)] - delta[(0, 0)] * delta[(1, 1)];
    let a = (delta[(0, 2)] * delta[(0, 1)] - delta[(1, 2)] * delta[(0, 0)]) / d;
    let b = (delta[(1, 2)] * delta[(0, 1)] - delta[(0, 2)] * delta[(1, 1)]) / d;

    let (delta_1, delta_2) = (delta_vec.index_axis(Axis(0), 1), delta_vec.index_axis(Axis(0), 2));
    let k = (&ln_k.index_axis(Axis(0), 3) + &((b * &delta_1 + (a + b) * &delta_2) / (1.0 - a - b)))
        .mapv(f64::exp);
    k.iter().all(|k| k.is_finite()).then_some(k)
}

/// Vapor phase fraction from the Rachford-Rice equation
/// $\sum_i z_i\frac{K_i-1}{1-\beta+\beta K_i}=0$.
///
/// Fails if no solution with $0<\beta<1$ exists.
pub(crate) fn rachford_rice(
    feed: &Array1<f64>,
    k: &Array1<f64>,
    beta_in: Option<f64>,
) -> EosResult<f64> {
    rachford_rice_iteration(feed, k, beta_in, MAX_ITER_RR)
}

fn rachford_rice_iteration(
    feed: &Array1<f64>,
    k: &Array1<f64>,
    beta_in: Option<f64>,
    max_iter: usize,
) -> EosResult<f64> {
    const ABS_TOL: f64 = 1e-6;

    // check if solution exists
    let (mut beta_min, mut beta_max) =
        if (feed * k).sum() > 1.0 && (feed / k).iter().filter(|x| !x.is_nan()).sum::<f64>() > 1.0 {
            (0.0, 1.0)
        } else {
            return Err(EosError::IterationFailed(String::from("rachford_rice")));
        };

    // look for tighter bounds
    for (&k, &f) in k.iter().zip(feed.iter()) {
        if k > 1.0 {
            let b = (k * f - 1.0) / (k - 1.0);
            if b > beta_min {
                beta_min = b;
            }
        }
        if k < 1.0 {
            let b = (1.0 - f) / (1.0 - k);
            if b < beta_max {
                beta_max = b;
            }
        }
    }

    // initialize
    let mut beta = 0.5 * (beta_min + beta_max);
    if let Some(b) = beta_in {
        if b > beta_min && b < beta_max {
            beta = b;
        }
    }
    let g = (feed * &(k - 1.0) / (1.0 - beta + beta * k)).sum();
    if g > 0.0 {
        beta_min = beta
    } else {
        beta_max = beta
    }

    // iterate
    let mut dbeta = f64::NAN;
    for _ in 0..max_iter {
        let frac = (k - 1.0) / (1.0 - beta + beta * k);
        let g = (feed * &frac).sum();
        let dg = -(feed * &frac * &frac).sum();
        if g > 0.0 {
            beta_min = beta;
        } else {
            beta_max = beta;
        }

        dbeta = g / dg;
        beta -= dbeta;

        if beta < beta_min || beta > beta_max {
            beta = 0.5 * (beta_min + beta_max);
        }
        if dbeta.abs() < ABS_TOL {
            return Ok(beta);
        }
    }

    Err(EosError::MaxIterationsExceeded(String::from("rachford_rice"), dbeta))
}
