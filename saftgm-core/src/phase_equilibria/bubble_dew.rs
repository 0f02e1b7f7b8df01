use super::{PhaseEquilibrium, SolverOptions, Verbosity};
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{
    validate_molefracs, Contributions,
    DensityInitialization::{InitialDensity, Liquid, Vapor},
    State,
};
use ndarray::*;
use num_dual::linalg::{norm, LU};
use std::sync::Arc;

const MAX_ITER_INNER: usize = 5;
const TOL_INNER: f64 = 1e-9;
const MAX_ITER_OUTER: usize = 400;
const TOL_OUTER: f64 = 1e-10;

const MAX_LNPSTEP: f64 = 0.1;
const NEWTON_TOL: f64 = 1e-3;

/// # Bubble and dew point calculations
impl<E: Residual> PhaseEquilibrium<E> {
    /// Calculate a phase equilibrium for a given temperature
    /// and composition of the liquid phase.
    pub fn bubble_point(
        eos: &Arc<E>,
        temperature: f64,
        liquid_molefracs: &Array1<f64>,
        p_init: Option<f64>,
        vapor_molefracs: Option<&Array1<f64>>,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        Self::bubble_dew_point(
            eos,
            temperature,
            p_init,
            liquid_molefracs,
            vapor_molefracs,
            true,
            options,
        )
    }

    /// Calculate a phase equilibrium for a given temperature
    /// and composition of the vapor phase.
    pub fn dew_point(
        eos: &Arc<E>,
        temperature: f64,
        vapor_molefracs: &Array1<f64>,
        p_init: Option<f64>,
        liquid_molefracs: Option<&Array1<f64>>,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        Self::bubble_dew_point(
            eos,
            temperature,
            p_init,
            vapor_molefracs,
            liquid_molefracs,
            false,
            options,
        )
    }

    fn bubble_dew_point(
        eos: &Arc<E>,
        temperature: f64,
        p_init: Option<f64>,
        molefracs_spec: &Array1<f64>,
        molefracs_init: Option<&Array1<f64>>,
        bubble: bool,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        eos.validate_moles(Some(molefracs_spec))?;
        validate_molefracs(molefracs_spec)?;

        // components absent from the specified phase are absent from the incipient phase
        let present: Vec<usize> = (0..eos.components())
            .filter(|&i| molefracs_spec[i] > 0.0)
            .collect();
        if present.len() < eos.components() {
            return Self::bubble_dew_point_subset(
                eos,
                temperature,
                p_init,
                molefracs_spec,
                molefracs_init,
                bubble,
                options,
                &present,
            );
        }

        // First use given initial pressure if applicable
        if let Some(p) = p_init {
            return Self::iterate_bubble_dew(
                eos,
                temperature,
                p,
                molefracs_spec,
                molefracs_init,
                bubble,
                options,
            );
        }

        // Next try to initialize with an ideal gas assumption
        let vle = Self::starting_pressure_ideal_gas(eos, temperature, molefracs_spec, bubble)
            .and_then(|(p, x)| {
                Self::iterate_bubble_dew(
                    eos,
                    temperature,
                    p,
                    molefracs_spec,
                    molefracs_init.or(Some(&x)),
                    bubble,
                    options,
                )
            });

        // Finally use the spinodal to initialize the calculation
        vle.or_else(|_| {
            Self::iterate_bubble_dew(
                eos,
                temperature,
                Self::starting_pressure_spinodal(eos, temperature, molefracs_spec)?,
                molefracs_spec,
                molefracs_init,
                bubble,
                options,
            )
        })
    }

    /// Solve the bubble or dew point of the components in `present` and
    /// embed the result into the full system with zero moles of all others.
    fn bubble_dew_point_subset(
        eos: &Arc<E>,
        temperature: f64,
        p_init: Option<f64>,
        molefracs_spec: &Array1<f64>,
        molefracs_init: Option<&Array1<f64>>,
        bubble: bool,
        options: (SolverOptions, SolverOptions),
        present: &[usize],
    ) -> EosResult<Self> {
        let reduced = Arc::new(eos.subset(present)?);
        let vle = if present.len() == 1 {
            Self::pure_t(&reduced, temperature, None, options.1)?
        } else {
            let spec = molefracs_spec.select(Axis(0), present);
            let init = molefracs_init
                .map(|x| x.select(Axis(0), present))
                .filter(|x| x.sum() > 0.0)
                .map(|x| &x / x.sum());
            Self::bubble_dew_point(
                &reduced,
                temperature,
                p_init,
                &spec,
                init.as_ref(),
                bubble,
                options,
            )?
        };

        let embed = |state: &State<E>| {
            let mut moles = Array1::zeros(eos.components());
            for (k, &i) in present.iter().enumerate() {
                moles[i] = state.moles[k];
            }
            State::new_nvt(eos, temperature, state.volume, &moles)
        };
        Ok(Self([embed(vle.vapor())?, embed(vle.liquid())?]))
    }

    fn iterate_bubble_dew(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        molefracs_spec: &Array1<f64>,
        molefracs_init: Option<&Array1<f64>>,
        bubble: bool,
        options: (SolverOptions, SolverOptions),
    ) -> EosResult<Self> {
        let [state1, state2] = if bubble {
            starting_x2_bubble(eos, temperature, pressure, molefracs_spec, molefracs_init)
        } else {
            starting_x2_dew(eos, temperature, pressure, molefracs_spec, molefracs_init)
        }?;
        bubble_dew(pressure, state1, state2, bubble, options)
    }

    fn starting_pressure_ideal_gas(
        eos: &Arc<E>,
        temperature: f64,
        molefracs_spec: &Array1<f64>,
        bubble: bool,
    ) -> EosResult<(f64, Array1<f64>)> {
        if bubble {
            Self::starting_pressure_ideal_gas_bubble(eos, temperature, molefracs_spec)
        } else {
            Self::starting_pressure_ideal_gas_dew(eos, temperature, molefracs_spec)
        }
    }

    /// Estimate the bubble pressure and vapor composition from a liquid at
    /// 75% of the maximum density and an ideal gas phase.
    pub(super) fn starting_pressure_ideal_gas_bubble(
        eos: &Arc<E>,
        temperature: f64,
        liquid_molefracs: &Array1<f64>,
    ) -> EosResult<(f64, Array1<f64>)> {
        let m = liquid_molefracs.to_owned();
        let density = 0.75 * eos.max_density(Some(&m))?;
        let liquid = State::new_nvt(eos, temperature, m.sum() / density, &m)?;
        let v_l = liquid.partial_molar_volume();
        let p_l = liquid.pressure(Contributions::Total);
        let mu_l = liquid.residual_chemical_potential();
        let p_i = (liquid_molefracs * temperature * density)
            * ((mu_l - v_l * p_l) / temperature).mapv(f64::exp);
        let p = p_i.sum();
        let y = p_i / p;
        Ok((p, y))
    }

    fn starting_pressure_ideal_gas_dew(
        eos: &Arc<E>,
        temperature: f64,
        vapor_molefracs: &Array1<f64>,
    ) -> EosResult<(f64, Array1<f64>)> {
        let mut p: Option<f64> = None;

        let mut x = vapor_molefracs.clone();
        for _ in 0..5 {
            let density = 0.75 * eos.max_density(Some(&x))?;
            let liquid = State::new_nvt(eos, temperature, x.sum() / density, &x)?;
            let v_l = liquid.partial_molar_volume();
            let p_l = liquid.pressure(Contributions::Total);
            let mu_l = liquid.residual_chemical_potential();
            let k = vapor_molefracs / ((mu_l - v_l * p_l) / temperature).mapv(f64::exp);
            let p_new = temperature * density / k.sum();
            x = &k / k.sum();
            if let Some(p_old) = p {
                if ((p_new - p_old) / p_old).abs() < 1e-5 {
                    p = Some(p_new);
                    break;
                }
            }
            p = Some(p_new);
        }
        p.map(|p| (p, x)).ok_or_else(|| {
            EosError::IterationFailed(String::from("starting_pressure_ideal_gas_dew"))
        })
    }

    /// Mean of the (non-negative) liquid and the vapor spinodal pressure.
    pub(super) fn starting_pressure_spinodal(
        eos: &Arc<E>,
        temperature: f64,
        molefracs: &Array1<f64>,
    ) -> EosResult<f64> {
        if eos.components() == 1 {
            let [sp_v, sp_l] = State::spinodal(eos, temperature, SolverOptions::default())?;
            let pv = sp_v.pressure(Contributions::Total);
            let pl = sp_l.pressure(Contributions::Total);
            return Ok(0.5 * (pl.max(0.0) + pv));
        }
        // mixtures: mole-fraction weighted pure component spinodal estimates
        let mut p = 0.0;
        for (i, &x) in molefracs.iter().enumerate() {
            if x > 0.0 {
                let pure = Arc::new(eos.subset(&[i])?);
                p += x * Self::starting_pressure_spinodal(&pure, temperature, &arr1(&[1.0]))?;
            }
        }
        Ok(p)
    }
}

fn starting_x2_bubble<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    liquid_molefracs: &Array1<f64>,
    vapor_molefracs: Option<&Array1<f64>>,
) -> EosResult<[State<E>; 2]> {
    let liquid_state = State::new_npt(eos, temperature, pressure, liquid_molefracs, Liquid)?;
    let xv = match vapor_molefracs {
        Some(xv) => xv.clone(),
        None => liquid_state.ln_phi().mapv(f64::exp) * liquid_molefracs,
    };
    let vapor_state = State::new_npt(eos, temperature, pressure, &xv, Vapor)?;
    Ok([liquid_state, vapor_state])
}

fn starting_x2_dew<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    vapor_molefracs: &Array1<f64>,
    liquid_molefracs: Option<&Array1<f64>>,
) -> EosResult<[State<E>; 2]> {
    let vapor_state = State::new_npt(eos, temperature, pressure, vapor_molefracs, Vapor)?;
    let xl = match liquid_molefracs {
        Some(xl) => xl.clone(),
        None => {
            let xl = vapor_state.ln_phi().mapv(f64::exp) * vapor_molefracs;
            let liquid_state = State::new_npt(eos, temperature, pressure, &xl, Liquid)?;
            (vapor_state.ln_phi() - liquid_state.ln_phi()).mapv(f64::exp) * vapor_molefracs
        }
    };
    let liquid_state = State::new_npt(eos, temperature, pressure, &xl, Liquid)?;
    Ok([vapor_state, liquid_state])
}

fn bubble_dew<E: Residual>(
    mut pressure: f64,
    mut state1: State<E>,
    mut state2: State<E>,
    bubble: bool,
    options: (SolverOptions, SolverOptions),
) -> EosResult<PhaseEquilibrium<E>> {
    let (options_inner, options_outer) = options;
    let temperature = state1.temperature;
    let tol_outer = options_outer.tol.unwrap_or(TOL_OUTER);

    let mut err_out = 1.0;
    let mut k_out = 0;

    if PhaseEquilibrium::is_trivial_solution(&state1, &state2) {
        log_iter!(options_outer.verbosity, "Trivial solution encountered!");
        return Err(EosError::PhaseCollapse(String::from("bubble_dew")));
    }

    log_iter!(
        options_outer.verbosity,
        "res outer loop | res inner loop |     pressure     | molefracs second phase",
    );
    log_iter!(options_outer.verbosity, "{:-<85}", "");
    log_iter!(
        options_outer.verbosity,
        "{:14} | {:14} | {:12.8e} | {:.8}",
        "",
        "",
        pressure,
        state2.molefracs
    );

    // Outer loop for finding x2
    for ko in 0..options_outer.max_iter.unwrap_or(MAX_ITER_OUTER) {
        err_out = if err_out > NEWTON_TOL {
            // Inner loop for finding p
            for _ in 0..options_inner.max_iter.unwrap_or(MAX_ITER_INNER) {
                if adjust_p(
                    temperature,
                    &mut pressure,
                    &mut state1,
                    &mut state2,
                    options_inner.verbosity,
                )? < options_inner.tol.unwrap_or(TOL_INNER)
                {
                    break;
                }
            }
            adjust_x2(&state1, &mut state2, options_outer.verbosity)
        } else {
            newton_step(&mut pressure, &mut state1, &mut state2, options_outer.verbosity)
        }?;

        if PhaseEquilibrium::is_trivial_solution(&state1, &state2) {
            log_iter!(options_outer.verbosity, "Trivial solution encountered!");
            return Err(EosError::PhaseCollapse(String::from("bubble_dew")));
        }

        if err_out < tol_outer {
            k_out = ko + 1;
            break;
        }
    }

    if err_out < tol_outer {
        log_result!(
            options_outer.verbosity,
            "Bubble/dew point: calculation converged in {} step(s)\n",
            k_out
        );
        if bubble {
            Ok(PhaseEquilibrium([state2, state1]))
        } else {
            Ok(PhaseEquilibrium([state1, state2]))
        }
    } else {
        Err(EosError::MaxIterationsExceeded(
            String::from("bubble-dew-iteration"),
            err_out,
        ))
    }
}

/// Newton step on $\sum_i x_i K_i=1$ in $\ln p$.
fn adjust_p<E: Residual>(
    temperature: f64,
    pressure: &mut f64,
    state1: &mut State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    // K = phi_1/phi_2 = x_2/x_1
    let ln_phi_1 = state1.ln_phi();
    let ln_phi_2 = state2.ln_phi();
    let k = (&ln_phi_1 - &ln_phi_2).mapv(f64::exp);

    let f = (&state1.molefracs * &k).sum() - 1.0;

    // derivative w.r.t. ln(pressure)
    let ln_phi_1_dp = state1.dln_phi_dp();
    let ln_phi_2_dp = state2.dln_phi_dp();
    let df = ((ln_phi_1_dp - ln_phi_2_dp) * *pressure * &state1.molefracs * &k).sum();
    let lnpstep = (-f / df).clamp(-MAX_LNPSTEP, MAX_LNPSTEP);
    if !lnpstep.is_finite() {
        return Err(EosError::IterationFailed(String::from("bubble_dew")));
    }

    *pressure *= lnpstep.exp();
    adjust_states(temperature, *pressure, state1, state2, None)?;

    log_iter!(
        verbosity,
        "{:14} | {:<14.8e} | {:12.8e} | {:.8}",
        "",
        f.abs(),
        pressure,
        state2.molefracs
    );

    Ok(f.abs())
}

/// Total chemical potential derivative $\left(\frac{\partial\mu_i}{\partial N_j}\right)_{T,V}$ in K.
fn dmu_dni<E: Residual>(state: &State<E>) -> Array2<f64> {
    let mut dmu = state.dmu_res_dni();
    for (i, &n) in state.moles.iter().enumerate() {
        dmu[(i, i)] += state.temperature / n;
    }
    dmu
}

/// Simultaneous Newton step in the density of the specified phase and the
/// partial densities of the incipient phase.
fn newton_step<E: Residual>(
    pressure: &mut f64,
    state1: &mut State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    let dmu_drho_1 = (dmu_dni(state1) * state1.volume).dot(&state1.molefracs);
    let dmu_drho_2 = dmu_dni(state2) * state2.volume;
    let dp_drho_1 = (state1.dp_dni(Contributions::Total) * state1.volume).dot(&state1.molefracs);
    let dp_drho_2 = state2.dp_dni(Contributions::Total) * state2.volume;
    let mu_1_res = state1.residual_chemical_potential();
    let mu_2_res = state2.residual_chemical_potential();
    let p_1 = state1.pressure(Contributions::Total);
    let p_2 = state2.pressure(Contributions::Total);

    // residual
    let dmu_ig =
        state1.temperature * (&state1.partial_density / &state2.partial_density).mapv(f64::ln);
    let res = concatenate![Axis(0), mu_1_res - mu_2_res + dmu_ig, arr1(&[p_1 - p_2])];
    let error = norm(&res);

    // Jacobian
    let jacobian = concatenate![
        Axis(1),
        concatenate![Axis(0), -dmu_drho_2, -dp_drho_2.insert_axis(Axis(0))],
        concatenate![
            Axis(0),
            dmu_drho_1.insert_axis(Axis(1)),
            arr2(&[[dp_drho_1]])
        ]
    ];

    let dx = LU::new(jacobian)?.solve(&res);

    let rho_1 = state1.density - dx[dx.len() - 1];
    let rho_2 = &state2.partial_density - &dx.slice(s![0..-1]);

    *state1 = State::new_trho(&state1.eos, state1.temperature, rho_1, &state1.molefracs)?;
    *state2 = State::new_nvt(&state2.eos, state2.temperature, 1.0, &rho_2)?;
    *pressure = state1.pressure(Contributions::Total);
    log_iter!(
        verbosity,
        "{:<14.8e} | {:14} | {:12.8e} | {:.8} NEWTON",
        error,
        "",
        pressure,
        state2.molefracs
    );
    Ok(error)
}

fn adjust_states<E: Residual>(
    temperature: f64,
    pressure: f64,
    state1: &mut State<E>,
    state2: &mut State<E>,
    moles_state2: Option<&Array1<f64>>,
) -> EosResult<()> {
    *state1 = State::new_npt(
        &state1.eos,
        temperature,
        pressure,
        &state1.moles,
        InitialDensity(state1.density),
    )?;
    *state2 = State::new_npt(
        &state2.eos,
        temperature,
        pressure,
        moles_state2.unwrap_or(&state2.moles),
        InitialDensity(state2.density),
    )?;
    Ok(())
}

/// Successive substitution step for the composition of the incipient phase.
fn adjust_x2<E: Residual>(
    state1: &State<E>,
    state2: &mut State<E>,
    verbosity: Verbosity,
) -> EosResult<f64> {
    let x1 = &state1.molefracs;
    let ln_phi_1 = state1.ln_phi();
    let ln_phi_2 = state2.ln_phi();
    let k = (ln_phi_1 - ln_phi_2).mapv(f64::exp);
    let err_out = (&k * x1 / &state2.molefracs - 1.0).mapv(f64::abs).sum();
    let x2 = (x1 * &k) / (&k * x1).sum();
    log_iter!(verbosity, "{:<14.8e} | {:14} | {:16} |", err_out, "", "");
    *state2 = State::new_npt(
        &state2.eos,
        state2.temperature,
        state2.pressure(Contributions::Total),
        &x2,
        InitialDensity(state2.density),
    )?;
    Ok(err_out)
}
