//! Density roots of the equation of state at given temperature and pressure.
//!
//! Two solvers are available: a local Newton iteration with corrections for
//! unstable regions ([density_iteration]) that is used whenever a good
//! initial value exists, and a bracketing solver ([solve_density]) that
//! scans the whole physically allowed density range and returns every
//! mechanically stable root.
use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::phase_equilibria::{SolverOptions, Verbosity};
use crate::state::State;
use crate::units::REFERENCE_PRESSURE;
use ndarray::Array1;
use std::sync::Arc;

/// Highest packing fraction scanned by [solve_density].
const MAX_SCAN_PACKING_FRACTION: f64 = 0.70;
const GRID_POINTS_LOW: usize = 60;
const GRID_POINTS_HIGH: usize = 140;
const MAX_ITER_BRACKET: usize = 100;
const TOL_BRACKET: f64 = 1e-10;

/// Which root to prefer if several densities reproduce the pressure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseHint {
    /// The lowest stable density.
    Vapor,
    /// The highest stable density.
    Liquid,
    /// No preference; all stable roots are returned.
    None,
}

/// Result of a density root search. All densities in Å⁻³.
#[derive(Clone, Debug, PartialEq)]
pub enum DensityRoots {
    Vapor(f64),
    Liquid(f64),
    Unique(f64),
    /// Several mechanically stable roots in increasing order.
    Multiple(Vec<f64>),
}

impl DensityRoots {
    /// The density if the result is unambiguous.
    pub fn single(&self) -> EosResult<f64> {
        match self {
            Self::Vapor(rho) | Self::Liquid(rho) | Self::Unique(rho) => Ok(*rho),
            Self::Multiple(roots) => Err(EosError::MultipleRootsAmbiguous(roots.len())),
        }
    }

    /// The root closest to `density`.
    pub fn closest(&self, density: f64) -> f64 {
        match self {
            Self::Vapor(rho) | Self::Liquid(rho) | Self::Unique(rho) => *rho,
            Self::Multiple(roots) => roots.iter().fold(roots[0], |acc, &rho| {
                if (rho - density).abs() < (acc - density).abs() {
                    rho
                } else {
                    acc
                }
            }),
        }
    }

    /// All roots in increasing order.
    pub fn roots(&self) -> Vec<f64> {
        match self {
            Self::Vapor(rho) | Self::Liquid(rho) | Self::Unique(rho) => vec![*rho],
            Self::Multiple(roots) => roots.clone(),
        }
    }
}

/// Find the density (Å⁻³) at which the pressure (K/Å³) of a mixture with
/// mole fractions `molefracs` equals `pressure`.
///
/// The density axis is scanned from the ideal gas limit up to a packing
/// fraction of 0.70, geometrically at low and linearly at high densities.
/// Every sign change of $p(\rho)-p$ is refined with a safeguarded
/// Newton-bisection iteration. Roots with $\partial p/\partial\rho<0$ are
/// discarded.
pub fn solve_density<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    molefracs: &Array1<f64>,
    hint: PhaseHint,
    options: SolverOptions,
) -> EosResult<DensityRoots> {
    let (max_iter, tol, verbosity) = options.unwrap_or(MAX_ITER_BRACKET, TOL_BRACKET);
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(EosError::InvalidState(
            String::from("solve_density"),
            String::from("temperature"),
            temperature,
        ));
    }
    if !(pressure.is_finite() && pressure > 0.0) {
        return Err(EosError::InvalidState(
            String::from("solve_density"),
            String::from("pressure"),
            pressure,
        ));
    }
    eos.validate_moles(Some(molefracs))?;

    // the packing fraction is linear in the density at fixed composition
    let eta_per_density = eos.packing_fraction(temperature, molefracs);
    let rho_limit = MAX_SCAN_PACKING_FRACTION / eta_per_density;
    let rho_low = (0.1 * pressure / temperature).min(1e-3 * rho_limit);

    let residual = |rho: f64| -> (f64, f64) {
        let (p, dp_drho) =
            State::new_nvt_unchecked(eos, temperature, 1.0 / rho, molefracs).p_dpdrho();
        (p - pressure, dp_drho)
    };

    let grid = density_grid(rho_low, rho_limit);
    let mut roots = Vec::new();
    let mut last = (grid[0], residual(grid[0]).0);
    for &rho in grid.iter().skip(1) {
        let f = residual(rho).0;
        if !f.is_finite() {
            break;
        }
        if last.1 == 0.0 {
            roots.push(last.0);
        } else if last.1.signum() != f.signum() {
            let root = bracketed_newton(&residual, last.0, rho, last.1, max_iter, tol)?;
            log_iter!(verbosity, " root bracketed in [{:e}, {:e}]: {:e}", last.0, rho, root);
            roots.push(root);
        }
        last = (rho, f);
    }

    let stable: Vec<f64> = roots.into_iter().filter(|&rho| residual(rho).1 > 0.0).collect();
    log_result!(
        verbosity,
        "solve_density: {} stable root(s) at T = {} K",
        stable.len(),
        temperature
    );

    match (stable.first(), stable.last()) {
        (Some(&vapor), Some(&liquid)) => Ok(match hint {
            PhaseHint::Vapor => DensityRoots::Vapor(vapor),
            PhaseHint::Liquid => DensityRoots::Liquid(liquid),
            PhaseHint::None if stable.len() == 1 => DensityRoots::Unique(vapor),
            PhaseHint::None => DensityRoots::Multiple(stable),
        }),
        _ => Err(EosError::NoRealRoot(temperature, pressure * REFERENCE_PRESSURE)),
    }
}

fn density_grid(rho_low: f64, rho_limit: f64) -> Vec<f64> {
    let rho_switch = 0.01 * rho_limit;
    let mut grid = Vec::with_capacity(GRID_POINTS_LOW + GRID_POINTS_HIGH + 1);
    if rho_low < rho_switch {
        let ratio = (rho_switch / rho_low).powf(1.0 / GRID_POINTS_LOW as f64);
        grid.extend((0..GRID_POINTS_LOW).map(|i| rho_low * ratio.powi(i as i32)));
    }
    let start = rho_low.max(rho_switch);
    let step = (rho_limit - start) / GRID_POINTS_HIGH as f64;
    grid.extend((0..=GRID_POINTS_HIGH).map(|i| start + step * i as f64));
    grid
}

/// Newton iteration that falls back to bisection whenever a step leaves the bracket.
fn bracketed_newton<F: Fn(f64) -> (f64, f64)>(
    f: &F,
    mut a: f64,
    mut b: f64,
    fa: f64,
    max_iter: usize,
    tol: f64,
) -> EosResult<f64> {
    let mut rho = 0.5 * (a + b);
    let mut res = f64::NAN;
    for _ in 0..max_iter {
        let (fr, dfr) = f(rho);
        res = fr;
        if fr.signum() == fa.signum() {
            a = rho;
        } else {
            b = rho;
        }
        let mut next = rho - fr / dfr;
        if !next.is_finite() || next <= a.min(b) || next >= a.max(b) {
            next = 0.5 * (a + b);
        }
        if (next - rho).abs() < tol * rho {
            return Ok(next);
        }
        rho = next;
    }
    Err(EosError::MaxIterationsExceeded(String::from("solve_density"), res))
}

/// Newton iteration for the density at given temperature and pressure
/// starting from `initial_density`.
///
/// If the iteration enters the mechanically unstable region, the density is
/// moved across the appropriate spinodal before the iteration continues.
pub fn density_iteration<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    pressure: f64,
    moles: &Array1<f64>,
    initial_density: f64,
) -> EosResult<State<E>> {
    let maxdensity = eos.max_density(Some(moles))?;
    let (abstol, reltol) = (1e-12, 1e-14);
    let n = moles.sum();

    let mut rho = initial_density;
    if rho <= 0.0 {
        return Err(EosError::InvalidState(
            String::from("density iteration"),
            String::from("density"),
            rho,
        ));
    }

    let maxiter = 50;
    let mut error = f64::NAN;
    let mut converged = false;
    'iteration: for k in 0..maxiter {
        let (mut p, mut dp_drho) = State::new_nvt(eos, temperature, n / rho, moles)?.p_dpdrho();

        // attempt to correct for poor initial density
        if dp_drho.is_sign_negative() && k == 0 {
            rho = if initial_density <= 0.15 * maxdensity {
                0.05 * initial_density
            } else {
                (1.1 * initial_density).min(maxdensity)
            };
            (p, dp_drho) = State::new_nvt(eos, temperature, n / rho, moles)?.p_dpdrho();
        }

        error = p - pressure;

        let mut delta_rho = -error / dp_drho;
        if delta_rho.abs() > 0.075 * maxdensity {
            delta_rho = 0.075 * maxdensity * delta_rho.signum();
        };
        delta_rho = delta_rho.max(-0.95 * rho);

        // correction for the unstable region
        if dp_drho.is_sign_negative() {
            let d2pdrho2 = State::new_nvt(eos, temperature, n / rho, moles)?
                .d2pdrho2()
                .2;

            if rho > 0.85 * maxdensity {
                let (sp_p, sp_rho) = pressure_spinodal(eos, temperature, initial_density, moles)?;
                rho = sp_rho;
                error = sp_p - pressure;
                if rho > 0.85 * maxdensity {
                    if error.is_sign_negative() {
                        return Err(EosError::IterationFailed(String::from("density_iteration")));
                    } else {
                        rho *= 0.98
                    }
                } else if error.is_sign_positive() {
                    rho = 0.001 * maxdensity
                } else {
                    rho = (rho * 1.1).min(maxdensity)
                }
            } else if error.is_sign_positive() && d2pdrho2.is_sign_positive() {
                let (sp_p, sp_rho) = pressure_spinodal(eos, temperature, initial_density, moles)?;
                rho = sp_rho;
                error = sp_p - pressure;
                if error.is_sign_positive() {
                    rho = 0.001 * maxdensity
                } else {
                    rho = (rho * 1.1).min(maxdensity)
                }
            } else if error.is_sign_negative() && d2pdrho2.is_sign_negative() {
                let (sp_p, sp_rho) = pressure_spinodal(eos, temperature, initial_density, moles)?;
                rho = sp_rho;
                error = sp_p - pressure;
                if error.is_sign_negative() {
                    rho = 0.8 * maxdensity
                } else {
                    rho *= 0.8
                }
            } else if error.is_sign_negative() && d2pdrho2.is_sign_positive() {
                let (_, rho_l) = pressure_spinodal(eos, temperature, 0.8 * maxdensity, moles)?;
                let (sp_v_p, rho_v) =
                    pressure_spinodal(eos, temperature, 0.001 * maxdensity, moles)?;
                error = sp_v_p - pressure;
                if error.is_sign_positive()
                    && (initial_density - rho_v).abs() < (initial_density - rho_l).abs()
                {
                    rho = 0.8 * rho_v
                } else {
                    rho = (rho_l * 1.1).min(maxdensity)
                }
            } else if error.is_sign_positive() && d2pdrho2.is_sign_negative() {
                let (_, rho_l) = pressure_spinodal(eos, temperature, 0.8 * maxdensity, moles)?;
                let (sp_v_p, rho_v) =
                    pressure_spinodal(eos, temperature, 0.001 * maxdensity, moles)?;
                error = sp_v_p - pressure;
                if error.is_sign_negative()
                    && (initial_density - rho_v).abs() > (initial_density - rho_l).abs()
                {
                    rho = (rho_l * 1.1).min(maxdensity)
                } else {
                    rho = 0.8 * rho_v
                }
            } else {
                rho = (rho + initial_density) * 0.5;
                if (rho - initial_density).abs() < 1e-8 {
                    rho = (rho + 0.1 * maxdensity).min(maxdensity)
                }
            }
            continue 'iteration;
        }
        // Newton step
        rho += delta_rho;
        if error.abs() < f64::max(abstol, rho * reltol) {
            converged = true;
            break 'iteration;
        }
    }
    if converged {
        State::new_nvt(eos, temperature, n / rho, moles)
    } else {
        Err(EosError::MaxIterationsExceeded(
            String::from("density_iteration"),
            error,
        ))
    }
}

/// Density and pressure of the spinodal closest to `rho_init`.
fn pressure_spinodal<E: Residual>(
    eos: &Arc<E>,
    temperature: f64,
    rho_init: f64,
    moles: &Array1<f64>,
) -> EosResult<(f64, f64)> {
    let maxiter = 30;
    let abstol = 1e-8;

    let maxdensity = eos.max_density(Some(moles))?;
    let n = moles.sum();
    let mut rho = rho_init;

    if rho <= 0.0 {
        return Err(EosError::InvalidState(
            String::from("pressure spinodal"),
            String::from("density"),
            rho,
        ));
    }

    let mut dpdrho = f64::NAN;
    for _ in 0..maxiter {
        let (p, dp, d2pdrho2) = State::new_nvt(eos, temperature, n / rho, moles)?.d2pdrho2();
        dpdrho = dp;

        let mut delta_rho = -dpdrho / d2pdrho2;
        if delta_rho.abs() > 0.05 * maxdensity {
            delta_rho = 0.05 * maxdensity * delta_rho.signum()
        }
        delta_rho = delta_rho.max(-rho * 0.95);
        delta_rho = delta_rho.min(maxdensity - rho);
        rho += delta_rho;

        if dpdrho.abs() < abstol {
            return Ok((p, rho));
        }
    }
    Err(EosError::MaxIterationsExceeded(
        String::from("pressure_spinodal"),
        dpdrho,
    ))
}
