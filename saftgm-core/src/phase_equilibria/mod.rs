use crate::equation_of_state::Residual;
use crate::errors::{EosError, EosResult};
use crate::state::{DensityInitialization, State};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

mod bubble_dew;
mod equilibrium;
mod tp_flash;
mod vle_pure;
pub use equilibrium::{phase_properties, solve_equilibrium, EquilibriumSpec, PhaseResult, PhaseTag};

/// Level of detail in the iteration output.
#[derive(Copy, Clone, Debug, Default, PartialOrd, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verbosity {
    /// Do not print output.
    #[default]
    None,
    /// Report convergence or failure once per call.
    Result,
    /// Report every iteration.
    Iter,
}

/// Options for the various phase equilibria solvers.
///
/// If the values are [None], solver specific default
/// values are used.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Maximum number of iterations.
    pub max_iter: Option<usize>,
    /// Tolerance.
    pub tol: Option<f64>,
    /// Amount of iteration output.
    pub verbosity: Verbosity,
}

impl From<(Option<usize>, Option<f64>, Option<Verbosity>)> for SolverOptions {
    fn from(options: (Option<usize>, Option<f64>, Option<Verbosity>)) -> Self {
        Self {
            max_iter: options.0,
            tol: options.1,
            verbosity: options.2.unwrap_or(Verbosity::None),
        }
    }
}

impl SolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.tol = Some(tol);
        self
    }

    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn unwrap_or(self, max_iter: usize, tol: f64) -> (usize, f64, Verbosity) {
        (
            self.max_iter.unwrap_or(max_iter),
            self.tol.unwrap_or(tol),
            self.verbosity,
        )
    }
}

/// A thermodynamic equilibrium state of two coexisting phases.
///
/// ## Contents
///
/// + [Bubble and dew point calculations](#bubble-and-dew-point-calculations)
/// + [Flash calculations](#flash-calculations)
/// + [Pure component phase equilibria](#pure-component-phase-equilibria)
/// + [Utility functions](#utility-functions)
#[derive(Debug)]
pub struct PhaseEquilibrium<E>([State<E>; 2]);

impl<E> Clone for PhaseEquilibrium<E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<E: Residual> fmt::Display for PhaseEquilibrium<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            writeln!(f, "phase {}: {}", i, s)?;
        }
        Ok(())
    }
}

impl<E: Residual> PhaseEquilibrium<E> {
    pub fn vapor(&self) -> &State<E> {
        &self.0[0]
    }

    pub fn liquid(&self) -> &State<E> {
        &self.0[1]
    }

    pub(super) fn from_states(state1: State<E>, state2: State<E>) -> Self {
        let (vapor, liquid) = if state1.density < state2.density {
            (state1, state2)
        } else {
            (state2, state1)
        };
        Self([vapor, liquid])
    }

    /// Creates a new PhaseEquilibrium that contains two states at the
    /// specified temperature, pressure and moles.
    ///
    /// In general, the two states generated are NOT in an equilibrium.
    pub fn new_npt(
        eos: &Arc<E>,
        temperature: f64,
        pressure: f64,
        vapor_moles: &ndarray::Array1<f64>,
        liquid_moles: &ndarray::Array1<f64>,
    ) -> EosResult<Self> {
        let liquid = State::new_npt(
            eos,
            temperature,
            pressure,
            liquid_moles,
            DensityInitialization::Liquid,
        )?;
        let vapor = State::new_npt(
            eos,
            temperature,
            pressure,
            vapor_moles,
            DensityInitialization::Vapor,
        )?;
        Ok(Self([vapor, liquid]))
    }

    pub(super) fn vapor_phase_fraction(&self) -> f64 {
        self.vapor().total_moles / (self.vapor().total_moles + self.liquid().total_moles)
    }

    pub(super) fn update_pressure(mut self, temperature: f64, pressure: f64) -> EosResult<Self> {
        for s in self.0.iter_mut() {
            *s = State::new_npt(
                &s.eos,
                temperature,
                pressure,
                &s.moles,
                DensityInitialization::InitialDensity(s.density),
            )?;
        }
        Ok(self)
    }

    pub(super) fn update_moles(
        &mut self,
        pressure: f64,
        moles: [&ndarray::Array1<f64>; 2],
    ) -> EosResult<()> {
        for (i, s) in self.0.iter_mut().enumerate() {
            *s = State::new_npt(
                &s.eos,
                s.temperature,
                pressure,
                moles[i],
                DensityInitialization::InitialDensity(s.density),
            )?;
        }
        Ok(())
    }

    /// Gibbs energy of both phases, omitting the temperature-dependent
    /// ideal gas reference that is identical for any split of the same feed.
    pub(super) fn total_gibbs_energy(&self) -> f64 {
        self.0.iter().fold(0.0, |acc, s| {
            let mu = s.residual_chemical_potential()
                + s.partial_density.mapv(|rho| s.temperature * rho.ln());
            acc + s
                .moles
                .iter()
                .zip(mu.iter())
                .filter(|(&n, _)| n > 0.0)
                .map(|(n, mu)| n * mu)
                .sum::<f64>()
        })
    }
}

const TRIVIAL_REL_DEVIATION: f64 = 1e-5;

/// # Utility functions
impl<E: Residual> PhaseEquilibrium<E> {
    pub(super) fn check_trivial_solution(self, solver: &str) -> EosResult<Self> {
        if Self::is_trivial_solution(self.vapor(), self.liquid()) {
            Err(EosError::PhaseCollapse(solver.to_string()))
        } else {
            Ok(self)
        }
    }

    /// Check if the two states form a trivial solution
    pub fn is_trivial_solution(state1: &State<E>, state2: &State<E>) -> bool {
        let rho1 = &state1.partial_density;
        let rho2 = &state2.partial_density;

        rho1.iter()
            .zip(rho2.iter())
            .filter(|(&rho1, _)| rho1 > 0.0)
            .fold(0.0, |acc, (&rho1, &rho2)| (rho2 / rho1 - 1.0).abs().max(acc))
            < TRIVIAL_REL_DEVIATION
    }
}
