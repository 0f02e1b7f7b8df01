//! Thermodynamic states, density solvers and phase equilibria for
//! Helmholtz energy models.
//!
//! Models implement the [Residual] trait. Everything else in this crate,
//! from single state properties to bubble points, flashes and critical
//! points, is derived from the residual Helmholtz energy using automatic
//! differentiation.
#![warn(clippy::all)]
#![allow(clippy::reversed_empty_ranges)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::too_many_arguments)]

/// Print messages with level `Verbosity::Iter` or higher.
#[macro_export]
macro_rules! log_iter {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= Verbosity::Iter {
            println!($($arg)*);
        }
    }
}

/// Print messages with level `Verbosity::Result` or higher.
#[macro_export]
macro_rules! log_result {
    ($verbosity:expr, $($arg:tt)*) => {
        if $verbosity >= Verbosity::Result {
            println!($($arg)*);
        }
    }
}

mod density_solver;
mod equation_of_state;
mod errors;
pub mod parameter;
mod phase_equilibria;
mod state;
#[cfg(test)]
mod test_utils;
pub use density_solver::{density_iteration, solve_density, DensityRoots, PhaseHint};
pub use equation_of_state::{Residual, CLOSE_PACKING_FRACTION};
pub use errors::{EosError, EosResult};
pub use phase_equilibria::{
    phase_properties, solve_equilibrium, EquilibriumSpec, PhaseEquilibrium, PhaseResult, PhaseTag,
    SolverOptions, Verbosity,
};
pub use state::{
    evaluate_state, Contributions, DensityInitialization, Derivative, State, StateHD,
    ThermodynamicPotentials,
};

/// Physical constants and the conversion factors between the reduced
/// units used internally and SI units.
pub mod units {
    /// Boltzmann constant in J/K
    pub const KB: f64 = 1.380649e-23;
    /// Avogadro constant in 1/mol
    pub const NAV: f64 = 6.02214076e23;
    /// Ideal gas constant in J/(mol K)
    pub const RGAS: f64 = KB * NAV;
    /// Planck constant in J s
    pub const PLANCK: f64 = 6.62607015e-34;

    /// Pressure in Pa of a reduced pressure of 1 K/Å³
    pub const REFERENCE_PRESSURE: f64 = KB * 1e30;
    /// Density in mol/m³ of a reduced density of 1 Å⁻³
    pub const REFERENCE_DENSITY: f64 = 1e30 / NAV;
    /// Molar energy in J/mol of a reduced energy of 1 K
    pub const REFERENCE_MOLAR_ENERGY: f64 = RGAS;
}
