//! SAFT-γ-Mie equation of state with phase equilibria and parameter estimation.
//!
//! The model lives in [saftgammamie], cross interactions are derived by
//! the strategies in [mixing_rules]. States, density roots and phase
//! equilibria are provided by `saftgm-core` and re-exported here. The
//! [estimator] and [fit] modules adjust model parameters to experimental
//! data.
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod estimator;
pub mod fit;
pub mod mixing_rules;
pub mod saftgammamie;

pub use fit::{fit_parameters, FitOptions, FitResult, TerminationReason};
pub use saftgm_core::parameter;
pub use saftgm_core::{
    evaluate_state, phase_properties, solve_density, solve_equilibrium, units, Contributions,
    DensityRoots, EosError, EosResult, EquilibriumSpec, PhaseEquilibrium, PhaseHint, PhaseResult,
    PhaseTag, Residual, SolverOptions, State, StateHD, ThermodynamicPotentials, Verbosity,
};
