use crate::parameter::ParameterError;
use num_dual::linalg::LinAlgError;
use thiserror::Error;

/// Error type for improperly defined states and convergence problems.
#[derive(Error, Debug)]
pub enum EosError {
    #[error("{0}")]
    Error(String),
    #[error("`{0}` did not converge within the maximum number of iterations (last residual: {1:e}).")]
    MaxIterationsExceeded(String, f64),
    #[error("`{0}` encountered illegal values during the iteration.")]
    IterationFailed(String),
    #[error("Phases collapsed onto the same state in `{0}`.")]
    PhaseCollapse(String),
    #[error("Packing fraction {0:.5} exceeds the close-packing limit.")]
    OutOfPhysicalRange(f64),
    #[error("No density root found for T = {0} K and p = {1} Pa.")]
    NoRealRoot(f64, f64),
    #[error("{0} density roots found and no phase was specified.")]
    MultipleRootsAmbiguous(usize),
    #[error("Equation of state is initialized for {0} components while the input specifies {1} components.")]
    IncompatibleComponents(usize, usize),
    #[error("Invalid state in {0}: {1} = {2}.")]
    InvalidState(String, String, f64),
    #[error("Undetermined state: {0}.")]
    UndeterminedState(String),
    #[error("System is supercritical.")]
    SuperCritical,
    #[error("No phase split for the given feed.")]
    NoPhaseSplit,
    #[error(transparent)]
    ParameterError(#[from] ParameterError),
    #[error(transparent)]
    LinAlgError(#[from] LinAlgError),
}

/// Convenience type for `Result<T, EosError>`.
pub type EosResult<T> = Result<T, EosError>;
