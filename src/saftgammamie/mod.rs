//! SAFT-γ-Mie equation of state for homonuclear chains of Mie segments.
//!
//! The residual Helmholtz energy consists of a BMCSL hard-sphere term, the
//! third order dispersion perturbation of Lafitte et al. (2013) together
//! with the Mie chain term and a Wertheim association term.
mod eos;
pub(crate) mod parameters;

pub use eos::association::{AssociationParameters, AssociationRecord, BinaryAssociationRecord};
pub use eos::{SaftGammaMie, SaftGammaMieOptions};
pub use parameters::{SaftGammaMieBinaryRecord, SaftGammaMieParameters, SaftGammaMieRecord};

#[doc(hidden)]
pub use parameters::test_utils;
