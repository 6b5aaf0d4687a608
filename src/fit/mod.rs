//! Knee model calibration.
//!
//! Responsibilities:
//!
//! - choose starting points for the solver
//! - run each starting point through Levenberg–Marquardt (parallel)
//! - keep the best converged run and derive its covariance
//! - compare against a straight-line fit for diagnostics

pub mod diagnostic;
pub mod fitter;
pub mod seeds;

pub use diagnostic::*;
pub use fitter::*;
pub use seeds::*;
