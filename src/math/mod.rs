//! Mathematical utilities: statistics, linear and nonlinear least squares.

pub mod lm;
pub mod ols;
pub mod stats;

pub use lm::*;
pub use ols::*;
pub use stats::*;
