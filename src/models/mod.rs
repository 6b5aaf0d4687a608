//! ISO/inverse-gain model implementations.
//!
//! Models are implemented as small, pure functions so that fitting and lookup
//! code can stay generic.

pub mod model;

pub use model::*;
