//! Gain lookup table derived from a knee fit.
//!
//! - dense table generation (`table`)
//! - gain lookup and ISO normalisation of measured values

pub mod table;

pub use table::*;
