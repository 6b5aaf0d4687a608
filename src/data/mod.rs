//! Data sources other than camera measurements.

pub mod synthetic;

pub use synthetic::*;
