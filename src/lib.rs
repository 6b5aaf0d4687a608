//! `gain-iso` library crate.
//!
//! The binary (`giso`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the lookup table can be consumed from other calibration code
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logger;
pub mod lookup;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
