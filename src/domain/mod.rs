//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - per-ISO measurements (`GainRon`, `Measurement`, `FitPoint`)
//! - fit outputs (`FitParameters`, `ParamCovariance`, `KneeFit`, `FitQuality`)
//! - run configuration (`FitConfig`, `SeedStrategy`) and the saved `FitFile`

pub mod types;

pub use types::*;
