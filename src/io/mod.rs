//! Input/output helpers.
//!
//! - `.npy` float64 arrays (`npy`)
//! - measurement ingest from ISO sub-folders (`ingest`)
//! - lookup table files (`lut`)
//! - measurement CSV export (`export`)
//! - fit JSON read/write (`fit_json`)

pub mod export;
pub mod fit_json;
pub mod ingest;
pub mod lut;
pub mod npy;

pub use export::*;
pub use fit_json::*;
pub use ingest::*;
pub use lut::*;
pub use npy::*;
