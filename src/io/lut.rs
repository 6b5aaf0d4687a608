//! Lookup table files.
//!
//! Stored as a float64 `.npy` array of shape `(3, N)` with rows
//! `(iso, gain, gain_error)`.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::AppError;
use crate::io::npy::{read_f64, write_f64};
use crate::lookup::{LookupTable, LUT_FIELDS};

/// Default location of the lookup table, relative to the working directory.
pub const DEFAULT_LUT_PATH: &str = "results/gain_new/LUT.npy";

/// Write `table` to `path`, creating parent directories as needed.
pub fn write_lut(path: &Path, table: &LookupTable) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", parent.display())))?;
    }
    write_f64(path, &[LUT_FIELDS as u64, table.len() as u64], &table.to_flat())?;
    info!(path = %path.display(), rows = table.len(), "wrote lookup table");
    Ok(())
}

pub fn read_lut(path: &Path) -> Result<LookupTable, AppError> {
    let array = read_f64(path)?;
    match array.shape.as_slice() {
        &[fields, n] if fields == LUT_FIELDS as u64 => LookupTable::from_flat(&array.values, n as usize),
        other => Err(AppError::new(
            2,
            format!(
                "'{}' has shape {other:?}; a lookup table must have shape ({LUT_FIELDS}, N).",
                path.display()
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitParameters, ParamCovariance};
    use crate::lookup::LUT_ISO_COUNT;

    #[test]
    fn round_trip_keeps_shape_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("gain_new").join("LUT.npy");
        let table = LookupTable::from_fit(
            &FitParameters::new(0.01, 0.2, 300.0),
            &ParamCovariance::diagonal(1e-8, 1e-4, 25.0),
        );

        write_lut(&path, &table).unwrap();
        let raw = read_f64(&path).unwrap();
        assert_eq!(raw.shape, vec![3, LUT_ISO_COUNT as u64]);

        let back = read_lut(&path).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn wrong_shape_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gain_ron.npy");
        write_f64(&path, &[4], &[1.0, 0.1, 3.0, 0.3]).unwrap();

        let err = read_lut(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("shape"));
    }
}
