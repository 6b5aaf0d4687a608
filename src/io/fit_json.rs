//! Read/write fit JSON files.
//!
//! A fit file is the portable record of a calibration run: fitted parameters,
//! their errors and covariance, fit quality, and where the lookup table went.
//! The schema is defined by `domain::FitFile`.

use std::fs::File;
use std::path::Path;

use chrono::Local;

use crate::domain::{FitFile, KneeFit};
use crate::error::AppError;

/// Name recorded in the `tool` field.
pub const TOOL_NAME: &str = "giso";

pub fn fit_file(fit: &KneeFit, folder: &Path, lut_path: Option<&Path>) -> FitFile {
    FitFile {
        tool: TOOL_NAME.to_string(),
        generated_at: Local::now(),
        folder: folder.to_path_buf(),
        parameters: fit.params,
        parameter_errors: fit.covariance.std_errors(),
        covariance: fit.covariance,
        quality: fit.quality.clone(),
        lut_path: lut_path.map(Path::to_path_buf),
    }
}

pub fn write_fit_json(path: &Path, file: &FitFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file)
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))
}
