//! NumPy `.npy` arrays of float64.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use npyz::WriterBuilder;

use crate::error::AppError;

/// A float64 array loaded from disk: shape plus values in C order.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<u64>,
    pub values: Vec<f64>,
}

pub fn read_f64(path: &Path) -> Result<NpyArray, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open '{}': {e}", path.display())))?;
    let npy = npyz::NpyFile::new(BufReader::new(file))
        .map_err(|e| AppError::new(2, format!("'{}' is not a valid .npy file: {e}", path.display())))?;

    let shape = npy.shape().to_vec();
    if shape.len() > 1 && npy.order() != npyz::Order::C {
        return Err(AppError::new(
            2,
            format!("'{}' is stored in Fortran order; expected C order.", path.display()),
        ));
    }
    let values = npy
        .into_vec::<f64>()
        .map_err(|e| AppError::new(2, format!("Failed to read float64 data from '{}': {e}", path.display())))?;

    Ok(NpyArray { shape, values })
}

/// Write `values` (C order) as a float64 array of the given `shape`.
pub fn write_f64(path: &Path, shape: &[u64], values: &[f64]) -> Result<(), AppError> {
    let expected: u64 = shape.iter().product();
    if expected != values.len() as u64 {
        return Err(AppError::new(
            2,
            format!("Shape {shape:?} needs {expected} values, got {}.", values.len()),
        ));
    }

    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    let write_err = |e: std::io::Error| AppError::new(2, format!("Failed to write '{}': {e}", path.display()));

    let mut writer = npyz::WriteOptions::<f64>::new()
        .default_dtype()
        .shape(shape)
        .writer(BufWriter::new(file))
        .begin_nd()
        .map_err(write_err)?;
    writer.extend(values.iter().copied()).map_err(write_err)?;
    writer.finish().map_err(write_err)?;
    Ok(())
}
