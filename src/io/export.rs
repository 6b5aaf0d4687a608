//! Export per-ISO measurements to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.
//! Values that cannot be derived (missing file, unusable gain) are left empty.

use std::path::Path;

use serde::Serialize;

use crate::domain::{KneeFit, Measurement};
use crate::error::AppError;
use crate::models::inverse_gain;

#[derive(Debug, Serialize)]
struct MeasurementRow {
    iso: u32,
    gain: Option<f64>,
    gain_error: Option<f64>,
    read_noise: Option<f64>,
    read_noise_error: Option<f64>,
    inverse_gain: Option<f64>,
    inverse_gain_error: Option<f64>,
    read_noise_adu: Option<f64>,
    read_noise_adu_error: Option<f64>,
    used_in_fit: bool,
    fitted_inverse_gain: f64,
}

fn to_row(m: &Measurement, fit: &KneeFit) -> MeasurementRow {
    let inv = m.inverse_gain();
    let ron = m.read_noise_adu();
    MeasurementRow {
        iso: m.iso,
        gain: m.values.map(|v| v.gain),
        gain_error: m.values.map(|v| v.gain_error),
        read_noise: m.values.map(|v| v.read_noise),
        read_noise_error: m.values.map(|v| v.read_noise_error),
        inverse_gain: inv.map(|v| v.value),
        inverse_gain_error: inv.map(|v| v.error),
        read_noise_adu: ron.map(|v| v.value),
        read_noise_adu_error: ron.map(|v| v.error),
        used_in_fit: fit.used_isos.binary_search(&m.iso).is_ok() && m.fit_point().is_some(),
        fitted_inverse_gain: inverse_gain(f64::from(m.iso), &fit.params),
    }
}

/// Write one row per measurement, including those excluded from the fit.
pub fn write_measurements_csv(path: &Path, measurements: &[Measurement], fit: &KneeFit) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    for m in measurements {
        writer
            .serialize(to_row(m, fit))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV '{}': {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitParameters, FitQuality, GainRon, ParamCovariance};
    use std::path::PathBuf;

    #[test]
    fn missing_measurements_export_with_empty_fields() {
        let fit = KneeFit {
            params: FitParameters::new(0.01, 0.2, 300.0),
            covariance: ParamCovariance::zeros(),
            quality: FitQuality {
                r_squared: None,
                chi2: 0.0,
                n_used: 1,
                dof: 0,
                iterations: 1,
            },
            used_isos: vec![100],
            seed: FitParameters::INITIAL,
        };
        let measurements = vec![
            Measurement::loaded(
                100,
                PathBuf::from("iso100/gain_ron.npy"),
                GainRon {
                    gain: 2.0,
                    gain_error: 0.4,
                    read_noise: 3.0,
                    read_noise_error: 0.3,
                },
            ),
            Measurement::missing(200, PathBuf::from("iso200/gain_ron.npy")),
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_measurements_csv(&path, &measurements, &fit).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("iso,gain,gain_error,"));
        assert!(lines[1].starts_with("100,2.0,0.4,3.0,0.3,0.5,0.1,1.5,"));
        assert!(lines[1].contains(",true,"));
        assert!(lines[2].starts_with("200,,,,,,,,,false,"));
    }
}
