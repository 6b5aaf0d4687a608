//! Synthetic gain/read-noise datasets.
//!
//! Produces the same folder layout a calibration run leaves behind
//! (`<out>/iso<N>/gain_ron.npy`) from known knee parameters, so the fit can be
//! exercised end to end without camera data.

use std::fs;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use tracing::info;

use crate::domain::{FitParameters, GainRon, Measurement};
use crate::error::AppError;
use crate::io::ingest::GAIN_RON_FILE;
use crate::io::npy::write_f64;
use crate::models::inverse_gain;

/// Reported relative gain error when no noise is injected, so every ISO stays fittable.
const MIN_RELATIVE_ERROR: f64 = 0.01;

/// Relative uncertainty reported for the read noise.
const READ_NOISE_RELATIVE_ERROR: f64 = 0.05;

/// ISO speeds of a typical smartphone sensor, in third-stop steps.
pub const DEFAULT_ISOS: [u32; 16] = [
    50, 64, 80, 100, 125, 160, 200, 250, 320, 400, 500, 640, 800, 1000, 1250, 1600,
];

#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub params: FitParameters,
    /// Relative Gaussian noise applied to the gain (0 for exact data).
    pub noise: f64,
    /// Read noise in ADU, the same at every ISO.
    pub read_noise_adu: f64,
    pub isos: Vec<u32>,
    /// ISO speeds whose folder is created without a measurement file.
    pub missing: Vec<u32>,
    pub seed: u64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            params: FitParameters::new(0.01, 0.2, 300.0),
            noise: 0.02,
            read_noise_adu: 2.0,
            isos: DEFAULT_ISOS.to_vec(),
            missing: Vec::new(),
            seed: 42,
        }
    }
}

/// Draw one measurement per ISO speed. Missing ISOs come back without values.
pub fn generate_measurements(spec: &SyntheticSpec, root: &Path) -> Result<Vec<Measurement>, AppError> {
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(AppError::new(2, format!("Noise must be finite and >= 0, got {}.", spec.noise)));
    }
    if !(spec.read_noise_adu.is_finite() && spec.read_noise_adu >= 0.0) {
        return Err(AppError::new(2, "Read noise must be finite and >= 0."));
    }
    if spec.isos.is_empty() {
        return Err(AppError::new(2, "At least one ISO speed is required."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let mut isos = spec.isos.clone();
    isos.sort_unstable();
    isos.dedup();

    let mut out = Vec::with_capacity(isos.len());
    for iso in isos {
        let source = root.join(format!("iso{iso}")).join(GAIN_RON_FILE);
        // Always draw, so dropping an ISO does not shift the noise of the others.
        let z: f64 = normal.sample(&mut rng);
        if spec.missing.contains(&iso) {
            out.push(Measurement::missing(iso, source));
            continue;
        }

        let inv = inverse_gain(f64::from(iso), &spec.params);
        if !(inv.is_finite() && inv > 0.0) {
            return Err(AppError::new(
                2,
                format!("Parameters give a non-positive inverse gain ({inv}) at ISO {iso}."),
            ));
        }
        let true_gain = 1.0 / inv;
        let gain = true_gain * (1.0 + spec.noise * z);
        let read_noise = spec.read_noise_adu * gain;

        out.push(Measurement::loaded(
            iso,
            source,
            GainRon {
                gain,
                gain_error: spec.noise.max(MIN_RELATIVE_ERROR) * true_gain,
                read_noise,
                read_noise_error: READ_NOISE_RELATIVE_ERROR * read_noise,
            },
        ));
    }
    Ok(out)
}

/// Write a synthetic dataset under `out` and return what was generated.
pub fn write_dataset(spec: &SyntheticSpec, out: &Path) -> Result<Vec<Measurement>, AppError> {
    let measurements = generate_measurements(spec, out)?;
    for m in &measurements {
        let dir = m.source.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(out));
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", dir.display())))?;
        if let Some(values) = m.values {
            write_f64(&m.source, &[GainRon::LEN as u64], &values.to_array())?;
        }
    }

    info!(
        out = %out.display(),
        isos = measurements.len(),
        missing = measurements.iter().filter(|m| m.values.is_none()).count(),
        "wrote synthetic dataset"
    );
    Ok(measurements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::load_measurements;

    #[test]
    fn exact_data_follows_the_model() {
        let spec = SyntheticSpec {
            noise: 0.0,
            ..SyntheticSpec::default()
        };
        let ms = generate_measurements(&spec, Path::new("out")).unwrap();
        assert_eq!(ms.len(), DEFAULT_ISOS.len());
        for m in &ms {
            let inv = m.inverse_gain().unwrap();
            let expected = inverse_gain(f64::from(m.iso), &spec.params);
            assert!((inv.value - expected).abs() < 1e-12);
            let ron = m.read_noise_adu().unwrap();
            assert!((ron.value - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn same_seed_same_data() {
        let spec = SyntheticSpec::default();
        let a = generate_measurements(&spec, Path::new("out")).unwrap();
        let b = generate_measurements(&spec, Path::new("out")).unwrap();
        assert_eq!(a, b);

        let other = SyntheticSpec { seed: 7, ..spec };
        let c = generate_measurements(&other, Path::new("out")).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn written_dataset_loads_back_with_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let spec = SyntheticSpec {
            missing: vec![200, 800],
            ..SyntheticSpec::default()
        };
        let written = write_dataset(&spec, dir.path()).unwrap();

        let data = load_measurements(dir.path()).unwrap();
        assert_eq!(data.measurements.len(), DEFAULT_ISOS.len());
        assert_eq!(data.n_missing(), 2);
        for (w, r) in written.iter().zip(&data.measurements) {
            assert_eq!(w.iso, r.iso);
            assert_eq!(w.values, r.values);
        }
    }

    #[test]
    fn negative_noise_is_rejected() {
        let spec = SyntheticSpec {
            noise: -0.1,
            ..SyntheticSpec::default()
        };
        assert_eq!(generate_measurements(&spec, Path::new("out")).unwrap_err().exit_code(), 2);
    }
}
