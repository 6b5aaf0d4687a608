//! Reporting utilities: residuals, read-noise summary, and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{KneeFit, Measurement, ValueWithError};
use crate::math::{rms, weighted_mean};
use crate::models::inverse_gain;

/// Fitted inverse gain and residual at one measured ISO speed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Residual {
    pub iso: u32,
    pub observed: f64,
    pub fitted: f64,
    pub residual: f64,
    /// Residual in units of the measurement uncertainty.
    pub pull: f64,
}

/// Residuals at every measurement that entered the fit.
pub fn compute_residuals(measurements: &[Measurement], fit: &KneeFit) -> Vec<Residual> {
    measurements
        .iter()
        .filter_map(|m| {
            let p = m.fit_point()?;
            let fitted = inverse_gain(p.iso, &fit.params);
            let residual = p.inverse_gain - fitted;
            Some(Residual {
                iso: m.iso,
                observed: p.inverse_gain,
                fitted,
                residual,
                pull: residual / p.sigma,
            })
        })
        .collect()
}

pub fn residual_rms(residuals: &[Residual]) -> Option<f64> {
    let values: Vec<f64> = residuals.iter().map(|r| r.residual).collect();
    rms(&values)
}

/// Weighted mean read noise in ADU over all measurements where it can be derived.
pub fn mean_read_noise_adu(measurements: &[Measurement]) -> Option<ValueWithError> {
    let (values, errors): (Vec<f64>, Vec<f64>) = measurements
        .iter()
        .filter_map(Measurement::read_noise_adu)
        .map(|v| (v.value, v.error))
        .unzip();
    weighted_mean(&values, &errors)
}
