//! Small statistics helpers shared by the fitter and the reports.

use crate::domain::ValueWithError;

/// Inverse-variance weighted mean of `values`.
///
/// Entries with a non-finite value or a non-positive/non-finite error are skipped.
/// The returned error is `1 / sqrt(Σ w)`.
pub fn weighted_mean(values: &[f64], errors: &[f64]) -> Option<ValueWithError> {
    let mut sw = 0.0;
    let mut swx = 0.0;
    for (&x, &e) in values.iter().zip(errors.iter()) {
        if !(x.is_finite() && e.is_finite() && e > 0.0) {
            continue;
        }
        let w = 1.0 / (e * e);
        sw += w;
        swx += w * x;
    }
    if sw <= 0.0 {
        return None;
    }
    Some(ValueWithError {
        value: swx / sw,
        error: 1.0 / sw.sqrt(),
    })
}

/// Coefficient of determination `1 - SS_res / SS_tot`.
///
/// Returns `None` for empty or mismatched inputs and when `SS_tot` is zero.
pub fn r_squared(observed: &[f64], fitted: &[f64]) -> Option<f64> {
    if observed.is_empty() || observed.len() != fitted.len() {
        return None;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let ss_tot: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();
    let ss_res: f64 = observed
        .iter()
        .zip(fitted.iter())
        .map(|(y, f)| (y - f).powi(2))
        .sum();
    if ss_tot <= 0.0 {
        return None;
    }
    Some(1.0 - ss_res / ss_tot)
}

/// Root mean square of `values`.
pub fn rms(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let ms = values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64;
    Some(ms.sqrt())
}
