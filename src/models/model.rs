//! Knee model evaluation.
//!
//! Inverse gain rises linearly with ISO speed up to the knee and stays constant
//! beyond it:
//!
//! ```text
//! 1/G(iso) = iso * slope + offset    iso <  knee
//!          = knee * slope + offset   iso >= knee
//! ```
//!
//! The fitter relies on two primitive operations, prediction and the Jacobian
//! row. Error propagation for the lookup table lives here as well.

use nalgebra::Vector3;

use crate::domain::{FitParameters, ParamCovariance};

/// Which branch of the model an ISO speed falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Linear,
    Saturated,
}

impl Regime {
    pub fn of(iso: f64, knee: f64) -> Self {
        if iso < knee {
            Regime::Linear
        } else {
            Regime::Saturated
        }
    }
}

/// Predict the inverse gain at `iso`.
pub fn inverse_gain(iso: f64, params: &FitParameters) -> f64 {
    match Regime::of(iso, params.knee) {
        Regime::Linear => iso * params.slope + params.offset,
        Regime::Saturated => params.knee * params.slope + params.offset,
    }
}

/// Predict the inverse gain for every ISO speed in `isos`.
pub fn inverse_gain_many(isos: &[f64], params: &FitParameters) -> Vec<f64> {
    isos.iter().map(|&iso| inverse_gain(iso, params)).collect()
}

/// 1σ error of the predicted inverse gain at `iso`.
///
/// The slope–offset covariance term is left out of the linear branch; the
/// lookup tables produced so far were computed that way.
pub fn inverse_gain_error(iso: f64, params: &FitParameters, cov: &ParamCovariance) -> f64 {
    let variance = match Regime::of(iso, params.knee) {
        Regime::Linear => iso * iso * cov.var_slope() + cov.var_offset(),
        Regime::Saturated => {
            params.knee * params.knee * cov.var_slope()
                + params.slope * params.slope * cov.var_knee()
                + cov.var_offset()
        }
    };
    variance.max(0.0).sqrt()
}

/// Partial derivatives of the prediction with respect to `(slope, offset, knee)`.
pub fn jacobian_row(iso: f64, params: &FitParameters) -> Vector3<f64> {
    match Regime::of(iso, params.knee) {
        Regime::Linear => Vector3::new(iso, 1.0, 0.0),
        Regime::Saturated => Vector3::new(params.knee, 1.0, params.slope),
    }
}

/// Inverse gain of a plain straight line (used by the linear-model diagnostic).
pub fn linear_inverse_gain(iso: f64, slope: f64, offset: f64) -> f64 {
    iso * slope + offset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> FitParameters {
        FitParameters::new(0.01, 0.2, 300.0)
    }

    #[test]
    fn linear_branch_is_exact_below_knee() {
        let p = params();
        for iso in [0.0, 1.0, 50.0, 123.0, 299.0, 299.999] {
            assert_eq!(inverse_gain(iso, &p), iso * p.slope + p.offset);
        }
    }

    #[test]
    fn saturated_branch_is_constant_at_and_above_knee() {
        let p = params();
        let level = p.knee * p.slope + p.offset;
        for iso in [300.0, 301.0, 800.0, 1999.0, 1.0e6] {
            assert_eq!(inverse_gain(iso, &p), level);
        }
    }

    #[test]
    fn model_is_continuous_at_knee() {
        let p = params();
        let below = inverse_gain(p.knee - 1e-9, &p);
        let at = inverse_gain(p.knee, &p);
        assert!((below - at).abs() < 1e-9);
        assert_eq!(Regime::of(p.knee, p.knee), Regime::Saturated);
    }

    #[test]
    fn each_iso_is_classified_independently() {
        let p = params();
        let out = inverse_gain_many(&[1000.0, 100.0, 300.0, 0.0], &p);
        assert_eq!(out, vec![3.2, 1.2, 3.2, 0.2]);
    }

    #[test]
    fn error_follows_branch_formulas() {
        let p = params();
        let cov = ParamCovariance([[1e-8, 5e-7, 0.0], [5e-7, 1e-4, 0.0], [0.0, 0.0, 25.0]]);

        let lin = inverse_gain_error(100.0, &p, &cov);
        assert!((lin - (100.0_f64.powi(2) * 1e-8 + 1e-4).sqrt()).abs() < 1e-15);

        let sat = inverse_gain_error(500.0, &p, &cov);
        let expected = (300.0_f64.powi(2) * 1e-8 + 0.01_f64.powi(2) * 25.0 + 1e-4).sqrt();
        assert!((sat - expected).abs() < 1e-15);
    }

    #[test]
    fn error_is_never_negative() {
        let p = params();
        let covs = [
            ParamCovariance::zeros(),
            ParamCovariance::diagonal(1e-6, 1e-3, 10.0),
            // Round-off can leave tiny negative variances behind.
            ParamCovariance::diagonal(-1e-20, -1e-20, -1e-20),
        ];
        for cov in &covs {
            for iso in (0..2000).step_by(37) {
                let e = inverse_gain_error(f64::from(iso), &p, cov);
                assert!(e >= 0.0, "negative error {e} at iso {iso}");
            }
        }
    }

    #[test]
    fn jacobian_matches_branch() {
        let p = params();
        assert_eq!(jacobian_row(100.0, &p), Vector3::new(100.0, 1.0, 0.0));
        assert_eq!(jacobian_row(400.0, &p), Vector3::new(300.0, 1.0, 0.01));
    }
}
