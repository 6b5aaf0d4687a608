//! Linear vs knee diagnostic.
//!
//! A straight line `1/G = slope * ISO + offset` is fit next to the knee model
//! and both are scored by R². Selection rule:
//! 1. If the straight line reaches `R2_ADEQUATE`, it is preferred
//! 2. Otherwise the knee model is preferred if it reaches `R2_ADEQUATE`
//! 3. Otherwise neither model describes the data
//!
//! The lookup table always uses the knee model; this is reported only.

use serde::Serialize;

use crate::domain::{FitPoint, KneeFit, ModelKind};
use crate::math::{fit_line, r_squared};
use crate::models::linear_inverse_gain;

/// R² above which a model is considered an adequate description of the data.
pub const R2_ADEQUATE: f64 = 0.9;

/// Weighted straight-line fit of inverse gain against ISO.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub offset: f64,
    pub r_squared: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelComparison {
    /// `None` when fewer than two points are available or the system is degenerate.
    pub linear: Option<LinearFit>,
    pub knee_r_squared: Option<f64>,
    pub preferred: Option<ModelKind>,
}

pub fn fit_linear(points: &[FitPoint]) -> Option<LinearFit> {
    let xs: Vec<f64> = points.iter().map(|p| p.iso).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.inverse_gain).collect();
    let sigmas: Vec<f64> = points.iter().map(|p| p.sigma).collect();

    let (slope, offset) = fit_line(&xs, &ys, &sigmas)?;
    let fitted: Vec<f64> = xs.iter().map(|&x| linear_inverse_gain(x, slope, offset)).collect();
    Some(LinearFit {
        slope,
        offset,
        r_squared: r_squared(&ys, &fitted),
    })
}

pub fn compare_models(points: &[FitPoint], knee: &KneeFit) -> ModelComparison {
    let linear = fit_linear(points);
    let knee_r_squared = knee.quality.r_squared;

    let adequate = |r2: Option<f64>| r2.is_some_and(|v| v >= R2_ADEQUATE);
    let preferred = if adequate(linear.and_then(|l| l.r_squared)) {
        Some(ModelKind::Linear)
    } else if adequate(knee_r_squared) {
        Some(ModelKind::Knee)
    } else {
        None
    };

    ModelComparison {
        linear,
        knee_r_squared,
        preferred,
    }
}
