//! Knee model fit.
//!
//! Given per-ISO measurements we:
//! - keep only entries with a usable inverse gain and a positive uncertainty
//! - run Levenberg–Marquardt from one or more starting points (parallel)
//! - keep the converged run with the lowest χ²
//! - derive the parameter covariance and R² for the winning run

use nalgebra::{DVector, Matrix3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::domain::{FitParameters, FitPoint, FitQuality, KneeFit, Measurement, ParamCovariance, SeedStrategy};
use crate::error::FitError;
use crate::fit::seeds::knee_seeds;
use crate::math::{LmConfig, LmModel, LmResult, optimize, r_squared};
use crate::models::{inverse_gain, inverse_gain_many, jacobian_row};

/// Minimum number of valid measurements (one per free parameter).
pub const MIN_FIT_POINTS: usize = 3;

/// Lower bound on the knee while iterating; the knee is an ISO speed.
const KNEE_MIN: f64 = 1e-6;

/// Options that affect how the knee model is calibrated.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Starting point of the solver.
    pub initial: FitParameters,
    /// Extra starting points to try.
    pub seeds: SeedStrategy,
    pub solver: LmConfig,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            initial: FitParameters::INITIAL,
            seeds: SeedStrategy::Initial,
            solver: LmConfig::default(),
        }
    }
}

struct KneeModel;

impl KneeModel {
    fn params(p: &DVector<f64>) -> FitParameters {
        FitParameters::new(p[0], p[1], p[2])
    }
}

impl LmModel for KneeModel {
    fn param_count(&self) -> usize {
        3
    }

    fn evaluate(&self, x: f64, params: &DVector<f64>) -> f64 {
        inverse_gain(x, &Self::params(params))
    }

    fn jacobian_row(&self, x: f64, params: &DVector<f64>, out: &mut [f64]) {
        let row = jacobian_row(x, &Self::params(params));
        out.copy_from_slice(row.as_slice());
    }

    fn constrain(&self, params: &mut DVector<f64>) {
        params[2] = params[2].max(KNEE_MIN);
    }
}

/// Measurements that enter the fit, sorted by ISO.
pub fn fit_points(measurements: &[Measurement]) -> Vec<(u32, FitPoint)> {
    let mut out: Vec<(u32, FitPoint)> = measurements
        .iter()
        .filter_map(|m| m.fit_point().map(|p| (m.iso, p)))
        .collect();
    out.sort_by_key(|(iso, _)| *iso);
    out
}

/// Fit the knee model to the valid subset of `measurements`.
pub fn fit_knee_model(measurements: &[Measurement], opts: &FitOptions) -> Result<KneeFit, FitError> {
    let points = fit_points(measurements);
    if points.len() < MIN_FIT_POINTS {
        return Err(FitError::InsufficientData {
            valid: points.len(),
            required: MIN_FIT_POINTS,
        });
    }
    let skipped = measurements.len() - points.len();
    if skipped > 0 {
        debug!(skipped, "excluded invalid measurements from the fit");
    }

    let xs: Vec<f64> = points.iter().map(|(_, p)| p.iso).collect();
    let ys: Vec<f64> = points.iter().map(|(_, p)| p.inverse_gain).collect();
    let sigmas: Vec<f64> = points.iter().map(|(_, p)| p.sigma).collect();

    let seeds = knee_seeds(opts.initial, opts.seeds, &xs);

    // Evaluate each starting point independently (parallel).
    let runs: Vec<(usize, FitParameters, LmResult)> = seeds
        .par_iter()
        .enumerate()
        .map(|(idx, seed)| {
            let initial = DVector::from_column_slice(seed.to_vector().as_slice());
            let res = optimize(&KneeModel, &xs, &ys, &sigmas, initial, &opts.solver);
            (idx, *seed, res)
        })
        .collect();

    // Deterministic selection: minimum χ² among converged runs, ties by seed order.
    let mut best: Option<&(usize, FitParameters, LmResult)> = None;
    for run in runs.iter().filter(|(_, _, r)| r.converged && r.chi2.is_finite()) {
        debug!(seed_knee = run.1.knee, chi2 = run.2.chi2, iterations = run.2.iterations, "solver run converged");
        best = match best {
            Some(b) if b.2.chi2 < run.2.chi2 || (b.2.chi2 == run.2.chi2 && b.0 < run.0) => Some(b),
            _ => Some(run),
        };
    }

    let Some((_, seed, result)) = best else {
        let iterations = runs.iter().map(|(_, _, r)| r.iterations).max().unwrap_or(0);
        return Err(FitError::NotConverged(format!(
            "no solver run converged ({} starting point(s), up to {iterations} iterations)",
            runs.len()
        )));
    };

    let params = KneeModel::params(&result.params);
    if !(params.slope.is_finite() && params.offset.is_finite() && params.knee.is_finite()) || params.knee <= 0.0 {
        return Err(FitError::NotConverged(format!(
            "solution is not physical (slope={}, offset={}, knee={})",
            params.slope, params.offset, params.knee
        )));
    }

    let n = xs.len();
    let dof = n - MIN_FIT_POINTS;
    let covariance = covariance(result, dof)?;

    let fitted = inverse_gain_many(&xs, &params);
    let quality = FitQuality {
        r_squared: r_squared(&ys, &fitted),
        chi2: result.chi2,
        n_used: n,
        dof,
        iterations: result.iterations,
    };

    info!(
        slope = params.slope,
        offset = params.offset,
        knee = params.knee,
        chi2 = quality.chi2,
        n_used = n,
        "knee model fitted"
    );

    Ok(KneeFit {
        params,
        covariance,
        quality,
        used_isos: points.iter().map(|(iso, _)| *iso).collect(),
        seed: *seed,
    })
}

/// Parameter covariance `(JᵀJ)⁻¹ · χ²/dof`, with the uncertainties treated as relative.
fn covariance(result: &LmResult, dof: usize) -> Result<ParamCovariance, FitError> {
    let inverse = result
        .jtj
        .clone()
        .try_inverse()
        .ok_or_else(|| FitError::NotConverged("parameter covariance is singular".to_string()))?;

    let scale = if dof > 0 {
        result.chi2 / dof as f64
    } else {
        warn!("no degrees of freedom left; parameter covariance is not scaled by the residual variance");
        1.0
    };

    // Average with the transpose; the LU-based inverse is only symmetric up to round-off.
    let m = Matrix3::from_fn(|i, j| 0.5 * (inverse[(i, j)] + inverse[(j, i)]) * scale);
    if m.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NotConverged("parameter covariance is not finite".to_string()));
    }
    Ok(ParamCovariance::from_matrix(&m))
}
