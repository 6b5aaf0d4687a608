//! Levenberg–Marquardt solver for small weighted nonlinear least squares problems.
//!
//! We minimise
//!
//! ```text
//! χ²(p) = Σ ((y_i - f(x_i; p)) / σ_i)²
//! ```
//!
//! using an analytic Jacobian supplied by the model. Each iteration solves the
//! damped normal equations
//!
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//!
//! and accepts the step only if χ² decreases. The final `JᵀJ` is returned so
//! callers can form the parameter covariance.

use nalgebra::{DMatrix, DVector};

/// Floor for diagonal entries when damping, so parameters that currently have no
/// influence (zero Jacobian column) still get a regularised step.
const MIN_DIAGONAL: f64 = 1e-12;

/// A model that can be fit with [`optimize`].
pub trait LmModel {
    /// Number of free parameters.
    fn param_count(&self) -> usize;

    /// Evaluate the model at `x`.
    fn evaluate(&self, x: f64, params: &DVector<f64>) -> f64;

    /// Write the partial derivatives at `x` into `out` (length `param_count()`).
    fn jacobian_row(&self, x: f64, params: &DVector<f64>, out: &mut [f64]);

    /// Project parameters back into their feasible region after an update.
    fn constrain(&self, _params: &mut DVector<f64>) {}
}

/// Solver settings.
#[derive(Debug, Clone)]
pub struct LmConfig {
    pub max_iterations: usize,
    pub initial_lambda: f64,
    /// Factor applied to λ after a rejected step.
    pub lambda_up: f64,
    /// Factor applied to λ after an accepted step.
    pub lambda_down: f64,
    pub lambda_min: f64,
    /// Give up once λ grows past this value.
    pub lambda_max: f64,
    /// Converged when `max |Jᵀr| <= gradient_tolerance * max(1, sqrt(χ²))`.
    pub gradient_tolerance: f64,
    /// Converged when an accepted step changes every parameter by less than this (relative).
    pub step_tolerance: f64,
    /// Converged when an accepted step lowers χ² by less than this (relative).
    pub chi2_tolerance: f64,
    /// Converged when χ² itself drops to this level (exact data).
    pub chi2_floor: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            lambda_min: 1e-12,
            lambda_max: 1e16,
            gradient_tolerance: 1e-12,
            step_tolerance: 1e-12,
            chi2_tolerance: 1e-14,
            chi2_floor: 1e-30,
        }
    }
}

/// Result of an optimisation run.
#[derive(Debug, Clone)]
pub struct LmResult {
    pub params: DVector<f64>,
    pub chi2: f64,
    pub converged: bool,
    pub iterations: usize,
    /// Weighted `JᵀJ` evaluated at `params`.
    pub jtj: DMatrix<f64>,
}

/// Run Levenberg–Marquardt from `initial`.
///
/// `xs`, `ys` and `sigmas` must have equal lengths and every sigma must be
/// positive and finite; callers filter their data first.
pub fn optimize<M: LmModel>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    sigmas: &[f64],
    initial: DVector<f64>,
    config: &LmConfig,
) -> LmResult {
    let n_params = model.param_count();
    let mut params = initial;
    model.constrain(&mut params);

    let mut chi2 = compute_chi2(model, xs, ys, sigmas, &params);
    let mut lambda = config.initial_lambda;
    let mut converged = false;
    let mut iterations = 0;

    'outer: for iter in 0..config.max_iterations {
        iterations = iter + 1;

        let (jtj, gradient) = normal_equations(model, xs, ys, sigmas, &params);
        if chi2 <= config.chi2_floor
            || gradient.amax() <= config.gradient_tolerance * chi2.sqrt().max(1.0)
        {
            converged = true;
            break;
        }

        loop {
            let mut damped = jtj.clone();
            for i in 0..n_params {
                damped[(i, i)] += lambda * jtj[(i, i)].max(MIN_DIAGONAL);
            }

            if let Some(delta) = damped.lu().solve(&gradient) {
                let mut candidate = &params + &delta;
                model.constrain(&mut candidate);
                let candidate_chi2 = compute_chi2(model, xs, ys, sigmas, &candidate);

                if candidate_chi2 < chi2 {
                    let rel_decrease = (chi2 - candidate_chi2) / chi2;
                    let rel_step = candidate
                        .iter()
                        .zip(params.iter())
                        .map(|(c, p)| (c - p).abs() / (p.abs() + 1e-12))
                        .fold(0.0_f64, f64::max);

                    params = candidate;
                    chi2 = candidate_chi2;
                    lambda = (lambda * config.lambda_down).max(config.lambda_min);

                    if rel_decrease < config.chi2_tolerance || rel_step < config.step_tolerance {
                        converged = true;
                        break 'outer;
                    }
                    break;
                }
            }

            lambda *= config.lambda_up;
            if lambda > config.lambda_max {
                break 'outer;
            }
        }
    }

    let (jtj, _) = normal_equations(model, xs, ys, sigmas, &params);
    LmResult {
        params,
        chi2,
        converged,
        iterations,
        jtj,
    }
}

/// Weighted χ² of the model at `params`.
pub fn compute_chi2<M: LmModel>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    sigmas: &[f64],
    params: &DVector<f64>,
) -> f64 {
    xs.iter()
        .zip(ys.iter())
        .zip(sigmas.iter())
        .map(|((&x, &y), &s)| {
            let r = (y - model.evaluate(x, params)) / s;
            r * r
        })
        .sum()
}

/// Weighted `JᵀJ` and gradient `Jᵀr` at `params`.
fn normal_equations<M: LmModel>(
    model: &M,
    xs: &[f64],
    ys: &[f64],
    sigmas: &[f64],
    params: &DVector<f64>,
) -> (DMatrix<f64>, DVector<f64>) {
    let n_params = model.param_count();
    let mut jtj = DMatrix::<f64>::zeros(n_params, n_params);
    let mut gradient = DVector::<f64>::zeros(n_params);
    let mut row = vec![0.0; n_params];

    for ((&x, &y), &s) in xs.iter().zip(ys.iter()).zip(sigmas.iter()) {
        model.jacobian_row(x, params, &mut row);
        let r = (y - model.evaluate(x, params)) / s;
        for i in 0..n_params {
            let ji = row[i] / s;
            gradient[i] += ji * r;
            for j in i..n_params {
                jtj[(i, j)] += ji * row[j] / s;
            }
        }
    }

    for i in 1..n_params {
        for j in 0..i {
            jtj[(i, j)] = jtj[(j, i)];
        }
    }

    (jtj, gradient)
}
