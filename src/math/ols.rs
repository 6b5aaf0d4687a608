//! Weighted linear least squares.
//!
//! Used for the straight-line diagnostic fit of inverse gain against ISO:
//!
//! ```text
//! minimize Σ ((y_i - x_i^T β) / σ_i)^2
//! ```
//!
//! Rows are scaled by `1/σ_i` and the resulting ordinary least squares problem is
//! solved by SVD, which copes with tall design matrices and near-collinear
//! columns. (Nalgebra's `QR::solve` is intended for square systems and will
//! panic for non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Weighted straight-line fit `y = slope * x + offset`.
///
/// Returns `(slope, offset)`, or `None` for fewer than two points or a degenerate system.
pub fn fit_line(xs: &[f64], ys: &[f64], sigmas: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len();
    if n < 2 || ys.len() != n || sigmas.len() != n {
        return None;
    }

    let mut xw = DMatrix::<f64>::zeros(n, 2);
    let mut yw = DVector::<f64>::zeros(n);
    for i in 0..n {
        let w = 1.0 / sigmas[i];
        xw[(i, 0)] = xs[i] * w;
        xw[(i, 1)] = w;
        yw[i] = ys[i] * w;
    }

    let beta = solve_least_squares(&xw, &yw)?;
    Some((beta[0], beta[1]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn weighted_line_recovers_exact_data() {
        let xs = [100.0, 200.0, 400.0, 800.0];
        let ys: Vec<f64> = xs.iter().map(|x| 0.004 * x + 0.05).collect();
        let sigmas = [0.01, 0.02, 0.05, 0.1];

        let (slope, offset) = fit_line(&xs, &ys, &sigmas).unwrap();
        assert!((slope - 0.004).abs() < 1e-10);
        assert!((offset - 0.05).abs() < 1e-10);
    }

    #[test]
    fn line_needs_two_points() {
        assert!(fit_line(&[1.0], &[1.0], &[1.0]).is_none());
    }
}
