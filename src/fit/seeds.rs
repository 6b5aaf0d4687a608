//! Starting points for the knee fit.
//!
//! The knee model is piecewise linear, so the solver can stop at a kink where
//! the wrong set of ISO speeds sits on the saturated branch. Trying a knee
//! seed between every pair of neighbouring ISO speeds covers each possible
//! split of the data once.

use crate::domain::{FitParameters, SeedStrategy};

/// Build the list of starting points. The configured initial guess always comes first.
pub fn knee_seeds(initial: FitParameters, strategy: SeedStrategy, isos: &[f64]) -> Vec<FitParameters> {
    let mut out = vec![initial];
    if strategy == SeedStrategy::Initial {
        return out;
    }

    let mut distinct: Vec<f64> = isos.iter().copied().filter(|v| v.is_finite()).collect();
    distinct.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    distinct.dedup();

    out.extend(
        distinct
            .windows(2)
            .map(|w| FitParameters::new(initial.slope, initial.offset, 0.5 * (w[0] + w[1]))),
    );
    out
}
