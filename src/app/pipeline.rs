//! Shared fit pipeline used by the `fit` and `batch` commands.
//!
//! ingest -> knee fit -> diagnostics -> residuals -> lookup table
//!
//! The commands can then focus on presentation and file output.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::domain::{FitConfig, KneeFit, SeedStrategy, ValueWithError};
use crate::error::AppError;
use crate::fit::{FitOptions, ModelComparison, compare_models, fit_knee_model, fit_points};
use crate::io::ingest::{IngestedData, load_measurements};
use crate::io::lut::write_lut;
use crate::lookup::LookupTable;
use crate::report::{Residual, compute_residuals, mean_read_noise_adu};

/// File name of the per-camera lookup table written by `batch`.
pub const BATCH_LUT_FILE: &str = "gain_lut.npy";

/// All computed outputs of a single fit run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub fit: KneeFit,
    pub comparison: ModelComparison,
    pub residuals: Vec<Residual>,
    pub read_noise: Option<ValueWithError>,
    pub lut: LookupTable,
}

/// Execute the fitting pipeline for one camera folder. Nothing is written.
pub fn run_fit(folder: &Path, seeds: SeedStrategy) -> Result<RunOutput, AppError> {
    // 1) Load per-ISO measurements.
    let ingest = load_measurements(folder)?;
    info!(
        folder = %folder.display(),
        isos = ingest.measurements.len(),
        missing = ingest.n_missing(),
        "loaded measurements"
    );

    // 2) Fit the knee model.
    let opts = FitOptions {
        seeds,
        ..FitOptions::default()
    };
    let fit = fit_knee_model(&ingest.measurements, &opts)?;

    // 3) Diagnostics.
    let points: Vec<_> = fit_points(&ingest.measurements).into_iter().map(|(_, p)| p).collect();
    let comparison = compare_models(&points, &fit);
    let residuals = compute_residuals(&ingest.measurements, &fit);
    let read_noise = mean_read_noise_adu(&ingest.measurements);

    // 4) Lookup table.
    let lut = LookupTable::from_fit(&fit.params, &fit.covariance);

    if fit_is_suspect(&comparison, &lut) {
        let knee_r_squared = comparison.knee_r_squared.unwrap_or(f64::NAN);
        match seeds {
            SeedStrategy::Initial => warn!(
                folder = %folder.display(),
                knee = fit.params.knee,
                knee_r_squared,
                "fit looks wrong (poor R² or non-positive gain in the lookup table); \
                 the solver may have stopped at a local minimum, try --seeds midpoints"
            ),
            SeedStrategy::Midpoints => warn!(
                folder = %folder.display(),
                knee = fit.params.knee,
                knee_r_squared,
                "fit looks wrong (poor R² or non-positive gain in the lookup table)"
            ),
        }
    }

    Ok(RunOutput {
        ingest,
        fit,
        comparison,
        residuals,
        read_noise,
        lut,
    })
}

/// `true` when neither model describes the data or the table holds a gain that
/// is not a positive number.
pub fn fit_is_suspect(comparison: &ModelComparison, lut: &LookupTable) -> bool {
    comparison.preferred.is_none() || lut.rows().iter().any(|r| !(r.gain.is_finite() && r.gain > 0.0))
}

/// Run the pipeline for `config` and write the lookup table.
pub fn run_and_write(config: &FitConfig) -> Result<RunOutput, AppError> {
    let run = run_fit(&config.folder, config.seeds)?;
    write_lut(&config.lut_path, &run.lut)?;
    Ok(run)
}

/// Fit several cameras in parallel, writing `<folder>/gain_lut.npy` for each.
///
/// Results keep the order of `folders`. A failing camera does not stop the others.
pub fn run_batch(folders: &[PathBuf], seeds: SeedStrategy) -> Vec<(PathBuf, Result<KneeFit, AppError>)> {
    folders
        .par_iter()
        .map(|folder| {
            let result = run_fit(folder, seeds).and_then(|run| {
                write_lut(&folder.join(BATCH_LUT_FILE), &run.lut)?;
                Ok(run.fit)
            });
            if let Err(e) = &result {
                error!(folder = %folder.display(), exit_code = e.exit_code(), "{e}");
            }
            (folder.clone(), result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitParameters, ModelKind, ParamCovariance};

    fn comparison(preferred: Option<ModelKind>) -> ModelComparison {
        ModelComparison {
            linear: None,
            knee_r_squared: Some(0.99),
            preferred,
        }
    }

    #[test]
    fn good_fit_is_not_suspect() {
        let lut = LookupTable::from_fit(&FitParameters::new(0.002, 0.1, 800.0), &ParamCovariance::zeros());
        assert!(!fit_is_suspect(&comparison(Some(ModelKind::Knee)), &lut));
    }

    #[test]
    fn negative_offset_local_minimum_is_suspect() {
        // A doubling ladder 100..1600 fit from the single default seed can end
        // here: knee pinned next to the first ISO and a negative offset.
        let lut = LookupTable::from_fit(&FitParameters::new(0.01, -5.69, 107.0), &ParamCovariance::zeros());
        assert!(lut.gain_at(0).unwrap().value < 0.0);
        assert!(fit_is_suspect(&comparison(Some(ModelKind::Knee)), &lut));
    }

    #[test]
    fn no_adequate_model_is_suspect() {
        let lut = LookupTable::from_fit(&FitParameters::new(0.002, 0.1, 800.0), &ParamCovariance::zeros());
        assert!(fit_is_suspect(&comparison(None), &lut));
    }
}
