//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use std::path::{Path, PathBuf};

use crate::domain::{KneeFit, Measurement, ValueWithError};
use crate::error::AppError;
use crate::fit::ModelComparison;
use crate::io::ingest::IngestedData;
use crate::report::{Residual, residual_rms};

/// Format the full run summary (dataset + fitted parameters + diagnostics).
pub fn format_run_summary(
    ingest: &IngestedData,
    fit: &KneeFit,
    comparison: &ModelComparison,
    residuals: &[Residual],
    read_noise: Option<ValueWithError>,
    lut_path: Option<&Path>,
) -> String {
    let mut out = String::new();

    out.push_str("=== giso - gain vs ISO calibration ===\n");
    out.push_str(&format!("Folder: {}\n", ingest.folder.display()));
    out.push_str(&format!(
        "Measurements: {} ISO folder(s) | loaded={} missing={} used={}\n",
        ingest.measurements.len(),
        ingest.n_loaded(),
        ingest.n_missing(),
        fit.quality.n_used,
    ));
    if let (Some(first), Some(last)) = (fit.used_isos.first(), fit.used_isos.last()) {
        out.push_str(&format!("ISO range used: [{first}, {last}]\n"));
    }
    for s in &ingest.skipped {
        out.push_str(&format!("  (skipped {}) {}\n", s.path.display(), s.reason));
    }

    let err = fit.covariance.std_errors();
    out.push_str("\nKnee model: 1/G = slope * ISO + offset below the knee, constant above\n");
    out.push_str(&format!("- slope : {:.6} ± {:.6}\n", fit.params.slope, err.slope));
    out.push_str(&format!("- offset: {:.4} ± {:.4}\n", fit.params.offset, err.offset));
    out.push_str(&format!("- knee  : {:.1} ± {:.1}\n", fit.params.knee, err.knee));
    out.push_str(&format!(
        "- R2={} chi2={:.3} dof={} iterations={}\n",
        fmt_opt(fit.quality.r_squared, 4),
        fit.quality.chi2,
        fit.quality.dof,
        fit.quality.iterations,
    ));
    out.push_str(&format!("- residual RMS: {} ADU/e-\n", fmt_opt(residual_rms(residuals), 5)));

    out.push_str("\nModel diagnostics:\n");
    match comparison.linear {
        Some(l) => out.push_str(&format!(
            "  linear       slope={:.6} offset={:.4} R2={}\n",
            l.slope,
            l.offset,
            fmt_opt(l.r_squared, 4)
        )),
        None => out.push_str("  linear       (not enough points)\n"),
    }
    out.push_str(&format!("  knee         R2={}\n", fmt_opt(comparison.knee_r_squared, 4)));
    out.push_str(&format!(
        "  preferred    {}\n",
        comparison.preferred.map(|k| k.display_name()).unwrap_or("none (R2 < 0.9)")
    ));

    if let Some(ron) = read_noise {
        out.push_str(&format!("\nMean read noise: {:.3} ± {:.3} ADU\n", ron.value, ron.error));
    }
    if let Some(path) = lut_path {
        out.push_str(&format!("\nLookup table: {}\n", path.display()));
    }
    out.push('\n');

    out
}

/// Per-ISO table of measured and fitted values.
pub fn format_measurements(measurements: &[Measurement], residuals: &[Residual]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>6} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:<5}\n",
            "iso", "gain", "gain_err", "1/G", "1/G_err", "RON/G", "fit", "used"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<6} {:-<9} {:-<9} {:-<9} {:-<9} {:-<9} {:-<9} {:-<5}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for m in measurements {
        let inv = m.inverse_gain();
        let fitted = residuals.iter().find(|r| r.iso == m.iso).map(|r| r.fitted);
        out.push_str(
            format!(
                "{:>6} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:<5}\n",
                m.iso,
                fmt_opt(m.values.map(|v| v.gain), 4),
                fmt_opt(m.values.map(|v| v.gain_error), 4),
                fmt_opt(inv.map(|v| v.value), 4),
                fmt_opt(inv.map(|v| v.error), 4),
                fmt_opt(m.read_noise_adu().map(|v| v.value), 3),
                fmt_opt(fitted, 4),
                if m.fit_point().is_some() { "yes" } else { "no" },
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// One row per camera folder of a batch run.
pub fn format_batch_summary(results: &[(PathBuf, Result<KneeFit, AppError>)]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<32} {:>10} {:>8} {:>8} {:>8} {:>4}  {}\n",
            "folder", "slope", "offset", "knee", "R2", "n", "status"
        )
        .trim_end(),
    );
    out.push('\n');

    for (folder, result) in results {
        let name = truncate(&folder.display().to_string(), 32);
        let line = match result {
            Ok(fit) => format!(
                "{:<32} {:>10.6} {:>8.4} {:>8.1} {:>8} {:>4}  ok",
                name,
                fit.params.slope,
                fit.params.offset,
                fit.params.knee,
                fmt_opt(fit.quality.r_squared, 4),
                fit.quality.n_used,
            ),
            Err(e) => format!("{:<32} {:>10} {:>8} {:>8} {:>8} {:>4}  error: {e}", name, "-", "-", "-", "-", "-"),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

fn fmt_opt(v: Option<f64>, decimals: usize) -> String {
    match v {
        Some(x) if x.is_finite() => format!("{x:.decimals$}"),
        Some(x) => format!("{x}"),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
