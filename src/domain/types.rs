//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for lookup or plotting

use std::path::PathBuf;

use chrono::{DateTime, Local};
use clap::ValueEnum;
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Contents of one `gain_ron.npy` file: `[gain, gain_error, RON, RON_error]`.
///
/// Gain is in e⁻/ADU and read noise in e⁻.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainRon {
    pub gain: f64,
    pub gain_error: f64,
    pub read_noise: f64,
    pub read_noise_error: f64,
}

impl GainRon {
    /// Number of values stored in a `gain_ron.npy` file.
    pub const LEN: usize = 4;

    /// Build from the flat on-disk layout. Returns `None` unless exactly four values are given.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            &[gain, gain_error, read_noise, read_noise_error] => Some(Self {
                gain,
                gain_error,
                read_noise,
                read_noise_error,
            }),
            _ => None,
        }
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.gain, self.gain_error, self.read_noise, self.read_noise_error]
    }
}

/// A value together with its 1σ uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueWithError {
    pub value: f64,
    pub error: f64,
}

/// Gain/read-noise measurement at a single ISO speed.
///
/// `values` is `None` when the source file could not be found. Such entries are
/// kept so reports and plots show the gap, but they never reach the fitter.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub iso: u32,
    pub source: PathBuf,
    pub values: Option<GainRon>,
}

impl Measurement {
    pub fn loaded(iso: u32, source: PathBuf, values: GainRon) -> Self {
        Self {
            iso,
            source,
            values: Some(values),
        }
    }

    pub fn missing(iso: u32, source: PathBuf) -> Self {
        Self {
            iso,
            source,
            values: None,
        }
    }

    /// Inverse gain `1/G` (ADU/e⁻) with error `|σ_G| / G²`.
    ///
    /// `None` when the measurement is missing or the gain is not a usable number.
    pub fn inverse_gain(&self) -> Option<ValueWithError> {
        let v = self.values?;
        if !(v.gain.is_finite() && v.gain != 0.0 && v.gain_error.is_finite()) {
            return None;
        }
        let value = 1.0 / v.gain;
        Some(ValueWithError {
            value,
            error: v.gain_error.abs() * value * value,
        })
    }

    /// Observation used by the fitter, or `None` if this entry must be excluded.
    ///
    /// The inverse-gain error is the fit weight, so it has to be strictly positive.
    pub fn fit_point(&self) -> Option<FitPoint> {
        let inv = self.inverse_gain()?;
        if !(inv.error.is_finite() && inv.error > 0.0) {
            return None;
        }
        Some(FitPoint {
            iso: f64::from(self.iso),
            inverse_gain: inv.value,
            sigma: inv.error,
        })
    }

    /// Read noise converted to ADU (`RON / G`) with propagated error.
    pub fn read_noise_adu(&self) -> Option<ValueWithError> {
        let v = self.values?;
        let inv = self.inverse_gain()?;
        if !(v.read_noise.is_finite() && v.read_noise_error.is_finite()) {
            return None;
        }
        let value = inv.value * v.read_noise;
        let error = (inv.value.powi(2) * v.read_noise_error.powi(2)
            + v.read_noise.powi(2) * inv.error.powi(2))
        .sqrt();
        Some(ValueWithError { value, error })
    }
}

/// A single weighted observation `(iso, 1/G, σ)` that enters the fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitPoint {
    pub iso: f64,
    pub inverse_gain: f64,
    pub sigma: f64,
}

/// Free parameters of the knee model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitParameters {
    pub slope: f64,
    pub offset: f64,
    /// ISO speed above which the inverse gain stays constant.
    pub knee: f64,
}

impl FitParameters {
    /// Starting point of the solver.
    pub const INITIAL: Self = Self {
        slope: 0.1,
        offset: 0.1,
        knee: 200.0,
    };

    pub fn new(slope: f64, offset: f64, knee: f64) -> Self {
        Self { slope, offset, knee }
    }

    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.slope, self.offset, self.knee)
    }
}

/// Parameter covariance matrix, index order `(slope, offset, knee)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamCovariance(pub [[f64; 3]; 3]);

impl ParamCovariance {
    pub fn zeros() -> Self {
        Self([[0.0; 3]; 3])
    }

    pub fn diagonal(var_slope: f64, var_offset: f64, var_knee: f64) -> Self {
        Self([
            [var_slope, 0.0, 0.0],
            [0.0, var_offset, 0.0],
            [0.0, 0.0, var_knee],
        ])
    }

    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = m[(i, j)];
            }
        }
        Self(out)
    }

    pub fn var_slope(&self) -> f64 {
        self.0[0][0]
    }

    pub fn var_offset(&self) -> f64 {
        self.0[1][1]
    }

    pub fn var_knee(&self) -> f64 {
        self.0[2][2]
    }

    /// 1σ parameter errors (square roots of the diagonal).
    pub fn std_errors(&self) -> FitParameters {
        FitParameters::new(
            self.var_slope().max(0.0).sqrt(),
            self.var_offset().max(0.0).sqrt(),
            self.var_knee().max(0.0).sqrt(),
        )
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitQuality {
    /// Coefficient of determination over the fitted points.
    ///
    /// `None` when every fitted inverse gain is identical (zero total variance).
    pub r_squared: Option<f64>,
    /// Weighted sum of squared residuals at the solution.
    pub chi2: f64,
    pub n_used: usize,
    /// Degrees of freedom, `n_used - 3`.
    pub dof: usize,
    pub iterations: usize,
}

/// Output of a successful knee fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KneeFit {
    pub params: FitParameters,
    pub covariance: ParamCovariance,
    pub quality: FitQuality,
    /// ISO speeds that entered the fit, ascending.
    pub used_isos: Vec<u32>,
    /// Starting point of the winning solver run.
    pub seed: FitParameters,
}

/// Which models the linear-vs-knee diagnostic can prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Linear,
    Knee,
}

impl ModelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Linear => "linear",
            ModelKind::Knee => "knee",
        }
    }
}

/// How starting points for the knee fit are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SeedStrategy {
    /// Only the default starting point `(0.1, 0.1, 200)`.
    Initial,
    /// The default starting point plus one knee seed between each pair of
    /// neighbouring measured ISO speeds.
    Midpoints,
}

/// A full run’s configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults and environment).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Camera folder holding the `*iso*` sub-folders.
    pub folder: PathBuf,
    pub seeds: SeedStrategy,

    /// Where the lookup table is written.
    pub lut_path: PathBuf,
    pub export_csv: Option<PathBuf>,
    pub export_fit: Option<PathBuf>,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    /// Upper ISO limits of the plots; every plot kind is drawn once per entry.
    pub plot_xmax: Vec<f64>,
}

/// A saved fit (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub generated_at: DateTime<Local>,
    pub folder: PathBuf,
    pub parameters: FitParameters,
    pub parameter_errors: FitParameters,
    pub covariance: ParamCovariance,
    pub quality: FitQuality,
    pub lut_path: Option<PathBuf>,
}
