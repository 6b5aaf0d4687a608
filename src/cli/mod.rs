//! Command-line parsing for the gain/ISO calibration tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::SeedStrategy;
use crate::io::lut::DEFAULT_LUT_PATH;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "giso", version, about = "Fit the ISO/gain knee model and build a gain lookup table")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit one camera folder, print diagnostics/plots, and write the lookup table.
    Fit(FitArgs),
    /// Fit several camera folders in parallel; one lookup table per folder.
    Batch(BatchArgs),
    /// Look up the gain at an ISO speed in a saved lookup table.
    Lookup(LookupArgs),
    /// Plot a saved lookup table.
    Plot(PlotArgs),
    /// Write a synthetic dataset in the layout `fit` expects.
    Simulate(SimulateArgs),
}

/// Solver options shared by `fit` and `batch`.
#[derive(Debug, Args, Clone)]
pub struct SolverArgs {
    /// Starting points for the knee fit.
    #[arg(long, value_enum, default_value_t = SeedStrategy::Initial)]
    pub seeds: SeedStrategy,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Camera folder containing `*iso*` sub-folders with `gain_ron.npy` files.
    pub folder: PathBuf,

    #[command(flatten)]
    pub solver: SolverArgs,

    /// Where to write the lookup table.
    #[arg(long, env = "GISO_LUT_PATH", default_value = DEFAULT_LUT_PATH)]
    pub lut: PathBuf,

    /// Export per-ISO measurements and fitted values to CSV.
    #[arg(long = "export-csv")]
    pub export_csv: Option<PathBuf>,

    /// Export the fit (parameters, covariance, quality) to JSON.
    #[arg(long = "export-fit")]
    pub export_fit: Option<PathBuf>,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Upper ISO limit of the plots; repeat for several zoom levels.
    #[arg(long = "xmax", default_values_t = [1850.0, 250.0])]
    pub xmax: Vec<f64>,
}

#[derive(Debug, Parser, Clone)]
pub struct BatchArgs {
    /// Camera folders to fit.
    #[arg(required = true)]
    pub folders: Vec<PathBuf>,

    #[command(flatten)]
    pub solver: SolverArgs,
}

#[derive(Debug, Parser)]
pub struct LookupArgs {
    /// Lookup table produced by `giso fit`.
    #[arg(long, env = "GISO_LUT_PATH", default_value = DEFAULT_LUT_PATH)]
    pub lut: PathBuf,

    /// ISO speed(s) to look up (comma separated).
    #[arg(long, value_delimiter = ',', required = true)]
    pub iso: Vec<u32>,

    /// Also print these values normalised by the gain at the matching `--iso`
    /// (comma separated, one per ISO speed).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub value: Vec<f64>,
}

#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Lookup table produced by `giso fit`.
    #[arg(long, env = "GISO_LUT_PATH", default_value = DEFAULT_LUT_PATH)]
    pub lut: PathBuf,

    /// Upper ISO limit (defaults to the end of the table).
    #[arg(long)]
    pub xmax: Option<f64>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

#[derive(Debug, Parser)]
pub struct SimulateArgs {
    /// Output folder (created if missing).
    pub out: PathBuf,

    #[arg(long, default_value_t = 0.01)]
    pub slope: f64,

    #[arg(long, default_value_t = 0.2)]
    pub offset: f64,

    #[arg(long, default_value_t = 300.0)]
    pub knee: f64,

    /// Relative Gaussian noise on the gain.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// Read noise in ADU.
    #[arg(long = "read-noise", default_value_t = 2.0)]
    pub read_noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// ISO speeds to generate (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub isos: Option<Vec<u32>>,

    /// ISO speeds to leave without a measurement file (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub missing: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_defaults_draw_two_plot_windows() {
        let cli = Cli::try_parse_from(["giso", "fit", "data/phone", "--lut", "out/LUT.npy"]).unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.folder, PathBuf::from("data/phone"));
        assert_eq!(args.xmax, vec![1850.0, 250.0]);
        assert_eq!(args.solver.seeds, SeedStrategy::Initial);
        assert_eq!(args.lut, PathBuf::from("out/LUT.npy"));
        assert!(!args.no_plot);
    }

    #[test]
    fn seeds_and_xmax_are_configurable() {
        let cli = Cli::try_parse_from([
            "giso", "fit", "cam", "--seeds", "midpoints", "--xmax", "500", "--lut", "x.npy",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.solver.seeds, SeedStrategy::Midpoints);
        assert_eq!(args.xmax, vec![500.0]);
    }

    #[test]
    fn simulate_takes_comma_separated_isos() {
        let cli = Cli::try_parse_from(["giso", "simulate", "out", "--isos", "100,200,400", "--missing", "200"]).unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.isos, Some(vec![100, 200, 400]));
        assert_eq!(args.missing, vec![200]);
    }

    #[test]
    fn lookup_pairs_values_with_iso_speeds() {
        let cli = Cli::try_parse_from([
            "giso", "lookup", "--lut", "LUT.npy", "--iso", "100,800", "--value", "12.5,-3",
        ])
        .unwrap();
        let Command::Lookup(args) = cli.command else {
            panic!("expected lookup");
        };
        assert_eq!(args.iso, vec![100, 800]);
        assert_eq!(args.value, vec![12.5, -3.0]);

        assert!(Cli::try_parse_from(["giso", "lookup", "--lut", "LUT.npy"]).is_err());
    }

    #[test]
    fn batch_requires_a_folder() {
        assert!(Cli::try_parse_from(["giso", "batch"]).is_err());
    }
}
