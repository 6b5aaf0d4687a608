//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the fit pipeline
//! - prints reports/plots
//! - writes the lookup table and optional exports

use clap::Parser;
use tracing::info;

use crate::cli::{BatchArgs, Command, FitArgs, LookupArgs, PlotArgs, SimulateArgs};
use crate::data::{DEFAULT_ISOS, SyntheticSpec, write_dataset};
use crate::domain::{FitConfig, FitParameters};
use crate::error::AppError;
use crate::plot::{PlotKind, render_fit_plot, render_lut_plot};

pub mod pipeline;

/// Entry point for the `giso` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    crate::logger::init();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Batch(args) => handle_batch(args),
        Command::Lookup(args) => handle_lookup(args),
        Command::Plot(args) => handle_plot(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_and_write(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(
            &run.ingest,
            &run.fit,
            &run.comparison,
            &run.residuals,
            run.read_noise,
            Some(config.lut_path.as_path()),
        )
    );
    println!("{}", crate::report::format_measurements(&run.ingest.measurements, &run.residuals));

    if config.plot {
        for &xmax in &config.plot_xmax {
            for kind in PlotKind::ALL {
                let plot = render_fit_plot(
                    &run.ingest.measurements,
                    &run.fit,
                    kind,
                    xmax,
                    config.plot_width,
                    config.plot_height,
                );
                println!("{plot}");
            }
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_csv {
        crate::io::export::write_measurements_csv(path, &run.ingest.measurements, &run.fit)?;
        info!(path = %path.display(), "wrote measurement CSV");
    }
    if let Some(path) = &config.export_fit {
        let record = crate::io::fit_json::fit_file(&run.fit, &config.folder, Some(config.lut_path.as_path()));
        crate::io::fit_json::write_fit_json(path, &record)?;
        info!(path = %path.display(), "wrote fit JSON");
    }

    Ok(())
}

fn handle_batch(args: BatchArgs) -> Result<(), AppError> {
    let results = pipeline::run_batch(&args.folders, args.solver.seeds);
    println!("{}", crate::report::format_batch_summary(&results));

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    if failed == 0 {
        return Ok(());
    }
    // Report the most severe failure class.
    let exit_code = results
        .iter()
        .filter_map(|(_, r)| r.as_ref().err().map(AppError::exit_code))
        .max()
        .unwrap_or(4);
    Err(AppError::new(
        exit_code,
        format!("{failed} of {} camera folder(s) failed.", results.len()),
    ))
}

fn handle_lookup(args: LookupArgs) -> Result<(), AppError> {
    let lut = crate::io::lut::read_lut(&args.lut)?;
    for &iso in &args.iso {
        let gain = lut.gain_at(iso)?;
        println!("ISO {iso}: gain = {:.6} ± {:.6} e-/ADU", gain.value, gain.error);
    }

    if !args.value.is_empty() {
        let normalised = lut.normalise_many(&args.value, &args.iso)?;
        for ((value, iso), n) in args.value.iter().zip(&args.iso).zip(normalised) {
            println!("ISO {iso}: {value} -> normalised {n:.6}");
        }
    }
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let lut = crate::io::lut::read_lut(&args.lut)?;
    let plot = render_lut_plot(&lut, args.xmax, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spec = SyntheticSpec {
        params: FitParameters::new(args.slope, args.offset, args.knee),
        noise: args.noise,
        read_noise_adu: args.read_noise,
        isos: args.isos.unwrap_or_else(|| DEFAULT_ISOS.to_vec()),
        missing: args.missing,
        seed: args.seed,
    };
    let written = write_dataset(&spec, &args.out)?;
    println!(
        "Wrote {} ISO folder(s) to {}",
        written.len(),
        args.out.display()
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    if let Some(bad) = args.xmax.iter().find(|x| !(x.is_finite() && **x > 0.0)) {
        return Err(AppError::new(2, format!("Plot ISO limit must be finite and > 0, got {bad}.")));
    }

    Ok(FitConfig {
        folder: args.folder.clone(),
        seeds: args.solver.seeds,
        lut_path: args.lut.clone(),
        export_csv: args.export_csv.clone(),
        export_fit: args.export_fit.clone(),
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        plot_xmax: args.xmax.clone(),
    })
}
