//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - measured points: `o`
//! - fitted curve / lookup table: `-` line
//! - 1σ envelope of the fitted curve: `.` lines

use crate::domain::{KneeFit, Measurement};
use crate::lookup::LookupTable;
use crate::models::{inverse_gain, inverse_gain_error};

/// Quantity on the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    /// `1/G` in ADU/e⁻.
    InverseGain,
    /// `G` in e⁻/ADU.
    Gain,
    /// Read noise in e⁻ (measurements only).
    ReadNoise,
    /// Read noise in ADU, `RON/G` (measurements only).
    ReadNoiseAdu,
}

impl PlotKind {
    /// Every plot drawn per ISO window by `giso fit`.
    pub const ALL: [PlotKind; 4] = [
        PlotKind::InverseGain,
        PlotKind::Gain,
        PlotKind::ReadNoise,
        PlotKind::ReadNoiseAdu,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PlotKind::InverseGain => "1/G [ADU/e-]",
            PlotKind::Gain => "G [e-/ADU]",
            PlotKind::ReadNoise => "RON [e-]",
            PlotKind::ReadNoiseAdu => "RON/G [ADU]",
        }
    }

    fn measured(self, m: &Measurement) -> Option<f64> {
        match self {
            PlotKind::InverseGain => m.inverse_gain().map(|v| v.value),
            PlotKind::Gain => m.inverse_gain().map(|v| 1.0 / v.value),
            PlotKind::ReadNoise => m.values.map(|v| v.read_noise),
            PlotKind::ReadNoiseAdu => m.read_noise_adu().map(|v| v.value),
        }
    }

    /// Fitted value and its 1σ error, for quantities the knee model predicts.
    fn model(self, iso: f64, fit: &KneeFit) -> Option<(f64, f64)> {
        let inv = inverse_gain(iso, &fit.params);
        let err = inverse_gain_error(iso, &fit.params, &fit.covariance);
        match self {
            PlotKind::InverseGain => Some((inv, err)),
            PlotKind::Gain => Some((1.0 / inv, err / (inv * inv))),
            PlotKind::ReadNoise | PlotKind::ReadNoiseAdu => None,
        }
    }
}

/// Plot measurements over ISO `[0, xmax]`, with the fitted curve and its 1σ
/// envelope where the model predicts the plotted quantity.
///
/// Measurements outside the window or without a usable value are not drawn.
pub fn render_fit_plot(
    measurements: &[Measurement],
    fit: &KneeFit,
    kind: PlotKind,
    xmax: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let points: Vec<(f64, f64)> = measurements
        .iter()
        .filter_map(|m| Some((f64::from(m.iso), kind.measured(m)?)))
        .filter(|&(x, y)| x <= xmax && y.is_finite())
        .collect();

    let mut curve = Vec::new();
    let mut lower = Vec::new();
    let mut upper = Vec::new();
    for i in 0..width {
        let iso = xmax * i as f64 / (width as f64 - 1.0);
        let Some((y, err)) = kind.model(iso, fit) else {
            continue;
        };
        if !(y.is_finite() && err.is_finite()) {
            continue;
        }
        curve.push((iso, y));
        lower.push((iso, y - err));
        upper.push((iso, y + err));
    }

    render_plot(
        &points,
        &curve,
        Some((lower.as_slice(), upper.as_slice())),
        0.0,
        xmax,
        width,
        height,
        kind.label(),
    )
}

/// Plot the gain column of a lookup table (curve only).
pub fn render_lut_plot(lut: &LookupTable, xmax: Option<f64>, width: usize, height: usize) -> String {
    let last_iso = lut.rows().last().map(|r| f64::from(r.iso)).unwrap_or(1.0);
    let xmax = xmax.unwrap_or(last_iso).max(1.0);
    let curve: Vec<(f64, f64)> = lut
        .rows()
        .iter()
        .map(|r| (f64::from(r.iso), r.gain))
        .filter(|&(x, y)| x <= xmax && y.is_finite())
        .collect();

    render_plot(&[], &curve, None, 0.0, xmax, width, height, PlotKind::Gain.label())
}

#[allow(clippy::too_many_arguments)]
fn render_plot(
    points: &[(f64, f64)],
    curve: &[(f64, f64)],
    band: Option<(&[(f64, f64)], &[(f64, f64)])>,
    x_min: f64,
    x_max: f64,
    width: usize,
    height: usize,
    label: &str,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let (lower, upper) = band.unwrap_or_default();
    let all = points.iter().chain(curve).chain(lower).chain(upper);
    let (y_min, y_max) = y_range(all).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Curve first, then the envelope around it, then points on top.
    draw_curve(&mut grid, curve, '-', x_min, x_max, y_min, y_max);
    draw_curve(&mut grid, lower, '.', x_min, x_max, y_min, y_max);
    draw_curve(&mut grid, upper, '.', x_min, x_max, y_min, y_max);

    for &(x, y) in points {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        grid[row][col] = 'o';
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {label} vs ISO | iso=[{x_min:.0}, {x_max:.0}] | y=[{y_min:.3}, {y_max:.3}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn y_range<'a>(values: impl Iterator<Item = &'a (f64, f64)>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(_, y) in values {
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else if min_y.is_finite() && max_y.is_finite() {
        // Flat data: give it some room.
        Some((min_y - 0.5, max_y + 0.5))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(
    grid: &mut [Vec<char>],
    curve: &[(f64, f64)],
    ch: char,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(x, y) in curve {
        let col = map_x(x, x_min, x_max, width);
        let row = map_y(y, y_min, y_max, height);
        if let Some((c0, r0)) = prev {
            draw_line(grid, c0, r0, col, row, ch);
        } else if grid[row][col] == ' ' {
            grid[row][col] = ch;
        }
        prev = Some((col, row));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
