//! Measurement ingest.
//!
//! A camera folder holds one sub-folder per ISO speed, named so that the ISO
//! follows the last occurrence of `iso` (`iso100`, `dark_iso0400`, ...). Each
//! sub-folder carries a `gain_ron.npy` file with `[gain, gain_error, RON, RON_error]`.
//!
//! Behavior:
//! - **Missing file**: kept as a measurement without values (warning logged)
//! - **Unparseable ISO suffix**: folder skipped and reported
//! - **Malformed file** (wrong length or dtype): error, exit code 2
//! - Output is sorted by ISO

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::{GainRon, Measurement};
use crate::error::AppError;
use crate::io::npy::read_f64;

/// File name expected inside every ISO sub-folder.
pub const GAIN_RON_FILE: &str = "gain_ron.npy";

/// A sub-folder that matched `*iso*` but was not used.
#[derive(Debug, Clone)]
pub struct SkippedFolder {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct IngestedData {
    pub folder: PathBuf,
    /// One entry per ISO sub-folder, ascending ISO.
    pub measurements: Vec<Measurement>,
    pub skipped: Vec<SkippedFolder>,
}

impl IngestedData {
    pub fn n_loaded(&self) -> usize {
        self.measurements.iter().filter(|m| m.values.is_some()).count()
    }

    pub fn n_missing(&self) -> usize {
        self.measurements.len() - self.n_loaded()
    }
}

/// Parse the ISO speed that follows the last `iso` in a folder name.
pub fn parse_iso(name: &str) -> Option<u32> {
    let (_, suffix) = name.rsplit_once("iso")?;
    suffix.parse().ok()
}

pub fn load_measurements(folder: &Path) -> Result<IngestedData, AppError> {
    let entries = fs::read_dir(folder)
        .map_err(|e| AppError::new(2, format!("Failed to read folder '{}': {e}", folder.display())))?;

    let mut measurements = Vec::new();
    let mut skipped = Vec::new();

    for entry in entries {
        let entry =
            entry.map_err(|e| AppError::new(2, format!("Failed to list '{}': {e}", folder.display())))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.contains("iso") || !path.is_dir() {
            continue;
        }

        let Some(iso) = parse_iso(&name) else {
            warn!(folder = %path.display(), "cannot parse ISO speed from folder name; skipping");
            skipped.push(SkippedFolder {
                path,
                reason: format!("no integer ISO speed after the last 'iso' in '{name}'"),
            });
            continue;
        };

        measurements.push(load_one(iso, &path.join(GAIN_RON_FILE))?);
    }

    measurements.sort_by(|a, b| a.iso.cmp(&b.iso).then_with(|| a.source.cmp(&b.source)));
    skipped.sort_by(|a, b| a.path.cmp(&b.path));

    if measurements.is_empty() {
        warn!(folder = %folder.display(), "no *iso* sub-folders found");
    }

    Ok(IngestedData {
        folder: folder.to_path_buf(),
        measurements,
        skipped,
    })
}

fn load_one(iso: u32, path: &Path) -> Result<Measurement, AppError> {
    if !path.is_file() {
        warn!(iso, path = %path.display(), "measurement file not found; ISO excluded from the fit");
        return Ok(Measurement::missing(iso, path.to_path_buf()));
    }

    let array = read_f64(path)?;
    let values = GainRon::from_slice(&array.values).ok_or_else(|| {
        AppError::new(
            2,
            format!(
                "'{}' holds {} value(s); expected {} (gain, gain error, RON, RON error).",
                path.display(),
                array.values.len(),
                GainRon::LEN
            ),
        )
    })?;

    debug!(iso, gain = values.gain, gain_error = values.gain_error, "loaded measurement");
    Ok(Measurement::loaded(iso, path.to_path_buf(), values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::npy::write_f64;

    fn write_gain_ron(root: &Path, dir: &str, values: &[f64]) {
        let sub = root.join(dir);
        fs::create_dir_all(&sub).unwrap();
        write_f64(&sub.join(GAIN_RON_FILE), &[values.len() as u64], values).unwrap();
    }

    #[test]
    fn iso_follows_the_last_iso_marker() {
        assert_eq!(parse_iso("iso100"), Some(100));
        assert_eq!(parse_iso("isolated_iso0400"), Some(400));
        assert_eq!(parse_iso("iso"), None);
        assert_eq!(parse_iso("iso100_b"), None);
        assert_eq!(parse_iso("raw"), None);
    }

    #[test]
    fn loads_sorted_and_keeps_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        write_gain_ron(dir.path(), "iso800", &[0.3, 0.01, 2.0, 0.1]);
        write_gain_ron(dir.path(), "iso100", &[2.5, 0.05, 3.0, 0.2]);
        fs::create_dir_all(dir.path().join("iso400")).unwrap();
        fs::create_dir_all(dir.path().join("flat_fields")).unwrap();

        let data = load_measurements(dir.path()).unwrap();
        let isos: Vec<u32> = data.measurements.iter().map(|m| m.iso).collect();
        assert_eq!(isos, vec![100, 400, 800]);
        assert_eq!(data.n_loaded(), 2);
        assert_eq!(data.n_missing(), 1);
        assert!(data.measurements[1].values.is_none());
        assert_eq!(data.measurements[0].values.unwrap().gain, 2.5);
        assert!(data.skipped.is_empty());
    }

    #[test]
    fn unparseable_folders_are_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write_gain_ron(dir.path(), "iso200", &[1.0, 0.02, 3.0, 0.2]);
        fs::create_dir_all(dir.path().join("iso_old")).unwrap();

        let data = load_measurements(dir.path()).unwrap();
        assert_eq!(data.measurements.len(), 1);
        assert_eq!(data.skipped.len(), 1);
    }

    #[test]
    fn wrong_length_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        write_gain_ron(dir.path(), "iso200", &[1.0, 0.02, 3.0]);

        let err = load_measurements(dir.path()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("expected 4"));
    }

    #[test]
    fn missing_folder_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_measurements(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
