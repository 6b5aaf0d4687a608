//! Dense gain lookup table.
//!
//! One row per integer ISO speed in `0..LUT_ISO_COUNT`:
//!
//! ```text
//! (iso, gain = 1 / model(iso), gain_error = model_error(iso))
//! ```
//!
//! `gain_error` is the uncertainty of the inverse gain. It is not propagated
//! through the inversion, so files written by older calibration runs keep the
//! same meaning.

use crate::domain::{FitParameters, ParamCovariance, ValueWithError};
use crate::error::AppError;
use crate::models::{inverse_gain, inverse_gain_error};

/// Number of rows in a lookup table (ISO 0 to 1999).
pub const LUT_ISO_COUNT: usize = 2000;

/// Number of columns per row when stored as an array: `(iso, gain, gain_error)`.
pub const LUT_FIELDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LutRow {
    pub iso: u32,
    pub gain: f64,
    pub gain_error: f64,
}

/// Immutable gain lookup table, ordered by ISO.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    rows: Vec<LutRow>,
}

impl LookupTable {
    pub fn from_fit(params: &FitParameters, cov: &ParamCovariance) -> Self {
        let rows = (0..LUT_ISO_COUNT as u32)
            .map(|iso| {
                let x = f64::from(iso);
                LutRow {
                    iso,
                    gain: 1.0 / inverse_gain(x, params),
                    gain_error: inverse_gain_error(x, params, cov),
                }
            })
            .collect();
        Self { rows }
    }

    /// Rebuild a table from its `(3, N)` row-major array form.
    ///
    /// The ISO column must hold non-negative integers in strictly increasing order.
    pub fn from_flat(values: &[f64], n: usize) -> Result<Self, AppError> {
        if values.len() != LUT_FIELDS * n {
            return Err(AppError::new(
                2,
                format!(
                    "Lookup table holds {} values, expected {} for shape ({LUT_FIELDS}, {n}).",
                    values.len(),
                    LUT_FIELDS * n
                ),
            ));
        }

        let (isos, rest) = values.split_at(n);
        let (gains, errors) = rest.split_at(n);

        let mut rows: Vec<LutRow> = Vec::with_capacity(n);
        for ((&iso, &gain), &gain_error) in isos.iter().zip(gains).zip(errors) {
            if !(iso.is_finite() && iso >= 0.0 && iso.fract() == 0.0 && iso <= f64::from(u32::MAX)) {
                return Err(AppError::new(2, format!("Lookup table contains invalid ISO value {iso}.")));
            }
            let iso = iso as u32;
            if rows.last().is_some_and(|prev| prev.iso >= iso) {
                return Err(AppError::new(2, "Lookup table ISO column is not strictly increasing."));
            }
            rows.push(LutRow { iso, gain, gain_error });
        }
        Ok(Self { rows })
    }

    /// Row-major `(3, N)` array form: all ISOs, then all gains, then all errors.
    pub fn to_flat(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(LUT_FIELDS * self.rows.len());
        out.extend(self.rows.iter().map(|r| f64::from(r.iso)));
        out.extend(self.rows.iter().map(|r| r.gain));
        out.extend(self.rows.iter().map(|r| r.gain_error));
        out
    }

    pub fn rows(&self) -> &[LutRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Gain and its error at `iso`.
    pub fn gain_at(&self, iso: u32) -> Result<ValueWithError, AppError> {
        let idx = self
            .rows
            .binary_search_by_key(&iso, |r| r.iso)
            .map_err(|_| self.out_of_range(iso))?;
        let row = self.rows[idx];
        Ok(ValueWithError {
            value: row.gain,
            error: row.gain_error,
        })
    }

    /// Divide `value` by the gain at `iso`.
    pub fn normalise(&self, value: f64, iso: u32) -> Result<f64, AppError> {
        Ok(value / self.gain_at(iso)?.value)
    }

    /// Normalise each value by the gain at its own ISO speed.
    pub fn normalise_many(&self, values: &[f64], isos: &[u32]) -> Result<Vec<f64>, AppError> {
        if values.len() != isos.len() {
            return Err(AppError::new(
                2,
                format!("Got {} values but {} ISO speeds.", values.len(), isos.len()),
            ));
        }
        values
            .iter()
            .zip(isos)
            .map(|(&v, &iso)| self.normalise(v, iso))
            .collect()
    }

    fn out_of_range(&self, iso: u32) -> AppError {
        match (self.rows.first(), self.rows.last()) {
            (Some(first), Some(last)) => AppError::new(
                2,
                format!("ISO {iso} is not in the lookup table (covers {} to {}).", first.iso, last.iso),
            ),
            _ => AppError::new(2, "Lookup table is empty."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> (FitParameters, LookupTable) {
        let params = FitParameters::new(0.01, 0.2, 300.0);
        let cov = ParamCovariance::diagonal(1e-8, 1e-4, 25.0);
        (params, LookupTable::from_fit(&params, &cov))
    }

    #[test]
    fn covers_iso_zero_to_1999_in_order() {
        let (_, lut) = table();
        assert_eq!(lut.len(), LUT_ISO_COUNT);
        assert_eq!(lut.rows()[0].iso, 0);
        assert_eq!(lut.rows()[LUT_ISO_COUNT - 1].iso, 1999);
        assert!(lut.rows().windows(2).all(|w| w[0].iso < w[1].iso));
    }

    #[test]
    fn gain_is_reciprocal_of_model() {
        let (params, lut) = table();
        for row in lut.rows() {
            assert_eq!(row.gain, 1.0 / inverse_gain(f64::from(row.iso), &params));
            assert!(row.gain_error >= 0.0);
        }
        // Saturated beyond the knee.
        assert_eq!(lut.gain_at(300).unwrap(), lut.gain_at(1999).unwrap());
    }

    #[test]
    fn lookup_outside_the_table_is_an_input_error() {
        let (_, lut) = table();
        let err = lut.gain_at(2000).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.message().contains("0 to 1999"));
    }

    #[test]
    fn normalisation_divides_by_gain() {
        let (_, lut) = table();
        // 1/G at ISO 100 = 1.2
        let v = lut.normalise(12.0, 100).unwrap();
        assert!((v - 12.0 * 1.2).abs() < 1e-12);

        let many = lut.normalise_many(&[1.0, 1.0], &[0, 400]).unwrap();
        assert!((many[0] - 0.2).abs() < 1e-12);
        assert!((many[1] - 3.2).abs() < 1e-12);

        assert!(lut.normalise_many(&[1.0], &[0, 1]).is_err());
    }

    #[test]
    fn flat_form_round_trips() {
        let (_, lut) = table();
        let flat = lut.to_flat();
        assert_eq!(flat.len(), LUT_FIELDS * LUT_ISO_COUNT);
        assert_eq!(flat[1999], 1999.0);
        let back = LookupTable::from_flat(&flat, LUT_ISO_COUNT).unwrap();
        assert_eq!(back, lut);
    }

    #[test]
    fn flat_form_rejects_unordered_isos() {
        let flat = [1.0, 0.0, 2.0, 2.0, 0.1, 0.1];
        assert!(LookupTable::from_flat(&flat, 2).is_err());
        assert!(LookupTable::from_flat(&flat, 3).is_err());
    }
}
