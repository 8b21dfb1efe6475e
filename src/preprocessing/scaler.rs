//! Robust feature scaling
//!
//! Centers each channel on its median and divides by its interquartile range.
//! Fitting produces an immutable [`ScalerState`]; applying it never refits.

use super::stats::{quantile_sorted, sorted_present};
use crate::data::TimeSeriesFrame;
use crate::error::{KolosalError, Result};
use ndarray::{Array2, ArrayView2, Axis, Zip};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted location and scale per column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    columns: Vec<String>,
    center: Vec<f64>,
    scale: Vec<f64>,
    n_samples_seen: usize,
}

impl ScalerState {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Per-column medians
    pub fn center(&self) -> &[f64] {
        &self.center
    }

    /// Per-column IQRs (1.0 where the IQR was zero)
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Number of rows the state was fitted on
    pub fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    fn check_width(&self, values: &ArrayView2<'_, f64>) -> Result<()> {
        if values.ncols() != self.columns.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} columns", self.columns.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        Ok(())
    }

    /// Apply `(x - center) / scale` column-wise. Missing cells stay missing.
    pub fn transform(&self, values: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_width(&values)?;
        let mut out = values.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (c, s) = (self.center[j], self.scale[j]);
            col.mapv_inplace(|v| (v - c) / s);
        }
        Ok(out)
    }

    /// Apply `x * scale + center` column-wise
    pub fn inverse_transform(&self, values: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        self.check_width(&values)?;
        let mut out = values.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (c, s) = (self.center[j], self.scale[j]);
            col.mapv_inplace(|v| v * s + c);
        }
        Ok(out)
    }

    /// Inverse-transform values laid out as `[.., n_targets]` for a subset of
    /// columns, e.g. a flattened forecast horizon
    pub fn inverse_transform_columns(
        &self,
        values: ArrayView2<'_, f64>,
        column_indices: &[usize],
    ) -> Result<Array2<f64>> {
        if values.ncols() != column_indices.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} columns", column_indices.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        if let Some(&bad) = column_indices.iter().find(|&&i| i >= self.columns.len()) {
            return Err(KolosalError::IndexOutOfBounds {
                index: bad,
                len: self.columns.len(),
            });
        }
        let mut out = values.to_owned();
        for (mut col, &j) in out.axis_iter_mut(Axis(1)).zip(column_indices) {
            let (c, s) = (self.center[j], self.scale[j]);
            col.mapv_inplace(|v| v * s + c);
        }
        Ok(out)
    }

    /// Scale a frame whose columns match the fitted columns
    pub fn transform_frame(&self, frame: &TimeSeriesFrame) -> Result<TimeSeriesFrame> {
        if frame.columns() != self.columns.as_slice() {
            return Err(KolosalError::ShapeError {
                expected: format!("columns {:?}", self.columns),
                actual: format!("columns {:?}", frame.columns()),
            });
        }
        frame.with_values(self.transform(frame.values().view())?)
    }
}

/// Scaler based on median and interquartile range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustScaler {
    /// Lower and upper quantiles (in [0, 1]) that define the scale
    quantile_range: (f64, f64),
}

impl Default for RobustScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl RobustScaler {
    /// Scaler using the 25th to 75th percentile range
    pub fn new() -> Self {
        Self {
            quantile_range: (0.25, 0.75),
        }
    }

    /// Use a different quantile range for the scale
    pub fn with_quantile_range(mut self, lower: f64, upper: f64) -> Self {
        self.quantile_range = (lower, upper);
        self
    }

    /// Fit median and IQR per column
    pub fn fit(&self, values: ArrayView2<'_, f64>, columns: &[String]) -> Result<ScalerState> {
        if values.ncols() != columns.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", values.ncols()),
            });
        }
        if values.nrows() == 0 {
            return Err(KolosalError::ValidationError(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }
        let (lo, hi) = self.quantile_range;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo >= hi {
            return Err(KolosalError::ConfigError(format!(
                "invalid quantile range ({}, {})",
                lo, hi
            )));
        }

        let params: Vec<(f64, f64)> = (0..values.ncols())
            .into_par_iter()
            .map(|j| {
                let sorted = sorted_present(values.column(j).iter().copied());
                let median = quantile_sorted(&sorted, 0.5).unwrap_or(0.0);
                let iqr = match (quantile_sorted(&sorted, lo), quantile_sorted(&sorted, hi)) {
                    (Some(q1), Some(q3)) => q3 - q1,
                    _ => 1.0,
                };
                (median, if iqr == 0.0 { 1.0 } else { iqr })
            })
            .collect();

        Ok(ScalerState {
            columns: columns.to_vec(),
            center: params.iter().map(|p| p.0).collect(),
            scale: params.iter().map(|p| p.1).collect(),
            n_samples_seen: values.nrows(),
        })
    }

    /// Fit and transform in one step
    pub fn fit_transform(
        &self,
        values: ArrayView2<'_, f64>,
        columns: &[String],
    ) -> Result<(ScalerState, Array2<f64>)> {
        let state = self.fit(values, columns)?;
        let scaled = state.transform(values)?;
        Ok((state, scaled))
    }
}

/// Largest absolute difference between two equally shaped arrays
pub fn max_abs_diff(a: ArrayView2<'_, f64>, b: ArrayView2<'_, f64>) -> f64 {
    let mut worst = 0.0f64;
    Zip::from(&a).and(&b).for_each(|&x, &y| {
        worst = worst.max((x - y).abs());
    });
    worst
}
