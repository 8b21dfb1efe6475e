//! IQR-based outlier row filter
//!
//! A row is dropped when any channel falls outside
//! `[Q1 - factor * IQR, Q3 + factor * IQR]`. Missing cells never cause a drop,
//! and a column whose IQR is zero is left unfiltered.

use super::stats::{quantile_sorted, sorted_present};
use crate::data::TimeSeriesFrame;
use crate::error::{KolosalError, Result};
use ndarray::Axis;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Fitted bounds for a column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    fn from_quartiles(q1: f64, q3: f64, factor: f64) -> Self {
        let iqr = q3 - q1;
        if iqr == 0.0 {
            return Self {
                q1,
                q3,
                iqr,
                lower: f64::NEG_INFINITY,
                upper: f64::INFINITY,
            };
        }
        Self {
            q1,
            q3,
            iqr,
            lower: q1 - factor * iqr,
            upper: q3 + factor * iqr,
        }
    }

    /// Bounds that accept every value, used for columns with no observations
    fn unbounded() -> Self {
        Self {
            q1: f64::NAN,
            q3: f64::NAN,
            iqr: f64::NAN,
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    /// Whether an observed value lies outside the bounds
    #[inline]
    pub fn is_outlier(&self, v: f64) -> bool {
        !v.is_nan() && (v < self.lower || v > self.upper)
    }
}

/// Summary of one filtering pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub rows_before: usize,
    pub rows_removed: usize,
    /// Columns whose IQR is zero and were therefore not filtered
    pub zero_iqr_columns: Vec<String>,
    /// Rows removed because of each column
    pub removed_per_column: HashMap<String, usize>,
}

/// Outlier detector that removes rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierFilter {
    factor: f64,
    columns: Vec<String>,
    bounds: Vec<OutlierBounds>,
    is_fitted: bool,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(1.5)
    }
}

impl OutlierFilter {
    /// Create a filter with the given IQR multiplier
    pub fn new(factor: f64) -> Self {
        Self {
            factor,
            columns: Vec::new(),
            bounds: Vec::new(),
            is_fitted: false,
        }
    }

    /// Compute per-channel bounds
    pub fn fit(&mut self, frame: &TimeSeriesFrame) -> Result<&mut Self> {
        self.columns = frame.columns().to_vec();
        self.bounds = frame
            .values()
            .axis_iter(Axis(1))
            .map(|col| {
                let sorted = sorted_present(col.iter().copied());
                match (quantile_sorted(&sorted, 0.25), quantile_sorted(&sorted, 0.75)) {
                    (Some(q1), Some(q3)) => OutlierBounds::from_quartiles(q1, q3, self.factor),
                    _ => OutlierBounds::unbounded(),
                }
            })
            .collect();

        self.is_fitted = true;
        Ok(self)
    }

    /// Drop rows where any channel is out of bounds
    pub fn filter(&self, frame: &TimeSeriesFrame) -> Result<(TimeSeriesFrame, OutlierReport)> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }
        if frame.columns() != self.columns.as_slice() {
            return Err(KolosalError::ShapeError {
                expected: format!("columns {:?}", self.columns),
                actual: format!("columns {:?}", frame.columns()),
            });
        }

        let mut removed_per_column: HashMap<String, usize> = HashMap::new();
        let mask: Vec<bool> = frame
            .values()
            .axis_iter(Axis(0))
            .map(|row| {
                let mut keep = true;
                for ((v, bounds), name) in row.iter().zip(&self.bounds).zip(&self.columns) {
                    if bounds.is_outlier(*v) {
                        *removed_per_column.entry(name.clone()).or_insert(0) += 1;
                        keep = false;
                    }
                }
                keep
            })
            .collect();

        let filtered = frame.select_rows(&mask)?;

        let zero_iqr_columns: Vec<String> = self
            .columns
            .iter()
            .zip(&self.bounds)
            .filter(|(_, b)| b.iqr == 0.0)
            .map(|(name, _)| name.clone())
            .collect();
        for column in &zero_iqr_columns {
            warn!(column = %column, "IQR is zero; outlier filter skipped for this column");
        }

        let report = OutlierReport {
            rows_before: frame.n_rows(),
            rows_removed: frame.n_rows() - filtered.n_rows(),
            zero_iqr_columns,
            removed_per_column,
        };
        debug!(
            rows_before = report.rows_before,
            rows_removed = report.rows_removed,
            "Outlier filter applied"
        );

        Ok((filtered, report))
    }

    /// Fit and filter in one step
    pub fn fit_filter(&mut self, frame: &TimeSeriesFrame) -> Result<(TimeSeriesFrame, OutlierReport)> {
        self.fit(frame)?;
        self.filter(frame)
    }

    /// Bounds for a named column
    pub fn bounds(&self, column: &str) -> Option<&OutlierBounds> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.bounds[i])
    }
}
