//! In-memory time-ordered table

use crate::error::{KolosalError, Result};
use chrono::NaiveDateTime;
use ndarray::{s, Array2, ArrayView1, Axis};
use polars::prelude::*;
use std::ops::Range;

/// Format used when timestamps are written back out
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A table of float channels keyed by timestamp.
///
/// Values are stored row-major as `[n_rows, n_channels]`; `NaN` marks a
/// missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesFrame {
    timestamp_column: String,
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl TimeSeriesFrame {
    /// Create a frame, checking that every dimension agrees
    pub fn new(
        timestamp_column: impl Into<String>,
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self> {
        if values.nrows() != timestamps.len() || values.ncols() != columns.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("[{}, {}]", timestamps.len(), columns.len()),
                actual: format!("[{}, {}]", values.nrows(), values.ncols()),
            });
        }
        Ok(Self {
            timestamp_column: timestamp_column.into(),
            timestamps,
            columns,
            values,
        })
    }

    pub fn timestamp_column(&self) -> &str {
        &self.timestamp_column
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// Consume the frame, returning the value matrix
    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn n_rows(&self) -> usize {
        self.timestamps.len()
    }

    pub fn n_channels(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Position of a named channel
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| KolosalError::FeatureNotFound(name.to_string()))
    }

    /// View of a named channel
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self.column_index(name)?;
        Ok(self.values.column(idx))
    }

    /// Number of missing cells across all channels
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_nan()).count()
    }

    /// Missing cells per channel, in column order
    pub fn missing_per_column(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .zip(self.values.axis_iter(Axis(1)))
            .map(|(name, col)| (name.clone(), col.iter().filter(|v| v.is_nan()).count()))
            .collect()
    }

    /// Keep rows where `mask` is true
    pub fn select_rows(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.n_rows() {
            return Err(KolosalError::ShapeError {
                expected: format!("mask of length {}", self.n_rows()),
                actual: format!("mask of length {}", mask.len()),
            });
        }
        let keep: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &k)| k.then_some(i))
            .collect();

        Ok(Self {
            timestamp_column: self.timestamp_column.clone(),
            timestamps: keep.iter().map(|&i| self.timestamps[i]).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), &keep),
        })
    }

    /// Contiguous block of rows
    pub fn slice_rows(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.n_rows() {
            return Err(KolosalError::ShapeError {
                expected: format!("row range within 0..{}", self.n_rows()),
                actual: format!("{}..{}", range.start, range.end),
            });
        }
        Ok(Self {
            timestamp_column: self.timestamp_column.clone(),
            timestamps: self.timestamps[range.clone()].to_vec(),
            columns: self.columns.clone(),
            values: self.values.slice(s![range, ..]).to_owned(),
        })
    }

    /// Stable sort by timestamp; rows sharing a timestamp keep input order
    pub fn sort_by_time(&self) -> Self {
        if self.timestamps.windows(2).all(|w| w[0] <= w[1]) {
            return self.clone();
        }
        let mut order: Vec<usize> = (0..self.n_rows()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);

        Self {
            timestamp_column: self.timestamp_column.clone(),
            timestamps: order.iter().map(|&i| self.timestamps[i]).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), &order),
        }
    }

    /// Append rows of frames sharing identical columns, in the given order
    pub fn concat(frames: Vec<Self>) -> Result<Self> {
        let mut iter = frames.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| KolosalError::ConfigError("no input frames to concatenate".to_string()))?;

        let mut timestamps = first.timestamps;
        let mut blocks = vec![first.values];
        for frame in iter {
            if frame.columns != first.columns {
                return Err(KolosalError::ConfigError(format!(
                    "input files do not share columns: expected {:?}, got {:?}",
                    first.columns, frame.columns
                )));
            }
            timestamps.extend(frame.timestamps);
            blocks.push(frame.values);
        }

        let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
        let values = ndarray::concatenate(Axis(0), &views)?;
        Self::new(first.timestamp_column, timestamps, first.columns, values)
    }

    /// Return a new frame with extra channels appended on the right
    pub fn with_channels(&self, names: Vec<String>, block: Array2<f64>) -> Result<Self> {
        if block.nrows() != self.n_rows() || block.ncols() != names.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("[{}, {}]", self.n_rows(), names.len()),
                actual: format!("[{}, {}]", block.nrows(), block.ncols()),
            });
        }
        for name in &names {
            if self.columns.contains(name) {
                return Err(KolosalError::ConfigError(format!(
                    "derived channel '{}' collides with an existing column",
                    name
                )));
            }
        }
        let values = ndarray::concatenate(Axis(1), &[self.values.view(), block.view()])?;
        let mut columns = self.columns.clone();
        columns.extend(names);
        Self::new(self.timestamp_column.clone(), self.timestamps.clone(), columns, values)
    }

    /// Replace the value matrix, keeping timestamps and columns
    pub fn with_values(&self, values: Array2<f64>) -> Result<Self> {
        Self::new(
            self.timestamp_column.clone(),
            self.timestamps.clone(),
            self.columns.clone(),
            values,
        )
    }

    /// Export as a polars DataFrame (timestamp as formatted string, nulls for missing)
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.n_channels() + 1);

        let stamps: Vec<String> = self
            .timestamps
            .iter()
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .collect();
        columns.push(Column::new(self.timestamp_column.as_str().into(), stamps));

        for (name, col) in self.columns.iter().zip(self.values.axis_iter(Axis(1))) {
            let values: Vec<Option<f64>> = col
                .iter()
                .map(|&v| if v.is_nan() { None } else { Some(v) })
                .collect();
            columns.push(Column::new(name.as_str().into(), values));
        }

        DataFrame::new(columns).map_err(|e| KolosalError::DataError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::array;

    fn hours(n: usize) -> Vec<NaiveDateTime> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| start + chrono::Duration::hours(i as i64))
            .collect()
    }

    fn sample_frame() -> TimeSeriesFrame {
        TimeSeriesFrame::new(
            "date",
            hours(4),
            vec!["a".to_string(), "b".to_string()],
            array![[1.0, 10.0], [2.0, f64::NAN], [3.0, 30.0], [4.0, 40.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let result = TimeSeriesFrame::new(
            "date",
            hours(3),
            vec!["a".to_string()],
            Array2::zeros((2, 1)),
        );
        assert!(matches!(result, Err(KolosalError::ShapeError { .. })));
    }

    #[test]
    fn test_missing_counts() {
        let frame = sample_frame();
        assert_eq!(frame.missing_count(), 1);
        assert_eq!(frame.missing_per_column()[1], ("b".to_string(), 1));
    }

    #[test]
    fn test_select_rows() {
        let frame = sample_frame();
        let kept = frame.select_rows(&[true, false, true, false]).unwrap();
        assert_eq!(kept.n_rows(), 2);
        assert_eq!(kept.column("a").unwrap().to_vec(), vec![1.0, 3.0]);
        assert_eq!(kept.timestamps()[1], frame.timestamps()[2]);
    }

    #[test]
    fn test_sort_by_time_is_stable() {
        let mut stamps = hours(3);
        stamps.swap(0, 2);
        stamps.push(stamps[1]);
        let frame = TimeSeriesFrame::new(
            "date",
            stamps,
            vec!["a".to_string()],
            array![[0.0], [1.0], [2.0], [3.0]],
        )
        .unwrap();

        let sorted = frame.sort_by_time();
        assert_eq!(sorted.column("a").unwrap().to_vec(), vec![2.0, 1.0, 3.0, 0.0]);
        assert!(sorted.timestamps().windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_concat_requires_same_columns() {
        let a = sample_frame();
        let b = TimeSeriesFrame::new(
            "date",
            hours(1),
            vec!["x".to_string(), "b".to_string()],
            array![[0.0, 0.0]],
        )
        .unwrap();
        assert!(matches!(
            TimeSeriesFrame::concat(vec![a.clone(), b]),
            Err(KolosalError::ConfigError(_))
        ));

        let joined = TimeSeriesFrame::concat(vec![a.clone(), a]).unwrap();
        assert_eq!(joined.n_rows(), 8);
    }

    #[test]
    fn test_with_channels_appends() {
        let frame = sample_frame();
        let extended = frame
            .with_channels(vec!["c".to_string()], Array2::ones((4, 1)))
            .unwrap();
        assert_eq!(extended.columns(), &["a", "b", "c"]);
        assert_eq!(extended.column("c").unwrap().sum(), 4.0);
    }

    #[test]
    fn test_to_dataframe_maps_nan_to_null() {
        let df = sample_frame().to_dataframe().unwrap();
        assert_eq!(df.height(), 4);
        assert_eq!(df.width(), 3);
        assert_eq!(df.column("b").unwrap().null_count(), 1);
    }
}
