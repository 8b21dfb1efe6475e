//! Time series feature engineering
//!
//! All derivations are pure: they read an immutable frame and return new
//! channels. Rolling windows only look backward, so the first `window - 1`
//! rows of a rolling feature (and the first `lag` rows of a lag feature) are
//! undefined and come back as `NaN` for the fill stage to resolve.

use crate::data::TimeSeriesFrame;
use crate::error::{KolosalError, Result};
use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Calendar channels derived from the timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarFeatures {
    /// Include day of week (Monday = 0)
    pub day_of_week: bool,
    /// Include day of month (1-31)
    pub day_of_month: bool,
    /// Include month (1-12)
    pub month: bool,
    /// Include hour (0-23)
    pub hour: bool,
}

impl Default for CalendarFeatures {
    fn default() -> Self {
        Self {
            day_of_week: true,
            day_of_month: true,
            month: true,
            hour: true,
        }
    }
}

impl CalendarFeatures {
    /// Names of the enabled channels, in output order
    pub fn names(&self) -> Vec<String> {
        [
            (self.day_of_week, "day_of_week"),
            (self.day_of_month, "day_of_month"),
            (self.month, "month"),
            (self.hour, "hour"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| name.to_string())
        .collect()
    }

    /// Derive `[n, n_enabled]` plain numeric calendar values
    pub fn from_timestamps(&self, timestamps: &[NaiveDateTime]) -> Array2<f64> {
        let n_features = self.names().len();
        let mut result = Array2::zeros((timestamps.len(), n_features));

        for (mut row, ts) in result.axis_iter_mut(Axis(0)).zip(timestamps) {
            let mut j = 0;
            let mut push = |v: u32| {
                row[j] = v as f64;
                j += 1;
            };
            if self.day_of_week {
                push(ts.weekday().num_days_from_monday());
            }
            if self.day_of_month {
                push(ts.day());
            }
            if self.month {
                push(ts.month());
            }
            if self.hour {
                push(ts.hour());
            }
        }

        result
    }
}

/// Per-channel lag and trailing rolling statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LagRollingFeatures {
    /// Shift applied by the lag feature
    pub lag: usize,
    /// Trailing window for rolling mean and standard deviation
    pub window: usize,
}

impl Default for LagRollingFeatures {
    fn default() -> Self {
        Self { lag: 1, window: 5 }
    }
}

impl LagRollingFeatures {
    /// Names of the three channels derived from `column`
    pub fn names_for(&self, column: &str) -> [String; 3] {
        [
            format!("{}_lag{}", column, self.lag),
            format!("{}_rolling_mean", column),
            format!("{}_rolling_std", column),
        ]
    }

    /// Value shifted forward by `lag` rows
    pub fn create_lag(&self, series: ArrayView1<'_, f64>) -> Array1<f64> {
        let n = series.len();
        let mut result = Array1::from_elem(n, f64::NAN);
        for i in self.lag..n {
            result[i] = series[i - self.lag];
        }
        result
    }

    /// Trailing mean over a full window; undefined if any cell in it is missing
    pub fn create_rolling_mean(&self, series: ArrayView1<'_, f64>) -> Array1<f64> {
        self.rolling(series, |w| w.iter().sum::<f64>() / w.len() as f64)
    }

    /// Trailing sample standard deviation (ddof = 1) over a full window
    pub fn create_rolling_std(&self, series: ArrayView1<'_, f64>) -> Array1<f64> {
        self.rolling(series, |w| {
            if w.len() < 2 {
                return f64::NAN;
            }
            let mean = w.iter().sum::<f64>() / w.len() as f64;
            let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
            var.sqrt()
        })
    }

    fn rolling(&self, series: ArrayView1<'_, f64>, stat: impl Fn(&[f64]) -> f64) -> Array1<f64> {
        let n = series.len();
        let mut result = Array1::from_elem(n, f64::NAN);
        if self.window == 0 || n < self.window {
            return result;
        }
        let values: Vec<f64> = series.iter().copied().collect();
        for (i, w) in values.windows(self.window).enumerate() {
            if w.iter().all(|v| !v.is_nan()) {
                result[i + self.window - 1] = stat(w);
            }
        }
        result
    }
}

/// Count of undefined cells produced by one augmentation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AugmentReport {
    /// Names of every derived channel, in output order
    pub derived_columns: Vec<String>,
    /// Undefined lag cells awaiting fill
    pub undefined_lag_cells: usize,
    /// Undefined rolling-std cells awaiting fill
    pub undefined_rolling_std_cells: usize,
}

/// Builds calendar, lag and rolling channels on top of the original ones
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureAugmenter {
    pub calendar: CalendarFeatures,
    pub lag_rolling: LagRollingFeatures,
}

impl FeatureAugmenter {
    pub fn new(calendar: CalendarFeatures, lag_rolling: LagRollingFeatures) -> Self {
        Self {
            calendar,
            lag_rolling,
        }
    }

    /// Names of the channels `augment` would append for these input columns
    pub fn derived_names(&self, columns: &[String]) -> Vec<String> {
        let mut names = self.calendar.names();
        for column in columns {
            names.extend(self.lag_rolling.names_for(column));
        }
        names
    }

    /// Reject input columns that a derived channel would shadow
    pub fn check_columns(&self, columns: &[String]) -> Result<()> {
        match self
            .derived_names(columns)
            .into_iter()
            .find(|name| columns.contains(name))
        {
            Some(name) => Err(KolosalError::ConfigError(format!(
                "derived channel '{}' collides with an existing column",
                name
            ))),
            None => Ok(()),
        }
    }

    /// Return a new frame with the derived channels appended.
    ///
    /// Column order: originals, calendar channels, then for every original
    /// channel its lag, rolling mean and rolling std. Lag/rolling features are
    /// derived only from the channels present before augmentation.
    pub fn augment(&self, frame: &TimeSeriesFrame) -> Result<(TimeSeriesFrame, AugmentReport)> {
        if self.lag_rolling.lag == 0 || self.lag_rolling.window < 2 {
            return Err(KolosalError::ConfigError(format!(
                "lag must be >= 1 and rolling window >= 2, got lag={} window={}",
                self.lag_rolling.lag, self.lag_rolling.window
            )));
        }

        let n = frame.n_rows();
        let calendar_names = self.calendar.names();
        let calendar = self.calendar.from_timestamps(frame.timestamps());

        let names = self.derived_names(frame.columns());
        let mut block = Array2::from_elem((n, names.len()), f64::NAN);
        block
            .slice_mut(ndarray::s![.., ..calendar_names.len()])
            .assign(&calendar);

        let mut report = AugmentReport::default();
        let mut j = calendar_names.len();
        for series in frame.values().axis_iter(Axis(1)) {
            let lag = self.lag_rolling.create_lag(series);
            let mean = self.lag_rolling.create_rolling_mean(series);
            let std = self.lag_rolling.create_rolling_std(series);

            report.undefined_lag_cells += lag.iter().filter(|v| v.is_nan()).count();
            report.undefined_rolling_std_cells += std.iter().filter(|v| v.is_nan()).count();

            for feature in [lag, mean, std] {
                block.column_mut(j).assign(&feature);
                j += 1;
            }
        }

        report.derived_columns = names.clone();
        debug!(
            derived = names.len(),
            undefined_rolling_std = report.undefined_rolling_std_cells,
            "Features derived"
        );

        let augmented = frame.with_channels(names, block)?;
        Ok((augmented, report))
    }
}
