//! End-to-end data preparation
//!
//! Runs every stage in order over the whole table:
//! sort, outlier filter, fill, augment, fill, completeness check, split,
//! scaler fit on the training rows, transform, and window indexing.
//! Each stage finishes before the next begins.

use crate::config::{ForecastConfig, ModelInputConfig};
use crate::data::{DataLoader, TimeSeriesFrame};
use crate::error::{KolosalError, Result};
use crate::preprocessing::{ensure_complete, fill_missing, OutlierFilter, RobustScaler, ScalerState};
use crate::timeseries::{
    CalendarFeatures, FeatureAugmenter, LagRollingFeatures, SegmentKind, SplitBoundaries,
    WindowedDataset,
};
use ndarray::s;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Recoverable condition recorded during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PipelineWarning {
    /// Segment too short to yield a window; its dataset is empty
    ShortSegment {
        segment: SegmentKind,
        rows: usize,
        required: usize,
    },
    /// Column with zero IQR; the outlier filter ignored it
    ZeroIqr { column: String },
    /// Rolling std cells that were undefined before filling
    UndefinedRollingStd { cells: usize },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::ShortSegment {
                segment,
                rows,
                required,
            } => write!(
                f,
                "{} segment has {} rows, needs at least {} for one window",
                segment, rows, required
            ),
            PipelineWarning::ZeroIqr { column } => {
                write!(f, "column '{}' has zero IQR; outlier filter skipped it", column)
            }
            PipelineWarning::UndefinedRollingStd { cells } => {
                write!(f, "{} undefined rolling std cells were filled", cells)
            }
        }
    }
}

/// Wall-clock time spent in one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: String,
    pub seconds: f64,
}

/// Row counts, window counts, warnings and timings of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub rows_loaded: usize,
    pub outliers_removed: usize,
    pub rows_after_filter: usize,
    pub missing_cells_filled: usize,
    pub original_channels: usize,
    pub augmented_channels: usize,
    /// `(train, validation, test)` rows
    pub segment_rows: (usize, usize, usize),
    /// `(train, validation, test)` windows
    pub segment_windows: (usize, usize, usize),
    pub warnings: Vec<PipelineWarning>,
    pub timings: Vec<StageTiming>,
}

impl PipelineReport {
    fn record(&mut self, stage: &str, start: Instant) {
        let seconds = start.elapsed().as_secs_f64();
        debug!(stage, seconds, "Stage finished");
        self.timings.push(StageTiming {
            stage: stage.to_string(),
            seconds,
        });
    }

    /// Total wall-clock time across all stages
    pub fn total_seconds(&self) -> f64 {
        self.timings.iter().map(|t| t.seconds).sum()
    }
}

/// Everything the trainer collaborator receives
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub train: WindowedDataset,
    pub valid: WindowedDataset,
    pub test: WindowedDataset,
    pub scaler: ScalerState,
    pub model_config: ModelInputConfig,
    pub boundaries: SplitBoundaries,
    /// The augmented, filled and scaled table the datasets index into
    pub processed: TimeSeriesFrame,
    pub report: PipelineReport,
}

impl PreparedData {
    pub fn dataset(&self, kind: SegmentKind) -> &WindowedDataset {
        match kind {
            SegmentKind::Train => &self.train,
            SegmentKind::Validation => &self.valid,
            SegmentKind::Test => &self.test,
        }
    }
}

/// Orchestrates the data preparation stages
#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    config: ForecastConfig,
}

impl ForecastPipeline {
    /// Create a pipeline, rejecting an invalid configuration up front
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Load the given files (concatenated in order) and prepare them
    pub fn run(&self, paths: &[PathBuf]) -> Result<PreparedData> {
        let t = Instant::now();
        let loader = DataLoader::new(self.config.timestamp_column.clone())
            .with_delimiter(self.config.delimiter);
        let frame = loader.load_many(paths)?;
        let load = StageTiming {
            stage: "load".to_string(),
            seconds: t.elapsed().as_secs_f64(),
        };

        let mut prepared = self.run_on_frame(frame)?;
        prepared.report.timings.insert(0, load);
        Ok(prepared)
    }

    /// Prepare an in-memory frame
    pub fn run_on_frame(&self, frame: TimeSeriesFrame) -> Result<PreparedData> {
        let cfg = &self.config;
        let mut report = PipelineReport {
            rows_loaded: frame.n_rows(),
            original_channels: frame.n_channels(),
            ..Default::default()
        };

        if frame.n_channels() == 0 {
            return Err(KolosalError::ConfigError(
                "input has no numeric channels besides the timestamp".to_string(),
            ));
        }
        let augmenter = FeatureAugmenter::new(
            CalendarFeatures::default(),
            LagRollingFeatures {
                lag: cfg.lag,
                window: cfg.rolling_window,
            },
        );
        augmenter.check_columns(frame.columns())?;

        info!(
            rows = frame.n_rows(),
            channels = frame.n_channels(),
            context_length = cfg.context_length,
            prediction_length = cfg.prediction_length,
            "Preparing forecasting data"
        );

        // Outlier filter and first fill
        let t = Instant::now();
        let frame = frame.sort_by_time();
        let (frame, outliers) = OutlierFilter::new(cfg.outlier_iqr_factor).fit_filter(&frame)?;
        report.outliers_removed = outliers.rows_removed;
        report.rows_after_filter = frame.n_rows();
        report.warnings.extend(
            outliers
                .zero_iqr_columns
                .iter()
                .map(|c| PipelineWarning::ZeroIqr { column: c.clone() }),
        );
        let mut missing = frame.missing_count();
        let (frame, _) = fill_missing(&frame)?;
        report.record("outlier_filter", t);

        // Feature augmentation and second fill
        let t = Instant::now();
        let (frame, augment) = augmenter.augment(&frame)?;
        if augment.undefined_rolling_std_cells > 0 {
            report.warnings.push(PipelineWarning::UndefinedRollingStd {
                cells: augment.undefined_rolling_std_cells,
            });
        }
        missing += frame.missing_count();
        let (frame, _) = fill_missing(&frame)?;
        ensure_complete(&frame)?;
        report.missing_cells_filled = missing;
        report.augmented_channels = frame.n_channels();
        report.record("augment", t);

        info!(
            rows = frame.n_rows(),
            outliers_removed = report.outliers_removed,
            channels = frame.n_channels(),
            missing_filled = missing,
            "Features ready"
        );

        let target_indices = self.resolve_targets(&frame)?;

        // Split, then fit the scaler on training rows only
        let t = Instant::now();
        let boundaries =
            SplitBoundaries::chronological(frame.n_rows(), cfg.train_fraction, cfg.test_fraction)?;
        report.segment_rows = boundaries.sizes();

        let train_range = boundaries.train();
        if train_range.is_empty() {
            return Err(KolosalError::InsufficientData {
                segment: SegmentKind::Train.name().to_string(),
                expected: 1,
                actual: 0,
            });
        }
        let scaler = RobustScaler::new().fit(
            frame.values().slice(s![train_range, ..]),
            frame.columns(),
        )?;
        let processed = scaler.transform_frame(&frame)?;
        report.record("scale", t);

        // Windows
        let t = Instant::now();
        let columns = Arc::new(processed.columns().to_vec());
        let mut build = |kind: SegmentKind| -> Result<WindowedDataset> {
            let range = boundaries.segment(kind);
            let segment = processed.values().slice(s![range.clone(), ..]).to_owned();
            let dataset = WindowedDataset::new(
                kind,
                Arc::new(segment),
                range.start,
                Arc::clone(&columns),
                target_indices.clone(),
                cfg.context_length,
                cfg.prediction_length,
            )?;
            if dataset.is_empty() {
                warn!(
                    segment = %kind,
                    rows = range.len(),
                    required = cfg.window_span(),
                    "Segment too short for a single window; dataset is empty"
                );
                report.warnings.push(PipelineWarning::ShortSegment {
                    segment: kind,
                    rows: range.len(),
                    required: cfg.window_span(),
                });
            }
            Ok(dataset)
        };
        let train = build(SegmentKind::Train)?;
        let valid = build(SegmentKind::Validation)?;
        let test = build(SegmentKind::Test)?;
        report.record("window", t);

        report.segment_windows = (train.len(), valid.len(), test.len());

        info!(
            train_rows = report.segment_rows.0,
            valid_rows = report.segment_rows.1,
            test_rows = report.segment_rows.2,
            train_windows = train.len(),
            valid_windows = valid.len(),
            test_windows = test.len(),
            "Datasets built"
        );

        let model_config = ModelInputConfig {
            context_length: cfg.context_length,
            prediction_length: cfg.prediction_length,
            num_input_channels: processed.n_channels(),
            num_targets: target_indices.len(),
            patch_length: cfg.trainer.patch_length,
        };

        Ok(PreparedData {
            train,
            valid,
            test,
            scaler,
            model_config,
            boundaries,
            processed,
            report,
        })
    }

    /// Map configured target names to column positions. Without explicit
    /// targets every channel, derived ones included, is a target.
    fn resolve_targets(&self, frame: &TimeSeriesFrame) -> Result<Vec<usize>> {
        match &self.config.target_columns {
            Some(names) => names.iter().map(|n| frame.column_index(n)).collect(),
            None => Ok((0..frame.n_channels()).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use ndarray::Array2;

    fn hourly_frame(values: Vec<f64>) -> TimeSeriesFrame {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let n = values.len();
        TimeSeriesFrame::new(
            "date",
            (0..n).map(|i| start + Duration::hours(i as i64)).collect(),
            vec!["load".to_string()],
            Array2::from_shape_vec((n, 1), values).unwrap(),
        )
        .unwrap()
    }

    fn small_config() -> ForecastConfig {
        ForecastConfig::new()
            .with_context_length(8)
            .with_prediction_length(2)
    }

    #[test]
    fn test_invalid_config_rejected_before_run() {
        let result = ForecastPipeline::new(small_config().with_context_length(0));
        assert!(matches!(result, Err(KolosalError::ConfigError(_))));
    }

    #[test]
    fn test_default_targets_span_every_channel() {
        let values = (0..100).map(|i| (i as f64 * 0.3).sin()).collect();
        let prepared = ForecastPipeline::new(small_config())
            .unwrap()
            .run_on_frame(hourly_frame(values))
            .unwrap();

        assert_eq!(prepared.model_config.num_input_channels, 8);
        assert_eq!(prepared.model_config.num_targets, 8);
        assert_eq!(prepared.train.target_columns(), prepared.processed.columns());
        assert_eq!(prepared.processed.missing_count(), 0);

        let sample = prepared.train.get(0).unwrap();
        assert_eq!(sample.target.ncols(), sample.context.ncols());
    }

    #[test]
    fn test_input_named_like_calendar_channel_rejected() {
        let n = 100;
        let start = NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let frame = TimeSeriesFrame::new(
            "date",
            (0..n).map(|i| start + Duration::hours(i as i64)).collect(),
            vec!["hour".to_string(), "load".to_string()],
            Array2::from_shape_fn((n, 2), |(i, j)| (i + j) as f64),
        )
        .unwrap();

        let err = ForecastPipeline::new(small_config())
            .unwrap()
            .run_on_frame(frame)
            .unwrap_err();
        assert!(matches!(err, KolosalError::ConfigError(ref msg) if msg.contains("'hour'")));
    }

    #[test]
    fn test_unknown_target_column() {
        let values = (0..100).map(|i| i as f64).collect();
        let pipeline =
            ForecastPipeline::new(small_config().with_target_columns(vec!["price".to_string()]))
                .unwrap();
        assert!(matches!(
            pipeline.run_on_frame(hourly_frame(values)),
            Err(KolosalError::FeatureNotFound(ref c)) if c == "price"
        ));
    }

    #[test]
    fn test_derived_target_column() {
        let values = (0..100).map(|i| i as f64).collect();
        let pipeline = ForecastPipeline::new(
            small_config().with_target_columns(vec!["load_rolling_mean".to_string()]),
        )
        .unwrap();
        let prepared = pipeline.run_on_frame(hourly_frame(values)).unwrap();
        assert_eq!(prepared.test.target_indices(), &[6]);
    }

    #[test]
    fn test_short_segment_is_warning() {
        // 40 rows: validation gets 4, which is below the 10-row span
        let values = (0..40).map(|i| (i as f64).cos()).collect();
        let prepared = ForecastPipeline::new(small_config())
            .unwrap()
            .run_on_frame(hourly_frame(values))
            .unwrap();

        assert!(prepared.valid.is_empty());
        assert!(prepared.report.warnings.contains(&PipelineWarning::ShortSegment {
            segment: SegmentKind::Validation,
            rows: 4,
            required: 10,
        }));
    }

    #[test]
    fn test_scaler_fitted_on_training_rows_only() {
        let values = (0..200).map(|i| i as f64).collect();
        let prepared = ForecastPipeline::new(small_config())
            .unwrap()
            .run_on_frame(hourly_frame(values))
            .unwrap();

        assert_eq!(prepared.scaler.n_samples_seen(), prepared.boundaries.train().len());
        // median of 0..140 is 69.5; a whole-table fit would give 99.5
        assert_eq!(prepared.scaler.center()[0], 69.5);
    }

    #[test]
    fn test_report_counts_and_timings() {
        let values = (0..100).map(|i| (i as f64 * 0.1).sin()).collect();
        let prepared = ForecastPipeline::new(small_config())
            .unwrap()
            .run_on_frame(hourly_frame(values))
            .unwrap();
        let report = &prepared.report;

        assert_eq!(report.rows_loaded, 100);
        assert_eq!(report.segment_rows, (70, 10, 20));
        assert_eq!(report.segment_windows, (61, 1, 11));
        let stages: Vec<&str> = report.timings.iter().map(|t| t.stage.as_str()).collect();
        assert_eq!(stages, vec!["outlier_filter", "augment", "scale", "window"]);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, PipelineWarning::UndefinedRollingStd { cells: 4 })));
    }
}
