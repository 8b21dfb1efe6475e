//! Kolosal Forecast - Windowed time-series data preparation
//!
//! This crate turns irregular, time-ordered tables into leakage-safe
//! `(context, horizon)` training samples for a forecasting model, and scores
//! the model's predictions afterwards.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - File loading (CSV, TSV, Parquet) and the in-memory frame
//! - [`config`] - Immutable pipeline and trainer configuration
//!
//! ## Pipeline stages
//! - [`preprocessing`] - IQR outlier filter, gap filling, robust scaling
//! - [`timeseries`] - Calendar/lag/rolling features, chronological split, windowing
//! - [`pipeline`] - Orchestration of every stage with a run report
//!
//! ## Evaluation
//! - [`evaluation`] - MSE, MAE and RMSE over arrays of any shape
//! - [`trainer`] - The forecaster seam and a persistence baseline
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;
pub mod config;

// Data processing
pub mod data;
pub mod preprocessing;
pub mod timeseries;
pub mod pipeline;

// Evaluation
pub mod evaluation;
pub mod trainer;

// Services
pub mod cli;

pub use error::{KolosalError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{KolosalError, Result};

    // Configuration
    pub use crate::config::{ForecastConfig, ModelInputConfig, TrainerConfig};

    // Data
    pub use crate::data::{DataLoader, DataSaver, TimeSeriesFrame};

    // Preprocessing
    pub use crate::preprocessing::{fill_missing, OutlierFilter, RobustScaler, ScalerState};

    // Time series
    pub use crate::timeseries::{
        FeatureAugmenter, SegmentKind, SplitBoundaries, WindowSample, WindowedDataset,
    };

    // Pipeline
    pub use crate::pipeline::{ForecastPipeline, PipelineReport, PipelineWarning, PreparedData};

    // Evaluation
    pub use crate::evaluation::{mean_squared_error, EvaluationReport};
    pub use crate::trainer::{evaluate, Forecaster, PersistenceForecaster, PredictionOutput};
}
