//! Pipeline configuration
//!
//! A single immutable record passed by value into every stage. Builder methods
//! consume and return `Self`; nothing is shared or mutated after `validate`.

use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the forecasting data pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Name of the timestamp column in the input files
    pub timestamp_column: String,

    /// Field delimiter shared by all input files
    pub delimiter: u8,

    /// Number of rows fed to the model as input
    pub context_length: usize,

    /// Number of future rows the model must predict
    pub prediction_length: usize,

    /// Channels used as forecast targets (None = every channel)
    pub target_columns: Option<Vec<String>>,

    /// Multiplier on the IQR used by the outlier filter
    pub outlier_iqr_factor: f64,

    /// Shift used for the lag feature
    pub lag: usize,

    /// Trailing window for rolling statistics
    pub rolling_window: usize,

    /// Fraction of rows assigned to the training segment
    pub train_fraction: f64,

    /// Fraction of rows assigned to the test segment
    pub test_fraction: f64,

    /// Settings handed through to the trainer collaborator
    pub trainer: TrainerConfig,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            timestamp_column: "date".to_string(),
            delimiter: b',',
            context_length: 512,
            prediction_length: 96,
            target_columns: None,
            outlier_iqr_factor: 1.5,
            lag: 1,
            rolling_window: 5,
            train_fraction: 0.7,
            test_fraction: 0.2,
            trainer: TrainerConfig::default(),
        }
    }
}

impl ForecastConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the context length
    pub fn with_context_length(mut self, context_length: usize) -> Self {
        self.context_length = context_length;
        self
    }

    /// Builder method to set the prediction length
    pub fn with_prediction_length(mut self, prediction_length: usize) -> Self {
        self.prediction_length = prediction_length;
        self
    }

    /// Builder method to set the timestamp column
    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = column.into();
        self
    }

    /// Builder method to set the delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Builder method to restrict the forecast targets
    pub fn with_target_columns(mut self, columns: Vec<String>) -> Self {
        self.target_columns = Some(columns);
        self
    }

    /// Builder method to set the outlier IQR factor
    pub fn with_outlier_factor(mut self, factor: f64) -> Self {
        self.outlier_iqr_factor = factor;
        self
    }

    /// Builder method to set the rolling window
    pub fn with_rolling_window(mut self, window: usize) -> Self {
        self.rolling_window = window;
        self
    }

    /// Builder method to set the split fractions
    pub fn with_split(mut self, train_fraction: f64, test_fraction: f64) -> Self {
        self.train_fraction = train_fraction;
        self.test_fraction = test_fraction;
        self
    }

    /// Builder method to set the trainer settings
    pub fn with_trainer(mut self, trainer: TrainerConfig) -> Self {
        self.trainer = trainer;
        self
    }

    /// Minimum number of rows a segment needs to yield one window
    pub fn window_span(&self) -> usize {
        self.context_length + self.prediction_length
    }

    /// Check every field, returning the first violation as a `ConfigError`
    pub fn validate(&self) -> Result<()> {
        if self.timestamp_column.trim().is_empty() {
            return Err(KolosalError::ConfigError(
                "timestamp_column must not be empty".to_string(),
            ));
        }
        if self.context_length == 0 {
            return Err(KolosalError::ConfigError(
                "context_length must be > 0".to_string(),
            ));
        }
        if self.prediction_length == 0 {
            return Err(KolosalError::ConfigError(
                "prediction_length must be > 0".to_string(),
            ));
        }
        if !(self.outlier_iqr_factor > 0.0) {
            return Err(KolosalError::ConfigError(format!(
                "outlier_iqr_factor must be > 0, got {}",
                self.outlier_iqr_factor
            )));
        }
        if self.lag == 0 {
            return Err(KolosalError::ConfigError("lag must be >= 1".to_string()));
        }
        if self.rolling_window < 2 {
            return Err(KolosalError::ConfigError(format!(
                "rolling_window must be >= 2, got {}",
                self.rolling_window
            )));
        }
        for (name, value) in [
            ("train_fraction", self.train_fraction),
            ("test_fraction", self.test_fraction),
        ] {
            if !(value > 0.0 && value < 1.0) {
                return Err(KolosalError::ConfigError(format!(
                    "{} must be in (0, 1), got {}",
                    name, value
                )));
            }
        }
        if self.train_fraction + self.test_fraction >= 1.0 {
            return Err(KolosalError::ConfigError(format!(
                "train_fraction + test_fraction must leave room for validation, got {}",
                self.train_fraction + self.test_fraction
            )));
        }
        if let Some(targets) = &self.target_columns {
            if targets.is_empty() {
                return Err(KolosalError::ConfigError(
                    "target_columns must name at least one channel".to_string(),
                ));
            }
        }
        self.trainer.validate()
    }

    /// Load a configuration from a JSON file and validate it
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Settings consumed by the trainer collaborator.
///
/// The pipeline never interprets these; they travel with the prepared data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub patch_length: usize,
    pub num_epochs: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub batch_size: usize,
    pub num_workers: usize,
    pub early_stopping_patience: usize,
    pub early_stopping_threshold: f64,
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            patch_length: 32,
            num_epochs: 400,
            learning_rate: 5e-6,
            weight_decay: 0.01,
            batch_size: 8,
            num_workers: 8,
            early_stopping_patience: 20,
            early_stopping_threshold: 1e-4,
            seed: 2023,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(KolosalError::ConfigError("batch_size must be > 0".to_string()));
        }
        if self.patch_length == 0 {
            return Err(KolosalError::ConfigError("patch_length must be > 0".to_string()));
        }
        if !(self.learning_rate > 0.0) {
            return Err(KolosalError::ConfigError(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Shape description handed to the model collaborator after augmentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInputConfig {
    pub context_length: usize,
    pub prediction_length: usize,
    /// Number of non-timestamp columns after augmentation
    pub num_input_channels: usize,
    /// Number of channels in each target window
    pub num_targets: usize,
    pub patch_length: usize,
}
