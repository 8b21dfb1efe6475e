//! Forecasting model seam
//!
//! The pipeline hands three [`WindowedDataset`]s to a [`Forecaster`] and gets
//! back predictions, ground truth and metrics. Batching, optimisation and
//! early stopping belong to the implementation.

use crate::config::TrainerConfig;
use crate::error::{KolosalError, Result};
use crate::evaluation::EvaluationReport;
use crate::preprocessing::ScalerState;
use crate::timeseries::WindowedDataset;
use ndarray::{Array2, Array3, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of a `fit` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub train_loss: f64,
    /// Loss on the validation windows, if there were any
    pub valid_loss: Option<f64>,
    pub training_time_secs: f64,
}

/// Predictions over one dataset, shaped `[samples, horizon, targets]`
#[derive(Debug, Clone)]
pub struct PredictionOutput {
    pub predictions: Array3<f64>,
    pub ground_truth: Array3<f64>,
    pub metrics: EvaluationReport,
}

impl PredictionOutput {
    /// Build the output and its metrics
    pub fn new(predictions: Array3<f64>, ground_truth: Array3<f64>) -> Result<Self> {
        let metrics = EvaluationReport::compute(&predictions, &ground_truth)?;
        Ok(Self {
            predictions,
            ground_truth,
            metrics,
        })
    }

    /// Map predictions and ground truth back to the units of the input data
    pub fn to_original_scale(
        &self,
        scaler: &ScalerState,
        target_indices: &[usize],
    ) -> Result<(Array3<f64>, Array3<f64>)> {
        Ok((
            unscale(&self.predictions, scaler, target_indices)?,
            unscale(&self.ground_truth, scaler, target_indices)?,
        ))
    }
}

fn unscale(values: &Array3<f64>, scaler: &ScalerState, target_indices: &[usize]) -> Result<Array3<f64>> {
    let (n, h, t) = values.dim();
    let flat = values.to_shape((n * h, t))?;
    let restored = scaler.inverse_transform_columns(flat.view(), target_indices)?;
    Ok(restored.into_shape_with_order((n, h, t))?)
}

/// A model that consumes windowed datasets
pub trait Forecaster: Send + Sync {
    /// Train on `train`, using `valid` for monitoring
    fn fit(
        &mut self,
        train: &WindowedDataset,
        valid: &WindowedDataset,
        config: &TrainerConfig,
    ) -> Result<TrainingSummary>;

    /// Predict every window of `dataset`
    fn predict(&self, dataset: &WindowedDataset) -> Result<PredictionOutput>;

    /// Short model name for logs
    fn name(&self) -> &str;
}

/// Evaluate a fitted forecaster on a dataset
pub fn evaluate(forecaster: &dyn Forecaster, dataset: &WindowedDataset) -> Result<EvaluationReport> {
    let output = forecaster.predict(dataset)?;
    info!(
        model = forecaster.name(),
        segment = %dataset.kind(),
        mse = output.metrics.mse,
        samples = output.metrics.n_samples,
        "Evaluation finished"
    );
    Ok(output.metrics)
}

/// Baseline that repeats the last observed context value over the horizon
#[derive(Debug, Clone, Default)]
pub struct PersistenceForecaster {
    target_indices: Vec<usize>,
    n_channels: usize,
    is_fitted: bool,
}

impl PersistenceForecaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn forecast_window(&self, dataset: &WindowedDataset, index: usize) -> Result<Array2<f64>> {
        let context = dataset.context_view(index)?;
        let last = context.row(context.nrows() - 1);
        let mut out = Array2::zeros((dataset.prediction_length(), self.target_indices.len()));
        for (j, &t) in self.target_indices.iter().enumerate() {
            out.column_mut(j).fill(last[t]);
        }
        Ok(out)
    }

    fn check_compatible(&self, dataset: &WindowedDataset) -> Result<()> {
        if dataset.n_channels() != self.n_channels || dataset.target_indices() != self.target_indices.as_slice() {
            return Err(KolosalError::ShapeError {
                expected: format!(
                    "{} channels with targets {:?}",
                    self.n_channels, self.target_indices
                ),
                actual: format!(
                    "{} channels with targets {:?}",
                    dataset.n_channels(),
                    dataset.target_indices()
                ),
            });
        }
        Ok(())
    }
}

impl Forecaster for PersistenceForecaster {
    fn fit(
        &mut self,
        train: &WindowedDataset,
        valid: &WindowedDataset,
        config: &TrainerConfig,
    ) -> Result<TrainingSummary> {
        let start = Instant::now();
        config.validate()?;
        train.ensure_non_empty()?;

        self.target_indices = train.target_indices().to_vec();
        self.n_channels = train.n_channels();
        self.is_fitted = true;

        let train_loss = self.predict(train)?.metrics.mse;
        let valid_loss = if valid.is_empty() {
            None
        } else {
            Some(self.predict(valid)?.metrics.mse)
        };

        debug!(train_loss, ?valid_loss, "Persistence baseline fitted");
        Ok(TrainingSummary {
            epochs_run: 0,
            train_loss,
            valid_loss,
            training_time_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn predict(&self, dataset: &WindowedDataset) -> Result<PredictionOutput> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }
        self.check_compatible(dataset)?;
        dataset.ensure_non_empty()?;

        let windows = (0..dataset.len())
            .into_par_iter()
            .map(|i| self.forecast_window(dataset, i))
            .collect::<Result<Vec<_>>>()?;

        let mut predictions =
            Array3::zeros((windows.len(), dataset.prediction_length(), dataset.n_targets()));
        for (mut slot, window) in predictions.axis_iter_mut(Axis(0)).zip(&windows) {
            slot.assign(window);
        }

        PredictionOutput::new(predictions, dataset.targets())
    }

    fn name(&self) -> &str {
        "persistence"
    }
}
