//! Forecast error metrics
//!
//! Every metric accepts arrays of any dimensionality and reduces over all
//! elements in logical (row-major) order.

use crate::error::{KolosalError, Result};
use ndarray::{ArrayBase, Data, Dimension, Zip};
use serde::{Deserialize, Serialize};

/// Summary of prediction error over one dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Mean Squared Error
    pub mse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Number of windows evaluated
    pub n_samples: usize,
    /// Number of scalar predictions compared
    pub n_elements: usize,
}

impl EvaluationReport {
    /// Compute every metric from predictions shaped `[samples, ..]`
    pub fn compute<S1, S2, D>(
        predictions: &ArrayBase<S1, D>,
        truth: &ArrayBase<S2, D>,
    ) -> Result<Self>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
        D: Dimension,
    {
        let mse = mean_squared_error(predictions, truth)?;
        let mae = mean_absolute_error(predictions, truth)?;
        Ok(Self {
            mse,
            mae,
            rmse: mse.sqrt(),
            n_samples: predictions.shape().first().copied().unwrap_or(0),
            n_elements: predictions.len(),
        })
    }
}

fn check_shapes<S1, S2, D>(predictions: &ArrayBase<S1, D>, truth: &ArrayBase<S2, D>) -> Result<()>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    if predictions.shape() != truth.shape() {
        return Err(KolosalError::ShapeError {
            expected: format!("{:?}", truth.shape()),
            actual: format!("{:?}", predictions.shape()),
        });
    }
    if predictions.is_empty() {
        return Err(KolosalError::ValidationError(
            "cannot compute error over zero elements".to_string(),
        ));
    }
    Ok(())
}

fn mean_of<S1, S2, D>(
    predictions: &ArrayBase<S1, D>,
    truth: &ArrayBase<S2, D>,
    loss: impl Fn(f64) -> f64,
) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    check_shapes(predictions, truth)?;
    let mut total = 0.0;
    Zip::from(predictions).and(truth).for_each(|&p, &t| {
        total += loss(p - t);
    });
    Ok(total / predictions.len() as f64)
}

/// Mean Squared Error
///
/// MSE = (1/n) * sum_i (pred_i - true_i)^2
pub fn mean_squared_error<S1, S2, D>(
    predictions: &ArrayBase<S1, D>,
    truth: &ArrayBase<S2, D>,
) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    mean_of(predictions, truth, |d| d * d)
}

/// Mean Absolute Error
pub fn mean_absolute_error<S1, S2, D>(
    predictions: &ArrayBase<S1, D>,
    truth: &ArrayBase<S2, D>,
) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    mean_of(predictions, truth, f64::abs)
}

/// Root Mean Squared Error
pub fn root_mean_squared_error<S1, S2, D>(
    predictions: &ArrayBase<S1, D>,
    truth: &ArrayBase<S2, D>,
) -> Result<f64>
where
    S1: Data<Elem = f64>,
    S2: Data<Elem = f64>,
    D: Dimension,
{
    Ok(mean_squared_error(predictions, truth)?.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_mse_simple() {
        let pred = array![1.0, 2.0, 3.0];
        let truth = array![1.0, 2.0, 4.0];
        let mse = mean_squared_error(&pred, &truth).unwrap();
        assert!((mse - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_mse_over_windows() {
        let pred = Array3::from_elem((4, 3, 2), 1.0);
        let truth = Array3::from_elem((4, 3, 2), 3.0);
        assert_eq!(mean_squared_error(&pred, &truth).unwrap(), 4.0);
        assert_eq!(mean_absolute_error(&pred, &truth).unwrap(), 2.0);
        assert_eq!(root_mean_squared_error(&pred, &truth).unwrap(), 2.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let pred = array![[1.0, 2.0]];
        let truth = array![[1.0], [2.0]];
        assert!(matches!(
            mean_squared_error(&pred, &truth),
            Err(KolosalError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        let empty = Array3::<f64>::zeros((0, 5, 1));
        assert!(matches!(
            mean_squared_error(&empty, &empty),
            Err(KolosalError::ValidationError(_))
        ));
    }

    #[test]
    fn test_report() {
        let pred = array![[0.0, 0.0], [2.0, 2.0]];
        let truth = array![[1.0, 1.0], [1.0, 1.0]];
        let report = EvaluationReport::compute(&pred, &truth).unwrap();
        assert_eq!(report.mse, 1.0);
        assert_eq!(report.mae, 1.0);
        assert_eq!(report.rmse, 1.0);
        assert_eq!(report.n_samples, 2);
        assert_eq!(report.n_elements, 4);
    }
}
