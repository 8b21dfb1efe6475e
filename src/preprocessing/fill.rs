//! Gap filling for time-ordered channels
//!
//! Forward fill carries the last observed value down each column; backward
//! fill then covers any leading gap with the first observed value.

use crate::data::TimeSeriesFrame;
use crate::error::{KolosalError, Result};
use ndarray::{Array2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};

/// Direction in which observed values are propagated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillDirection {
    Forward,
    Backward,
}

fn fill_column(mut col: ArrayViewMut1<'_, f64>, direction: FillDirection) {
    let mut last = f64::NAN;
    let mut step = |v: &mut f64| {
        if v.is_nan() {
            *v = last;
        } else {
            last = *v;
        }
    };
    match direction {
        FillDirection::Forward => col.iter_mut().for_each(&mut step),
        FillDirection::Backward => col.iter_mut().rev().for_each(&mut step),
    }
}

/// Fill every column of `values` in place
pub fn fill_in_place(values: &mut Array2<f64>, direction: FillDirection) {
    for col in values.axis_iter_mut(Axis(1)) {
        fill_column(col, direction);
    }
}

/// Forward-fill then backward-fill every channel.
///
/// Returns the filled frame and the channels that are still entirely missing.
pub fn fill_missing(frame: &TimeSeriesFrame) -> Result<(TimeSeriesFrame, Vec<String>)> {
    let mut values = frame.values().clone();
    fill_in_place(&mut values, FillDirection::Forward);
    fill_in_place(&mut values, FillDirection::Backward);

    let still_missing: Vec<String> = frame
        .columns()
        .iter()
        .zip(values.axis_iter(Axis(1)))
        .filter(|(_, col)| col.iter().any(|v| v.is_nan()))
        .map(|(name, _)| name.clone())
        .collect();

    Ok((frame.with_values(values)?, still_missing))
}

/// Fail with `EmptyColumn` naming the first channel that still has gaps
pub fn ensure_complete(frame: &TimeSeriesFrame) -> Result<()> {
    for (name, missing) in frame.missing_per_column() {
        if missing > 0 {
            return Err(KolosalError::EmptyColumn(name));
        }
    }
    Ok(())
}
