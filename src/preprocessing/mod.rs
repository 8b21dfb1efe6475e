//! Data preprocessing module
//!
//! Provides the table-wide cleaning and scaling stages:
//! - IQR outlier row filtering
//! - Forward/backward gap filling
//! - Robust (median / IQR) scaling with a reusable fitted state

pub(crate) mod stats;
pub mod fill;
pub mod outlier;
pub mod scaler;

pub use fill::{ensure_complete, fill_in_place, fill_missing, FillDirection};
pub use outlier::{OutlierBounds, OutlierFilter, OutlierReport};
pub use scaler::{max_abs_diff, RobustScaler, ScalerState};
