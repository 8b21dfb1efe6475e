//! Time series module
//!
//! Provides the sequence-shaped stages of the pipeline:
//! - Calendar, lag and rolling-statistic features
//! - Chronological train / validation / test partitioning
//! - Sliding-window sample indexing

mod features;
mod split;
mod window;

pub use features::{AugmentReport, CalendarFeatures, FeatureAugmenter, LagRollingFeatures};
pub use split::{SegmentKind, SplitBoundaries};
pub use window::{WindowSample, WindowedDataset};
