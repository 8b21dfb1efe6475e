//! Chronological train / validation / test partitioning

use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One of the three chronological partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Train,
    Validation,
    Test,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 3] = [SegmentKind::Train, SegmentKind::Validation, SegmentKind::Test];

    pub fn name(&self) -> &'static str {
        match self {
            SegmentKind::Train => "train",
            SegmentKind::Validation => "validation",
            SegmentKind::Test => "test",
        }
    }
}

impl fmt::Display for SegmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Contiguous, disjoint, exhaustive row ranges in chronological order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitBoundaries {
    n_rows: usize,
    num_train: usize,
    num_valid: usize,
    num_test: usize,
}

impl SplitBoundaries {
    /// Partition `n_rows` rows.
    ///
    /// `num_train = floor(train_fraction * n)`, `num_test = floor(test_fraction * n)`
    /// and validation takes the remainder.
    pub fn chronological(n_rows: usize, train_fraction: f64, test_fraction: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&train_fraction)
            || !(0.0..=1.0).contains(&test_fraction)
            || train_fraction + test_fraction > 1.0
        {
            return Err(KolosalError::ConfigError(format!(
                "invalid split fractions: train={} test={}",
                train_fraction, test_fraction
            )));
        }

        let num_train = (n_rows as f64 * train_fraction).floor() as usize;
        let num_test = (n_rows as f64 * test_fraction).floor() as usize;
        let num_valid = n_rows - num_train - num_test;

        Ok(Self {
            n_rows,
            num_train,
            num_valid,
            num_test,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn train(&self) -> Range<usize> {
        0..self.num_train
    }

    pub fn valid(&self) -> Range<usize> {
        self.num_train..self.num_train + self.num_valid
    }

    pub fn test(&self) -> Range<usize> {
        self.num_train + self.num_valid..self.n_rows
    }

    /// Row range of one segment
    pub fn segment(&self, kind: SegmentKind) -> Range<usize> {
        match kind {
            SegmentKind::Train => self.train(),
            SegmentKind::Validation => self.valid(),
            SegmentKind::Test => self.test(),
        }
    }

    /// `(num_train, num_valid, num_test)`
    pub fn sizes(&self) -> (usize, usize, usize) {
        (self.num_train, self.num_valid, self.num_test)
    }
}
