//! Sliding-window sample indexing
//!
//! A [`WindowedDataset`] is a random-access view over one chronological
//! segment. Sample `i` is computed from index arithmetic alone:
//! context = rows `[i, i + context_length)`, target = rows
//! `[i + context_length, i + context_length + prediction_length)`.
//! The segment is held behind an `Arc` and never mutated, so a dataset can be
//! shared across threads and read concurrently without locking.

use super::split::SegmentKind;
use crate::error::{KolosalError, Result};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::ops::Range;
use std::sync::Arc;

/// One (context, target) pair
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSample {
    /// Position of the sample within its dataset
    pub index: usize,
    /// `[context_length, n_channels]`
    pub context: Array2<f64>,
    /// `[prediction_length, n_targets]`
    pub target: Array2<f64>,
}

/// Every stride-1 window obtainable from one segment
#[derive(Debug, Clone)]
pub struct WindowedDataset {
    kind: SegmentKind,
    data: Arc<Array2<f64>>,
    offset: usize,
    columns: Arc<Vec<String>>,
    target_indices: Vec<usize>,
    context_length: usize,
    prediction_length: usize,
}

impl WindowedDataset {
    /// Index windows over `data`, whose first row sits at absolute row
    /// `offset` of the processed table.
    ///
    /// A segment shorter than `context_length + prediction_length` yields an
    /// empty dataset rather than an error.
    pub fn new(
        kind: SegmentKind,
        data: Arc<Array2<f64>>,
        offset: usize,
        columns: Arc<Vec<String>>,
        target_indices: Vec<usize>,
        context_length: usize,
        prediction_length: usize,
    ) -> Result<Self> {
        if context_length == 0 || prediction_length == 0 {
            return Err(KolosalError::ConfigError(format!(
                "context_length and prediction_length must be > 0, got {} and {}",
                context_length, prediction_length
            )));
        }
        if data.ncols() != columns.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", data.ncols()),
            });
        }
        if target_indices.is_empty() {
            return Err(KolosalError::ConfigError(
                "at least one target column is required".to_string(),
            ));
        }
        if let Some(&bad) = target_indices.iter().find(|&&t| t >= columns.len()) {
            return Err(KolosalError::IndexOutOfBounds {
                index: bad,
                len: columns.len(),
            });
        }

        Ok(Self {
            kind,
            data,
            offset,
            columns,
            target_indices,
            context_length,
            prediction_length,
        })
    }

    /// Build a dataset over rows `range` of a full table, targeting every channel
    pub fn from_table(
        kind: SegmentKind,
        table: &Array2<f64>,
        range: Range<usize>,
        columns: Vec<String>,
        context_length: usize,
        prediction_length: usize,
    ) -> Result<Self> {
        if range.start > range.end || range.end > table.nrows() {
            return Err(KolosalError::ShapeError {
                expected: format!("row range within 0..{}", table.nrows()),
                actual: format!("{}..{}", range.start, range.end),
            });
        }
        let targets = (0..columns.len()).collect();
        let segment = table.slice(s![range.clone(), ..]).to_owned();
        Self::new(
            kind,
            Arc::new(segment),
            range.start,
            Arc::new(columns),
            targets,
            context_length,
            prediction_length,
        )
    }

    /// Number of valid windows: `max(0, rows - context - prediction + 1)`
    pub fn len(&self) -> usize {
        (self.data.nrows() + 1).saturating_sub(self.context_length + self.prediction_length)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fail with `InsufficientData` when the segment yields no windows
    pub fn ensure_non_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(KolosalError::InsufficientData {
                segment: self.kind.name().to_string(),
                expected: self.context_length + self.prediction_length,
                actual: self.segment_len(),
            });
        }
        Ok(())
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// Rows in the underlying segment
    pub fn segment_len(&self) -> usize {
        self.data.nrows()
    }

    /// Absolute row range of the segment within the processed table
    pub fn segment_range(&self) -> Range<usize> {
        self.offset..self.offset + self.data.nrows()
    }

    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn prediction_length(&self) -> usize {
        self.prediction_length
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_channels(&self) -> usize {
        self.columns.len()
    }

    pub fn target_indices(&self) -> &[usize] {
        &self.target_indices
    }

    pub fn target_columns(&self) -> Vec<&str> {
        self.target_indices
            .iter()
            .map(|&t| self.columns[t].as_str())
            .collect()
    }

    pub fn n_targets(&self) -> usize {
        self.target_indices.len()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len() {
            return Err(KolosalError::IndexOutOfBounds {
                index,
                len: self.len(),
            });
        }
        Ok(())
    }

    /// Absolute row ranges `(context, target)` covered by sample `index`
    pub fn sample_bounds(&self, index: usize) -> Result<(Range<usize>, Range<usize>)> {
        self.check_index(index)?;
        let start = self.offset + index;
        let split = start + self.context_length;
        Ok((start..split, split..split + self.prediction_length))
    }

    /// Zero-copy view of the context rows of sample `index`
    pub fn context_view(&self, index: usize) -> Result<ArrayView2<'_, f64>> {
        self.check_index(index)?;
        Ok(self
            .data
            .slice(s![index..index + self.context_length, ..]))
    }

    /// Materialise sample `index`
    pub fn get(&self, index: usize) -> Result<WindowSample> {
        self.check_index(index)?;
        Ok(self.sample_at(index))
    }

    fn sample_at(&self, index: usize) -> WindowSample {
        let split = index + self.context_length;
        let context = self.data.slice(s![index..split, ..]).to_owned();
        let target = self
            .data
            .slice(s![split..split + self.prediction_length, ..])
            .select(Axis(1), &self.target_indices);
        WindowSample {
            index,
            context,
            target,
        }
    }

    /// Samples in index order
    pub fn iter(&self) -> impl Iterator<Item = WindowSample> + '_ {
        (0..self.len()).map(move |i| self.sample_at(i))
    }

    /// Stack the given samples into `[batch, context, channels]` and
    /// `[batch, horizon, targets]` arrays
    pub fn batch(&self, indices: &[usize]) -> Result<(Array3<f64>, Array3<f64>)> {
        let mut contexts =
            Array3::zeros((indices.len(), self.context_length, self.n_channels()));
        let mut targets =
            Array3::zeros((indices.len(), self.prediction_length, self.n_targets()));

        for (b, &index) in indices.iter().enumerate() {
            let sample = self.get(index)?;
            contexts.index_axis_mut(Axis(0), b).assign(&sample.context);
            targets.index_axis_mut(Axis(0), b).assign(&sample.target);
        }
        Ok((contexts, targets))
    }

    /// All target windows, `[len, horizon, targets]`, in sample order
    pub fn targets(&self) -> Array3<f64> {
        let mut out = Array3::zeros((self.len(), self.prediction_length, self.n_targets()));
        for (i, mut slot) in out.axis_iter_mut(Axis(0)).enumerate() {
            slot.assign(&self.sample_at(i).target);
        }
        out
    }

    /// Sample indices in a reproducible shuffled order
    pub fn shuffled_indices(&self, seed: u64) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        indices
    }

    /// Split sample indices into consecutive batches of at most `batch_size`
    pub fn batch_indices(&self, batch_size: usize, shuffle_seed: Option<u64>) -> Vec<Vec<usize>> {
        let order = match shuffle_seed {
            Some(seed) => self.shuffled_indices(seed),
            None => (0..self.len()).collect(),
        };
        order
            .chunks(batch_size.max(1))
            .map(|c| c.to_vec())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(i, j)| (i * 100 + j) as f64)
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|j| format!("c{}", j)).collect()
    }

    fn dataset(rows: usize, ctx: usize, pred: usize) -> WindowedDataset {
        WindowedDataset::from_table(SegmentKind::Train, &ramp(rows, 2), 0..rows, names(2), ctx, pred)
            .unwrap()
    }

    #[test]
    fn test_window_count_formula() {
        assert_eq!(dataset(700, 50, 10).len(), 641);
        assert_eq!(dataset(100, 50, 10).len(), 41);
        assert_eq!(dataset(200, 50, 10).len(), 141);
        // exactly one window
        assert_eq!(dataset(60, 50, 10).len(), 1);
        // formula yields zero / negative
        assert_eq!(dataset(59, 50, 10).len(), 0);
        assert_eq!(dataset(0, 50, 10).len(), 0);
    }

    #[test]
    fn test_window_count_grid() {
        for rows in 0..40 {
            for ctx in 1..8 {
                for pred in 1..8 {
                    let expected = (rows as i64 - ctx as i64 - pred as i64 + 1).max(0) as usize;
                    assert_eq!(dataset(rows, ctx, pred).len(), expected);
                }
            }
        }
    }

    #[test]
    fn test_target_follows_context() {
        let ds = dataset(20, 4, 3);
        let sample = ds.get(5).unwrap();

        assert_eq!(sample.context.shape(), &[4, 2]);
        assert_eq!(sample.target.shape(), &[3, 2]);
        assert_eq!(sample.context[[0, 0]], 500.0);
        assert_eq!(sample.context[[3, 1]], 801.0);
        assert_eq!(sample.target[[0, 0]], 900.0);
        assert_eq!(sample.target[[2, 1]], 1101.0);
    }

    #[test]
    fn test_out_of_range_index() {
        let ds = dataset(10, 4, 3);
        assert_eq!(ds.len(), 4);
        assert!(matches!(
            ds.get(4),
            Err(KolosalError::IndexOutOfBounds { index: 4, len: 4 })
        ));
    }

    #[test]
    fn test_short_segment_is_empty_not_error() {
        let ds = dataset(5, 4, 3);
        assert!(ds.is_empty());
        assert_eq!(ds.iter().count(), 0);
        assert!(matches!(
            ds.ensure_non_empty(),
            Err(KolosalError::InsufficientData { expected: 7, actual: 5, .. })
        ));
    }

    #[test]
    fn test_windows_stay_inside_segment() {
        let table = ramp(100, 1);
        let ds = WindowedDataset::from_table(SegmentKind::Validation, &table, 70..80, names(1), 3, 2)
            .unwrap();
        for i in 0..ds.len() {
            let (ctx, tgt) = ds.sample_bounds(i).unwrap();
            assert!(ctx.start >= 70 && tgt.end <= 80);
            assert_eq!(ctx.end, tgt.start);
            let sample = ds.get(i).unwrap();
            assert_eq!(sample.context[[0, 0]], table[[ctx.start, 0]]);
        }
    }

    #[test]
    fn test_target_subset() {
        let data = Arc::new(ramp(10, 3));
        let ds = WindowedDataset::new(SegmentKind::Test, data, 0, Arc::new(names(3)), vec![2], 4, 2)
            .unwrap();
        let sample = ds.get(0).unwrap();
        assert_eq!(sample.context.ncols(), 3);
        assert_eq!(sample.target.ncols(), 1);
        assert_eq!(sample.target[[0, 0]], 402.0);
        assert_eq!(ds.target_columns(), vec!["c2"]);
    }

    #[test]
    fn test_invalid_target_index() {
        let data = Arc::new(ramp(10, 2));
        let result = WindowedDataset::new(SegmentKind::Test, data, 0, Arc::new(names(2)), vec![5], 4, 2);
        assert!(matches!(result, Err(KolosalError::IndexOutOfBounds { .. })));
    }

    #[test]
    fn test_deterministic_and_shuffle_reproducible() {
        let ds = dataset(50, 5, 5);
        let a: Vec<_> = ds.iter().collect();
        let b: Vec<_> = ds.iter().collect();
        assert_eq!(a, b);

        let s1 = ds.shuffled_indices(2023);
        let s2 = ds.shuffled_indices(2023);
        assert_eq!(s1, s2);
        let mut sorted = s1.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..ds.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_batch_shapes() {
        let ds = dataset(30, 6, 2);
        let (x, y) = ds.batch(&[0, 7, 3]).unwrap();
        assert_eq!(x.shape(), &[3, 6, 2]);
        assert_eq!(y.shape(), &[3, 2, 2]);
        assert_eq!(x[[1, 0, 0]], 700.0);

        let batches = ds.batch_indices(8, None);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), ds.len() - 16);
    }

    #[test]
    fn test_concurrent_reads_match_sequential() {
        let ds = dataset(200, 12, 4);
        let sequential: Vec<WindowSample> = ds.iter().collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let ds = &ds;
                    scope.spawn(move || {
                        (t..ds.len())
                            .step_by(4)
                            .map(|i| ds.get(i).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for handle in handles {
                for sample in handle.join().unwrap() {
                    assert_eq!(sample, sequential[sample.index]);
                }
            }
        });
    }
}
