//! Integration test: split partitioning and sliding-window indexing

use kolosal_forecast::prelude::*;
use ndarray::Array2;
use std::sync::Arc;

fn table(rows: usize, cols: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows, cols), |(i, j)| i as f64 + j as f64 / 10.0)
}

fn names(cols: usize) -> Vec<String> {
    (0..cols).map(|j| format!("ch{}", j)).collect()
}

#[test]
fn test_window_count_matches_formula_across_segments() {
    let values = table(1000, 3);
    for (ctx, pred) in [(50, 10), (1, 1), (96, 24), (512, 96), (700, 1)] {
        let split = SplitBoundaries::chronological(1000, 0.7, 0.2).unwrap();
        for kind in SegmentKind::ALL {
            let range = split.segment(kind);
            let rows = range.len();
            let ds = WindowedDataset::from_table(kind, &values, range, names(3), ctx, pred).unwrap();
            let expected = (rows as i64 - ctx as i64 - pred as i64 + 1).max(0) as usize;
            assert_eq!(ds.len(), expected, "{} ctx={} pred={}", kind, ctx, pred);
        }
    }
}

#[test]
fn test_no_window_spans_a_split_boundary() {
    for n in [0usize, 1, 9, 60, 61, 100, 333, 1000] {
        let values = table(n, 1);
        let split = SplitBoundaries::chronological(n, 0.7, 0.2).unwrap();
        for kind in SegmentKind::ALL {
            let range = split.segment(kind);
            let ds = WindowedDataset::from_table(kind, &values, range.clone(), names(1), 5, 3)
                .unwrap();
            for i in 0..ds.len() {
                let (context, target) = ds.sample_bounds(i).unwrap();
                assert!(context.start >= range.start && target.end <= range.end);

                // materialised values come from exactly those absolute rows
                let sample = ds.get(i).unwrap();
                assert_eq!(sample.context[[0, 0]], values[[context.start, 0]]);
                assert_eq!(sample.target[[2, 0]], values[[target.end - 1, 0]]);
            }
        }
    }
}

#[test]
fn test_split_is_exhaustive_and_ordered() {
    for n in 0..2000 {
        let split = SplitBoundaries::chronological(n, 0.7, 0.2).unwrap();
        let (train, valid, test) = split.sizes();
        assert_eq!(train + valid + test, n);
        assert_eq!(split.train().end, split.valid().start);
        assert_eq!(split.valid().end, split.test().start);
    }
}

#[test]
fn test_shared_segment_across_threads() {
    let data = Arc::new(table(500, 4));
    let ds = WindowedDataset::new(
        SegmentKind::Train,
        Arc::clone(&data),
        0,
        Arc::new(names(4)),
        vec![0, 3],
        48,
        12,
    )
    .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let ds = ds.clone();
            std::thread::spawn(move || {
                ds.shuffled_indices(t)
                    .into_iter()
                    .map(|i| (i, ds.get(i).unwrap()))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        for (i, sample) in handle.join().unwrap() {
            assert_eq!(sample, ds.get(i).unwrap());
            assert_eq!(sample.target.ncols(), 2);
        }
    }
}

#[test]
fn test_batches_cover_every_sample_once() {
    let ds = WindowedDataset::from_table(SegmentKind::Train, &table(200, 2), 0..200, names(2), 20, 5)
        .unwrap();
    let mut seen: Vec<usize> = ds.batch_indices(8, Some(2023)).into_iter().flatten().collect();
    seen.sort_unstable();
    assert_eq!(seen, (0..ds.len()).collect::<Vec<_>>());

    let (x, y) = ds.batch(&ds.batch_indices(8, Some(2023))[0]).unwrap();
    assert_eq!(x.shape(), &[8, 20, 2]);
    assert_eq!(y.shape(), &[8, 5, 2]);
}
