//! Data loading utilities
//!
//! Reads delimited files with polars and converts them into a
//! [`TimeSeriesFrame`]: the timestamp column is parsed with chrono and every
//! other column is cast to `f64`.

use super::frame::{TimeSeriesFrame, TIMESTAMP_FORMAT};
use crate::error::{KolosalError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Date-time layouts tried in order when parsing timestamp strings
const DATETIME_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a timestamp string using the supported layouts
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_local()))
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Loader for delimited time-series files
#[derive(Debug, Clone)]
pub struct DataLoader {
    timestamp_column: String,
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new("date")
    }
}

impl DataLoader {
    /// Create a loader for files keyed by `timestamp_column`
    pub fn new(timestamp_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            delimiter: b',',
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Read a delimited file into a DataFrame
    pub fn load_csv(&self, path: &Path, delimiter: u8) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            KolosalError::DataError(format!("{}: {}", path.display(), e))
        })?;

        let parse_opts = CsvParseOptions::default().with_separator(delimiter);

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| KolosalError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Read a Parquet file into a DataFrame
    pub fn load_parquet(&self, path: &Path) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| {
            KolosalError::DataError(format!("{}: {}", path.display(), e))
        })?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| KolosalError::DataError(format!("{}: {}", path.display(), e)))
    }

    /// Detect file format from extension and load
    pub fn load_auto(&self, path: &Path) -> Result<DataFrame> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "parquet" | "pq" => self.load_parquet(path),
            "tsv" => self.load_csv(path, b'\t'),
            _ => self.load_csv(path, self.delimiter),
        }
    }

    /// Load one file as a frame
    pub fn load_frame(&self, path: &Path) -> Result<TimeSeriesFrame> {
        let df = self.load_auto(path)?;
        debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded file");
        self.frame_from_dataframe(&df)
    }

    /// Load and concatenate files in the given order.
    ///
    /// All files must share identical columns. Zero paths is a configuration
    /// error.
    pub fn load_many(&self, paths: &[PathBuf]) -> Result<TimeSeriesFrame> {
        if paths.is_empty() {
            return Err(KolosalError::ConfigError("no input files given".to_string()));
        }

        let frames = paths
            .iter()
            .map(|p| self.load_frame(p))
            .collect::<Result<Vec<_>>>()?;
        let frame = TimeSeriesFrame::concat(frames)?;

        info!(
            files = paths.len(),
            rows = frame.n_rows(),
            channels = frame.n_channels(),
            "Input loaded"
        );
        Ok(frame)
    }

    /// Convert a DataFrame into a frame keyed by the timestamp column
    pub fn frame_from_dataframe(&self, df: &DataFrame) -> Result<TimeSeriesFrame> {
        let ts_column = df.column(&self.timestamp_column).map_err(|_| {
            KolosalError::ConfigError(format!(
                "timestamp column '{}' not found; available columns: {:?}",
                self.timestamp_column,
                df.get_column_names()
            ))
        })?;
        let timestamps = self.parse_timestamps(ts_column.as_materialized_series())?;

        let channel_names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .filter(|name| name != &self.timestamp_column)
            .collect();

        if channel_names.is_empty() {
            return Err(KolosalError::ConfigError(
                "input has no channel columns besides the timestamp".to_string(),
            ));
        }

        let n_rows = df.height();
        let mut values = Array2::from_elem((n_rows, channel_names.len()), f64::NAN);

        for (j, name) in channel_names.iter().enumerate() {
            let series = df.column(name)?.as_materialized_series();
            let (column, coerced) = Self::numeric_values(name, series)?;
            if coerced > 0 {
                warn!(column = %name, cells = coerced, "Non-numeric cells treated as missing");
            }
            for (i, v) in column.into_iter().enumerate() {
                values[[i, j]] = v;
            }
        }

        TimeSeriesFrame::new(self.timestamp_column.clone(), timestamps, channel_names, values)
    }

    fn parse_timestamps(&self, series: &Series) -> Result<Vec<NaiveDateTime>> {
        if series.dtype().is_integer() {
            let secs = series.cast(&DataType::Int64)?;
            return secs
                .i64()?
                .into_iter()
                .enumerate()
                .map(|(row, v)| {
                    v.and_then(|s| DateTime::from_timestamp(s, 0))
                        .map(|dt| dt.naive_utc())
                        .ok_or_else(|| self.timestamp_error(row, v.map(|s| s.to_string())))
                })
                .collect();
        }

        let as_str = series.cast(&DataType::String)?;
        as_str
            .str()?
            .into_iter()
            .enumerate()
            .map(|(row, v)| {
                v.and_then(parse_timestamp)
                    .ok_or_else(|| self.timestamp_error(row, v.map(|s| s.to_string())))
            })
            .collect()
    }

    fn timestamp_error(&self, row: usize, value: Option<String>) -> KolosalError {
        KolosalError::TimestampParse {
            column: self.timestamp_column.clone(),
            row,
            value: value.unwrap_or_else(|| "<null>".to_string()),
        }
    }

    /// Cast a channel to f64, mapping nulls to NaN.
    ///
    /// Also returns how many present cells failed the cast.
    fn numeric_values(name: &str, series: &Series) -> Result<(Vec<f64>, usize)> {
        let present = series.len() - series.null_count();
        let casted = series.cast(&DataType::Float64)?;
        let coerced = casted.null_count() - series.null_count();
        let values: Vec<f64> = casted
            .f64()?
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect();

        let numeric = values.iter().filter(|v| !v.is_nan()).count();
        if numeric == 0 {
            return Err(if present == 0 {
                KolosalError::EmptyColumn(name.to_string())
            } else {
                KolosalError::NonNumericColumn(name.to_string())
            });
        }
        Ok((values, coerced))
    }
}

/// Writes frames back to disk
pub struct DataSaver;

impl DataSaver {
    /// Save to CSV
    pub fn save_csv(frame: &TimeSeriesFrame, path: &Path) -> Result<()> {
        let mut df = frame.to_dataframe()?;
        let mut file = File::create(path)?;

        CsvWriter::new(&mut file)
            .finish(&mut df)
            .map_err(|e| KolosalError::DataError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2016-07-01 00:00:00").is_some());
        assert!(parse_timestamp("2016-07-01T13:45:00").is_some());
        assert!(parse_timestamp("2016-07-01 13:45").is_some());
        assert!(parse_timestamp("2016-07-01T13:45:00+02:00").is_some());
        assert!(parse_timestamp("2016-07-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_offset_timestamp_keeps_wall_clock() {
        let ts = parse_timestamp("2016-07-01T05:30:00+02:00").unwrap();
        assert_eq!(ts.to_string(), "2016-07-01 05:30:00");
        let ts = parse_timestamp("2016-07-01T23:00:00-05:00").unwrap();
        assert_eq!(ts.to_string(), "2016-07-01 23:00:00");
    }

    #[test]
    fn test_load_frame() {
        let file = write_csv(&[
            "date,HUFL,OT",
            "2016-07-01 00:00:00,5.8,30.5",
            "2016-07-01 01:00:00,5.6,",
            "2016-07-01 02:00:00,5.7,27.8",
        ]);
        let loader = DataLoader::new("date");
        let frame = loader.load_frame(file.path()).unwrap();

        assert_eq!(frame.n_rows(), 3);
        assert_eq!(frame.columns(), &["HUFL", "OT"]);
        assert!(frame.column("OT").unwrap()[1].is_nan());
        assert_eq!(frame.missing_count(), 1);
    }

    #[test]
    fn test_custom_delimiter() {
        let file = write_csv(&["ts;x", "2020-01-01 00:00:00;1", "2020-01-01 01:00:00;2"]);
        let loader = DataLoader::new("ts").with_delimiter(b';');
        let frame = loader.load_frame(file.path()).unwrap();
        assert_eq!(frame.column("x").unwrap().to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_missing_timestamp_column() {
        let file = write_csv(&["time,x", "2020-01-01,1"]);
        let loader = DataLoader::new("date");
        let err = loader.load_frame(file.path()).unwrap_err();
        assert!(matches!(err, KolosalError::ConfigError(ref m) if m.contains("date")));
    }

    #[test]
    fn test_unparsable_timestamp() {
        let file = write_csv(&["date,x", "2020-01-01,1", "not-a-date,2"]);
        let loader = DataLoader::new("date");
        let err = loader.load_frame(file.path()).unwrap_err();
        assert!(matches!(err, KolosalError::TimestampParse { row: 1, .. }));
    }

    #[test]
    fn test_non_numeric_column() {
        let file = write_csv(&["date,x,label", "2020-01-01,1,foo", "2020-01-02,2,bar"]);
        let loader = DataLoader::new("date");
        let err = loader.load_frame(file.path()).unwrap_err();
        assert!(matches!(err, KolosalError::NonNumericColumn(ref c) if c == "label"));
    }

    #[test]
    fn test_stray_text_cells_are_counted() {
        let series = Series::new("x".into(), &[Some("1.5"), None, Some("n/a"), Some("3")]);
        let (values, coerced) = DataLoader::numeric_values("x", &series).unwrap();
        assert_eq!(coerced, 1);
        assert_eq!(values[0], 1.5);
        assert!(values[1].is_nan() && values[2].is_nan());
        assert_eq!(values[3], 3.0);

        let file = write_csv(&["date,x", "2020-01-01,1", "2020-01-02,abc", "2020-01-03,3"]);
        let frame = DataLoader::new("date").load_frame(file.path()).unwrap();
        assert!(frame.column("x").unwrap()[1].is_nan());
        assert_eq!(frame.missing_count(), 1);
    }

    #[test]
    fn test_zero_files_is_config_error() {
        let loader = DataLoader::new("date");
        assert!(matches!(
            loader.load_many(&[]),
            Err(KolosalError::ConfigError(_))
        ));
    }

    #[test]
    fn test_load_many_concatenates_in_order() {
        let a = write_csv(&["date,x", "2020-01-01 00:00:00,1", "2020-01-01 01:00:00,2"]);
        let b = write_csv(&["date,x", "2020-01-01 02:00:00,3"]);
        let loader = DataLoader::new("date");
        let frame = loader
            .load_many(&[a.path().to_path_buf(), b.path().to_path_buf()])
            .unwrap();
        assert_eq!(frame.column("x").unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_save_csv_roundtrip() {
        let file = write_csv(&["date,x", "2020-01-01 00:00:00,1.5", "2020-01-01 01:00:00,2.5"]);
        let loader = DataLoader::new("date");
        let frame = loader.load_frame(file.path()).unwrap();

        let out = NamedTempFile::new().unwrap();
        DataSaver::save_csv(&frame, out.path()).unwrap();
        let reloaded = loader.load_csv(out.path(), b',').unwrap();
        let reloaded = loader.frame_from_dataframe(&reloaded).unwrap();

        assert_eq!(reloaded, frame);
    }
}
