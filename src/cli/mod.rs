//! Kolosal Forecast CLI Module
//!
//! Command-line interface for preparing forecasting datasets, scoring the
//! persistence baseline and inspecting input files.

use clap::{Args, Parser, Subcommand};
use colored::*;
use serde::Serialize;
use ndarray::ArrayView1;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ForecastConfig, ModelInputConfig};
use crate::data::{DataLoader, DataSaver};
use crate::pipeline::{ForecastPipeline, PipelineReport, PreparedData};
use crate::preprocessing::stats::{quantile_sorted, sorted_present};
use crate::preprocessing::ScalerState;
use crate::timeseries::SplitBoundaries;
use crate::trainer::{Forecaster, PersistenceForecaster};

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }
fn caution(s: &str) -> ColoredString { s.truecolor(230, 190, 90) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-forecast")]
#[command(author = "KolosalAI")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Windowed time-series forecasting data pipeline")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that runs the pipeline
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Input files (CSV, TSV or Parquet), concatenated in the given order
    #[arg(short, long, num_args = 1.., required = true)]
    pub data: Vec<PathBuf>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Rows of history fed to the model
    #[arg(long)]
    pub context_length: Option<usize>,

    /// Rows to forecast
    #[arg(long)]
    pub prediction_length: Option<usize>,

    /// Name of the timestamp column
    #[arg(long)]
    pub timestamp_column: Option<String>,

    /// Single-byte field delimiter
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Forecast targets (default: every input channel)
    #[arg(long, num_args = 1..)]
    pub targets: Option<Vec<String>>,
}

impl PipelineArgs {
    /// Resolve the effective configuration
    pub fn to_config(&self) -> anyhow::Result<ForecastConfig> {
        let mut config = match &self.config {
            Some(path) => ForecastConfig::from_json_file(path)?,
            None => ForecastConfig::default(),
        };
        if let Some(n) = self.context_length {
            config = config.with_context_length(n);
        }
        if let Some(n) = self.prediction_length {
            config = config.with_prediction_length(n);
        }
        if let Some(col) = &self.timestamp_column {
            config = config.with_timestamp_column(col.clone());
        }
        if let Some(d) = self.delimiter {
            if !d.is_ascii() {
                anyhow::bail!("Delimiter must be a single ASCII character, got '{}'", d);
            }
            config = config.with_delimiter(d as u8);
        }
        if let Some(targets) = &self.targets {
            config = config.with_target_columns(targets.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the data pipeline and summarise the prepared datasets
    Prepare {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Write the processed (augmented, scaled) table to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the run report and scaler state to this JSON file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Run the pipeline and score the persistence baseline on the test segment
    Evaluate {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Show shape, columns and missing values of a data file
    Info {
        /// Input data file
        #[arg(short, long)]
        data: PathBuf,

        /// Name of the timestamp column
        #[arg(long, default_value = "date")]
        timestamp_column: String,

        /// Single-byte field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

fn print_header(config: &ForecastConfig, files: &[PathBuf]) {
    println!();
    line_box_top();
    line_box_center(&format!("{}", "Kolosal Forecast".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_sep();
    line_box(&kv("Files     ", &files.len().to_string()));
    line_box(&kv("Context   ", &config.context_length.to_string()));
    line_box(&kv("Horizon   ", &config.prediction_length.to_string()));
    line_box(&kv("Split     ", &format!(
        "{:.0}% / rest / {:.0}%",
        config.train_fraction * 100.0,
        config.test_fraction * 100.0
    )));
    line_box_bottom();
}

/// Resolve the configuration once and run the pipeline with it
fn run_pipeline(args: &PipelineArgs) -> anyhow::Result<(ForecastConfig, PreparedData)> {
    let config = args.to_config()?;
    print_header(&config, &args.data);

    section("Pipeline");
    step_run("Preparing datasets");
    let start = Instant::now();
    let prepared = ForecastPipeline::new(config.clone())?.run(&args.data)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_summary(&prepared);
    Ok((config, prepared))
}

fn print_summary(prepared: &PreparedData) {
    let report = &prepared.report;

    println!("  {:<20} {}", muted("Rows loaded"), report.rows_loaded);
    println!("  {:<20} {}", muted("Outliers removed"), report.outliers_removed);
    println!("  {:<20} {}", muted("Cells filled"), report.missing_cells_filled);
    println!(
        "  {:<20} {} {}",
        muted("Channels"),
        report.augmented_channels,
        dim(&format!("({} original)", report.original_channels))
    );
    println!(
        "  {:<20} {}",
        muted("Targets"),
        prepared.train.target_columns().join(", ")
    );

    println!();
    println!("  {:<12} {:>10} {:>10} {:>14}", muted("Segment"), muted("Rows"), muted("Windows"), muted("Row range"));
    println!("  {}", dim(&"─".repeat(50)));
    for dataset in [&prepared.train, &prepared.valid, &prepared.test] {
        let range = dataset.segment_range();
        println!(
            "  {:<12} {:>10} {:>10} {:>14}",
            dataset.kind().name(),
            dataset.segment_len(),
            dataset.len(),
            format!("{}..{}", range.start, range.end)
        );
    }

    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("  {} {}", caution("!"), warning);
        }
    }
}

/// What `prepare --report` writes
#[derive(Serialize)]
struct RunArtifacts<'a> {
    report: &'a PipelineReport,
    scaler: &'a ScalerState,
    model_config: &'a ModelInputConfig,
    boundaries: &'a SplitBoundaries,
}

pub fn cmd_prepare(
    args: &PipelineArgs,
    output: Option<&Path>,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let (_, prepared) = run_pipeline(args)?;

    if let Some(path) = output {
        println!();
        step_run(&format!("Saving → {}", path.display()));
        DataSaver::save_csv(&prepared.processed, path)?;
        step_done(&format!(
            "{} rows × {} cols",
            prepared.processed.n_rows(),
            prepared.processed.n_channels() + 1
        ));
    }

    if let Some(path) = report_path {
        let artifacts = RunArtifacts {
            report: &prepared.report,
            scaler: &prepared.scaler,
            model_config: &prepared.model_config,
            boundaries: &prepared.boundaries,
        };
        step_run(&format!("Saving → {}", path.display()));
        std::fs::write(path, serde_json::to_string_pretty(&artifacts)?)?;
        step_done("report");
    }

    println!();
    Ok(())
}

pub fn cmd_evaluate(args: &PipelineArgs) -> anyhow::Result<()> {
    let (config, prepared) = run_pipeline(args)?;

    if prepared.test.is_empty() {
        anyhow::bail!(
            "Test segment has {} rows; at least {} are needed for one window",
            prepared.test.segment_len(),
            config.window_span()
        );
    }

    section("Persistence baseline");
    step_run("Fitting");
    let mut model = PersistenceForecaster::new();
    let summary = model.fit(&prepared.train, &prepared.valid, &config.trainer)?;
    step_done(&format!("train mse {:.6}", summary.train_loss));

    step_run("Predicting test windows");
    let output = model.predict(&prepared.test)?;
    step_done(&format!("{} windows", output.metrics.n_samples));

    let (pred, truth) = output.to_original_scale(&prepared.scaler, prepared.test.target_indices())?;
    let original_mse = crate::evaluation::mean_squared_error(&pred, &truth)?;

    println!();
    if let Some(valid_loss) = summary.valid_loss {
        println!("  {:<20} {:.6}", muted("Validation MSE"), valid_loss);
    }
    println!("  {:<20} {}", muted("Test MSE (scaled)"), format!("{:.6}", output.metrics.mse).white().bold());
    println!("  {:<20} {:.6}", muted("Test MAE (scaled)"), output.metrics.mae);
    println!("  {:<20} {:.6}", muted("Test MSE (original)"), original_mse);
    println!();
    Ok(())
}

pub fn cmd_info(data_path: &Path, timestamp_column: &str, delimiter: char) -> anyhow::Result<()> {
    section("Data Info");

    if !delimiter.is_ascii() {
        anyhow::bail!("Delimiter must be a single ASCII character, got '{}'", delimiter);
    }
    let loader = DataLoader::new(timestamp_column).with_delimiter(delimiter as u8);
    let df = loader.load_auto(data_path)?;
    let frame = loader.frame_from_dataframe(&df)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), frame.n_rows());
    println!("  {:<12} {}", muted("Channels"), frame.n_channels());
    if let (Some(first), Some(last)) = (frame.timestamps().iter().min(), frame.timestamps().iter().max()) {
        println!("  {:<12} {} → {}", muted("Span"), first, last);
    }
    println!("  {:<12} {:.2} MB", muted("Memory"), df.estimated_size() as f64 / 1024.0 / 1024.0);
    println!();

    println!("  {:<24} {:>8} {:>10}", muted("Column"), muted("Missing"), muted("Median"));
    println!("  {}", dim(&"─".repeat(44)));

    for (name, missing) in frame.missing_per_column() {
        let median = median_label(frame.column(&name)?);
        let missing_cell = if missing > 0 {
            format!("{:>8}", missing).truecolor(230, 190, 90)
        } else {
            format!("{:>8}", missing).normal()
        };
        println!("  {:<24} {} {:>10}", name, missing_cell, median);
    }

    println!();
    Ok(())
}

fn median_label(values: ArrayView1<'_, f64>) -> String {
    match quantile_sorted(&sorted_present(values.iter().copied()), 0.5) {
        Some(median) => format!("{:.4}", median),
        None => "-".to_string(),
    }
}
