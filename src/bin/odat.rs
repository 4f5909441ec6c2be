//! `odat` — the OpenLR Diagnostic Analysis Tool CLI.
//!
//! Loads a GeoJSON road-map snapshot and an input JSON of `(OpenLR code, source geometry)`
//! pairs, runs [`odat::run_workers`] over them, and streams a JSON file of verdicts
//! alongside a `metadata` object recording every effective run parameter.

mod options;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use odat::{AnalysisResult, AnalyzerConfig, Length, RoadMap, WorkResult, WorkerPoolConfig, run_workers};
use rustc_hash::FxHashMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use options::{Cli, RunConfig};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("odat: {error}");
            std::process::ExitCode::FAILURE
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum OdatError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    RoadMap(#[from] odat::RoadMapError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{field} must be provided via {flag}, {env}, or a config file")]
    MissingOption {
        field: &'static str,
        flag: &'static str,
        env: &'static str,
    },
}

fn run(cli: Cli) -> Result<(), OdatError> {
    let config = RunConfig::resolve(cli)?;
    install_tracing(config.verbose);
    info!(?config, "resolved run configuration");

    let load_start = Instant::now();
    let graph = Arc::new(RoadMap::from_path(&config.graph)?);
    info!(
        elapsed = ?load_start.elapsed(),
        lines = graph.get_linecount(),
        nodes = graph.get_nodecount(),
        "loaded road map"
    );

    let bounds_start = Instant::now();
    let bounds = Arc::new(graph.bounds(config.concave_ratio));
    info!(elapsed = ?bounds_start.elapsed(), "computed map bounds");

    let analyzer_config = AnalyzerConfig {
        decoder_config: config.decoder_config.to_decoder_config(),
        buffer_radius: Length::from_meters(config.buffer),
        lrp_radius: Length::from_meters(config.lrp_radius),
    };

    let pool_config = WorkerPoolConfig {
        num_threads: config.num_threads,
        detailed: config.detailed,
    };

    std::fs::create_dir_all(&config.output_dir)?;
    let output_path = config.output_path();
    let mut output = BufWriter::new(File::create(&output_path)?);

    write_header(&mut output, &config, &output_path)?;

    let mut tallies = Tallies::default();
    let mut first = true;
    let mut write_error = None;

    let analysis_start = Instant::now();
    run_workers(graph, Some(bounds), analyzer_config, pool_config, &config.input, |result| {
        tallies.record(&result);
        if write_error.is_none() {
            if let Err(error) = write_record(&mut output, &result, &mut first) {
                write_error = Some(error);
            }
        }
    })?;
    if let Some(error) = write_error {
        return Err(error.into());
    }

    writeln!(output, "]}}")?;
    output.flush()?;

    info!(elapsed = ?analysis_start.elapsed(), output = %output_path.display(), "analysis complete");
    tallies.log_summary();

    Ok(())
}

fn install_tracing(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn write_header(output: &mut impl Write, config: &RunConfig, output_path: &Path) -> std::io::Result<()> {
    let mut metadata = serde_json::to_value(config).expect("RunConfig always serializes");
    if let Some(object) = metadata.as_object_mut() {
        object.insert("input_file".to_string(), serde_json::Value::String(config.input.display().to_string()));
        object.insert("output_file".to_string(), serde_json::Value::String(output_path.display().to_string()));
    }
    write!(output, r#"{{"metadata":{metadata},"locations":["#)
}

fn write_record(output: &mut impl Write, result: &WorkResult, first: &mut bool) -> std::io::Result<()> {
    let record = serde_json::to_string(result)?;
    write!(output, "{}{record}", if *first { "" } else { "," })?;
    *first = false;
    Ok(())
}

/// Accumulates the per-verdict counts and average fraction printed as a summary once the run
/// completes, replacing the original tool's `rich`-rendered results table with structured
/// log lines.
#[derive(Default)]
struct Tallies {
    counts: FxHashMap<AnalysisResult, u64>,
    total_fraction: f64,
    processed: u64,
}

impl Tallies {
    fn record(&mut self, result: &WorkResult) {
        *self.counts.entry(result.result).or_default() += 1;
        if result.result != AnalysisResult::DuplicateOpenlrCode {
            self.total_fraction += result.fraction;
            self.processed += 1;
        }
    }

    fn log_summary(&self) {
        let mut rows: Vec<_> = self.counts.iter().collect();
        rows.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));

        for (result, count) in rows {
            let percent = if self.processed > 0 { 100.0 * (*count as f64) / (self.processed as f64) } else { 0.0 };
            info!(result = %result, count, percent = format!("{percent:.2}%"), "verdict tally");
        }

        let average = if self.processed > 0 { 100.0 * self.total_fraction / (self.processed as f64) } else { 0.0 };
        info!(processed = self.processed, average_fraction_within_buffer = format!("{average:.2}%"), "run summary");
    }
}
