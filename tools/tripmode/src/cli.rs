//! CLI commands for tripmode

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{EndpointPolicy, PipelineConfig};
use crate::distance::DistanceMetric;
use crate::io::{load_reference, load_traces, write_outputs, OutputPaths};
use crate::pipeline::{format_preview, Pipeline};

#[derive(Parser)]
#[command(name = "tripmode")]
#[command(version, about = "Trip/dwell segmentation and transit mode inference for device traces", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Segment traces into trips and dwells, then classify trip modes
    Run {
        /// Location samples CSV (DeviceID, Timestamp, Latitude, Longitude)
        #[arg(long)]
        traces: PathBuf,

        /// Transit points CSV (Latitude, Longitude, Type)
        #[arg(long)]
        points: PathBuf,

        /// Transit routes CSV (RouteID, Latitude, Longitude, Sequence)
        #[arg(long)]
        routes: PathBuf,

        /// Output directory for trips.csv, dwells.csv, modes_of_transport.csv
        #[arg(short, long)]
        outdir: PathBuf,

        #[command(flatten)]
        tuning: TuningArgs,

        /// Scan reference features linearly instead of using the R-tree
        #[arg(long)]
        no_index: bool,

        /// Mode assignments to print after the run (0 disables the preview)
        #[arg(long)]
        preview: Option<usize>,
    },

    /// Segment traces into trips and dwells only
    Segment {
        /// Location samples CSV (DeviceID, Timestamp, Latitude, Longitude)
        #[arg(long)]
        traces: PathBuf,

        /// Output directory for trips.csv and dwells.csv
        #[arg(short, long)]
        outdir: PathBuf,

        #[command(flatten)]
        tuning: TuningArgs,
    },
}

/// Overrides applied on top of the config file
#[derive(Args, Debug, Default)]
pub struct TuningArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Distance threshold in meters
    #[arg(long)]
    pub distance_threshold: Option<f64>,

    /// Time threshold in seconds
    #[arg(long)]
    pub time_threshold: Option<f64>,

    /// Trip endpoint coordinates: trip or device
    #[arg(long)]
    pub endpoints: Option<EndpointPolicy>,

    /// Distance metric: geodesic or haversine
    #[arg(long)]
    pub metric: Option<DistanceMetric>,

    /// Worker threads (0 = one per core)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

impl TuningArgs {
    /// Defaults, then the config file, then flags
    pub fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(d) = self.distance_threshold {
            config.thresholds.distance_m = d;
        }
        if let Some(t) = self.time_threshold {
            config.thresholds.time_s = t;
        }
        if let Some(endpoints) = self.endpoints {
            config.pipeline.endpoints = endpoints;
        }
        if let Some(metric) = self.metric {
            config.pipeline.metric = metric;
        }
        if let Some(threads) = self.threads {
            config.pipeline.threads = threads;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Default tracing filter for a `-v` count
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            traces,
            points,
            routes,
            outdir,
            tuning,
            no_index,
            preview,
        } => {
            let mut config = tuning.resolve()?;
            if no_index {
                config.pipeline.spatial_index = false;
            }
            if let Some(rows) = preview {
                config.pipeline.preview_rows = rows;
            }
            run_full(config, &traces, &points, &routes, &outdir)
        }
        Commands::Segment {
            traces,
            outdir,
            tuning,
        } => run_segment(tuning.resolve()?, &traces, &outdir),
    }
}

fn run_full(
    config: PipelineConfig,
    traces_path: &Path,
    points_path: &Path,
    routes_path: &Path,
    outdir: &Path,
) -> Result<()> {
    let start = Instant::now();
    let pipeline = Pipeline::new(config)?;
    let preview_rows = pipeline.config().pipeline.preview_rows;

    let traces = load_traces(traces_path)
        .with_context(|| format!("Failed to read traces from {}", traces_path.display()))?;
    println!(
        "✓ Loaded {} samples from {} devices",
        traces.sample_count(),
        traces.devices.len()
    );

    let reference = load_reference(points_path, routes_path).with_context(|| {
        format!(
            "Failed to read transit data from {} and {}",
            points_path.display(),
            routes_path.display()
        )
    })?;
    println!(
        "✓ Loaded {} transit points and {} routes ({} vertices)",
        reference.points.len(),
        reference.routes.len(),
        reference.vertex_count()
    );

    let out = pipeline.run(&traces, &reference)?;
    println!(
        "✓ {} trips, {} dwells, {} mode assignments",
        out.summary.trips, out.summary.dwells, out.summary.assignments
    );

    let written = write_outputs(outdir, &out.trips, &out.dwells, Some(&out.modes))
        .with_context(|| format!("Failed to write results to {}", outdir.display()))?;
    print_written(&written);

    if preview_rows > 0 {
        println!();
        print!("{}", format_preview(&out.modes, preview_rows));
    }

    println!("\nTotal time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn run_segment(config: PipelineConfig, traces_path: &Path, outdir: &Path) -> Result<()> {
    let start = Instant::now();
    let pipeline = Pipeline::new(config)?;

    let traces = load_traces(traces_path)
        .with_context(|| format!("Failed to read traces from {}", traces_path.display()))?;
    println!(
        "✓ Loaded {} samples from {} devices",
        traces.sample_count(),
        traces.devices.len()
    );

    let segments = pipeline.segment(&traces)?;
    println!(
        "✓ {} trips, {} dwells",
        segments.trips.len(),
        segments.dwells.len()
    );

    let written = write_outputs(outdir, &segments.trips, &segments.dwells, None)
        .with_context(|| format!("Failed to write results to {}", outdir.display()))?;
    print_written(&written);

    println!("\nTotal time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}

fn print_written(paths: &OutputPaths) {
    for path in [&paths.trips, &paths.dwells, &paths.modes].into_iter().flatten() {
        println!("✓ Wrote {}", path.display());
    }
}
