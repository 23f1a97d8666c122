//! penguin-clusters - command line entry point
//!
//! Loads penguin measurements from CSV, runs the elbow sweep and the final
//! K-means fit, renders the plots and prints the per-cluster summary.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use penguin_clusters::{
    ClusterSelection, CsvSink, CsvSource, MissingValuePolicy, NullSink, Pipeline, PipelineConfig,
    PipelineReport, Schema, TerminalSink, VisualizationSink,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlotTarget {
    /// Text charts on stdout
    Terminal,
    /// inertia.csv and scatter.csv in --out-dir
    Csv,
    /// No plots
    None,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MissingArg {
    Drop,
    Fail,
}

#[derive(Parser)]
#[command(name = "penguin-clusters")]
#[command(
    about = "Cluster penguin measurements into likely species with K-means",
    long_about = None
)]
struct Cli {
    /// Input data file (CSV with a header row)
    #[arg(short, long, default_value = "penguins.csv")]
    input: PathBuf,

    /// JSON pipeline configuration; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of clusters for the final fit, read off the elbow plot
    #[arg(short = 'k', long, conflicts_with = "auto_k")]
    clusters: Option<usize>,

    /// Pick K at the sharpest bend of the inertia curve instead
    #[arg(long)]
    auto_k: bool,

    /// Largest K in the elbow sweep
    #[arg(long)]
    k_max: Option<usize>,

    /// Seed for centroid initialization
    #[arg(short, long)]
    seed: Option<u64>,

    /// Fit the elbow sweep in parallel
    #[arg(long)]
    parallel: bool,

    /// Rows with missing cells
    #[arg(long, value_enum)]
    missing: Option<MissingArg>,

    /// Where to render the plots
    #[arg(long, value_enum, default_value = "terminal")]
    plot: PlotTarget,

    /// Output directory for --plot csv
    #[arg(short, long, default_value = "plots")]
    out_dir: PathBuf,

    /// Print the full report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli)?;
    let source = CsvSource::from_path(&cli.input, Schema::penguins()).missing(config.missing);
    info!(input = %cli.input.display(), "starting clustering run");

    let report = match cli.plot {
        PlotTarget::Terminal => run(source, TerminalSink::stdout(), config)?,
        PlotTarget::Csv => {
            let sink = CsvSink::new(&cli.out_dir)
                .with_context(|| format!("Failed to create {}", cli.out_dir.display()))?;
            run(source, sink, config)?
        }
        PlotTarget::None => run(source, NullSink, config)?,
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(k) = cli.clusters {
        config.selection = ClusterSelection::Manual { k };
    }
    if cli.auto_k {
        config.selection = ClusterSelection::Knee;
    }
    if let Some(k_max) = cli.k_max {
        config.k_max = k_max;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.parallel {
        config.parallel_sweep = true;
    }
    if let Some(missing) = cli.missing {
        config.missing = match missing {
            MissingArg::Drop => MissingValuePolicy::Drop,
            MissingArg::Fail => MissingValuePolicy::Fail,
        };
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn run<V: VisualizationSink>(
    source: CsvSource,
    sink: V,
    config: PipelineConfig,
) -> Result<PipelineReport> {
    let path = source.path().display().to_string();
    Pipeline::new(source, sink, config)
        .run()
        .with_context(|| format!("Clustering run on {} failed", path))
}

fn print_report(report: &PipelineReport) {
    println!("\nInertia by K");
    println!("============");
    for point in report.curve.points() {
        println!("  k={:<2} {:>12.4}", point.k, point.inertia);
    }

    println!(
        "\nFinal model: K={}, inertia {:.4}, {} iterations",
        report.k, report.model.inertia, report.model.n_iter
    );
    for (label, size) in report.model.cluster_sizes().iter().enumerate() {
        println!("  Cluster {}: {} penguins", label, size);
    }
    if !report.warnings.is_empty() {
        println!("  {} fit(s) stopped at the iteration cap", report.warnings.len());
    }

    println!("\nCluster means");
    println!("=============");
    print!("{}", report.summary);
}
