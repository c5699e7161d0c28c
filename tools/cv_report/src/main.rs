//! Leaf nitrogen CV report.
//! Fetches the observation CSV, screens it, runs random / spatial /
//! environmental cross-validation and writes figures plus a Markdown report.
//!
//! Output directory layout:
//!   report.md
//!   map_observations.png
//!   map_spatial_clusters.png      map_environmental_clusters.png
//!   density_spatial.png           density_environmental.png

mod render;
mod report;

use std::fs::{self, File};
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use leafn_core::cv::{cross_validate, standard_strategies, CvRun};
use leafn_core::dataset::{read_records, screen};
use leafn_core::summary::summarize_clusters;
use leafn_core::AnalysisConfig;

/// Grid resolution of the density curves.
const DENSITY_GRID: usize = 512;

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cv_report",
    about = "Compare random, spatial and environmental CV of a leaf nitrogen random forest"
)]
struct Args {
    /// CSV source: a local path or an http(s) URL.
    #[arg(short, long)]
    source: String,

    /// Analysis parameters as JSON (any subset of fields).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for report.md and figures (created if absent).
    #[arg(short, long, default_value = "report")]
    output: PathBuf,

    /// Override the number of trees per forest.
    #[arg(long)]
    trees: Option<usize>,

    /// Log progress (info level).
    #[arg(short, long)]
    verbose: bool,

    /// Log everything (debug level).
    #[arg(long)]
    debug: bool,
}

fn init_tracing(args: &Args) {
    let filter = if args.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else if args.verbose {
        tracing_subscriber::EnvFilter::new("info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── Input ────────────────────────────────────────────────────────────────────

fn open_source(source: &str) -> Result<Box<dyn Read>> {
    if source.starts_with("http://") || source.starts_with("https://") {
        info!(url = source, "fetching CSV");
        let response = reqwest::blocking::get(source)
            .with_context(|| format!("fetching {source}"))?
            .error_for_status()
            .with_context(|| format!("fetching {source}"))?;
        Ok(Box::new(response))
    } else {
        let file = File::open(source).with_context(|| format!("opening {source}"))?;
        Ok(Box::new(file))
    }
}

// ── main ─────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let mut cfg = match &args.config {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisConfig::default(),
    };
    if let Some(trees) = args.trees {
        cfg.forest.n_trees = trees;
    }
    if cfg.predictors.is_empty() {
        bail!("config lists no predictors");
    }

    let records = read_records(open_source(&args.source)?, &cfg.columns)
        .with_context(|| format!("reading {}", args.source))?;
    let screening = screen(records, cfg.top_species);
    if screening.table.is_empty() {
        bail!("no complete observations left after screening");
    }
    eprintln!(
        "{} raw rows, {} kept ({} species), {} excluded.",
        screening.n_raw,
        screening.table.len(),
        screening.top_species.len(),
        screening.excluded.len()
    );

    let mut runs: Vec<CvRun> = Vec::new();
    for strategy in standard_strategies(&cfg) {
        eprintln!("Running {} CV ({} folds) ...", strategy.name(), strategy.k());
        let run = cross_validate(&screening.table, &*strategy, &cfg.predictors, &cfg.forest)
            .with_context(|| format!("{} cross-validation", strategy.name()))?;
        let m = run.mean();
        eprintln!("  mean R² {:>7.3}   mean RMSE {:>7.3}", m.rsq, m.rmse);
        runs.push(run);
    }

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let map_path = args.output.join("map_observations.png");
    render::observation_map(&screening, &map_path)?;

    let mut cluster_sections = Vec::new();
    for run in runs.iter().filter(|r| r.strategy != "random") {
        let summaries = summarize_clusters(
            &screening.table,
            run.partition.labels(),
            run.partition.k(),
            DENSITY_GRID,
        );
        let cmap = args.output.join(format!("map_{}_clusters.png", run.strategy));
        render::cluster_map(&screening.table, run.partition.labels(), run.partition.k(), &cmap)?;
        let dens = args.output.join(format!("density_{}.png", run.strategy));
        render::density_plot(&summaries, &dens)?;
        cluster_sections.push(report::ClusterSection {
            strategy: run.strategy,
            map: file_name(&cmap),
            density: file_name(&dens),
            summaries,
        });
    }

    let report_path = args.output.join("report.md");
    let text = report::render(&cfg, &screening, &runs, &file_name(&map_path), &cluster_sections)
        .context("formatting report")?;
    fs::write(&report_path, text).with_context(|| format!("writing {}", report_path.display()))?;
    eprintln!("Wrote {}", report_path.display());
    Ok(())
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
