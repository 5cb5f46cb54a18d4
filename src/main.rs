use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use rusty_tube::config::AppConfig;
use rusty_tube::data::stats::{self, QualityReport};
use rusty_tube::data::{clean, export, features, filter, DatasetLoader, ProgressEvent};

/// Load, enrich and filter a YouTube video/channel dataset.
#[derive(Parser, Debug)]
#[command(name = "rusty-tube", version, about, long_about = None)]
struct Cli {
    /// CSV file to load
    file: PathBuf,

    /// Rows to sample (overrides the configured default)
    #[arg(long, conflicts_with = "full")]
    sample: Option<usize>,

    /// Load every row without sampling
    #[arg(long)]
    full: bool,

    /// Keep videos with at least this many views
    #[arg(long, allow_hyphen_values = true)]
    min_views: Option<i64>,

    /// Keep videos with at most this many views
    #[arg(long, allow_hyphen_values = true)]
    max_views: Option<i64>,

    /// Keep only these categories (repeatable); none means all
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Disable the IQR outlier filter
    #[arg(long)]
    no_outliers: bool,

    /// Z-score standardise numeric columns before export
    #[arg(long)]
    normalize: bool,

    /// Print count/mean/std/quartiles for numeric columns
    #[arg(long)]
    describe: bool,

    /// Print the first N rows of the result as a table
    #[arg(long, value_name = "N")]
    head: Option<usize>,

    /// TOML configuration file (falls back to $RUSTY_TUBE_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the result to .csv, .json or .parquet
    #[arg(short, long)]
    export: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} rows  {msg}")?
            .progress_chars("=> "),
    );
    Ok(bar)
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = AppConfig::resolve(cli.config.as_deref())?;

    let sample_size = if cli.full {
        None
    } else {
        cli.sample.or(config.default_sample_size)
    };

    let mut spec = config.filter.clone();
    if cli.min_views.is_some() {
        spec.min_views = cli.min_views;
    }
    if cli.max_views.is_some() {
        spec.max_views = cli.max_views;
    }
    if !cli.categories.is_empty() {
        spec.categories = cli.categories.iter().cloned().collect();
    }
    if cli.no_outliers {
        spec.filter_outliers = false;
    }

    // ---- Load ----
    let bar = progress_bar()?;
    let mut on_progress = |ev: &ProgressEvent| {
        bar.set_length(ev.total_rows as u64);
        bar.set_position(ev.processed_rows as u64);
        bar.set_message(format!("{} categories", ev.categories.len()));
        if ev.is_complete {
            bar.finish_and_clear();
        }
    };
    let progress: &mut dyn FnMut(&ProgressEvent) = &mut on_progress;

    let loader = DatasetLoader::new(config.loader.clone());
    let loaded = match loader.load(&cli.file, sample_size, Some(progress)) {
        Ok(loaded) => loaded,
        Err(e) => {
            bar.abandon();
            if e.yields_empty() {
                eprintln!("no data: {e}");
            } else {
                eprintln!("data loading failed: {e}");
            }
            return Ok(ExitCode::FAILURE);
        }
    };
    for w in &loaded.warnings {
        println!("warning: {w}");
    }
    if loaded.dataset.is_empty() {
        eprintln!("dataset is empty");
        return Ok(ExitCode::FAILURE);
    }
    println!(
        "Loaded {} records ({} categories)",
        loaded.dataset.len(),
        loaded.categories.len()
    );

    // ---- Enrich + filter ----
    let engineered = features::engineer(&loaded.dataset);
    let outcome = filter::apply(&engineered, &spec);
    println!("\nFilters:");
    for d in &outcome.diagnostics {
        println!("  {d}");
    }

    let mut result = outcome.dataset;
    if cli.normalize {
        result = clean::normalize(&result);
    }

    // ---- Report ----
    println!("\nData quality report:");
    print!("{}", QualityReport::build(&result));

    if cli.describe {
        println!("\nNumeric summary:");
        let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{x:.2}"));
        for s in stats::describe(&result) {
            println!(
                "  {:<24} n={:<8} mean={:<12} std={:<12} min={:<10} 25%={:<10} 50%={:<10} 75%={:<10} max={}",
                s.column,
                s.count,
                fmt(s.mean),
                fmt(s.std),
                fmt(s.min),
                fmt(s.q25),
                fmt(s.median),
                fmt(s.q75),
                fmt(s.max)
            );
        }
    }

    if let Some(n) = cli.head {
        println!("\n{}", export::preview(&result, n)?);
    }

    if let Some(path) = &cli.export {
        export::export(&result, path)
            .with_context(|| format!("exporting to '{}'", path.display()))?;
        println!("\nExported {} rows to {}", result.len(), path.display());
    }

    Ok(ExitCode::SUCCESS)
}
