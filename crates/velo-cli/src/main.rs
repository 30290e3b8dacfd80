//! `velo`: daily bike-share consolidation pipeline.
//!
//! # Usage
//!
//! ```
//! velo bootstrap
//! velo ingest --date 2024-10-19 --source paris
//! velo run --json
//! velo --config /etc/velo.toml aggregate
//! ```

mod ingest;
mod settings;

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context as _;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use ingest::{FetchOutcome, Ingestor};
use serde::Serialize;
use settings::Settings;
use strum::IntoEnumIterator;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;
use velo_core::source::Source;
use velo_pipeline::{AggregationOutcome, Pipeline, RunSummary, SourceOutcome};
use velo_store_sqlite::SqliteStore;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "velo", version, about = "Bike-share snapshot consolidation and aggregation")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "velo.toml")]
  config: PathBuf,

  /// SQLite database file (overrides `store_path`).
  #[arg(long, global = true, value_name = "FILE")]
  store: Option<PathBuf>,

  /// Root of the raw snapshot directories (overrides `raw_data_dir`).
  #[arg(long, global = true, value_name = "DIR")]
  raw_dir: Option<PathBuf>,

  /// Print the run report as JSON instead of text.
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Create the six warehouse tables.
  Bootstrap,

  /// Fetch the current feeds and save them under the snapshot date.
  Ingest {
    #[command(flatten)]
    day:    DayArg,
    #[command(flatten)]
    select: SourceArg,
  },

  /// Consolidate saved raw snapshots into the canonical tables.
  Consolidate {
    #[command(flatten)]
    day:    DayArg,
    #[command(flatten)]
    select: SourceArg,
  },

  /// Refresh the dimension and fact tables.
  Aggregate {
    #[command(flatten)]
    day: DayArg,
  },

  /// Ingest, bootstrap, consolidate and aggregate.
  Run {
    #[command(flatten)]
    day:         DayArg,
    /// Use the snapshots already on disk.
    #[arg(long)]
    skip_ingest: bool,
  },
}

#[derive(clap::Args, Debug)]
struct DayArg {
  /// Snapshot date (YYYY-MM-DD). Defaults to today.
  #[arg(long, value_name = "DATE")]
  date: Option<NaiveDate>,
}

impl DayArg {
  fn resolve(&self) -> NaiveDate { self.date.unwrap_or_else(|| Local::now().date_naive()) }
}

#[derive(clap::Args, Debug)]
struct SourceArg {
  /// Restrict to these sources (paris, toulouse, city-registry). Repeatable.
  #[arg(long = "source", value_name = "SOURCE")]
  sources: Vec<Source>,
}

impl SourceArg {
  fn resolve(&self) -> Vec<Source> {
    if self.sources.is_empty() { Source::iter().collect() } else { self.sources.clone() }
  }
}

// ─── Report ───────────────────────────────────────────────────────────────────

#[derive(Serialize, Default)]
struct Report {
  #[serde(skip_serializing_if = "Vec::is_empty")]
  ingest: Vec<FetchOutcome>,
  #[serde(flatten)]
  run:    Option<RunSummary>,
}

impl Report {
  fn is_success(&self) -> bool {
    self.ingest.iter().all(FetchOutcome::is_success)
      && self.run.as_ref().is_none_or(RunSummary::is_success)
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let mut settings = Settings::load(&cli.config)?;
  if let Some(store) = &cli.store {
    settings.store_path = store.clone();
  }
  if let Some(dir) = &cli.raw_dir {
    settings.raw_data_dir = dir.clone();
  }

  let report = match &cli.command {
    Command::Bootstrap => {
      let path = settings.store_path();
      SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to bootstrap store at {}", path.display()))?;
      info!(path = %path.display(), "schema ready");
      Report::default()
    }
    Command::Ingest { day, select } => Report {
      ingest: ingest(&settings, &select.resolve(), day.resolve()).await?,
      run:    None,
    },
    Command::Consolidate { day, select } => {
      let date = day.resolve();
      let store = connect(&settings).await?;
      let pipeline = Pipeline::new(&store, settings.layout());
      let mut summary = RunSummary::new(date);
      summary.sources = pipeline.consolidate(&select.resolve(), date).await;
      Report { ingest: Vec::new(), run: Some(summary) }
    }
    Command::Aggregate { day } => {
      let date = day.resolve();
      let store = connect(&settings).await?;
      let pipeline = Pipeline::new(&store, settings.layout());
      let mut summary = RunSummary::new(date);
      summary.aggregation = Some(pipeline.aggregate(date).await);
      Report { ingest: Vec::new(), run: Some(summary) }
    }
    Command::Run { day, skip_ingest } => {
      let date = day.resolve();
      let sources: Vec<Source> = Source::iter().collect();
      let fetched = if *skip_ingest { Vec::new() } else { ingest(&settings, &sources, date).await? };

      let path = settings.store_path();
      let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {}", path.display()))?;
      let summary = Pipeline::new(&store, settings.layout()).run(&sources, date).await;
      Report { ingest: fetched, run: Some(summary) }
    }
  };

  if cli.json {
    println!(
      "{}",
      serde_json::to_string_pretty(&report).context("failed to serialise report")?
    );
  } else {
    print_report(&report);
  }

  Ok(if report.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn ingest(
  settings: &Settings,
  sources: &[Source],
  date: NaiveDate,
) -> anyhow::Result<Vec<FetchOutcome>> {
  let ingestor = Ingestor::new(settings.layout())?;
  Ok(ingestor.fetch_all(settings, sources, date).await)
}

/// Open the store without creating tables, so a missing schema is reported
/// rather than silently created.
async fn connect(settings: &Settings) -> anyhow::Result<SqliteStore> {
  let path = settings.store_path();
  SqliteStore::connect(&path)
    .await
    .with_context(|| format!("failed to open store at {}", path.display()))
}

// ─── Text output ──────────────────────────────────────────────────────────────

fn print_report(report: &Report) {
  for fetched in &report.ingest {
    match &fetched.result {
      Ok(path) => println!("ingest      {:<14} saved {}", fetched.source, path.display()),
      Err(e) => println!("ingest      {:<14} FAILED {e:#}", fetched.source),
    }
  }

  let Some(summary) = &report.run else { return };

  for outcome in &summary.sources {
    match outcome {
      SourceOutcome::Consolidated(r) => println!(
        "consolidate {:<14} {} stations, {} statements, {} cities, {} dropped, {} unresolved",
        r.source,
        r.stations,
        r.statements,
        r.cities,
        r.rejected.len(),
        r.unresolved.len()
      ),
      SourceOutcome::Failed { source, error } => {
        println!("consolidate {source:<14} FAILED {error}")
      }
    }
  }

  match &summary.aggregation {
    Some(AggregationOutcome::Completed(r)) => println!(
      "aggregate   {:<14} {} cities, {} stations, {} facts ({} unaffiliated excluded)",
      r.run_date, r.dim_cities, r.dim_stations, r.facts, r.excluded_unaffiliated
    ),
    Some(AggregationOutcome::Failed { error }) => {
      println!("aggregate   {:<14} FAILED {error}", summary.run_date)
    }
    None => {}
  }
}
