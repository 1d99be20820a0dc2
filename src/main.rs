use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use sheet_ingest::database::Store;
use sheet_ingest::{run_all, Config, RunContext, Workspace};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Ingests spreadsheet extracts into a DuckDB table store
#[derive(Parser, Debug)]
#[command(name = "sheet-ingest", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "ingest.yaml")]
    config: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Process as if today were this date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    fmt::Subscriber::builder().with_env_filter(env).with_target(false).init();

    let config = Config::load(&cli.config).with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if config.datasets.is_empty() {
        warn!(config = %cli.config.display(), "no datasets configured");
    }
    config
        .settings
        .bootstrap()
        .context("Failed to create working directories")?;
    let store = Store::open(&config.settings.database)
        .with_context(|| format!("Failed to open {}", config.settings.database.display()))?;

    let now = Local::now();
    let today = cli.date.unwrap_or_else(|| now.date_naive());
    let mut context = RunContext::new(Workspace::from(&config.settings), store, today, now.fixed_offset());
    info!(%today, datasets = config.datasets.len(), "starting ingestion");

    let summary = run_all(&mut context, &config.datasets);
    context.close().context("Failed to close the table store")?;
    info!(
        done = summary.done(),
        aborted = summary.aborted(),
        duplicates = summary.duplicates(),
        rows = summary.rows(),
        "ingestion finished"
    );
    Ok(())
}
