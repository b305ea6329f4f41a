//! Quality checks on a built address database.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use adressen::quality;
use adressen::store::SqliteStore;

#[derive(Parser, Debug)]
#[command(name = "verify")]
#[command(about = "Check an address database for data quality problems")]
struct Args {
    /// SQLite database path
    #[arg(short, long, default_value = "bag.sqlite")]
    database: PathBuf,

    /// Also require national row counts (full extract only)
    #[arg(long)]
    national: bool,
}

fn main() -> Result<ExitCode> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let store = SqliteStore::open(&args.database)
        .with_context(|| format!("Failed to open {}", args.database.display()))?;
    let report = quality::verify(&store, args.national)?;

    if report.passed() {
        info!("All {} checks passed", report.checks.len());
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{} errors found", report.total_errors());
        Ok(ExitCode::FAILURE)
    }
}
