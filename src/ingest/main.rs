//! BAG extract ingest.
//!
//! Loads every entity kind from a directory of extract shards into SQLite,
//! then builds and cleans the `addresses` relation.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use adressen::pipeline;
use adressen::quality;
use adressen::store::SqliteStore;
use adressen::PipelineConfig;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "ingest")]
#[command(about = "Ingest a BAG extract into SQLite")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with the unpacked extract (overrides the config)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// SQLite database path (overrides the config)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Municipality/province reference CSV
    #[arg(long)]
    municipalities: Option<PathBuf>,

    /// Number of parser workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Keep building and place footprints
    #[arg(long)]
    parse_geometries: bool,

    /// Use the short street name where one exists
    #[arg(long)]
    short_street_names: bool,

    /// Keep inactive and historical records (skips the address build)
    #[arg(long)]
    all_records: bool,

    /// Only load the per-kind tables
    #[arg(long)]
    skip_addresses: bool,

    /// Drop numbers, buildings, units, berths and pitches afterwards
    #[arg(long)]
    drop_source_tables: bool,

    /// Run the quality checks when done
    #[arg(long)]
    verify: bool,

    /// Hide progress bars
    #[arg(long)]
    no_progress: bool,
}

impl Args {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(input) = &self.input {
            config.input_dir = input.clone();
        }
        if let Some(database) = &self.database {
            config.database = database.clone();
        }
        if let Some(path) = &self.municipalities {
            config.municipalities_file = Some(path.clone());
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        config.parse_geometries |= self.parse_geometries;
        config.short_street_names |= self.short_street_names;
        config.drop_source_tables |= self.drop_source_tables;
        if self.all_records {
            config.active_only = false;
        }
        if self.skip_addresses {
            config.create_addresses = false;
        }
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    args.apply(&mut config);

    info!("Adressen ingest");
    info!("Input: {}", config.input_dir.display());
    info!("Database: {}", config.database.display());
    info!("Workers: {}", config.worker_count());

    let mut store = SqliteStore::open(&config.database)
        .with_context(|| format!("Failed to open {}", config.database.display()))?;

    let start = Instant::now();
    let summary = pipeline::run(&mut store, &config, !args.no_progress)?;

    for stats in &summary.kinds {
        info!(
            "  {:<20} {:>4} shards {:>10} elements {:>10} records {:>8.1}s",
            stats.kind.to_string(),
            stats.shards,
            stats.elements,
            stats.records,
            stats.elapsed.as_secs_f64()
        );
    }
    if let Some(fixes) = &summary.fixes {
        info!(
            "Fixes: {} construction years, {} floor areas cleared, {} of {} addresses without public space deleted",
            fixes.construction_years_cleared,
            fixes.floor_areas_cleared,
            fixes.addresses_deleted,
            fixes.addresses_without_public_space
        );
    }
    info!("Done in {:.1}s", start.elapsed().as_secs_f64());

    if args.verify && summary.addresses_built {
        let report = quality::verify(&store, false)?;
        if !report.passed() {
            anyhow::bail!("{} quality errors", report.total_errors());
        }
    }

    Ok(())
}
