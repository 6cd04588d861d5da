//! CLI entry point for the rent affordability mapper.
//!
//! Provides subcommands for evaluating neighborhood affordability against
//! a budget and surface, and for listing the categorical values discovered
//! in the dataset.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rent_atlas::aggregate;
use rent_atlas::dataset::{DEFAULT_DATA_URL, DatasetError, DatasetSnapshot, TARGET_YEAR};
use rent_atlas::estimate::{self, DEFAULT_BUDGET, DEFAULT_SURFACE, EstimationCriteria, RentTier};
use rent_atlas::fetch::BasicClient;
use rent_atlas::output;
use rent_atlas::stats::RunStats;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "rent_atlas")]
#[command(about = "Maps which city neighborhoods fit a monthly rent budget", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate neighborhood affordability for the given criteria
    Evaluate {
        /// Dataset to load: URL or local CSV file path
        #[arg(long, env = "RENT_DATA_URL", default_value = DEFAULT_DATA_URL)]
        source: String,

        /// Monthly budget in euros
        #[arg(short, long, default_value_t = DEFAULT_BUDGET)]
        budget: f64,

        /// Desired surface in square meters
        #[arg(short, long, default_value_t = DEFAULT_SURFACE)]
        surface: f64,

        /// Rental type as published in the dataset; defaults to the first
        /// discovered value
        #[arg(short = 't', long)]
        rental_type: Option<String>,

        /// Construction era to allow (repeatable); defaults to all
        /// discovered values
        #[arg(short, long = "era")]
        eras: Vec<String>,

        /// Which published per-m² rate to use
        #[arg(long, value_enum, default_value_t = RentTier::Capped)]
        tier: RentTier,

        /// JSON file to write renderer-ready summaries to
        #[arg(short, long, default_value = "summaries.json")]
        output: String,

        /// Optional CSV file to append run statistics to
        #[arg(long)]
        stats: Option<String>,
    },
    /// List categorical values discovered in the dataset
    Categories {
        /// Dataset to load: URL or local CSV file path
        #[arg(long, env = "RENT_DATA_URL", default_value = DEFAULT_DATA_URL)]
        source: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/rent_atlas.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("rent_atlas.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate {
            source,
            budget,
            surface,
            rental_type,
            eras,
            tier,
            output,
            stats,
        } => {
            evaluate(
                &source,
                budget,
                surface,
                rental_type,
                eras,
                tier,
                &output,
                stats.as_deref(),
            )
            .await?;
        }
        Commands::Categories { source } => {
            categories(&source).await?;
        }
    }

    Ok(())
}

/// Loads the dataset from a local file path or fetches it over HTTP.
#[tracing::instrument(fields(source = %source))]
async fn load_snapshot(source: &str) -> Result<DatasetSnapshot, DatasetError> {
    if source.starts_with("http") {
        let client = BasicClient::new();
        DatasetSnapshot::load(&client, source).await
    } else {
        let raw = std::fs::read_to_string(source)?;
        DatasetSnapshot::from_raw(&raw, TARGET_YEAR)
    }
}

/// Runs the full pipeline once and writes the renderer payload.
#[allow(clippy::too_many_arguments)]
async fn evaluate(
    source: &str,
    budget: f64,
    surface: f64,
    rental_type: Option<String>,
    eras: Vec<String>,
    tier: RentTier,
    output_path: &str,
    stats_path: Option<&str>,
) -> Result<()> {
    let snapshot = match load_snapshot(source).await {
        Ok(snapshot) => snapshot,
        Err(e @ (DatasetError::EmptyDataset | DatasetError::EmptyYear { .. })) => {
            warn!(error = %e, "Nothing to evaluate");
            if let Some(path) = stats_path {
                let kind = match e {
                    DatasetError::EmptyDataset => "empty_dataset",
                    _ => "empty_year",
                };
                let record = RunStats::from_error(kind, &e.to_string()).with_source(source);
                output::append_record(path, &record)?;
            }
            return Ok(());
        }
        Err(e) => {
            if let Some(path) = stats_path {
                let record = RunStats::from_error("load_error", &e.to_string()).with_source(source);
                let _ = output::append_record(path, &record);
            }
            return Err(e.into());
        }
    };

    let criteria = EstimationCriteria::resolve(&snapshot, budget, surface, rental_type, eras, tier)?;
    info!(
        rental_type = %criteria.rental_type,
        tier = %criteria.rent_tier,
        eras = criteria.allowed_eras.len(),
        "Criteria resolved"
    );

    let eligible = estimate::select_eligible(snapshot.records(), &criteria)?;
    if eligible.is_empty() {
        warn!("No rental offer matches the selected criteria, adjust the filters");
        if let Some(path) = stats_path {
            let record = RunStats::from_snapshot(snapshot.diagnostics()).with_source(source);
            output::append_record(path, &record)?;
        }
        return Ok(());
    }

    let summaries = aggregate::summarize(&eligible);
    let accessible = summaries.values().filter(|s| s.is_accessible).count();
    info!(
        neighborhoods = summaries.len(),
        accessible,
        eligible = eligible.len(),
        "Evaluation complete"
    );

    output::print_pretty(&summaries);
    output::write_layers(output_path, &summaries)?;

    if let Some(path) = stats_path {
        let record = RunStats::from_snapshot(snapshot.diagnostics())
            .with_source(source)
            .with_outcome(eligible.len(), &summaries);
        output::append_record(path, &record)?;
    }

    Ok(())
}

/// Lists the discovered categorical values a caller can filter on.
async fn categories(source: &str) -> Result<()> {
    let snapshot = match load_snapshot(source).await {
        Ok(snapshot) => snapshot,
        Err(e @ (DatasetError::EmptyDataset | DatasetError::EmptyYear { .. })) => {
            warn!(error = %e, "Nothing to list");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for rental_type in snapshot.rental_types() {
        info!(value = %rental_type, "Rental type");
    }
    for era in snapshot.construction_eras() {
        info!(value = %era, "Construction era");
    }

    let neighborhoods: BTreeSet<&str> = snapshot
        .records()
        .iter()
        .map(|r| r.neighborhood_name.as_str())
        .collect();

    info!(
        records = snapshot.records().len(),
        rental_types = snapshot.rental_types().len(),
        construction_eras = snapshot.construction_eras().len(),
        neighborhoods = neighborhoods.len(),
        "Dataset categories summary"
    );

    Ok(())
}
