//! Labsight - LIS dashboard analytics and lab report grouping
//!
//! A CLI tool that reads an exported snapshot of a laboratory information
//! system (patients, orders, reports, test catalog, lab settings) and
//! renders dashboard statistics or category-grouped lab reports.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad config, unreadable snapshot, unknown report, etc.)

mod analysis;
mod cli;
mod config;
mod models;
mod report;
mod store;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Local, Utc};
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use std::path::Path;
use store::SnapshotStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    // Config is read before logging starts so `general.verbose` can apply
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("Labsight v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Config: {:?}", config);

    if let Err(e) = run(args, config).await {
        error!("Run failed: {:#}", e);
        eprintln!("\nError: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .labsight.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to set the snapshot directory, range and UTC offset.");
    Ok(())
}

/// Initialize logging to stderr at `level`.
///
/// `RUST_LOG` takes over when set.
fn init_logging(level: tracing::Level) {
    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let result = match EnvFilter::try_from_default_env() {
        Ok(filter) => tracing::subscriber::set_global_default(builder.with_env_filter(filter).finish()),
        Err(_) => tracing::subscriber::set_global_default(
            builder.with_max_level(level).finish(),
        ),
    };

    if let Err(e) = result {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the selected command with the merged configuration.
async fn run(args: Args, config: Config) -> Result<()> {
    let store = SnapshotStore::new(config.store.data_dir.clone());
    info!("Reading snapshot from {}", store.root().display());

    let output = match args.command {
        Command::Dashboard { .. } => render_dashboard(&store, &config).await?,
        Command::Report { ref id } => render_report(&store, &config, id).await?,
        Command::InitConfig => return Ok(()),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            info!("Output saved to {}", path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// The current instant in the configured zone, or the system zone.
fn current_time(config: &Config) -> Result<DateTime<FixedOffset>> {
    let now = Utc::now();
    match config.dashboard.offset()? {
        Some(offset) => Ok(now.with_timezone(&offset)),
        None => {
            let local = now.with_timezone(&Local);
            Ok(local.with_timezone(local.offset()))
        }
    }
}

async fn render_dashboard(store: &SnapshotStore, config: &Config) -> Result<String> {
    let now = current_time(config)?;
    let data = store.load_dashboard_data().await;

    if data.patients.is_empty() && data.orders.is_empty() {
        warn!("Snapshot has no patients or orders; dashboard will be empty");
    }

    let range = config.dashboard.range;
    info!("Computing dashboard for the last {} days as of {}", range.days(), now);
    let dashboard = analysis::compute_dashboard(&data.patients, &data.orders, range, &now);

    match config.general.format {
        OutputFormat::Json => report::generate_json(&dashboard),
        OutputFormat::Markdown => Ok(report::generate_dashboard_markdown(&dashboard)),
    }
}

async fn render_report(store: &SnapshotStore, config: &Config, id: &str) -> Result<String> {
    let data = store
        .load_report_data(id)
        .await
        .with_context(|| format!("Failed to load report {}", id))?;

    if data.catalog.is_empty() {
        warn!("Test catalog is empty; all results will be listed under Other Tests");
    }

    let grouped = analysis::group_report(&data.report.tests, &data.catalog);
    info!(
        "Grouped {} results into {} categories ({} abnormal)",
        grouped.total_results,
        grouped.groups.len(),
        grouped.abnormal_results
    );

    match config.general.format {
        OutputFormat::Json => report::generate_json(&report::LabReportView {
            lab: &data.settings,
            report: &data.report,
            results: &grouped,
        }),
        OutputFormat::Markdown => Ok(report::generate_lab_report_markdown(
            &data.report,
            &grouped,
            &data.settings,
        )),
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("Warning: ignoring {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
