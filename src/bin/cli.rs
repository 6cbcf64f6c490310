//! Catalog Crawler CLI
//!
//! Runs the crawler service, single cycles and catalog queries.

use std::path::PathBuf;

use catalog_crawler::{
    config::{DEFAULT_CONFIG_PATH, load_config},
    error::{AppError, Result},
    models::{CycleStatus, parse_manifest},
    pipeline, storage,
};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

/// Catalog Crawler - data asset discovery
#[derive(Parser, Debug)]
#[command(
    name = "catalog-crawler",
    version,
    about = "Discovers data asset manifests and keeps the catalog in sync"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Schedule every configured crawler until Ctrl+C
    Run,

    /// Run one reconcile cycle for a single crawler
    Crawl {
        /// Crawler name from the configuration
        name: String,
    },

    /// Validate configuration and backend settings
    Validate,

    /// Parse a manifest file and print it as JSON
    Parse {
        /// Manifest to parse
        file: PathBuf,
    },

    /// List catalogued assets
    List {
        /// Only assets carrying all of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Show one catalogued asset
    Show {
        /// Asset name
        name: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested, finishing in-flight cycles...");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Parsing a manifest needs no configuration
    if let Command::Parse { file } = &cli.command {
        init_logging(cli.verbose, "info");
        let bytes = std::fs::read(file)?;
        let asset = parse_manifest(&file.to_string_lossy(), &bytes)?;
        println!("{}", serde_json::to_string_pretty(&asset)?);
        return Ok(());
    }

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging(cli.verbose, "info");
            log::error!("Unusable configuration {}: {}", cli.config.display(), e);
            return Err(e);
        }
    };
    init_logging(cli.verbose, &config.logging.level);
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        // Handled before the configuration is loaded
        Command::Parse { .. } => {}

        Command::Validate => pipeline::run_validate(&config)?,

        Command::Run => {
            let catalog = storage::open_catalog(&config.catalog).await?;
            let shutdown = CancellationToken::new();
            cancel_on_ctrl_c(shutdown.clone());
            pipeline::run_service(&config, catalog, shutdown).await?;
        }

        Command::Crawl { name } => {
            let catalog = storage::open_catalog(&config.catalog).await?;
            let shutdown = CancellationToken::new();
            cancel_on_ctrl_c(shutdown.clone());
            let report = pipeline::run_once(&config, catalog, &name, &shutdown).await?;
            match report.status {
                CycleStatus::Completed => log::info!("Crawl complete!"),
                status => {
                    return Err(AppError::submission(format!(
                        "cycle for '{}' did not complete: {:?}",
                        name, status
                    )));
                }
            }
        }

        Command::List { tags } => {
            let catalog = storage::open_catalog(&config.catalog).await?;
            let assets = if tags.is_empty() {
                catalog.list_assets().await?
            } else {
                catalog.search_by_tags(&tags).await?
            };
            for asset in &assets {
                let stamp = asset
                    .last_discovered_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("{}\t{}\t{}", asset.name, asset.metadata.type_name, stamp);
            }
            log::info!("{} assets", assets.len());
        }

        Command::Show { name } => {
            let catalog = storage::open_catalog(&config.catalog).await?;
            match catalog.get_asset(&name).await? {
                Some(asset) => println!("{}", serde_json::to_string_pretty(&asset)?),
                None => {
                    return Err(AppError::config(format!("no asset named '{}'", name)));
                }
            }
        }
    }

    Ok(())
}
