// src/pipeline/run.rs

//! Service entry points: schedule every configured crawler, or run one
//! cycle on demand.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, ErrorKind, Result};
use crate::models::{Cadence, Config, CrawlerDefinition, CycleReport};
use crate::pipeline::{Reconciler, Scheduler, SchedulerStats};
use crate::services::{self, Crawler};
use crate::storage::AssetCatalog;
use crate::utils::log as oplog;

/// Final counters of one crawler's scheduler.
#[derive(Debug, Clone)]
pub struct CrawlerRun {
    pub name: String,
    pub stats: SchedulerStats,
}

fn reconciler_for(config: &Config, catalog: Arc<dyn AssetCatalog>) -> Reconciler {
    Reconciler::new(catalog, Duration::from_secs(config.catalog.timeout_secs))
}

/// Check a definition completely before any connection is attempted.
fn preflight(def: &CrawlerDefinition) -> Result<Cadence> {
    services::validate_definition(&def.backend)
        .map_err(|e| AppError::config(format!("crawler '{}': {}", def.name, e)))?;
    def.scope().matcher()?;
    def.schedule.cadence()
}

/// Run every configured crawler on its own schedule until `shutdown`.
///
/// Configuration errors abort startup. A crawler whose backend cannot be
/// reached at startup is logged and left out; if none can be started the
/// service fails.
pub async fn run_service(
    config: &Config,
    catalog: Arc<dyn AssetCatalog>,
    shutdown: CancellationToken,
) -> Result<Vec<CrawlerRun>> {
    oplog::header("Catalog crawler service");
    if config.crawlers.is_empty() {
        return Err(AppError::config("no crawlers configured"));
    }

    let mut planned = Vec::with_capacity(config.crawlers.len());
    for def in &config.crawlers {
        planned.push((def, preflight(def)?));
    }

    let mut connected: Vec<(&CrawlerDefinition, Cadence, Box<dyn Crawler>)> = Vec::new();
    for (def, cadence) in planned {
        match services::connect(&def.backend).await {
            Ok(crawler) => {
                oplog::sub_item(&format!("{} ({}) connected", def.name, def.backend.kind));
                connected.push((def, cadence, crawler));
            }
            Err(err) if err.kind() == ErrorKind::Config => {
                for (_, _, mut crawler) in connected {
                    crawler.close().await;
                }
                return Err(AppError::config(format!("crawler '{}': {}", def.name, err)));
            }
            Err(err) => {
                log::error!("[{}] Not scheduled, connection failed: {}", def.name, err);
            }
        }
    }

    if connected.is_empty() {
        return Err(AppError::connection(
            "service",
            "no crawler could connect to its backend",
        ));
    }

    let reconciler = reconciler_for(config, catalog);
    let tasks: Vec<_> = connected
        .into_iter()
        .map(|(def, cadence, crawler)| {
            let name = def.name.clone();
            let scheduler =
                Scheduler::new(&def.name, cadence, def.scope(), crawler, reconciler.clone());
            let shutdown = shutdown.clone();
            async move {
                let stats = tokio::spawn(scheduler.run(shutdown))
                    .await
                    .unwrap_or_else(|e| {
                        log::error!("[{}] Scheduler task failed: {}", name, e);
                        SchedulerStats::default()
                    });
                CrawlerRun { name, stats }
            }
        })
        .collect();

    let runs = join_all(tasks).await;
    oplog::summary(
        "Service stopped",
        &runs
            .iter()
            .map(|r| {
                (
                    r.name.as_str(),
                    format!(
                        "{} cycles, {} skipped ticks",
                        r.stats.cycles_started, r.stats.cycles_skipped
                    ),
                )
            })
            .collect::<Vec<_>>(),
    );
    Ok(runs)
}

/// Run a single reconcile cycle for the crawler called `name`.
pub async fn run_once(
    config: &Config,
    catalog: Arc<dyn AssetCatalog>,
    name: &str,
    shutdown: &CancellationToken,
) -> Result<CycleReport> {
    let def = config
        .crawler(name)
        .ok_or_else(|| AppError::config(format!("no crawler named '{}'", name)))?;
    preflight(def)?;

    let mut crawler = services::connect(&def.backend).await?;
    let report = reconciler_for(config, catalog)
        .reconcile(&def.name, &*crawler, &def.scope(), shutdown)
        .await;
    crawler.close().await;
    Ok(report)
}
