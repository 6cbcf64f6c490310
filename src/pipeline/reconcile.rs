// src/pipeline/reconcile.rs

//! One discovery cycle: walk, stamp, submit, report.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::models::{CrawlScope, CycleReport, CycleStatus};
use crate::services::Crawler;
use crate::storage::AssetCatalog;
use crate::utils::log as oplog;

/// Drives a crawler once and synchronizes its findings into the catalog.
#[derive(Clone)]
pub struct Reconciler {
    catalog: Arc<dyn AssetCatalog>,
    submit_timeout: Duration,
}

impl Reconciler {
    pub fn new(catalog: Arc<dyn AssetCatalog>, submit_timeout: Duration) -> Self {
        Self {
            catalog,
            submit_timeout,
        }
    }

    /// Run one cycle for `crawler` over `scope`.
    ///
    /// Never fails: every outcome is described by the returned report. A
    /// failed or interrupted walk submits nothing; a successful walk submits
    /// its whole batch, even when empty.
    pub async fn reconcile(
        &self,
        name: &str,
        crawler: &dyn Crawler,
        scope: &CrawlScope,
        shutdown: &CancellationToken,
    ) -> CycleReport {
        let mut report = CycleReport::new(name, Utc::now());

        let discovery = match crawler.walk(scope, shutdown).await {
            Ok(discovery) => discovery,
            Err(err) => {
                log::error!("[{}] Crawl of {} failed: {}", name, crawler.backend(), err);
                report.status = CycleStatus::CrawlFailed(err.to_string());
                return finish(report);
            }
        };

        report.discovered = discovery.assets.len();
        report.entry_errors = discovery.errors;

        if discovery.interrupted {
            log::warn!(
                "[{}] Crawl interrupted by shutdown after {} assets; nothing submitted",
                name,
                report.discovered
            );
            report.status = CycleStatus::Interrupted;
            return finish(report);
        }

        let stamp = Utc::now();
        let mut batch = discovery.assets;
        for asset in &mut batch {
            asset.last_discovered_at = Some(stamp);
        }

        match tokio::time::timeout(self.submit_timeout, self.catalog.bulk_upsert(&batch)).await {
            Ok(Ok(results)) => report.record_results(results),
            Ok(Err(err)) => {
                log::error!("[{}] Catalog submission failed: {}", name, err);
                report.status = CycleStatus::SubmissionFailed(err.to_string());
            }
            Err(_) => {
                log::error!(
                    "[{}] Catalog submission timed out after {:?}",
                    name,
                    self.submit_timeout
                );
                report.status = CycleStatus::SubmissionFailed(format!(
                    "timed out after {:?}",
                    self.submit_timeout
                ));
            }
        }

        for rejection in &report.rejections {
            if let crate::models::UpsertOutcome::Rejected { reason } = &rejection.outcome {
                log::warn!("[{}] Catalog rejected '{}': {}", name, rejection.name, reason);
            }
        }

        finish(report)
    }
}

fn finish(mut report: CycleReport) -> CycleReport {
    report.finished_at = Utc::now();
    log_report(&report);
    report
}

/// Print a cycle summary for the operator.
pub fn log_report(report: &CycleReport) {
    let status = match &report.status {
        CycleStatus::Completed => "completed".to_string(),
        CycleStatus::CrawlFailed(msg) => format!("crawl failed ({})", msg),
        CycleStatus::SubmissionFailed(msg) => format!("submission failed ({})", msg),
        CycleStatus::Interrupted => "interrupted".to_string(),
    };
    let elapsed = report.finished_at - report.started_at;

    oplog::summary(
        &format!("Cycle {}", report.crawler),
        &[
            ("Status", status),
            ("Discovered", report.discovered.to_string()),
            ("Ingested", report.ingested.to_string()),
            ("Rejected", report.rejected.to_string()),
            ("Entry errors", report.entry_errors.len().to_string()),
            ("Duration", format!("{}ms", elapsed.num_milliseconds())),
        ],
    );
    for error in &report.entry_errors {
        oplog::sub_item(&format!("{}: {}", error.location, error.message));
    }
}
