// src/pipeline/scheduler.rs

//! Periodic driver for one crawler.
//!
//! Two states: idle and running. A tick that fires while a cycle is still
//! running is skipped, never queued, so at most one cycle is in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::{Cadence, CrawlScope, CycleReport};
use crate::pipeline::Reconciler;
use crate::services::Crawler;

/// Counters returned when a scheduler stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub cycles_started: u64,
    pub cycles_skipped: u64,
}

/// Owns one crawler and fires reconcile cycles on its cadence.
pub struct Scheduler {
    name: String,
    cadence: Cadence,
    scope: CrawlScope,
    crawler: Arc<Mutex<Box<dyn Crawler>>>,
    reconciler: Reconciler,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        name: impl Into<String>,
        cadence: Cadence,
        scope: CrawlScope,
        crawler: Box<dyn Crawler>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            name: name.into(),
            cadence,
            scope,
            crawler: Arc::new(Mutex::new(crawler)),
            reconciler,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Tick until `shutdown` fires, then wait for the in-flight cycle and
    /// close the crawler's connection.
    pub async fn run(self, shutdown: CancellationToken) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        let start = Instant::now() + self.cadence.first_delay(Utc::now());
        let mut interval = tokio::time::interval_at(start, self.cadence.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!(
            "[{}] Scheduled every {:?}{}",
            self.name,
            self.cadence.period,
            self.cadence
                .weekday
                .map(|d| format!(" on {}", d))
                .unwrap_or_default()
        );

        let mut in_flight: Option<JoinHandle<CycleReport>> = None;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            stats.ticks += 1;

            if self
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                stats.cycles_skipped += 1;
                log::debug!("[{}] Previous cycle still running, skipping tick", self.name);
                continue;
            }

            stats.cycles_started += 1;
            in_flight = Some(self.spawn_cycle(shutdown.clone()));
        }

        if let Some(handle) = in_flight {
            if let Err(e) = handle.await {
                log::error!("[{}] Cycle task failed: {}", self.name, e);
            }
        }
        self.crawler.lock().await.close().await;
        log::info!(
            "[{}] Stopped after {} ticks ({} cycles, {} skipped)",
            self.name,
            stats.ticks,
            stats.cycles_started,
            stats.cycles_skipped
        );
        stats
    }

    fn spawn_cycle(&self, shutdown: CancellationToken) -> JoinHandle<CycleReport> {
        let name = self.name.clone();
        let scope = self.scope.clone();
        let crawler = Arc::clone(&self.crawler);
        let reconciler = self.reconciler.clone();
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let report = {
                let crawler = crawler.lock().await;
                reconciler
                    .reconcile(&name, &**crawler, &scope, &shutdown)
                    .await
            };
            running.store(false, Ordering::Release);
            report
        })
    }
}
