// src/services/filesystem.rs

//! Crawler for hierarchical stores mounted on the local filesystem.
//!
//! The directory walk runs on the blocking pool and only collects candidate
//! paths; manifests are then read one by one so that shutdown is observed
//! between entries.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::Pattern;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::connectors::filesystem::BACKEND;
use crate::connectors::{Connector, FilesystemConnector};
use crate::error::{AppError, Result};
use crate::models::{CrawlScope, DataSourceDefinition, Discovery, EntryError, parse_manifest};
use crate::services::Crawler;

/// Walks a directory tree below the connector's base path.
pub struct FilesystemCrawler {
    connector: FilesystemConnector,
}

impl FilesystemCrawler {
    /// Open a connector for `def` and wrap it.
    pub async fn connect(def: &DataSourceDefinition) -> Result<Self> {
        let mut connector = FilesystemConnector::new();
        connector.init_connection(def).await?;
        Ok(Self { connector })
    }

    fn resolve_root(base: &Path, scope: &CrawlScope) -> Result<PathBuf> {
        let mut start = base.to_path_buf();
        for level in scope.levels() {
            if level == ".." || level == "." {
                return Err(AppError::config(format!(
                    "root '{}' must not contain relative segments",
                    scope.root
                )));
            }
            start.push(level);
        }
        Ok(start)
    }
}

/// Display path of an entry relative to the base directory.
fn relative_location(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Collect matching leaf files in a deterministic order.
fn collect_candidates(
    base: &Path,
    start: &Path,
    matcher: &Pattern,
) -> Result<(Vec<PathBuf>, Vec<EntryError>)> {
    let mut candidates = Vec::new();
    let mut errors = Vec::new();

    for entry in WalkDir::new(start).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                if matcher.matches(&entry.file_name().to_string_lossy()) {
                    candidates.push(entry.into_path());
                }
            }
            // The root itself is unreadable: nothing can be discovered
            Err(err) if err.depth() == 0 => {
                return Err(AppError::connection(
                    BACKEND,
                    format!("{}: {}", start.display(), err),
                ));
            }
            Err(err) => {
                let location = err
                    .path()
                    .map(|p| relative_location(base, p))
                    .unwrap_or_default();
                errors.push(EntryError::new(location, err.to_string()));
            }
        }
    }

    Ok((candidates, errors))
}

#[async_trait]
impl Crawler for FilesystemCrawler {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn walk_with_filter(
        &self,
        root: &str,
        filter: &str,
        shutdown: &CancellationToken,
    ) -> Result<Discovery> {
        let scope = CrawlScope::new(root, filter);
        let matcher = scope.matcher()?;
        let base = self.connector.base_path()?.to_path_buf();
        let start = Self::resolve_root(&base, &scope)?;

        tokio::fs::metadata(&start)
            .await
            .map_err(|e| AppError::connection(BACKEND, format!("{}: {}", start.display(), e)))?;

        let walk_base = base.clone();
        let (candidates, walk_errors) = tokio::task::spawn_blocking(move || {
            collect_candidates(&walk_base, &start, &matcher)
        })
        .await
        .map_err(|e| AppError::connection(BACKEND, e))??;

        let mut discovery = Discovery {
            errors: walk_errors,
            ..Discovery::default()
        };
        log::debug!(
            "Found {} candidate manifests under {}",
            candidates.len(),
            base.display()
        );

        for path in candidates {
            if shutdown.is_cancelled() {
                discovery.interrupted = true;
                break;
            }

            let location = relative_location(&base, &path);
            let parsed = match tokio::fs::read(&path).await {
                Ok(bytes) => parse_manifest(&location, &bytes),
                Err(e) => Err(AppError::entry_parse(&location, e)),
            };
            match parsed {
                Ok(asset) => discovery.assets.push(asset),
                Err(err) => {
                    log::warn!("Skipping {}: {}", location, err);
                    discovery.errors.push(err.into());
                }
            }
        }

        Ok(discovery)
    }

    async fn close(&mut self) {
        self.connector.close_connection().await;
    }
}
