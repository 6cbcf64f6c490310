//! Catalog storage backends.
//!
//! The reconciler only sees the [`AssetCatalog`] contract. Implementations:
//! - `memory`: process-local index, useful for dry runs and tests
//! - `local`: JSON document on disk, rewritten atomically per batch
//! - `http`: remote catalog service
//!
//! All of them upsert by asset name, so re-submitting the same batch never
//! duplicates entries.

pub mod http;
pub mod local;
pub mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{
    Asset, CatalogConfig, RejectReason, UpsertOutcome, UpsertResult, next_discovery_stamp,
};

pub use http::HttpCatalog;
pub use local::LocalCatalog;
pub use memory::MemoryCatalog;

/// Persistent store of discovered assets.
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Insert or replace every asset by name.
    ///
    /// Returns one result per input record, in input order. Accepted records
    /// stay committed even when others in the batch are rejected.
    async fn bulk_upsert(&self, assets: &[Asset]) -> Result<Vec<UpsertResult>>;

    async fn get_asset(&self, name: &str) -> Result<Option<Asset>>;

    /// Every stored asset, ordered by name.
    async fn list_assets(&self) -> Result<Vec<Asset>>;

    /// Assets carrying all of `tags`.
    async fn search_by_tags(&self, tags: &[String]) -> Result<Vec<Asset>> {
        Ok(self
            .list_assets()
            .await?
            .into_iter()
            .filter(|a| a.has_all_tags(tags))
            .collect())
    }
}

/// Name-keyed asset index shared by the in-process catalogs.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    assets: BTreeMap<String, Asset>,
}

impl CatalogIndex {
    pub fn from_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        Self {
            assets: assets.into_iter().map(|a| (a.name.clone(), a)).collect(),
        }
    }

    /// Upsert one asset, keeping its discovery stamp strictly increasing.
    pub fn apply(&mut self, asset: &Asset) -> UpsertOutcome {
        if !asset.has_valid_name() {
            return UpsertOutcome::Rejected {
                reason: RejectReason::InvalidName,
            };
        }
        let Some(proposed) = asset.last_discovered_at else {
            return UpsertOutcome::Rejected {
                reason: RejectReason::MissingDiscoveryTimestamp,
            };
        };

        let previous = self.assets.get(&asset.name);
        let outcome = match previous {
            None => UpsertOutcome::Created,
            Some(prev) if prev.fingerprint() == asset.fingerprint() => UpsertOutcome::Refreshed,
            Some(_) => UpsertOutcome::Replaced,
        };

        let mut stored = asset.clone();
        stored.last_discovered_at = Some(next_discovery_stamp(
            previous.and_then(|p| p.last_discovered_at),
            proposed,
        ));
        self.assets.insert(stored.name.clone(), stored);
        outcome
    }

    /// Apply a whole batch, returning per-record results.
    pub fn apply_all(&mut self, assets: &[Asset]) -> Vec<UpsertResult> {
        assets
            .iter()
            .map(|a| UpsertResult::new(a.name.clone(), self.apply(a)))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Asset> {
        self.assets.get(name)
    }

    pub fn values(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Open the catalog described by `config`.
///
/// Called once at startup; the handle is shared by every reconciler.
pub async fn open_catalog(config: &CatalogConfig) -> Result<Arc<dyn AssetCatalog>> {
    let catalog: Arc<dyn AssetCatalog> = match config.kind.as_str() {
        "memory" => Arc::new(MemoryCatalog::new()),
        "local" => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| AppError::config("catalog.path is required for a local catalog"))?;
            Arc::new(LocalCatalog::open(path).await?)
        }
        "http" => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                AppError::config("catalog.endpoint is required for an http catalog")
            })?;
            Arc::new(HttpCatalog::new(
                endpoint,
                Duration::from_secs(config.timeout_secs),
            )?)
        }
        other => {
            return Err(AppError::config(format!("unknown catalog type '{}'", other)));
        }
    };
    log::info!("Using {} catalog", config.kind);
    Ok(catalog)
}
