//! Process-local catalog.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{Asset, UpsertResult};
use crate::storage::{AssetCatalog, CatalogIndex};

/// Catalog kept in memory for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    index: RwLock<CatalogIndex>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetCatalog for MemoryCatalog {
    async fn bulk_upsert(&self, assets: &[Asset]) -> Result<Vec<UpsertResult>> {
        Ok(self.index.write().await.apply_all(assets))
    }

    async fn get_asset(&self, name: &str) -> Result<Option<Asset>> {
        Ok(self.index.read().await.get(name).cloned())
    }

    async fn list_assets(&self) -> Result<Vec<Asset>> {
        Ok(self.index.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn asset(name: &str, description: &str, tags: &[&str]) -> Asset {
        let mut asset = Asset::new(name, "dataset");
        asset.description = Some(description.to_string());
        asset.tags = tags.iter().map(|t| t.to_string()).collect();
        asset.last_discovered_at = Some(Utc::now());
        asset
    }

    #[tokio::test]
    async fn test_same_name_twice_keeps_one_entry() {
        let catalog = MemoryCatalog::new();
        catalog.bulk_upsert(&[asset("orders", "first", &[])]).await.unwrap();
        catalog.bulk_upsert(&[asset("orders", "second", &[])]).await.unwrap();

        let all = catalog.list_assets().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].description.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_resubmission_is_idempotent() {
        let catalog = MemoryCatalog::new();
        let batch = vec![asset("a", "x", &[]), asset("b", "y", &[])];
        catalog.bulk_upsert(&batch).await.unwrap();
        catalog.bulk_upsert(&batch).await.unwrap();
        assert_eq!(catalog.list_assets().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_requires_all_tags() {
        let catalog = MemoryCatalog::new();
        catalog
            .bulk_upsert(&[
                asset("a", "x", &["sales", "daily"]),
                asset("b", "y", &["sales"]),
            ])
            .await
            .unwrap();

        let hits = catalog
            .search_by_tags(&["sales".to_string(), "daily".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a");
        assert!(catalog.get_asset("b").await.unwrap().is_some());
        assert!(catalog.get_asset("c").await.unwrap().is_none());
    }
}
