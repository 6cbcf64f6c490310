//! Local filesystem catalog.
//!
//! Keeps the whole catalog as one JSON document. Every batch is applied to a
//! copy of the index, written to a temp file and renamed into place; the
//! in-memory index only moves forward once the rename succeeded, so a failed
//! write commits nothing. The commit runs as its own task: a caller that
//! stops waiting cannot leave the file ahead of the index.
//!
//! ## File Layout
//!
//! ```text
//! {
//!   "updated_at": "2024-05-01T12:00:00Z",
//!   "count": 2,
//!   "assets": [ { "name": "...", ... }, ... ]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{Asset, UpsertResult};
use crate::storage::{AssetCatalog, CatalogIndex};

/// On-disk catalog document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub updated_at: DateTime<Utc>,
    pub count: usize,
    pub assets: Vec<Asset>,
}

impl CatalogDocument {
    fn from_index(index: &CatalogIndex) -> Self {
        let assets: Vec<Asset> = index.values().cloned().collect();
        Self {
            updated_at: Utc::now(),
            count: assets.len(),
            assets,
        }
    }
}

/// Catalog persisted to a single JSON file.
pub struct LocalCatalog {
    path: PathBuf,
    index: Arc<Mutex<CatalogIndex>>,
}

impl LocalCatalog {
    /// Open the catalog at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let index = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let doc: CatalogDocument = serde_json::from_slice(&bytes)?;
                log::info!("Loaded {} assets from {}", doc.assets.len(), path.display());
                CatalogIndex::from_assets(doc.assets)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CatalogIndex::default(),
            Err(e) => return Err(AppError::Io(e)),
        };
        Ok(Self {
            path,
            index: Arc::new(Mutex::new(index)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write bytes atomically (write to temp, then rename).
async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Apply a batch, persist it and move the index forward, in that order.
async fn commit(
    index: Arc<Mutex<CatalogIndex>>,
    path: PathBuf,
    assets: Vec<Asset>,
) -> Result<Vec<UpsertResult>> {
    let mut index = index.lock_owned().await;
    let mut next = (*index).clone();
    let results = next.apply_all(&assets);

    let bytes = serde_json::to_vec_pretty(&CatalogDocument::from_index(&next))?;
    write_bytes(&path, &bytes)
        .await
        .map_err(|e| AppError::submission(format!("writing {}: {}", path.display(), e)))?;

    *index = next;
    Ok(results)
}

#[async_trait]
impl AssetCatalog for LocalCatalog {
    async fn bulk_upsert(&self, assets: &[Asset]) -> Result<Vec<UpsertResult>> {
        let task = commit(Arc::clone(&self.index), self.path.clone(), assets.to_vec());
        tokio::spawn(task)
            .await
            .map_err(|e| AppError::submission(format!("catalog write task failed: {}", e)))?
    }

    async fn get_asset(&self, name: &str) -> Result<Option<Asset>> {
        Ok(self.index.lock().await.get(name).cloned())
    }

    async fn list_assets(&self) -> Result<Vec<Asset>> {
        Ok(self.index.lock().await.values().cloned().collect())
    }
}
