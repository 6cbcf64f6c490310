// src/storage/http.rs

//! Remote catalog service client.
//!
//! Routes, relative to the configured endpoint:
//! - `PUT assets/` with a JSON array of assets, answered by one result per record
//! - `GET asset/{name}`, `404` when unknown
//! - `GET asset/` for the full listing

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{Asset, UpsertResult};
use crate::storage::AssetCatalog;
use crate::utils::{http, join_endpoint};

/// Catalog reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: Client,
    assets_url: Url,
    asset_url: Url,
}

impl HttpCatalog {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(timeout)?,
            assets_url: join_endpoint(endpoint, "assets/")?,
            asset_url: join_endpoint(endpoint, "asset/")?,
        })
    }

    fn asset_by_name(&self, name: &str) -> Result<Url> {
        let mut url = self.asset_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::config("catalog endpoint cannot be a base URL"))?
            .pop_if_empty()
            .push(name);
        Ok(url)
    }
}

#[async_trait]
impl AssetCatalog for HttpCatalog {
    async fn bulk_upsert(&self, assets: &[Asset]) -> Result<Vec<UpsertResult>> {
        let response = self
            .client
            .put(self.assets_url.clone())
            .json(assets)
            .send()
            .await
            .map_err(|e| AppError::submission(format!("PUT {}: {}", self.assets_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::submission(format!(
                "PUT {} returned {}: {}",
                self.assets_url,
                status,
                body.trim()
            )));
        }

        let results: Vec<UpsertResult> = response
            .json()
            .await
            .map_err(|e| AppError::submission(format!("invalid upsert response: {}", e)))?;
        if results.len() != assets.len() {
            return Err(AppError::submission(format!(
                "catalog answered {} results for {} assets",
                results.len(),
                assets.len()
            )));
        }
        Ok(results)
    }

    async fn get_asset(&self, name: &str) -> Result<Option<Asset>> {
        let response = self.client.get(self.asset_by_name(name)?).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(response.error_for_status()?.json().await?))
    }

    async fn list_assets(&self) -> Result<Vec<Asset>> {
        let response = self.client.get(self.asset_url.clone()).send().await?;
        let mut assets: Vec<Asset> = response.error_for_status()?.json().await?;
        assets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(assets)
    }
}
