//! Crawler services.
//!
//! A crawler walks one backend's namespace under a root and turns every
//! entry matching the filter into an [`Asset`](crate::models::Asset):
//! - Hierarchical stores mounted locally (`FilesystemCrawler`)
//! - S3-compatible object storage (`ObjectStoreCrawler`)
//! - SQL metastores (`MetastoreCrawler`)
//!
//! Entry-level failures are collected in the returned [`Discovery`]; only
//! losing the backend aborts a walk.

mod filesystem;
mod metastore;
mod object_store;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{CrawlScope, DataSourceDefinition, Discovery};

pub use filesystem::FilesystemCrawler;
pub use metastore::{DatabaseInfo, MetastoreClient, MetastoreCrawler, table_asset};
pub use object_store::{ObjectStoreClient, ObjectStoreCrawler, select_keys};

/// Backend type names accepted by [`connect`].
pub const BACKEND_TYPES: &[&str] = &["filesystem", "s3", "metastore", "postgres"];

/// Discovery engine for one backend.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Backend type name used in logs and reports.
    fn backend(&self) -> &'static str;

    /// Walk `root` and parse every entry whose name matches `filter`.
    ///
    /// `shutdown` is checked between entries. When it fires the walk stops
    /// and the returned discovery is marked as interrupted.
    async fn walk_with_filter(
        &self,
        root: &str,
        filter: &str,
        shutdown: &CancellationToken,
    ) -> Result<Discovery>;

    /// Close the underlying connector.
    async fn close(&mut self);

    /// Walk a crawl scope.
    async fn walk(&self, scope: &CrawlScope, shutdown: &CancellationToken) -> Result<Discovery> {
        self.walk_with_filter(&scope.root, &scope.filter, shutdown)
            .await
    }
}

/// Validate a backend definition without connecting.
pub fn validate_definition(def: &DataSourceDefinition) -> Result<()> {
    use crate::connectors::Connector;

    match def.kind.as_str() {
        "filesystem" => crate::connectors::FilesystemConnector::new().validate_definition(def),
        #[cfg(feature = "s3")]
        "s3" => crate::connectors::S3Connector::new().validate_definition(def),
        #[cfg(feature = "postgres")]
        "metastore" | "postgres" => {
            crate::connectors::PgMetastoreConnector::new().validate_definition(def)
        }
        other => Err(unsupported_backend(other)),
    }
}

/// Build a crawler for `def` and open its connection.
pub async fn connect(def: &DataSourceDefinition) -> Result<Box<dyn Crawler>> {
    match def.kind.as_str() {
        "filesystem" => Ok(Box::new(FilesystemCrawler::connect(def).await?)),
        #[cfg(feature = "s3")]
        "s3" => Ok(Box::new(ObjectStoreCrawler::connect(def).await?)),
        #[cfg(feature = "postgres")]
        "metastore" | "postgres" => Ok(Box::new(MetastoreCrawler::connect_postgres(def).await?)),
        other => Err(unsupported_backend(other)),
    }
}

fn unsupported_backend(kind: &str) -> AppError {
    let feature = match kind {
        "s3" => Some("s3"),
        "metastore" | "postgres" => Some("postgres"),
        _ => None,
    };
    match feature {
        Some(feature) => AppError::config(format!(
            "backend '{}' requires the '{}' feature, which is not compiled in",
            kind, feature
        )),
        None => AppError::config(format!(
            "unknown backend type '{}' (expected one of {})",
            kind,
            BACKEND_TYPES.join(", ")
        )),
    }
}
