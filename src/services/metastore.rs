// src/services/metastore.rs

//! Crawler for SQL metastores.
//!
//! The root is read as `db` or `db/table`:
//! - empty root: every accessible database, inaccessible ones are skipped
//! - `db`: every table of that database matching the filter
//!
//! Table filters are globs on table names. An empty filter, `*` or the
//! default manifest file name all match every table.
//! - `db/table`: exactly that table, the filter is ignored
//!
//! Each table's columns become one asset. A table whose schema cannot be
//! fetched is reported and skipped.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use glob::Pattern;
use tokio_util::sync::CancellationToken;

use crate::connectors::Connector;
use crate::error::{AppError, ErrorKind, Result};
use crate::models::{
    Asset, ColumnInfo, CrawlScope, DEFAULT_MANIFEST_FILENAME, Discovery, asset_type,
};
use crate::services::Crawler;

/// A database (schema) visible to the crawler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub name: String,
    /// Whether the crawler may read its tables
    pub accessible: bool,
}

/// Catalog queries a metastore must answer.
#[async_trait]
pub trait MetastoreClient: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>>;

    async fn list_tables(&self, database: &str) -> Result<Vec<String>>;

    /// Column schema of one table. Missing tables are an entry error.
    async fn describe_table(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>>;

    /// How many describes may run at once.
    fn max_concurrency(&self) -> usize {
        1
    }
}

/// Build the asset for one table.
pub fn table_asset(database: &str, table: &str, columns: Vec<ColumnInfo>) -> Asset {
    let mut asset = Asset::new(format!("{}.{}", database, table), asset_type::TABLE);
    let labels = &mut asset.metadata.labels;
    labels.insert("database".to_string(), database.to_string());
    labels.insert("table".to_string(), table.to_string());
    asset.metadata.schema = columns;
    asset
}

/// Glob for table names. Crawlers that keep the manifest default crawl
/// every table, since metastores hold no manifest files.
fn table_matcher(scope: &CrawlScope) -> Result<Pattern> {
    if scope.filter.trim() == DEFAULT_MANIFEST_FILENAME {
        return Ok(Pattern::new("*")?);
    }
    scope.matcher()
}

/// Metastore crawler generic over the client that talks to the backend.
pub struct MetastoreCrawler<C> {
    client: C,
}

impl<C> MetastoreCrawler<C>
where
    C: MetastoreClient + Connector,
{
    /// Wrap a client whose connection is already open.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Resolve the `(db, table)` pairs in scope.
    async fn tables_in_scope(
        &self,
        scope: &CrawlScope,
        discovery: &mut Discovery,
    ) -> Result<Vec<(String, String)>> {
        let levels = scope.levels();
        let matcher = table_matcher(scope)?;
        let filtered = |db: &str, tables: Vec<String>| -> Vec<(String, String)> {
            tables
                .into_iter()
                .filter(|t| matcher.matches(t))
                .map(|t| (db.to_string(), t))
                .collect()
        };

        match levels.as_slice() {
            [] => {
                let mut pairs = Vec::new();
                for db in self.client.list_databases().await? {
                    if !db.accessible {
                        log::warn!("Skipping database {}: permission denied", db.name);
                        continue;
                    }
                    match self.client.list_tables(&db.name).await {
                        Ok(tables) => pairs.extend(filtered(&db.name, tables)),
                        Err(err) if err.kind() == ErrorKind::Connection => return Err(err),
                        Err(err) => {
                            log::warn!("Skipping database {}: {}", db.name, err);
                            discovery.push_error(db.name.clone(), err.to_string());
                        }
                    }
                }
                Ok(pairs)
            }
            [db] => {
                let tables = self.client.list_tables(db).await?;
                Ok(filtered(db, tables))
            }
            [db, table] => Ok(vec![(db.clone(), table.clone())]),
            _ => Err(AppError::config(format!(
                "metastore root '{}' must be 'db' or 'db/table'",
                scope.root
            ))),
        }
    }
}

#[async_trait]
impl<C> Crawler for MetastoreCrawler<C>
where
    C: MetastoreClient + Connector,
{
    fn backend(&self) -> &'static str {
        self.client.backend()
    }

    async fn walk_with_filter(
        &self,
        root: &str,
        filter: &str,
        shutdown: &CancellationToken,
    ) -> Result<Discovery> {
        let scope = CrawlScope::new(root, filter);
        let mut discovery = Discovery::default();
        let pairs = self.tables_in_scope(&scope, &mut discovery).await?;
        log::debug!("Describing {} tables", pairs.len());

        let client = &self.client;
        let mut describes = stream::iter(pairs)
            .map(|(db, table)| async move {
                let result = client.describe_table(&db, &table).await;
                (db, table, result)
            })
            .buffered(client.max_concurrency().max(1));

        loop {
            if shutdown.is_cancelled() {
                discovery.interrupted = true;
                break;
            }
            let Some((db, table, result)) = describes.next().await else {
                break;
            };

            match result {
                Ok(columns) => discovery.assets.push(table_asset(&db, &table, columns)),
                Err(err) if err.kind() == ErrorKind::Connection => return Err(err),
                Err(err) => {
                    log::warn!("Skipping table {}.{}: {}", db, table, err);
                    discovery.push_error(format!("{}.{}", db, table), err.to_string());
                }
            }
        }

        Ok(discovery)
    }

    async fn close(&mut self) {
        self.client.close_connection().await;
    }
}

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use crate::connectors::PgMetastoreConnector;
    use crate::connectors::metastore::BACKEND;
    use crate::models::DataSourceDefinition;

    const LIST_SCHEMAS: &str = "SELECT nspname::text, has_schema_privilege(oid, 'USAGE') \
         FROM pg_catalog.pg_namespace \
         WHERE nspname NOT LIKE 'pg\\_%' AND nspname <> 'information_schema' \
         ORDER BY nspname";

    const LIST_TABLES: &str = "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = $1 AND table_type IN ('BASE TABLE', 'VIEW') \
         ORDER BY table_name";

    const DESCRIBE_TABLE: &str = "SELECT c.column_name::text, c.data_type::text, \
         COALESCE(pg_catalog.col_description(cls.oid, c.ordinal_position::int), '') \
         FROM information_schema.columns c \
         JOIN pg_catalog.pg_namespace ns ON ns.nspname = c.table_schema \
         JOIN pg_catalog.pg_class cls ON cls.relname = c.table_name AND cls.relnamespace = ns.oid \
         WHERE c.table_schema = $1 AND c.table_name = $2 \
         ORDER BY c.ordinal_position";

    /// Pool-level failures mean the metastore is gone; anything else is
    /// specific to the query.
    fn query_error(err: sqlx::Error) -> AppError {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => AppError::connection(BACKEND, err),
            other => AppError::Sql(other),
        }
    }

    #[async_trait]
    impl MetastoreClient for PgMetastoreConnector {
        async fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
            let rows: Vec<(String, bool)> = sqlx::query_as(LIST_SCHEMAS)
                .fetch_all(self.pool()?)
                .await
                .map_err(query_error)?;
            Ok(rows
                .into_iter()
                .map(|(name, accessible)| DatabaseInfo { name, accessible })
                .collect())
        }

        async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
            sqlx::query_scalar(LIST_TABLES)
                .bind(database)
                .fetch_all(self.pool()?)
                .await
                .map_err(query_error)
        }

        async fn describe_table(&self, database: &str, table: &str) -> Result<Vec<ColumnInfo>> {
            let rows: Vec<(String, String, String)> = sqlx::query_as(DESCRIBE_TABLE)
                .bind(database)
                .bind(table)
                .fetch_all(self.pool()?)
                .await
                .map_err(query_error)?;
            if rows.is_empty() {
                return Err(AppError::entry_parse(
                    format!("{}.{}", database, table),
                    "table not found or not readable",
                ));
            }
            Ok(rows
                .into_iter()
                .map(|(name, data_type, comment)| ColumnInfo {
                    name,
                    data_type,
                    comment,
                })
                .collect())
        }

        fn max_concurrency(&self) -> usize {
            self.max_connections()
        }
    }

    impl MetastoreCrawler<PgMetastoreConnector> {
        /// Open a Postgres metastore connection and wrap it.
        pub async fn connect_postgres(def: &DataSourceDefinition) -> Result<Self> {
            let mut connector = PgMetastoreConnector::new();
            connector.init_connection(def).await?;
            Ok(Self::new(connector))
        }
    }
}
