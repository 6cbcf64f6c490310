//! Connector for a Postgres-backed SQL metastore.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::connectors::{Connector, check_required, kerberos, parse_setting};
use crate::error::{AppError, Result};
use crate::models::DataSourceDefinition;

pub const BACKEND: &str = "metastore";

const REQUIRED: &[&str] = &["host", "port", "username", "password"];

const DEFAULT_MAX_CONNECTIONS: u32 = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection pool to the metastore database.
#[derive(Debug)]
pub struct PgMetastoreConnector {
    pool: Option<PgPool>,
    max_connections: u32,
}

impl Default for PgMetastoreConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl PgMetastoreConnector {
    pub fn new() -> Self {
        Self {
            pool: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Pool of the open connection.
    pub fn pool(&self) -> Result<&PgPool> {
        self.pool
            .as_ref()
            .ok_or_else(|| AppError::connection(BACKEND, "connection is not open"))
    }

    /// Upper bound on concurrent queries.
    pub fn max_connections(&self) -> usize {
        self.max_connections.max(1) as usize
    }
}

#[async_trait]
impl Connector for PgMetastoreConnector {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn required_settings(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn validate_definition(&self, def: &DataSourceDefinition) -> Result<()> {
        check_required(BACKEND, REQUIRED, def)?;
        parse_setting::<u16>(def, "port", 5432)?;
        let max = parse_setting::<u32>(def, "max_connections", DEFAULT_MAX_CONNECTIONS)?;
        if max == 0 {
            return Err(AppError::config("metastore max_connections must be > 0"));
        }
        Ok(())
    }

    async fn init_connection(&mut self, def: &DataSourceDefinition) -> Result<()> {
        self.validate_definition(def)?;
        kerberos::authenticate_if_configured(BACKEND, def).await?;

        let host = def.required("host")?;
        let port = parse_setting::<u16>(def, "port", 5432)?;
        let mut options = PgConnectOptions::new()
            .host(host)
            .port(port)
            .username(def.required("username")?)
            .password(def.required("password")?)
            .application_name("catalog-crawler");
        if let Some(database) = def.setting("database") {
            options = options.database(database);
        }

        self.max_connections =
            parse_setting::<u32>(def, "max_connections", DEFAULT_MAX_CONNECTIONS)?;
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| AppError::connection(BACKEND, format!("{}:{}: {}", host, port, e)))?;

        log::debug!("Metastore connector connected to {}:{}", host, port);
        self.pool = Some(pool);
        Ok(())
    }

    async fn close_connection(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }
}
