//! Connector for hierarchical stores mounted on the local filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::connectors::{Connector, kerberos};
use crate::error::{AppError, Result};
use crate::models::DataSourceDefinition;

pub const BACKEND: &str = "filesystem";

const REQUIRED: &[&str] = &["base_path"];

/// Holds the verified base directory while connected.
#[derive(Debug, Default)]
pub struct FilesystemConnector {
    base_path: Option<PathBuf>,
}

impl FilesystemConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base directory of the open connection.
    pub fn base_path(&self) -> Result<&Path> {
        self.base_path
            .as_deref()
            .ok_or_else(|| AppError::connection(BACKEND, "connection is not open"))
    }
}

#[async_trait]
impl Connector for FilesystemConnector {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn required_settings(&self) -> &'static [&'static str] {
        REQUIRED
    }

    async fn init_connection(&mut self, def: &DataSourceDefinition) -> Result<()> {
        self.validate_definition(def)?;
        kerberos::authenticate_if_configured(BACKEND, def).await?;

        let base = PathBuf::from(def.required("base_path")?);
        let meta = tokio::fs::metadata(&base)
            .await
            .map_err(|e| AppError::connection(BACKEND, format!("{}: {}", base.display(), e)))?;
        if !meta.is_dir() {
            return Err(AppError::connection(
                BACKEND,
                format!("{} is not a directory", base.display()),
            ));
        }

        log::debug!("Filesystem connector rooted at {}", base.display());
        self.base_path = Some(base);
        Ok(())
    }

    async fn close_connection(&mut self) {
        self.base_path = None;
    }
}
