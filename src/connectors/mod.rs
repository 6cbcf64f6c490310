//! Backend connectors.
//!
//! A connector owns a backend's validated settings and its live session.
//! Crawlers are built on top of a connector and never talk to the backend
//! through anything else.

pub mod filesystem;
pub mod kerberos;
#[cfg(feature = "postgres")]
pub mod metastore;
#[cfg(feature = "s3")]
pub mod s3;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::DataSourceDefinition;

pub use filesystem::FilesystemConnector;
#[cfg(feature = "postgres")]
pub use metastore::PgMetastoreConnector;
#[cfg(feature = "s3")]
pub use s3::S3Connector;

/// Low-level client for one backend.
///
/// One instance belongs to exactly one crawler and is not shared.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Backend type name used in messages.
    fn backend(&self) -> &'static str;

    /// Setting keys that must be present in the definition.
    fn required_settings(&self) -> &'static [&'static str];

    /// Check that every required key is present.
    ///
    /// The error lists all missing keys, not just the first one.
    fn validate_definition(&self, def: &DataSourceDefinition) -> Result<()> {
        check_required(self.backend(), self.required_settings(), def)
    }

    /// Establish the session, authenticating first when configured.
    async fn init_connection(&mut self, def: &DataSourceDefinition) -> Result<()>;

    /// Release the session. Safe to call more than once or before init.
    async fn close_connection(&mut self);
}

/// Collect every required key absent from `def`, in declaration order.
pub fn missing_settings(required: &[&str], def: &DataSourceDefinition) -> Vec<String> {
    required
        .iter()
        .filter(|key| def.setting(key).is_none_or(|v| v.trim().is_empty()))
        .map(|key| key.to_string())
        .collect()
}

/// Fail with a single error naming every missing key.
pub fn check_required(backend: &str, required: &[&str], def: &DataSourceDefinition) -> Result<()> {
    let missing = missing_settings(required, def);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::missing_settings(backend, missing))
    }
}

/// Parse an optional setting, falling back to `default` when absent.
pub fn parse_setting<T: std::str::FromStr>(
    def: &DataSourceDefinition,
    key: &str,
    default: T,
) -> Result<T> {
    match def.setting(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            AppError::config(format!(
                "{} setting '{}' has invalid value '{}'",
                def.kind, key, raw
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const REQUIRED: &[&str] = &["host", "port", "username", "password"];

    #[test]
    fn test_missing_settings_names_all_keys() {
        let def = DataSourceDefinition::new("metastore")
            .with_setting("port", "5432")
            .with_setting("username", "crawler");

        let err = check_required("metastore", REQUIRED, &def).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        match err {
            AppError::MissingSettings { backend, missing } => {
                assert_eq!(backend, "metastore");
                assert_eq!(missing, vec!["host", "password"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let def = DataSourceDefinition::new("metastore")
            .with_setting("host", "  ")
            .with_setting("port", "5432")
            .with_setting("username", "crawler")
            .with_setting("password", "pw");
        let missing = missing_settings(REQUIRED, &def);
        assert_eq!(missing, vec!["host"]);
    }

    #[test]
    fn test_complete_definition_passes() {
        let def = DataSourceDefinition::new("metastore")
            .with_setting("host", "db")
            .with_setting("port", "5432")
            .with_setting("username", "crawler")
            .with_setting("password", "pw");
        assert!(check_required("metastore", REQUIRED, &def).is_ok());
    }

    #[test]
    fn test_parse_setting() {
        let def = DataSourceDefinition::new("s3").with_setting("use_ssl", "maybe");
        assert!(parse_setting::<bool>(&def, "use_ssl", true).is_err());
        assert_eq!(parse_setting::<u32>(&def, "max_connections", 4).unwrap(), 4);
    }
}
