//! Application configuration structures.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::asset::deserialize_scalar_map;
use crate::models::{CrawlScope, ScheduleDefinition};

/// Catalog backends the storage factory knows about.
pub const CATALOG_TYPES: &[&str] = &["memory", "local", "http"];

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Where discovered assets are submitted
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// One entry per crawler, each on its own schedule
    #[serde(default, rename = "crawler")]
    pub crawlers: Vec<CrawlerDefinition>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Find a crawler definition by name.
    pub fn crawler(&self, name: &str) -> Option<&CrawlerDefinition> {
        self.crawlers.iter().find(|c| c.name == name)
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Backend settings are checked separately by each backend's connector.
    pub fn validate(&self) -> Result<()> {
        self.catalog.validate()?;

        let mut seen = HashSet::new();
        for crawler in &self.crawlers {
            if crawler.name.trim().is_empty() {
                return Err(AppError::config("crawler.name is empty"));
            }
            if !seen.insert(crawler.name.as_str()) {
                return Err(AppError::config(format!(
                    "crawler name '{}' is defined more than once",
                    crawler.name
                )));
            }
            if crawler.backend.kind.trim().is_empty() {
                return Err(AppError::config(format!(
                    "crawler '{}' has no backend.type",
                    crawler.name
                )));
            }
            crawler.schedule.cadence().map_err(|e| {
                AppError::config(format!("crawler '{}': {}", crawler.name, e))
            })?;
            crawler.scope().matcher().map_err(|e| {
                AppError::config(format!("crawler '{}': {}", crawler.name, e))
            })?;
            if let Some(kerberos) = &crawler.backend.kerberos {
                kerberos.validate()?;
            }
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// Catalog connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// One of [`CATALOG_TYPES`]
    #[serde(rename = "type", default = "defaults::catalog_type")]
    pub kind: String,

    /// JSON file for the `local` catalog
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Base URL for the `http` catalog
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Submission timeout in seconds
    #[serde(default = "defaults::submit_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            kind: defaults::catalog_type(),
            path: None,
            endpoint: None,
            timeout_secs: defaults::submit_timeout(),
        }
    }
}

impl CatalogConfig {
    fn validate(&self) -> Result<()> {
        if !CATALOG_TYPES.contains(&self.kind.as_str()) {
            return Err(AppError::config(format!(
                "catalog.type '{}' is not one of {}",
                self.kind,
                CATALOG_TYPES.join(", ")
            )));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::config("catalog.timeout_secs must be > 0"));
        }
        match self.kind.as_str() {
            "local" if self.path.is_none() => {
                Err(AppError::config("catalog.path is required for a local catalog"))
            }
            "http" => {
                let endpoint = self.endpoint.as_deref().ok_or_else(|| {
                    AppError::config("catalog.endpoint is required for an http catalog")
                })?;
                url::Url::parse(endpoint)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// A single crawler: what to walk, where, and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerDefinition {
    pub name: String,

    /// Backend-specific root (path, object prefix or `db[/table]`)
    #[serde(default)]
    pub root: String,

    /// Glob matched against entry names
    #[serde(default = "defaults::filter")]
    pub filter: String,

    #[serde(default)]
    pub schedule: ScheduleDefinition,

    pub backend: DataSourceDefinition,
}

impl CrawlerDefinition {
    pub fn scope(&self) -> CrawlScope {
        CrawlScope::new(&self.root, &self.filter)
    }
}

/// Connection details for a backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DataSourceDefinition {
    /// Backend type, e.g. `filesystem`, `s3`, `metastore`
    #[serde(rename = "type")]
    pub kind: String,

    /// Backend-specific key/value settings
    #[serde(default, deserialize_with = "deserialize_scalar_map")]
    pub settings: BTreeMap<String, String>,

    /// Optional Kerberos authentication performed before connecting
    #[serde(default)]
    pub kerberos: Option<KerberosDetails>,
}

impl DataSourceDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Builder-style setting insertion.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Fetch a setting that validation already guaranteed to exist.
    pub fn required(&self, key: &str) -> Result<&str> {
        self.setting(key)
            .ok_or_else(|| AppError::missing_settings(&self.kind, vec![key.to_string()]))
    }
}

/// Kerberos connection details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KerberosDetails {
    /// Path to `krb5.conf`
    #[serde(default)]
    pub krb5conf: Option<PathBuf>,

    pub principal: String,

    #[serde(default)]
    pub realm: Option<String>,

    /// Keytab used for non-interactive login
    #[serde(default)]
    pub keytab: Option<PathBuf>,

    /// Password fed to `kinit` when no keytab is configured
    #[serde(default)]
    pub password: Option<String>,
}

impl KerberosDetails {
    /// Fully-qualified principal (`user@REALM`).
    pub fn qualified_principal(&self) -> String {
        match &self.realm {
            Some(realm) if !self.principal.contains('@') => {
                format!("{}@{}", self.principal, realm)
            }
            _ => self.principal.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.principal.trim().is_empty() {
            return Err(AppError::config("kerberos.principal is empty"));
        }
        if self.keytab.is_none() && self.password.is_none() {
            return Err(AppError::config(
                "kerberos requires either a keytab or a password",
            ));
        }
        Ok(())
    }
}

mod defaults {
    use crate::models::manifest::DEFAULT_MANIFEST_FILENAME;

    pub fn log_level() -> String {
        "info".into()
    }
    pub fn catalog_type() -> String {
        "memory".into()
    }
    pub fn submit_timeout() -> u64 {
        5
    }
    pub fn filter() -> String {
        DEFAULT_MANIFEST_FILENAME.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SchedulePeriod;

    const SAMPLE: &str = r#"
[logging]
level = "debug"

[catalog]
type = "http"
endpoint = "http://catalog.internal:8085"

[[crawler]]
name = "lake"
root = "landing/"

[crawler.schedule]
period = "hours"
value = 6

[crawler.backend]
type = "filesystem"

[crawler.backend.settings]
base_path = "/mnt/lake"

[[crawler]]
name = "warehouse"
root = "salesdb"
filter = "*"

[crawler.schedule]
period = "monday"

[crawler.backend]
type = "metastore"

[crawler.backend.settings]
host = "pg.internal"
port = 5432
username = "crawler"
password = "secret"

[crawler.backend.kerberos]
principal = "crawler"
realm = "EXAMPLE.COM"
keytab = "/etc/crawler.keytab"
"#;

    #[test]
    fn parses_sample_config() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.catalog.kind, "http");
        assert_eq!(config.catalog.timeout_secs, 5);
        assert_eq!(config.crawlers.len(), 2);

        let lake = config.crawler("lake").unwrap();
        assert_eq!(lake.filter, "MANIFEST.yaml");
        assert_eq!(lake.schedule.period, SchedulePeriod::Hours);
        assert_eq!(lake.backend.setting("base_path"), Some("/mnt/lake"));

        let warehouse = config.crawler("warehouse").unwrap();
        assert_eq!(warehouse.backend.setting("port"), Some("5432"));
        assert_eq!(
            warehouse.backend.kerberos.as_ref().unwrap().qualified_principal(),
            "crawler@EXAMPLE.COM"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_crawler_names() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.crawlers[1].name = "lake".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_catalog_type() {
        let mut config = Config::default();
        config.catalog.kind = "cassandra".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn http_catalog_needs_endpoint() {
        let mut config = Config::default();
        config.catalog.kind = "http".to_string();
        assert!(config.validate().is_err());
        config.catalog.endpoint = Some("not a url".to_string());
        assert!(config.validate().is_err());
        config.catalog.endpoint = Some("https://catalog.example.com/".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_schedule_value() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.crawlers[0].schedule.value = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn kerberos_needs_credentials() {
        let details = KerberosDetails {
            krb5conf: None,
            principal: "svc@EXAMPLE.COM".to_string(),
            realm: Some("OTHER.COM".to_string()),
            keytab: None,
            password: None,
        };
        assert!(details.validate().is_err());
        assert_eq!(details.qualified_principal(), "svc@EXAMPLE.COM");
    }
}
