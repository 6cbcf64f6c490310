// src/config.rs

//! Configuration loading utilities.
//!
//! Reads the TOML file, layers environment overrides on top and validates
//! the result before anything connects.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::Config;

/// Where the CLI looks for its configuration by default.
pub const DEFAULT_CONFIG_PATH: &str = "config/crawler.toml";

pub const ENV_CATALOG_TYPE: &str = "CATALOG_TYPE";
pub const ENV_CATALOG_ENDPOINT: &str = "CATALOG_ENDPOINT";
pub const ENV_CATALOG_TIMEOUT: &str = "CATALOG_TIMEOUT_SECS";

/// Load configuration from a TOML file, apply environment overrides and
/// validate.
///
/// A missing file falls back to defaults; a file that exists but does not
/// parse is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        log::warn!("Config file {:?} not found. Using defaults.", path);
        Config::default()
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Apply catalog overrides using `lookup` to read variables.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(kind) = lookup(ENV_CATALOG_TYPE) {
        log::debug!("{} overrides catalog.type", ENV_CATALOG_TYPE);
        config.catalog.kind = kind;
    }
    if let Some(endpoint) = lookup(ENV_CATALOG_ENDPOINT) {
        log::debug!("{} overrides catalog.endpoint", ENV_CATALOG_ENDPOINT);
        config.catalog.endpoint = Some(endpoint);
    }
    if let Some(timeout) = lookup(ENV_CATALOG_TIMEOUT) {
        config.catalog.timeout_secs = timeout.trim().parse().map_err(|_| {
            AppError::config(format!(
                "{} must be a whole number of seconds, got '{}'",
                ENV_CATALOG_TIMEOUT, timeout
            ))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            lookup_from(&[
                (ENV_CATALOG_TYPE, "http"),
                (ENV_CATALOG_ENDPOINT, "http://catalog:8085"),
                (ENV_CATALOG_TIMEOUT, "12"),
            ]),
        )
        .unwrap();
        assert_eq!(config.catalog.kind, "http");
        assert_eq!(config.catalog.endpoint.as_deref(), Some("http://catalog:8085"));
        assert_eq!(config.catalog.timeout_secs, 12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_timeout_override() {
        let mut config = Config::default();
        let err = apply_overrides(&mut config, lookup_from(&[(ENV_CATALOG_TIMEOUT, "soon")]))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.toml"));
        assert!(config.is_err());
        let config = Config::load_or_default(dir.path().join("absent.toml"));
        assert!(config.crawlers.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawler.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[[crawler]]\nname = \"docs\"\n[crawler.backend]\ntype = \"filesystem\"\n[crawler.backend.settings]\nbase_path = \"/srv\""
        )
        .unwrap();
        drop(file);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.crawlers[0].name, "docs");
        assert_eq!(config.crawlers[0].schedule.value, 1);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawler.toml");
        std::fs::write(&path, "[[crawler]\nname=").unwrap();
        let err = load_config(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
