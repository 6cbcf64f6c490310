//! Discovery manifests: the declarative YAML documents crawlers transcribe.
//!
//! A manifest carries every [`Asset`] field except the discovery stamp,
//! which only the reconciler sets. A `last-discovered-at` key found in a
//! manifest is ignored, as are any other unknown keys.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Asset, AssetMetadata};

/// File name crawlers look for when no filter is configured.
pub const DEFAULT_MANIFEST_FILENAME: &str = "MANIFEST.yaml";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ManifestDocument {
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    published_on: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,

    #[serde(default)]
    metadata: AssetMetadata,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    tags: BTreeSet<String>,
}

impl From<ManifestDocument> for Asset {
    fn from(doc: ManifestDocument) -> Self {
        Asset {
            name: doc.name,
            description: doc.description,
            published_on: doc.published_on,
            depends_on: doc.depends_on,
            metadata: doc.metadata,
            tags: doc.tags,
            last_discovered_at: None,
        }
    }
}

impl From<&Asset> for ManifestDocument {
    fn from(asset: &Asset) -> Self {
        ManifestDocument {
            name: asset.name.clone(),
            description: asset.description.clone(),
            published_on: asset.published_on,
            depends_on: asset.depends_on.clone(),
            metadata: asset.metadata.clone(),
            tags: asset.tags.clone(),
        }
    }
}

/// Parse a manifest document into an asset.
///
/// `location` is only used to label the error.
pub fn parse_manifest(location: &str, data: &[u8]) -> Result<Asset> {
    let doc: ManifestDocument =
        serde_yaml::from_slice(data).map_err(|e| AppError::entry_parse(location, e))?;

    if doc.name.trim().is_empty() {
        return Err(AppError::entry_parse(location, "manifest name is empty"));
    }

    Ok(doc.into())
}

/// Render the declarative part of an asset as a manifest document.
pub fn to_manifest(asset: &Asset) -> Result<String> {
    Ok(serde_yaml::to_string(&ManifestDocument::from(asset))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::ColumnInfo;
    use chrono::TimeZone;

    const FULL_MANIFEST: &str = r#"
name: churn-model
description: Predicts customer churn
published-on: 2023-11-02T08:30:00Z
depends-on:
  - crm.customers
  - crm.contracts
metadata:
  type: model
  labels:
    framework: xgboost
    version: 3
tags:
  - ml
  - crm
owner-team: ignored
"#;

    #[test]
    fn unquoted_labels_are_stored_in_canonical_form() {
        let yaml = "name: build-cache\nmetadata:\n  labels:\n    build: 0x1F\n    version: 1.10\n    release: \"1.10\"\n";
        let asset = parse_manifest("cache/MANIFEST.yaml", yaml.as_bytes()).unwrap();
        let labels = &asset.metadata.labels;
        assert_eq!(labels["build"], "31");
        assert_eq!(labels["version"], "1.1");
        assert_eq!(labels["release"], "1.10");
    }

    #[test]
    fn parses_full_manifest() {
        let asset = parse_manifest("models/MANIFEST.yaml", FULL_MANIFEST.as_bytes()).unwrap();
        assert_eq!(asset.name, "churn-model");
        assert_eq!(asset.description.as_deref(), Some("Predicts customer churn"));
        assert_eq!(
            asset.published_on,
            Some(Utc.with_ymd_and_hms(2023, 11, 2, 8, 30, 0).unwrap())
        );
        assert_eq!(asset.depends_on, vec!["crm.customers", "crm.contracts"]);
        assert_eq!(asset.metadata.type_name, "model");
        assert_eq!(asset.metadata.labels["version"], "3");
        assert!(asset.tags.contains("ml"));
        assert!(asset.last_discovered_at.is_none());
    }

    #[test]
    fn discovery_stamp_in_manifest_is_ignored() {
        let doc = "name: a\nlast-discovered-at: 2020-01-01T00:00:00Z\n";
        let asset = parse_manifest("a", doc.as_bytes()).unwrap();
        assert!(asset.last_discovered_at.is_none());
    }

    #[test]
    fn missing_name_is_entry_error() {
        let err = parse_manifest("x/MANIFEST.yaml", b"description: nameless\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryParse);
        assert!(err.to_string().contains("x/MANIFEST.yaml"));
    }

    #[test]
    fn blank_name_is_entry_error() {
        let err = parse_manifest("y", b"name: '   '\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryParse);
    }

    #[test]
    fn malformed_yaml_is_entry_error() {
        let err = parse_manifest("z", b"name: [unterminated\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EntryParse);
    }

    #[test]
    fn serialized_manifest_parses_back_without_stamp() {
        let mut asset = parse_manifest("m", FULL_MANIFEST.as_bytes()).unwrap();
        asset.metadata.schema.push(ColumnInfo {
            name: "score".to_string(),
            data_type: "double".to_string(),
            comment: String::new(),
        });
        asset.metadata.labels.insert("flag".to_string(), "true".to_string());
        let declared = asset.clone();
        asset.last_discovered_at = Some(Utc::now());

        let text = to_manifest(&asset).unwrap();
        assert!(!text.contains("last-discovered-at"));
        assert_eq!(parse_manifest("m", text.as_bytes()).unwrap(), declared);
    }
}
