//! Asset data structure.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Well-known values for `metadata.type`.
pub mod asset_type {
    pub const DATABASE: &str = "database";
    pub const DATASET: &str = "dataset";
    pub const FEATURESET: &str = "featureset";
    pub const MODEL: &str = "model";
    pub const NOTEBOOK: &str = "notebook";
    pub const PIPELINE: &str = "pipeline";
    pub const REPORT: &str = "report";
    pub const SERVICE: &str = "service";
    pub const STREAM: &str = "stream";
    pub const TABLE: &str = "table";
    pub const USER: &str = "user";
    pub const WORKFLOW: &str = "workflow";
}

/// A catalogued data asset. `name` is its identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub struct Asset {
    /// Unique name, used as the upsert key
    pub name: String,

    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Author-declared publication time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_on: Option<DateTime<Utc>>,

    /// Names of assets this one depends on (advisory, never validated)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Classification, labels and optional column schema
    #[serde(default)]
    pub metadata: AssetMetadata,

    /// Search tags
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    /// Set by the reconciler when the asset is ingested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_discovered_at: Option<DateTime<Utc>>,
}

/// Classification and attributes of an asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AssetMetadata {
    /// Free-form type, see [`asset_type`]
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub type_name: String,

    /// Arbitrary key/value attributes
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "deserialize_scalar_map"
    )]
    pub labels: BTreeMap<String, String>,

    /// Column schema for tabular assets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<ColumnInfo>,
}

/// A single column of a table schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,

    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Asset {
    /// Create an asset with only a name and a type.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: AssetMetadata {
                type_name: type_name.into(),
                ..AssetMetadata::default()
            },
            ..Self::default()
        }
    }

    /// Whether the identity key is usable.
    pub fn has_valid_name(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// SHA-256 over the declarative content (everything but the discovery stamp).
    pub fn fingerprint(&self) -> String {
        let declared = Asset {
            last_discovered_at: None,
            ..self.clone()
        };
        // Field order is fixed by the struct and maps are ordered, so the
        // JSON encoding is canonical.
        let bytes = serde_json::to_vec(&declared).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Whether all of `tags` are present on this asset.
    pub fn has_all_tags(&self, tags: &[String]) -> bool {
        tags.iter().all(|t| self.tags.contains(t))
    }
}

/// Next discovery stamp for an asset, strictly after any previous one.
pub fn next_discovery_stamp(
    previous: Option<DateTime<Utc>>,
    proposed: DateTime<Utc>,
) -> DateTime<Utc> {
    match previous {
        Some(prev) if proposed <= prev => prev + Duration::milliseconds(1),
        _ => proposed,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    fn into_string(self) -> String {
        match self {
            ScalarValue::Bool(b) => b.to_string(),
            ScalarValue::Int(i) => i.to_string(),
            ScalarValue::Float(f) => f.to_string(),
            ScalarValue::Text(s) => s,
        }
    }
}

/// Accept scalar map values of any kind and store them as strings.
///
/// Unquoted values are read as YAML/JSON scalars first, so their canonical
/// form is stored rather than the source text: `0x1F` becomes `"31"` and
/// `1.10` becomes `"1.1"`. Quote a value to keep it verbatim.
pub(crate) fn deserialize_scalar_map<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, ScalarValue>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.into_string()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_asset() -> Asset {
        let mut asset = Asset::new("sales.orders", asset_type::TABLE);
        asset.description = Some("Daily orders".to_string());
        asset.tags.insert("sales".to_string());
        asset
    }

    #[test]
    fn fingerprint_ignores_discovery_stamp() {
        let a = sample_asset();
        let mut b = a.clone();
        b.last_discovered_at = Some(Utc::now());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = sample_asset();
        let mut b = a.clone();
        b.description = Some("Hourly orders".to_string());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn stamp_strictly_increases() {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(next_discovery_stamp(None, t), t);
        assert_eq!(
            next_discovery_stamp(Some(t), t),
            t + Duration::milliseconds(1)
        );
        let later = t + Duration::seconds(10);
        assert_eq!(next_discovery_stamp(Some(t), later), later);
    }

    #[test]
    fn labels_accept_scalars() {
        let json = r#"{"name":"x","metadata":{"type":"model","labels":{"version":2,"gpu":true,"owner":"ml"}}}"#;
        let asset: Asset = serde_json::from_str(json).unwrap();
        assert_eq!(asset.metadata.labels["version"], "2");
        assert_eq!(asset.metadata.labels["gpu"], "true");
        assert_eq!(asset.metadata.labels["owner"], "ml");
    }

    #[test]
    fn blank_name_is_invalid() {
        assert!(!Asset::new("  ", "table").has_valid_name());
        assert!(sample_asset().has_valid_name());
    }

    #[test]
    fn tag_matching_requires_all() {
        let mut asset = sample_asset();
        asset.tags.insert("daily".to_string());
        assert!(asset.has_all_tags(&["sales".to_string(), "daily".to_string()]));
        assert!(!asset.has_all_tags(&["sales".to_string(), "hr".to_string()]));
    }
}
