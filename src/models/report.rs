//! Results produced by crawls, catalog submissions and reconcile cycles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::Asset;

/// An entry that could not be turned into an asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryError {
    /// Path, object key or `db.table` of the failing entry
    pub location: String,
    pub message: String,
}

impl EntryError {
    pub fn new(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            message: message.into(),
        }
    }
}

impl From<AppError> for EntryError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::EntryParse { location, message } => Self { location, message },
            other => Self::new("", other.to_string()),
        }
    }
}

/// Outcome of walking a root: every asset found plus per-entry failures.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub assets: Vec<Asset>,
    pub errors: Vec<EntryError>,
    /// Walk stopped early on shutdown; the batch is incomplete
    pub interrupted: bool,
}

impl Discovery {
    pub fn push_error(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.errors.push(EntryError::new(location, message));
    }
}

/// Why the catalog refused a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RejectReason {
    InvalidName,
    MissingDiscoveryTimestamp,
    Backend(String),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName => write!(f, "asset name is empty"),
            Self::MissingDiscoveryTimestamp => write!(f, "last-discovered-at is not set"),
            Self::Backend(msg) => write!(f, "{}", msg),
        }
    }
}

/// What happened to one record of a bulk upsert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No asset with this name existed
    Created,
    /// Existing asset whose declared content changed
    Replaced,
    /// Existing asset with identical content; only the stamp moved
    Refreshed,
    Rejected { reason: RejectReason },
}

impl UpsertOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Per-record result of a bulk upsert, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpsertResult {
    pub name: String,
    #[serde(flatten)]
    pub outcome: UpsertOutcome,
}

impl UpsertResult {
    pub fn new(name: impl Into<String>, outcome: UpsertOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
        }
    }
}

/// How a reconcile cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    /// The walk itself failed; nothing was submitted
    CrawlFailed(String),
    /// The catalog failed or timed out; the batch is dropped
    SubmissionFailed(String),
    /// Shutdown arrived mid-walk; nothing was submitted
    Interrupted,
}

/// Summary of one reconcile cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub crawler: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: CycleStatus,
    /// Assets returned by the walk
    pub discovered: usize,
    /// Records the catalog accepted
    pub ingested: usize,
    /// Records the catalog refused
    pub rejected: usize,
    pub entry_errors: Vec<EntryError>,
    pub rejections: Vec<UpsertResult>,
}

impl CycleReport {
    pub fn new(crawler: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            crawler: crawler.into(),
            started_at,
            finished_at: started_at,
            status: CycleStatus::Completed,
            discovered: 0,
            ingested: 0,
            rejected: 0,
            entry_errors: Vec::new(),
            rejections: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CycleStatus::Completed
    }

    /// Count accepted and rejected records from a bulk upsert response.
    pub fn record_results(&mut self, results: Vec<UpsertResult>) {
        for result in results {
            if result.outcome.is_accepted() {
                self.ingested += 1;
            } else {
                self.rejected += 1;
                self.rejections.push(result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_error_keeps_location() {
        let err: EntryError = AppError::entry_parse("a/MANIFEST.yaml", "bad indent").into();
        assert_eq!(err.location, "a/MANIFEST.yaml");
        assert_eq!(err.message, "bad indent");
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = CycleReport::new("lake", Utc::now());
        report.record_results(vec![
            UpsertResult::new("a", UpsertOutcome::Created),
            UpsertResult::new("b", UpsertOutcome::Refreshed),
            UpsertResult::new(
                "",
                UpsertOutcome::Rejected {
                    reason: RejectReason::InvalidName,
                },
            ),
        ]);
        assert_eq!(report.ingested, 2);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.rejections[0].name, "");
        assert!(report.is_success());
    }

    #[test]
    fn upsert_result_wire_format() {
        let json = serde_json::to_value(UpsertResult::new(
            "x",
            UpsertOutcome::Rejected {
                reason: RejectReason::Backend("duplicate key".to_string()),
            },
        ))
        .unwrap();
        assert_eq!(json["name"], "x");
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["reason"]["reason"], "backend");
        assert_eq!(json["reason"]["detail"], "duplicate key");

        let back: UpsertResult = serde_json::from_value(json).unwrap();
        assert!(!back.outcome.is_accepted());
    }
}
