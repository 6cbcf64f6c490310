// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

pub mod asset;
mod config;
pub mod manifest;
mod report;
mod schedule;
mod scope;

// Re-export all public types
pub use asset::{Asset, AssetMetadata, ColumnInfo, asset_type, next_discovery_stamp};
pub use config::{
    CATALOG_TYPES, CatalogConfig, Config, CrawlerDefinition, DataSourceDefinition,
    KerberosDetails, LoggingConfig,
};
pub use manifest::{DEFAULT_MANIFEST_FILENAME, parse_manifest, to_manifest};
pub use report::{
    CycleReport, CycleStatus, Discovery, EntryError, RejectReason, UpsertOutcome, UpsertResult,
};
pub use schedule::{Cadence, ScheduleDefinition, SchedulePeriod};
pub use scope::CrawlScope;
