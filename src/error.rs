// src/error.rs

//! Unified error handling for the crawler application.

use std::fmt;

use thiserror::Error;

/// Result type alias for crawler operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend settings are missing one or more required keys
    #[error("Missing required settings for {backend} backend: {}", missing.join(", "))]
    MissingSettings {
        backend: String,
        missing: Vec<String>,
    },

    /// Backend unreachable or authentication failed
    #[error("Connection error ({backend}): {message}")]
    Connection { backend: String, message: String },

    /// A single manifest or table schema could not be read
    #[error("Failed to parse entry {location}: {message}")]
    EntryParse { location: String, message: String },

    /// The catalog rejected or never acknowledged a batch
    #[error("Catalog submission error: {0}")]
    Submission(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML manifest serialization/deserialization failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Glob filter could not be compiled
    #[error("Invalid filter pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// SQL metastore query failed
    #[cfg(feature = "postgres")]
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

/// Coarse classification used by the reconciler and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    EntryParse,
    Submission,
    Other,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a missing-settings error listing every absent key.
    pub fn missing_settings(backend: impl Into<String>, missing: Vec<String>) -> Self {
        Self::MissingSettings {
            backend: backend.into(),
            missing,
        }
    }

    /// Create a connection error for a backend.
    pub fn connection(backend: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Connection {
            backend: backend.into(),
            message: message.to_string(),
        }
    }

    /// Create an entry-level parse error.
    pub fn entry_parse(location: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::EntryParse {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Create a catalog submission error.
    pub fn submission(message: impl fmt::Display) -> Self {
        Self::Submission(message.to_string())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::MissingSettings { .. } | Self::Pattern(_) | Self::Toml(_) => {
                ErrorKind::Config
            }
            Self::Connection { .. } => ErrorKind::Connection,
            Self::EntryParse { .. } | Self::Yaml(_) => ErrorKind::EntryParse,
            Self::Submission(_) => ErrorKind::Submission,
            _ => ErrorKind::Other,
        }
    }
}
