//! Crawl scope: where to look and what to pick up.

use glob::Pattern;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::manifest::DEFAULT_MANIFEST_FILENAME;
use crate::utils::split_and_trim;

/// A `(root, filter)` pair whose meaning depends on the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CrawlScope {
    /// `/`-delimited root: a path, an object prefix or `db[/table]`
    #[serde(default)]
    pub root: String,

    /// Shell-glob name filter
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    DEFAULT_MANIFEST_FILENAME.to_string()
}

impl Default for CrawlScope {
    fn default() -> Self {
        Self {
            root: String::new(),
            filter: default_filter(),
        }
    }
}

impl CrawlScope {
    pub fn new(root: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            filter: filter.into(),
        }
    }

    /// Non-empty path levels of the root.
    pub fn levels(&self) -> Vec<String> {
        split_and_trim(&self.root, '/')
    }

    /// Compile the filter. An empty filter matches everything.
    pub fn matcher(&self) -> Result<Pattern> {
        let filter = self.filter.trim();
        Ok(Pattern::new(if filter.is_empty() { "*" } else { filter })?)
    }
}
