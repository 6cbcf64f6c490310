// src/lib.rs

//! Catalog Crawler Library
//!
//! Discovers data asset manifests across storage backends and keeps a
//! catalog in sync with what it finds.

pub mod config;
pub mod connectors;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
