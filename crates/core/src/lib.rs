//! Core types and configuration for the minute-dataset pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Daily and minute bar types, sample records and the feature matrix
//! - Configuration structures
//! - Common error types and per-date skip reasons

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    CacheConfig, CacheFormat, CatalogConfig, DailyColumns, DailySourceConfig, DatasetConfig,
    IntradayColumns, IntradaySourceConfig, LoadStrategy, SessionConfig,
};
pub use error::{Error, Result};
pub use types::*;
