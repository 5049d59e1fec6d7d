//! Data ingestion for the minute-dataset pipeline.
//!
//! This crate handles:
//! - Table loading from CSV and Parquet files (DuckDB)
//! - The security catalog and per-security path resolution
//! - Typed daily bars and intraday series from raw tables

pub mod catalog;
pub mod series;
pub mod table;

pub use catalog::{resolve_path, Catalog};
pub use series::{parse_daily, parse_intraday, IntradaySeries};
pub use table::{DuckDbLoader, RawTable, TableLoader};
