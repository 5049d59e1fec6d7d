//! Dataset assembly for the minute-dataset pipeline.
//!
//! This crate handles:
//! - Running the per-security pipeline across the catalog in parallel
//! - Concatenating records in catalog order into a `StockDataset`
//! - Saving and loading the record cache (SQLite or JSON lines)
//! - Build summaries with skip accounting

pub mod assembler;
pub mod cache;
pub mod dataset;
pub mod summary;

pub use assembler::DatasetAssembler;
pub use cache::{store_for, JsonLinesStore, RecordStore, SqliteStore};
pub use dataset::StockDataset;
pub use summary::BuildSummary;
