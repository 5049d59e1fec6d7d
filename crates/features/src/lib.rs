//! Label and feature computation for the minute-dataset pipeline.
//!
//! This crate handles:
//! - Forward return labels on the daily series
//! - Rolling-window min-max normalization of intraday bars
//! - Per-date sample construction with typed skip reasons

pub mod labels;
pub mod normalizer;
pub mod sample;

pub use labels::{DailyProcessor, DailyRecord, DailySeries};
pub use normalizer::{
    Extent, NormalizedBar, NormalizedDay, NormalizedSeries, RollingNormalizer, WindowStats,
};
pub use sample::{SampleBuilder, SecuritySamples};
