//! Core data types for the minute-dataset pipeline.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque security identifier (e.g. "600000").
pub type SecurityCode = String;

/// Number of normalized intraday fields per row.
pub const FEATURE_COUNT: usize = 6;

/// Column order of every sample matrix.
pub const FEATURE_COLUMNS: [&str; FEATURE_COUNT] = [
    "open_N",
    "high_N",
    "low_N",
    "close_N",
    "volume_N",
    "turnover_N",
];

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// Security code, unique within a catalog.
    pub code: SecurityCode,
    /// Display name (may be empty).
    pub name: String,
}

impl Security {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// One row of a raw daily table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trading date.
    pub date: NaiveDate,
    /// Open price (NaN when the source has no open column).
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
    /// Traded amount.
    pub turnover: f64,
}

/// One minute-level intraday observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinuteBar {
    /// Bar timestamp (exchange local time).
    pub ts: NaiveDateTime,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume.
    pub volume: f64,
    /// Traded amount.
    pub turnover: f64,
}

impl MinuteBar {
    /// Calendar date of the bar.
    #[inline]
    pub fn date(&self) -> NaiveDate {
        self.ts.date()
    }

    /// The four price fields in open/high/low/close order.
    #[inline]
    pub fn prices(&self) -> [f64; 4] {
        [self.open, self.high, self.low, self.close]
    }
}

/// Forward return labels for one trading date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayLabel {
    /// Next-day close-to-close return.
    pub return_1: f64,
    /// Two-day close-to-close return.
    pub return_2: f64,
}

/// Row-major `f32` matrix holding one day of normalized bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    /// Build a matrix from a flat row-major buffer.
    ///
    /// Returns `None` when `data.len() != rows * cols`.
    pub fn from_flat(rows: usize, cols: usize, data: Vec<f32>) -> Option<Self> {
        if rows.checked_mul(cols)? != data.len() {
            return None;
        }
        Some(Self { rows, cols, data })
    }

    /// Build a matrix from fixed-width rows, narrowing to `f32`.
    pub fn from_rows<const N: usize>(rows: &[[f64; N]]) -> Self {
        let data = rows
            .iter()
            .flat_map(|row| row.iter().map(|&v| v as f32))
            .collect();
        Self {
            rows: rows.len(),
            cols: N,
            data,
        }
    }

    /// Whether every element is finite after narrowing to `f32`.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    /// Whether the buffer length matches the declared shape.
    ///
    /// Always true for matrices built here; deserialized ones must be checked.
    pub fn is_consistent(&self) -> bool {
        self.rows.checked_mul(self.cols) == Some(self.data.len())
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Flat row-major view.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// One row, if in range.
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        Some(&self.data[start..start + self.cols])
    }

    /// One element, if in range.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if col >= self.cols {
            return None;
        }
        self.row(row).map(|r| r[col])
    }

    /// Iterate over rows.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.cols.max(1))
    }
}

/// The unit of training data: one security, one trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// In-session normalized bars, columns in `FEATURE_COLUMNS` order.
    pub input_data: FeatureMatrix,
    /// Trading date formatted as `YYYY-MM-DD`.
    pub date: String,
    /// Security code.
    pub code: SecurityCode,
    /// Next-day return label.
    pub return_1: f64,
    /// Two-day return label.
    pub return_2: f64,
}

/// Why a (security, date) pair produced no sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Fewer than `normalize_window` prior dates.
    NoWindow,
    /// No daily row for the date, or one of its labels is undefined.
    LabelMissing,
    /// No intraday row inside the trading session.
    EmptySession,
    /// At least one normalized value is undefined.
    DegenerateWindow,
    /// Row-level parse or coercion failure on that date.
    Malformed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoWindow => write!(f, "insufficient window history"),
            SkipReason::LabelMissing => write!(f, "label missing"),
            SkipReason::EmptySession => write!(f, "no bars in trading session"),
            SkipReason::DegenerateWindow => write!(f, "undefined normalized value"),
            SkipReason::Malformed(msg) => write!(f, "malformed rows: {}", msg),
        }
    }
}

impl From<crate::Error> for SkipReason {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::LabelMissing(_) => SkipReason::LabelMissing,
            crate::Error::DegenerateWindow(_) => SkipReason::DegenerateWindow,
            other => SkipReason::Malformed(other.to_string()),
        }
    }
}

/// Result of processing one trading date.
pub type DayOutcome = std::result::Result<SampleRecord, SkipReason>;

/// Per-reason counts of skipped dates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCounts {
    pub no_window: u64,
    pub label_missing: u64,
    pub empty_session: u64,
    pub degenerate_window: u64,
    pub malformed: u64,
}

impl SkipCounts {
    /// Count one skipped date.
    pub fn record(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::NoWindow => self.no_window += 1,
            SkipReason::LabelMissing => self.label_missing += 1,
            SkipReason::EmptySession => self.empty_session += 1,
            SkipReason::DegenerateWindow => self.degenerate_window += 1,
            SkipReason::Malformed(_) => self.malformed += 1,
        }
    }

    /// Add another set of counts.
    pub fn merge(&mut self, other: &SkipCounts) {
        self.no_window += other.no_window;
        self.label_missing += other.label_missing;
        self.empty_session += other.empty_session;
        self.degenerate_window += other.degenerate_window;
        self.malformed += other.malformed;
    }

    /// Total skipped dates.
    pub fn total(&self) -> u64 {
        self.no_window
            + self.label_missing
            + self.empty_session
            + self.degenerate_window
            + self.malformed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_from_rows() {
        let m = FeatureMatrix::from_rows(&[[0.0, 0.5], [1.0, 0.25]]);
        assert_eq!(m.shape(), (2, 2));
        assert_eq!(m.get(1, 0), Some(1.0));
        assert_eq!(m.row(0), Some(&[0.0f32, 0.5][..]));
        assert_eq!(m.row(2), None);
        assert_eq!(m.get(0, 2), None);
        assert_eq!(m.iter_rows().count(), 2);
    }

    #[test]
    fn test_matrix_narrowing_overflow_is_not_finite() {
        assert!(FeatureMatrix::from_rows(&[[0.5, 1.0]]).is_finite());
        // beyond f32::MAX
        assert!(!FeatureMatrix::from_rows(&[[0.5, 1e39]]).is_finite());
    }

    #[test]
    fn test_matrix_from_flat_checks_length() {
        assert!(FeatureMatrix::from_flat(2, 3, vec![0.0; 6]).is_some());
        assert!(FeatureMatrix::from_flat(2, 3, vec![0.0; 5]).is_none());
        assert!(FeatureMatrix::from_flat(usize::MAX, 2, vec![]).is_none());
    }

    #[test]
    fn test_skip_counts() {
        let mut counts = SkipCounts::default();
        counts.record(&SkipReason::NoWindow);
        counts.record(&SkipReason::Malformed("bad time".into()));
        counts.record(&SkipReason::NoWindow);

        let mut total = SkipCounts::default();
        total.merge(&counts);
        total.merge(&counts);

        assert_eq!(total.no_window, 4);
        assert_eq!(total.malformed, 2);
        assert_eq!(total.total(), 6);
    }

    #[test]
    fn test_skip_reason_from_error() {
        let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
        assert_eq!(SkipReason::from(crate::Error::LabelMissing(date)), SkipReason::LabelMissing);
        assert_eq!(
            SkipReason::from(crate::Error::DegenerateWindow(date)),
            SkipReason::DegenerateWindow
        );
        assert!(matches!(
            SkipReason::from(crate::Error::data_format("x")),
            SkipReason::Malformed(_)
        ));
    }
}
