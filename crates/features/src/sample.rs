//! Sample construction.
//!
//! Joins normalized intraday days with their daily labels, clips each day to
//! the trading session and emits one record per usable date. Every date is
//! evaluated on its own; a failure only removes that date.

use crate::labels::DailySeries;
use crate::normalizer::{NormalizedBar, NormalizedSeries};
use chrono::NaiveDate;
use minute_core::{
    DayOutcome, FeatureMatrix, SampleRecord, SessionConfig, SkipCounts, SkipReason,
};
use minute_ingestion::IntradaySeries;
use tracing::debug;

/// Records and skip counts for one security.
#[derive(Debug, Clone, Default)]
pub struct SecuritySamples {
    /// Records in ascending date order.
    pub records: Vec<SampleRecord>,
    /// Why the remaining dates were skipped.
    pub skips: SkipCounts,
}

/// Builds sample records for one security at a time.
#[derive(Debug, Clone, Copy)]
pub struct SampleBuilder {
    session: SessionConfig,
}

impl SampleBuilder {
    /// Create a builder clipping to `session`.
    pub fn new(session: SessionConfig) -> Self {
        Self { session }
    }

    /// Outcome for a single date.
    ///
    /// Checks run in order: malformed rows, label, window history, session
    /// clip, undefined values.
    pub fn build_day(
        &self,
        code: &str,
        date: NaiveDate,
        daily: &DailySeries,
        intraday: &IntradaySeries,
        normalized: &NormalizedSeries,
    ) -> DayOutcome {
        if intraday.is_malformed(date) {
            return Err(SkipReason::Malformed(format!(
                "unparseable intraday rows on {}",
                date
            )));
        }
        let label = daily.label(date)?;
        let day = normalized.get(date).ok_or(SkipReason::NoWindow)?;

        let session: Vec<&NormalizedBar> = day
            .rows
            .iter()
            .filter(|row| self.session.contains(row.ts.time()))
            .collect();
        if session.is_empty() {
            return Err(SkipReason::EmptySession);
        }
        if !session.iter().all(|row| row.is_defined()) {
            return Err(SkipReason::DegenerateWindow);
        }

        let rows: Vec<_> = session.iter().map(|row| row.values).collect();
        let input_data = FeatureMatrix::from_rows(&rows);
        if !input_data.is_finite() {
            return Err(SkipReason::DegenerateWindow);
        }
        Ok(SampleRecord {
            input_data,
            date: date.format("%Y-%m-%d").to_string(),
            code: code.to_string(),
            return_1: label.return_1,
            return_2: label.return_2,
        })
    }

    /// Records for every usable intraday date of a security.
    pub fn build(
        &self,
        code: &str,
        daily: &DailySeries,
        intraday: &IntradaySeries,
        normalized: &NormalizedSeries,
    ) -> SecuritySamples {
        let mut out = SecuritySamples::default();
        for date in intraday.dates() {
            match self.build_day(code, date, daily, intraday, normalized) {
                Ok(record) => out.records.push(record),
                Err(reason) => {
                    debug!("{} {}: skipped, {}", code, date, reason);
                    out.skips.record(&reason);
                }
            }
        }
        out
    }
}
