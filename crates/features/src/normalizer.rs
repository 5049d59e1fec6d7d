//! Rolling-window min-max normalization of intraday bars.
//!
//! For the trading date at index `i` of the sorted unique-date sequence, the
//! baseline is every bar of the `window` dates strictly before it,
//! `dates[i - window .. i]`. Dates with `i < window` have no baseline and are
//! left out of the output; they only serve as history for later dates.
//!
//! Prices share one joint range over open/high/low/close. Volume and turnover
//! each get their own range.

use chrono::{NaiveDate, NaiveDateTime};
use minute_core::{Error, MinuteBar, Result, FEATURE_COUNT};
use minute_ingestion::IntradaySeries;
use std::collections::BTreeMap;
use tracing::debug;

/// Min/max of one field. Non-finite observations are ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min: f64,
    pub max: f64,
}

impl Extent {
    /// Range with no observations.
    pub const EMPTY: Extent = Extent {
        min: f64::INFINITY,
        max: f64::NEG_INFINITY,
    };

    /// Add one observation.
    #[inline]
    pub fn observe(&mut self, value: f64) {
        if value.is_finite() {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }

    /// Widen to cover another range.
    #[inline]
    pub fn merge(&mut self, other: &Extent) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// True when the range is empty or has zero width.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.max > self.min)
    }

    /// Min-max scale a value; NaN when the range is degenerate.
    #[inline]
    pub fn scale(&self, value: f64) -> f64 {
        if self.is_degenerate() {
            return f64::NAN;
        }
        (value - self.min) / (self.max - self.min)
    }
}

impl Default for Extent {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Normalization baseline for one date.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Joint range of open, high, low and close.
    pub price: Extent,
    /// Volume range.
    pub volume: Extent,
    /// Turnover range.
    pub turnover: Extent,
}

impl WindowStats {
    /// Statistics of a slice of bars.
    pub fn from_bars(bars: &[MinuteBar]) -> Self {
        let mut stats = Self::default();
        for bar in bars {
            for price in bar.prices() {
                stats.price.observe(price);
            }
            stats.volume.observe(bar.volume);
            stats.turnover.observe(bar.turnover);
        }
        stats
    }

    /// Widen to cover another window.
    pub fn merge(&mut self, other: &WindowStats) {
        self.price.merge(&other.price);
        self.volume.merge(&other.volume);
        self.turnover.merge(&other.turnover);
    }

    /// Whether any of the three ranges is degenerate.
    pub fn is_degenerate(&self) -> bool {
        self.price.is_degenerate() || self.volume.is_degenerate() || self.turnover.is_degenerate()
    }

    /// Normalized fields of a bar, in `FEATURE_COLUMNS` order.
    pub fn normalize(&self, bar: &MinuteBar) -> [f64; FEATURE_COUNT] {
        [
            self.price.scale(bar.open),
            self.price.scale(bar.high),
            self.price.scale(bar.low),
            self.price.scale(bar.close),
            self.volume.scale(bar.volume),
            self.turnover.scale(bar.turnover),
        ]
    }
}

/// One normalized intraday row.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBar {
    pub ts: NaiveDateTime,
    pub values: [f64; FEATURE_COUNT],
}

impl NormalizedBar {
    /// Whether every field is a finite number.
    pub fn is_defined(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// All normalized rows of one date together with the baseline used.
#[derive(Debug, Clone)]
pub struct NormalizedDay {
    pub date: NaiveDate,
    pub stats: WindowStats,
    pub rows: Vec<NormalizedBar>,
}

impl NormalizedDay {
    /// Fails with `DegenerateWindow` if any row has an undefined field.
    pub fn ensure_defined(&self) -> Result<()> {
        if self.rows.iter().all(NormalizedBar::is_defined) {
            Ok(())
        } else {
            Err(Error::DegenerateWindow(self.date))
        }
    }
}

/// Normalized days of one security, keyed by date.
#[derive(Debug, Clone, Default)]
pub struct NormalizedSeries {
    days: BTreeMap<NaiveDate, NormalizedDay>,
}

impl NormalizedSeries {
    /// The normalized day for a date, absent when the date had no window.
    pub fn get(&self, date: NaiveDate) -> Option<&NormalizedDay> {
        self.days.get(&date)
    }

    /// Normalized days in date order.
    pub fn iter(&self) -> impl Iterator<Item = &NormalizedDay> {
        self.days.values()
    }

    /// Number of normalized days.
    pub fn len(&self) -> usize {
        self.days.len()
    }

    /// Whether no day was normalized.
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

/// Rolling min-max normalizer over trailing trading dates.
#[derive(Debug, Clone, Copy)]
pub struct RollingNormalizer {
    /// Number of prior dates in the baseline.
    window: usize,
}

impl RollingNormalizer {
    /// Create a normalizer with a trailing window of `window` dates.
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    /// Window size in dates.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Baseline for `date`, if the date exists and has enough history.
    pub fn window_stats(&self, series: &IntradaySeries, date: NaiveDate) -> Option<WindowStats> {
        let dates = series.dates();
        let i = dates.binary_search(&date).ok()?;
        if i < self.window {
            return None;
        }
        let mut stats = WindowStats::default();
        for &prior in &dates[i - self.window..i] {
            stats.merge(&WindowStats::from_bars(series.day(prior)));
        }
        Some(stats)
    }

    /// Normalize every date that has a full trailing window.
    pub fn normalize(&self, series: &IntradaySeries) -> NormalizedSeries {
        let dates = series.dates();
        // extremes of each date are computed once and combined per window
        let per_day: Vec<WindowStats> = dates
            .iter()
            .map(|&date| WindowStats::from_bars(series.day(date)))
            .collect();

        let mut days = BTreeMap::new();
        let mut degenerate = 0usize;
        for i in self.window..dates.len() {
            let mut stats = WindowStats::default();
            for prior in &per_day[i - self.window..i] {
                stats.merge(prior);
            }
            if stats.is_degenerate() {
                degenerate += 1;
            }

            let date = dates[i];
            let rows = series
                .day(date)
                .iter()
                .map(|bar| NormalizedBar {
                    ts: bar.ts,
                    values: stats.normalize(bar),
                })
                .collect();
            days.insert(date, NormalizedDay { date, stats, rows });
        }

        debug!(
            "Normalized {} of {} dates (window {}, {} degenerate)",
            days.len(),
            dates.len(),
            self.window,
            degenerate
        );
        NormalizedSeries { days }
    }
}
