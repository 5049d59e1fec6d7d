//! Forward return labels on the daily series.
//!
//! Labels are computed on the full daily history and only then filtered to
//! the configured date range, so dates at the range boundary still see the
//! closes that follow them.

use chrono::NaiveDate;
use minute_core::{DailyBar, DayLabel, Error, Result};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// A daily row with its forward return labels.
#[derive(Debug, Clone)]
pub struct DailyRecord {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub turnover: f64,
    /// `close[t+1] / close[t] - 1`, undefined at the tail.
    pub return_1: Option<f64>,
    /// `close[t+2] / close[t] - 1`, undefined on the last two rows.
    pub return_2: Option<f64>,
}

/// Date-indexed daily series with labels.
#[derive(Debug, Clone, Default)]
pub struct DailySeries {
    rows: BTreeMap<NaiveDate, DailyRecord>,
}

impl DailySeries {
    /// Row for a date.
    pub fn get(&self, date: NaiveDate) -> Option<&DailyRecord> {
        self.rows.get(&date)
    }

    /// Both labels for a date.
    ///
    /// Fails with `LabelMissing` when the date is absent or either label is
    /// undefined.
    pub fn label(&self, date: NaiveDate) -> Result<DayLabel> {
        let row = self.rows.get(&date).ok_or(Error::LabelMissing(date))?;
        match (row.return_1, row.return_2) {
            (Some(return_1), Some(return_2)) => Ok(DayLabel { return_1, return_2 }),
            _ => Err(Error::LabelMissing(date)),
        }
    }

    /// Dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the series is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Percentage change from `from` to `to`, `None` unless finite.
#[inline]
fn pct_change(from: f64, to: f64) -> Option<f64> {
    let r = (to - from) / from;
    r.is_finite().then_some(r)
}

/// Forward `horizon`-step return for every position of `closes`.
pub fn forward_returns(closes: &[f64], horizon: usize) -> Vec<Option<f64>> {
    (0..closes.len())
        .map(|t| {
            let ahead = closes.get(t + horizon)?;
            pct_change(closes[t], *ahead)
        })
        .collect()
}

/// Turns raw daily bars into a labeled, range-filtered series.
#[derive(Debug, Clone)]
pub struct DailyProcessor {
    range: RangeInclusive<NaiveDate>,
}

impl DailyProcessor {
    /// Create a processor keeping dates in `[start, end]`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { range: start..=end }
    }

    /// Label and filter the bars.
    pub fn process(&self, mut bars: Vec<DailyBar>) -> Result<DailySeries> {
        if bars.is_empty() {
            return Err(Error::data_format("empty daily table"));
        }
        bars.sort_by_key(|b| b.date);

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let return_1 = forward_returns(&closes, 1);
        let return_2 = forward_returns(&closes, 2);

        let rows = bars
            .into_iter()
            .zip(return_1.into_iter().zip(return_2))
            .filter(|(bar, _)| self.range.contains(&bar.date))
            .map(|(bar, (return_1, return_2))| {
                (
                    bar.date,
                    DailyRecord {
                        open: bar.open,
                        high: bar.high,
                        low: bar.low,
                        close: bar.close,
                        volume: bar.volume,
                        turnover: bar.turnover,
                        return_1,
                        return_2,
                    },
                )
            })
            .collect();

        Ok(DailySeries { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 3, day).unwrap()
    }

    fn bar(day: u32, close: f64) -> DailyBar {
        DailyBar {
            date: d(day),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
            turnover: 100.0 * close,
        }
    }

    #[test]
    fn test_labels_with_nan_tail() {
        // closes [10, 11, 9, 12, NaN] on D1..D5
        let bars = vec![
            bar(1, 10.0),
            bar(2, 11.0),
            bar(3, 9.0),
            bar(4, 12.0),
            bar(5, f64::NAN),
        ];
        let series = DailyProcessor::new(d(1), d(31)).process(bars).unwrap();

        let d1 = series.get(d(1)).unwrap();
        assert_relative_eq!(d1.return_1.unwrap(), 0.10, epsilon = 1e-12);
        assert_relative_eq!(d1.return_2.unwrap(), -0.10, epsilon = 1e-12);

        let d3 = series.get(d(3)).unwrap();
        assert_relative_eq!(d3.return_1.unwrap(), 12.0 / 9.0 - 1.0, epsilon = 1e-12);
        assert!(d3.return_2.is_none());

        assert!(series.get(d(4)).unwrap().return_1.is_none());
        let d5 = series.get(d(5)).unwrap();
        assert!(d5.return_1.is_none() && d5.return_2.is_none());

        // rows with missing labels stay in the series
        assert_eq!(series.len(), 5);
        assert!(matches!(series.label(d(4)), Err(Error::LabelMissing(_))));
        assert!(series.label(d(1)).is_ok());
    }

    #[test]
    fn test_return_2_is_plain_two_step_change() {
        let bars = vec![bar(1, 100.0), bar(2, 50.0), bar(3, 120.0)];
        let series = DailyProcessor::new(d(1), d(31)).process(bars).unwrap();
        let label = series.label(d(1)).unwrap();
        assert_relative_eq!(label.return_2, 0.2, epsilon = 1e-12);
        assert_relative_eq!(label.return_1, -0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_labels_computed_before_range_filter() {
        let bars = vec![bar(1, 10.0), bar(2, 11.0), bar(3, 12.1), bar(4, 13.31)];
        let series = DailyProcessor::new(d(1), d(2)).process(bars).unwrap();

        assert_eq!(series.dates().collect::<Vec<_>>(), vec![d(1), d(2)]);
        // the boundary date keeps labels computed from out-of-range closes
        let label = series.label(d(2)).unwrap();
        assert_relative_eq!(label.return_1, 0.1, epsilon = 1e-9);
        assert_relative_eq!(label.return_2, 0.21, epsilon = 1e-9);
        assert!(series.get(d(3)).is_none());
    }

    #[test]
    fn test_unsorted_input() {
        let bars = vec![bar(3, 12.0), bar(1, 10.0), bar(2, 11.0)];
        let series = DailyProcessor::new(d(1), d(31)).process(bars).unwrap();
        assert_relative_eq!(series.label(d(1)).unwrap().return_1, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_close_gives_missing_label() {
        let returns = forward_returns(&[0.0, 1.0, 2.0], 1);
        assert_eq!(returns[0], None);
        assert_eq!(returns[1], Some(1.0));
        assert_eq!(returns[2], None);
    }

    #[test]
    fn test_empty_input_is_format_error() {
        let result = DailyProcessor::new(d(1), d(31)).process(Vec::new());
        assert!(matches!(result, Err(Error::DataFormat(_))));
    }
}
