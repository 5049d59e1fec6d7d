//! Typed daily and intraday series built from raw tables.

use crate::table::RawTable;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use minute_core::{DailyBar, DailyColumns, Error, IntradayColumns, MinuteBar, Result};
use std::collections::BTreeSet;
use tracing::warn;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const TIME_FORMATS: [&str; 3] = ["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"];

/// Parse a full timestamp.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Parse a calendar date, also accepting a full timestamp.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| parse_datetime(s).map(|dt| dt.date()))
}

/// Parse a time of day.
///
/// Accepts `HH:MM[:SS[.f]]`, compact digits (`931`, `0931`, `093100`) and
/// full timestamps.
pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if let Some(t) = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
    {
        return Some(t);
    }
    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        let n: u32 = s.parse().ok()?;
        return match s.len() {
            3 | 4 => NaiveTime::from_hms_opt(n / 100, n % 100, 0),
            5 | 6 => NaiveTime::from_hms_opt(n / 10_000, (n / 100) % 100, n % 100),
            _ => None,
        };
    }
    parse_datetime(s).map(|dt| dt.time())
}

/// Numeric cell: `Ok(NaN)` for nulls, `Err` for text that is not a finite number.
fn parse_number(cell: Option<&str>) -> std::result::Result<f64, String> {
    match cell {
        None => Ok(f64::NAN),
        Some(s) => match s.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(format!("'{}' is not a finite number", s)),
        },
    }
}

/// Parse a daily table into bars sorted by date.
///
/// `date` and `close` columns are required; the other price and volume
/// columns default to NaN when absent. Rows with unparseable dates are
/// dropped, duplicate dates keep their first row.
pub fn parse_daily(table: &RawTable, columns: &DailyColumns) -> Result<Vec<DailyBar>> {
    let date_col = table.require_column(&columns.date)?;
    let close_col = table.require_column(&columns.close)?;
    let optional = |name: &str| table.column_index(name);
    let (open_col, high_col, low_col) = (
        optional(&columns.open),
        optional(&columns.high),
        optional(&columns.low),
    );
    let (volume_col, turnover_col) = (optional(&columns.volume), optional(&columns.turnover));

    let number = |row: usize, col: Option<usize>| -> f64 {
        col.and_then(|c| table.cell(row, c))
            .and_then(|s| parse_number(Some(s)).ok())
            .unwrap_or(f64::NAN)
    };

    let mut bars = Vec::with_capacity(table.len());
    let mut dropped = 0usize;
    for row in 0..table.len() {
        let Some(date) = table.cell(row, date_col).and_then(parse_date) else {
            dropped += 1;
            continue;
        };
        bars.push(DailyBar {
            date,
            open: number(row, open_col),
            high: number(row, high_col),
            low: number(row, low_col),
            close: number(row, Some(close_col)),
            volume: number(row, volume_col),
            turnover: number(row, turnover_col),
        });
    }

    if dropped > 0 {
        warn!("Dropped {} daily rows with unparseable dates", dropped);
    }
    if bars.is_empty() {
        return Err(Error::data_format("no daily rows with a valid date"));
    }

    bars.sort_by_key(|b| b.date);
    let before = bars.len();
    bars.dedup_by_key(|b| b.date);
    if bars.len() < before {
        warn!("Removed {} duplicate daily dates", before - bars.len());
    }
    Ok(bars)
}

/// Minute bars of one security, sorted by timestamp.
#[derive(Debug, Clone, Default)]
pub struct IntradaySeries {
    bars: Vec<MinuteBar>,
    malformed: BTreeSet<NaiveDate>,
}

impl IntradaySeries {
    /// Build a series from bars in any order.
    pub fn new(mut bars: Vec<MinuteBar>) -> Self {
        bars.sort_by_key(|b| b.ts);
        Self {
            bars,
            malformed: BTreeSet::new(),
        }
    }

    /// Flag a date whose rows failed to parse.
    pub fn mark_malformed(&mut self, date: NaiveDate) {
        self.malformed.insert(date);
    }

    /// Whether any row on `date` failed to parse.
    pub fn is_malformed(&self, date: NaiveDate) -> bool {
        self.malformed.contains(&date)
    }

    /// All bars in timestamp order.
    pub fn bars(&self) -> &[MinuteBar] {
        &self.bars
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series has no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Sorted unique trading dates, including dates that only carry
    /// malformed rows.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.bars.iter().map(MinuteBar::date).collect();
        dates.dedup();
        let mut all: BTreeSet<NaiveDate> = dates.into_iter().collect();
        all.extend(self.malformed.iter().copied());
        all.into_iter().collect()
    }

    /// Bars of a single date.
    pub fn day(&self, date: NaiveDate) -> &[MinuteBar] {
        let start = self.bars.partition_point(|b| b.date() < date);
        let end = self.bars.partition_point(|b| b.date() <= date);
        &self.bars[start..end]
    }

    /// Drop every bar after `date`.
    pub fn truncate_after(&mut self, date: NaiveDate) {
        let end = self.bars.partition_point(|b| b.date() <= date);
        self.bars.truncate(end);
        self.malformed.retain(|d| *d <= date);
    }
}

/// Parse an intraday table.
///
/// Rows whose date cannot be read are dropped. Rows with a readable date but
/// a bad time or a non-numeric field mark that date malformed.
pub fn parse_intraday(table: &RawTable, columns: &IntradayColumns) -> Result<IntradaySeries> {
    let date_col = table.require_column(&columns.date)?;
    let time_col = columns
        .time
        .as_deref()
        .map(|name| table.require_column(name))
        .transpose()?;
    let value_cols = [
        table.require_column(&columns.open)?,
        table.require_column(&columns.high)?,
        table.require_column(&columns.low)?,
        table.require_column(&columns.close)?,
        table.require_column(&columns.volume)?,
        table.require_column(&columns.turnover)?,
    ];

    let mut bars = Vec::with_capacity(table.len());
    let mut malformed = Vec::new();
    let mut dropped = 0usize;

    for row in 0..table.len() {
        let date_cell = table.cell(row, date_col);
        let date = match date_cell.and_then(parse_date) {
            Some(d) => d,
            None => {
                dropped += 1;
                continue;
            }
        };

        let ts = match time_col {
            Some(col) => table
                .cell(row, col)
                .and_then(parse_time)
                .map(|t| date.and_time(t)),
            None => date_cell.and_then(parse_datetime),
        };
        let Some(ts) = ts else {
            malformed.push(date);
            continue;
        };

        let mut values = [0.0f64; 6];
        let mut coerced = true;
        for (slot, &col) in values.iter_mut().zip(value_cols.iter()) {
            match parse_number(table.cell(row, col)) {
                Ok(v) => *slot = v,
                Err(_) => {
                    coerced = false;
                    break;
                }
            }
        }
        if !coerced {
            malformed.push(date);
            continue;
        }

        let [open, high, low, close, volume, turnover] = values;
        bars.push(MinuteBar {
            ts,
            open,
            high,
            low,
            close,
            volume,
            turnover,
        });
    }

    if dropped > 0 {
        warn!("Dropped {} intraday rows with unparseable dates", dropped);
    }
    if !malformed.is_empty() {
        warn!("{} intraday rows failed to parse", malformed.len());
    }
    if bars.is_empty() && malformed.is_empty() {
        return Err(Error::data_format("no intraday rows with a valid date"));
    }

    let mut series = IntradaySeries::new(bars);
    for date in malformed {
        series.mark_malformed(date);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2021-03-04"), Some(d(2021, 3, 4)));
        assert_eq!(parse_date("20210304"), Some(d(2021, 3, 4)));
        assert_eq!(parse_date("2021/03/04"), Some(d(2021, 3, 4)));
        assert_eq!(parse_date("2021-03-04 09:31:00"), Some(d(2021, 3, 4)));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("09:31:00"), Some(t(9, 31, 0)));
        assert_eq!(parse_time("09:31"), Some(t(9, 31, 0)));
        assert_eq!(parse_time("931"), Some(t(9, 31, 0)));
        assert_eq!(parse_time("1500"), Some(t(15, 0, 0)));
        assert_eq!(parse_time("093100"), Some(t(9, 31, 0)));
        assert_eq!(parse_time("2021-03-04 13:05:00"), Some(t(13, 5, 0)));
        assert_eq!(parse_time("2561"), None);
        assert_eq!(parse_time("noon"), None);
    }

    #[test]
    fn test_parse_daily_sorts_and_dedups() {
        let table = RawTable::from_strs(
            &["trade_date", "open", "close", "vol"],
            &[
                &["20210105", "10.1", "10.5", "1000"],
                &["20210104", "9.9", "10.0", "900"],
                &["bad", "1", "1", "1"],
                &["20210105", "0", "0", "0"],
                &["20210106", "", "11.0", ""],
            ],
        );

        let bars = parse_daily(&table, &DailyColumns::default()).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, d(2021, 1, 4));
        assert_eq!(bars[1].close, 10.5);
        assert!(bars[2].open.is_nan());
        assert!(bars[2].volume.is_nan());
        // no high/low/amount columns in this table
        assert!(bars[0].high.is_nan());
        assert!(bars[0].turnover.is_nan());
    }

    #[test]
    fn test_parse_daily_requires_close() {
        let table = RawTable::from_strs(&["trade_date", "open"], &[&["20210104", "1"]]);
        assert!(matches!(
            parse_daily(&table, &DailyColumns::default()),
            Err(Error::DataFormat(_))
        ));
    }

    #[test]
    fn test_parse_daily_no_valid_dates() {
        let table = RawTable::from_strs(&["trade_date", "close"], &[&["n/a", "1"]]);
        assert!(parse_daily(&table, &DailyColumns::default()).is_err());
    }

    fn intraday_columns() -> IntradayColumns {
        IntradayColumns {
            date: "date".into(),
            time: Some("time".into()),
            open: "open".into(),
            high: "high".into(),
            low: "low".into(),
            close: "close".into(),
            volume: "volume".into(),
            turnover: "amount".into(),
        }
    }

    const HEADER: [&str; 8] = ["date", "time", "open", "high", "low", "close", "volume", "amount"];

    #[test]
    fn test_parse_intraday_marks_malformed_dates() {
        let table = RawTable::from_strs(
            &HEADER,
            &[
                &["2021-01-05", "09:32", "2", "2", "2", "2", "10", "20"],
                &["2021-01-04", "09:31", "1", "1", "1", "1", "10", "10"],
                &["2021-01-05", "25:99", "2", "2", "2", "2", "10", "20"],
                &["2021-01-06", "09:31", "x", "3", "3", "3", "10", "30"],
                &["garbage", "09:31", "1", "1", "1", "1", "1", "1"],
                &["2021-01-07", "09:31", "4", "4", "4", "", "10", "40"],
            ],
        );

        let series = parse_intraday(&table, &intraday_columns()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.bars()[0].ts, d(2021, 1, 4).and_time(t(9, 31, 0)));
        assert!(series.is_malformed(d(2021, 1, 5)));
        assert!(series.is_malformed(d(2021, 1, 6)));
        assert!(!series.is_malformed(d(2021, 1, 4)));
        // a null value is undefined, not malformed
        assert!(!series.is_malformed(d(2021, 1, 7)));
        assert!(series.day(d(2021, 1, 7))[0].close.is_nan());
        assert_eq!(
            series.dates(),
            vec![d(2021, 1, 4), d(2021, 1, 5), d(2021, 1, 6), d(2021, 1, 7)]
        );
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(parse_number(Some("1.5")), Ok(1.5));
        assert!(parse_number(None).unwrap().is_nan());
        for text in ["inf", "-infinity", "NaN", "1e400"] {
            assert!(parse_number(Some(text)).is_err(), "{} accepted", text);
        }
    }

    #[test]
    fn test_parse_intraday_infinite_value_is_malformed() {
        let table = RawTable::from_strs(
            &HEADER,
            &[
                &["2021-01-04", "09:31", "1", "1", "1", "1", "10", "10"],
                &["2021-01-05", "09:31", "2", "2", "2", "2", "inf", "20"],
            ],
        );

        let series = parse_intraday(&table, &intraday_columns()).unwrap();
        assert_eq!(series.len(), 1);
        assert!(series.is_malformed(d(2021, 1, 5)));
    }

    #[test]
    fn test_parse_intraday_timestamp_column() {
        let mut columns = intraday_columns();
        columns.time = None;
        let table = RawTable::from_strs(
            &HEADER,
            &[
                &["2021-01-04 09:31:00", "", "1", "1", "1", "1", "1", "1"],
                &["2021-01-04", "", "1", "1", "1", "1", "1", "1"],
            ],
        );

        let series = parse_intraday(&table, &columns).unwrap();
        assert_eq!(series.len(), 1);
        // a bare date has no time of day
        assert!(series.is_malformed(d(2021, 1, 4)));
    }

    #[test]
    fn test_parse_intraday_missing_column() {
        let table = RawTable::from_strs(&["date", "time"], &[&["2021-01-04", "09:31"]]);
        assert!(matches!(
            parse_intraday(&table, &intraday_columns()),
            Err(Error::DataFormat(_))
        ));
    }

    #[test]
    fn test_day_and_truncate() {
        let bar = |day: u32, minute: u32| MinuteBar {
            ts: d(2021, 1, day).and_time(t(9, minute, 0)),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 1.0,
            turnover: 1.0,
        };
        let mut series = IntradaySeries::new(vec![bar(5, 31), bar(4, 32), bar(4, 31), bar(6, 31)]);
        series.mark_malformed(d(2021, 1, 6));

        assert_eq!(series.day(d(2021, 1, 4)).len(), 2);
        assert_eq!(series.day(d(2021, 1, 4))[0].ts.time(), t(9, 31, 0));
        assert!(series.day(d(2021, 1, 9)).is_empty());

        series.truncate_after(d(2021, 1, 5));
        assert_eq!(series.dates(), vec![d(2021, 1, 4), d(2021, 1, 5)]);
        assert!(!series.is_malformed(d(2021, 1, 6)));
    }
}
