//! Configuration structures for the minute-dataset pipeline.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main configuration for a dataset build.
///
/// Deserialization goes through `DatasetConfigFile`, which also accepts the
/// flat option names and the `load_from_cache` / `load_with_write_cache` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "DatasetConfigFile")]
pub struct DatasetConfig {
    /// First calendar date (inclusive) that may carry a sample.
    pub start_date: NaiveDate,
    /// Last calendar date (inclusive) that may carry a sample.
    pub end_date: NaiveDate,
    /// Security catalog.
    pub catalog: CatalogConfig,
    /// Daily source files.
    pub daily: DailySourceConfig,
    /// Intraday source files.
    pub intraday: IntradaySourceConfig,
    /// Trading session clip.
    pub session: SessionConfig,
    /// Number of prior trading dates in the normalization window.
    pub normalize_window: usize,
    /// Sample cache.
    pub cache: CacheConfig,
    /// How the dataset is materialized.
    pub load_strategy: LoadStrategy,
    /// Number of parallel workers (0 = auto).
    pub workers: u32,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2021, 12, 31).unwrap_or_default(),
            catalog: CatalogConfig::default(),
            daily: DailySourceConfig::default(),
            intraday: IntradaySourceConfig::default(),
            session: SessionConfig::default(),
            normalize_window: 5,
            cache: CacheConfig::default(),
            load_strategy: LoadStrategy::default(),
            workers: 0,
        }
    }
}

impl DatasetConfig {
    /// Read and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        let config: DatasetConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(Error::config(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            )));
        }
        if self.session.start > self.session.end {
            return Err(Error::config(format!(
                "session start {} is after session end {}",
                self.session.start, self.session.end
            )));
        }
        if self.normalize_window == 0 {
            return Err(Error::config("normalize_window must be at least 1"));
        }
        for (label, pattern) in [
            ("daily", &self.daily.file_pattern),
            ("intraday", &self.intraday.file_pattern),
        ] {
            if !pattern.contains("{code}") {
                return Err(Error::config(format!(
                    "{} file_pattern '{}' must contain {{code}}",
                    label, pattern
                )));
            }
            if pattern.contains("{name}") && self.catalog.name_column.is_none() {
                return Err(Error::config(format!(
                    "{} file_pattern '{}' uses {{name}} but catalog.name_column is not set",
                    label, pattern
                )));
            }
        }
        Ok(())
    }
}

/// On-disk shape of [`DatasetConfig`].
///
/// Nested sections and flat option names are both accepted; a flat name
/// overrides the matching field of its section. Unknown keys are rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct DatasetConfigFile {
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    catalog: Option<CatalogConfig>,
    daily: Option<DailySourceConfig>,
    intraday: Option<IntradaySourceConfig>,
    session: Option<SessionConfig>,
    normalize_window: Option<usize>,
    cache: Option<CacheConfig>,
    load_strategy: Option<LoadStrategy>,
    workers: Option<u32>,

    #[serde(alias = "stock_list_file")]
    catalog_path: Option<PathBuf>,
    daily_root: Option<PathBuf>,
    intraday_root: Option<PathBuf>,
    trade_start_time: Option<NaiveTime>,
    trade_end_time: Option<NaiveTime>,
    cache_path: Option<PathBuf>,
    load_from_cache: Option<bool>,
    load_with_write_cache: Option<bool>,
}

impl From<DatasetConfigFile> for DatasetConfig {
    fn from(file: DatasetConfigFile) -> Self {
        let defaults = DatasetConfig::default();

        let mut catalog = file.catalog.unwrap_or(defaults.catalog);
        if let Some(path) = file.catalog_path {
            catalog.path = path;
        }
        let mut daily = file.daily.unwrap_or(defaults.daily);
        if let Some(root) = file.daily_root {
            daily.root = root;
        }
        let mut intraday = file.intraday.unwrap_or(defaults.intraday);
        if let Some(root) = file.intraday_root {
            intraday.root = root;
        }
        let mut session = file.session.unwrap_or(defaults.session);
        if let Some(start) = file.trade_start_time {
            session.start = start;
        }
        if let Some(end) = file.trade_end_time {
            session.end = end;
        }
        let mut cache = file.cache.unwrap_or(defaults.cache);
        if let Some(path) = file.cache_path {
            cache.path = path;
        }

        // An explicit strategy wins over the legacy flags.
        let load_strategy = match (
            file.load_strategy,
            file.load_from_cache,
            file.load_with_write_cache,
        ) {
            (Some(strategy), _, _) => strategy,
            (None, None, None) => defaults.load_strategy,
            (None, from_cache, write_cache) => {
                LoadStrategy::from_flags(from_cache.unwrap_or(false), write_cache.unwrap_or(true))
            }
        };

        Self {
            start_date: file.start_date.unwrap_or(defaults.start_date),
            end_date: file.end_date.unwrap_or(defaults.end_date),
            catalog,
            daily,
            intraday,
            session,
            normalize_window: file.normalize_window.unwrap_or(defaults.normalize_window),
            cache,
            load_strategy,
            workers: file.workers.unwrap_or(defaults.workers),
        }
    }
}

/// Security catalog configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Catalog file (CSV or Parquet).
    pub path: PathBuf,
    /// Column holding the security code.
    pub code_column: String,
    /// Column holding the display name, if any.
    pub name_column: Option<String>,
    /// Only process the first N securities.
    pub limit: Option<usize>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("stock_list.csv"),
            code_column: "code".to_string(),
            name_column: None,
            limit: None,
        }
    }
}

/// Daily file location and column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DailySourceConfig {
    /// Directory holding one file per security.
    pub root: PathBuf,
    /// File name template; `{code}` and `{name}` are substituted.
    pub file_pattern: String,
    /// Column names.
    pub columns: DailyColumns,
}

impl Default for DailySourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("daily"),
            file_pattern: "{code}.csv".to_string(),
            columns: DailyColumns::default(),
        }
    }
}

/// Column names of a daily table. Only `date` and `close` are required.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyColumns {
    pub date: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub turnover: String,
}

impl Default for DailyColumns {
    fn default() -> Self {
        Self {
            date: "trade_date".to_string(),
            open: "open".to_string(),
            high: "high".to_string(),
            low: "low".to_string(),
            close: "close".to_string(),
            volume: "vol".to_string(),
            turnover: "amount".to_string(),
        }
    }
}

/// Intraday file location and column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntradaySourceConfig {
    /// Directory holding one file per security.
    pub root: PathBuf,
    /// File name template; `{code}` and `{name}` are substituted.
    pub file_pattern: String,
    /// Column names.
    pub columns: IntradayColumns,
}

impl Default for IntradaySourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("min_data"),
            file_pattern: "{code}.parquet".to_string(),
            columns: IntradayColumns::default(),
        }
    }
}

/// Column names of an intraday table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntradayColumns {
    /// Date, or full timestamp when `time` is `None`.
    pub date: String,
    /// Separate time-of-day column.
    pub time: Option<String>,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
    pub turnover: String,
}

impl Default for IntradayColumns {
    fn default() -> Self {
        Self {
            date: "日期".to_string(),
            time: Some("时间".to_string()),
            open: "开盘价".to_string(),
            high: "最高价".to_string(),
            low: "最低价".to_string(),
            close: "收盘价".to_string(),
            volume: "成交量".to_string(),
            turnover: "成交额".to_string(),
        }
    }
}

/// Exchange trading session, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SessionConfig {
    /// Whether a time of day falls inside the session.
    #[inline]
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(15, 0, 0).unwrap_or_default(),
        }
    }
}

/// On-disk cache encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheFormat {
    /// Single SQLite file.
    #[default]
    Sqlite,
    /// Header line plus one JSON record per line.
    JsonLines,
}

impl std::str::FromStr for CacheFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(CacheFormat::Sqlite),
            "json_lines" | "jsonl" => Ok(CacheFormat::JsonLines),
            other => Err(Error::config(format!("unknown cache format '{}'", other))),
        }
    }
}

/// Sample cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub format: CacheFormat,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("samples.sqlite"),
            format: CacheFormat::Sqlite,
        }
    }
}

/// How a dataset is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Compute every sample from the source files.
    FreshBuild,
    /// Restore samples from the cache, skipping computation.
    LoadCache,
    /// Compute every sample, then persist the cache.
    #[default]
    BuildAndCache,
}

impl LoadStrategy {
    /// Map the legacy `load_from_cache` / `load_with_write_cache` flag pair.
    ///
    /// `load_from_cache` takes precedence when both are set.
    pub fn from_flags(load_from_cache: bool, load_with_write_cache: bool) -> Self {
        match (load_from_cache, load_with_write_cache) {
            (true, _) => LoadStrategy::LoadCache,
            (false, true) => LoadStrategy::BuildAndCache,
            (false, false) => LoadStrategy::FreshBuild,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DatasetConfig::default();
        assert_eq!(config.normalize_window, 5);
        assert_eq!(config.session.start, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(config.load_strategy, LoadStrategy::BuildAndCache);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_strategy_flags() {
        assert_eq!(LoadStrategy::from_flags(true, true), LoadStrategy::LoadCache);
        assert_eq!(LoadStrategy::from_flags(false, true), LoadStrategy::BuildAndCache);
        assert_eq!(LoadStrategy::from_flags(false, false), LoadStrategy::FreshBuild);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = DatasetConfig::default();
        config.normalize_window = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = DatasetConfig::default();
        config.end_date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(config.validate().is_err());

        let mut config = DatasetConfig::default();
        config.intraday.file_pattern = "bars.parquet".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cache_format_from_str() {
        assert_eq!("sqlite".parse::<CacheFormat>().unwrap(), CacheFormat::Sqlite);
        assert_eq!("JSON_LINES".parse::<CacheFormat>().unwrap(), CacheFormat::JsonLines);
        assert!(matches!("pickle".parse::<CacheFormat>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_session_is_inclusive() {
        let session = SessionConfig::default();
        assert!(session.contains(NaiveTime::from_hms_opt(9, 30, 0).unwrap()));
        assert!(session.contains(NaiveTime::from_hms_opt(15, 0, 0).unwrap()));
        assert!(!session.contains(NaiveTime::from_hms_opt(9, 29, 59).unwrap()));
        assert!(!session.contains(NaiveTime::from_hms_opt(15, 0, 1).unwrap()));
    }

    #[test]
    fn test_partial_json_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "start_date": "2022-01-01",
                "end_date": "2022-06-30",
                "session": {{ "start": "09:31:00", "end": "14:57:00" }},
                "normalize_window": 3,
                "cache": {{ "path": "/tmp/samples.jsonl", "format": "json_lines" }},
                "load_strategy": "load_cache"
            }}"#
        )
        .unwrap();

        let config = DatasetConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.normalize_window, 3);
        assert_eq!(config.cache.format, CacheFormat::JsonLines);
        assert_eq!(config.load_strategy, LoadStrategy::LoadCache);
        assert_eq!(config.session.end, NaiveTime::from_hms_opt(14, 57, 0).unwrap());
        // untouched sections keep their defaults
        assert_eq!(config.daily.columns.close, "close");
        assert_eq!(config.intraday.columns.time.as_deref(), Some("时间"));
        assert_eq!(config.catalog.name_column, None);
    }

    fn load_json(text: &str) -> Result<DatasetConfig> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        DatasetConfig::from_json_file(file.path())
    }

    #[test]
    fn test_flat_option_names() {
        let config = load_json(
            r#"{
                "start_date": "2021-01-01",
                "end_date": "2021-12-31",
                "catalog_path": "/x/list.csv",
                "daily_root": "/x/daily",
                "intraday_root": "/x/min",
                "trade_start_time": "09:31:00",
                "trade_end_time": "14:57:00",
                "normalize_window": 5,
                "cache_path": "/x/samples.sqlite",
                "load_from_cache": true,
                "load_with_write_cache": false
            }"#,
        )
        .unwrap();

        assert_eq!(config.load_strategy, LoadStrategy::LoadCache);
        assert_eq!(config.catalog.path, PathBuf::from("/x/list.csv"));
        assert_eq!(config.daily.root, PathBuf::from("/x/daily"));
        assert_eq!(config.intraday.root, PathBuf::from("/x/min"));
        assert_eq!(config.session.start, NaiveTime::from_hms_opt(9, 31, 0).unwrap());
        assert_eq!(config.session.end, NaiveTime::from_hms_opt(14, 57, 0).unwrap());
        assert_eq!(config.cache.path, PathBuf::from("/x/samples.sqlite"));
    }

    #[test]
    fn test_legacy_flags_resolve_strategy() {
        let fresh = load_json(r#"{ "load_with_write_cache": false }"#).unwrap();
        assert_eq!(fresh.load_strategy, LoadStrategy::FreshBuild);

        // the write-cache flag defaults to on, as in the legacy config
        let cached = load_json(r#"{ "load_from_cache": false }"#).unwrap();
        assert_eq!(cached.load_strategy, LoadStrategy::BuildAndCache);

        let explicit =
            load_json(r#"{ "load_strategy": "fresh_build", "load_from_cache": true }"#).unwrap();
        assert_eq!(explicit.load_strategy, LoadStrategy::FreshBuild);

        let nested_and_flat = load_json(
            r#"{ "catalog": { "path": "a.csv", "limit": 5 }, "stock_list_file": "b.csv" }"#,
        )
        .unwrap();
        assert_eq!(nested_and_flat.catalog.path, PathBuf::from("b.csv"));
        assert_eq!(nested_and_flat.catalog.limit, Some(5));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            load_json(r#"{ "load_form_cache": true }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_name_pattern_requires_name_column() {
        let mut config = DatasetConfig::default();
        config.intraday.file_pattern = "{code}_{name}.parquet".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.catalog.name_column = Some("name".to_string());
        assert!(config.validate().is_ok());
    }
}
