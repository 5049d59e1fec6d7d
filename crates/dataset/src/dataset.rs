//! In-memory sample collection.

use crate::cache::store_for;
use crate::summary::BuildSummary;
use minute_core::{CacheFormat, Error, Result, SampleRecord};
use std::path::Path;

/// Ordered collection of sample records.
///
/// Records are grouped by security in catalog order and sorted by date
/// within each security.
#[derive(Debug, Clone, Default)]
pub struct StockDataset {
    records: Vec<SampleRecord>,
    summary: Option<BuildSummary>,
}

impl StockDataset {
    /// Dataset produced by a build.
    pub fn new(records: Vec<SampleRecord>, summary: BuildSummary) -> Self {
        Self {
            records,
            summary: Some(summary),
        }
    }

    /// Dataset with no build summary, e.g. one read back from a cache.
    pub fn from_records(records: Vec<SampleRecord>) -> Self {
        Self {
            records,
            summary: None,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `index`, or `IndexOutOfRange`.
    pub fn get(&self, index: usize) -> Result<&SampleRecord> {
        self.records.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.records.len(),
        })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SampleRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SampleRecord> {
        self.records
    }

    /// Summary of the build that produced this dataset, if it was built here.
    pub fn summary(&self) -> Option<&BuildSummary> {
        self.summary.as_ref()
    }

    /// Read a dataset previously written by [`StockDataset::save_cache`].
    pub fn load_cache(path: impl AsRef<Path>, format: CacheFormat) -> Result<Self> {
        let records = store_for(format).load(path.as_ref())?;
        Ok(Self::from_records(records))
    }

    /// Persist every record to `path`, replacing any previous cache.
    pub fn save_cache(&self, path: impl AsRef<Path>, format: CacheFormat) -> Result<()> {
        store_for(format).save(path.as_ref(), &self.records)
    }
}

impl<'a> IntoIterator for &'a StockDataset {
    type Item = &'a SampleRecord;
    type IntoIter = std::slice::Iter<'a, SampleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minute_core::FeatureMatrix;

    fn record(code: &str, date: &str) -> SampleRecord {
        SampleRecord {
            input_data: FeatureMatrix::from_rows(&[[0.5; 6], [0.25; 6]]),
            date: date.to_string(),
            code: code.to_string(),
            return_1: 0.01,
            return_2: -0.02,
        }
    }

    #[test]
    fn test_index_access() {
        let dataset = StockDataset::from_records(vec![
            record("000001", "2021-03-03"),
            record("600000", "2021-03-03"),
        ]);

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.get(1).unwrap().code, "600000");
        assert!(matches!(
            dataset.get(2),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(dataset.summary().is_none());
        assert_eq!((&dataset).into_iter().count(), 2);
    }

    #[test]
    fn test_empty_dataset() {
        let dataset = StockDataset::new(Vec::new(), BuildSummary::default());
        assert!(dataset.is_empty());
        assert!(matches!(dataset.get(0), Err(Error::IndexOutOfRange { .. })));
        assert_eq!(dataset.summary(), Some(&BuildSummary::default()));
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = StockDataset::from_records(vec![
            record("000001", "2021-03-03"),
            record("000001", "2021-03-04"),
        ]);

        for format in [CacheFormat::Sqlite, CacheFormat::JsonLines] {
            let path = dir.path().join(format!("{:?}.cache", format));
            dataset.save_cache(&path, format).unwrap();
            let loaded = StockDataset::load_cache(&path, format).unwrap();
            assert_eq!(loaded.records(), dataset.records());
        }
    }
}
