//! Dataset assembly.
//!
//! Runs the per-security pipeline for every catalog entry and concatenates
//! the results. Securities are processed in parallel on a dedicated rayon
//! pool; results are merged back in catalog order so the output does not
//! depend on the worker count.

use crate::dataset::StockDataset;
use crate::summary::BuildSummary;
use minute_core::{DatasetConfig, Error, LoadStrategy, Result, Security};
use minute_features::{DailyProcessor, RollingNormalizer, SampleBuilder, SecuritySamples};
use minute_ingestion::{
    parse_daily, parse_intraday, resolve_path, Catalog, DuckDbLoader, TableLoader,
};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Builds a [`StockDataset`] from the sources described by a [`DatasetConfig`].
pub struct DatasetAssembler {
    config: DatasetConfig,
    loader: Box<dyn TableLoader>,
}

impl DatasetAssembler {
    /// Create an assembler reading tables through `loader`.
    pub fn new(config: DatasetConfig, loader: impl TableLoader + 'static) -> Self {
        Self {
            config,
            loader: Box::new(loader),
        }
    }

    /// Create an assembler reading Parquet and CSV files through DuckDB.
    pub fn with_duckdb(config: DatasetConfig) -> Self {
        Self::new(config, DuckDbLoader::new())
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Materialize the dataset according to the configured load strategy.
    pub fn open(&self) -> Result<StockDataset> {
        let cache = &self.config.cache;
        match self.config.load_strategy {
            LoadStrategy::FreshBuild => self.build(),
            LoadStrategy::LoadCache => StockDataset::load_cache(&cache.path, cache.format),
            LoadStrategy::BuildAndCache => {
                let dataset = self.build()?;
                dataset.save_cache(&cache.path, cache.format)?;
                Ok(dataset)
            }
        }
    }

    /// Read the configured catalog.
    pub fn catalog(&self) -> Result<Catalog> {
        Catalog::load(&self.config.catalog, self.loader.as_ref())
    }

    /// Build the dataset from source files, ignoring any cache.
    pub fn build(&self) -> Result<StockDataset> {
        let catalog = self.catalog()?;
        self.build_catalog(&catalog)
    }

    /// Build the dataset for an explicit catalog.
    pub fn build_catalog(&self, catalog: &Catalog) -> Result<StockDataset> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers as usize)
            .build()
            .map_err(|e| Error::config(format!("worker pool: {}", e)))?;

        let total = catalog.len();
        let done = AtomicUsize::new(0);
        info!(
            "Building samples for {} securities on {} workers",
            total,
            pool.current_num_threads()
        );

        let results: Vec<Result<SecuritySamples>> = pool.install(|| {
            catalog
                .securities()
                .par_iter()
                .map(|security| {
                    let result = self.process_security(security);
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    match &result {
                        Ok(samples) => info!(
                            "[{}/{}] {} {}: {} records",
                            n,
                            total,
                            security.code,
                            security.name,
                            samples.records.len()
                        ),
                        Err(Error::FileNotFound { path }) => debug!(
                            "[{}/{}] {}: skipped, {} not found",
                            n,
                            total,
                            security.code,
                            path.display()
                        ),
                        Err(e) => warn!("[{}/{}] {}: skipped, {}", n, total, security.code, e),
                    }
                    result
                })
                .collect()
        });

        let mut summary = BuildSummary {
            securities_total: total as u64,
            ..Default::default()
        };
        let mut records = Vec::new();
        for result in results {
            match result {
                Ok(samples) => {
                    summary.add_security(&samples);
                    records.extend(samples.records);
                }
                Err(e) if e.is_per_security() => summary.add_failure(&e),
                Err(e) => return Err(e),
            }
        }

        info!("Build complete: {}", summary);
        Ok(StockDataset::new(records, summary))
    }

    /// Run the full pipeline for one security.
    ///
    /// Both source files must exist; a missing one yields `FileNotFound`
    /// before anything is read.
    pub fn process_security(&self, security: &Security) -> Result<SecuritySamples> {
        let (daily_path, intraday_path) = self.source_paths(security);
        for path in [&daily_path, &intraday_path] {
            if !self.loader.exists(path) {
                return Err(Error::file_not_found(path.as_path()));
            }
        }

        let daily_bars = parse_daily(&self.loader.load(&daily_path)?, &self.config.daily.columns)?;
        let daily = DailyProcessor::new(self.config.start_date, self.config.end_date)
            .process(daily_bars)?;

        let mut intraday = parse_intraday(
            &self.loader.load(&intraday_path)?,
            &self.config.intraday.columns,
        )?;
        // Earlier history stays for the normalization window.
        intraday.truncate_after(self.config.end_date);

        let normalized = RollingNormalizer::new(self.config.normalize_window).normalize(&intraday);
        Ok(SampleBuilder::new(self.config.session).build(
            &security.code,
            &daily,
            &intraday,
            &normalized,
        ))
    }

    /// Source files referenced by the catalog that do not exist.
    pub fn missing_files(&self) -> Result<Vec<PathBuf>> {
        let catalog = self.catalog()?;
        let mut missing = Vec::new();
        for security in catalog.securities() {
            let (daily_path, intraday_path) = self.source_paths(security);
            for path in [daily_path, intraday_path] {
                if !self.loader.exists(&path) {
                    info!("{} {}: {} not found", security.code, security.name, path.display());
                    missing.push(path);
                }
            }
        }
        Ok(missing)
    }

    fn source_paths(&self, security: &Security) -> (PathBuf, PathBuf) {
        let daily = &self.config.daily;
        let intraday = &self.config.intraday;
        (
            resolve_path(&daily.root, &daily.file_pattern, security),
            resolve_path(&intraday.root, &intraday.file_pattern, security),
        )
    }
}
