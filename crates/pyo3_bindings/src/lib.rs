//! PyO3 bindings for the minute-dataset pipeline.
//!
//! Exposes the sample dataset to Python as an indexable sequence:
//! - `StockDataset(config_path)` builds or loads samples per the config
//! - `len(ds)` and `ds[i]` (negative indices allowed)
//! - `SampleRecord` with the normalized matrix and both labels

use std::path::PathBuf;

use pyo3::exceptions::{PyFileNotFoundError, PyIndexError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use dataset::{DatasetAssembler, StockDataset as RustStockDataset};
use minute_core::{
    CacheFormat, DatasetConfig, Error as RustError, SampleRecord as RustSampleRecord,
};

fn to_py_err(err: RustError) -> PyErr {
    match err {
        RustError::IndexOutOfRange { .. } => PyIndexError::new_err(err.to_string()),
        RustError::FileNotFound { .. } => PyFileNotFoundError::new_err(err.to_string()),
        RustError::Config(_) | RustError::Json(_) | RustError::CacheFormat(_) => {
            PyValueError::new_err(err.to_string())
        }
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn parse_format(format: &str) -> PyResult<CacheFormat> {
    format.parse().map_err(to_py_err)
}

// ============================================================================
// Python-exposed Types
// ============================================================================

/// One training sample: a session of normalized minute bars and its labels.
#[pyclass(name = "SampleRecord")]
#[derive(Clone)]
pub struct SampleRecord {
    inner: RustSampleRecord,
}

#[pymethods]
impl SampleRecord {
    /// Feature matrix as a list of rows, columns
    /// `[open_N, high_N, low_N, close_N, volume_N, turnover_N]`.
    #[getter]
    fn input_data(&self) -> Vec<Vec<f32>> {
        self.inner
            .input_data
            .iter_rows()
            .map(|row| row.to_vec())
            .collect()
    }

    /// `(rows, cols)` of the feature matrix.
    #[getter]
    fn shape(&self) -> (usize, usize) {
        self.inner.input_data.shape()
    }

    #[getter]
    fn date(&self) -> String {
        self.inner.date.clone()
    }

    #[getter]
    fn code(&self) -> String {
        self.inner.code.clone()
    }

    #[getter]
    fn return_1(&self) -> f64 {
        self.inner.return_1
    }

    #[getter]
    fn return_2(&self) -> f64 {
        self.inner.return_2
    }

    fn __repr__(&self) -> String {
        let (rows, cols) = self.inner.input_data.shape();
        format!(
            "SampleRecord(code={}, date={}, shape=({}, {}), return_1={:.6}, return_2={:.6})",
            self.inner.code, self.inner.date, rows, cols, self.inner.return_1, self.inner.return_2
        )
    }
}

impl From<RustSampleRecord> for SampleRecord {
    fn from(inner: RustSampleRecord) -> Self {
        SampleRecord { inner }
    }
}

// ============================================================================
// Dataset
// ============================================================================

/// Indexable collection of samples.
#[pyclass(name = "StockDataset")]
pub struct PyStockDataset {
    inner: RustStockDataset,
}

#[pymethods]
impl PyStockDataset {
    /// Build or load the dataset described by a JSON config file.
    ///
    /// The GIL is released while sources are read and processed.
    #[new]
    fn new(py: Python<'_>, config_path: PathBuf) -> PyResult<Self> {
        let config = DatasetConfig::from_json_file(&config_path).map_err(to_py_err)?;
        let inner = py
            .allow_threads(move || DatasetAssembler::with_duckdb(config).open())
            .map_err(to_py_err)?;
        Ok(PyStockDataset { inner })
    }

    /// Load a dataset from a cache file without reading any source.
    #[staticmethod]
    #[pyo3(signature = (path, format = "sqlite"))]
    fn load_cache(py: Python<'_>, path: PathBuf, format: &str) -> PyResult<Self> {
        let format = parse_format(format)?;
        let inner = py
            .allow_threads(move || RustStockDataset::load_cache(&path, format))
            .map_err(to_py_err)?;
        Ok(PyStockDataset { inner })
    }

    /// Write every record to a cache file.
    #[pyo3(signature = (path, format = "sqlite"))]
    fn save_cache(&self, path: PathBuf, format: &str) -> PyResult<()> {
        let format = parse_format(format)?;
        self.inner.save_cache(&path, format).map_err(to_py_err)
    }

    /// Build summary, or `None` when loaded from a cache.
    #[getter]
    fn summary(&self) -> Option<String> {
        self.inner.summary().map(|s| s.to_string())
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __getitem__(&self, index: isize) -> PyResult<SampleRecord> {
        let len = self.inner.len();
        let resolved = if index < 0 {
            index + len as isize
        } else {
            index
        };
        if resolved < 0 {
            return Err(PyIndexError::new_err(format!(
                "Index {} out of range for dataset of length {}",
                index, len
            )));
        }
        self.inner
            .get(resolved as usize)
            .map(|record| record.clone().into())
            .map_err(to_py_err)
    }

    fn __repr__(&self) -> String {
        format!("StockDataset(len={})", self.inner.len())
    }
}

// ============================================================================
// Module Definition
// ============================================================================

/// Minute-level stock sample dataset backed by Rust.
#[pymodule]
fn minute_dataset(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<SampleRecord>()?;
    m.add_class::<PyStockDataset>()?;
    Ok(())
}
