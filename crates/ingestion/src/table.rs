//! Tabular file loading.
//!
//! Every source table (catalog, daily, intraday) is read into a `RawTable` of
//! text cells. Typing is left to the series parsers so that a single bad cell
//! can be attributed to the row (and trading date) it belongs to.

use minute_core::{Error, Result};
use std::path::Path;
use tracing::debug;

/// A table of optional text cells with named columns.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Create a table. Rows shorter than the header are padded with nulls.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Convenience constructor from string literals; empty strings become nulls.
    pub fn from_strs(columns: &[&str], rows: &[&[&str]]) -> Self {
        Self::new(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
                        .collect()
                })
                .collect(),
        )
    }

    /// Column names in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of a column by exact name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a required column, or a `DataFormat` error naming it.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| {
            Error::data_format(format!(
                "missing column '{}' (found: {})",
                name,
                self.columns.join(", ")
            ))
        })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell text, trimmed; `None` for nulls and blank cells.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)?
            .get(col)?
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Source of tables keyed by file path.
pub trait TableLoader: Send + Sync {
    /// Load the whole table stored at `path`.
    fn load(&self, path: &Path) -> Result<RawTable>;

    /// Whether a table exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Table loader backed by an in-memory DuckDB connection.
///
/// Parquet files go through `read_parquet`, CSV files through `read_csv`
/// with every column read as text. Each load opens its own connection, so
/// the loader can be shared between worker threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbLoader;

impl DuckDbLoader {
    pub fn new() -> Self {
        Self
    }

    /// DuckDB table function reading `path`.
    fn source_expr(path: &Path) -> Result<String> {
        let literal = path.to_string_lossy().replace('\'', "''");
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "parquet" => Ok(format!("read_parquet('{}')", literal)),
            "csv" | "txt" => Ok(format!(
                "read_csv('{}', header = true, all_varchar = true)",
                literal
            )),
            other => Err(Error::data_format(format!(
                "unsupported table extension '{}' for {}",
                other,
                path.display()
            ))),
        }
    }

    fn query(path: &Path, source: &str) -> duckdb::Result<RawTable> {
        let conn = duckdb::Connection::open_in_memory()?;

        let mut columns = Vec::new();
        {
            let mut stmt = conn.prepare(&format!("DESCRIBE SELECT * FROM {}", source))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                columns.push(row.get::<_, String>(0)?);
            }
        }

        let select = columns
            .iter()
            .map(|c| format!("CAST({} AS VARCHAR)", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut data = Vec::new();
        if !columns.is_empty() {
            let mut stmt = conn.prepare(&format!("SELECT {} FROM {}", select, source))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let mut cells = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    cells.push(row.get::<_, Option<String>>(i)?);
                }
                data.push(cells);
            }
        }

        debug!(
            "Read {} rows x {} columns from {}",
            data.len(),
            columns.len(),
            path.display()
        );
        Ok(RawTable::new(columns, data))
    }
}

impl TableLoader for DuckDbLoader {
    fn load(&self, path: &Path) -> Result<RawTable> {
        if !self.exists(path) {
            return Err(Error::file_not_found(path));
        }
        let source = Self::source_expr(path)?;
        Self::query(path, &source)
            .map_err(|e| Error::data_format(format!("{}: {}", path.display(), e)))
    }
}

/// Quote a SQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
