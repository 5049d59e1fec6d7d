//! Sample cache persistence.
//!
//! A cache holds the full record collection in one file. Writes go to a
//! sibling temp file that is renamed into place once complete, so a reader
//! never sees a partial cache under the final name. Loads validate the
//! declared record count and every matrix shape; anything inconsistent is a
//! `CacheFormat` error.

use minute_core::{CacheFormat, Error, FeatureMatrix, Result, SampleRecord};
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const FORMAT_TAG: &str = "minute-dataset";
const FORMAT_VERSION: u32 = 1;

/// Bulk store for sample records.
pub trait RecordStore: Send + Sync {
    /// Persist every record, replacing any previous cache at `path`.
    fn save(&self, path: &Path, records: &[SampleRecord]) -> Result<()>;

    /// Restore every record saved at `path`.
    fn load(&self, path: &Path) -> Result<Vec<SampleRecord>>;
}

/// Store implementation for a cache format.
pub fn store_for(format: CacheFormat) -> Box<dyn RecordStore> {
    match format {
        CacheFormat::Sqlite => Box::new(SqliteStore),
        CacheFormat::JsonLines => Box::new(JsonLinesStore),
    }
}

fn corrupt(path: &Path, err: impl std::fmt::Display) -> Error {
    Error::cache_format(format!("{}: {}", path.display(), err))
}

/// `<path>.tmp` next to the final cache file.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Move a finished temp file over the final path.
fn commit(tmp: &Path, path: &Path) -> Result<()> {
    std::fs::rename(tmp, path)?;
    Ok(())
}

/// Remove a temp file left by a failed save, passing the save error through.
fn discard(tmp: &Path, err: Error) -> Error {
    if tmp.exists() {
        if let Err(e) = std::fs::remove_file(tmp) {
            warn!("Could not remove {}: {}", tmp.display(), e);
        }
    }
    err
}

/// SQLite-backed cache: one table row per record, matrix as an `f32` blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteStore;

impl SqliteStore {
    fn write(tmp: &Path, records: &[SampleRecord]) -> rusqlite::Result<()> {
        let mut conn = Connection::open(tmp)?;
        conn.execute_batch(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             CREATE TABLE records (
                 seq INTEGER PRIMARY KEY,
                 code TEXT NOT NULL,
                 date TEXT NOT NULL,
                 return_1 REAL NOT NULL,
                 return_2 REAL NOT NULL,
                 rows INTEGER NOT NULL,
                 cols INTEGER NOT NULL,
                 data BLOB NOT NULL
             );",
        )?;

        let tx = conn.transaction()?;
        {
            let mut meta = tx.prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")?;
            meta.execute(params!["format", FORMAT_TAG])?;
            meta.execute(params!["version", FORMAT_VERSION.to_string()])?;
            meta.execute(params!["records", records.len().to_string()])?;

            let mut insert = tx.prepare(
                "INSERT INTO records (seq, code, date, return_1, return_2, rows, cols, data)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for (seq, record) in records.iter().enumerate() {
                let matrix = &record.input_data;
                let blob: Vec<u8> = matrix
                    .as_slice()
                    .iter()
                    .flat_map(|v| v.to_le_bytes())
                    .collect();
                insert.execute(params![
                    seq as i64,
                    record.code,
                    record.date,
                    record.return_1,
                    record.return_2,
                    matrix.rows() as i64,
                    matrix.cols() as i64,
                    blob,
                ])?;
            }
        }
        tx.commit()
    }

    fn read(path: &Path) -> Result<Vec<SampleRecord>> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| corrupt(path, e))?;

        let meta = |key: &str| -> Result<String> {
            conn.query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| corrupt(path, format!("meta '{}': {}", key, e)))
        };
        if meta("format")? != FORMAT_TAG {
            return Err(corrupt(path, "not a sample cache"));
        }
        if meta("version")? != FORMAT_VERSION.to_string() {
            return Err(corrupt(path, "unsupported cache version"));
        }
        let expected: usize = meta("records")?
            .parse()
            .map_err(|e| corrupt(path, format!("record count: {}", e)))?;

        let mut stmt = conn
            .prepare(
                "SELECT code, date, return_1, return_2, rows, cols, data
                 FROM records ORDER BY seq",
            )
            .map_err(|e| corrupt(path, e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Vec<u8>>(6)?,
                ))
            })
            .map_err(|e| corrupt(path, e))?;

        let mut records = Vec::with_capacity(expected);
        for row in rows {
            let (code, date, return_1, return_2, n_rows, n_cols, blob) =
                row.map_err(|e| corrupt(path, e))?;
            let input_data = decode_matrix(n_rows, n_cols, &blob)
                .ok_or_else(|| corrupt(path, format!("bad matrix for {} {}", code, date)))?;
            records.push(SampleRecord {
                input_data,
                date,
                code,
                return_1,
                return_2,
            });
        }

        if records.len() != expected {
            return Err(corrupt(
                path,
                format!("expected {} records, found {}", expected, records.len()),
            ));
        }
        Ok(records)
    }
}

/// Rebuild a matrix from its little-endian `f32` blob.
fn decode_matrix(rows: i64, cols: i64, blob: &[u8]) -> Option<FeatureMatrix> {
    let rows = usize::try_from(rows).ok()?;
    let cols = usize::try_from(cols).ok()?;
    if blob.len() % 4 != 0 {
        return None;
    }
    let data = blob
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    FeatureMatrix::from_flat(rows, cols, data)
}

impl RecordStore for SqliteStore {
    fn save(&self, path: &Path, records: &[SampleRecord]) -> Result<()> {
        let tmp = temp_path(path);
        if tmp.exists() {
            std::fs::remove_file(&tmp)?;
        }
        Self::write(&tmp, records)
            .map_err(|e| Error::database(e.to_string()))
            .and_then(|()| commit(&tmp, path))
            .map_err(|e| discard(&tmp, e))?;
        info!("Saved {} records to {}", records.len(), path.display());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Vec<SampleRecord>> {
        let records = Self::read(path)?;
        info!("Loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }
}

/// First line of a JSON lines cache.
#[derive(Debug, Serialize, Deserialize)]
struct CacheHeader {
    format: String,
    version: u32,
    records: usize,
}

/// JSON lines cache: a header line, then one record per line.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesStore;

impl JsonLinesStore {
    fn write(tmp: &Path, records: &[SampleRecord]) -> Result<()> {
        let mut out = BufWriter::new(File::create(tmp)?);
        let header = CacheHeader {
            format: FORMAT_TAG.to_string(),
            version: FORMAT_VERSION,
            records: records.len(),
        };
        serde_json::to_writer(&mut out, &header)?;
        out.write_all(b"\n")?;
        for record in records {
            serde_json::to_writer(&mut out, record)?;
            out.write_all(b"\n")?;
        }
        let file = out.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }
}

impl RecordStore for JsonLinesStore {
    fn save(&self, path: &Path, records: &[SampleRecord]) -> Result<()> {
        let tmp = temp_path(path);
        Self::write(&tmp, records)
            .and_then(|()| commit(&tmp, path))
            .map_err(|e| discard(&tmp, e))?;
        info!("Saved {} records to {}", records.len(), path.display());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<Vec<SampleRecord>> {
        let file = File::open(path).map_err(|e| corrupt(path, e))?;
        let mut lines = BufReader::new(file).lines();

        let header_line = lines
            .next()
            .ok_or_else(|| corrupt(path, "empty cache"))?
            .map_err(|e| corrupt(path, e))?;
        let header: CacheHeader =
            serde_json::from_str(&header_line).map_err(|e| corrupt(path, e))?;
        if header.format != FORMAT_TAG || header.version != FORMAT_VERSION {
            return Err(corrupt(path, "not a sample cache"));
        }

        let mut records = Vec::with_capacity(header.records);
        for (n, line) in lines.enumerate() {
            let line = line.map_err(|e| corrupt(path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record: SampleRecord = serde_json::from_str(&line)
                .map_err(|e| corrupt(path, format!("line {}: {}", n + 2, e)))?;
            if !record.input_data.is_consistent() {
                return Err(corrupt(path, format!("line {}: bad matrix shape", n + 2)));
            }
            records.push(record);
        }

        if records.len() != header.records {
            return Err(corrupt(
                path,
                format!("expected {} records, found {}", header.records, records.len()),
            ));
        }
        info!("Loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }
}
