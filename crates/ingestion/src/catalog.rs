//! Security catalog.
//!
//! Maps security codes to display names and resolves per-security file paths.

use crate::table::{RawTable, TableLoader};
use minute_core::{CatalogConfig, Error, Result, Security};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Ordered list of securities to process.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    securities: Vec<Security>,
}

impl Catalog {
    /// Build a catalog from an explicit list, keeping the first of any duplicate code.
    pub fn from_securities(securities: impl IntoIterator<Item = Security>) -> Self {
        let mut seen = HashSet::new();
        let securities = securities
            .into_iter()
            .filter(|s| {
                let fresh = seen.insert(s.code.clone());
                if !fresh {
                    warn!("Duplicate security code {} in catalog", s.code);
                }
                fresh
            })
            .collect();
        Self { securities }
    }

    /// Read the catalog file described by `config`.
    ///
    /// Any failure here is fatal to a build, so every error is reported as
    /// `Error::Catalog`.
    pub fn load(config: &CatalogConfig, loader: &dyn TableLoader) -> Result<Self> {
        let table = loader
            .load(&config.path)
            .map_err(|e| Error::catalog(format!("{}: {}", config.path.display(), e)))?;
        let catalog = Self::from_table(&table, config)?;
        info!(
            "Loaded {} securities from {}",
            catalog.len(),
            config.path.display()
        );
        Ok(catalog)
    }

    /// Extract securities from an already loaded table.
    pub fn from_table(table: &RawTable, config: &CatalogConfig) -> Result<Self> {
        let code_col = table
            .column_index(&config.code_column)
            .ok_or_else(|| Error::catalog(format!("missing code column '{}'", config.code_column)))?;
        let name_col = match &config.name_column {
            Some(name) => Some(
                table
                    .column_index(name)
                    .ok_or_else(|| Error::catalog(format!("missing name column '{}'", name)))?,
            ),
            None => None,
        };

        let securities = (0..table.len()).filter_map(|row| {
            let code = table.cell(row, code_col)?;
            let name = name_col
                .and_then(|col| table.cell(row, col))
                .unwrap_or_default();
            Some(Security::new(code, name))
        });

        let mut catalog = Self::from_securities(securities);
        if let Some(limit) = config.limit {
            catalog.securities.truncate(limit);
        }
        Ok(catalog)
    }

    /// Securities in catalog order.
    pub fn securities(&self) -> &[Security] {
        &self.securities
    }

    /// Look up a security by code.
    pub fn get(&self, code: &str) -> Option<&Security> {
        self.securities.iter().find(|s| s.code == code)
    }

    /// Number of securities.
    pub fn len(&self) -> usize {
        self.securities.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }
}

/// Resolve a security's file under `root` from a `{code}`/`{name}` template.
///
/// Whitespace is removed from the display name before substitution.
pub fn resolve_path(root: &Path, pattern: &str, security: &Security) -> PathBuf {
    let name: String = security.name.chars().filter(|c| !c.is_whitespace()).collect();
    let file_name = pattern
        .replace("{code}", &security.code)
        .replace("{name}", &name);
    root.join(file_name)
}
