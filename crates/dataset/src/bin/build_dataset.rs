//! Build (or load) the sample dataset described by a JSON config file.
//!
//! Usage: `build-dataset <config.json>`

use anyhow::{bail, Context};
use minute_core::DatasetConfig;
use minute_dataset::DatasetAssembler;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    setup_logging();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: build-dataset <config.json>");
    };

    let config = DatasetConfig::from_json_file(&config_path)
        .with_context(|| format!("loading config {}", config_path))?;
    info!(
        "Dataset {} to {} with window {} ({:?})",
        config.start_date, config.end_date, config.normalize_window, config.load_strategy
    );

    let assembler = DatasetAssembler::with_duckdb(config);
    let dataset = assembler.open().context("building dataset")?;

    match dataset.summary() {
        Some(summary) => info!("{}", summary),
        None => info!("Dataset loaded from cache"),
    }
    info!("{} samples ready", dataset.len());
    Ok(())
}
