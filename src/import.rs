//! `pareto import`: load catalog records from a JSON file into SQLite.
//!
//! The file holds a JSON array of records in the same shape the catalog
//! returns (`product`, optional `variant`, `offers`). Each record replaces
//! the stored offer set of its product/variant pair.

use anyhow::{Context, Result};
use std::path::Path;

use pareto_core::models::CandidateRecord;

use crate::config::Config;
use crate::sqlite_catalog;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub records: usize,
    pub offers: usize,
}

pub fn read_records(path: &Path) -> Result<Vec<CandidateRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse import file: {}", path.display()))
}

pub async fn import_records(config: &Config, records: &[CandidateRecord]) -> Result<ImportStats> {
    let catalog = sqlite_catalog::open(config).await?;
    let mut stats = ImportStats::default();

    for record in records {
        if record.product.id.trim().is_empty() {
            anyhow::bail!("record #{} has an empty product id", stats.records + 1);
        }
        catalog.upsert_record(record).await.with_context(|| {
            format!("Failed to import product {}", record.product.id)
        })?;
        stats.records += 1;
        stats.offers += record.offers.len();
    }

    tracing::info!(records = stats.records, offers = stats.offers, "import finished");
    Ok(stats)
}

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let records = read_records(path)?;
    let stats = import_records(config, &records).await?;
    println!(
        "imported products: {}, offers: {}",
        stats.records, stats.offers
    );
    Ok(())
}
