//! In-memory [`Catalog`] implementation for testing and embedding.
//!
//! Records live in a `Vec` behind `std::sync::RwLock`. Inserting a record
//! with an existing product/variant key replaces it.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{CandidateRecord, Filters};

use super::Catalog;

pub struct InMemoryCatalog {
    records: RwLock<Vec<CandidateRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn with_records(records: Vec<CandidateRecord>) -> Self {
        let catalog = Self::new();
        for record in records {
            catalog.upsert(record);
        }
        catalog
    }

    pub fn upsert(&self, record: CandidateRecord) {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let key = record_key(&record);
        records.retain(|r| record_key(r) != key);
        records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn record_key(record: &CandidateRecord) -> (String, Option<String>) {
    (
        record.product.id.clone(),
        record.variant.as_ref().map(|v| v.id.clone()),
    )
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn fetch_candidates(
        &self,
        category_id: &str,
        _filters: &Filters,
    ) -> Result<Vec<CandidateRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("catalog lock poisoned"))?;
        Ok(records
            .iter()
            .filter(|r| r.product.category_id == category_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Attributes, Product, Variant};

    fn record(id: &str, category: &str, variant: Option<&str>) -> CandidateRecord {
        CandidateRecord {
            product: Product {
                id: id.to_string(),
                name: id.to_string(),
                category_id: category.to_string(),
                brand: None,
                attributes: Attributes::new(),
            },
            variant: variant.map(|v| Variant {
                id: v.to_string(),
                attributes: Attributes::new(),
            }),
            offers: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_fetch_by_category() {
        let catalog = InMemoryCatalog::with_records(vec![
            record("p1", "phones", None),
            record("p2", "laptops", None),
            record("p3", "phones", None),
        ]);
        let out = catalog
            .fetch_candidates("phones", &Filters::default())
            .await
            .unwrap();
        let ids: Vec<&str> = out.iter().map(|r| r.product.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p3"]);
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_key() {
        let catalog = InMemoryCatalog::new();
        catalog.upsert(record("p1", "phones", Some("128")));
        catalog.upsert(record("p1", "phones", Some("256")));
        catalog.upsert(record("p1", "phones", Some("128")));
        assert_eq!(catalog.len(), 2);
    }
}
