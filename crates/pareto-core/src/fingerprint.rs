//! Request fingerprinting for the comparison cache.
//!
//! The fingerprint is the SHA-256 of a canonical JSON form of the request:
//! criteria sorted by attribute name, retailer and brand sets sorted and
//! deduplicated, absent filters treated as default filters. Two requests
//! that differ only in field order therefore share a cache entry.
//!
//! Cache keys embed the category (`{prefix}{category}:{digest}`) so that all
//! comparisons of a category can be invalidated by key prefix.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::{ComparisonRequest, Criterion, Filters};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub category_id: String,
    /// Lowercase hex SHA-256 of the canonical request.
    pub digest: String,
}

#[derive(Serialize)]
struct CanonicalRequest<'a> {
    category_id: &'a str,
    criteria: Vec<&'a Criterion>,
    filters: CanonicalFilters<'a>,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct CanonicalFilters<'a> {
    min_price: Option<f64>,
    max_price: Option<f64>,
    retailers: Vec<&'a str>,
    brands: Vec<&'a str>,
    in_stock_only: bool,
    attributes: BTreeMap<&'a str, Value>,
}

fn sorted_set(values: &[String]) -> Vec<&str> {
    let mut out: Vec<&str> = values.iter().map(String::as_str).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Attribute constraints by name, numbers as floats so `128` and `128.0`
/// hash alike.
fn canonical_attributes(filters: &Filters) -> BTreeMap<&str, Value> {
    filters
        .attributes
        .iter()
        .map(|(name, value)| {
            let value = match value.as_f64() {
                Some(n) => Value::from(n),
                None => value.clone(),
            };
            (name.as_str(), value)
        })
        .collect()
}

impl Fingerprint {
    pub fn of(request: &ComparisonRequest) -> Self {
        let default_filters = Filters::default();
        let filters = request.filters.as_ref().unwrap_or(&default_filters);
        let category_id = request.category_id.trim();

        let mut criteria: Vec<&Criterion> = request.criteria.iter().collect();
        criteria.sort_by(|a, b| a.attribute.cmp(&b.attribute));

        let canonical = CanonicalRequest {
            category_id,
            criteria,
            filters: CanonicalFilters {
                min_price: filters.min_price,
                max_price: filters.max_price,
                retailers: sorted_set(&filters.retailers),
                brands: sorted_set(&filters.brands),
                in_stock_only: filters.in_stock_only,
                attributes: canonical_attributes(filters),
            },
            limit: request.limit,
        };

        // Serializing plain structs, strings, and numbers cannot fail.
        let json = serde_json::to_string(&canonical).unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());

        Self {
            category_id: category_id.to_string(),
            digest: format!("{:x}", hasher.finalize()),
        }
    }

    pub fn cache_key(&self, prefix: &str) -> String {
        format!("{}{}", category_prefix(prefix, &self.category_id), self.digest)
    }
}

/// Separates the category from the digest in cache keys. Category ids may
/// not contain it, or one category's prefix could match another's keys.
pub const KEY_SEPARATOR: char = ':';

/// Key prefix shared by every cached comparison of a category.
pub fn category_prefix(prefix: &str, category_id: &str) -> String {
    format!("{}{}{}", prefix, category_id.trim(), KEY_SEPARATOR)
}
