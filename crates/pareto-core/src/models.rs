//! Core data models used throughout Pareto Compare.
//!
//! Request types ([`ComparisonRequest`], [`Criterion`], [`Filters`]) arrive
//! from the HTTP boundary as camelCase JSON. Catalog types
//! ([`CandidateRecord`] and its parts) are what the catalog collaborator
//! supplies. Result types ([`ScoredItem`], [`ComparisonResult`]) are produced
//! once per comparison and never mutated afterwards.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form attribute bag as stored in the catalog (`"storage": "128GB"`).
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Whether lower or higher values of a criterion are preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// Compares two known values; `Greater` means `a` is better than `b`.
    pub fn prefer(self, a: f64, b: f64) -> Ordering {
        match self {
            Direction::Minimize => b.total_cmp(&a),
            Direction::Maximize => a.total_cmp(&b),
        }
    }
}

/// One attribute to optimize, with its weight and direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub attribute: String,
    pub weight: f64,
    pub direction: Direction,
}

impl Criterion {
    pub fn new(attribute: impl Into<String>, weight: f64, direction: Direction) -> Self {
        Self {
            attribute: attribute.into(),
            weight,
            direction,
        }
    }

    /// Zero-weight criteria take no part in dominance.
    pub fn is_active(&self) -> bool {
        self.weight > 0.0
    }
}

/// Optional narrowing of the candidate set, applied before extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filters {
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub retailers: Vec<String>,
    pub brands: Vec<String>,
    pub in_stock_only: bool,
    /// Attribute equality constraints, matched against variant attributes
    /// first and product attributes second.
    pub attributes: Attributes,
}

impl Filters {
    /// True when any filter operates on individual offers rather than products.
    pub fn has_offer_filters(&self) -> bool {
        self.in_stock_only
            || !self.retailers.is_empty()
            || self.min_price.is_some()
            || self.max_price.is_some()
    }
}

/// An inbound comparison request.
///
/// The order of `criteria` is the ranking tie-break priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRequest {
    pub category_id: String,
    pub criteria: Vec<Criterion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

// ============ Catalog records ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category_id: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

/// A purchasable configuration of a product (e.g. 256GB / blue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

/// A retailer's current price for a product or variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: String,
    pub retailer_id: String,
    pub price: f64,
    #[serde(default)]
    pub shipping: Option<f64>,
    /// List price before discount, when the retailer advertises one.
    #[serde(default)]
    pub original_price: Option<f64>,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

fn default_in_stock() -> bool {
    true
}

impl Offer {
    /// Shipping-inclusive price; missing shipping counts as free.
    pub fn total_price(&self) -> f64 {
        self.price + self.shipping.unwrap_or(0.0)
    }
}

/// What the catalog collaborator returns: a product (or variant) and all its offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub product: Product,
    #[serde(default)]
    pub variant: Option<Variant>,
    #[serde(default)]
    pub offers: Vec<Offer>,
}

/// A record that survived pre-filtering, with its selected best offer.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub product: Product,
    pub variant: Option<Variant>,
    pub offer: Option<Offer>,
}

impl Candidate {
    /// Stable identifier: `product_id` or `product_id/variant_id`.
    pub fn key(&self) -> String {
        match &self.variant {
            Some(v) => format!("{}/{}", self.product.id, v.id),
            None => self.product.id.clone(),
        }
    }

    pub fn info(&self) -> ItemInfo {
        ItemInfo {
            key: self.key(),
            product_id: self.product.id.clone(),
            variant_id: self.variant.as_ref().map(|v| v.id.clone()),
            offer_id: self.offer.as_ref().map(|o| o.id.clone()),
            retailer_id: self.offer.as_ref().map(|o| o.retailer_id.clone()),
            name: self.product.name.clone(),
            brand: self.product.brand.clone(),
        }
    }
}

// ============ Engine inputs and outputs ============

/// Identity and display fields of a compared item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemInfo {
    pub key: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub offer_id: Option<String>,
    pub retailer_id: Option<String>,
    pub name: String,
    pub brand: Option<String>,
}

/// An extracted candidate: identity plus one resolved value per criterion,
/// positionally aligned with the request's criteria. `None` is "unknown".
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateItem {
    pub info: ItemInfo,
    pub values: Vec<Option<f64>>,
}

impl CandidateItem {
    pub fn key(&self) -> &str {
        &self.info.key
    }

    pub fn has_any_value(&self) -> bool {
        self.values.iter().any(Option::is_some)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem {
    pub item: ItemInfo,
    /// Raw resolved values by attribute; `null` when unknown.
    pub values: BTreeMap<String, Option<f64>>,
    /// Direction-applied min-max values in `[0, 1]`, 1.0 being best.
    pub normalized: BTreeMap<String, f64>,
    pub weighted_score: f64,
    pub pareto_optimal: bool,
    /// 1-based position on the ranked frontier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<usize>,
    /// Keys of frontier items that dominate this one.
    #[serde(default)]
    pub dominated_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub criteria: Vec<Criterion>,
    pub pareto_frontier: Vec<ScoredItem>,
    pub dominated: Vec<ScoredItem>,
    pub total_candidates: usize,
    /// True when the dominated list was capped.
    pub truncated: bool,
    pub computed_at: DateTime<Utc>,
}
