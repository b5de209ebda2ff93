//! Candidate pre-filtering and best-offer selection.
//!
//! Runs before extraction so that brand, stock, retailer, and price-bound
//! filters shrink the candidate set the engine has to look at.
//!
//! # Rules
//!
//! - `brands` keeps records whose product brand is in the allow-list.
//! - `attributes` keeps records whose variant (else product) attribute equals
//!   every requested value. Numbers compare numerically, so `128` matches
//!   `"128GB"`; strings and booleans compare exactly.
//! - `inStockOnly`, `retailers`, `minPrice`, `maxPrice` discard offers.
//! - The best surviving offer (lowest shipping-inclusive total, then retailer
//!   id, then offer id) becomes the candidate's selected offer.
//! - With an offer-level filter active, records with no surviving offer are
//!   dropped; otherwise a record without offers is kept with no offer.

use std::cmp::Ordering;

use serde_json::Value;

use crate::extract::parse_numeric;
use crate::models::{Candidate, CandidateRecord, Filters, Offer};

pub fn select_candidates(records: Vec<CandidateRecord>, filters: &Filters) -> Vec<Candidate> {
    let offer_filtered = filters.has_offer_filters();

    records
        .into_iter()
        .filter(|r| brand_allowed(r, filters))
        .filter(|r| attributes_match(r, filters))
        .filter_map(|record| {
            let best = record
                .offers
                .iter()
                .filter(|o| offer_allowed(o, filters))
                .min_by(|a, b| compare_offers(a, b))
                .cloned();

            if best.is_none() && (offer_filtered || !record.offers.is_empty()) {
                return None;
            }

            Some(Candidate {
                product: record.product,
                variant: record.variant,
                offer: best,
            })
        })
        .collect()
}

fn brand_allowed(record: &CandidateRecord, filters: &Filters) -> bool {
    if filters.brands.is_empty() {
        return true;
    }
    match &record.product.brand {
        Some(brand) => filters.brands.iter().any(|b| b == brand),
        None => false,
    }
}

fn attributes_match(record: &CandidateRecord, filters: &Filters) -> bool {
    filters.attributes.iter().all(|(name, expected)| {
        record
            .variant
            .as_ref()
            .and_then(|v| v.attributes.get(name))
            .or_else(|| record.product.attributes.get(name))
            .is_some_and(|actual| attribute_equals(actual, expected))
    })
}

fn attribute_equals(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Number(n) => match (n.as_f64(), parse_numeric(actual)) {
            (Some(want), Some(got)) => want == got,
            _ => false,
        },
        Value::String(want) => actual.as_str() == Some(want.as_str()),
        Value::Bool(want) => actual.as_bool() == Some(*want),
        _ => false,
    }
}

fn offer_allowed(offer: &Offer, filters: &Filters) -> bool {
    if !offer.price.is_finite() {
        return false;
    }
    if filters.in_stock_only && !offer.in_stock {
        return false;
    }
    if !filters.retailers.is_empty() && !filters.retailers.contains(&offer.retailer_id) {
        return false;
    }
    if let Some(min) = filters.min_price {
        if offer.price < min {
            return false;
        }
    }
    if let Some(max) = filters.max_price {
        if offer.price > max {
            return false;
        }
    }
    true
}

fn compare_offers(a: &Offer, b: &Offer) -> Ordering {
    a.total_price()
        .total_cmp(&b.total_price())
        .then_with(|| a.retailer_id.cmp(&b.retailer_id))
        .then_with(|| a.id.cmp(&b.id))
}
