//! Frontier ranking with min-max normalized weighted scores.
//!
//! # Scoring
//!
//! 1. Per criterion, min-max normalize the known values of the **whole**
//!    candidate set to `[0, 1]`, inverted for `minimize` so 1.0 is always
//!    best. Equal known values all normalize to 1.0; unknown is 0.0.
//! 2. `weighted_score = Σ weight × normalized`.
//!
//! # Ordering
//!
//! Items with no known value at all go last. Then score (desc), then each
//! positive-weight criterion in request order (best value first, unknown
//! last), then item key (asc). The result is the same for any input order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::dominance::compare_values;
use crate::models::{CandidateItem, Criterion, Direction, ScoredItem};

/// Per-criterion `(min, max)` of the known values; `None` when nothing is known.
pub fn value_bounds(items: &[CandidateItem], criteria: &[Criterion]) -> Vec<Option<(f64, f64)>> {
    (0..criteria.len())
        .map(|i| {
            items
                .iter()
                .filter_map(|it| it.values[i])
                .fold(None, |acc, v| match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
                })
        })
        .collect()
}

/// Direction-applied min-max normalization of a single value.
pub fn normalize_value(value: Option<f64>, bounds: Option<(f64, f64)>, criterion: &Criterion) -> f64 {
    let (v, (lo, hi)) = match (value, bounds) {
        (Some(v), Some(b)) => (v, b),
        _ => return 0.0,
    };
    if (hi - lo).abs() < f64::EPSILON {
        return 1.0;
    }
    let scaled = position_in(v, lo, hi);
    match criterion.direction {
        Direction::Maximize => scaled,
        Direction::Minimize => 1.0 - scaled,
    }
}

/// `(v - lo) / (hi - lo)` clamped to `[0, 1]`. Bounds far enough apart to
/// overflow the span are scaled down by half first.
fn position_in(v: f64, lo: f64, hi: f64) -> f64 {
    let span = hi - lo;
    let scaled = if span.is_finite() {
        (v - lo) / span
    } else {
        (v / 2.0 - lo / 2.0) / (hi / 2.0 - lo / 2.0)
    };
    if scaled.is_nan() {
        return 0.0;
    }
    scaled.clamp(0.0, 1.0)
}

/// Builds one [`ScoredItem`] per candidate, in input order.
///
/// Frontier membership, dominators, and rank are left for the caller.
pub fn score_items(items: &[CandidateItem], criteria: &[Criterion]) -> Vec<ScoredItem> {
    let bounds = value_bounds(items, criteria);

    items
        .iter()
        .map(|it| {
            let mut values = BTreeMap::new();
            let mut normalized = BTreeMap::new();
            let mut score = 0.0;

            for (i, c) in criteria.iter().enumerate() {
                let norm = normalize_value(it.values[i], bounds[i], c);
                score += c.weight * norm;
                values.insert(c.attribute.clone(), it.values[i]);
                normalized.insert(c.attribute.clone(), norm);
            }

            ScoredItem {
                item: it.info.clone(),
                values,
                normalized,
                weighted_score: score,
                pareto_optimal: false,
                rank: None,
                dominated_by: Vec::new(),
            }
        })
        .collect()
}

/// Orders scored items deterministically. `criteria` must be in the
/// request's original order.
pub fn rank(mut items: Vec<ScoredItem>, criteria: &[Criterion]) -> Vec<ScoredItem> {
    items.sort_by(|a, b| compare_ranked(a, b, criteria));
    items
}

fn compare_ranked(a: &ScoredItem, b: &ScoredItem, criteria: &[Criterion]) -> Ordering {
    has_any_value(b)
        .cmp(&has_any_value(a))
        .then_with(|| b.weighted_score.total_cmp(&a.weighted_score))
        .then_with(|| {
            criteria
                .iter()
                .filter(|c| c.is_active())
                .map(|c| {
                    let va = a.values.get(&c.attribute).copied().flatten();
                    let vb = b.values.get(&c.attribute).copied().flatten();
                    compare_values(vb, va, c.direction)
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.item.key.cmp(&b.item.key))
}

fn has_any_value(item: &ScoredItem) -> bool {
    item.values.values().any(Option::is_some)
}
