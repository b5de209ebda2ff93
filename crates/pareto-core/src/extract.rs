//! Criterion extraction: candidate → one optional number per criterion.
//!
//! Attribute lookup is a capability map from attribute name to a resolver
//! function. Price-domain attributes resolve from the selected offer; every
//! other name falls through to the variant's attributes and then the
//! product's. Missing, unparseable, or non-finite values resolve to `None`
//! ("unknown"), never to zero or infinity.
//!
//! # Built-in resolvers
//!
//! | Attribute | Value |
//! |-----------|-------|
//! | `price` | offer price |
//! | `totalPrice`, `total_price` | offer price + shipping (missing shipping = 0) |
//! | `shipping` | offer shipping |
//! | `discount`, `discountPercent` | `(originalPrice - price) / originalPrice × 100` |

use std::collections::HashMap;

use serde_json::Value;

use crate::models::{Candidate, CandidateItem, Criterion};

/// Resolves one attribute of a candidate.
pub type Resolver = fn(&Candidate) -> Option<f64>;

/// Name → resolver map with a generic attribute fallback.
#[derive(Clone)]
pub struct Extractor {
    resolvers: HashMap<String, Resolver>,
}

impl Extractor {
    /// An extractor with no named resolvers; every attribute uses the
    /// variant/product fallback.
    pub fn new() -> Self {
        Self {
            resolvers: HashMap::new(),
        }
    }

    /// An extractor with the price-domain resolvers registered.
    pub fn with_builtins() -> Self {
        let mut extractor = Self::new();
        extractor.register("price", resolve_price);
        extractor.register("totalPrice", resolve_total_price);
        extractor.register("total_price", resolve_total_price);
        extractor.register("shipping", resolve_shipping);
        extractor.register("discount", resolve_discount);
        extractor.register("discountPercent", resolve_discount);
        extractor
    }

    /// Registers (or replaces) the resolver for an attribute name.
    pub fn register(&mut self, name: impl Into<String>, resolver: Resolver) {
        self.resolvers.insert(name.into(), resolver);
    }

    pub fn resolve(&self, candidate: &Candidate, attribute: &str) -> Option<f64> {
        let value = match self.resolvers.get(attribute) {
            Some(resolver) => resolver(candidate),
            None => lookup_attribute(candidate, attribute),
        };
        value.filter(|v| v.is_finite())
    }

    /// Resolves every criterion for one candidate. Pure; the candidate is not modified.
    pub fn extract(&self, candidate: &Candidate, criteria: &[Criterion]) -> CandidateItem {
        CandidateItem {
            info: candidate.info(),
            values: criteria
                .iter()
                .map(|c| self.resolve(candidate, &c.attribute))
                .collect(),
        }
    }

    pub fn extract_all(&self, candidates: &[Candidate], criteria: &[Criterion]) -> Vec<CandidateItem> {
        candidates
            .iter()
            .map(|c| self.extract(c, criteria))
            .collect()
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn resolve_price(c: &Candidate) -> Option<f64> {
    c.offer.as_ref().map(|o| o.price)
}

fn resolve_total_price(c: &Candidate) -> Option<f64> {
    c.offer.as_ref().map(|o| o.total_price())
}

fn resolve_shipping(c: &Candidate) -> Option<f64> {
    c.offer.as_ref().and_then(|o| o.shipping)
}

fn resolve_discount(c: &Candidate) -> Option<f64> {
    let offer = c.offer.as_ref()?;
    let original = offer.original_price?;
    if original <= 0.0 {
        return None;
    }
    Some((original - offer.price) / original * 100.0)
}

/// Variant attributes shadow product attributes.
fn lookup_attribute(c: &Candidate, attribute: &str) -> Option<f64> {
    c.variant
        .as_ref()
        .and_then(|v| v.attributes.get(attribute))
        .or_else(|| c.product.attributes.get(attribute))
        .and_then(parse_numeric)
}

/// Interprets a catalog attribute value as a number.
pub fn parse_numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_quantity(s),
        _ => None,
    }
}

/// Parses a leading number with an optional unit suffix.
///
/// Data sizes are scaled to gigabytes (`"1TB"` → 1024, `"512 MB"` → 0.5);
/// other suffixes (`mAh`, `"`, `MP`, `EUR`) are ignored. Leading currency
/// symbols are skipped.
///
/// Thousands grouping by space, NBSP, `,` or `.` is accepted when every
/// group has three digits (`"12,345"`, `"1 299"`, `"1.299,99"`). A single
/// `,` not followed by exactly three digits is a decimal comma. Separators
/// that fit neither reading (`"1,2,3"`) give `None` rather than a guess.
pub fn parse_quantity(raw: &str) -> Option<f64> {
    let s = raw
        .trim()
        .trim_start_matches(|ch: char| CURRENCY_SYMBOLS.contains(&ch) || ch.is_whitespace());
    let (sign, s) = match s.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, s.strip_prefix('+').unwrap_or(s)),
    };

    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut digits = String::new();
    let mut split = s.len();
    for (n, &(i, ch)) in chars.iter().enumerate() {
        if ch.is_ascii_digit() || ch == '.' || ch == ',' {
            digits.push(ch);
        } else if is_group_space(ch)
            && digits.ends_with(|d: char| d.is_ascii_digit())
            && starts_with_group(&chars[n + 1..])
        {
            digits.push(' ');
        } else {
            split = i;
            break;
        }
    }

    let number = parse_grouped(&digits)?;

    let unit = s[split..].trim().to_ascii_uppercase();
    let scale = if unit.starts_with("TB") {
        1024.0
    } else if unit.starts_with("GB") {
        1.0
    } else if unit.starts_with("MB") {
        1.0 / 1024.0
    } else if unit.starts_with("KB") {
        1.0 / (1024.0 * 1024.0)
    } else {
        1.0
    };

    Some(sign * number * scale).filter(|v| v.is_finite())
}

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

fn is_group_space(ch: char) -> bool {
    matches!(ch, ' ' | '\u{a0}' | '\u{202f}')
}

/// Exactly three digits, then something that is not a digit.
fn starts_with_group(rest: &[(usize, char)]) -> bool {
    rest.len() >= 3
        && rest[..3].iter().all(|(_, ch)| ch.is_ascii_digit())
        && rest.get(3).map_or(true, |(_, ch)| !ch.is_ascii_digit())
}

/// `1..=3` leading digits followed by groups of exactly three.
fn is_grouped(s: &str, separator: char) -> bool {
    let mut parts = s.split(separator);
    let head_ok = parts
        .next()
        .is_some_and(|p| (1..=3).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit()));
    head_ok && parts.all(|p| p.len() == 3 && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Resolves grouping and decimal separators in a run of digits, `.`, `,` and
/// group spaces (already checked to precede three-digit groups).
fn parse_grouped(digits: &str) -> Option<f64> {
    let digits = digits.replace(' ', "");
    if !digits.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }

    let normalized = match (digits.rfind('.'), digits.rfind(',')) {
        (None, None) => digits,
        // Both present: the last one is the decimal separator.
        (Some(dot), Some(comma)) => {
            let group = if dot > comma { ',' } else { '.' };
            let (int, frac) = digits.split_at(dot.max(comma));
            let frac = &frac[1..];
            if frac.contains(['.', ',']) || !is_grouped(int, group) {
                return None;
            }
            format!("{}.{}", int.replace(group, ""), frac)
        }
        (Some(_), None) => {
            if digits.matches('.').count() == 1 {
                digits
            } else if is_grouped(&digits, '.') {
                digits.replace('.', "")
            } else {
                return None;
            }
        }
        (None, Some(comma)) => {
            if digits.matches(',').count() > 1 {
                if !is_grouped(&digits, ',') {
                    return None;
                }
                digits.replace(',', "")
            } else if is_grouped(&digits, ',') && !digits.starts_with("0,") {
                digits.replace(',', "")
            } else {
                let (int, frac) = digits.split_at(comma);
                format!("{}.{}", int, &frac[1..])
            }
        }
    };

    normalized.parse().ok()
}
