//! Comparison orchestrator.
//!
//! [`Comparator::compare`] validates a request, fingerprints it, and goes
//! through the single-flight cache. On a miss it fetches the category from
//! the [`Catalog`], pre-filters, extracts criterion values, and runs the
//! dominance/ranking engine on a blocking worker.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use pareto_core::cache_store::memory::InMemoryCacheStore;
use pareto_core::catalog::Catalog;
use pareto_core::engine::{self, EngineOptions};
use pareto_core::error::{CompareError, CompareResult};
use pareto_core::extract::Extractor;
use pareto_core::filter::select_candidates;
use pareto_core::fingerprint::{Fingerprint, KEY_SEPARATOR};
use pareto_core::models::{ComparisonRequest, ComparisonResult, Criterion, ScoredItem};

use crate::cache::{ComparisonCache, Lookup};
use crate::config::Config;

pub const MAX_CRITERIA: usize = 10;
pub const MAX_LIMIT: usize = 100;

/// Body of a successful `POST /compare`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResponse {
    pub criteria: Vec<Criterion>,
    pub pareto_frontier: Vec<ScoredItem>,
    pub dominated: Vec<ScoredItem>,
    pub total_products: usize,
    pub truncated: bool,
    pub computed_at: DateTime<Utc>,
    pub fingerprint: String,
    pub cached: bool,
}

impl ComparisonResponse {
    fn new(result: &ComparisonResult, fingerprint: &Fingerprint, cached: bool) -> Self {
        Self {
            criteria: result.criteria.clone(),
            pareto_frontier: result.pareto_frontier.clone(),
            dominated: result.dominated.clone(),
            total_products: result.total_candidates,
            truncated: result.truncated,
            computed_at: result.computed_at,
            fingerprint: fingerprint.digest.clone(),
            cached,
        }
    }
}

/// A category id must be non-blank and free of `:`, the cache key separator.
pub fn validate_category_id(category_id: &str) -> CompareResult<()> {
    if category_id.trim().is_empty() {
        return Err(CompareError::invalid("categoryId must not be empty"));
    }
    if category_id.contains(KEY_SEPARATOR) {
        return Err(CompareError::invalid(format!(
            "categoryId must not contain '{}'",
            KEY_SEPARATOR
        )));
    }
    Ok(())
}

/// Checks a request before any cache or catalog access.
pub fn validate(request: &ComparisonRequest) -> CompareResult<()> {
    validate_category_id(&request.category_id)?;

    if request.criteria.is_empty() {
        return Err(CompareError::invalid("at least one criterion is required"));
    }
    if request.criteria.len() > MAX_CRITERIA {
        return Err(CompareError::invalid(format!(
            "at most {} criteria are allowed, got {}",
            MAX_CRITERIA,
            request.criteria.len()
        )));
    }

    let mut seen = HashSet::new();
    for criterion in &request.criteria {
        let attribute = criterion.attribute.trim();
        if attribute.is_empty() {
            return Err(CompareError::invalid("criterion attribute must not be empty"));
        }
        if !seen.insert(attribute) {
            return Err(CompareError::invalid(format!(
                "duplicate criterion attribute: {}",
                attribute
            )));
        }
        if !criterion.weight.is_finite() || criterion.weight < 0.0 {
            return Err(CompareError::invalid(format!(
                "weight for {} must be a finite number >= 0",
                attribute
            )));
        }
    }
    if !request.criteria.iter().any(Criterion::is_active) {
        return Err(CompareError::invalid(
            "at least one criterion must have a positive weight",
        ));
    }
    let total_weight: f64 = request.criteria.iter().map(|c| c.weight).sum();
    if !total_weight.is_finite() {
        return Err(CompareError::invalid("sum of weights must be a finite number"));
    }

    if let Some(limit) = request.limit {
        if limit == 0 || limit > MAX_LIMIT {
            return Err(CompareError::invalid(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }
    }

    if let Some(filters) = &request.filters {
        if let Some(min) = filters.min_price {
            if !min.is_finite() || min < 0.0 {
                return Err(CompareError::invalid("minPrice must be >= 0"));
            }
        }
        if let Some(max) = filters.max_price {
            if !max.is_finite() || max <= 0.0 {
                return Err(CompareError::invalid("maxPrice must be > 0"));
            }
        }
        if let (Some(min), Some(max)) = (filters.min_price, filters.max_price) {
            if min > max {
                return Err(CompareError::invalid("minPrice must not exceed maxPrice"));
            }
        }
        for (name, value) in &filters.attributes {
            if name.trim().is_empty() {
                return Err(CompareError::invalid("attribute filter name must not be empty"));
            }
            if !(value.is_string() || value.is_number() || value.is_boolean()) {
                return Err(CompareError::invalid(format!(
                    "attribute filter {} must be a string, number or boolean",
                    name
                )));
            }
        }
    }

    Ok(())
}

pub struct Comparator {
    catalog: Arc<dyn Catalog>,
    cache: Arc<ComparisonCache>,
    extractor: Arc<Extractor>,
    options: EngineOptions,
}

impl Comparator {
    pub fn new(catalog: Arc<dyn Catalog>, cache: Arc<ComparisonCache>, options: EngineOptions) -> Self {
        Self {
            catalog,
            cache,
            extractor: Arc::new(Extractor::with_builtins()),
            options,
        }
    }

    /// Builds a comparator over `catalog` with an in-memory cache store
    /// configured from `[cache]` and `[engine]`.
    pub fn from_config(config: &Config, catalog: Arc<dyn Catalog>) -> Self {
        let cache = ComparisonCache::new(
            Arc::new(InMemoryCacheStore::new()),
            config.cache.ttl(),
            config.cache.key_prefix.clone(),
        );
        Self::new(catalog, Arc::new(cache), config.engine.options())
    }

    /// Replaces the attribute extractor (e.g. to register custom resolvers).
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn cache(&self) -> &Arc<ComparisonCache> {
        &self.cache
    }

    pub async fn compare(
        &self,
        request: &ComparisonRequest,
        cancel: &CancellationToken,
    ) -> CompareResult<ComparisonResponse> {
        if let Err(e) = validate(request) {
            tracing::debug!(error = %e, "rejected comparison request");
            return Err(e);
        }

        let fingerprint = Fingerprint::of(request);
        let span = tracing::info_span!(
            "compare",
            request_id = %Uuid::new_v4(),
            category = %fingerprint.category_id,
            fingerprint = %fingerprint.digest,
        );

        async {
            let started = Instant::now();
            let outcome = self
                .cache
                .get_or_compute(&fingerprint, cancel, || self.compute(request))
                .await;

            match &outcome {
                Ok(Lookup { result, cached }) => tracing::info!(
                    cached,
                    frontier = result.pareto_frontier.len(),
                    dominated = result.dominated.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "comparison complete"
                ),
                Err(e @ CompareError::ComputationCancelled(_)) => {
                    tracing::warn!(error = %e, "comparison cancelled")
                }
                Err(e) => tracing::error!(error = %e, "comparison failed"),
            }

            let lookup = outcome?;
            Ok(ComparisonResponse::new(
                &lookup.result,
                &fingerprint,
                lookup.cached,
            ))
        }
        .instrument(span)
        .await
    }

    async fn compute(&self, request: &ComparisonRequest) -> CompareResult<ComparisonResult> {
        let filters = request.filters.clone().unwrap_or_default();
        let category_id = request.category_id.trim();

        let records = self
            .catalog
            .fetch_candidates(category_id, &filters)
            .await
            .map_err(|e| CompareError::CatalogUnavailable(format!("{:#}", e)))?;
        tracing::debug!(records = records.len(), "fetched catalog records");

        let extractor = self.extractor.clone();
        let criteria = request.criteria.clone();
        let limit = request.limit;
        let options = self.options.clone();

        let result = tokio::task::spawn_blocking(move || {
            let candidates = select_candidates(records, &filters);
            let items = extractor.extract_all(&candidates, &criteria);
            engine::run(&items, &criteria, limit, &options)
        })
        .await
        .map_err(|e| CompareError::Internal(format!("comparison task failed: {}", e)))?;

        result.map_err(|e| match e {
            CompareError::InvalidRequest(message) => {
                debug_assert!(false, "engine rejected a validated request: {}", message);
                CompareError::Internal(format!("engine rejected a validated request: {}", message))
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pareto_core::models::{Direction, Filters};

    fn request(criteria: Vec<Criterion>) -> ComparisonRequest {
        ComparisonRequest {
            category_id: "phones".to_string(),
            criteria,
            filters: None,
            limit: None,
        }
    }

    fn price() -> Criterion {
        Criterion::new("price", 1.0, Direction::Minimize)
    }

    #[test]
    fn test_valid_request_passes() {
        let mut req = request(vec![
            price(),
            Criterion::new("rating", 0.0, Direction::Maximize),
        ]);
        req.limit = Some(100);
        req.filters = Some(Filters {
            min_price: Some(0.0),
            max_price: Some(500.0),
            ..Filters::default()
        });
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn test_blank_category_rejected() {
        let mut req = request(vec![price()]);
        req.category_id = "   ".to_string();
        assert!(matches!(
            validate(&req),
            Err(CompareError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_category_with_key_separator_rejected() {
        let mut req = request(vec![price()]);
        req.category_id = "phones:refurb".to_string();
        let err = validate(&req).unwrap_err();
        assert!(err.to_string().contains("':'"), "{}", err);

        assert!(validate_category_id("phones-refurb").is_ok());
        assert!(validate_category_id(":").is_err());
    }

    #[test]
    fn test_criteria_count_bounds() {
        assert!(validate(&request(vec![])).is_err());

        let many: Vec<Criterion> = (0..11)
            .map(|i| Criterion::new(format!("a{}", i), 1.0, Direction::Maximize))
            .collect();
        assert!(validate(&request(many)).is_err());
    }

    #[test]
    fn test_duplicate_and_empty_attributes_rejected() {
        assert!(validate(&request(vec![price(), price()])).is_err());
        assert!(validate(&request(vec![Criterion::new(" ", 1.0, Direction::Maximize)])).is_err());
    }

    #[test]
    fn test_weights_must_be_usable() {
        assert!(validate(&request(vec![Criterion::new("price", 0.0, Direction::Minimize)])).is_err());
        assert!(validate(&request(vec![Criterion::new("price", -1.0, Direction::Minimize)])).is_err());
        assert!(
            validate(&request(vec![Criterion::new("price", f64::NAN, Direction::Minimize)])).is_err()
        );
    }

    #[test]
    fn test_overflowing_weight_sum_rejected() {
        let req = request(vec![
            Criterion::new("price", 1e308, Direction::Minimize),
            Criterion::new("rating", 1e308, Direction::Maximize),
        ]);
        let err = validate(&req).unwrap_err();
        assert!(err.to_string().contains("sum of weights"), "{}", err);

        let req = request(vec![
            Criterion::new("price", 1e308, Direction::Minimize),
            Criterion::new("rating", 7e307, Direction::Maximize),
        ]);
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn test_limit_bounds() {
        let mut req = request(vec![price()]);
        req.limit = Some(0);
        assert!(validate(&req).is_err());
        req.limit = Some(101);
        assert!(validate(&req).is_err());
        req.limit = Some(1);
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn test_price_filter_bounds() {
        let mut req = request(vec![price()]);
        req.filters = Some(Filters {
            min_price: Some(-1.0),
            ..Filters::default()
        });
        assert!(validate(&req).is_err());

        req.filters = Some(Filters {
            max_price: Some(0.0),
            ..Filters::default()
        });
        assert!(validate(&req).is_err());

        req.filters = Some(Filters {
            min_price: Some(300.0),
            max_price: Some(200.0),
            ..Filters::default()
        });
        assert!(validate(&req).is_err());
    }

    #[test]
    fn test_attribute_filter_values_must_be_scalar() {
        let mut req = request(vec![price()]);
        let mut filters = Filters::default();
        filters.attributes.insert("color".into(), serde_json::json!("black"));
        filters.attributes.insert("storage".into(), serde_json::json!(128));
        filters.attributes.insert("5g".into(), serde_json::json!(true));
        req.filters = Some(filters.clone());
        assert!(validate(&req).is_ok());

        filters.attributes.insert("sizes".into(), serde_json::json!([1, 2]));
        req.filters = Some(filters);
        assert!(validate(&req).is_err());

        let mut blank = Filters::default();
        blank.attributes.insert(" ".into(), serde_json::json!(1));
        req.filters = Some(blank);
        assert!(validate(&req).is_err());
    }
}
