//! Full comparison over extracted candidates: dominance, scoring, ranking,
//! limit, and the dominated-list cap.

use std::collections::HashMap;

use chrono::Utc;

use crate::dominance::compute_frontier;
use crate::error::CompareResult;
use crate::models::{CandidateItem, ComparisonResult, Criterion, ScoredItem};
use crate::rank::{rank, score_items};

/// Engine tuning, decoupled from application config.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Candidate count above which sort-and-sweep replaces the pairwise check.
    pub sweep_threshold: usize,
    /// Maximum number of dominated items returned.
    pub max_dominated: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            sweep_threshold: 256,
            max_dominated: 500,
        }
    }
}

/// Runs one comparison.
///
/// `limit` truncates the ranked frontier only. The dominated list is capped
/// by [`EngineOptions::max_dominated`], which sets `truncated`.
pub fn run(
    items: &[CandidateItem],
    criteria: &[Criterion],
    limit: Option<usize>,
    options: &EngineOptions,
) -> CompareResult<ComparisonResult> {
    let partition = compute_frontier(items, criteria, options.sweep_threshold)?;

    let dominators: HashMap<usize, Vec<String>> = partition
        .dominated
        .iter()
        .map(|d| {
            let keys = d
                .dominated_by
                .iter()
                .map(|&i| items[i].key().to_string())
                .collect();
            (d.index, keys)
        })
        .collect();

    let mut frontier: Vec<ScoredItem> = Vec::with_capacity(partition.frontier.len());
    let mut dominated: Vec<ScoredItem> = Vec::with_capacity(partition.dominated.len());

    for (index, mut scored) in score_items(items, criteria).into_iter().enumerate() {
        match dominators.get(&index) {
            Some(keys) => {
                scored.dominated_by = keys.clone();
                dominated.push(scored);
            }
            None => {
                scored.pareto_optimal = true;
                frontier.push(scored);
            }
        }
    }

    let mut frontier = rank(frontier, criteria);
    if let Some(limit) = limit {
        frontier.truncate(limit);
    }
    for (pos, scored) in frontier.iter_mut().enumerate() {
        scored.rank = Some(pos + 1);
    }

    let mut dominated = rank(dominated, criteria);
    let truncated = dominated.len() > options.max_dominated;
    dominated.truncate(options.max_dominated);

    Ok(ComparisonResult {
        criteria: criteria.to_vec(),
        pareto_frontier: frontier,
        dominated,
        total_candidates: items.len(),
        truncated,
        computed_at: Utc::now(),
    })
}
