//! Dominance engine: multi-criteria partial order and the non-dominated set.
//!
//! Item A **dominates** B when, on every criterion with positive weight, A is
//! at least as good as B under that criterion's direction, and strictly
//! better on at least one of them. Zero-weight criteria are ignored.
//!
//! An unknown value is the worst possible value on its criterion: two
//! unknowns tie, and any known value beats an unknown. Unknown never counts
//! as better, so missing data cannot push an item onto the frontier, but an
//! item with gaps can still dominate on the criteria it does have.
//!
//! # Algorithms
//!
//! - [`pairwise`]: O(n²·k) reference implementation.
//! - [`sort_and_sweep`]: sorts items lexicographically (best first, in
//!   criteria order) so every dominator precedes what it dominates, then
//!   checks each item only against the frontier built so far.
//!
//! Both return identical [`Frontier`]s. Each dominated item lists every
//! frontier member that dominates it, ordered by item key.

use std::cmp::Ordering;

use crate::error::{CompareError, CompareResult};
use crate::models::{CandidateItem, Criterion, Direction};

/// Partition of the input items into frontier and dominated, by index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frontier {
    /// Indices of non-dominated items, ascending.
    pub frontier: Vec<usize>,
    /// Dominated items, ascending by index.
    pub dominated: Vec<Dominated>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dominated {
    pub index: usize,
    /// Indices of frontier items dominating this one, ordered by item key.
    pub dominated_by: Vec<usize>,
}

/// Compares two resolved values; `Greater` means `a` is better. Unknown is worst.
pub fn compare_values(a: Option<f64>, b: Option<f64>, direction: Direction) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => direction.prefer(x, y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Whether vector `a` dominates vector `b` under `criteria`.
pub fn dominates(a: &[Option<f64>], b: &[Option<f64>], criteria: &[Criterion]) -> bool {
    let mut strictly_better = false;

    for (i, criterion) in criteria.iter().enumerate() {
        if !criterion.is_active() {
            continue;
        }
        match compare_values(a[i], b[i], criterion.direction) {
            Ordering::Less => return false,
            Ordering::Greater => strictly_better = true,
            Ordering::Equal => {}
        }
    }

    strictly_better
}

/// Computes the frontier, switching to sort-and-sweep above `sweep_threshold` items.
///
/// Fails with [`CompareError::InvalidRequest`] when `criteria` is empty or has
/// no positive weight.
pub fn compute_frontier(
    items: &[CandidateItem],
    criteria: &[Criterion],
    sweep_threshold: usize,
) -> CompareResult<Frontier> {
    check_inputs(items, criteria)?;

    if items.len() > sweep_threshold {
        Ok(sort_and_sweep(items, criteria))
    } else {
        Ok(pairwise(items, criteria))
    }
}

fn check_inputs(items: &[CandidateItem], criteria: &[Criterion]) -> CompareResult<()> {
    if criteria.is_empty() {
        return Err(CompareError::invalid("criteria must not be empty"));
    }
    if !criteria.iter().any(Criterion::is_active) {
        return Err(CompareError::invalid(
            "at least one criterion must have a positive weight",
        ));
    }
    if !criteria.iter().map(|c| c.weight).sum::<f64>().is_finite() {
        return Err(CompareError::invalid("sum of weights must be a finite number"));
    }
    if let Some(bad) = items.iter().find(|it| it.values.len() != criteria.len()) {
        return Err(CompareError::Internal(format!(
            "item {} has {} values for {} criteria",
            bad.key(),
            bad.values.len(),
            criteria.len()
        )));
    }
    Ok(())
}

/// Reference O(n²·k) frontier computation.
pub fn pairwise(items: &[CandidateItem], criteria: &[Criterion]) -> Frontier {
    let on_frontier: Vec<bool> = items
        .iter()
        .enumerate()
        .map(|(j, b)| {
            !items
                .iter()
                .enumerate()
                .any(|(i, a)| i != j && dominates(&a.values, &b.values, criteria))
        })
        .collect();

    let frontier: Vec<usize> = (0..items.len()).filter(|&i| on_frontier[i]).collect();

    let dominated = (0..items.len())
        .filter(|&j| !on_frontier[j])
        .map(|j| Dominated {
            index: j,
            dominated_by: dominators_among(items, criteria, &frontier, j),
        })
        .collect();

    Frontier {
        frontier,
        dominated,
    }
}

/// Skyline scan over a lexicographic best-first ordering.
pub fn sort_and_sweep(items: &[CandidateItem], criteria: &[Criterion]) -> Frontier {
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| {
        lexicographic(&items[a], &items[b], criteria)
            .then_with(|| items[a].key().cmp(items[b].key()))
            .then(a.cmp(&b))
    });

    let mut frontier: Vec<usize> = Vec::new();
    let mut dominated: Vec<Dominated> = Vec::new();

    for j in order {
        let dominated_by = dominators_among(items, criteria, &frontier, j);
        if dominated_by.is_empty() {
            frontier.push(j);
        } else {
            dominated.push(Dominated {
                index: j,
                dominated_by,
            });
        }
    }

    frontier.sort_unstable();
    dominated.sort_by_key(|d| d.index);

    Frontier {
        frontier,
        dominated,
    }
}

/// Best-first ordering over active criteria in request order.
fn lexicographic(a: &CandidateItem, b: &CandidateItem, criteria: &[Criterion]) -> Ordering {
    criteria
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_active())
        .map(|(i, c)| compare_values(b.values[i], a.values[i], c.direction))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn dominators_among(
    items: &[CandidateItem],
    criteria: &[Criterion],
    candidates: &[usize],
    target: usize,
) -> Vec<usize> {
    let mut out: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&i| i != target && dominates(&items[i].values, &items[target].values, criteria))
        .collect();
    out.sort_by(|&a, &b| items[a].key().cmp(items[b].key()).then(a.cmp(&b)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemInfo;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn item(key: &str, values: Vec<Option<f64>>) -> CandidateItem {
        CandidateItem {
            info: ItemInfo {
                key: key.to_string(),
                product_id: key.to_string(),
                variant_id: None,
                offer_id: None,
                retailer_id: None,
                name: key.to_string(),
                brand: None,
            },
            values,
        }
    }

    fn price_storage() -> Vec<Criterion> {
        vec![
            Criterion::new("price", 1.0, Direction::Minimize),
            Criterion::new("storage", 1.0, Direction::Maximize),
        ]
    }

    fn random_items(rng: &mut StdRng, n: usize, k: usize) -> Vec<CandidateItem> {
        (0..n)
            .map(|i| {
                let values = (0..k)
                    .map(|_| {
                        if rng.gen_bool(0.1) {
                            None
                        } else {
                            // Small domain so ties and duplicates are common.
                            Some(rng.gen_range(0..6) as f64)
                        }
                    })
                    .collect();
                item(&format!("item-{:03}", i), values)
            })
            .collect()
    }

    fn random_criteria(rng: &mut StdRng, k: usize) -> Vec<Criterion> {
        let mut criteria: Vec<Criterion> = (0..k)
            .map(|i| {
                let direction = if rng.gen_bool(0.5) {
                    Direction::Minimize
                } else {
                    Direction::Maximize
                };
                let weight = if rng.gen_bool(0.2) { 0.0 } else { rng.gen_range(0.1..2.0) };
                Criterion::new(format!("c{}", i), weight, direction)
            })
            .collect();
        criteria[0].weight = 1.0;
        criteria
    }

    fn keys(items: &[CandidateItem], idx: &[usize]) -> Vec<String> {
        idx.iter().map(|&i| items[i].key().to_string()).collect()
    }

    #[test]
    fn test_single_criterion_ties_stay_on_frontier() {
        let criteria = vec![Criterion::new("price", 1.0, Direction::Minimize)];
        let items = vec![
            item("a", vec![Some(100.0)]),
            item("b", vec![Some(90.0)]),
            item("c", vec![Some(90.0)]),
            item("d", vec![Some(120.0)]),
        ];
        let f = compute_frontier(&items, &criteria, 256).unwrap();
        assert_eq!(keys(&items, &f.frontier), vec!["b", "c"]);
        assert_eq!(f.dominated.len(), 2);
        for d in &f.dominated {
            assert_eq!(keys(&items, &d.dominated_by), vec!["b", "c"]);
        }
    }

    #[test]
    fn test_trade_offs_all_on_frontier() {
        let items = vec![
            item("a", vec![Some(100.0), Some(64.0)]),
            item("b", vec![Some(90.0), Some(32.0)]),
            item("c", vec![Some(110.0), Some(128.0)]),
        ];
        let f = compute_frontier(&items, &price_storage(), 256).unwrap();
        assert_eq!(f.frontier, vec![0, 1, 2]);
        assert!(f.dominated.is_empty());
    }

    #[test]
    fn test_empty_criteria_rejected() {
        let items = vec![item("a", vec![])];
        let err = compute_frontier(&items, &[], 256).unwrap_err();
        assert!(matches!(err, CompareError::InvalidRequest(_)));
    }

    #[test]
    fn test_all_zero_weights_rejected() {
        let criteria = vec![Criterion::new("price", 0.0, Direction::Minimize)];
        let items = vec![item("a", vec![Some(1.0)])];
        let err = compute_frontier(&items, &criteria, 256).unwrap_err();
        assert!(matches!(err, CompareError::InvalidRequest(_)));
    }

    #[test]
    fn test_misaligned_values_are_internal_error() {
        let items = vec![item("a", vec![Some(1.0)])];
        let err = compute_frontier(&items, &price_storage(), 256).unwrap_err();
        assert!(matches!(err, CompareError::Internal(_)));
    }

    #[test]
    fn test_zero_weight_criterion_ignored() {
        let criteria = vec![
            Criterion::new("price", 1.0, Direction::Minimize),
            Criterion::new("storage", 0.0, Direction::Maximize),
        ];
        // Same price; only storage differs, and storage has no weight.
        let items = vec![
            item("a", vec![Some(100.0), Some(64.0)]),
            item("b", vec![Some(100.0), Some(512.0)]),
        ];
        let f = compute_frontier(&items, &criteria, 256).unwrap();
        assert_eq!(f.frontier, vec![0, 1]);
    }

    #[test]
    fn test_unknown_is_worst() {
        let items = vec![
            item("known", vec![Some(100.0), Some(64.0)]),
            item("gap", vec![Some(100.0), None]),
        ];
        let f = compute_frontier(&items, &price_storage(), 256).unwrap();
        assert_eq!(keys(&items, &f.frontier), vec!["known"]);
        assert_eq!(f.dominated[0].index, 1);
    }

    #[test]
    fn test_item_with_gap_can_still_dominate() {
        let items = vec![
            item("gap", vec![Some(80.0), Some(128.0), None]),
            item("worse", vec![Some(90.0), Some(64.0), None]),
        ];
        let mut criteria = price_storage();
        criteria.push(Criterion::new("battery", 1.0, Direction::Maximize));
        let f = compute_frontier(&items, &criteria, 256).unwrap();
        assert_eq!(keys(&items, &f.frontier), vec!["gap"]);
    }

    #[test]
    fn test_all_unknown_item_never_on_frontier_with_others() {
        let items = vec![
            item("empty", vec![None, None]),
            item("partial", vec![None, Some(16.0)]),
        ];
        let f = compute_frontier(&items, &price_storage(), 256).unwrap();
        assert_eq!(keys(&items, &f.frontier), vec!["partial"]);

        let alone = vec![item("empty", vec![None, None])];
        let f = compute_frontier(&alone, &price_storage(), 256).unwrap();
        assert_eq!(f.frontier, vec![0]);
    }

    #[test]
    fn test_sweep_matches_pairwise_on_scenario() {
        let items = vec![
            item("a", vec![Some(100.0), Some(64.0)]),
            item("b", vec![Some(90.0), Some(32.0)]),
            item("c", vec![Some(110.0), Some(128.0)]),
            item("d", vec![Some(120.0), Some(64.0)]),
            item("e", vec![Some(95.0), Some(32.0)]),
        ];
        let criteria = price_storage();
        assert_eq!(pairwise(&items, &criteria), sort_and_sweep(&items, &criteria));
        // Threshold 0 forces the sweep path through the public entry point.
        assert_eq!(
            compute_frontier(&items, &criteria, 0).unwrap(),
            pairwise(&items, &criteria)
        );
    }

    #[test]
    fn test_anti_symmetry_random() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let criteria = random_criteria(&mut rng, 3);
            let items = random_items(&mut rng, 20, 3);
            for a in &items {
                for b in &items {
                    assert!(
                        !(dominates(&a.values, &b.values, &criteria)
                            && dominates(&b.values, &a.values, &criteria)),
                        "{:?} and {:?} dominate each other",
                        a.values,
                        b.values
                    );
                }
            }
        }
    }

    #[test]
    fn test_frontier_correctness_random() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let criteria = random_criteria(&mut rng, 4);
            let items = random_items(&mut rng, 40, 4);
            let f = pairwise(&items, &criteria);

            for &i in &f.frontier {
                assert!(items
                    .iter()
                    .all(|other| !dominates(&other.values, &items[i].values, &criteria)));
            }
            for d in &f.dominated {
                assert!(!d.dominated_by.is_empty());
                for &by in &d.dominated_by {
                    assert!(f.frontier.contains(&by));
                    assert!(dominates(&items[by].values, &items[d.index].values, &criteria));
                }
            }
            assert_eq!(f.frontier.len() + f.dominated.len(), items.len());
        }
    }

    #[test]
    fn test_sweep_matches_pairwise_random() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..50 {
            let k = rng.gen_range(1..5);
            let criteria = random_criteria(&mut rng, k);
            let items = random_items(&mut rng, 60, k);
            assert_eq!(pairwise(&items, &criteria), sort_and_sweep(&items, &criteria));
        }
    }

    #[test]
    fn test_permutation_preserves_partition_random() {
        let mut rng = StdRng::seed_from_u64(31);
        for _ in 0..20 {
            let criteria = random_criteria(&mut rng, 3);
            let items = random_items(&mut rng, 30, 3);
            let mut shuffled = items.clone();
            shuffled.reverse();
            shuffled.rotate_left(7);

            let by_key = |items: &[CandidateItem], f: &Frontier| {
                let mut frontier = keys(items, &f.frontier);
                frontier.sort();
                let mut edges: Vec<(String, Vec<String>)> = f
                    .dominated
                    .iter()
                    .map(|d| (items[d.index].key().to_string(), keys(items, &d.dominated_by)))
                    .collect();
                edges.sort();
                (frontier, edges)
            };

            assert_eq!(
                by_key(&items, &pairwise(&items, &criteria)),
                by_key(&shuffled, &pairwise(&shuffled, &criteria))
            );
        }
    }

    #[test]
    fn test_monotonic_improvement() {
        let criteria = price_storage();
        let b = vec![Some(90.0), Some(128.0)];
        let a = vec![Some(100.0), Some(64.0)];
        assert!(dominates(&b, &a, &criteria));

        // Make A strictly better than B on storage.
        let improved = vec![Some(100.0), Some(256.0)];
        assert!(!dominates(&b, &improved, &criteria));
    }

    /// Strictly better value for one criterion; unknown becomes known.
    fn improve(value: Option<f64>, direction: Direction, rng: &mut StdRng) -> Option<f64> {
        let step = rng.gen_range(1..4) as f64;
        match (value, direction) {
            (None, _) => Some(rng.gen_range(0..6) as f64),
            (Some(v), Direction::Minimize) => Some(v - step),
            (Some(v), Direction::Maximize) => Some(v + step),
        }
    }

    #[test]
    fn test_monotonic_improvement_random() {
        let mut rng = StdRng::seed_from_u64(43);
        let mut checked = 0;
        for _ in 0..50 {
            let criteria = random_criteria(&mut rng, 3);
            let active: Vec<usize> = (0..criteria.len())
                .filter(|&i| criteria[i].is_active())
                .collect();
            let items = random_items(&mut rng, 20, 3);

            for a in &items {
                for b in &items {
                    if !dominates(&b.values, &a.values, &criteria) {
                        continue;
                    }
                    // Beat B strictly on one active criterion.
                    let c = active[rng.gen_range(0..active.len())];
                    let mut improved = a.values.clone();
                    improved[c] = improve(b.values[c], criteria[c].direction, &mut rng);
                    assert!(
                        !dominates(&b.values, &improved, &criteria),
                        "{:?} still dominates improved {:?}",
                        b.values,
                        improved
                    );
                    checked += 1;
                }
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_improved_frontier_item_stays_on_frontier_random() {
        let mut rng = StdRng::seed_from_u64(47);
        for _ in 0..50 {
            let criteria = random_criteria(&mut rng, 3);
            let mut items = random_items(&mut rng, 25, 3);
            let before = pairwise(&items, &criteria);

            let i = before.frontier[rng.gen_range(0..before.frontier.len())];
            let c = rng.gen_range(0..criteria.len());
            items[i].values[c] = improve(items[i].values[c], criteria[c].direction, &mut rng);

            let after = pairwise(&items, &criteria);
            assert!(
                after.frontier.contains(&i),
                "{} fell off the frontier after improving {}",
                items[i].key(),
                criteria[c].attribute
            );
        }
    }
}
