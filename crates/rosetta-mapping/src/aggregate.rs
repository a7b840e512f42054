//! Ranking, deduplication and flattening of result chains.

use crate::config::EngineConfig;
use crate::item::MappingItem;
use crate::mapping::Mapping;
use rosetta_ontology::Predicate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const SCORE_EPSILON: f64 = 1e-9;

/// Scores are grouped on a fixed grid so that sums like `0.1 + 0.2` land in
/// the same bucket as `0.3`.
fn score_key(score: f64) -> i64 {
    (score * 1e6).round() as i64
}

fn same_score(a: f64, b: f64) -> bool {
    (a - b).abs() < SCORE_EPSILON
}

/// Ranking order: smaller `|total|` first, then non-negative before negative,
/// then shorter chains, then by target.
pub fn rank(a: &Mapping, b: &Mapping) -> Ordering {
    let (ta, tb) = (a.total_penalty(), b.total_penalty());
    ta.abs()
        .total_cmp(&tb.abs())
        .then_with(|| (ta < 0.0).cmp(&(tb < 0.0)))
        .then_with(|| a.levels().cmp(&b.levels()))
        .then_with(|| a.to().cmp(b.to()))
}

/// Best total across a result set: the smallest non-negative total if there is
/// one, otherwise the least negative. Zero for an empty set.
pub fn best_score(chains: &[Arc<Mapping>]) -> f64 {
    let totals = chains.iter().map(|m| m.total_penalty());
    let non_negative = totals.clone().filter(|t| *t >= 0.0).min_by(f64::total_cmp);
    non_negative
        .or_else(|| totals.filter(|t| *t <= 0.0).max_by(f64::total_cmp))
        .unwrap_or(0.0)
}

/// Chains scoring exactly [`best_score`].
pub fn best_mappings(chains: &[Arc<Mapping>]) -> Vec<Arc<Mapping>> {
    let best = best_score(chains);
    chains
        .iter()
        .filter(|m| same_score(m.total_penalty(), best))
        .cloned()
        .collect()
}

/// The chain with the smallest `|total|`, ties resolved by [`rank`].
pub fn find_one_best(chains: &[Arc<Mapping>]) -> Option<Arc<Mapping>> {
    chains.iter().min_by(|a, b| rank(a, b)).cloned()
}

/// One chain per distinct result set: the best of each group.
pub fn keep_best_per_target(chains: Vec<Arc<Mapping>>) -> Vec<Arc<Mapping>> {
    let mut groups: BTreeMap<BTreeSet<MappingItem>, Vec<Arc<Mapping>>> = BTreeMap::new();
    for chain in chains {
        groups.entry(chain.to().clone()).or_default().push(chain);
    }
    groups
        .into_values()
        .filter_map(|group| find_one_best(&group))
        .collect()
}

/// Flatten chains to one `source → results` summary per distinct total.
///
/// Chains without results (no-mapping sentinels and dead ends) keep their
/// explanation and are passed through unchanged.
pub fn squash(source: &BTreeSet<MappingItem>, chains: &[Arc<Mapping>]) -> Vec<Arc<Mapping>> {
    let mut groups: BTreeMap<i64, (f64, BTreeSet<MappingItem>)> = BTreeMap::new();
    let mut passthrough = Vec::new();

    for chain in chains {
        if chain.is_no_mapping() {
            passthrough.push(Arc::clone(chain));
            continue;
        }
        let total = chain.total_penalty();
        groups
            .entry(score_key(total))
            .or_insert_with(|| (total, BTreeSet::new()))
            .1
            .extend(chain.to().iter().cloned());
    }

    groups
        .into_values()
        .map(|(total, to)| {
            Mapping::new(source.iter().cloned(), to)
                .with_penalty(total)
                .with_description(Predicate::MapsTo.value())
                .shared()
        })
        .chain(passthrough)
        .collect()
}

/// Order by [`rank`] and keep totals inside `(-budget - 1, budget + ε)`.
///
/// ε is `config.filter_allowance` while the set holds at most
/// `config.filter_allowance_threshold` chains, otherwise zero.
pub fn sort_and_filter(
    mut chains: Vec<Arc<Mapping>>,
    budget: u32,
    config: &EngineConfig,
) -> Vec<Arc<Mapping>> {
    let budget = f64::from(budget);
    let allowance = if chains.len() > config.filter_allowance_threshold {
        0.0
    } else {
        config.filter_allowance
    };
    chains.sort_by(|a, b| rank(a, b));
    chains.retain(|m| {
        let total = m.total_penalty();
        total < budget + allowance && total > -budget - 1.0
    });
    chains
}
