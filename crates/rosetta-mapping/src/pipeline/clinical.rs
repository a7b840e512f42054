//! Clinical → Preclinical (MedDRA → SEND / eTox).
//!
//! ```text
//!   MedDRA term ──► SNOMED equivalents ──► curated preclinical combination
//!        │                 │
//!        │ LLT → PT        ├─► structural split (finding site, morphology, ...)
//!        │ miss → parents  │        └─► perfect / partial / single matches
//!        ▼                 └─► bounded hierarchical expansion
//! ```

use super::{dead_end, or_split_penalty, single, split_or, Context};
use crate::aggregate::keep_best_per_target;
use crate::item::MappingItem;
use crate::mapping::{Direction, Mapping};
use crate::traversal::{ExpansionResolver, Expander, TraversalState};
use rosetta_ontology::{Concept, ConceptId, Domain, Predicate, VocabularySet};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Penalty of moving between a preferred term and its lower-level terms.
const LOW_LEVEL_TERM_PENALTY: f64 = 0.1;

const FAILURE: &str = "failed to reach a suitable preclinical translation";

pub struct ClinicalToPreclinical<'a> {
    ctx: Context<'a>,
}

impl<'a> ClinicalToPreclinical<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Translate one clinical term into `targets` within `budget`.
    pub fn map(&self, source: &Arc<Concept>, targets: VocabularySet, budget: u32) -> Vec<Arc<Mapping>> {
        tracing::debug!(source = %source.human_readable(), %targets, budget, "clinical to preclinical");
        let to_intermediary = self.to_intermediary(source, budget);
        if to_intermediary.is_empty() {
            return vec![Mapping::no_mapping(single(source)).shared()];
        }

        let mut state = TraversalState::new();
        let mut candidates = Vec::new();
        for chain in &to_intermediary {
            candidates.extend(self.intermediary_to_preclinical(chain, targets, budget, &mut state));
        }

        let results: Vec<Arc<Mapping>> = candidates
            .iter()
            .filter(|m| !m.is_no_mapping())
            .flat_map(|m| split_or(m, or_split_penalty(m.to().len())))
            .flat_map(|m| reduce_to_pairs(&m))
            .map(score_organs_only)
            .collect();
        let results = keep_best_per_target(results);

        if results.is_empty() {
            return vec![dead_end([single(source)], &to_intermediary, FAILURE)];
        }
        results
    }

    // ========================================================================
    // Clinical → intermediary
    // ========================================================================

    /// Intermediary equivalents of the source, one chain per alternative.
    fn to_intermediary(&self, source: &Arc<Concept>, budget: u32) -> Vec<Arc<Mapping>> {
        let index = self.ctx.index;
        let mut found = Vec::new();

        if source.is_low_level_term() {
            for parent in self.ctx.store.parents(source).into_iter().filter(|p| p.is_preferred_term()) {
                let hop = Mapping::new([single(source)], [single(&parent)])
                    .expanded(source, &parent, Direction::Uphill)
                    .with_penalty(LOW_LEVEL_TERM_PENALTY)
                    .shared();
                found.extend(index.clinical_to_intermediary(&parent, Some(&hop)));
            }
        } else {
            found.extend(index.clinical_to_intermediary(source, None));
            for child in self.ctx.store.children(source) {
                let hop = Mapping::new([single(source)], [single(&child)])
                    .expanded(source, &child, Direction::Downhill)
                    .with_penalty(LOW_LEVEL_TERM_PENALTY)
                    .shared();
                found.extend(index.clinical_to_intermediary(&child, Some(&hop)));
            }
        }

        if found.is_empty() {
            found = self.climb_to_intermediary(source, budget);
        }

        let split: Vec<Arc<Mapping>> = found
            .iter()
            .flat_map(|m| split_or(m, or_split_penalty(m.to().len())))
            .collect();
        keep_best_per_target(split)
    }

    /// Walk up the clinical hierarchy until some ancestor has intermediary
    /// equivalents or the budget runs out.
    fn climb_to_intermediary(&self, source: &Arc<Concept>, budget: u32) -> Vec<Arc<Mapping>> {
        let budget = f64::from(budget);
        let mut seen: BTreeSet<ConceptId> = BTreeSet::from([source.id]);
        let mut frontier: Vec<(Arc<Concept>, Option<Arc<Mapping>>)> = vec![(Arc::clone(source), None)];
        let mut found = Vec::new();

        while found.is_empty() && !frontier.is_empty() {
            let mut next = Vec::new();
            for (concept, preceding) in frontier {
                for parent in self.ctx.store.parents(&concept) {
                    if !seen.insert(parent.id) {
                        continue;
                    }
                    let hop = match &preceding {
                        Some(prev) => Mapping::after(prev, [single(&parent)]),
                        None => Mapping::new([single(source)], [single(&parent)]),
                    }
                    .expanded(&concept, &parent, Direction::Uphill)
                    .shared();
                    let total = hop.total_penalty().abs();
                    if total > budget {
                        continue;
                    }
                    found.extend(self.ctx.index.clinical_to_intermediary(&parent, Some(&hop)));
                    if total < budget {
                        next.push((parent, Some(hop)));
                    }
                }
            }
            frontier = next;
        }
        found
    }

    // ========================================================================
    // Intermediary → preclinical
    // ========================================================================

    fn intermediary_to_preclinical(
        &self,
        chain: &Arc<Mapping>,
        targets: VocabularySet,
        budget: u32,
        state: &mut TraversalState,
    ) -> Vec<Arc<Mapping>> {
        if chain.total_penalty() > f64::from(budget) {
            return Vec::new();
        }
        let mut result: Vec<Arc<Mapping>> = chain
            .to()
            .iter()
            .flat_map(|item| self.ctx.index.intermediary_to_preclinical(item, chain, targets))
            .collect();

        let split = self.split_intermediary(chain, targets);
        result.extend(self.parts_to_preclinical(&split, targets, state));

        let limit = self.ctx.config.oversized_split_limit;
        let expander = Expander::new(self.ctx.store, budget, self.ctx.config.expansion_cap());
        let mut resolver = Resolver { pipeline: self, targets };
        for m in &split {
            if m.total_penalty() >= f64::from(budget) {
                continue;
            }
            if result.len() > limit && m.to_concepts().len() > limit {
                tracing::debug!(concepts = m.to_concepts().len(), "skipping expansion of oversized split");
                continue;
            }
            let expanded = expander.expand(m, &mut resolver, state);
            result.extend(expanded);
        }
        result
    }

    /// The chain itself plus its structural decompositions: the shared
    /// required attributes of each alternative and, when they resolve, its
    /// optional attributes.
    fn split_intermediary(&self, chain: &Arc<Mapping>, targets: VocabularySet) -> Vec<Arc<Mapping>> {
        let store = self.ctx.store;
        let mut out = vec![Arc::clone(chain)];
        for item in chain.to() {
            let concepts: Vec<Arc<Concept>> = item.iter().cloned().collect();
            let mut required =
                store.related_to_all(&concepts, Predicate::STRUCTURAL, VocabularySet::INTERMEDIARY, None);
            if required.len() > 2 {
                required.retain(|c| c.is_valid());
            }
            if required.is_empty() {
                continue;
            }
            let required = MappingItem::new(required);
            out.push(
                Mapping::after(chain, [required.clone()])
                    .with_description("Split into structural parts")
                    .shared(),
            );

            let optional: Vec<Arc<Concept>> = store
                .related_to_all(&concepts, Predicate::OPTIONAL_STRUCTURAL, VocabularySet::INTERMEDIARY, None)
                .into_iter()
                .filter(|c| self.ctx.index.is_known(c, targets))
                .collect();
            if !optional.is_empty() {
                out.push(
                    Mapping::after(chain, [required.union(&MappingItem::new(optional))])
                        .with_description("Split into structural parts")
                        .shared(),
                );
            }
        }
        out
    }

    /// Resolve decomposed combinations: the whole set when everything in it
    /// is known, then best-subset and one-by-one matches merged back together.
    fn parts_to_preclinical(
        &self,
        split: &[Arc<Mapping>],
        targets: VocabularySet,
        state: &mut TraversalState,
    ) -> Vec<Arc<Mapping>> {
        let index = self.ctx.index;
        let mut out = Vec::new();

        for s in split {
            for item in s.to() {
                let (mappable, removed): (Vec<Arc<Concept>>, Vec<Arc<Concept>>) =
                    item.iter().cloned().partition(|c| index.is_known(c, targets));
                if mappable.is_empty() {
                    continue;
                }
                let mappable = MappingItem::new(mappable);
                if !state.claim_resolution(mappable.ids(), s.total_penalty()) {
                    continue;
                }

                if removed.is_empty() {
                    out.extend(index.intermediary_to_preclinical(item, s, targets));
                }
                if item.len() <= 1 {
                    continue;
                }

                let preceding = without_unknown(s, item, &removed);
                for partial in index.partial(&mappable, &preceding, targets) {
                    out.extend(merge(&[partial], &preceding));
                }

                let individual = index.single_concepts(&mappable, &preceding, targets);
                if mappable.len() > 1 {
                    let dropped = (mappable.len() - 1) as f64;
                    for inner in individual.iter().flatten() {
                        let intermediate = Mapping::after(&preceding, inner.from().iter().cloned())
                            .with_penalty(dropped)
                            .with_description("Removed AND mappings")
                            .shared();
                        out.push(inner.rebased(&intermediate).shared());

                        for from in inner.from() {
                            for partial in index.partial(from, &intermediate, targets) {
                                out.extend(merge(&[partial], &preceding));
                            }
                        }
                    }
                }
                out.extend(merge(&individual, &preceding));
            }
        }
        out
    }
}

/// `s` restricted to the concepts of `item` that are known to resolve,
/// charging one per dropped concept.
fn without_unknown(s: &Arc<Mapping>, item: &MappingItem, removed: &[Arc<Concept>]) -> Arc<Mapping> {
    if removed.is_empty() {
        return Arc::clone(s);
    }
    let kept = MappingItem::new(item.iter().filter(|c| !removed.contains(c)).cloned());
    let names = removed.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");
    Mapping::after(s, [kept])
        .with_penalty(removed.len() as f64)
        .with_description(format!("Removed AND mappings {names}"))
        .shared()
}

/// Every combination taking one alternative from each group, merged into a
/// single result item.
fn merge(groups: &[Vec<Arc<Mapping>>], preceding: &Arc<Mapping>) -> Vec<Arc<Mapping>> {
    let groups: Vec<&Vec<Arc<Mapping>>> = groups.iter().filter(|g| !g.is_empty()).collect();
    if groups.is_empty() {
        return Vec::new();
    }
    let mut combos: Vec<Vec<&Arc<Mapping>>> = vec![Vec::new()];
    for group in groups {
        combos = combos
            .into_iter()
            .flat_map(|combo| {
                group.iter().map(move |m| {
                    let mut next = combo.clone();
                    next.push(m);
                    next
                })
            })
            .collect();
    }
    combos
        .into_iter()
        .filter_map(|combo| create_merged(&combo, preceding))
        .collect()
}

fn create_merged(parts: &[&Arc<Mapping>], preceding: &Arc<Mapping>) -> Option<Arc<Mapping>> {
    let item: MappingItem = parts
        .iter()
        .flat_map(|m| m.to_concepts())
        .collect();
    if item.is_empty() {
        return None;
    }
    let penalty: f64 = parts.iter().map(|m| m.penalty()).sum();
    let description = if penalty == 0.0 {
        Predicate::Exact.value().to_string()
    } else {
        parts.iter().map(|m| m.description()).collect::<Vec<_>>().join(" | ")
    };
    Some(
        Mapping::after(preceding, [item])
            .with_penalty(penalty)
            .with_description(description)
            .shared(),
    )
}

/// Items of more than two concepts spanning several domains are also offered
/// as every two-concept pair of distinct domains.
fn reduce_to_pairs(chain: &Arc<Mapping>) -> Vec<Arc<Mapping>> {
    let mut out = vec![Arc::clone(chain)];
    let Ok(item) = chain.single_to_item() else {
        return out;
    };
    if item.len() <= 2 || !item.has_multiple_domains() {
        return out;
    }
    let concepts: Vec<&Arc<Concept>> = item.iter().collect();
    for (i, a) in concepts.iter().enumerate() {
        for b in &concepts[i + 1..] {
            if a.domain == b.domain {
                continue;
            }
            out.push(
                Mapping::after(chain, [MappingItem::new([Arc::clone(*a), Arc::clone(*b)])])
                    .with_description("Reduced mapping of more than two concepts to a pair, for practical purposes")
                    .shared(),
            );
        }
    }
    out
}

/// An organ on its own is not a finding: such results score negatively.
fn score_organs_only(chain: Arc<Mapping>) -> Arc<Mapping> {
    let concepts = chain.to_concepts();
    let organs_only = !concepts.is_empty() && concepts.iter().all(|c| c.domain == Domain::SpecAnatomicSite);
    if !organs_only {
        return chain;
    }
    let penalty = -chain.penalty() - 1.0;
    chain.as_ref().clone().with_penalty(penalty).shared()
}

// ============================================================================
// Expansion
// ============================================================================

struct Resolver<'p, 'a> {
    pipeline: &'p ClinicalToPreclinical<'a>,
    targets: VocabularySet,
}

impl ExpansionResolver for Resolver<'_, '_> {
    fn alternatives(&self, chain: &Arc<Mapping>) -> Vec<(Arc<Mapping>, MappingItem)> {
        split_or(chain, or_split_penalty(chain.to().len()))
            .into_iter()
            .filter_map(|m| {
                let item = m.single_to_item().ok()?.clone();
                Some((m, item))
            })
            .collect()
    }

    fn may_climb_from(&self, _concept: &Concept, parents: &[Arc<Concept>]) -> bool {
        let config = self.pipeline.ctx.config;
        !parents.iter().any(|p| config.is_expansion_blocked(p.id))
    }

    fn may_descend_from(&self, concept: &Concept) -> bool {
        !self.pipeline.ctx.config.is_expansion_blocked(concept.id)
    }

    fn is_known(&self, neighbor: &Concept) -> bool {
        self.pipeline.ctx.index.is_known(neighbor, self.targets)
    }

    fn resolve(
        &mut self,
        candidate: &Arc<Mapping>,
        _neighbor: &Concept,
        state: &mut TraversalState,
    ) -> Vec<Arc<Mapping>> {
        self.pipeline
            .parts_to_preclinical(std::slice::from_ref(candidate), self.targets, state)
    }
}
