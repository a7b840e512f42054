//! Bounded hierarchical expansion over the intermediary ontology.
//!
//! When the Reference Index has no direct hit for a combination, its concepts
//! are replaced one at a time by their parents (uphill) or children (downhill)
//! and every candidate that becomes resolvable is handed back to the
//! pipeline:
//!
//! ```text
//!   {Liver structure, Inflammation}
//!        │ uphill (1.0)                    │ downhill (1.0)
//!        ▼                                 ▼
//!   {Abdominal organ structure, ...}   {Hepatic lobule, ...}
//!        │ known? ──► resolver.resolve()
//!        │ |total| < budget ──► recurse, same direction only
//! ```
//!
//! The search stops when the budget is spent, when no unexplored neighbours
//! remain, or when the excluded set reaches the expansion cap.

use crate::item::MappingItem;
use crate::mapping::{Direction, Mapping};
use ahash::AHashMap;
use roaring::RoaringBitmap;
use rosetta_ontology::{Concept, ConceptId, OntologyStore};
use std::sync::Arc;

/// Request-scoped search state.
///
/// `excluded` is reset for every top-level expansion; the memos live for the
/// whole request.
#[derive(Debug, Default)]
pub struct TraversalState {
    excluded: RoaringBitmap,
    /// Cheapest `|total|` at which a combination was reached by expansion.
    visited: AHashMap<Vec<ConceptId>, f64>,
    /// Cheapest `|total|` at which a combination was resolved.
    resolved: AHashMap<Vec<ConceptId>, f64>,
    cap_reported: bool,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluded_len(&self) -> u64 {
        self.excluded.len()
    }

    pub fn is_excluded(&self, id: ConceptId) -> bool {
        self.excluded.contains(id.raw())
    }

    /// Record that `key` was reached at `cost`. False when it was already
    /// reached at the same or a lower cost.
    fn visit(&mut self, key: Vec<ConceptId>, cost: f64) -> bool {
        claim(&mut self.visited, key, cost)
    }

    /// Record that `key` is being resolved at `cost`. False when it already
    /// was at the same or a lower cost.
    pub fn claim_resolution(&mut self, key: Vec<ConceptId>, cost: f64) -> bool {
        claim(&mut self.resolved, key, cost)
    }
}

fn claim(memo: &mut AHashMap<Vec<ConceptId>, f64>, key: Vec<ConceptId>, cost: f64) -> bool {
    let cost = cost.abs();
    match memo.get(&key) {
        Some(seen) if *seen <= cost => false,
        _ => {
            memo.insert(key, cost);
            true
        }
    }
}

/// The pipeline-specific half of an expansion.
pub trait ExpansionResolver {
    /// The (chain, item) pairs to expand from. A chain with several
    /// alternatives may be split first.
    fn alternatives(&self, chain: &Arc<Mapping>) -> Vec<(Arc<Mapping>, MappingItem)>;

    /// Whether `concept` may be replaced by one of `parents`.
    fn may_climb_from(&self, _concept: &Concept, _parents: &[Arc<Concept>]) -> bool {
        true
    }

    /// Whether `concept` may be replaced by one of its children.
    fn may_descend_from(&self, _concept: &Concept) -> bool {
        true
    }

    /// Whether a candidate containing `neighbor` is worth resolving.
    fn is_known(&self, neighbor: &Concept) -> bool;

    /// Turn a candidate into result chains.
    fn resolve(
        &mut self,
        candidate: &Arc<Mapping>,
        neighbor: &Concept,
        state: &mut TraversalState,
    ) -> Vec<Arc<Mapping>>;
}

/// Bounded expansion driver.
pub struct Expander<'a, S: OntologyStore + ?Sized> {
    store: &'a S,
    budget: f64,
    cap: usize,
}

impl<'a, S: OntologyStore + ?Sized> Expander<'a, S> {
    pub fn new(store: &'a S, budget: u32, cap: usize) -> Self {
        Self {
            store,
            budget: f64::from(budget),
            cap,
        }
    }

    /// Expand `chain` in both directions and collect every resolution.
    pub fn expand<R: ExpansionResolver>(
        &self,
        chain: &Arc<Mapping>,
        resolver: &mut R,
        state: &mut TraversalState,
    ) -> Vec<Arc<Mapping>> {
        state.excluded.clear();
        let mut out = Vec::new();
        self.expand_and_map(chain, None, resolver, state, &mut out);
        out
    }

    fn expand_and_map<R: ExpansionResolver>(
        &self,
        chain: &Arc<Mapping>,
        direction: Option<Direction>,
        resolver: &mut R,
        state: &mut TraversalState,
        out: &mut Vec<Arc<Mapping>>,
    ) {
        if chain.total_penalty().abs() >= self.budget {
            return;
        }
        for (base, item) in resolver.alternatives(chain) {
            for concept in item.iter() {
                let excluded = state.is_excluded(concept.id);
                if !(direction == Some(Direction::Downhill) && excluded) {
                    let parents = self.store.parents(concept);
                    if resolver.may_climb_from(concept, &parents) {
                        self.map_expansion(&base, &item, concept, &parents, Direction::Uphill, resolver, state, out);
                    }
                }
                if !(direction == Some(Direction::Uphill) && excluded) && resolver.may_descend_from(concept) {
                    let children = self.store.children(concept);
                    self.map_expansion(&base, &item, concept, &children, Direction::Downhill, resolver, state, out);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn map_expansion<R: ExpansionResolver>(
        &self,
        base: &Arc<Mapping>,
        item: &MappingItem,
        expanded: &Concept,
        neighbors: &[Arc<Concept>],
        direction: Direction,
        resolver: &mut R,
        state: &mut TraversalState,
        out: &mut Vec<Arc<Mapping>>,
    ) {
        for neighbor in neighbors {
            let next = item.replace(expanded, Arc::clone(neighbor));
            let candidate = Mapping::after(base, [next.clone()])
                .expanded(expanded, neighbor, direction)
                .shared();
            let total = candidate.total_penalty();
            if !state.visit(next.ids(), total) {
                continue;
            }

            if resolver.is_known(neighbor) {
                out.extend(resolver.resolve(&candidate, neighbor, state));
            }

            if total.abs() < self.budget && !state.is_excluded(neighbor.id) {
                if state.excluded.len() as usize >= self.cap {
                    if !state.cap_reported {
                        state.cap_reported = true;
                        tracing::warn!(
                            cap = self.cap,
                            concept = %expanded.human_readable(),
                            "expansion cap reached, search truncated"
                        );
                    }
                    continue;
                }
                state.excluded.insert(neighbor.id.raw());
                self.expand_and_map(&candidate, Some(direction), resolver, state, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosetta_ontology::{Domain, OntologyGraph, Vocabulary};

    fn concept(id: u32, name: &str) -> Concept {
        Concept::new(id, name, id.to_string(), Vocabulary::Snomed, Domain::SpecAnatomicSite, "Body Structure")
    }

    /// A chain 1 → 2 → ... → n, each the parent of the previous.
    fn ladder(n: u32) -> OntologyGraph {
        let mut g = OntologyGraph::new();
        for i in 1..=n {
            g.add_concept(concept(i, &format!("Rung {i}")));
        }
        for i in 1..n {
            g.add_parent(ConceptId::new(i), ConceptId::new(i + 1));
        }
        g
    }

    /// Resolves every candidate reaching `target`.
    struct Target {
        target: ConceptId,
        calls: usize,
    }

    impl ExpansionResolver for Target {
        fn alternatives(&self, chain: &Arc<Mapping>) -> Vec<(Arc<Mapping>, MappingItem)> {
            chain
                .to()
                .iter()
                .map(|item| (Arc::clone(chain), item.clone()))
                .collect()
        }

        fn is_known(&self, neighbor: &Concept) -> bool {
            neighbor.id == self.target
        }

        fn resolve(&mut self, candidate: &Arc<Mapping>, _: &Concept, _: &mut TraversalState) -> Vec<Arc<Mapping>> {
            self.calls += 1;
            vec![Arc::clone(candidate)]
        }
    }

    fn start(g: &OntologyGraph, id: u32) -> Arc<Mapping> {
        let c = g.concept(ConceptId::new(id)).unwrap();
        let item = MappingItem::single(c);
        Mapping::new([item.clone()], [item]).shared()
    }

    #[test]
    fn test_zero_budget_never_expands() {
        let g = ladder(3);
        let mut resolver = Target { target: ConceptId::new(2), calls: 0 };
        let mut state = TraversalState::new();
        let found = Expander::new(&g, 0, 120).expand(&start(&g, 1), &mut resolver, &mut state);
        assert!(found.is_empty());
        assert_eq!(resolver.calls, 0);
    }

    #[test]
    fn test_budget_bounds_depth() {
        let g = ladder(5);
        let mut state = TraversalState::new();

        let mut near = Target { target: ConceptId::new(3), calls: 0 };
        let found = Expander::new(&g, 2, 120).expand(&start(&g, 1), &mut near, &mut state);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].levels(), 3);
        assert_eq!(found[0].description(), "Uphill mapping of Rung 2");

        let mut far = Target { target: ConceptId::new(4), calls: 0 };
        let mut state = TraversalState::new();
        assert!(Expander::new(&g, 2, 120).expand(&start(&g, 1), &mut far, &mut state).is_empty());
    }

    #[test]
    fn test_direction_is_kept_after_first_step() {
        // 1 → 2, and 2 has a second child 3. Going up to 2 must not come back
        // down to 3.
        let mut g = ladder(2);
        g.add_concept(concept(3, "Sibling"));
        g.add_parent(ConceptId::new(3), ConceptId::new(2));

        let mut resolver = Target { target: ConceptId::new(3), calls: 0 };
        let mut state = TraversalState::new();
        let found = Expander::new(&g, 5, 120).expand(&start(&g, 1), &mut resolver, &mut state);
        assert!(found.is_empty());
    }

    #[test]
    fn test_cap_limits_exploration() {
        let g = ladder(10);
        let mut resolver = Target { target: ConceptId::new(10), calls: 0 };
        let mut state = TraversalState::new();
        let found = Expander::new(&g, 20, 3).expand(&start(&g, 1), &mut resolver, &mut state);
        assert!(found.is_empty());
        assert_eq!(state.excluded_len(), 3);
    }

    #[test]
    fn test_memo_prefers_cheaper_paths() {
        let mut state = TraversalState::new();
        let key = vec![ConceptId::new(1)];
        assert!(state.claim_resolution(key.clone(), 1.0));
        assert!(!state.claim_resolution(key.clone(), 1.0));
        assert!(state.claim_resolution(key.clone(), 0.1));
        assert!(!state.claim_resolution(key, -2.0));
    }
}
