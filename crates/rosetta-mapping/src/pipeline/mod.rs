//! Vocabulary-pair translation pipelines.
//!
//! Every pipeline first asks the [`ReferenceIndex`](crate::ReferenceIndex) and
//! only falls back to the [`Expander`](crate::traversal::Expander) on a miss.

pub mod class;
pub mod clinical;
pub mod crosswalk;
pub mod organ;
pub mod preclinical;

use crate::config::EngineConfig;
use crate::index::ReferenceIndex;
use crate::item::MappingItem;
use crate::mapping::{Mapping, DESCR_TO_SINGLE_OR, SPLIT_PENALTY};
use rosetta_ontology::{Concept, OntologyStore};
use std::collections::BTreeSet;
use std::sync::Arc;

pub use class::ClassResolver;
pub use clinical::ClinicalToPreclinical;
pub use crosswalk::PreclinicalCrosswalk;
pub use organ::OrganCrosswalk;
pub use preclinical::PreclinicalToClinical;

/// Shared read-only collaborators of a pipeline run.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub store: &'a dyn OntologyStore,
    pub index: &'a ReferenceIndex,
    pub config: &'a EngineConfig,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a dyn OntologyStore, index: &'a ReferenceIndex, config: &'a EngineConfig) -> Self {
        Self { store, index, config }
    }
}

pub(crate) fn single(concept: &Arc<Concept>) -> MappingItem {
    MappingItem::single(Arc::clone(concept))
}

/// Penalty of splitting `alternatives` OR-alternatives apart.
pub(crate) fn or_split_penalty(alternatives: usize) -> f64 {
    SPLIT_PENALTY * alternatives.saturating_sub(1) as f64
}

/// One chain per alternative of `chain`, each charged `penalty`. Chains with
/// at most one alternative are returned as they are.
pub(crate) fn split_or(chain: &Arc<Mapping>, penalty: f64) -> Vec<Arc<Mapping>> {
    if chain.to().len() <= 1 {
        return vec![Arc::clone(chain)];
    }
    chain
        .to()
        .iter()
        .map(|item| {
            Mapping::after(chain, [item.clone()])
                .with_penalty(penalty)
                .with_description(DESCR_TO_SINGLE_OR)
                .shared()
        })
        .collect()
}

/// A chain that reached intermediary concepts but nothing beyond them.
pub(crate) fn dead_end(
    source: impl IntoIterator<Item = MappingItem>,
    reached: &[Arc<Mapping>],
    failure: &str,
) -> Arc<Mapping> {
    let reached: BTreeSet<&MappingItem> = reached.iter().flat_map(|m| m.to().iter()).collect();
    let reached = reached
        .into_iter()
        .map(MappingItem::human_readable)
        .collect::<Vec<_>>()
        .join("  OR  ");
    tracing::debug!(reached = %reached, "{failure}");
    Mapping::new(source, [])
        .with_description(format!("Mapped source concepts to {reached} but {failure}"))
        .shared()
}

/// Generic anatomy terms ("Entire x", "Part of x") that should be reported
/// as their structure concept.
pub(crate) fn is_unwanted_organ(concept: &Concept) -> bool {
    let name = concept.name.to_lowercase();
    !name.contains("structure")
        && (name.contains("entire ")
            || name.contains(" entire")
            || name.contains("part ")
            || name.contains(" part"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rosetta_ontology::{Domain, Vocabulary};

    fn organ(id: u32, name: &str) -> Concept {
        Concept::new(id, name, id.to_string(), Vocabulary::Snomed, Domain::SpecAnatomicSite, "Body Structure")
    }

    #[test]
    fn test_unwanted_organ_names() {
        assert!(is_unwanted_organ(&organ(1, "Entire liver")));
        assert!(is_unwanted_organ(&organ(2, "Part of heart")));
        assert!(!is_unwanted_organ(&organ(3, "Liver structure")));
        assert!(!is_unwanted_organ(&organ(4, "Entire liver structure")));
        assert!(!is_unwanted_organ(&organ(5, "Parietal bone")));
    }

    #[test]
    fn test_split_or_penalises_each_alternative() {
        let items: Vec<MappingItem> = (1..=3).map(|i| MappingItem::single(Arc::new(organ(i, "x")))).collect();
        let chain = Mapping::new([items[0].clone()], items.clone()).shared();
        let split = split_or(&chain, or_split_penalty(chain.to().len()));
        assert_eq!(split.len(), 3);
        for m in &split {
            assert_eq!(m.to().len(), 1);
            assert_relative_eq!(m.total_penalty(), 0.2);
            assert_eq!(m.description(), DESCR_TO_SINGLE_OR);
        }
    }
}
