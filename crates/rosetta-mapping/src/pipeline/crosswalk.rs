//! Preclinical ↔ preclinical crosswalk through the intermediary ontology.

use super::{single, Context};
use crate::aggregate::keep_best_per_target;
use crate::mapping::Mapping;
use rosetta_ontology::{Concept, Vocabulary, VocabularySet};
use std::sync::Arc;

pub struct PreclinicalCrosswalk<'a> {
    ctx: Context<'a>,
}

impl<'a> PreclinicalCrosswalk<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// HPATH findings are translated to SEND, everything else to eTox.
    pub fn target_family(source: &Concept) -> VocabularySet {
        if source.vocabulary == Vocabulary::Hpath {
            VocabularySet::SEND
        } else {
            VocabularySet::ETOX
        }
    }

    pub fn map(&self, source: &Arc<Concept>) -> Vec<Arc<Mapping>> {
        let index = self.ctx.index;
        let targets = Self::target_family(source);
        let found: Vec<Arc<Mapping>> = index
            .preclinical_to_intermediary(source)
            .iter()
            .flat_map(|chain| {
                chain
                    .to()
                    .iter()
                    .flat_map(move |item| index.intermediary_to_preclinical(item, chain, targets))
            })
            .collect();
        if found.is_empty() {
            return vec![Mapping::no_mapping(single(source)).shared()];
        }
        keep_best_per_target(found)
    }
}
