//! System-organ-class resolution for clinical terms and anatomy.

use super::{single, Context, OrganCrosswalk};
use crate::mapping::Mapping;
use rosetta_ontology::{Concept, ConceptId, Predicate, Vocabulary, VocabularySet};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub struct ClassResolver<'a> {
    ctx: Context<'a>,
}

impl<'a> ClassResolver<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Primary system-organ class of each term, one chain per source.
    ///
    /// Lower-level terms report the classes of their preferred terms.
    pub fn primary_classes(&self, sources: &[Arc<Concept>]) -> Vec<Arc<Mapping>> {
        sources
            .iter()
            .map(|source| {
                let classes = self.primary_classes_of(source);
                if classes.is_empty() {
                    return Mapping::no_mapping(single(source)).shared();
                }
                Mapping::new([single(source)], classes.iter().map(single))
                    .with_description("Primary system organ class")
                    .shared()
            })
            .collect()
    }

    fn primary_classes_of(&self, concept: &Arc<Concept>) -> BTreeSet<Arc<Concept>> {
        let store = self.ctx.store;
        let terms: Vec<ConceptId> = if concept.is_low_level_term() {
            store
                .parents(concept)
                .iter()
                .filter(|p| p.is_preferred_term())
                .map(|p| p.id)
                .collect()
        } else if concept.is_preferred_term() {
            vec![concept.id]
        } else {
            Vec::new()
        };
        store
            .system_organ_classes(&terms, true)
            .into_values()
            .flatten()
            .collect()
    }

    /// Most frequent system-organ class among the clinical equivalents of
    /// the findings located at the organ's intermediary equivalents.
    pub fn anatomy_to_system_organ_class(&self, source: &Arc<Concept>, budget: u32) -> Vec<Arc<Mapping>> {
        let store = self.ctx.store;
        let organs = OrganCrosswalk::new(self.ctx).map(source, Vocabulary::Snomed, budget);

        let mut out = Vec::new();
        for chain in organs.iter().filter(|m| !m.is_no_mapping()) {
            for site in chain.to_concepts() {
                let findings = store.findings_for_site(&site);
                let clinical: Vec<ConceptId> = findings
                    .iter()
                    .flat_map(|f| store.related(f, Predicate::ALL, VocabularySet::CLINICAL, None))
                    .map(|c| c.id)
                    .collect();

                let mut counts: BTreeMap<ConceptId, (usize, Arc<Concept>)> = BTreeMap::new();
                for class in store.system_organ_classes(&clinical, false).values().flatten() {
                    counts.entry(class.id).or_insert_with(|| (0, Arc::clone(class))).0 += 1;
                }
                // ascending ids: ties go to the lowest id
                let mut winner: Option<(usize, Arc<Concept>)> = None;
                for (count, class) in counts.into_values() {
                    if winner.as_ref().map_or(true, |(best, _)| count > *best) {
                        winner = Some((count, class));
                    }
                }
                let Some((count, class)) = winner else {
                    continue;
                };

                let description = format!(
                    "Found {} SNOMED findings with {} as finding site, translated these findings to {} MedDRA terms. \
                     The most frequent SOC for these MedDRA terms occurred {count} times",
                    findings.len(),
                    site.name,
                    clinical.len(),
                );
                out.push(
                    Mapping::after(chain, [single(&class)])
                        .with_description(description)
                        .shared(),
                );
            }
        }

        tracing::debug!(source = %source.human_readable(), classes = out.len(), "anatomy to system organ class");
        if out.is_empty() {
            return vec![Mapping::no_mapping(single(source)).shared()];
        }
        out
    }
}
