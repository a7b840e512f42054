//! Reference Index: lookup tables built once from the ontology.
//!
//! ```text
//!   intermediary combination key ──► [ManualMapping]      (exact lookups)
//!   intermediary code            ──► [[combination codes]] (partial, eTox / SEND)
//!   clinical code                ──► [ManualMapping]      (clinical → intermediary)
//!   preclinical concept id       ──► [Mapping]            (preclinical → intermediary)
//! ```
//!
//! The index is immutable after [`ReferenceIndex::build`] and is shared
//! between requests through `Arc`.
//!
//! Combination keys are the sorted concept codes of a combination joined
//! with `-`, repeats included. Every lookup goes through [`combination_key`].

use crate::item::MappingItem;
use crate::mapping::Mapping;
use ahash::AHashMap;
use rayon::prelude::*;
use rosetta_ontology::{
    Concept, ConceptId, GroupKey, OntologyStore, Predicate, ResolvedRelationship, Vocabulary,
    VocabularySet,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

/// Provenance of curated intermediary → preclinical mappings without a label.
pub const DEFAULT_SOURCE: &str = "eTransafe";
/// Provenance of clinical → intermediary mappings without a label.
pub const DEFAULT_CLINICAL_SOURCE: &str = "Athena";

const KEY_DELIMITER: &str = "-";
const IMPRECISE_PENALTY: f64 = 0.1;

/// Canonical key of a combination: sorted codes joined with `-`. Repeated
/// codes are kept.
pub fn combination_key<'a>(codes: impl IntoIterator<Item = &'a str>) -> String {
    let mut codes: Vec<&str> = codes.into_iter().collect();
    codes.sort_unstable();
    codes.join(KEY_DELIMITER)
}

fn item_key(item: &MappingItem) -> String {
    combination_key(item.iter().map(|c| c.code.as_str()))
}

/// Penalty of a curated mapping with this predicate.
fn predicate_penalty(predicate: Predicate) -> f64 {
    if predicate == Predicate::Exact {
        0.0
    } else {
        IMPRECISE_PENALTY
    }
}

/// A precomputed reference entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManualMapping {
    pub item: MappingItem,
    pub predicate: Predicate,
    pub source: String,
}

impl ManualMapping {
    fn reaches(&self, vocabularies: VocabularySet) -> bool {
        self.item.iter().any(|c| vocabularies.contains(c.vocabulary))
    }
}

/// Table sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub combinations: usize,
    pub etox_partial: usize,
    pub send_partial: usize,
    pub clinical: usize,
    pub preclinical: usize,
}

// ============================================================================
// ReferenceIndex
// ============================================================================

#[derive(Debug, Default)]
pub struct ReferenceIndex {
    /// Combination key → curated preclinical items.
    intermediary_to_preclinical: AHashMap<String, Vec<ManualMapping>>,
    /// Intermediary code → code lists of every eTox combination it is part of.
    etox_partial: AHashMap<String, Vec<Vec<String>>>,
    /// Same for SEND.
    send_partial: AHashMap<String, Vec<Vec<String>>>,
    /// Clinical code → intermediary items.
    clinical_to_intermediary: AHashMap<String, Vec<ManualMapping>>,
    /// Preclinical concept → root chains into the intermediary ontology.
    preclinical_to_intermediary: AHashMap<ConceptId, Vec<Arc<Mapping>>>,
}

impl ReferenceIndex {
    /// Scan the store and build every table.
    pub fn build<S: OntologyStore + ?Sized>(store: &S) -> Self {
        let start = Instant::now();
        let mut index = Self::default();
        index.load_intermediary_to_preclinical(store);
        index.load_clinical_to_intermediary(store);
        index.load_preclinical_to_intermediary(store);

        let stats = index.stats();
        tracing::info!(
            combinations = stats.combinations,
            etox_partial = stats.etox_partial,
            send_partial = stats.send_partial,
            clinical = stats.clinical,
            preclinical = stats.preclinical,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "reference index built"
        );
        index
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            combinations: self.intermediary_to_preclinical.len(),
            etox_partial: self.etox_partial.len(),
            send_partial: self.send_partial.len(),
            clinical: self.clinical_to_intermediary.len(),
            preclinical: self.preclinical_to_intermediary.len(),
        }
    }

    fn load_intermediary_to_preclinical<S: OntologyStore + ?Sized>(&mut self, store: &S) {
        let relationships =
            store.relationships_between(VocabularySet::INTERMEDIARY, VocabularySet::PRECLINICAL, None);

        for group in group_relationships(relationships).into_values() {
            let Some(first) = group.first() else {
                continue;
            };
            let mut codes: Vec<&str> = group.iter().map(|r| r.one.code.as_str()).collect();
            codes.sort_unstable();
            let key = combination_key(codes.iter().copied());
            let item: MappingItem = group.iter().map(|r| Arc::clone(&r.two)).collect();
            let manual = ManualMapping {
                item,
                predicate: first.predicate,
                source: first
                    .source
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            };

            if codes.len() > 1 {
                let hit: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
                let families = [
                    (manual.reaches(VocabularySet::ETOX), &mut self.etox_partial),
                    (manual.reaches(VocabularySet::SEND), &mut self.send_partial),
                ];
                for (reaches, table) in families {
                    if !reaches {
                        continue;
                    }
                    for code in &codes {
                        let hits = table.entry(code.to_string()).or_default();
                        if !hits.contains(&hit) {
                            hits.push(hit.clone());
                        }
                    }
                }
            }

            self.intermediary_to_preclinical
                .entry(key)
                .or_default()
                .push(manual);
        }
    }

    fn load_clinical_to_intermediary<S: OntologyStore + ?Sized>(&mut self, store: &S) {
        let relationships = store.relationships_between(
            VocabularySet::CLINICAL,
            VocabularySet::INTERMEDIARY,
            Some(&[Predicate::MapsTo]),
        );

        for rel in relationships.into_iter().filter(|r| r.invalid_reason.is_none()) {
            let source = rel
                .source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CLINICAL_SOURCE.to_string());
            let item = MappingItem::single(rel.two);
            let entries = self
                .clinical_to_intermediary
                .entry(rel.one.code.clone())
                .or_default();

            match entries.iter_mut().find(|m| m.item == item) {
                Some(existing) => {
                    let merged = existing.source.replace(" and", ",");
                    existing.source = format!("{merged} and {source}");
                }
                None => entries.push(ManualMapping {
                    item,
                    predicate: rel.predicate,
                    source,
                }),
            }
        }
    }

    fn load_preclinical_to_intermediary<S: OntologyStore + ?Sized>(&mut self, store: &S) {
        let concepts: Vec<Arc<Concept>> = VocabularySet::PRECLINICAL
            .iter()
            .flat_map(|v| store.concepts_in_vocabulary(v, None))
            .collect();

        let resolved: Vec<(ConceptId, Vec<Arc<Mapping>>)> = concepts
            .par_iter()
            .map(|concept| (concept.id, preclinical_chains(store, concept)))
            .filter(|(_, chains)| !chains.is_empty())
            .collect();
        self.preclinical_to_intermediary = resolved.into_iter().collect();
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    fn partial_family(&self, vocabularies: VocabularySet) -> &AHashMap<String, Vec<Vec<String>>> {
        if !vocabularies.is_empty() && vocabularies.is_subset(VocabularySet::ETOX) {
            &self.etox_partial
        } else {
            &self.send_partial
        }
    }

    /// Whether `concept` resolves into `vocabularies`, exactly or as part of a
    /// combination.
    pub fn is_known(&self, concept: &Concept, vocabularies: VocabularySet) -> bool {
        let exact = self
            .intermediary_to_preclinical
            .get(&concept.code)
            .is_some_and(|entries| entries.iter().any(|m| m.reaches(vocabularies)));
        exact || self.partial_family(vocabularies).contains_key(&concept.code)
    }

    /// Curated translations of the whole combination `item`, continuing
    /// `preceding`.
    pub fn intermediary_to_preclinical(
        &self,
        item: &MappingItem,
        preceding: &Arc<Mapping>,
        vocabularies: VocabularySet,
    ) -> Vec<Arc<Mapping>> {
        let Some(entries) = self.intermediary_to_preclinical.get(&item_key(item)) else {
            return Vec::new();
        };
        let names = item
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" AND ");
        entries
            .iter()
            .filter(|m| m.reaches(vocabularies))
            .map(|m| {
                Mapping::after(preceding, [m.item.clone()])
                    .with_penalty(predicate_penalty(m.predicate))
                    .with_description(format!(
                        "{names} {} to {}",
                        m.predicate,
                        m.item.human_readable_simple()
                    ))
                    .shared()
            })
            .collect()
    }

    /// Curated translations of the single `concept` into one vocabulary, as
    /// chain roots.
    pub fn intermediary_to_preclinical_items(
        &self,
        concept: &Arc<Concept>,
        vocabulary: Vocabulary,
    ) -> Vec<Arc<Mapping>> {
        let Some(entries) = self.intermediary_to_preclinical.get(&concept.code) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter(|m| m.item.iter().any(|c| c.vocabulary == vocabulary))
            .map(|m| {
                Mapping::new([MappingItem::single(Arc::clone(concept))], [m.item.clone()])
                    .with_penalty(predicate_penalty(m.predicate))
                    .with_description(format!(
                        "{} {} to {}",
                        concept.name,
                        m.predicate,
                        m.item.human_readable_simple()
                    ))
                    .shared()
            })
            .collect()
    }

    /// Best-subset lookups: for each concept of `concepts` that takes part in
    /// a larger curated combination, the translations of that combination,
    /// penalised by the number of its concepts missing from `concepts`.
    ///
    /// Each element is one combination's alternatives.
    pub fn partial(
        &self,
        concepts: &MappingItem,
        preceding: &Arc<Mapping>,
        vocabularies: VocabularySet,
    ) -> Vec<Vec<Arc<Mapping>>> {
        let family = self.partial_family(vocabularies);
        let mut out = Vec::new();
        for c in concepts.iter() {
            let Some(hits) = family.get(&c.code) else {
                continue;
            };
            for hit in hits {
                let matches = concepts.iter().filter(|k| hit.contains(&k.code)).count();
                let deviation = hit.len().saturating_sub(matches);
                let key = combination_key(hit.iter().map(String::as_str));
                let Some(entries) = self.intermediary_to_preclinical.get(&key) else {
                    continue;
                };
                let alternatives: Vec<Arc<Mapping>> = entries
                    .iter()
                    .filter(|m| m.reaches(vocabularies))
                    .filter(|m| match m.item.single_concept() {
                        Ok(only) => only.domain == c.domain,
                        Err(_) => true,
                    })
                    .map(|m| {
                        Mapping::after(preceding, [m.item.clone()])
                            .with_penalty(predicate_penalty(m.predicate) + deviation as f64)
                            .with_description(format!(
                                "{} {} to {} neglecting {deviation} terms",
                                c.name,
                                m.predicate,
                                m.item.human_readable_simple()
                            ))
                            .shared()
                    })
                    .collect();
                out.push(alternatives);
            }
        }
        out
    }

    /// Each concept of `concepts` translated on its own. Combinations that
    /// do not resolve are left out.
    pub fn single_concepts(
        &self,
        concepts: &MappingItem,
        preceding: &Arc<Mapping>,
        vocabularies: VocabularySet,
    ) -> Vec<Vec<Arc<Mapping>>> {
        concepts
            .iter()
            .map(|c| {
                let step = if preceding.is_to_single_concept() {
                    Arc::clone(preceding)
                } else {
                    Mapping::after(preceding, [MappingItem::single(Arc::clone(c))])
                        .with_description("Get single concept")
                        .shared()
                };
                let item = MappingItem::single(Arc::clone(c));
                self.intermediary_to_preclinical(&item, &step, vocabularies)
            })
            .filter(|found| !found.is_empty())
            .collect()
    }

    /// Curated intermediary equivalents of a clinical term, as chains rooted
    /// at `preceding` or, without one, at the term itself.
    pub fn clinical_to_intermediary(
        &self,
        concept: &Arc<Concept>,
        preceding: Option<&Arc<Mapping>>,
    ) -> Vec<Arc<Mapping>> {
        let Some(entries) = self.clinical_to_intermediary.get(&concept.code) else {
            return Vec::new();
        };
        entries
            .iter()
            .map(|m| {
                let step = match preceding {
                    Some(prev) => Mapping::after(prev, [m.item.clone()]),
                    None => Mapping::new([MappingItem::single(Arc::clone(concept))], [m.item.clone()]),
                };
                step.with_description(format!("{} ({})", m.predicate, m.source))
                    .shared()
            })
            .collect()
    }

    /// Root chains from a preclinical concept into the intermediary ontology.
    pub fn preclinical_to_intermediary(&self, concept: &Concept) -> &[Arc<Mapping>] {
        self.preclinical_to_intermediary
            .get(&concept.id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Batch relationships by their combination group, in a stable order.
fn group_relationships(
    relationships: Vec<ResolvedRelationship>,
) -> BTreeMap<GroupKey, Vec<ResolvedRelationship>> {
    let mut groups: BTreeMap<GroupKey, Vec<ResolvedRelationship>> = BTreeMap::new();
    for rel in relationships.into_iter().filter(|r| r.invalid_reason.is_none()) {
        groups.entry(rel.group_key()).or_default().push(rel);
    }
    groups
}

/// One root chain per predicate, whose alternatives are the groups reached
/// with it.
fn preclinical_chains<S: OntologyStore + ?Sized>(store: &S, concept: &Arc<Concept>) -> Vec<Arc<Mapping>> {
    let relationships = store.relationships_from(concept, VocabularySet::INTERMEDIARY);
    let mut by_predicate: BTreeMap<Predicate, BTreeSet<MappingItem>> = BTreeMap::new();
    for group in group_relationships(relationships).into_values() {
        let Some(first) = group.first() else {
            continue;
        };
        let item: MappingItem = group.iter().map(|r| Arc::clone(&r.two)).collect();
        by_predicate.entry(first.predicate).or_default().insert(item);
    }

    by_predicate
        .into_iter()
        .map(|(predicate, items)| {
            let targets: BTreeSet<String> = items.iter().map(MappingItem::human_readable_simple).collect();
            let description = format!(
                "{} {predicate} to {}",
                concept.name,
                targets.into_iter().collect::<Vec<_>>().join(" OR ")
            );
            Mapping::new([MappingItem::single(Arc::clone(concept))], items)
                .with_penalty(predicate_penalty(predicate))
                .with_description(description)
                .shared()
        })
        .collect()
}
