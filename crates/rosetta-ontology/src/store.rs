//! The read-only query surface the translation engine consumes.

use crate::concept::{Concept, ConceptId};
use crate::relationship::{Predicate, ResolvedRelationship};
use crate::vocabulary::{Domain, Vocabulary, VocabularySet};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Read-only access to the terminology graph.
///
/// Implementations must be safe to share between concurrent translation
/// requests. Every method returns results in a stable order so that
/// translations are reproducible.
pub trait OntologyStore: Send + Sync {
    fn concept(&self, id: ConceptId) -> Option<Arc<Concept>>;

    /// Concepts with exactly this code in any of `vocabularies`.
    fn concepts_by_code(&self, code: &str, vocabularies: VocabularySet) -> Vec<Arc<Concept>>;

    fn concepts_by_codes(&self, codes: &[String], vocabularies: VocabularySet) -> Vec<Arc<Concept>> {
        let mut seen = BTreeSet::new();
        codes
            .iter()
            .flat_map(|code| self.concepts_by_code(code, vocabularies))
            .filter(|c| seen.insert(c.id))
            .collect()
    }

    /// Case-insensitive exact name lookup.
    fn concepts_by_name(&self, name: &str, vocabularies: VocabularySet) -> Vec<Arc<Concept>>;

    /// Valid concepts of a vocabulary, optionally restricted to one domain.
    fn concepts_in_vocabulary(&self, vocabulary: Vocabulary, domain: Option<Domain>) -> Vec<Arc<Concept>>;

    /// Immediate ancestors.
    fn parents(&self, concept: &Concept) -> Vec<Arc<Concept>>;

    /// Immediate descendants.
    fn children(&self, concept: &Concept) -> Vec<Arc<Concept>>;

    /// Targets of `concept`'s outgoing relationships whose predicate is one of
    /// `predicates`, restricted to `vocabularies` and, when given, `domains`.
    fn related(
        &self,
        concept: &Concept,
        predicates: &[Predicate],
        vocabularies: VocabularySet,
        domains: Option<&[Domain]>,
    ) -> Vec<Arc<Concept>>;

    /// Concepts related to every one of `concepts`.
    fn related_to_all(
        &self,
        concepts: &[Arc<Concept>],
        predicates: &[Predicate],
        vocabularies: VocabularySet,
        domains: Option<&[Domain]>,
    ) -> Vec<Arc<Concept>> {
        let mut iter = concepts.iter();
        let Some(first) = iter.next() else {
            return Vec::new();
        };
        let mut common = self.related(first, predicates, vocabularies, domains);
        for concept in iter {
            if common.is_empty() {
                break;
            }
            let next: BTreeSet<ConceptId> = self
                .related(concept, predicates, vocabularies, domains)
                .iter()
                .map(|c| c.id)
                .collect();
            common.retain(|c| next.contains(&c.id));
        }
        common
    }

    fn finding_sites(&self, concept: &Concept) -> Vec<Arc<Concept>> {
        self.related(concept, &[Predicate::HasFindingSite], VocabularySet::ALL, None)
    }

    /// Inverse of [`OntologyStore::finding_sites`].
    fn findings_for_site(&self, site: &Concept) -> Vec<Arc<Concept>> {
        self.related(site, &[Predicate::FindingSiteOf], VocabularySet::ALL, None)
    }

    /// Concepts that share a relationship target with `concept`, both edges
    /// using one of `predicates`. Does not include `concept` itself unless the
    /// data relates it to a shared target twice.
    fn combination_partners(&self, concept: ConceptId, predicates: &[Predicate]) -> BTreeSet<ConceptId>;

    /// Bulk scan used to build lookup tables.
    fn relationships_between(
        &self,
        from: VocabularySet,
        to: VocabularySet,
        predicates: Option<&[Predicate]>,
    ) -> Vec<ResolvedRelationship>;

    /// Outgoing relationships of `concept` into `to`.
    fn relationships_from(&self, concept: &Concept, to: VocabularySet) -> Vec<ResolvedRelationship>;

    /// System-organ classes of clinical terms: the designated primary class
    /// when `primary` is set, otherwise every class among their ancestors.
    fn system_organ_classes(
        &self,
        ids: &[ConceptId],
        primary: bool,
    ) -> BTreeMap<ConceptId, Vec<Arc<Concept>>>;
}
