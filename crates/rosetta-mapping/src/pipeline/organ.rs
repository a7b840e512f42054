//! Organ crosswalk between anatomy vocabularies, and organ lookup for
//! clinical terms.
//!
//! ```text
//!   MA / SEND organ ──► SNOMED body structure ──► MA / SEND organ
//!          │ miss                    │ "Entire x" / "Part of x"
//!          ▼                         ▼
//!     anatomic parents          standardised to "x structure"
//! ```

use super::{is_unwanted_organ, single, split_or, Context};
use crate::aggregate::keep_best_per_target;
use crate::item::MappingItem;
use crate::mapping::{Direction, Mapping, SPLIT_PENALTY};
use rosetta_ontology::{Concept, ConceptId, Domain, Vocabulary, VocabularySet};
use std::collections::BTreeSet;
use std::sync::Arc;

const LOW_LEVEL_TERM_PENALTY: f64 = 0.1;
const NAME_MATCH_PENALTY: f64 = 0.1;

const STANDARDIZED: &str = "Standardized to 'structure' concept";

pub struct OrganCrosswalk<'a> {
    ctx: Context<'a>,
}

impl<'a> OrganCrosswalk<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Translate an organ into `target`, climbing the source's anatomy when
    /// it has no direct equivalent.
    pub fn map(&self, source: &Arc<Concept>, target: Vocabulary, budget: u32) -> Vec<Arc<Mapping>> {
        tracing::debug!(source = %source.human_readable(), %target, budget, "organ crosswalk");
        let direct = self.lookup(source, target);
        let found = if direct.is_empty() {
            let mut seen = BTreeSet::from([source.id]);
            self.climb(source, source, None, target, f64::from(budget), &mut seen)
        } else {
            direct
        };

        let split: Vec<Arc<Mapping>> = found
            .iter()
            .flat_map(|m| split_or(m, SPLIT_PENALTY))
            .collect();
        if split.is_empty() {
            return vec![Mapping::no_mapping(single(source)).shared()];
        }

        let standardized = split.iter().flat_map(|m| self.standardize(m)).collect();
        keep_best_per_target(standardized)
    }

    fn lookup(&self, concept: &Arc<Concept>, target: Vocabulary) -> Vec<Arc<Mapping>> {
        if VocabularySet::PRECLINICAL.contains(target) {
            self.ctx.index.intermediary_to_preclinical_items(concept, target)
        } else {
            self.ctx.index.preclinical_to_intermediary(concept).to_vec()
        }
    }

    fn climb(
        &self,
        source: &Arc<Concept>,
        concept: &Concept,
        preceding: Option<&Arc<Mapping>>,
        target: Vocabulary,
        budget: f64,
        seen: &mut BTreeSet<ConceptId>,
    ) -> Vec<Arc<Mapping>> {
        let mut out = Vec::new();
        for parent in self.ctx.store.parents(concept) {
            if !parent.is_anatomic_site() || !seen.insert(parent.id) {
                continue;
            }
            let hop = match preceding {
                Some(prev) => Mapping::after(prev, [single(&parent)]),
                None => Mapping::new([single(source)], [single(&parent)]),
            }
            .expanded(concept, &parent, Direction::Uphill)
            .shared();
            let total = hop.total_penalty().abs();
            if total > budget {
                continue;
            }

            let found = self.lookup(&parent, target);
            if !found.is_empty() {
                out.extend(found.iter().map(|m| m.rebased(&hop).shared()));
            } else if total < budget {
                out.extend(self.climb(source, &parent, Some(&hop), target, budget, seen));
            }
        }
        out
    }

    /// Generic SNOMED anatomy ("Entire x") is reported as its structure
    /// parent when it has one.
    fn standardize(&self, chain: &Arc<Mapping>) -> Vec<Arc<Mapping>> {
        let concept = match chain.single_to_item().and_then(|item| item.single_concept()) {
            Ok(c) if c.vocabulary == Vocabulary::Snomed && is_unwanted_organ(c) => c,
            _ => return vec![Arc::clone(chain)],
        };
        let parents = self.structure_parents(concept);
        if parents.is_empty() {
            return vec![Arc::clone(chain)];
        }
        parents
            .iter()
            .map(|p| {
                Mapping::after(chain, [single(p)])
                    .with_description(STANDARDIZED)
                    .shared()
            })
            .collect()
    }

    fn structure_parents(&self, concept: &Concept) -> Vec<Arc<Concept>> {
        self.ctx
            .store
            .parents(concept)
            .into_iter()
            .filter(|p| p.is_anatomic_site() && !is_unwanted_organ(p))
            .collect()
    }

    // ========================================================================
    // Clinical term → organ
    // ========================================================================

    /// SNOMED organs a clinical term is about.
    ///
    /// Tried in order until something is found: finding sites of the term's
    /// intermediary equivalents plus an organ named in the term itself, the
    /// same for its parents, its lower-level terms, and finally the organ of
    /// its system-organ classes.
    pub fn organs_for_clinical_term(&self, term: &Arc<Concept>) -> Vec<Arc<Mapping>> {
        tracing::debug!(term = %term.human_readable(), "finding organs");
        let store = self.ctx.store;
        let index = self.ctx.index;
        let organs = store.concepts_in_vocabulary(Vocabulary::Snomed, Some(Domain::SpecAnatomicSite));

        let mut results: Vec<Arc<Mapping>> = index
            .clinical_to_intermediary(term, None)
            .iter()
            .filter_map(|m| self.finding_sites(m))
            .collect();
        if let Some(matched) = name_match(term, &organs) {
            results.push(
                Mapping::new([single(term)], [single(&matched)])
                    .with_penalty(NAME_MATCH_PENALTY)
                    .with_description("MedDRA term has Anatomic Structure in its name")
                    .shared(),
            );
        }

        if results.is_empty() {
            for parent in store.parents(term) {
                let hop = Mapping::new([single(term)], [single(&parent)])
                    .expanded(term, &parent, Direction::Uphill)
                    .shared();
                if let Some(matched) = name_match(&parent, &organs) {
                    results.push(
                        Mapping::after(&hop, [single(&matched)])
                            .with_penalty(NAME_MATCH_PENALTY)
                            .with_description("MedDRA term has Anatomic Structure in its name")
                            .shared(),
                    );
                }
                results.extend(
                    index
                        .clinical_to_intermediary(&parent, Some(&hop))
                        .iter()
                        .filter_map(|m| self.finding_sites(m)),
                );
            }
        }

        if results.is_empty() && term.is_preferred_term() {
            for child in store.children(term) {
                let hop = Mapping::new([single(term)], [single(&child)])
                    .expanded(term, &child, Direction::Downhill)
                    .with_penalty(LOW_LEVEL_TERM_PENALTY)
                    .shared();
                results.extend(
                    index
                        .clinical_to_intermediary(&child, Some(&hop))
                        .iter()
                        .filter_map(|m| self.finding_sites(m)),
                );
            }
        }

        if results.is_empty() {
            let classes = store.system_organ_classes(&[term.id], false);
            for class in classes.get(&term.id).into_iter().flatten() {
                let Some(organ) = self
                    .ctx
                    .config
                    .organ_for_class(class.id)
                    .and_then(|id| store.concept(id))
                else {
                    continue;
                };
                let hop = Mapping::new([single(term)], [single(class)])
                    .expanded(term, class, Direction::Uphill)
                    .shared();
                results.push(
                    Mapping::after(&hop, [single(&organ)])
                        .with_description("Organ of system organ class")
                        .shared(),
                );
            }
        }

        let standardized: Vec<Arc<Mapping>> = results
            .iter()
            .flat_map(|m| self.standardize_items(m))
            .collect();
        if standardized.is_empty() {
            return vec![Mapping::no_mapping(single(term)).shared()];
        }
        keep_best_per_target(standardized)
    }

    /// Finding sites of every alternative of `chain`, unless it already
    /// reached anatomy.
    fn finding_sites(&self, chain: &Arc<Mapping>) -> Option<Arc<Mapping>> {
        if chain.to_concepts().iter().any(|c| c.is_anatomic_site()) {
            return None;
        }
        let sites: BTreeSet<MappingItem> = chain
            .to()
            .iter()
            .flat_map(|item| item.iter())
            .map(|c| self.ctx.store.finding_sites(c).into_iter().collect())
            .collect();
        let chain = Mapping::after(chain, sites).with_description("Has finding site");
        (!chain.is_no_mapping()).then(|| chain.shared())
    }

    /// Replace generic anatomy inside each alternative by its structure
    /// parents, keeping the other concepts on their own.
    fn standardize_items(&self, chain: &Arc<Mapping>) -> Vec<Arc<Mapping>> {
        let mut out = Vec::new();
        for item in chain.to() {
            if !item.iter().any(|c| is_unwanted_organ(c)) {
                out.push(Arc::clone(chain));
                continue;
            }
            for concept in item.iter() {
                if is_unwanted_organ(concept) {
                    out.extend(self.structure_parents(concept).iter().map(|p| {
                        Mapping::after(chain, [single(p)])
                            .with_description(STANDARDIZED)
                            .shared()
                    }));
                } else {
                    out.push(
                        Mapping::after(chain, [single(concept)])
                            .with_description("Removed non-'structure' concepts")
                            .shared(),
                    );
                }
            }
        }
        out
    }
}

/// The longest-named organ mentioned in `term`'s name. All-uppercase organ
/// names are abbreviations and never match.
fn name_match(term: &Concept, organs: &[Arc<Concept>]) -> Option<Arc<Concept>> {
    let term_name = term.name.to_lowercase();
    organs
        .iter()
        .filter(|o| o.name.chars().any(|c| c.is_lowercase()))
        .filter(|o| names_organ(&term_name, &o.name))
        .max_by_key(|o| o.name.len())
        .cloned()
}

fn names_organ(term_name: &str, organ_name: &str) -> bool {
    let organ = organ_name
        .to_lowercase()
        .replace("structure of the ", "")
        .replace("structure of ", "")
        .replace(" structure", "");
    let organ = organ.trim();
    if organ.is_empty() {
        return false;
    }
    term_name.ends_with(&format!(" {organ}"))
        || term_name.contains(&format!(" {organ} "))
        || term_name.starts_with(&format!("{organ} "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn organ(id: u32, name: &str) -> Arc<Concept> {
        Arc::new(Concept::new(id, name, id.to_string(), Vocabulary::Snomed, Domain::SpecAnatomicSite, "Body Structure"))
    }

    #[test]
    fn test_names_organ() {
        assert!(names_organ("liver disorder", "Liver structure"));
        assert!(names_organ("fatty liver", "Structure of the liver"));
        assert!(names_organ("acute liver failure", "Liver structure"));
        assert!(!names_organ("deliverance", "Liver structure"));
        assert!(!names_organ("liver", "Liver structure"));
        assert!(!names_organ("anything", "Structure"));
    }

    #[test]
    fn test_name_match_prefers_longest() {
        let term = Concept::new(1, "Small intestine haemorrhage", "1", Vocabulary::MedDra, Domain::Condition, "PT");
        let organs = vec![
            organ(10, "Intestine structure"),
            organ(11, "Small intestine structure"),
            organ(12, "SMALL INTESTINE"),
        ];
        assert_eq!(name_match(&term, &organs).map(|o| o.id.raw()), Some(11));
    }
}
