//! Preclinical → Clinical (SEND / eTox finding, optional organ → MedDRA PT).
//!
//! The finding and organ are taken into the intermediary ontology separately
//! and combined pairwise. Each combination is then brought to clinical terms
//! directly, through a template recombination into a single clinical finding,
//! through bounded expansion, and through subsets with one concept dropped.

use super::{dead_end, single, Context};
use crate::aggregate::keep_best_per_target;
use crate::item::MappingItem;
use crate::mapping::{Direction, Mapping, DESCR_TO_SINGLE_OR};
use crate::traversal::{ExpansionResolver, Expander, TraversalState};
use ahash::AHashMap;
use rosetta_ontology::{
    Concept, ConceptClass, ConceptId, Domain, OntologyStore, Predicate, Vocabulary, VocabularySet,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const INVERTED_PENALTY: f64 = 0.1;
const LOW_LEVEL_TERM_PENALTY: f64 = 0.1;
const REDUCED_SET_PENALTY: f64 = 1.0;

const FAILURE: &str = "failed to find MedDRA terms";

pub struct PreclinicalToClinical<'a> {
    ctx: Context<'a>,
}

impl<'a> PreclinicalToClinical<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self { ctx }
    }

    /// Translate a finding, optionally located in `organ`, within `budget`.
    pub fn map(&self, finding: &Arc<Concept>, organ: Option<&Arc<Concept>>, budget: u32) -> Vec<Arc<Mapping>> {
        let source = MappingItem::new(std::iter::once(Arc::clone(finding)).chain(organ.cloned()));
        tracing::debug!(source = %source.human_readable(), budget, "preclinical to clinical");

        let index = self.ctx.index;
        let findings = index.preclinical_to_intermediary(finding);
        if findings.is_empty() {
            return vec![Mapping::no_mapping(source).shared()];
        }
        let organs = organ
            .map(|o| index.preclinical_to_intermediary(o))
            .unwrap_or_default();
        let intermediary = merge(&source, organs, findings, organ.is_some());

        let mut request = Request {
            ctx: self.ctx,
            is_lab: finding.vocabulary == Vocabulary::LaboratoryTestName,
            partners: AHashMap::new(),
        };
        let expander = Expander::new(self.ctx.store, budget, self.ctx.config.expansion_cap());
        let mut state = TraversalState::new();
        let mut results = Vec::new();
        for chain in &intermediary {
            results.extend(request.to_clinical(chain));
            results.extend(request.template_mapping(chain));
            results.extend(expander.expand(chain, &mut request, &mut state));
            for item in chain.to() {
                request.reduced_set(chain, item, &expander, &mut state, &mut results);
            }
        }
        self.clean_up(&source, &intermediary, results)
    }

    /// Lift lower-level terms to their preferred terms, drop anything that is
    /// neither, and keep the best chain per result.
    fn clean_up(&self, source: &MappingItem, intermediary: &[Arc<Mapping>], results: Vec<Arc<Mapping>>) -> Vec<Arc<Mapping>> {
        let lifted: Vec<Arc<Mapping>> = results.iter().flat_map(|m| self.llt_to_pt(m)).collect();
        let best = keep_best_per_target(lifted);
        if best.is_empty() {
            return vec![dead_end([source.clone()], intermediary, FAILURE)];
        }
        best
    }

    fn llt_to_pt(&self, chain: &Arc<Mapping>) -> Vec<Arc<Mapping>> {
        let Ok(concept) = chain.single_to_item().and_then(MappingItem::single_concept) else {
            return Vec::new();
        };
        if concept.is_preferred_term() {
            return vec![Arc::clone(chain)];
        }
        if !concept.is_low_level_term() {
            return Vec::new();
        }
        self.ctx
            .store
            .parents(concept)
            .iter()
            .map(|parent| {
                Mapping::after(chain, [single(parent)])
                    .expanded(concept, parent, Direction::Uphill)
                    .with_penalty(LOW_LEVEL_TERM_PENALTY)
                    .shared()
            })
            .collect()
    }
}

/// Pairwise combination of organ and finding chains, rooted at `source`.
fn merge(
    source: &MappingItem,
    organs: &[Arc<Mapping>],
    findings: &[Arc<Mapping>],
    organ_given: bool,
) -> Vec<Arc<Mapping>> {
    if organs.is_empty() {
        return findings
            .iter()
            .map(|f| {
                let rerooted = f.rerooted([source.clone()]);
                if organ_given {
                    let penalty = -f.penalty().abs() - 1.0;
                    let description = format!("{}. Could not map provided organ", f.description());
                    rerooted.with_penalty(penalty).with_description(description).shared()
                } else {
                    rerooted.shared()
                }
            })
            .collect();
    }

    let mut out = Vec::with_capacity(organs.len() * findings.len());
    for o in organs {
        for f in findings {
            let description = if o.penalty() == 0.0 && f.penalty() == 0.0 {
                Predicate::Exact.value().to_string()
            } else {
                format!("{} | {}", o.description(), f.description())
            };
            let to: BTreeSet<MappingItem> = o
                .to()
                .iter()
                .flat_map(|oi| f.to().iter().map(move |fi| oi.union(fi)))
                .collect();
            out.push(
                Mapping::new([source.clone()], to)
                    .with_penalty(o.penalty() + f.penalty())
                    .with_description(description)
                    .shared(),
            );
        }
    }
    out
}

// ============================================================================
// Request
// ============================================================================

/// Per-request state: the laboratory flag and the template partner cache.
struct Request<'a> {
    ctx: Context<'a>,
    is_lab: bool,
    /// Concept → concepts it can be recombined with (itself included).
    partners: AHashMap<ConceptId, BTreeSet<ConceptId>>,
}

impl Request<'_> {
    /// Direct clinical equivalents of the findings in each alternative.
    fn to_clinical(&self, chain: &Arc<Mapping>) -> Vec<Arc<Mapping>> {
        let store = self.ctx.store;
        let mut out = Vec::new();
        for item in chain.to() {
            let (organs, findings): (Vec<&Arc<Concept>>, Vec<&Arc<Concept>>) =
                item.iter().partition(|c| c.is_anatomic_site());

            for finding in &findings {
                let perfect = store.related(finding, Predicate::CLINICAL_EQUIVALENCE, VocabularySet::CLINICAL, None);
                let dropped = (findings.len() - 1) as f64 + self.organ_penalty(finding, &organs);
                let morphology_only = finding.class == ConceptClass::MorphAbnormality && !organs.is_empty();
                let penalty = if morphology_only { -dropped } else { dropped };

                for target in &perfect {
                    out.push(
                        clinical_step(chain, penalty, finding, target)
                            .with_description(Predicate::MapsTo.value())
                            .shared(),
                    );
                }

                let inverted = store
                    .related(finding, &[Predicate::MappedFrom], VocabularySet::CLINICAL, None)
                    .into_iter()
                    .filter(|c| !perfect.contains(c));
                for target in inverted {
                    out.push(
                        clinical_step(chain, penalty, finding, &target)
                            .with_penalty(INVERTED_PENALTY)
                            .with_description("Inverted MedDRA -> SNOMED mapping, may be imprecise")
                            .shared(),
                    );
                }
            }
        }
        out
    }

    /// One per organ the finding does not already locate itself in. Every
    /// organ counts for morphologies.
    fn organ_penalty(&self, finding: &Concept, organs: &[&Arc<Concept>]) -> f64 {
        if organs.is_empty() {
            return 0.0;
        }
        if finding.class == ConceptClass::MorphAbnormality {
            return organs.len() as f64;
        }
        let embedded = self.ctx.store.related(
            finding,
            Predicate::FINDING_SITE,
            VocabularySet::INTERMEDIARY,
            Some(&[Domain::SpecAnatomicSite]),
        );
        organs.iter().filter(|o| !embedded.contains(**o)).count() as f64
    }

    /// Recombine attribute concepts into the clinical finding they jointly
    /// describe and take that to clinical terms.
    fn template_mapping(&mut self, chain: &Arc<Mapping>) -> Vec<Arc<Mapping>> {
        let organs: BTreeSet<ConceptId> = chain
            .to_concepts()
            .iter()
            .filter(|c| c.is_anatomic_site())
            .map(|c| c.id)
            .collect();

        let mut out = Vec::new();
        for item in chain.to() {
            if item.iter().any(|c| c.class == ConceptClass::ClinicalFinding) {
                continue;
            }
            let targets = self.recombine(item);
            if targets.is_empty() {
                continue;
            }

            let preceding = if chain.to().len() > 1 {
                Mapping::after(chain, [item.clone()])
                    .with_description(DESCR_TO_SINGLE_OR)
                    .shared()
            } else {
                Arc::clone(chain)
            };
            let body_structure = item.iter().any(|c| self.ctx.config.is_body_structure(c.id));
            let domains = item
                .domains()
                .into_iter()
                .map(Domain::value)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
                .join(" AND ");

            for target in targets {
                let extra: Vec<Arc<Concept>> = self
                    .ctx
                    .store
                    .finding_sites(&target)
                    .into_iter()
                    .filter(|site| site.is_valid() && !organs.contains(&site.id))
                    .collect();

                let mut penalty = extra.len() as f64;
                let mut description = format!("{domains} TO {}", target.domain);
                if !extra.is_empty() {
                    let names = extra.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ");
                    description.push_str(&format!(". Penalty for extra finding sites: {names}"));
                }
                if body_structure {
                    penalty = -penalty - 1.0;
                    description.push_str(". Negative score because entire body is not an organ");
                }

                let step = Mapping::after(&preceding, [single(&target)])
                    .with_penalty(penalty)
                    .with_description(description)
                    .shared();
                out.extend(self.to_clinical(&step));
            }
        }
        out
    }

    /// Concepts every member of `item` is template-related to. Single
    /// concepts only recombine for laboratory findings.
    fn recombine(&mut self, item: &MappingItem) -> Vec<Arc<Concept>> {
        if item.len() == 1 && !self.is_lab {
            return Vec::new();
        }
        let ids = item.ids();
        let Some(&first) = ids.first() else {
            return Vec::new();
        };
        let store = self.ctx.store;
        let partners = self.partners.entry(first).or_insert_with(|| {
            let mut partners = store.combination_partners(first, Predicate::TEMPLATE);
            partners.insert(first);
            partners
        });
        if !ids.iter().all(|id| partners.contains(id)) {
            return Vec::new();
        }
        let concepts: Vec<Arc<Concept>> = item.iter().cloned().collect();
        store.related_to_all(
            &concepts,
            Predicate::TEMPLATE,
            VocabularySet::INTERMEDIARY,
            Some(Domain::TEMPLATE_TARGETS),
        )
    }

    /// Retry with every subset that drops one concept and still spans exactly
    /// two domains.
    fn reduced_set<S: OntologyStore + ?Sized>(
        &mut self,
        chain: &Arc<Mapping>,
        item: &MappingItem,
        expander: &Expander<'_, S>,
        state: &mut TraversalState,
        out: &mut Vec<Arc<Mapping>>,
    ) {
        if item.len() <= 2 || !item.has_multiple_domains() {
            return;
        }
        let concepts: Vec<&Arc<Concept>> = item.iter().collect();
        for skip in 0..concepts.len() {
            let reduced = MappingItem::new(
                concepts
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != skip)
                    .map(|(_, c)| Arc::clone(*c)),
            );
            if reduced.domains().len() != 2 {
                continue;
            }
            let step = Mapping::after(chain, [reduced.clone()])
                .with_penalty(REDUCED_SET_PENALTY)
                .with_description("Removed AND mapping")
                .shared();
            out.extend(self.template_mapping(&step));
            out.extend(expander.expand(&step, self, state));
            self.reduced_set(&step, &reduced, expander, state, out);
        }
    }
}

/// The final hop from an intermediary finding to `target`, going through the
/// finding alone when other concepts had to be dropped.
fn clinical_step(chain: &Arc<Mapping>, penalty: f64, finding: &Arc<Concept>, target: &Arc<Concept>) -> Mapping {
    let preceding = if penalty == 0.0 {
        Arc::clone(chain)
    } else {
        Mapping::after(chain, [single(finding)])
            .with_penalty(penalty)
            .with_description("Remove AND mappings")
            .shared()
    };
    Mapping::after(&preceding, [single(target)])
}

impl ExpansionResolver for Request<'_> {
    fn alternatives(&self, chain: &Arc<Mapping>) -> Vec<(Arc<Mapping>, MappingItem)> {
        chain
            .to()
            .iter()
            .map(|item| (Arc::clone(chain), item.clone()))
            .collect()
    }

    fn is_known(&self, _neighbor: &Concept) -> bool {
        true
    }

    fn resolve(
        &mut self,
        candidate: &Arc<Mapping>,
        neighbor: &Concept,
        _state: &mut TraversalState,
    ) -> Vec<Arc<Mapping>> {
        let mut out = self.template_mapping(candidate);
        if !neighbor.is_anatomic_site() {
            out.extend(self.to_clinical(candidate));
        }
        out
    }
}
