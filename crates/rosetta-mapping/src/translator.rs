//! Request entry point: input validation, code resolution, pipeline dispatch
//! and final ranking.
//!
//! ```text
//!   TranslationRequest ──► resolve codes ──► pipeline ──► squash ──► sort_and_filter
//!                              │                              (unless explain)
//!                              └─ NotFound / InvalidInput
//! ```

use crate::aggregate::{sort_and_filter, squash};
use crate::config::EngineConfig;
use crate::error::{MappingError, Result};
use crate::index::ReferenceIndex;
use crate::item::MappingItem;
use crate::mapping::Mapping;
use crate::pipeline::{
    single, ClassResolver, ClinicalToPreclinical, Context, OrganCrosswalk, PreclinicalCrosswalk,
    PreclinicalToClinical,
};
use rayon::prelude::*;
use rosetta_ontology::{Concept, OntologyStore, Vocabulary, VocabularySet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

// ============================================================================
// Algorithms
// ============================================================================

/// A supported source → target vocabulary pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MappingAlgorithm {
    Etox2MeddraPt,
    Hpath2Send,
    Ma2Send,
    Ma2MeddraSoc,
    Ma2Snomed,
    MeddraPt2Etox,
    MeddraPt2Send,
    MeddraPt2Snomed,
    MeddraPt2MeddraSoc,
    Send2Hpath,
    Send2Ma,
    Send2MeddraPt,
    Snomed2Ma,
}

impl MappingAlgorithm {
    pub const ALL: [MappingAlgorithm; 13] = [
        MappingAlgorithm::Etox2MeddraPt,
        MappingAlgorithm::Hpath2Send,
        MappingAlgorithm::Ma2Send,
        MappingAlgorithm::Ma2MeddraSoc,
        MappingAlgorithm::Ma2Snomed,
        MappingAlgorithm::MeddraPt2Etox,
        MappingAlgorithm::MeddraPt2Send,
        MappingAlgorithm::MeddraPt2Snomed,
        MappingAlgorithm::MeddraPt2MeddraSoc,
        MappingAlgorithm::Send2Hpath,
        MappingAlgorithm::Send2Ma,
        MappingAlgorithm::Send2MeddraPt,
        MappingAlgorithm::Snomed2Ma,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MappingAlgorithm::Etox2MeddraPt => "ETOX2MEDDRAPT",
            MappingAlgorithm::Hpath2Send => "HPATH2SEND",
            MappingAlgorithm::Ma2Send => "MA2SEND",
            MappingAlgorithm::Ma2MeddraSoc => "MA2MEDDRASOC",
            MappingAlgorithm::Ma2Snomed => "MA2SNOMED",
            MappingAlgorithm::MeddraPt2Etox => "MEDDRAPT2ETOX",
            MappingAlgorithm::MeddraPt2Send => "MEDDRAPT2SEND",
            MappingAlgorithm::MeddraPt2Snomed => "MEDDRAPT2SNOMED",
            MappingAlgorithm::MeddraPt2MeddraSoc => "MEDDRAPT2MEDDRASOC",
            MappingAlgorithm::Send2Hpath => "SEND2HPATH",
            MappingAlgorithm::Send2Ma => "SEND2MA",
            MappingAlgorithm::Send2MeddraPt => "SEND2MEDDRAPT",
            MappingAlgorithm::Snomed2Ma => "SNOMED2MA",
        }
    }

    /// The target half of the name, e.g. `SEND` for `MEDDRAPT2SEND`.
    pub fn target(self) -> &'static str {
        let name = self.name();
        name.split_once('2').map_or(name, |(_, target)| target)
    }

    /// Finding + organ translations only run one request at a time.
    pub fn supports_bulk(self) -> bool {
        !matches!(self, MappingAlgorithm::Send2MeddraPt | MappingAlgorithm::Etox2MeddraPt)
    }
}

impl fmt::Display for MappingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MappingAlgorithm {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self> {
        MappingAlgorithm::ALL
            .into_iter()
            .find(|a| a.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| MappingError::invalid(format!("unknown mapping algorithm: {s}")))
    }
}

// ============================================================================
// Requests
// ============================================================================

/// One translation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub codes: Vec<String>,
    pub algorithm: MappingAlgorithm,
    /// Keep the full chains instead of flattening them per total.
    #[serde(default)]
    pub explain: bool,
    /// Budget; the configured default when absent.
    #[serde(default)]
    pub max_penalty: Option<u32>,
    /// Overrides the preclinical family of clinical → preclinical requests.
    #[serde(default)]
    pub target_vocabularies: Option<VocabularySet>,
}

impl TranslationRequest {
    pub fn new(codes: impl IntoIterator<Item = impl Into<String>>, algorithm: MappingAlgorithm) -> Self {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            algorithm,
            explain: false,
            max_penalty: None,
            target_vocabularies: None,
        }
    }

    pub fn explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }

    pub fn max_penalty(mut self, max_penalty: u32) -> Self {
        self.max_penalty = Some(max_penalty);
        self
    }

    pub fn target_vocabularies(mut self, vocabularies: VocabularySet) -> Self {
        self.target_vocabularies = Some(vocabularies);
        self
    }
}

// ============================================================================
// Translator
// ============================================================================

/// Shared, thread-safe translation service.
///
/// The store and index are immutable; every request gets its own traversal
/// state, so a `Translator` can serve concurrent requests.
pub struct Translator {
    store: Arc<dyn OntologyStore>,
    index: Arc<ReferenceIndex>,
    config: EngineConfig,
}

impl Translator {
    /// Build the reference index from `store`.
    pub fn new(store: Arc<dyn OntologyStore>, config: EngineConfig) -> Self {
        let index = Arc::new(ReferenceIndex::build(store.as_ref()));
        Self::with_index(store, index, config)
    }

    pub fn with_index(store: Arc<dyn OntologyStore>, index: Arc<ReferenceIndex>, config: EngineConfig) -> Self {
        Self { store, index, config }
    }

    pub fn store(&self) -> &dyn OntologyStore {
        self.store.as_ref()
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn context(&self) -> Context<'_> {
        Context::new(self.store.as_ref(), &self.index, &self.config)
    }

    /// Translate one request into ranked chains.
    ///
    /// A request that resolves nothing yields a single no-mapping chain, not
    /// an error.
    pub fn translate(&self, request: &TranslationRequest) -> Result<Vec<Arc<Mapping>>> {
        let start = Instant::now();
        let budget = self.config.budget(request.max_penalty);
        let ctx = self.context();

        let (source, chains) = match request.algorithm {
            MappingAlgorithm::Hpath2Send
            | MappingAlgorithm::Send2Hpath
            | MappingAlgorithm::Send2Ma
            | MappingAlgorithm::Ma2Send => {
                let input = self.single_concept(&request.codes, VocabularySet::PRECLINICAL)?;
                (Some(single(&input)), PreclinicalCrosswalk::new(ctx).map(&input))
            }
            MappingAlgorithm::Send2MeddraPt | MappingAlgorithm::Etox2MeddraPt => {
                let (finding, organ) = self.finding_and_organ(&request.codes)?;
                let source = MappingItem::new(std::iter::once(Arc::clone(&finding)).chain(organ.clone()));
                let chains = PreclinicalToClinical::new(ctx).map(&finding, organ.as_ref(), budget);
                (Some(source), chains)
            }
            MappingAlgorithm::Ma2MeddraSoc => {
                let input = self.single_concept(&request.codes, VocabularySet::single(Vocabulary::Ma))?;
                let chains = ClassResolver::new(ctx).anatomy_to_system_organ_class(&input, budget);
                (Some(single(&input)), chains)
            }
            MappingAlgorithm::MeddraPt2MeddraSoc => (None, self.primary_classes(&request.codes)?),
            MappingAlgorithm::Ma2Snomed | MappingAlgorithm::Snomed2Ma => {
                let target = if request.algorithm == MappingAlgorithm::Ma2Snomed {
                    Vocabulary::Snomed
                } else {
                    Vocabulary::Ma
                };
                let input = self.single_concept(&request.codes, VocabularySet::ORGANS)?;
                (Some(single(&input)), OrganCrosswalk::new(ctx).map(&input, target, budget))
            }
            MappingAlgorithm::MeddraPt2Etox | MappingAlgorithm::MeddraPt2Send => {
                let family = if request.algorithm == MappingAlgorithm::MeddraPt2Etox {
                    VocabularySet::ETOX
                } else {
                    VocabularySet::SEND
                };
                let targets = request.target_vocabularies.unwrap_or(family);
                let input = self.single_concept(&request.codes, VocabularySet::CLINICAL)?;
                (Some(single(&input)), ClinicalToPreclinical::new(ctx).map(&input, targets, budget))
            }
            MappingAlgorithm::MeddraPt2Snomed => {
                let input = self.single_concept(&request.codes, VocabularySet::CLINICAL)?;
                (Some(single(&input)), OrganCrosswalk::new(ctx).organs_for_clinical_term(&input))
            }
        };

        let chains = match &source {
            Some(item) if !request.explain => squash(&BTreeSet::from([item.clone()]), &chains),
            _ => chains,
        };
        let mut results = sort_and_filter(chains, budget, &self.config);
        if results.is_empty() {
            if let Some(item) = source {
                results.push(Mapping::no_mapping(item).shared());
            }
        }

        tracing::info!(
            algorithm = %request.algorithm,
            codes = ?request.codes,
            target = request.algorithm.target(),
            results = results.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "translated"
        );
        Ok(results)
    }

    /// Translate every distinct code on its own with default settings.
    pub fn translate_bulk(&self, algorithm: MappingAlgorithm, codes: &[String]) -> Result<Vec<Arc<Mapping>>> {
        if !algorithm.supports_bulk() {
            return Err(MappingError::invalid(format!("{algorithm} is not supported in bulk")));
        }
        if codes.is_empty() {
            return Err(MappingError::invalid("Please provide concept codes"));
        }
        if algorithm == MappingAlgorithm::MeddraPt2MeddraSoc {
            return self.primary_classes(codes);
        }

        let mut seen = BTreeSet::new();
        let distinct: Vec<&String> = codes.iter().filter(|c| seen.insert(c.as_str())).collect();
        let batches = distinct
            .par_iter()
            .map(|code| self.translate(&TranslationRequest::new([code.as_str()], algorithm)))
            .collect::<Result<Vec<_>>>()?;
        Ok(batches.into_iter().flatten().collect())
    }

    /// Primary system-organ class of each clinical code.
    pub fn primary_classes(&self, codes: &[String]) -> Result<Vec<Arc<Mapping>>> {
        let mut concepts = Vec::with_capacity(codes.len());
        for code in codes {
            let found = self.store.concepts_by_code(code, VocabularySet::CLINICAL);
            if found.is_empty() {
                return Err(MappingError::NotFound {
                    code: code.clone(),
                    vocabularies: VocabularySet::CLINICAL,
                });
            }
            concepts.extend(found);
        }
        Ok(ClassResolver::new(self.context()).primary_classes(&concepts))
    }

    // ========================================================================
    // Input resolution
    // ========================================================================

    fn single_concept(&self, codes: &[String], vocabularies: VocabularySet) -> Result<Arc<Concept>> {
        let [code] = codes else {
            return Err(MappingError::invalid("Please supply exactly one concept code"));
        };
        self.unique_concept(code, vocabularies)
    }

    fn unique_concept(&self, code: &str, vocabularies: VocabularySet) -> Result<Arc<Concept>> {
        match self.store.concepts_by_code(code, vocabularies).as_slice() {
            [] => Err(MappingError::NotFound {
                code: code.to_string(),
                vocabularies,
            }),
            [one] => Ok(Arc::clone(one)),
            many => Err(MappingError::inconsistent(format!(
                "{} concepts share code {code} in {vocabularies}",
                many.len()
            ))),
        }
    }

    /// One finding and at most one organ out of one or two codes.
    fn finding_and_organ(&self, codes: &[String]) -> Result<(Arc<Concept>, Option<Arc<Concept>>)> {
        if codes.is_empty() || codes.len() > 2 {
            return Err(MappingError::invalid(
                "Supply one or two concept codes: a finding and optionally an organ",
            ));
        }
        for code in codes {
            if self.store.concepts_by_code(code, VocabularySet::PRECLINICAL).is_empty() {
                return Err(MappingError::NotFound {
                    code: code.clone(),
                    vocabularies: VocabularySet::PRECLINICAL,
                });
            }
        }

        let mut organs = self.store.concepts_by_codes(codes, VocabularySet::PRECLINICAL_ORGANS);
        if organs.len() > 1 {
            return Err(MappingError::invalid(
                "More than one preclinical organ concept code supplied, this is not supported",
            ));
        }
        let mut findings = self.store.concepts_by_codes(codes, VocabularySet::PRECLINICAL_FINDINGS);
        match findings.len() {
            0 => Err(MappingError::invalid("No valid preclinical finding concept code supplied")),
            1 => Ok((findings.remove(0), organs.pop())),
            _ => Err(MappingError::invalid(
                "More than one preclinical finding concept code supplied, this is not supported",
            )),
        }
    }
}
