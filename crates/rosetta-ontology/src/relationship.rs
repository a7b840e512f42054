//! Typed, directed relationships between concepts.

use crate::concept::{Concept, ConceptId, InvalidReason};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Predicates
// ============================================================================

/// Relationship kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Predicate {
    #[serde(rename = "Has finding site")]
    HasFindingSite,
    #[serde(rename = "Maps to")]
    MapsTo,
    #[serde(rename = "Asso morph of")]
    AssoMorphOf,
    #[serde(rename = "Has asso morph")]
    HasAssoMorph,
    #[serde(rename = "Finding site of")]
    FindingSiteOf,
    #[serde(rename = "Has dir proc site")]
    HasDirProcSite,
    #[serde(rename = "Dir proc site of")]
    DirProcSiteOf,
    #[serde(rename = "Mapped from")]
    MappedFrom,
    #[serde(rename = "SNOMED - MedDRA eq")]
    SnomedMedDraEq,
    #[serde(rename = "MedDRA - SNOMED eq")]
    MedDraSnomedEq,
    #[serde(rename = "Subsumes")]
    Subsumes,
    #[serde(rename = "SMQ - MedDRA")]
    SmqMedDra,
    #[serde(rename = "Exact match")]
    Exact,
    #[serde(rename = "Narrow match")]
    Narrow,
    #[serde(rename = "Broad match")]
    Broad,
    #[serde(rename = "Has causative agent")]
    HasCausativeAgent,
    #[serde(rename = "Causative agent of")]
    CausativeAgentOf,
    #[serde(rename = "Pathology of")]
    PathologyOf,
    #[serde(rename = "Has pathology")]
    HasPathology,
    #[serde(rename = "Occurrence of")]
    OccurrenceOf,
    #[serde(rename = "Has occurrence")]
    HasOccurrence,
    #[serde(rename = "Interprets of")]
    InterpretsOf,
    #[serde(rename = "Has interprets")]
    HasInterprets,
    #[serde(rename = "Interpretation of")]
    InterpretationOf,
    #[serde(rename = "Component of")]
    ComponentOf,
    #[serde(rename = "Has Disposition")]
    HasDisposition,
    #[serde(rename = "Disposition of")]
    DispositionOf,
    #[serde(rename = "Has component")]
    HasComponent,
    #[serde(rename = "Related match")]
    Related,
    #[serde(rename = "Other")]
    Other,
}

impl Predicate {
    /// Attributes every structural decomposition must share.
    pub const STRUCTURAL: &'static [Predicate] = &[
        Predicate::HasFindingSite,
        Predicate::HasDirProcSite,
        Predicate::HasAssoMorph,
    ];

    /// Attributes added to a decomposition only when they resolve.
    pub const OPTIONAL_STRUCTURAL: &'static [Predicate] = &[
        Predicate::HasOccurrence,
        Predicate::HasCausativeAgent,
        Predicate::HasComponent,
        Predicate::HasDisposition,
        Predicate::HasPathology,
        Predicate::HasInterprets,
    ];

    /// Predicates a set of attribute concepts is recombined through.
    pub const TEMPLATE: &'static [Predicate] = &[
        Predicate::AssoMorphOf,
        Predicate::FindingSiteOf,
        Predicate::DirProcSiteOf,
        Predicate::HasAssoMorph,
        Predicate::HasDirProcSite,
        Predicate::HasFindingSite,
        Predicate::HasCausativeAgent,
        Predicate::CausativeAgentOf,
        Predicate::PathologyOf,
        Predicate::OccurrenceOf,
        Predicate::InterpretsOf,
        Predicate::ComponentOf,
        Predicate::DispositionOf,
    ];

    /// Intermediary → clinical equivalences.
    pub const CLINICAL_EQUIVALENCE: &'static [Predicate] =
        &[Predicate::MapsTo, Predicate::SnomedMedDraEq];

    pub const FINDING_SITE: &'static [Predicate] =
        &[Predicate::HasFindingSite, Predicate::HasDirProcSite];

    pub const ALL: &'static [Predicate] = &[
        Predicate::HasFindingSite,
        Predicate::MapsTo,
        Predicate::AssoMorphOf,
        Predicate::HasAssoMorph,
        Predicate::FindingSiteOf,
        Predicate::HasDirProcSite,
        Predicate::DirProcSiteOf,
        Predicate::MappedFrom,
        Predicate::SnomedMedDraEq,
        Predicate::MedDraSnomedEq,
        Predicate::Subsumes,
        Predicate::SmqMedDra,
        Predicate::Exact,
        Predicate::Narrow,
        Predicate::Broad,
        Predicate::HasCausativeAgent,
        Predicate::CausativeAgentOf,
        Predicate::PathologyOf,
        Predicate::HasPathology,
        Predicate::OccurrenceOf,
        Predicate::HasOccurrence,
        Predicate::InterpretsOf,
        Predicate::HasInterprets,
        Predicate::InterpretationOf,
        Predicate::ComponentOf,
        Predicate::HasDisposition,
        Predicate::DispositionOf,
        Predicate::HasComponent,
        Predicate::Related,
        Predicate::Other,
    ];

    pub fn value(self) -> &'static str {
        match self {
            Predicate::HasFindingSite => "Has finding site",
            Predicate::MapsTo => "Maps to",
            Predicate::AssoMorphOf => "Asso morph of",
            Predicate::HasAssoMorph => "Has asso morph",
            Predicate::FindingSiteOf => "Finding site of",
            Predicate::HasDirProcSite => "Has dir proc site",
            Predicate::DirProcSiteOf => "Dir proc site of",
            Predicate::MappedFrom => "Mapped from",
            Predicate::SnomedMedDraEq => "SNOMED - MedDRA eq",
            Predicate::MedDraSnomedEq => "MedDRA - SNOMED eq",
            Predicate::Subsumes => "Subsumes",
            Predicate::SmqMedDra => "SMQ - MedDRA",
            Predicate::Exact => "Exact match",
            Predicate::Narrow => "Narrow match",
            Predicate::Broad => "Broad match",
            Predicate::HasCausativeAgent => "Has causative agent",
            Predicate::CausativeAgentOf => "Causative agent of",
            Predicate::PathologyOf => "Pathology of",
            Predicate::HasPathology => "Has pathology",
            Predicate::OccurrenceOf => "Occurrence of",
            Predicate::HasOccurrence => "Has occurrence",
            Predicate::InterpretsOf => "Interprets of",
            Predicate::HasInterprets => "Has interprets",
            Predicate::InterpretationOf => "Interpretation of",
            Predicate::ComponentOf => "Component of",
            Predicate::HasDisposition => "Has Disposition",
            Predicate::DispositionOf => "Disposition of",
            Predicate::HasComponent => "Has component",
            Predicate::Related => "Related match",
            Predicate::Other => "Other",
        }
    }

    /// The predicate of the reverse edge, when the reference data stores one.
    pub fn inverse(self) -> Option<Predicate> {
        use Predicate::*;
        Some(match self {
            HasFindingSite => FindingSiteOf,
            FindingSiteOf => HasFindingSite,
            HasAssoMorph => AssoMorphOf,
            AssoMorphOf => HasAssoMorph,
            HasDirProcSite => DirProcSiteOf,
            DirProcSiteOf => HasDirProcSite,
            MapsTo => MappedFrom,
            MappedFrom => MapsTo,
            SnomedMedDraEq => MedDraSnomedEq,
            MedDraSnomedEq => SnomedMedDraEq,
            HasCausativeAgent => CausativeAgentOf,
            CausativeAgentOf => HasCausativeAgent,
            HasPathology => PathologyOf,
            PathologyOf => HasPathology,
            HasOccurrence => OccurrenceOf,
            OccurrenceOf => HasOccurrence,
            HasInterprets => InterpretsOf,
            InterpretsOf => HasInterprets,
            HasComponent => ComponentOf,
            ComponentOf => HasComponent,
            HasDisposition => DispositionOf,
            DispositionOf => HasDisposition,
            Exact => Exact,
            Related => Related,
            Narrow => Broad,
            Broad => Narrow,
            Subsumes | SmqMedDra | InterpretationOf | Other => return None,
        })
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

// ============================================================================
// Relationships
// ============================================================================

/// Identifier of a batch of relationships that together describe one
/// combination (several intermediary concepts mapping as one unit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinationGroup(pub u32);

/// A stored edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub concept_one: ConceptId,
    pub concept_two: ConceptId,
    pub predicate: Predicate,
    #[serde(default)]
    pub group: Option<CombinationGroup>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub invalid_reason: Option<InvalidReason>,
}

impl Relationship {
    pub fn new(concept_one: ConceptId, predicate: Predicate, concept_two: ConceptId) -> Self {
        Self {
            concept_one,
            concept_two,
            predicate,
            group: None,
            source: None,
            invalid_reason: None,
        }
    }

    pub fn in_group(mut self, group: u32) -> Self {
        self.group = Some(CombinationGroup(group));
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Key used to batch relationships: the explicit group, or the relationship
/// on its own when it carries none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    Batch(CombinationGroup),
    Single(u32),
}

/// A relationship with both endpoints materialised.
#[derive(Debug, Clone)]
pub struct ResolvedRelationship {
    /// Position of the relationship in its store.
    pub id: u32,
    pub one: Arc<Concept>,
    pub two: Arc<Concept>,
    pub predicate: Predicate,
    pub group: Option<CombinationGroup>,
    pub source: Option<String>,
    pub invalid_reason: Option<InvalidReason>,
}

impl ResolvedRelationship {
    pub fn group_key(&self) -> GroupKey {
        match self.group {
            Some(group) => GroupKey::Batch(group),
            None => GroupKey::Single(self.id),
        }
    }
}
