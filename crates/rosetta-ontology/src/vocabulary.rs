//! Closed enumerations for terminology systems and concept categories.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Vocabulary
// ============================================================================

/// A terminology system a concept belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Vocabulary {
    #[serde(rename = "MedDRA")]
    MedDra,
    #[serde(rename = "ILO")]
    Ilo,
    #[serde(rename = "SNOMED")]
    Snomed,
    #[serde(rename = "MA")]
    Ma,
    #[serde(rename = "Specimen")]
    Specimen,
    #[serde(rename = "HPATH")]
    Hpath,
    /// The reference data truncates this identifier at 20 characters.
    #[serde(rename = "Non-Neoplastic Findi")]
    NonNeoplasticFinding,
    #[serde(rename = "Neoplasm Type")]
    NeoplasmType,
    #[serde(rename = "Laboratory Test Name")]
    LaboratoryTestName,
    #[serde(rename = "Other")]
    Other,
}

impl Vocabulary {
    pub const ALL: [Vocabulary; 10] = [
        Vocabulary::MedDra,
        Vocabulary::Ilo,
        Vocabulary::Snomed,
        Vocabulary::Ma,
        Vocabulary::Specimen,
        Vocabulary::Hpath,
        Vocabulary::NonNeoplasticFinding,
        Vocabulary::NeoplasmType,
        Vocabulary::LaboratoryTestName,
        Vocabulary::Other,
    ];

    /// Identifier as stored in the reference data.
    pub fn value(self) -> &'static str {
        match self {
            Vocabulary::MedDra => "MedDRA",
            Vocabulary::Ilo => "ILO",
            Vocabulary::Snomed => "SNOMED",
            Vocabulary::Ma => "MA",
            Vocabulary::Specimen => "Specimen",
            Vocabulary::Hpath => "HPATH",
            Vocabulary::NonNeoplasticFinding => "Non-Neoplastic Findi",
            Vocabulary::NeoplasmType => "Neoplasm Type",
            Vocabulary::LaboratoryTestName => "Laboratory Test Name",
            Vocabulary::Other => "Other",
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Vocabulary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

impl FromStr for Vocabulary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vocabulary::ALL
            .into_iter()
            .find(|v| v.value().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown vocabulary: {s}"))
    }
}

// ============================================================================
// Vocabulary sets
// ============================================================================

/// A set of vocabularies, stored as a bitset over [`Vocabulary`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Vocabulary>", into = "Vec<Vocabulary>")]
pub struct VocabularySet(u16);

impl VocabularySet {
    pub const EMPTY: VocabularySet = VocabularySet(0);
    pub const ALL: VocabularySet = VocabularySet::of(&Vocabulary::ALL);

    pub const CLINICAL: VocabularySet = VocabularySet::of(&[Vocabulary::MedDra]);
    pub const INTERMEDIARY: VocabularySet = VocabularySet::of(&[Vocabulary::Snomed]);
    /// The eTox preclinical family.
    pub const ETOX: VocabularySet = VocabularySet::of(&[Vocabulary::Hpath, Vocabulary::Ma]);
    /// The SEND preclinical family.
    pub const SEND: VocabularySet = VocabularySet::of(&[
        Vocabulary::NonNeoplasticFinding,
        Vocabulary::NeoplasmType,
        Vocabulary::LaboratoryTestName,
        Vocabulary::Specimen,
    ]);
    pub const ORGANS: VocabularySet =
        VocabularySet::of(&[Vocabulary::Snomed, Vocabulary::Ma, Vocabulary::Specimen]);
    pub const PRECLINICAL: VocabularySet = VocabularySet::of(&[
        Vocabulary::Hpath,
        Vocabulary::Specimen,
        Vocabulary::Ma,
        Vocabulary::NonNeoplasticFinding,
        Vocabulary::NeoplasmType,
        Vocabulary::LaboratoryTestName,
    ]);
    pub const PRECLINICAL_FINDINGS: VocabularySet = VocabularySet::of(&[
        Vocabulary::Hpath,
        Vocabulary::NonNeoplasticFinding,
        Vocabulary::NeoplasmType,
        Vocabulary::LaboratoryTestName,
    ]);
    pub const PRECLINICAL_ORGANS: VocabularySet =
        VocabularySet::of(&[Vocabulary::Ma, Vocabulary::Specimen]);

    pub const fn of(vocabularies: &[Vocabulary]) -> Self {
        let mut bits = 0u16;
        let mut i = 0;
        while i < vocabularies.len() {
            bits |= vocabularies[i].bit();
            i += 1;
        }
        VocabularySet(bits)
    }

    pub const fn single(vocabulary: Vocabulary) -> Self {
        VocabularySet(vocabulary.bit())
    }

    pub const fn contains(self, vocabulary: Vocabulary) -> bool {
        self.0 & vocabulary.bit() != 0
    }

    pub const fn intersects(self, other: VocabularySet) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_subset(self, other: VocabularySet) -> bool {
        self.0 & !other.0 == 0
    }

    pub const fn union(self, other: VocabularySet) -> Self {
        VocabularySet(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = Vocabulary> {
        Vocabulary::ALL.into_iter().filter(move |v| self.contains(*v))
    }
}

impl FromIterator<Vocabulary> for VocabularySet {
    fn from_iter<I: IntoIterator<Item = Vocabulary>>(iter: I) -> Self {
        iter.into_iter()
            .fold(VocabularySet::EMPTY, |set, v| set.union(VocabularySet::single(v)))
    }
}

impl From<Vec<Vocabulary>> for VocabularySet {
    fn from(vocabularies: Vec<Vocabulary>) -> Self {
        vocabularies.into_iter().collect()
    }
}

impl From<VocabularySet> for Vec<Vocabulary> {
    fn from(set: VocabularySet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Debug for VocabularySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl fmt::Display for VocabularySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(Vocabulary::value).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

// ============================================================================
// Domain
// ============================================================================

/// Concept category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    #[serde(rename = "Condition")]
    Condition,
    #[serde(rename = "Condition Status")]
    ConditionStatus,
    #[serde(rename = "Cost")]
    Cost,
    #[serde(rename = "Device")]
    Device,
    #[serde(rename = "Episode")]
    Episode,
    #[serde(rename = "Gender")]
    Gender,
    #[serde(rename = "Geography")]
    Geography,
    #[serde(rename = "Meas Value")]
    MeasValue,
    #[serde(rename = "Meas Value Operator")]
    MeasValueOperator,
    #[serde(rename = "Measurement")]
    Measurement,
    #[serde(rename = "Drug")]
    Drug,
    #[serde(rename = "Metadata")]
    Metadata,
    #[serde(rename = "Observation")]
    Observation,
    #[serde(rename = "Payer")]
    Payer,
    #[serde(rename = "Plan")]
    Plan,
    #[serde(rename = "Plan Stop Reason")]
    PlanStopReason,
    #[serde(rename = "Procedure")]
    Procedure,
    #[serde(rename = "Provider")]
    Provider,
    #[serde(rename = "Relationship")]
    Relationship,
    #[serde(rename = "Revenue Code")]
    RevenueCode,
    #[serde(rename = "Route")]
    Route,
    #[serde(rename = "Spec Anatomic Site")]
    SpecAnatomicSite,
    #[serde(rename = "Spec Disease Status")]
    SpecDiseaseStatus,
    #[serde(rename = "Specimen")]
    Specimen,
    #[serde(rename = "Sponsor")]
    Sponsor,
    #[serde(rename = "Type Concept")]
    TypeConcept,
    #[serde(rename = "Unit")]
    Unit,
    #[serde(rename = "Other")]
    Other,
    #[serde(rename = "Visit")]
    Visit,
}

impl Domain {
    /// Domains a template recombination may land in.
    pub const TEMPLATE_TARGETS: &'static [Domain] = &[
        Domain::Condition,
        Domain::Procedure,
        Domain::Measurement,
        Domain::Drug,
    ];

    pub fn value(self) -> &'static str {
        match self {
            Domain::Condition => "Condition",
            Domain::ConditionStatus => "Condition Status",
            Domain::Cost => "Cost",
            Domain::Device => "Device",
            Domain::Episode => "Episode",
            Domain::Gender => "Gender",
            Domain::Geography => "Geography",
            Domain::MeasValue => "Meas Value",
            Domain::MeasValueOperator => "Meas Value Operator",
            Domain::Measurement => "Measurement",
            Domain::Drug => "Drug",
            Domain::Metadata => "Metadata",
            Domain::Observation => "Observation",
            Domain::Payer => "Payer",
            Domain::Plan => "Plan",
            Domain::PlanStopReason => "Plan Stop Reason",
            Domain::Procedure => "Procedure",
            Domain::Provider => "Provider",
            Domain::Relationship => "Relationship",
            Domain::RevenueCode => "Revenue Code",
            Domain::Route => "Route",
            Domain::SpecAnatomicSite => "Spec Anatomic Site",
            Domain::SpecDiseaseStatus => "Spec Disease Status",
            Domain::Specimen => "Specimen",
            Domain::Sponsor => "Sponsor",
            Domain::TypeConcept => "Type Concept",
            Domain::Unit => "Unit",
            Domain::Other => "Other",
            Domain::Visit => "Visit",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_sets() {
        assert!(VocabularySet::ETOX.is_subset(VocabularySet::PRECLINICAL));
        assert!(VocabularySet::SEND.is_subset(VocabularySet::PRECLINICAL));
        assert!(!VocabularySet::SEND.is_subset(VocabularySet::ETOX));
        assert!(VocabularySet::ORGANS.contains(Vocabulary::Snomed));
        assert!(!VocabularySet::CLINICAL.intersects(VocabularySet::PRECLINICAL));
        assert_eq!(VocabularySet::PRECLINICAL.len(), 6);
    }

    #[test]
    fn test_vocabulary_from_str() {
        assert_eq!("snomed".parse::<Vocabulary>().unwrap(), Vocabulary::Snomed);
        assert_eq!(
            "Non-Neoplastic Findi".parse::<Vocabulary>().unwrap(),
            Vocabulary::NonNeoplasticFinding
        );
        assert!("ICD10".parse::<Vocabulary>().is_err());
    }

    #[test]
    fn test_set_serde_as_list() {
        let json = serde_json::to_string(&VocabularySet::ETOX).unwrap();
        assert_eq!(json, r#"["MA","HPATH"]"#);
        let back: VocabularySet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, VocabularySet::ETOX);
    }
}
