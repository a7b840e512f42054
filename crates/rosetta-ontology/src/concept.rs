//! Concepts: the nodes of the terminology graph.

use crate::vocabulary::{Domain, Vocabulary};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Numeric concept identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ConceptId(u32);

impl ConceptId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConceptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marker on concepts that were updated or deleted upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidReason {
    #[serde(rename = "U")]
    Updated,
    #[serde(rename = "D")]
    Deleted,
}

// ============================================================================
// Concept class
// ============================================================================

/// Class of a concept within its vocabulary's internal hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConceptClass {
    PreferredTerm,
    LowLevelTerm,
    HighLevelTerm,
    HighLevelGroupTerm,
    SystemOrganClass,
    ClinicalFinding,
    MorphAbnormality,
    BodyStructure,
    Other(String),
}

impl ConceptClass {
    pub fn value(&self) -> &str {
        match self {
            ConceptClass::PreferredTerm => "PT",
            ConceptClass::LowLevelTerm => "LLT",
            ConceptClass::HighLevelTerm => "HLT",
            ConceptClass::HighLevelGroupTerm => "HLGT",
            ConceptClass::SystemOrganClass => "SOC",
            ConceptClass::ClinicalFinding => "Clinical Finding",
            ConceptClass::MorphAbnormality => "Morph Abnormality",
            ConceptClass::BodyStructure => "Body Structure",
            ConceptClass::Other(other) => other,
        }
    }
}

impl From<String> for ConceptClass {
    fn from(value: String) -> Self {
        match value.as_str() {
            v if v.eq_ignore_ascii_case("PT") => ConceptClass::PreferredTerm,
            v if v.eq_ignore_ascii_case("LLT") => ConceptClass::LowLevelTerm,
            v if v.eq_ignore_ascii_case("HLT") => ConceptClass::HighLevelTerm,
            v if v.eq_ignore_ascii_case("HLGT") => ConceptClass::HighLevelGroupTerm,
            v if v.eq_ignore_ascii_case("SOC") => ConceptClass::SystemOrganClass,
            "Clinical Finding" => ConceptClass::ClinicalFinding,
            "Morph Abnormality" => ConceptClass::MorphAbnormality,
            "Body Structure" => ConceptClass::BodyStructure,
            _ => ConceptClass::Other(value),
        }
    }
}

impl From<&str> for ConceptClass {
    fn from(value: &str) -> Self {
        ConceptClass::from(value.to_string())
    }
}

impl From<ConceptClass> for String {
    fn from(class: ConceptClass) -> Self {
        class.value().to_string()
    }
}

impl fmt::Display for ConceptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

// ============================================================================
// Concept
// ============================================================================

/// A term in some vocabulary.
///
/// Equality, hashing and ordering use the id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub id: ConceptId,
    pub name: String,
    pub code: String,
    pub vocabulary: Vocabulary,
    pub domain: Domain,
    pub class: ConceptClass,
    #[serde(default)]
    pub invalid_reason: Option<InvalidReason>,
}

impl Concept {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        code: impl Into<String>,
        vocabulary: Vocabulary,
        domain: Domain,
        class: impl Into<ConceptClass>,
    ) -> Self {
        Self {
            id: ConceptId::new(id),
            name: name.into(),
            code: code.into(),
            vocabulary,
            domain,
            class: class.into(),
            invalid_reason: None,
        }
    }

    pub fn with_invalid_reason(mut self, reason: InvalidReason) -> Self {
        self.invalid_reason = Some(reason);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_reason.is_none()
    }

    pub fn is_preferred_term(&self) -> bool {
        self.class == ConceptClass::PreferredTerm
    }

    pub fn is_low_level_term(&self) -> bool {
        self.class == ConceptClass::LowLevelTerm
    }

    pub fn is_anatomic_site(&self) -> bool {
        self.domain == Domain::SpecAnatomicSite
    }

    /// `name (VOCABULARY: code)`
    pub fn human_readable(&self) -> String {
        format!("{} ({}: {})", self.name, self.vocabulary, self.code)
    }
}

impl PartialEq for Concept {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Concept {}

impl Hash for Concept {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Concept {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Concept {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for Concept {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.human_readable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_id_only() {
        let a = Concept::new(1, "Liver", "C12392", Vocabulary::Specimen, Domain::SpecAnatomicSite, "Specimen");
        let mut b = a.clone();
        b.name = "LIVER".to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn test_class_parsing() {
        assert_eq!(ConceptClass::from("pt"), ConceptClass::PreferredTerm);
        assert_eq!(ConceptClass::from("Morph Abnormality"), ConceptClass::MorphAbnormality);
        assert_eq!(
            ConceptClass::from("Navi Concept"),
            ConceptClass::Other("Navi Concept".to_string())
        );
    }

    #[test]
    fn test_human_readable() {
        let c = Concept::new(7, "Hepatitis", "10019717", Vocabulary::MedDra, Domain::Condition, "PT");
        assert_eq!(c.human_readable(), "Hepatitis (MedDRA: 10019717)");
    }
}
