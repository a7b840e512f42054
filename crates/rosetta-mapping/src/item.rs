//! Conjunctive translation units.

use crate::error::{MappingError, Result};
use rosetta_ontology::{Concept, ConceptId, Domain};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A set of concepts translated as one whole ("AND").
///
/// Ordered by concept id, so items compare, hash and print deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MappingItem {
    concepts: BTreeSet<Arc<Concept>>,
}

impl MappingItem {
    pub fn new(concepts: impl IntoIterator<Item = Arc<Concept>>) -> Self {
        Self {
            concepts: concepts.into_iter().collect(),
        }
    }

    pub fn single(concept: Arc<Concept>) -> Self {
        Self::new([concept])
    }

    pub fn concepts(&self) -> &BTreeSet<Arc<Concept>> {
        &self.concepts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Concept>> {
        self.concepts.iter()
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    pub fn contains(&self, id: ConceptId) -> bool {
        self.concepts.iter().any(|c| c.id == id)
    }

    /// Sorted ids; the memo key of this item.
    pub fn ids(&self) -> Vec<ConceptId> {
        self.concepts.iter().map(|c| c.id).collect()
    }

    pub fn domains(&self) -> BTreeSet<Domain> {
        self.concepts.iter().map(|c| c.domain).collect()
    }

    pub fn has_multiple_domains(&self) -> bool {
        self.domains().len() > 1
    }

    /// The only concept of the item.
    pub fn single_concept(&self) -> Result<&Arc<Concept>> {
        match self.concepts.len() {
            1 => self
                .concepts
                .iter()
                .next()
                .ok_or_else(|| MappingError::inconsistent("empty item")),
            n => Err(MappingError::inconsistent(format!(
                "expected a single concept, item holds {n}: {}",
                self.human_readable()
            ))),
        }
    }

    /// The item with `old` swapped for `new`.
    pub fn replace(&self, old: &Concept, new: Arc<Concept>) -> Self {
        Self::new(
            self.concepts
                .iter()
                .filter(|c| c.id != old.id)
                .cloned()
                .chain(std::iter::once(new)),
        )
    }

    pub fn union(&self, other: &MappingItem) -> Self {
        Self::new(self.concepts.iter().chain(other.concepts.iter()).cloned())
    }

    /// `name (VOCABULARY: code)` per concept, joined with " AND ".
    pub fn human_readable(&self) -> String {
        self.concepts
            .iter()
            .map(|c| c.human_readable())
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Concept names joined with " AND ".
    pub fn human_readable_simple(&self) -> String {
        self.concepts
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

impl FromIterator<Arc<Concept>> for MappingItem {
    fn from_iter<I: IntoIterator<Item = Arc<Concept>>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl From<Arc<Concept>> for MappingItem {
    fn from(concept: Arc<Concept>) -> Self {
        Self::single(concept)
    }
}

impl fmt::Display for MappingItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.human_readable())
    }
}
