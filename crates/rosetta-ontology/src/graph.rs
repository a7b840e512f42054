//! In-memory ontology graph with columnar concept storage and indexed edges.

use crate::concept::{Concept, ConceptClass, ConceptId};
use crate::relationship::{Predicate, Relationship, ResolvedRelationship};
use crate::store::OntologyStore;
use crate::vocabulary::{Domain, Vocabulary, VocabularySet};
use ahash::AHashMap;
use anyhow::Result;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

const SNAPSHOT_MAGIC: &[u8; 4] = b"RSTA";
const SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// Concept Storage
// ============================================================================

/// Concepts addressed by slot, with code, name and vocabulary indexes.
#[derive(Debug, Default)]
struct ConceptStore {
    concepts: Vec<Arc<Concept>>,
    /// id -> slot
    slots: AHashMap<ConceptId, u32>,
    /// code -> slots
    code_index: AHashMap<String, Vec<u32>>,
    /// lowercase name -> slots
    name_index: AHashMap<String, Vec<u32>>,
    /// vocabulary -> bitmap of slots
    vocabulary_index: AHashMap<Vocabulary, RoaringBitmap>,
}

impl ConceptStore {
    fn add(&mut self, concept: Concept) -> ConceptId {
        let id = concept.id;
        if let Some(&slot) = self.slots.get(&id) {
            // Re-adding an id replaces the concept; drop its old index entries.
            let old = Arc::clone(&self.concepts[slot as usize]);
            remove_slot(&mut self.code_index, &old.code, slot);
            remove_slot(&mut self.name_index, &old.name.to_lowercase(), slot);
            if let Some(bitmap) = self.vocabulary_index.get_mut(&old.vocabulary) {
                bitmap.remove(slot);
            }
            self.index(slot, &concept);
            self.concepts[slot as usize] = Arc::new(concept);
            return id;
        }

        let slot = self.concepts.len() as u32;
        self.index(slot, &concept);
        self.slots.insert(id, slot);
        self.concepts.push(Arc::new(concept));
        id
    }

    fn index(&mut self, slot: u32, concept: &Concept) {
        self.code_index
            .entry(concept.code.clone())
            .or_default()
            .push(slot);
        self.name_index
            .entry(concept.name.to_lowercase())
            .or_default()
            .push(slot);
        self.vocabulary_index
            .entry(concept.vocabulary)
            .or_insert_with(RoaringBitmap::new)
            .insert(slot);
    }

    fn get(&self, id: ConceptId) -> Option<&Arc<Concept>> {
        let slot = *self.slots.get(&id)?;
        self.concepts.get(slot as usize)
    }

    fn by_slots<'a>(&'a self, slots: &'a [u32]) -> impl Iterator<Item = &'a Arc<Concept>> + 'a {
        slots.iter().filter_map(|&s| self.concepts.get(s as usize))
    }
}

fn remove_slot(index: &mut AHashMap<String, Vec<u32>>, key: &str, slot: u32) {
    if let Some(slots) = index.get_mut(key) {
        slots.retain(|&s| s != slot);
    }
}

// ============================================================================
// Relationship Storage (Edge-List with Indexes)
// ============================================================================

#[derive(Debug, Default)]
struct RelationshipStore {
    relationships: Vec<Relationship>,
    /// (source, predicate) -> relationship ids
    forward_index: AHashMap<(ConceptId, Predicate), Vec<u32>>,
    /// (target, predicate) -> relationship ids
    backward_index: AHashMap<(ConceptId, Predicate), Vec<u32>>,
    /// source -> relationship ids
    outgoing_index: AHashMap<ConceptId, Vec<u32>>,
    /// predicate -> relationship ids
    predicate_index: AHashMap<Predicate, RoaringBitmap>,
}

impl RelationshipStore {
    fn add(&mut self, rel: Relationship) -> u32 {
        let id = self.relationships.len() as u32;

        self.forward_index
            .entry((rel.concept_one, rel.predicate))
            .or_default()
            .push(id);
        self.backward_index
            .entry((rel.concept_two, rel.predicate))
            .or_default()
            .push(id);
        self.outgoing_index
            .entry(rel.concept_one)
            .or_default()
            .push(id);
        self.predicate_index
            .entry(rel.predicate)
            .or_insert_with(RoaringBitmap::new)
            .insert(id);

        self.relationships.push(rel);
        id
    }

    fn outgoing(&self, source: ConceptId, predicate: Predicate) -> &[u32] {
        self.forward_index
            .get(&(source, predicate))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn incoming(&self, target: ConceptId, predicate: Predicate) -> &[u32] {
        self.backward_index
            .get(&(target, predicate))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn outgoing_any(&self, source: ConceptId) -> &[u32] {
        self.outgoing_index
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn get(&self, id: u32) -> Option<&Relationship> {
        self.relationships.get(id as usize)
    }
}

// ============================================================================
// Snapshot format
// ============================================================================

/// A child → parent edge of a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyEdge {
    pub child: ConceptId,
    pub parent: ConceptId,
}

/// Serializable form of an [`OntologyGraph`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologySnapshot {
    pub concepts: Vec<Concept>,
    pub relationships: Vec<Relationship>,
    #[serde(default)]
    pub hierarchy: Vec<HierarchyEdge>,
    /// Clinical term → designated primary system-organ class.
    #[serde(default)]
    pub primary_classes: Vec<HierarchyEdge>,
}

// ============================================================================
// OntologyGraph
// ============================================================================

/// Indexed, in-memory terminology graph.
///
/// Built once (programmatically or from a snapshot) and then only read.
#[derive(Debug, Default)]
pub struct OntologyGraph {
    concepts: ConceptStore,
    relationships: RelationshipStore,
    parents: AHashMap<ConceptId, Vec<ConceptId>>,
    children: AHashMap<ConceptId, Vec<ConceptId>>,
    primary_classes: AHashMap<ConceptId, Vec<ConceptId>>,
    hierarchy_edges: Vec<HierarchyEdge>,
    primary_class_edges: Vec<HierarchyEdge>,
}

/// Table sizes, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub concepts: usize,
    pub relationships: usize,
    pub hierarchy_edges: usize,
    pub primary_class_edges: usize,
}

impl OntologyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.concepts.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.concepts.is_empty()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            concepts: self.len(),
            relationships: self.relationships.relationships.len(),
            hierarchy_edges: self.hierarchy_edges.len(),
            primary_class_edges: self.primary_class_edges.len(),
        }
    }

    /// Add (or replace) a concept.
    pub fn add_concept(&mut self, concept: Concept) -> ConceptId {
        self.concepts.add(concept)
    }

    /// Add a relationship exactly as given.
    pub fn add_relationship(&mut self, rel: Relationship) -> u32 {
        self.relationships.add(rel)
    }

    /// Add `one --predicate--> two` and, when the predicate has one, the
    /// reverse edge with the inverse predicate.
    pub fn relate(&mut self, one: ConceptId, predicate: Predicate, two: ConceptId) {
        self.relationships
            .add(Relationship::new(one, predicate, two));
        if let Some(inverse) = predicate.inverse() {
            self.relationships
                .add(Relationship::new(two, inverse, one));
        }
    }

    /// Record `parent` as an immediate ancestor of `child`.
    pub fn add_parent(&mut self, child: ConceptId, parent: ConceptId) {
        let parents = self.parents.entry(child).or_default();
        if parents.contains(&parent) {
            return;
        }
        parents.push(parent);
        self.children.entry(parent).or_default().push(child);
        self.hierarchy_edges.push(HierarchyEdge { child, parent });
    }

    /// Record `class` as the designated primary class of `term`.
    pub fn add_primary_class(&mut self, term: ConceptId, class: ConceptId) {
        let classes = self.primary_classes.entry(term).or_default();
        if !classes.contains(&class) {
            classes.push(class);
            self.primary_class_edges.push(HierarchyEdge {
                child: term,
                parent: class,
            });
        }
    }

    fn resolve(&self, ids: &[ConceptId]) -> Vec<Arc<Concept>> {
        ids.iter()
            .filter_map(|id| self.concepts.get(*id))
            .cloned()
            .collect()
    }

    fn resolve_relationship(&self, id: u32) -> Option<ResolvedRelationship> {
        let rel = self.relationships.get(id)?;
        Some(ResolvedRelationship {
            id,
            one: Arc::clone(self.concepts.get(rel.concept_one)?),
            two: Arc::clone(self.concepts.get(rel.concept_two)?),
            predicate: rel.predicate,
            group: rel.group,
            source: rel.source.clone(),
            invalid_reason: rel.invalid_reason,
        })
    }

    fn ancestors(&self, id: ConceptId) -> Vec<ConceptId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<ConceptId> = VecDeque::from([id]);
        let mut out = Vec::new();
        while let Some(next) = queue.pop_front() {
            for &parent in self.parents.get(&next).map(Vec::as_slice).unwrap_or_default() {
                if seen.insert(parent) {
                    out.push(parent);
                    queue.push_back(parent);
                }
            }
        }
        out
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    pub fn from_snapshot(snapshot: OntologySnapshot) -> Self {
        let mut graph = Self::new();
        for concept in snapshot.concepts {
            graph.add_concept(concept);
        }
        for rel in snapshot.relationships {
            graph.add_relationship(rel);
        }
        for edge in snapshot.hierarchy {
            graph.add_parent(edge.child, edge.parent);
        }
        for edge in snapshot.primary_classes {
            graph.add_primary_class(edge.child, edge.parent);
        }
        graph
    }

    pub fn to_snapshot(&self) -> OntologySnapshot {
        OntologySnapshot {
            concepts: self.concepts.concepts.iter().map(|c| (**c).clone()).collect(),
            relationships: self.relationships.relationships.clone(),
            hierarchy: self.hierarchy_edges.clone(),
            primary_classes: self.primary_class_edges.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: OntologySnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Serialize to the binary snapshot format.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&self.to_snapshot())?;
        let mut out = Vec::with_capacity(payload.len() + 16);
        out.extend_from_slice(SNAPSHOT_MAGIC);
        out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Deserialize from the binary snapshot format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 16 || &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(anyhow::anyhow!("Invalid ontology snapshot"));
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into()?);
        if version != SNAPSHOT_VERSION {
            return Err(anyhow::anyhow!("Unsupported snapshot version: {}", version));
        }
        let len = usize::try_from(u64::from_le_bytes(bytes[8..16].try_into()?))?;
        let end = 16usize
            .checked_add(len)
            .ok_or_else(|| anyhow::anyhow!("Truncated ontology snapshot"))?;
        let payload = bytes
            .get(16..end)
            .ok_or_else(|| anyhow::anyhow!("Truncated ontology snapshot"))?;
        let snapshot: OntologySnapshot = bincode::deserialize(payload)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Load a snapshot; `.json` files are read as JSON, anything else as binary.
    pub fn load(path: &Path) -> Result<Self> {
        if is_json(path) {
            Self::from_json(&std::fs::read_to_string(path)?)
        } else {
            Self::from_bytes(&std::fs::read(path)?)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if is_json(path) {
            std::fs::write(path, self.to_json()?)?;
        } else {
            std::fs::write(path, self.to_bytes()?)?;
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn in_domains(concept: &Concept, domains: Option<&[Domain]>) -> bool {
    domains.map_or(true, |d| d.contains(&concept.domain))
}

// ============================================================================
// OntologyStore
// ============================================================================

impl OntologyStore for OntologyGraph {
    fn concept(&self, id: ConceptId) -> Option<Arc<Concept>> {
        self.concepts.get(id).cloned()
    }

    fn concepts_by_code(&self, code: &str, vocabularies: VocabularySet) -> Vec<Arc<Concept>> {
        let Some(slots) = self.concepts.code_index.get(code) else {
            return Vec::new();
        };
        self.concepts
            .by_slots(slots)
            .filter(|c| vocabularies.contains(c.vocabulary))
            .cloned()
            .collect()
    }

    fn concepts_by_name(&self, name: &str, vocabularies: VocabularySet) -> Vec<Arc<Concept>> {
        let Some(slots) = self.concepts.name_index.get(&name.to_lowercase()) else {
            return Vec::new();
        };
        self.concepts
            .by_slots(slots)
            .filter(|c| vocabularies.contains(c.vocabulary))
            .cloned()
            .collect()
    }

    fn concepts_in_vocabulary(&self, vocabulary: Vocabulary, domain: Option<Domain>) -> Vec<Arc<Concept>> {
        let Some(bitmap) = self.concepts.vocabulary_index.get(&vocabulary) else {
            return Vec::new();
        };
        bitmap
            .iter()
            .filter_map(|slot| self.concepts.concepts.get(slot as usize))
            .filter(|c| c.is_valid())
            .filter(|c| domain.map_or(true, |d| c.domain == d))
            .cloned()
            .collect()
    }

    fn parents(&self, concept: &Concept) -> Vec<Arc<Concept>> {
        self.resolve(self.parents.get(&concept.id).map(Vec::as_slice).unwrap_or_default())
    }

    fn children(&self, concept: &Concept) -> Vec<Arc<Concept>> {
        self.resolve(self.children.get(&concept.id).map(Vec::as_slice).unwrap_or_default())
    }

    fn related(
        &self,
        concept: &Concept,
        predicates: &[Predicate],
        vocabularies: VocabularySet,
        domains: Option<&[Domain]>,
    ) -> Vec<Arc<Concept>> {
        let mut seen = BTreeSet::new();
        let mut out: Vec<Arc<Concept>> = predicates
            .iter()
            .flat_map(|p| self.relationships.outgoing(concept.id, *p))
            .filter_map(|&id| self.relationships.get(id))
            .filter_map(|rel| self.concepts.get(rel.concept_two))
            .filter(|c| vocabularies.contains(c.vocabulary) && in_domains(c, domains))
            .filter(|c| seen.insert(c.id))
            .cloned()
            .collect();
        out.sort();
        out
    }

    fn combination_partners(&self, concept: ConceptId, predicates: &[Predicate]) -> BTreeSet<ConceptId> {
        let mut partners = BTreeSet::new();
        for p in predicates {
            for &id in self.relationships.outgoing(concept, *p) {
                let Some(rel) = self.relationships.get(id) else {
                    continue;
                };
                for q in predicates {
                    for &back in self.relationships.incoming(rel.concept_two, *q) {
                        if let Some(other) = self.relationships.get(back) {
                            partners.insert(other.concept_one);
                        }
                    }
                }
            }
        }
        partners
    }

    fn relationships_between(
        &self,
        from: VocabularySet,
        to: VocabularySet,
        predicates: Option<&[Predicate]>,
    ) -> Vec<ResolvedRelationship> {
        let ids: Vec<u32> = match predicates {
            Some(predicates) => {
                let mut ids = RoaringBitmap::new();
                for p in predicates {
                    if let Some(bitmap) = self.relationships.predicate_index.get(p) {
                        ids |= bitmap;
                    }
                }
                ids.iter().collect()
            }
            None => (0..self.relationships.relationships.len() as u32).collect(),
        };
        ids.into_iter()
            .filter_map(|id| self.resolve_relationship(id))
            .filter(|r| from.contains(r.one.vocabulary) && to.contains(r.two.vocabulary))
            .collect()
    }

    fn relationships_from(&self, concept: &Concept, to: VocabularySet) -> Vec<ResolvedRelationship> {
        self.relationships
            .outgoing_any(concept.id)
            .iter()
            .filter_map(|&id| self.resolve_relationship(id))
            .filter(|r| to.contains(r.two.vocabulary))
            .collect()
    }

    fn system_organ_classes(
        &self,
        ids: &[ConceptId],
        primary: bool,
    ) -> BTreeMap<ConceptId, Vec<Arc<Concept>>> {
        let mut out = BTreeMap::new();
        for &id in ids {
            let classes = if primary {
                self.resolve(self.primary_classes.get(&id).map(Vec::as_slice).unwrap_or_default())
            } else {
                self.resolve(&self.ancestors(id))
                    .into_iter()
                    .filter(|c| c.class == ConceptClass::SystemOrganClass)
                    .collect()
            };
            if !classes.is_empty() {
                out.insert(id, classes);
            }
        }
        out
    }
}
