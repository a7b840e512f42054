//! OntologyGraph Tests

use proptest::prelude::*;
use rosetta_ontology::*;
use std::sync::Arc;
use tempfile::tempdir;

// ============================================================================
// Fixture
// ============================================================================

fn id(raw: u32) -> ConceptId {
    ConceptId::new(raw)
}

fn sample_graph() -> OntologyGraph {
    let mut g = OntologyGraph::new();
    g.add_concept(Concept::new(1, "Hepatitis", "128241005", Vocabulary::Snomed, Domain::Condition, "Clinical Finding"));
    g.add_concept(Concept::new(2, "Liver structure", "10200004", Vocabulary::Snomed, Domain::SpecAnatomicSite, "Body Structure"));
    g.add_concept(Concept::new(3, "Inflammation", "23583003", Vocabulary::Snomed, Domain::Observation, "Morph Abnormality"));
    g.add_concept(Concept::new(4, "Disorder of liver", "235856003", Vocabulary::Snomed, Domain::Condition, "Clinical Finding"));
    g.add_concept(Concept::new(5, "LIVER", "C12392", Vocabulary::Specimen, Domain::SpecAnatomicSite, "Specimen"));
    g.add_concept(
        Concept::new(6, "Old liver", "999", Vocabulary::Snomed, Domain::SpecAnatomicSite, "Body Structure")
            .with_invalid_reason(InvalidReason::Deleted),
    );
    g.add_concept(Concept::new(10, "Hepatitis", "10019717", Vocabulary::MedDra, Domain::Condition, "PT"));
    g.add_concept(Concept::new(11, "Hepatobiliary disorders", "10019805", Vocabulary::MedDra, Domain::Condition, "SOC"));
    g.add_concept(Concept::new(12, "Hepatic disorders NEC", "10019654", Vocabulary::MedDra, Domain::Condition, "HLT"));

    g.relate(id(1), Predicate::HasFindingSite, id(2));
    g.relate(id(1), Predicate::HasAssoMorph, id(3));
    g.add_relationship(Relationship::new(id(2), Predicate::Exact, id(5)).in_group(7));
    g.add_relationship(Relationship::new(id(10), Predicate::MapsTo, id(1)).with_source("Athena"));

    g.add_parent(id(1), id(4));
    g.add_parent(id(10), id(12));
    g.add_parent(id(12), id(11));
    g.add_primary_class(id(10), id(11));
    g
}

// ============================================================================
// Lookups
// ============================================================================

#[test]
fn test_lookup_by_code_respects_vocabularies() {
    let g = sample_graph();
    assert_eq!(g.concepts_by_code("10019717", VocabularySet::CLINICAL).len(), 1);
    assert!(g.concepts_by_code("10019717", VocabularySet::PRECLINICAL).is_empty());
    assert!(g.concepts_by_code("missing", VocabularySet::ALL).is_empty());
}

#[test]
fn test_lookup_by_name_is_case_insensitive() {
    let g = sample_graph();
    let found = g.concepts_by_name("liver", VocabularySet::SEND);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, id(5));
}

#[test]
fn test_vocabulary_listing_skips_invalid() {
    let g = sample_graph();
    let sites = g.concepts_in_vocabulary(Vocabulary::Snomed, Some(Domain::SpecAnatomicSite));
    let ids: Vec<ConceptId> = sites.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![id(2)]);
}

#[test]
fn test_add_concept_replaces_existing_id() {
    let mut g = sample_graph();
    g.add_concept(Concept::new(5, "LIVER, LOBE", "C99999", Vocabulary::Specimen, Domain::SpecAnatomicSite, "Specimen"));
    assert_eq!(g.len(), 9);
    assert!(g.concepts_by_code("C12392", VocabularySet::ALL).is_empty());
    assert_eq!(g.concepts_by_code("C99999", VocabularySet::ALL).len(), 1);
}

// ============================================================================
// Edges and hierarchy
// ============================================================================

#[test]
fn test_relate_adds_inverse_edges() {
    let g = sample_graph();
    let liver = g.concept(id(2)).unwrap();
    let findings = g.findings_for_site(&liver);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].id, id(1));

    let hepatitis = g.concept(id(1)).unwrap();
    let sites = g.finding_sites(&hepatitis);
    assert_eq!(sites[0].id, id(2));
}

#[test]
fn test_related_filters_by_vocabulary_and_domain() {
    let g = sample_graph();
    let hepatitis = g.concept(id(1)).unwrap();
    let sites = g.related(
        &hepatitis,
        Predicate::STRUCTURAL,
        VocabularySet::INTERMEDIARY,
        Some(&[Domain::SpecAnatomicSite]),
    );
    assert_eq!(sites.iter().map(|c| c.id).collect::<Vec<_>>(), vec![id(2)]);

    let all = g.related(&hepatitis, Predicate::STRUCTURAL, VocabularySet::INTERMEDIARY, None);
    assert_eq!(all.len(), 2);
}

#[test]
fn test_related_to_all_intersects() {
    let g = sample_graph();
    let liver = g.concept(id(2)).unwrap();
    let inflammation = g.concept(id(3)).unwrap();
    let common = g.related_to_all(
        &[liver, inflammation],
        Predicate::TEMPLATE,
        VocabularySet::INTERMEDIARY,
        Some(Domain::TEMPLATE_TARGETS),
    );
    assert_eq!(common.iter().map(|c| c.id).collect::<Vec<_>>(), vec![id(1)]);
}

#[test]
fn test_combination_partners_share_a_target() {
    let g = sample_graph();
    let partners = g.combination_partners(id(3), Predicate::TEMPLATE);
    assert!(partners.contains(&id(2)));
    assert!(partners.contains(&id(3)));
}

#[test]
fn test_parents_and_children() {
    let g = sample_graph();
    let hepatitis = g.concept(id(1)).unwrap();
    let parents = g.parents(&hepatitis);
    assert_eq!(parents[0].id, id(4));
    let children = g.children(&parents[0]);
    assert_eq!(children[0].id, id(1));
}

#[test]
fn test_system_organ_classes() {
    let g = sample_graph();
    let primary = g.system_organ_classes(&[id(10)], true);
    assert_eq!(primary[&id(10)][0].id, id(11));

    let ancestors = g.system_organ_classes(&[id(10), id(1)], false);
    assert_eq!(ancestors[&id(10)][0].id, id(11));
    assert!(!ancestors.contains_key(&id(1)));
}

#[test]
fn test_bulk_relationship_scan() {
    let g = sample_graph();
    let into_preclinical =
        g.relationships_between(VocabularySet::INTERMEDIARY, VocabularySet::PRECLINICAL, None);
    assert_eq!(into_preclinical.len(), 1);
    assert_eq!(into_preclinical[0].group, Some(CombinationGroup(7)));

    let maps_to = g.relationships_between(
        VocabularySet::CLINICAL,
        VocabularySet::INTERMEDIARY,
        Some(&[Predicate::MapsTo]),
    );
    assert_eq!(maps_to.len(), 1);
    assert_eq!(maps_to[0].source.as_deref(), Some("Athena"));
}

#[test]
fn test_ungrouped_relationships_form_their_own_group() {
    let g = sample_graph();
    let rels = g.relationships_between(VocabularySet::CLINICAL, VocabularySet::INTERMEDIARY, None);
    assert!(matches!(rels[0].group_key(), GroupKey::Single(_)));
}

// ============================================================================
// Snapshots
// ============================================================================

#[test]
fn test_binary_snapshot_on_disk() {
    let g = sample_graph();
    let dir = tempdir().unwrap();
    let path = dir.path().join("ontology.rsta");
    g.save(&path).unwrap();

    let loaded = OntologyGraph::load(&path).unwrap();
    assert_eq!(loaded.stats(), g.stats());
    let hepatitis = loaded.concept(id(1)).unwrap();
    assert_eq!(loaded.parents(&hepatitis)[0].id, id(4));
}

#[test]
fn test_json_snapshot_on_disk() {
    let g = sample_graph();
    let dir = tempdir().unwrap();
    let path = dir.path().join("ontology.json");
    g.save(&path).unwrap();

    let loaded = OntologyGraph::load(&path).unwrap();
    assert_eq!(loaded.stats(), g.stats());
    let old = loaded.concept(id(6)).unwrap();
    assert_eq!(old.invalid_reason, Some(InvalidReason::Deleted));
}

#[test]
fn test_rejects_foreign_bytes() {
    assert!(OntologyGraph::from_bytes(b"AXPD\x01\x00\x00\x00").is_err());
    assert!(OntologyGraph::from_bytes(b"RSTA\x09\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00").is_err());
}

#[test]
fn test_rejects_oversized_payload_length() {
    let mut bytes = sample_graph().to_bytes().unwrap();
    bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
    assert!(OntologyGraph::from_bytes(&bytes).is_err());

    let mut bytes = sample_graph().to_bytes().unwrap();
    let claimed = (bytes.len() as u64 - 16) + 1;
    bytes[8..16].copy_from_slice(&claimed.to_le_bytes());
    assert!(OntologyGraph::from_bytes(&bytes).is_err());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_children_mirror_parents(edges in prop::collection::vec((0u32..12, 0u32..12), 0..40)) {
        let mut g = OntologyGraph::new();
        for i in 0..12 {
            g.add_concept(Concept::new(i, format!("c{i}"), format!("{i}"), Vocabulary::Snomed, Domain::Condition, "Clinical Finding"));
        }
        for (child, parent) in &edges {
            g.add_parent(id(*child), id(*parent));
        }
        for i in 0..12 {
            let c: Arc<Concept> = g.concept(id(i)).unwrap();
            for p in g.parents(&c) {
                prop_assert!(g.children(&p).iter().any(|k| k.id == c.id));
            }
        }
    }
}
