//! Shared test fixture: a small toxicology graph.
//!
//! ```text
//!   MedDRA                 SNOMED                               SEND / eTox
//!   PT Hepatitis ──MapsTo──► Hepatitis ─┬ finding site ► Liver structure ──► LIVER, liver (MA)
//!    └ LLT Hepatitis NOS               └ morphology   ► Inflammation    ──► INFLAMMATION
//!                                         {Liver structure, Inflammation} ──► {LIVER, INFLAMMATION}
//!   PT Injection site necrosis ◄── Injection site necrosis ◄─ {Necrosis, Injection site structure}
//!   PT Skin ulcer ◄── Ulcer of skin ◄─ {Skin structure, Ulcer}          ◄── skin (MA), Ulceration (HPATH)
//!   Entire heart ──is-a──► Heart structure                              ◄── heart (MA)
//! ```
#![allow(dead_code)]

use rosetta_mapping::{EngineConfig, Mapping, MappingItem, Translator};
use rosetta_ontology::*;
use std::collections::BTreeSet;
use std::sync::Arc;

// MedDRA
pub const PT_HEPATITIS: &str = "10019717";
pub const LLT_HEPATITIS: &str = "10019721";
pub const PT_INJECTION_SITE_NECROSIS: &str = "10022075";
pub const PT_SKIN_ULCER: &str = "10040943";
pub const SOC_HEPATOBILIARY: &str = "10019805";

// SNOMED
pub const SNOMED_LIVER: &str = "10200004";
pub const SNOMED_ENTIRE_LIVER: &str = "181268008";
pub const SNOMED_HEART: &str = "80891009";

// SEND
pub const SEND_LIVER: &str = "C12392";
pub const SEND_INFLAMMATION: &str = "C3137";
pub const SEND_NECROSIS: &str = "C2913";
pub const SEND_INJECTION_SITE: &str = "C43362";
pub const SEND_ULCER: &str = "C3426";
pub const SEND_UNMAPPED: &str = "C99999";

// eTox
pub const MA_LIVER: &str = "MA:0000358";
pub const MA_SKIN: &str = "MA:0000151";
pub const MA_HEART: &str = "MA:0000072";
pub const HPATH_ULCERATION: &str = "HP:0000412";

fn id(raw: u32) -> ConceptId {
    ConceptId::new(raw)
}

fn meddra(g: &mut OntologyGraph, raw: u32, name: &str, code: &str, class: &str) {
    g.add_concept(Concept::new(raw, name, code, Vocabulary::MedDra, Domain::Condition, class));
}

fn snomed(g: &mut OntologyGraph, raw: u32, name: &str, code: &str, domain: Domain, class: &str) {
    g.add_concept(Concept::new(raw, name, code, Vocabulary::Snomed, domain, class));
}

fn preclinical(g: &mut OntologyGraph, raw: u32, name: &str, code: &str, vocabulary: Vocabulary, domain: Domain) {
    g.add_concept(Concept::new(raw, name, code, vocabulary, domain, "Preclinical"));
}

pub fn graph() -> OntologyGraph {
    let mut g = OntologyGraph::new();

    // --- MedDRA ---
    meddra(&mut g, 100, "Hepatitis", PT_HEPATITIS, "PT");
    meddra(&mut g, 101, "Hepatitis NOS", LLT_HEPATITIS, "LLT");
    meddra(&mut g, 110, "Injection site necrosis", PT_INJECTION_SITE_NECROSIS, "PT");
    meddra(&mut g, 111, "Skin ulcer", PT_SKIN_ULCER, "PT");
    meddra(&mut g, 112, "Ulcer skin", "10040947", "LLT");
    meddra(&mut g, 120, "Hepatobiliary disorders", SOC_HEPATOBILIARY, "SOC");
    meddra(&mut g, 121, "Hepatic disorders NEC", "10019654", "HLT");
    g.add_parent(id(101), id(100));
    g.add_parent(id(112), id(111));
    g.add_parent(id(100), id(121));
    g.add_parent(id(121), id(120));
    g.add_primary_class(id(100), id(120));

    // --- SNOMED ---
    use Domain::{Condition, Observation, SpecAnatomicSite};
    snomed(&mut g, 200, "Hepatitis", "128241005", Condition, "Clinical Finding");
    snomed(&mut g, 201, "Liver structure", SNOMED_LIVER, SpecAnatomicSite, "Body Structure");
    snomed(&mut g, 202, "Inflammation", "23583003", Observation, "Morph Abnormality");
    snomed(&mut g, 203, "Abdominal organ structure", "113343008", SpecAnatomicSite, "Body Structure");
    snomed(&mut g, 204, "Inflammatory morphology", "409774005", Observation, "Morph Abnormality");
    snomed(&mut g, 205, "Disorder of liver", "235856003", Condition, "Clinical Finding");
    snomed(&mut g, 206, "Entire liver", SNOMED_ENTIRE_LIVER, SpecAnatomicSite, "Body Structure");
    snomed(&mut g, 210, "Necrosis", "6574001", Observation, "Morph Abnormality");
    snomed(&mut g, 211, "Injection site structure", "385397004", SpecAnatomicSite, "Body Structure");
    snomed(&mut g, 212, "Injection site necrosis", "95403001", Condition, "Clinical Finding");
    snomed(&mut g, 213, "Skin structure", "39937001", SpecAnatomicSite, "Body Structure");
    snomed(&mut g, 214, "Ulcer", "56208002", Observation, "Morph Abnormality");
    snomed(&mut g, 215, "Ulcer of skin", "46742003", Condition, "Clinical Finding");
    snomed(&mut g, 217, "Entire heart", "302509004", SpecAnatomicSite, "Body Structure");
    snomed(&mut g, 218, "Heart structure", SNOMED_HEART, SpecAnatomicSite, "Body Structure");

    g.relate(id(200), Predicate::HasFindingSite, id(201));
    g.relate(id(200), Predicate::HasAssoMorph, id(202));
    g.relate(id(212), Predicate::HasFindingSite, id(211));
    g.relate(id(212), Predicate::HasAssoMorph, id(210));
    g.relate(id(215), Predicate::HasFindingSite, id(213));
    g.relate(id(215), Predicate::HasAssoMorph, id(214));

    g.add_parent(id(201), id(203));
    g.add_parent(id(202), id(204));
    g.add_parent(id(200), id(205));
    g.add_parent(id(206), id(201));
    g.add_parent(id(217), id(218));

    // --- clinical equivalences ---
    g.add_relationship(Relationship::new(id(100), Predicate::MapsTo, id(200)).with_source("Athena"));
    g.add_relationship(Relationship::new(id(200), Predicate::MappedFrom, id(100)));
    g.relate(id(212), Predicate::MapsTo, id(110));
    g.relate(id(215), Predicate::MapsTo, id(111));
    g.relate(id(215), Predicate::SnomedMedDraEq, id(112));

    // --- preclinical ---
    use Vocabulary::{Hpath, Ma, NonNeoplasticFinding, Specimen};
    preclinical(&mut g, 301, "LIVER", SEND_LIVER, Specimen, SpecAnatomicSite);
    preclinical(&mut g, 302, "INFLAMMATION", SEND_INFLAMMATION, NonNeoplasticFinding, Observation);
    preclinical(&mut g, 303, "NECROSIS", SEND_NECROSIS, NonNeoplasticFinding, Observation);
    preclinical(&mut g, 304, "SITE, INJECTION", SEND_INJECTION_SITE, Specimen, SpecAnatomicSite);
    preclinical(&mut g, 305, "ULCER", SEND_ULCER, NonNeoplasticFinding, Observation);
    preclinical(&mut g, 399, "UNMAPPED", SEND_UNMAPPED, NonNeoplasticFinding, Observation);
    preclinical(&mut g, 311, "liver", MA_LIVER, Ma, SpecAnatomicSite);
    preclinical(&mut g, 312, "skin", MA_SKIN, Ma, SpecAnatomicSite);
    preclinical(&mut g, 313, "Ulceration", HPATH_ULCERATION, Hpath, Observation);
    preclinical(&mut g, 314, "heart", MA_HEART, Ma, SpecAnatomicSite);

    for (one, two) in [
        (301, 201),
        (302, 202),
        (303, 210),
        (304, 211),
        (305, 214),
        (311, 201),
        (312, 213),
        (313, 214),
        (314, 217),
    ] {
        g.relate(id(one), Predicate::Exact, id(two));
    }

    // {Liver structure, Inflammation} → {LIVER, INFLAMMATION}
    g.add_relationship(Relationship::new(id(201), Predicate::Exact, id(301)).in_group(1));
    g.add_relationship(Relationship::new(id(202), Predicate::Exact, id(302)).in_group(1));

    g
}

pub fn translator() -> Translator {
    Translator::new(Arc::new(graph()), EngineConfig::default())
}

/// Raw concept ids of every result item of `chain`.
pub fn target_ids(chain: &Mapping) -> BTreeSet<Vec<u32>> {
    chain
        .to()
        .iter()
        .map(|item| item.ids().into_iter().map(ConceptId::raw).collect())
        .collect()
}

pub fn targets(raw: &[u32]) -> BTreeSet<Vec<u32>> {
    BTreeSet::from([raw.to_vec()])
}

/// The source item every chain root must start from.
pub fn source_item(g: &OntologyGraph, raw: &[u32]) -> MappingItem {
    raw.iter()
        .filter_map(|r| g.concept(id(*r)))
        .collect()
}
