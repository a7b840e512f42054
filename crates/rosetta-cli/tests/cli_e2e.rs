use rosetta_ontology::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::tempdir;

fn rosetta_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_rosetta"))
}

fn id(raw: u32) -> ConceptId {
    ConceptId::new(raw)
}

/// Hepatitis and its SEND decomposition.
fn write_graph(path: &Path) {
    let mut g = OntologyGraph::new();
    g.add_concept(Concept::new(1, "Hepatitis", "10019717", Vocabulary::MedDra, Domain::Condition, "PT"));
    g.add_concept(Concept::new(2, "Hepatobiliary disorders", "10019805", Vocabulary::MedDra, Domain::Condition, "SOC"));
    g.add_concept(Concept::new(10, "Hepatitis", "128241005", Vocabulary::Snomed, Domain::Condition, "Clinical Finding"));
    g.add_concept(Concept::new(11, "Liver structure", "10200004", Vocabulary::Snomed, Domain::SpecAnatomicSite, "Body Structure"));
    g.add_concept(Concept::new(12, "Inflammation", "23583003", Vocabulary::Snomed, Domain::Observation, "Morph Abnormality"));
    g.add_concept(Concept::new(20, "LIVER", "C12392", Vocabulary::Specimen, Domain::SpecAnatomicSite, "Specimen"));
    g.add_concept(Concept::new(21, "INFLAMMATION", "C3137", Vocabulary::NonNeoplasticFinding, Domain::Observation, "Finding"));

    g.add_relationship(Relationship::new(id(1), Predicate::MapsTo, id(10)));
    g.relate(id(10), Predicate::HasFindingSite, id(11));
    g.relate(id(10), Predicate::HasAssoMorph, id(12));
    g.add_relationship(Relationship::new(id(11), Predicate::Exact, id(20)).in_group(1));
    g.add_relationship(Relationship::new(id(12), Predicate::Exact, id(21)).in_group(1));
    g.add_parent(id(1), id(2));
    g.add_primary_class(id(1), id(2));
    g.save(path).unwrap();
}

fn rosetta(args: &[&str]) -> Output {
    let output = Command::new(rosetta_bin())
        .args(args)
        .env("NO_COLOR", "1")
        .output()
        .expect("run rosetta");
    assert!(
        output.status.success(),
        "rosetta {args:?} failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

#[test]
fn translate_prints_json() {
    let dir = tempdir().unwrap();
    let graph = dir.path().join("graph.json");
    write_graph(&graph);

    let output = rosetta(&[
        "translate",
        "--graph",
        graph.to_str().unwrap(),
        "--algorithm",
        "MEDDRAPT2SEND",
        "--json",
        "10019717",
    ]);
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let first = &results[0];
    assert_eq!(first["total_penalty"], 0.0);
    let names: Vec<&str> = first["to"][0]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["LIVER", "INFLAMMATION"]);
}

#[test]
fn soc_and_stats() {
    let dir = tempdir().unwrap();
    let graph = dir.path().join("graph.json");
    write_graph(&graph);

    let soc = rosetta(&["soc", "--graph", graph.to_str().unwrap(), "10019717"]);
    assert!(String::from_utf8_lossy(&soc.stdout).contains("Hepatobiliary disorders"));

    let stats = rosetta(&["stats", "--graph", graph.to_str().unwrap(), "--json"]);
    let report: serde_json::Value = serde_json::from_slice(&stats.stdout).unwrap();
    assert_eq!(report["graph"]["concepts"], 7);
    assert_eq!(report["index"]["clinical"], 1);
}

#[test]
fn snapshot_converts_to_binary() {
    let dir = tempdir().unwrap();
    let graph = dir.path().join("graph.json");
    let binary = dir.path().join("graph.rsta");
    write_graph(&graph);

    rosetta(&["snapshot", "--graph", graph.to_str().unwrap(), "--out", binary.to_str().unwrap()]);
    let reloaded = OntologyGraph::load(&binary).unwrap();
    assert_eq!(reloaded.len(), 7);
}
