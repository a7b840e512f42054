//! Human-readable rendering of translation results.

use colored::{ColoredString, Colorize};
use rosetta_mapping::{IndexStats, Mapping, MappingAlgorithm};
use rosetta_ontology::GraphStats;
use std::sync::Arc;

pub fn print_results(algorithm: MappingAlgorithm, results: &[Arc<Mapping>], explain: bool) {
    println!(
        "{} {} result(s)",
        algorithm.to_string().bold(),
        results.len()
    );
    for (i, chain) in results.iter().enumerate() {
        println!();
        if chain.is_no_mapping() {
            println!("{:>3}. {}", i + 1, chain.description().dimmed());
            continue;
        }
        println!(
            "{:>3}. [{}] {}",
            i + 1,
            penalty(chain.total_penalty()),
            targets(chain)
        );
        if explain {
            for line in chain.explanation_string().lines().filter(|l| !l.is_empty()) {
                println!("       {line}");
            }
        }
    }
}

fn targets(chain: &Mapping) -> String {
    chain
        .to()
        .iter()
        .map(|item| item.human_readable())
        .collect::<Vec<_>>()
        .join("  OR  ")
}

/// Exact results in green, approximations in yellow, negative (wrong kind of
/// target) in red.
fn penalty(total: f64) -> ColoredString {
    let text = format!("{total:+.1}");
    if total == 0.0 {
        text.green().bold()
    } else if total > 0.0 {
        text.yellow()
    } else {
        text.red()
    }
}

pub fn print_stats(graph: &GraphStats, index: &IndexStats) {
    println!("{}", "ontology".bold());
    println!("  concepts:            {}", graph.concepts);
    println!("  relationships:       {}", graph.relationships);
    println!("  hierarchy edges:     {}", graph.hierarchy_edges);
    println!("  primary class edges: {}", graph.primary_class_edges);
    println!("{}", "reference index".bold());
    println!("  combinations:        {}", index.combinations);
    println!("  eTox partial keys:   {}", index.etox_partial);
    println!("  SEND partial keys:   {}", index.send_partial);
    println!("  clinical terms:      {}", index.clinical);
    println!("  preclinical terms:   {}", index.preclinical);
}
