//! Rosetta CLI
//!
//! Command-line front end for the translation engine:
//! - Translating codes between clinical, intermediary and preclinical
//!   vocabularies (`translate`)
//! - Batch system-organ-class lookups (`soc`)
//! - Inspecting and converting ontology snapshots (`stats`, `snapshot`)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rosetta_mapping::{EngineConfig, MappingAlgorithm, TranslationRequest, Translator};
use rosetta_ontology::OntologyGraph;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

mod output;

#[derive(Parser)]
#[command(name = "rosetta")]
#[command(author, version, about = "Rosetta: toxicology terminology translation")]
struct Cli {
    /// Log at debug level (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine configuration (JSON); missing fields take their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate concept codes with one of the mapping algorithms.
    ///
    /// Finding/organ algorithms (SEND2MEDDRAPT, ETOX2MEDDRAPT) take a finding
    /// code and optionally an organ code; all others take exactly one code.
    Translate {
        /// Ontology snapshot (`.json` or binary)
        #[arg(short, long)]
        graph: PathBuf,
        /// Mapping algorithm, e.g. MEDDRAPT2SEND
        #[arg(short, long)]
        algorithm: MappingAlgorithm,
        /// Penalty budget (clamped to the configured ceiling)
        #[arg(long)]
        max_penalty: Option<u32>,
        /// Keep and print the full chain of every result
        #[arg(long)]
        explain: bool,
        /// Translate each code on its own
        #[arg(long)]
        bulk: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
        /// Concept codes
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Primary system-organ class of clinical terms.
    Soc {
        #[arg(short, long)]
        graph: PathBuf,
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Ontology and reference index sizes.
    Stats {
        #[arg(short, long)]
        graph: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Convert a snapshot between JSON and binary (chosen by extension).
    Snapshot {
        #[arg(short, long)]
        graph: PathBuf,
        #[arg(short, long)]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Translate {
            graph,
            algorithm,
            max_penalty,
            explain,
            bulk,
            json,
            codes,
        } => {
            let translator = load_translator(&graph, config)?;
            let results = if bulk {
                translator.translate_bulk(algorithm, &codes)?
            } else {
                let mut request = TranslationRequest::new(codes, algorithm).explain(explain);
                if let Some(budget) = max_penalty {
                    request = request.max_penalty(budget);
                }
                translator.translate(&request)?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                output::print_results(algorithm, &results, explain);
            }
        }
        Commands::Soc { graph, json, codes } => {
            let translator = load_translator(&graph, config)?;
            let results = translator.primary_classes(&codes)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                output::print_results(MappingAlgorithm::MeddraPt2MeddraSoc, &results, false);
            }
        }
        Commands::Stats { graph, json } => {
            let ontology = load_graph(&graph)?;
            let graph_stats = ontology.stats();
            let translator = Translator::new(Arc::new(ontology), config);
            let index_stats = translator.index().stats();
            if json {
                let report = serde_json::json!({ "graph": graph_stats, "index": index_stats });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_stats(&graph_stats, &index_stats);
            }
        }
        Commands::Snapshot { graph, out } => {
            let ontology = load_graph(&graph)?;
            ontology
                .save(&out)
                .with_context(|| format!("failed to write {}", out.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), out.display().to_string().bold());
        }
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_graph(path: &Path) -> Result<OntologyGraph> {
    let start = Instant::now();
    let graph = OntologyGraph::load(path).with_context(|| format!("failed to load {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        concepts = graph.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "ontology loaded"
    );
    Ok(graph)
}

fn load_translator(path: &Path, config: EngineConfig) -> Result<Translator> {
    let graph = load_graph(path)?;
    Ok(Translator::new(Arc::new(graph), config))
}
