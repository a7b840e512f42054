//! Rosetta ontology graph
//!
//! The read-only terminology graph the translation engine searches:
//!
//! ```text
//!   MedDRA (clinical)          SNOMED (intermediary)         SEND / eTox (preclinical)
//!  ┌──────────────┐  Maps to  ┌──────────────────────┐ Exact ┌──────────────────────┐
//!  │ PT Hepatitis │──────────►│ Hepatitis            │       │ LIVER                │
//!  └──────────────┘           │  ├ Has finding site ─┼──────►│ INFLAMMATION         │
//!        ▲ is-a               │  └ Has asso morph  ──┼──────►└──────────────────────┘
//!  ┌──────────────┐           └──────────────────────┘
//!  │ LLT          │
//!  └──────────────┘
//! ```
//!
//! - [`Concept`], [`Vocabulary`], [`Domain`], [`ConceptClass`]: node data.
//! - [`Relationship`] / [`Predicate`]: typed edges, optionally batched into
//!   combinations through an explicit [`CombinationGroup`].
//! - [`OntologyStore`]: the query surface consumed by the engine.
//! - [`OntologyGraph`]: an indexed in-memory implementation with JSON and
//!   binary snapshots.

pub mod concept;
pub mod graph;
pub mod relationship;
pub mod store;
pub mod vocabulary;

pub use concept::{Concept, ConceptClass, ConceptId, InvalidReason};
pub use graph::{GraphStats, HierarchyEdge, OntologyGraph, OntologySnapshot};
pub use relationship::{CombinationGroup, GroupKey, Predicate, Relationship, ResolvedRelationship};
pub use store::OntologyStore;
pub use vocabulary::{Domain, Vocabulary, VocabularySet};
