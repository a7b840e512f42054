//! Rosetta translation engine
//!
//! Translates toxicology terms between clinical (MedDRA), intermediary
//! (SNOMED) and preclinical (SEND, eTox) vocabularies by searching the
//! ontology graph for scored translation chains:
//!
//! ```text
//!                    ┌────────────────────────────┐
//!   codes ──────────►│ Translator                 │
//!                    │  resolve + validate input  │
//!                    └─────────────┬──────────────┘
//!                                  ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │ pipelines                                                    │
//!   │  clinical → preclinical    preclinical → clinical            │
//!   │  organ crosswalk           preclinical crosswalk   classes   │
//!   └───────┬───────────────────────────────┬──────────────────────┘
//!           │ direct lookups                │ on a miss
//!           ▼                               ▼
//!   ┌──────────────────┐           ┌─────────────────────┐
//!   │ ReferenceIndex   │◄──────────│ Expander            │
//!   │ (built once)     │           │ (bounded, per call) │
//!   └──────────────────┘           └─────────────────────┘
//!                                  │
//!                                  ▼
//!                  squash ──► sort_and_filter ──► Vec<Arc<Mapping>>
//! ```
//!
//! Every result is a [`Mapping`] chain whose root starts at the request's
//! source concepts; lower `|total_penalty|` is better and negative totals
//! mark results that reached something other than what was asked for.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod index;
pub mod item;
pub mod mapping;
pub mod pipeline;
pub mod traversal;
pub mod translator;

pub use aggregate::{best_mappings, best_score, find_one_best, keep_best_per_target, sort_and_filter, squash};
pub use config::EngineConfig;
pub use error::{MappingError, Result};
pub use index::{IndexStats, ReferenceIndex};
pub use item::MappingItem;
pub use mapping::{Direction, Mapping};
pub use translator::{MappingAlgorithm, TranslationRequest, Translator};
