//! Error taxonomy of the translation engine.
//!
//! "Nothing resolved" is not an error: pipelines return the sentinel chain
//! built by [`crate::Mapping::no_mapping`] instead.

use rosetta_ontology::VocabularySet;

#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("No concept found for code {code} in vocabularies {vocabularies}")]
    NotFound {
        code: String,
        vocabularies: VocabularySet,
    },
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
    #[error("Internal inconsistency: {reason}")]
    InternalInconsistency { reason: String },
}

impl MappingError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        MappingError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn inconsistent(reason: impl Into<String>) -> Self {
        MappingError::InternalInconsistency {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MappingError>;
