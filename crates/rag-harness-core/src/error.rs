//! Error taxonomy for the retrieval pipeline.
//!
//! Each variant maps to one recovery policy:
//!
//! | Variant | Recovery |
//! |---------|----------|
//! | [`Configuration`](RetrievalError::Configuration) | none, surfaced to the operator |
//! | [`EmptyCorpus`](RetrievalError::EmptyCorpus) | none, surfaced to the operator |
//! | [`Load`](RetrievalError::Load) | file skipped, ingestion continues |
//! | [`Embedding`](RetrievalError::Embedding) | build aborted |
//! | [`IndexCorruption`](RetrievalError::IndexCorruption) | full rebuild from source |
//! | [`Store`](RetrievalError::Store) | build aborted |
//! | [`InvalidQuery`](RetrievalError::InvalidQuery) | query rejected |

use std::path::PathBuf;

use thiserror::Error;

/// A single input file that could not be turned into documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub reason: String,
}

impl std::fmt::Display for LoadFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no usable documents found in {}", data_dir.display())]
    EmptyCorpus { data_dir: PathBuf },

    #[error("failed to load {0}")]
    Load(LoadFailure),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("index corrupted: {0}")]
    IndexCorruption(String),

    #[error("index store error: {0}")]
    Store(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl RetrievalError {
    /// True for failures that a full rebuild from source documents can repair.
    pub fn is_recoverable_by_rebuild(&self) -> bool {
        matches!(self, RetrievalError::IndexCorruption(_))
    }
}
