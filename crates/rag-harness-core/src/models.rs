//! Core data models used throughout RAG Harness.
//!
//! These types represent the documents, chunks, index entries, and search
//! hits that flow through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a document was read from its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Whole file decoded as UTF-8 text.
    Text,
    /// One record of a delimited file (CSV/TSV).
    Tabular,
}

/// Provenance carried by a document and inherited by its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Path of the input file.
    pub source: String,
    pub format: SourceFormat,
    /// Zero-based record index for tabular sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    /// Column → value map for tabular sources.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl SourceMetadata {
    pub fn text(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            format: SourceFormat::Text,
            row: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn tabular(source: impl Into<String>, row: usize, fields: BTreeMap<String, String>) -> Self {
        Self {
            source: source.into(),
            format: SourceFormat::Tabular,
            row: Some(row),
            fields,
        }
    }

    /// Short human label, e.g. `faq.csv#3` or `guide.md`.
    pub fn label(&self) -> String {
        match self.row {
            Some(row) => format!("{}#{}", self.source, row),
            None => self.source.clone(),
        }
    }
}

/// A unit of ingested content produced by the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub text: String,
    pub metadata: SourceMetadata,
}

impl Document {
    pub fn new(text: impl Into<String>, metadata: SourceMetadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A bounded slice of a document's text.
///
/// `text` is exactly the source span `[start_offset, end_offset)`, measured
/// in characters. The first `overlap` characters repeat the tail of the
/// previous chunk of the same document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub chunk_index: i64,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub overlap: usize,
    pub metadata: SourceMetadata,
}

/// The persisted unit of the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: SourceMetadata,
}

/// Descriptive record persisted alongside the entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    /// Embedding model that produced the vectors.
    pub model: String,
    pub dims: usize,
    pub entry_count: usize,
    /// RFC 3339 build timestamp.
    pub built_at: String,
}

/// Current on-disk format version written by [`IndexManifest::new`].
pub const INDEX_FORMAT_VERSION: u32 = 1;

impl IndexManifest {
    pub fn new(model: impl Into<String>, dims: usize, entry_count: usize) -> Self {
        Self {
            format_version: INDEX_FORMAT_VERSION,
            model: model.into(),
            dims,
            entry_count,
            built_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A nearest-neighbour result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub metadata: SourceMetadata,
    /// Cosine similarity, higher is closer.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_label() {
        assert_eq!(SourceMetadata::text("guide.md").label(), "guide.md");
        let tab = SourceMetadata::tabular("faq.csv", 3, BTreeMap::new());
        assert_eq!(tab.label(), "faq.csv#3");
    }

    #[test]
    fn test_metadata_json_skips_empty_fields() {
        let json = serde_json::to_string(&SourceMetadata::text("a.txt")).unwrap();
        assert_eq!(json, r#"{"source":"a.txt","format":"text"}"#);
        let back: SourceMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SourceMetadata::text("a.txt"));
    }
}
