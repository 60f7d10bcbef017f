//! Exact nearest-neighbour vector index.
//!
//! A [`VectorIndex`] is the in-memory view of one published index: a
//! manifest plus entries whose vectors are unit-normalised and share one
//! dimensionality. It is created by [`VectorIndex::build`] (which publishes
//! through an [`IndexStore`]) or [`VectorIndex::load`] (which reads one back).
//!
//! # Algorithm
//!
//! Search is a brute-force scan:
//!
//! ```text
//! score(entry) = dot(query, entry.vector)
//! ```
//!
//! which equals cosine similarity because both sides are unit length. Hits
//! are sorted by descending score with a stable sort, so equal scores keep
//! insertion order, and the first `min(k, len)` are returned.

use tracing::{debug, info};

use crate::embedding::dot;
use crate::error::RetrievalError;
use crate::models::{IndexEntry, IndexManifest, SearchHit, INDEX_FORMAT_VERSION};
use crate::store::IndexStore;

#[derive(Debug, Clone)]
pub struct VectorIndex {
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Validate `entries`, publish them through `store`, and return the index.
    ///
    /// Any previously published index at the store's location is replaced.
    pub async fn build(
        store: &dyn IndexStore,
        model: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<Self, RetrievalError> {
        let index = Self::from_entries(model, entries)?;
        store.publish(&index.manifest, &index.entries).await?;
        info!(
            entries = index.entries.len(),
            dims = index.manifest.dims,
            location = %store.location(),
            "published vector index"
        );
        Ok(index)
    }

    /// Build an index in memory without persisting it.
    pub fn from_entries(model: &str, entries: Vec<IndexEntry>) -> Result<Self, RetrievalError> {
        let Some(first) = entries.first() else {
            return Err(RetrievalError::Store(
                "refusing to build an index with no entries".to_string(),
            ));
        };
        let dims = first.vector.len();
        if dims == 0 {
            return Err(RetrievalError::Store("entry vectors are empty".to_string()));
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dims) {
            return Err(RetrievalError::Store(format!(
                "entry {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                dims
            )));
        }

        let manifest = IndexManifest::new(model, dims, entries.len());
        Ok(Self { manifest, entries })
    }

    /// Read the index published in `store`.
    ///
    /// Returns `Ok(None)` when the store is absent or empty. Content that
    /// cannot be trusted, including an index built with a different model
    /// or dimensionality, is reported as [`RetrievalError::IndexCorruption`].
    pub async fn load(
        store: &dyn IndexStore,
        expected_model: &str,
        expected_dims: usize,
    ) -> Result<Option<Self>, RetrievalError> {
        let Some((manifest, entries)) = store.open().await? else {
            return Ok(None);
        };
        if entries.is_empty() && manifest.entry_count == 0 {
            return Ok(None);
        }

        check_consistency(&manifest, &entries)?;

        if manifest.model != expected_model {
            return Err(RetrievalError::IndexCorruption(format!(
                "index was built with model '{}', active model is '{}'",
                manifest.model, expected_model
            )));
        }
        if manifest.dims != expected_dims {
            return Err(RetrievalError::IndexCorruption(format!(
                "index has {} dimensions, active embedder produces {}",
                manifest.dims, expected_dims
            )));
        }

        info!(
            entries = entries.len(),
            location = %store.location(),
            "loaded vector index"
        );
        Ok(Some(Self { manifest, entries }))
    }

    /// Return the `k` entries closest to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, RetrievalError> {
        if k == 0 {
            return Err(RetrievalError::InvalidQuery("k must be at least 1".to_string()));
        }
        if query.len() != self.manifest.dims {
            return Err(RetrievalError::InvalidQuery(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.manifest.dims
            )));
        }

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .entries
            .iter()
            .map(|entry| (dot(query, &entry.vector), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        debug!(k, hits = scored.len(), "vector search");

        Ok(scored
            .into_iter()
            .map(|(score, entry)| SearchHit {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score,
            })
            .collect())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn dims(&self) -> usize {
        self.manifest.dims
    }

    pub fn model(&self) -> &str {
        &self.manifest.model
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }
}

fn check_consistency(manifest: &IndexManifest, entries: &[IndexEntry]) -> Result<(), RetrievalError> {
    if manifest.format_version != INDEX_FORMAT_VERSION {
        return Err(RetrievalError::IndexCorruption(format!(
            "unsupported index format version {}",
            manifest.format_version
        )));
    }
    if manifest.entry_count != entries.len() {
        return Err(RetrievalError::IndexCorruption(format!(
            "manifest lists {} entries, store holds {}",
            manifest.entry_count,
            entries.len()
        )));
    }
    for entry in entries {
        if entry.vector.len() != manifest.dims {
            return Err(RetrievalError::IndexCorruption(format!(
                "entry {} has {} dimensions, manifest says {}",
                entry.id,
                entry.vector.len(),
                manifest.dims
            )));
        }
        if entry.vector.iter().any(|x| !x.is_finite()) {
            return Err(RetrievalError::IndexCorruption(format!(
                "entry {} has non-finite components",
                entry.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMetadata;
    use crate::store::MemoryIndexStore;

    fn entry(id: &str, vector: Vec<f32>) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector,
            text: format!("text {}", id),
            metadata: SourceMetadata::text("corpus.txt"),
        }
    }

    fn sample() -> Vec<IndexEntry> {
        vec![
            entry("x", vec![1.0, 0.0]),
            entry("y", vec![0.0, 1.0]),
            entry("xy", vec![0.6, 0.8]),
        ]
    }

    #[tokio::test]
    async fn test_build_then_load_roundtrip() {
        let store = MemoryIndexStore::new();
        let built = VectorIndex::build(&store, "m", sample()).await.unwrap();
        let loaded = VectorIndex::load(&store, "m", 2).await.unwrap().unwrap();

        assert_eq!(loaded.entry_count(), 3);
        assert_eq!(loaded.dims(), 2);
        assert_eq!(loaded.model(), "m");
        assert_eq!(loaded.manifest(), built.manifest());

        let q = [0.8, 0.6];
        let a = built.search(&q, 3).unwrap();
        let b = loaded.search(&q, 3).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.text, y.text);
            assert!((x.score - y.score).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_load_absent_store() {
        let store = MemoryIndexStore::new();
        assert!(VectorIndex::load(&store, "m", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_rejects_model_mismatch() {
        let store = MemoryIndexStore::new();
        VectorIndex::build(&store, "old-model", sample()).await.unwrap();
        let err = VectorIndex::load(&store, "new-model", 2).await.unwrap_err();
        assert!(err.is_recoverable_by_rebuild());
    }

    #[tokio::test]
    async fn test_load_rejects_dims_mismatch() {
        let store = MemoryIndexStore::new();
        VectorIndex::build(&store, "m", sample()).await.unwrap();
        let err = VectorIndex::load(&store, "m", 384).await.unwrap_err();
        assert!(matches!(err, RetrievalError::IndexCorruption(_)));
    }

    #[tokio::test]
    async fn test_load_rejects_count_mismatch() {
        let store = MemoryIndexStore::seeded(IndexManifest::new("m", 2, 5), sample());
        let err = VectorIndex::load(&store, "m", 2).await.unwrap_err();
        assert!(matches!(err, RetrievalError::IndexCorruption(msg) if msg.contains("5 entries")));
    }

    #[tokio::test]
    async fn test_load_rejects_ragged_vectors() {
        let mut entries = sample();
        entries[1].vector.push(0.0);
        let store = MemoryIndexStore::seeded(IndexManifest::new("m", 2, 3), entries);
        let err = VectorIndex::load(&store, "m", 2).await.unwrap_err();
        assert!(matches!(err, RetrievalError::IndexCorruption(_)));
    }

    #[test]
    fn test_from_entries_rejects_empty_and_ragged() {
        assert!(VectorIndex::from_entries("m", Vec::new()).is_err());
        let ragged = vec![entry("a", vec![1.0, 0.0]), entry("b", vec![1.0])];
        assert!(VectorIndex::from_entries("m", ragged).is_err());
    }

    #[test]
    fn test_search_orders_by_score() {
        let index = VectorIndex::from_entries("m", sample()).unwrap();
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["text x", "text xy", "text y"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert!((hits[1].score - 0.6).abs() < 1e-6);
        assert!(hits[2].score.abs() < 1e-6);
    }

    #[test]
    fn test_search_ties_keep_insertion_order() {
        let entries = vec![
            entry("first", vec![0.0, 1.0]),
            entry("second", vec![0.0, 1.0]),
            entry("third", vec![0.0, 1.0]),
        ];
        let index = VectorIndex::from_entries("m", entries).unwrap();
        let hits = index.search(&[0.0, 1.0], 2).unwrap();
        assert_eq!(hits[0].text, "text first");
        assert_eq!(hits[1].text, "text second");
    }

    #[test]
    fn test_search_k_larger_than_index() {
        let index = VectorIndex::from_entries("m", sample()).unwrap();
        assert_eq!(index.search(&[0.0, 1.0], 50).unwrap().len(), 3);
    }

    #[test]
    fn test_search_rejects_bad_queries() {
        let index = VectorIndex::from_entries("m", sample()).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 0),
            Err(RetrievalError::InvalidQuery(_))
        ));
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(RetrievalError::InvalidQuery(_))
        ));
    }
}
