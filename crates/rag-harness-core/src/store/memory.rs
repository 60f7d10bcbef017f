//! In-memory [`IndexStore`] implementation for testing.
//!
//! Holds the published manifest and entries behind `std::sync::RwLock`.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::models::{IndexEntry, IndexManifest};

use super::{IndexStore, StoredIndex};

/// In-memory store; contents are lost when dropped.
#[derive(Default)]
pub struct MemoryIndexStore {
    contents: RwLock<Option<StoredIndex>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `entries` under `manifest`, consistent or not.
    #[cfg(test)]
    pub(crate) fn seeded(manifest: IndexManifest, entries: Vec<IndexEntry>) -> Self {
        Self {
            contents: RwLock::new(Some((manifest, entries))),
        }
    }

    fn poisoned() -> RetrievalError {
        RetrievalError::Store("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    fn label(&self) -> &str {
        "memory"
    }

    fn location(&self) -> String {
        ":memory:".to_string()
    }

    async fn publish(
        &self,
        manifest: &IndexManifest,
        entries: &[IndexEntry],
    ) -> Result<(), RetrievalError> {
        let mut contents = self.contents.write().map_err(|_| Self::poisoned())?;
        *contents = Some((manifest.clone(), entries.to_vec()));
        Ok(())
    }

    async fn open(&self) -> Result<Option<StoredIndex>, RetrievalError> {
        let contents = self.contents.read().map_err(|_| Self::poisoned())?;
        Ok(contents.clone())
    }

    async fn clear(&self) -> Result<(), RetrievalError> {
        let mut contents = self.contents.write().map_err(|_| Self::poisoned())?;
        *contents = None;
        Ok(())
    }

    fn file_count(&self) -> usize {
        match self.contents.read() {
            Ok(contents) if contents.is_some() => 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceMetadata;

    fn entry(id: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            vector: vec![1.0, 0.0],
            text: format!("text {}", id),
            metadata: SourceMetadata::text("a.txt"),
        }
    }

    #[tokio::test]
    async fn test_publish_open_clear() {
        let store = MemoryIndexStore::new();
        assert!(store.open().await.unwrap().is_none());
        assert_eq!(store.file_count(), 0);

        let manifest = IndexManifest::new("m", 2, 2);
        store.publish(&manifest, &[entry("a"), entry("b")]).await.unwrap();
        let (read_manifest, entries) = store.open().await.unwrap().unwrap();
        assert_eq!(read_manifest, manifest);
        assert_eq!(entries.len(), 2);
        assert_eq!(store.file_count(), 1);

        store.clear().await.unwrap();
        assert!(store.open().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_publish_replaces_previous() {
        let store = MemoryIndexStore::new();
        store
            .publish(&IndexManifest::new("m", 2, 2), &[entry("a"), entry("b")])
            .await
            .unwrap();
        store
            .publish(&IndexManifest::new("m", 2, 1), &[entry("c")])
            .await
            .unwrap();
        let (_, entries) = store.open().await.unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "c");
    }
}
