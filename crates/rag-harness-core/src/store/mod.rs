//! Persistence abstraction for the vector index.
//!
//! The [`IndexStore`] trait is the only way the index touches storage. A
//! store is bound to one location at construction and holds at most one
//! published index there.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`publish`](IndexStore::publish) | Atomically replace the stored index |
//! | [`open`](IndexStore::open) | Read the stored index, `None` when absent |
//! | [`clear`](IndexStore::clear) | Delete everything at the location |
//! | [`file_count`](IndexStore::file_count) | Number of artifacts at the location |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::RetrievalError;
use crate::models::{IndexEntry, IndexManifest};

pub use memory::MemoryIndexStore;

/// Contents of a published index as read back from a store.
pub type StoredIndex = (IndexManifest, Vec<IndexEntry>);

#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Backend name shown in status output (e.g. `"sqlite"`).
    fn label(&self) -> &str;

    /// Human-readable location, usually a directory path.
    fn location(&self) -> String;

    /// Replace any previously published index with `entries`.
    ///
    /// Readers never observe a half-written index: either the old content or
    /// the new content is visible after a crash.
    async fn publish(
        &self,
        manifest: &IndexManifest,
        entries: &[IndexEntry],
    ) -> Result<(), RetrievalError>;

    /// Read the published index.
    ///
    /// Returns `Ok(None)` when nothing has been published; unreadable content
    /// is [`RetrievalError::IndexCorruption`].
    async fn open(&self) -> Result<Option<StoredIndex>, RetrievalError>;

    /// Remove the published index, if any.
    async fn clear(&self) -> Result<(), RetrievalError>;

    /// Number of files (or equivalent artifacts) currently at the location.
    fn file_count(&self) -> usize;
}
