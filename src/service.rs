//! Retrieval service facade.
//!
//! [`RetrievalService`] is the single entry point a conversational layer
//! needs: it loads or builds the vector index once, then answers
//! similarity queries and assembles prompt context.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize()──▶ Ready(index)
//!       │                              ▲
//!       └──────────────────────▶ Unavailable(reason)
//!                 rebuild() re-enters either state
//! ```
//!
//! Initialization never fails loudly. Any reason the index cannot be
//! served ends in [`ServiceState::Unavailable`], after which query methods
//! return empty results. A persisted index that is unreadable or was built
//! with another embedding model is rebuilt from the data directory.
//! [`RetrievalService::open_existing`] only loads, for read-only callers.
//!
//! Mutation (`initialize`, `rebuild`) takes `&mut self`; queries take
//! `&self`. Callers sharing a service across tasks wrap it in a
//! `tokio::sync::RwLock`.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use rag_harness_core::chunk::{chunk_documents, ChunkingParams};
use rag_harness_core::context::assemble_context;
use rag_harness_core::embedding::{embed_normalized, embed_query, Embedder};
use rag_harness_core::error::{LoadFailure, RetrievalError};
use rag_harness_core::index::VectorIndex;
use rag_harness_core::models::{IndexEntry, SearchHit};
use rag_harness_core::store::IndexStore;

use crate::config::{Config, LoaderConfig};
use crate::embedding::create_embedder;
use crate::loader::{data_files, load_documents};
use crate::sqlite_store::SqliteIndexStore;

/// Hits returned by [`RetrievalService::search`] when the caller has no preference.
pub const DEFAULT_SEARCH_K: usize = 4;
/// Hits considered by [`RetrievalService::get_context`].
pub const CONTEXT_K: usize = 6;
/// Default character budget for [`RetrievalService::get_context`].
pub const DEFAULT_CONTEXT_CHARS: usize = 1500;

/// Everything the service needs besides the embedder and the store.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub persist_dir: PathBuf,
    pub chunking: ChunkingParams,
    pub loader: LoaderConfig,
    pub context_k: usize,
    pub batch_size: usize,
}

impl ServiceConfig {
    pub fn new(data_dir: impl Into<PathBuf>, persist_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            persist_dir: persist_dir.into(),
            chunking: ChunkingParams::default(),
            loader: LoaderConfig::default(),
            context_k: CONTEXT_K,
            batch_size: 64,
        }
    }
}

#[derive(Debug)]
pub enum ServiceState {
    Uninitialized,
    Ready(VectorIndex),
    Unavailable(RetrievalError),
}

/// Where a ready index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    /// Read back from the persist directory.
    Loaded,
    /// Built from the data directory during this call.
    Built,
}

/// Outcome of [`RetrievalService::initialize`] and [`RetrievalService::rebuild`].
#[derive(Debug, Clone)]
pub enum Readiness {
    Ready { source: IndexSource, entries: usize },
    Unavailable(RetrievalError),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Counts from the most recent index build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Data files that contributed documents.
    pub files: Vec<String>,
    pub documents: usize,
    pub chunks: usize,
    pub failures: Vec<LoadFailure>,
}

/// Operator-facing snapshot of the service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub available: bool,
    pub embedding_model: String,
    pub vector_store: String,
    pub data_dir: String,
    pub persist_dir: String,
    pub data_files: Vec<String>,
    pub vector_files: usize,
    pub entries: usize,
    /// Vector dimensionality of the active index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dims: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_built_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
}

pub struct RetrievalService {
    config: ServiceConfig,
    embedder: Arc<dyn Embedder>,
    store: Box<dyn IndexStore>,
    state: ServiceState,
    last_build: Option<BuildReport>,
}

impl RetrievalService {
    /// Create an uninitialized service. Performs no I/O.
    pub fn new(
        config: ServiceConfig,
        embedder: Arc<dyn Embedder>,
        store: Box<dyn IndexStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            store,
            state: ServiceState::Uninitialized,
            last_build: None,
        }
    }

    /// Load the persisted index, or build it from the data directory.
    pub async fn initialize(&mut self) -> Readiness {
        if let Err(e) = self.preflight() {
            return self.become_unavailable(e);
        }

        let loaded = VectorIndex::load(
            self.store.as_ref(),
            self.embedder.model_name(),
            self.embedder.dims(),
        )
        .await;

        match loaded {
            Ok(Some(index)) => self.become_ready(index, IndexSource::Loaded),
            Ok(None) => {
                info!(location = %self.store.location(), "no persisted index, building");
                self.build_and_activate().await
            }
            Err(e) if e.is_recoverable_by_rebuild() => {
                warn!(error = %e, "persisted index unusable, rebuilding");
                self.build_and_activate().await
            }
            Err(e) => self.become_unavailable(e),
        }
    }

    /// Load the persisted index without building one.
    ///
    /// For read-only callers such as `rag status`: nothing is embedded and
    /// nothing is written. A missing or unusable index leaves the service
    /// unavailable.
    pub async fn open_existing(&mut self) -> Readiness {
        let loaded = VectorIndex::load(
            self.store.as_ref(),
            self.embedder.model_name(),
            self.embedder.dims(),
        )
        .await;

        match loaded {
            Ok(Some(index)) => self.become_ready(index, IndexSource::Loaded),
            Ok(None) => self.become_unavailable(RetrievalError::Store(format!(
                "no index at {}; run `rag ingest`",
                self.store.location()
            ))),
            Err(e) => self.become_unavailable(e),
        }
    }

    /// Delete the persisted index and build a fresh one.
    ///
    /// A failed rebuild leaves no index behind and the service unavailable.
    pub async fn rebuild(&mut self) -> Readiness {
        self.state = ServiceState::Uninitialized;
        if let Err(e) = self.store.clear().await {
            return self.become_unavailable(e);
        }
        if let Err(e) = self.preflight() {
            return self.become_unavailable(e);
        }
        self.build_and_activate().await
    }

    /// Service wired from a loaded configuration: the configured embedding
    /// provider and a SQLite store at `paths.persist_dir`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let store = SqliteIndexStore::new(&config.paths.persist_dir);
        Ok(Self::new(config.service_config(), embedder, Box::new(store)))
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, ServiceState::Ready(_))
    }

    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Report for the most recent build performed by this service, if any.
    pub fn last_build(&self) -> Option<&BuildReport> {
        self.last_build.as_ref()
    }

    /// Texts of the `k` chunks most similar to `query`.
    ///
    /// Empty when the service is unavailable or the query fails.
    pub async fn search(&self, query: &str, k: usize) -> Vec<String> {
        self.search_hits(query, k)
            .await
            .into_iter()
            .map(|hit| hit.text)
            .collect()
    }

    /// Like [`search`](Self::search), keeping scores and source metadata.
    pub async fn search_hits(&self, query: &str, k: usize) -> Vec<SearchHit> {
        match self.try_search_hits(query, k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "search failed");
                Vec::new()
            }
        }
    }

    /// Ranked hits for `query`, surfacing why a search could not run.
    pub async fn try_search_hits(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<SearchHit>, RetrievalError> {
        let index = match &self.state {
            ServiceState::Ready(index) => index,
            ServiceState::Unavailable(reason) => return Err(reason.clone()),
            ServiceState::Uninitialized => {
                return Err(RetrievalError::Configuration(
                    "retrieval service is not initialized".to_string(),
                ))
            }
        };

        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let hits = index.search(&vector, k)?;
        debug!(query_chars = query.chars().count(), k, hits = hits.len(), "search");
        Ok(hits)
    }

    /// Context string for a prompt: the best `context_k` chunks, joined by
    /// blank lines, within `max_chars` (see
    /// [`assemble_context`](rag_harness_core::context::assemble_context)).
    ///
    /// Empty when the service is unavailable.
    pub async fn get_context(&self, query: &str, max_chars: usize) -> String {
        if !self.is_available() {
            return String::new();
        }
        let texts = self.search(query, self.config.context_k).await;
        assemble_context(&texts, max_chars)
    }

    pub fn status(&self) -> ServiceStatus {
        let (entries, dims, index_built_at, unavailable_reason) = match &self.state {
            ServiceState::Ready(index) => (
                index.entry_count(),
                Some(index.dims()),
                Some(index.manifest().built_at.clone()),
                None,
            ),
            ServiceState::Unavailable(reason) => (0, None, None, Some(reason.to_string())),
            ServiceState::Uninitialized => (0, None, None, Some("not initialized".to_string())),
        };

        ServiceStatus {
            available: self.is_available(),
            embedding_model: self.embedder.model_name().to_string(),
            vector_store: self.store.label().to_string(),
            data_dir: self.config.data_dir.display().to_string(),
            persist_dir: self.store.location(),
            data_files: data_files(&self.config.data_dir),
            vector_files: self.store.file_count(),
            entries,
            dims,
            index_built_at,
            unavailable_reason,
        }
    }

    fn preflight(&self) -> Result<(), RetrievalError> {
        if !self.config.data_dir.is_dir() {
            return Err(RetrievalError::Configuration(format!(
                "data directory does not exist: {}",
                self.config.data_dir.display()
            )));
        }
        self.config.chunking.validate()
    }

    async fn build_and_activate(&mut self) -> Readiness {
        match self.build().await {
            Ok((index, report)) => {
                self.last_build = Some(report);
                self.become_ready(index, IndexSource::Built)
            }
            Err(e) => self.become_unavailable(e),
        }
    }

    /// Loader → chunker → embedder → index.
    async fn build(&self) -> Result<(VectorIndex, BuildReport), RetrievalError> {
        let loaded = load_documents(&self.config.data_dir, &self.config.loader)?;
        let mut chunks = chunk_documents(&loaded.documents, &self.config.chunking);
        let before = chunks.len();
        chunks.retain(|chunk| !chunk.text.trim().is_empty());
        if chunks.len() < before {
            debug!(dropped = before - chunks.len(), "dropped whitespace-only chunks");
        }
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyCorpus {
                data_dir: self.config.data_dir.clone(),
            });
        }

        info!(
            files = loaded.files_loaded.len(),
            documents = loaded.documents.len(),
            chunks = chunks.len(),
            model = self.embedder.model_name(),
            "embedding corpus"
        );

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors =
            embed_normalized(self.embedder.as_ref(), &texts, self.config.batch_size).await?;

        let report = BuildReport {
            files: loaded.files_loaded,
            documents: loaded.documents.len(),
            chunks: chunks.len(),
            failures: loaded.failures,
        };

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                id: chunk.id,
                vector,
                text: chunk.text,
                metadata: chunk.metadata,
            })
            .collect();

        let index =
            VectorIndex::build(self.store.as_ref(), self.embedder.model_name(), entries).await?;
        Ok((index, report))
    }

    fn become_ready(&mut self, index: VectorIndex, source: IndexSource) -> Readiness {
        let entries = index.entry_count();
        info!(
            ?source,
            entries,
            model = index.model(),
            dims = index.dims(),
            "retrieval service ready"
        );
        self.state = ServiceState::Ready(index);
        Readiness::Ready { source, entries }
    }

    fn become_unavailable(&mut self, reason: RetrievalError) -> Readiness {
        warn!(reason = %reason, "retrieval service unavailable");
        self.state = ServiceState::Unavailable(reason.clone());
        Readiness::Unavailable(reason)
    }
}

/// The user message sent downstream when retrieval context is attached.
pub fn augmented_message(query: &str, context: &str) -> String {
    format!("{}\n\n### CONTEXT\n{}", query, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_harness_core::store::MemoryIndexStore;

    use crate::embedding::HashEmbedder;

    fn service(data_dir: PathBuf) -> RetrievalService {
        RetrievalService::new(
            ServiceConfig::new(data_dir, "unused"),
            Arc::new(HashEmbedder::new("hash", 32)),
            Box::new(MemoryIndexStore::new()),
        )
    }

    #[test]
    fn test_augmented_message() {
        assert_eq!(
            augmented_message("What time?", "Opens at 9."),
            "What time?\n\n### CONTEXT\nOpens at 9."
        );
    }

    #[test]
    fn test_new_is_uninitialized() {
        let svc = service(PathBuf::from("/nonexistent"));
        assert!(matches!(svc.state(), ServiceState::Uninitialized));
        assert!(!svc.is_available());
        assert!(svc.last_build().is_none());
        let status = svc.status();
        assert!(!status.available);
        assert_eq!(status.vector_store, "memory");
        assert_eq!(status.unavailable_reason.as_deref(), Some("not initialized"));
    }

    #[tokio::test]
    async fn test_uninitialized_queries_are_empty() {
        let svc = service(PathBuf::from("/nonexistent"));
        assert!(svc.search("anything", DEFAULT_SEARCH_K).await.is_empty());
        assert_eq!(svc.get_context("anything", DEFAULT_CONTEXT_CHARS).await, "");
        assert!(matches!(
            svc.try_search_hits("anything", 1).await,
            Err(RetrievalError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_chunking_is_unavailable() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "text").unwrap();
        let mut config = ServiceConfig::new(tmp.path(), "unused");
        config.chunking = ChunkingParams::new(10, 10);

        let mut svc = RetrievalService::new(
            config,
            Arc::new(HashEmbedder::new("hash", 8)),
            Box::new(MemoryIndexStore::new()),
        );
        assert!(matches!(
            svc.initialize().await,
            Readiness::Unavailable(RetrievalError::Configuration(_))
        ));
    }
}
