//! # RAG Harness
//!
//! Retrieval-augmented context for conversational assistants.
//!
//! RAG Harness loads a directory of text and tabular files, splits them into
//! overlapping chunks, embeds each chunk, and persists an exact vector index.
//! At query time it embeds the question, ranks chunks by cosine similarity,
//! and assembles a length-bounded context string for a prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunker │──▶│ Embedder │──▶│ Vector index │
//! │ txt/csv  │   │         │   │          │   │   (SQLite)   │
//! └──────────┘   └─────────┘   └──────────┘   └──────┬───────┘
//!                                                    │
//!                                 ┌──────────────────┤
//!                                 ▼                  ▼
//!                           ┌──────────┐      ┌─────────────┐
//!                           │   CLI    │      │ Retrieval   │
//!                           │  (rag)   │      │ service API │
//!                           └──────────┘      └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag ingest                         # build the index from paths.data_dir
//! rag search "opening hours"         # ranked chunks
//! rag context "opening hours"        # prompt context
//! rag status                         # availability overview
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`loader`] | Data directory → documents |
//! | [`embedding`] | Embedding providers |
//! | [`sqlite_store`] | Persistent index store |
//! | [`service`] | Retrieval service facade |
//! | [`logging`] | tracing subscriber setup |
//! | [`ingest`], [`search`], [`status`] | CLI commands |
//!
//! Chunking, the vector index, and context assembly live in
//! [`rag_harness_core`].

pub mod config;
pub mod embedding;
pub mod ingest;
pub mod loader;
pub mod logging;
pub mod search;
pub mod service;
pub mod sqlite_store;
pub mod status;
