//! # RAG Harness Core
//!
//! Shared logic for RAG Harness: data models, error taxonomy, chunking,
//! the embedder trait, the vector index, and context assembly.
//!
//! This crate performs no filesystem or network I/O. Persistence is
//! reached through the [`store::IndexStore`] trait and embedding through
//! the [`embedding::Embedder`] trait; concrete implementations live in the
//! `rag-harness` app crate.

pub mod chunk;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod store;
