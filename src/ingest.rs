//! `rag ingest`: rebuild the vector index from the data directory.
//!
//! Deletes the persisted index, then runs loader → chunker → embedder →
//! index. A failed run leaves no index behind and exits non-zero.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::service::{Readiness, RetrievalService};

pub async fn run_ingest(config: &Config) -> Result<()> {
    let mut service = RetrievalService::from_config(config)?;

    match service.rebuild().await {
        Readiness::Ready { entries, .. } => {
            let status = service.status();
            println!("ingest ok");
            if let Some(report) = service.last_build() {
                println!("  files loaded: {}", report.files.len());
                println!("  documents: {}", report.documents);
                println!("  chunks: {}", report.chunks);
                if !report.failures.is_empty() {
                    println!("  skipped files: {}", report.failures.len());
                    for failure in &report.failures {
                        println!("    {}", failure);
                    }
                }
            }
            println!("  entries indexed: {}", entries);
            println!("  embedding model: {}", status.embedding_model);
            println!(
                "  vector store: {} ({} files)",
                status.persist_dir, status.vector_files
            );
            Ok(())
        }
        Readiness::Unavailable(reason) => bail!("ingest failed: {}", reason),
    }
}
