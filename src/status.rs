//! `rag status`: availability and index overview.
//!
//! Reads the persisted index only. A missing index is reported, not built.

use anyhow::Result;

use crate::config::Config;
use crate::service::{RetrievalService, ServiceStatus};

pub async fn run_status(config: &Config, json: bool) -> Result<()> {
    let mut service = RetrievalService::from_config(config)?;
    service.open_existing().await;
    let status = service.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &ServiceStatus) {
    println!("RAG Harness — Status");
    println!("====================");
    println!();
    println!(
        "  Available:       {}",
        if status.available { "yes" } else { "no" }
    );
    if let Some(ref reason) = status.unavailable_reason {
        println!("  Reason:          {}", reason);
    }
    println!("  Embedding model: {}", status.embedding_model);
    println!("  Vector store:    {}", status.vector_store);
    println!("  Data dir:        {}", status.data_dir);
    println!("  Persist dir:     {}", status.persist_dir);
    println!("  Entries:         {}", status.entries);
    if let Some(dims) = status.dims {
        println!("  Dimensions:      {}", dims);
    }
    if let Some(ref built_at) = status.index_built_at {
        println!("  Built:           {}", format_built_at(built_at));
    }
    println!("  Vector files:    {}", status.vector_files);
    println!("  Data files:      {}", status.data_files.len());
    for name in &status.data_files {
        println!("    {}", name);
    }
    println!();
}

/// Render an RFC 3339 timestamp as `YYYY-MM-DD HH:MM UTC`.
fn format_built_at(ts: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(ts)
        .map(|dt| {
            dt.with_timezone(&chrono::Utc)
                .format("%Y-%m-%d %H:%M UTC")
                .to_string()
        })
        .unwrap_or_else(|_| ts.to_string())
}
