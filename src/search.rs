//! `rag search` and `rag context`: query-time commands.
//!
//! Both commands load the persisted index (building it on first use). When
//! retrieval is unavailable they degrade to empty output and log the reason
//! on stderr, mirroring how the library behaves for a conversational caller.

use anyhow::{bail, Result};
use tracing::warn;

use crate::config::Config;
use crate::service::{augmented_message, Readiness, RetrievalService};

async fn ready_service(config: &Config) -> Result<RetrievalService> {
    let mut service = RetrievalService::from_config(config)?;
    if let Readiness::Unavailable(reason) = service.initialize().await {
        warn!("retrieval unavailable: {}", reason);
    }
    Ok(service)
}

/// Print the `k` best-matching chunks with scores and sources.
pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.search_k);
    if k == 0 {
        bail!("--k must be >= 1");
    }

    let service = ready_service(config).await?;
    let hits = service.search_hits(query, k).await;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, hit.score, hit.metadata.label());
        println!(
            "    excerpt: \"{}\"",
            excerpt(&hit.text, 160).replace('\n', " ").trim()
        );
        println!();
    }

    Ok(())
}

/// Print the assembled context, or the augmented user message with `--with-query`.
pub async fn run_context(
    config: &Config,
    query: &str,
    max_chars: Option<usize>,
    with_query: bool,
) -> Result<()> {
    let max_chars = max_chars.unwrap_or(config.retrieval.max_context_chars);
    let service = ready_service(config).await?;
    let context = service.get_context(query, max_chars).await;

    if with_query {
        println!("{}", augmented_message(query, &context));
    } else {
        println!("{}", context);
    }
    Ok(())
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
