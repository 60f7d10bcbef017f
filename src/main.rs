//! # RAG Harness CLI (`rag`)
//!
//! The `rag` binary builds and queries the retrieval index that backs a
//! conversational assistant.
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag ingest` | Delete the vector index and rebuild it from the data directory |
//! | `rag search "<query>"` | Print the best-matching chunks with scores |
//! | `rag context "<query>"` | Print the assembled prompt context |
//! | `rag status` | Show availability, model, store, and file counts |
//!
//! ## Examples
//!
//! ```bash
//! # Rebuild after editing files in the data directory
//! rag ingest --config ./config/rag.toml
//!
//! # Inspect what retrieval returns for a question
//! rag search "opening hours" --k 4
//!
//! # Preview the user message sent to the model
//! rag context "opening hours" --with-query
//!
//! # Machine-readable status
//! rag status --json
//! ```

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use rag_harness::{config, ingest, logging, search, status};

/// RAG Harness CLI: retrieval-augmented context for conversational assistants.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rag.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rag",
    about = "RAG Harness — retrieval-augmented context for conversational assistants",
    version,
    long_about = "RAG Harness loads documents from a data directory, splits them into \
    overlapping chunks, embeds them, and persists a vector index. Queries return the most \
    similar chunks or a length-bounded context string for a prompt."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rag.toml`.
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    /// Increase log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Rebuild the vector index from scratch.
    ///
    /// Deletes the persisted index, loads every file in the data directory,
    /// chunks and embeds it, and publishes a new index. On failure no index
    /// is left behind.
    Ingest,

    /// Search the index for chunks similar to a query.
    Search {
        /// The search query string.
        query: String,

        /// Number of results (defaults to `retrieval.search_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Assemble prompt context for a query.
    Context {
        /// The user query.
        query: String,

        /// Character budget (defaults to `retrieval.max_context_chars`).
        #[arg(long)]
        max_chars: Option<usize>,

        /// Print the full user message (`<query>`, a blank line, `### CONTEXT`, then the context).
        #[arg(long)]
        with_query: bool,
    },

    /// Show retrieval availability and index details.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest => {
            ingest::run_ingest(&cfg).await?;
        }
        Commands::Search { query, k } => {
            search::run_search(&cfg, &query, k).await?;
        }
        Commands::Context {
            query,
            max_chars,
            with_query,
        } => {
            search::run_context(&cfg, &query, max_chars, with_query).await?;
        }
        Commands::Status { json } => {
            status::run_status(&cfg, json).await?;
        }
    }

    Ok(())
}
