//! TOML configuration.
//!
//! Every section is optional; omitted keys fall back to the defaults below.
//! [`load_config`] parses and validates, failing with a message naming the
//! offending key.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use rag_harness_core::chunk::{ChunkingParams, DEFAULT_MAX_CHUNK_SIZE, DEFAULT_OVERLAP_SIZE};

use crate::service::{ServiceConfig, CONTEXT_K, DEFAULT_CONTEXT_CHARS, DEFAULT_SEARCH_K};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_persist_dir")]
    pub persist_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            persist_dir: default_persist_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("rag/data")
}
fn default_persist_dir() -> PathBuf {
    PathBuf::from("rag/vectors")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}
fn default_overlap_chars() -> usize {
    DEFAULT_OVERLAP_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_search_k")]
    pub search_k: usize,
    #[serde(default = "default_context_k")]
    pub context_k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_k: default_search_k(),
            context_k: default_context_k(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_search_k() -> usize {
    DEFAULT_SEARCH_K
}
fn default_context_k() -> usize {
    CONTEXT_K
}
fn default_max_context_chars() -> usize {
    DEFAULT_CONTEXT_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoaderConfig {
    /// Glob patterns (matched against file names) to leave out of the corpus.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Config {
    pub fn chunking_params(&self) -> ChunkingParams {
        ChunkingParams::new(self.chunking.max_chars, self.chunking.overlap_chars)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            data_dir: self.paths.data_dir.clone(),
            persist_dir: self.paths.persist_dir.clone(),
            chunking: self.chunking_params(),
            loader: self.loader.clone(),
            context_k: self.retrieval.context_k,
            batch_size: self.embedding.batch_size,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    // Validate retrieval
    if config.retrieval.search_k < 1 {
        bail!("retrieval.search_k must be >= 1");
    }
    if config.retrieval.context_k < 1 {
        bail!("retrieval.context_k must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "local" | "openai" | "ollama" | "hash" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, ollama, hash, or disabled.",
            other
        ),
    }

    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama" | "hash")
        && config.embedding.dims.is_none()
    {
        bail!(
            "embedding.dims must be specified when provider is '{}'",
            config.embedding.provider
        );
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }
    if config.embedding.batch_size < 1 {
        bail!("embedding.batch_size must be >= 1");
    }

    Ok(config)
}
